//! Layer workflow integration tests.
//!
//! Drives the store and stage interaction together the way a compositor
//! view does:
//! - Stacking layers in insertion order
//! - Selecting through the stage and deleting
//! - Gesture commits and their effect on paint order

use pixmorph_core::{
    Layer, LayerPatch, LayerStore, PixelSize, Point, SourceKey, StageInteraction, StoreAction,
};

fn dropped(name: &str, width: u32, height: u32) -> Layer {
    Layer::new(SourceKey::new(), PixelSize::new(width, height), name)
}

// ============================================================================
// Stacking
// ============================================================================

#[test]
fn test_two_drops_stack_in_drop_order() {
    let mut store = LayerStore::new();
    let first = store.add_layer(dropped("first.png", 200, 200));
    let second = store.add_layer(dropped("second.png", 200, 200));

    let order: Vec<_> = store.layers().map(|l| l.id).collect();
    assert_eq!(order, vec![first, second]);

    // Both sit at the default offset; the second paints on top and wins hits.
    assert_eq!(store.layer_at(Point::new(100.0, 100.0)), Some(second));
}

#[test]
fn test_select_first_and_delete() {
    let mut store = LayerStore::new();
    let first = store.add_layer(dropped("first.png", 200, 200));
    let second = store.add_layer(dropped("second.png", 200, 200));

    store.select(Some(first));
    let selected = store.selected().expect("selection");
    store.remove_layer(selected);

    assert_eq!(store.len(), 1);
    assert_eq!(store.selected(), None);
    assert!(store.get(second).is_some());
}

// ============================================================================
// Stage + store
// ============================================================================

#[test]
fn test_drag_selects_bottom_layer_when_uncovered() {
    let mut store = LayerStore::new();
    let bottom = store.add_layer(dropped("bottom.png", 300, 300));
    let top = store.add_layer(dropped("top.png", 50, 50));
    let mut stage = StageInteraction::default();

    // (300, 300) is inside the bottom layer only.
    stage.pointer_down(&mut store, Point::new(300.0, 300.0));
    assert_eq!(store.selected(), Some(bottom));
    stage.pointer_move(Point::new(310.0, 320.0));
    let committed = stage.pointer_up(&mut store).expect("commit");

    assert_eq!(committed.0, bottom);
    let moved = store.get(bottom).expect("bottom");
    assert_eq!((moved.x, moved.y), (60.0, 70.0));
    assert_eq!(store.get(top).expect("top").x, 50.0);
}

#[test]
fn test_transform_commit_is_single_update() {
    let mut store = LayerStore::new();
    let id = store.add_layer(dropped("a.png", 100, 100));
    let mut stage = StageInteraction::default();

    // Bottom-right corner of a 100x100 layer at (50, 50).
    stage.pointer_down(&mut store, Point::new(150.0, 150.0));
    for step in 1..=10u8 {
        let d = f32::from(step) * 5.0;
        stage.pointer_move(Point::new(150.0 + d, 150.0 + d));
        assert_eq!(store.get(id).expect("layer").scale_x, 1.0);
    }
    let (_, patch) = stage.pointer_up(&mut store).expect("commit");

    assert_eq!(patch.scale_x, Some(1.5));
    assert_eq!(patch.scale_y, Some(1.5));
    assert!(patch.source.is_none());
}

#[test]
fn test_reducer_replays_to_same_state() {
    let a = dropped("a.png", 10, 10);
    let b = dropped("b.png", 10, 10);
    let (a_id, b_id) = (a.id, b.id);
    let actions = vec![
        StoreAction::Add(a),
        StoreAction::Add(b),
        StoreAction::Update {
            id: a_id,
            patch: LayerPatch::position(1.0, 2.0),
        },
        StoreAction::Select(Some(a_id)),
        StoreAction::Remove(b_id),
    ];

    let replayed = actions
        .clone()
        .into_iter()
        .fold(LayerStore::new(), LayerStore::reduce);
    let mut in_place = LayerStore::new();
    for action in actions {
        in_place.apply(action);
    }

    assert_eq!(replayed, in_place);
    assert_eq!(replayed.selected(), Some(a_id));
    assert_eq!(replayed.len(), 1);
}
