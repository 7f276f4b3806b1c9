//! Layer store - the ordered layer collection and its selection cursor.
//!
//! All mutation goes through [`StoreAction`], either applied in place with
//! [`LayerStore::apply`] or as a pure transition with [`LayerStore::reduce`].
//! The convenience methods are thin wrappers over the same dispatch.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::layer::{Layer, LayerId, LayerPatch, SourceKey};
use crate::{CoreError, CoreResult};

/// A mutation of the layer store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    /// Append a layer on top and select it if visible. A layer whose ID is
    /// already in the store is ignored.
    Add(Layer),
    /// Merge attributes into a layer; no-op for unknown IDs.
    Update {
        /// Target layer.
        id: LayerId,
        /// Attributes to merge.
        patch: LayerPatch,
    },
    /// Remove a layer, clearing the selection if it was selected.
    Remove(LayerId),
    /// Move the selection cursor.
    Select(Option<LayerId>),
}

/// Ordered layers plus a single-selection cursor.
///
/// Iteration order is paint order: the last layer paints on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerStore {
    layers: Vec<Layer>,
    selected: Option<LayerId>,
    /// Next z-index to hand out. Never reused, never compacted.
    next_z: u64,
}

impl LayerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure transition: consume the store, apply `action`, return the result.
    #[must_use]
    pub fn reduce(mut self, action: StoreAction) -> Self {
        self.apply(action);
        self
    }

    /// Apply an action in place.
    pub fn apply(&mut self, action: StoreAction) {
        match action {
            StoreAction::Add(mut layer) => {
                let id = layer.id;
                if self.get(id).is_some() {
                    tracing::debug!("Ignoring add of duplicate layer {id}");
                    return;
                }
                layer.z_index = self.next_z;
                self.next_z += 1;
                tracing::debug!("Adding layer {id} ({}) at z {}", layer.name, layer.z_index);
                let visible = layer.visible;
                self.layers.push(layer);
                if visible {
                    self.selected = Some(id);
                }
            }
            StoreAction::Update { id, patch } => {
                let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) else {
                    tracing::debug!("Ignoring update for unknown layer {id}");
                    return;
                };
                layer.apply(&patch);
                if !layer.visible && self.selected == Some(id) {
                    self.selected = None;
                }
            }
            StoreAction::Remove(id) => {
                let before = self.layers.len();
                self.layers.retain(|l| l.id != id);
                if self.layers.len() != before {
                    tracing::debug!("Removed layer {id}");
                }
                if self.selected == Some(id) {
                    self.selected = None;
                }
            }
            StoreAction::Select(target) => {
                self.selected = match target {
                    Some(id) if self.is_selectable(id) => Some(id),
                    Some(id) => {
                        tracing::warn!("Refusing to select missing or hidden layer {id}");
                        None
                    }
                    None => None,
                };
            }
        }
    }

    /// Append a layer on top of the stack and select it if visible.
    ///
    /// Adding an ID that is already present leaves the store unchanged.
    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id;
        self.apply(StoreAction::Add(layer));
        id
    }

    /// Merge `patch` into the matching layer. Unknown IDs are ignored.
    pub fn update_layer(&mut self, id: LayerId, patch: LayerPatch) {
        self.apply(StoreAction::Update { id, patch });
    }

    /// Remove a layer and return it, clearing the selection if needed.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let removed = self.get(id).cloned();
        self.apply(StoreAction::Remove(id));
        removed
    }

    /// Set or clear the selection.
    pub fn select(&mut self, id: Option<LayerId>) {
        self.apply(StoreAction::Select(id));
    }

    /// Currently selected layer ID.
    #[must_use]
    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    /// Currently selected layer.
    #[must_use]
    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Get a layer by ID.
    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layers in paint order (bottom first).
    pub fn layers(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Visible layers in paint order.
    pub fn visible_layers(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.visible)
    }

    /// Layers as a layer panel lists them (top-most first).
    pub fn panel_order(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().rev()
    }

    /// Top-most visible layer under a stage point.
    #[must_use]
    pub fn layer_at(&self, point: Point) -> Option<LayerId> {
        self.visible_layers()
            .rev()
            .find(|l| l.bounding_box().contains(point))
            .map(|l| l.id)
    }

    /// Whether any layer still references `source`.
    #[must_use]
    pub fn references_source(&self, source: SourceKey) -> bool {
        self.layers.iter().any(|l| l.source == source)
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the store holds no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Serialize the store to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(CoreError::Serialization)
    }

    /// Restore a store from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, two layers share an ID, or
    /// the selection points at a layer that is missing or hidden.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut store: Self = serde_json::from_str(json)?;
        let mut seen = HashSet::with_capacity(store.layers.len());
        if let Some(dup) = store.layers.iter().find(|l| !seen.insert(l.id)) {
            return Err(CoreError::InvalidState(format!("duplicate layer {}", dup.id)));
        }
        if let Some(id) = store.selected {
            if !store.is_selectable(id) {
                return Err(CoreError::LayerNotFound(id.to_string()));
            }
        }
        let floor = store.layers.iter().map(|l| l.z_index + 1).max().unwrap_or(0);
        store.next_z = store.next_z.max(floor);
        Ok(store)
    }

    fn is_selectable(&self, id: LayerId) -> bool {
        self.get(id).is_some_and(|l| l.visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelSize;

    fn layer(name: &str) -> Layer {
        Layer::new(SourceKey::new(), PixelSize::new(100, 100), name)
    }

    #[test]
    fn test_add_selects_and_stacks() {
        let mut store = LayerStore::new();
        let a = store.add_layer(layer("a"));
        let b = store.add_layer(layer("b"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.selected(), Some(b));
        let order: Vec<_> = store.layers().map(|l| l.id).collect();
        assert_eq!(order, vec![a, b]);
        assert!(store.get(a).expect("a").z_index < store.get(b).expect("b").z_index);
    }

    #[test]
    fn test_add_then_remove_restores_content() {
        let mut store = LayerStore::new();
        store.add_layer(layer("keep"));
        store.select(None);
        let before: Vec<_> = store.layers().cloned().collect();

        let id = store.add_layer(layer("temp"));
        store.remove_layer(id);

        let after: Vec<_> = store.layers().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn test_remove_unselected_keeps_selection() {
        let mut store = LayerStore::new();
        let a = store.add_layer(layer("a"));
        let b = store.add_layer(layer("b"));
        store.remove_layer(a);
        assert_eq!(store.selected(), Some(b));
    }

    #[test]
    fn test_z_index_not_renumbered() {
        let mut store = LayerStore::new();
        let a = store.add_layer(layer("a"));
        store.add_layer(layer("b"));
        store.remove_layer(a);
        let c = store.add_layer(layer("c"));
        assert_eq!(store.get(c).expect("c").z_index, 2);
    }

    #[test]
    fn test_update_unknown_is_noop() {
        let mut store = LayerStore::new();
        store.add_layer(layer("a"));
        let snapshot = store.clone();
        store.update_layer(LayerId::new(), LayerPatch::position(1.0, 1.0));
        assert_eq!(store, snapshot);
    }

    #[test]
    fn test_hiding_selected_clears_selection() {
        let mut store = LayerStore::new();
        let a = store.add_layer(layer("a"));
        store.update_layer(a, LayerPatch::visibility(false));
        assert_eq!(store.selected(), None);

        store.select(Some(a));
        assert_eq!(store.selected(), None, "hidden layers are not selectable");
    }

    #[test]
    fn test_layer_at_prefers_topmost_visible() {
        let mut store = LayerStore::new();
        let bottom = store.add_layer(layer("bottom"));
        let top = store.add_layer(layer("top"));
        let inside = Point::new(60.0, 60.0);

        assert_eq!(store.layer_at(inside), Some(top));
        store.update_layer(top, LayerPatch::visibility(false));
        assert_eq!(store.layer_at(inside), Some(bottom));
        assert_eq!(store.layer_at(Point::new(1.0, 1.0)), None);
    }

    #[test]
    fn test_reduce_is_pure_transition() {
        let a = layer("a");
        let id = a.id;
        let store = LayerStore::new()
            .reduce(StoreAction::Add(a))
            .reduce(StoreAction::Update {
                id,
                patch: LayerPatch::position(10.0, 20.0),
            })
            .reduce(StoreAction::Select(None));

        let layer = store.get(id).expect("layer");
        assert_eq!((layer.x, layer.y), (10.0, 20.0));
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn test_json_round_trip_keeps_counter() {
        let mut store = LayerStore::new();
        let a = store.add_layer(layer("a"));
        store.add_layer(layer("b"));
        store.remove_layer(a);

        let json = store.to_json().expect("serialize");
        let mut restored = LayerStore::from_json(&json).expect("deserialize");
        assert_eq!(restored, store);

        let c = restored.add_layer(layer("c"));
        assert_eq!(restored.get(c).expect("c").z_index, 2);
    }

    #[test]
    fn test_duplicate_add_is_ignored() {
        let mut store = LayerStore::new();
        let original = layer("a");
        let id = store.add_layer(original.clone());
        let other = store.add_layer(layer("b"));
        let snapshot = store.clone();

        assert_eq!(store.add_layer(original), id);
        assert_eq!(store, snapshot);
        assert_eq!(store.len(), 2);
        assert_eq!(store.selected(), Some(other));
    }

    #[test]
    fn test_hidden_add_is_not_selected() {
        let mut store = LayerStore::new();
        let shown = store.add_layer(layer("shown"));
        let mut hidden = layer("hidden");
        hidden.visible = false;
        let hidden = store.add_layer(hidden);

        assert!(store.get(hidden).is_some());
        assert_eq!(store.selected(), Some(shown));
    }

    #[test]
    fn test_from_json_rejects_duplicate_ids() {
        let mut store = LayerStore::new();
        store.add_layer(layer("a"));
        let mut value: serde_json::Value =
            serde_json::from_str(&store.to_json().expect("serialize")).expect("value");
        let layers = value["layers"].as_array_mut().expect("layers");
        let copy = layers[0].clone();
        layers.push(copy);

        let err = LayerStore::from_json(&value.to_string()).expect_err("duplicate");
        assert!(matches!(err, CoreError::InvalidState(_)), "{err}");
    }

    #[test]
    fn test_panel_order_is_top_first() {
        let mut store = LayerStore::new();
        let a = store.add_layer(layer("a"));
        let b = store.add_layer(layer("b"));
        let panel: Vec<_> = store.panel_order().map(|l| l.id).collect();
        assert_eq!(panel, vec![b, a]);
    }
}
