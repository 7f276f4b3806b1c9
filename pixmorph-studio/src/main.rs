//! # PixMorph
//!
//! Headless host for the PixMorph studio controllers.

use clap::Parser;
use pixmorph_core::EditMode;
use pixmorph_studio::config::{AiEditArgs, ComposeArgs, ResizeArgs};
use pixmorph_studio::{
    ai_editor_from_config, background_remover_from_config, CliArgs, Command,
    CompositionController, DroppedFile, SingleImageEditor, StudioConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with env-filter and optional JSON format.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pixmorph_studio=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    // Use JSON format in production (RUST_LOG_FORMAT=json)
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let config = StudioConfig::from(&args);
    tracing::info!(
        "Starting PixMorph v{} (stage {}x{})",
        env!("CARGO_PKG_VERSION"),
        config.stage.width,
        config.stage.height
    );

    match args.command {
        Command::Resize(cmd) => resize(&config, cmd).await,
        Command::AiEdit(cmd) => ai_edit(&config, cmd).await,
        Command::Compose(cmd) => compose(&config, cmd).await,
    }
}

async fn resize(config: &StudioConfig, cmd: ResizeArgs) -> anyhow::Result<()> {
    let edits = cmd.dimension_edits()?;
    let mut editor = SingleImageEditor::new(ai_editor_from_config(config)?);
    let file = DroppedFile::read(&cmd.input).await?;
    editor.upload(&file)?;

    editor.set_mode(EditMode::Local)?;
    editor.set_aspect_lock(!cmd.unlock_aspect)?;
    editor.set_quality(cmd.quality)?;
    editor.set_format(cmd.format)?;
    for (side, value) in edits {
        editor.set_dimension(side, value)?;
    }

    editor.apply_local()?;
    let download = editor.download()?;
    let path = download.save_to(&cmd.out_dir).await?;
    println!(
        "{} ({}, {})",
        path.display(),
        editor.options().size(),
        editor.processed_file_size().unwrap_or_default()
    );
    Ok(())
}

async fn ai_edit(config: &StudioConfig, cmd: AiEditArgs) -> anyhow::Result<()> {
    let mut editor = SingleImageEditor::new(ai_editor_from_config(config)?);
    let file = DroppedFile::read(&cmd.input).await?;
    editor.upload(&file)?;

    editor.set_mode(EditMode::Ai)?;
    editor.set_format(cmd.format)?;
    let size = editor.ai_edit(&cmd.prompt).await?;

    let download = editor.download()?;
    let path = download.save_to(&cmd.out_dir).await?;
    println!("{} ({size})", path.display());
    Ok(())
}

async fn compose(config: &StudioConfig, cmd: ComposeArgs) -> anyhow::Result<()> {
    let mut controller = CompositionController::new(
        config,
        ai_editor_from_config(config)?,
        background_remover_from_config(config)?,
    );

    let mut files = Vec::with_capacity(cmd.inputs.len());
    for input in &cmd.inputs {
        files.push(DroppedFile::read(input).await?);
    }
    let added = controller.ingest_drop(&files);
    tracing::info!("Added {} of {} file(s) as layers", added.len(), files.len());

    for message in &cmd.messages {
        if let Err(e) = controller.send_chat(message, &[]).await {
            tracing::warn!("Chat message {message:?} failed: {e}");
        }
    }
    for entry in controller.transcript() {
        println!("{:?}: {}", entry.role, entry.text);
    }

    let download = controller.export()?;
    let path = download.save_to(&cmd.out_dir).await?;
    println!("{}", path.display());

    if cmd.snapshot {
        let snapshot_path = cmd.out_dir.join("composition.json");
        tokio::fs::write(&snapshot_path, controller.snapshot()?).await?;
        println!("{}", snapshot_path.display());
    }
    Ok(())
}
