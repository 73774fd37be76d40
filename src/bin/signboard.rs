//! # signboard
//!
//! Command-line export of sign configurations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use signboard_renderer::{
    DEFAULT_GAP, DirAssets, Editor, ExportFormat, ExportOptions, FontResource, RASTER_SCALE,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "signboard", version, about = "Render transit sign configurations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a configuration to a JPEG or SVG file.
    Export(ExportArgs),
    /// Print the computed placement of every element.
    Layout(Source),
}

#[derive(Debug, Args)]
struct Source {
    /// Configuration document exported by the editor.
    #[arg(long)]
    config: PathBuf,

    /// Directory containing the static SVG assets.
    #[arg(long)]
    assets: PathBuf,

    /// Gap between elements when no spacing rule applies.
    #[arg(long, default_value_t = DEFAULT_GAP)]
    gap: f32,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    source: Source,

    /// Font used for Chinese text. Export is refused until one is loaded.
    #[arg(long)]
    font: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ExportFormat::Jpg)]
    format: ExportFormat,

    /// Raster oversampling factor.
    #[arg(long, default_value_t = RASTER_SCALE)]
    scale: f32,

    /// Output directory.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signboard_renderer=info,signboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Export(args) => export(args),
        Command::Layout(source) => layout(source),
    }
}

fn open(source: &Source, font: FontResource) -> anyhow::Result<Editor> {
    let json = std::fs::read_to_string(&source.config)
        .with_context(|| format!("failed to read {}", source.config.display()))?;
    let options = ExportOptions {
        default_gap: source.gap,
        ..ExportOptions::default()
    };
    let mut editor = Editor::new(Arc::new(DirAssets::new(source.assets.clone())), font)
        .with_export_options(options);
    editor
        .import_config_json(&json)
        .with_context(|| format!("failed to load {}", source.config.display()))?;
    tracing::info!(items = editor.sequence().len(), "configuration loaded");
    Ok(editor)
}

fn export(args: ExportArgs) -> anyhow::Result<()> {
    let font = FontResource::new();
    match &args.font {
        Some(path) => font
            .load_file(path)
            .with_context(|| format!("failed to load font {}", path.display()))?,
        None => tracing::warn!("no font given; the export will report it as not ready"),
    }

    let mut editor = open(&args.source, font)?;
    let options = editor.export_options().clone().with_scale(args.scale);
    editor.set_export_options(options);

    let job = editor.begin_export()?;
    let artifact = job.render(args.format)?;
    let path = artifact.save_to(&args.out)?;
    println!("{}", path.display());
    Ok(())
}

fn layout(source: Source) -> anyhow::Result<()> {
    let mut editor = open(&source, FontResource::new())?;
    let canvas = editor.canvas();

    println!("{:>3}  {:<32} {:>9} {:>9} {:>6}", "#", "file", "x", "width", "gap");
    for (index, (icon, slot)) in editor
        .sequence()
        .iter()
        .zip(&canvas.slots)
        .enumerate()
    {
        println!(
            "{index:>3}  {:<32} {:>9.2} {:>9.2} {:>6.1}",
            icon.file(),
            slot.rect.x,
            slot.rect.width,
            slot.gap_after
        );
    }
    println!("total width: {:.2}", canvas.total_width);
    Ok(())
}
