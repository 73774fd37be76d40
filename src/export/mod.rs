//! Export compositors.
//!
//! Both compositors re-derive the canvas geometry from the sequence with
//! [`Geometry::compute`], so an exported file matches the on-screen layout.
//! Elements whose content cannot be loaded are skipped with a warning; their
//! slot is still reserved so the remaining elements do not shift.
//!
//! An export works on a snapshot of the sequence taken when it starts. The
//! [`ExportGuard`] held by an [`ExportJob`] refuses a second export (and, in
//! the editor, any mutation) until the job is dropped.

mod raster;
mod vector;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use palette::Srgb;
use resvg::usvg;

use crate::asset::AssetResolver;
use crate::font::FontResource;
use crate::layout::{AspectCache, FALLBACK_ASPECT, Geometry};
use crate::sequence::{IconRef, Sequence};
use crate::spacing::{DEFAULT_GAP, SpacingEngine};
use crate::svg;

pub use raster::render_raster;
pub use vector::render_vector;

/// Fill behind all elements.
pub const CANVAS_BACKGROUND: &str = "#001D31";

/// Default oversampling factor for raster exports.
pub const RASTER_SCALE: f32 = 4.0;

/// Default JPEG quality (0-100).
pub const JPEG_QUALITY: u8 = 95;

/// Errors raised by the export compositors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("the canvas has no elements to export")]
    EmptyCanvas,
    #[error("fonts are still loading, try again shortly")]
    FontNotReady,
    #[error("an export is already in progress")]
    ExportInProgress,
    #[error("invalid background color: {0}")]
    InvalidBackground(String),
    #[error("invalid export scale: {0}")]
    InvalidScale(f32),
    #[error("failed to allocate a {width}x{height} canvas")]
    PixmapAlloc { width: u32, height: u32 },
    #[error("failed to encode JPEG: {0}")]
    JpegEncode(#[from] image::ImageError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Options and artifacts
// ============================================================================

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ExportFormat {
    #[default]
    Jpg,
    Svg,
}

/// Tunables for an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Raster oversampling factor. Vector output is always at scale 1.
    pub scale: f32,
    pub jpeg_quality: u8,
    pub background: String,
    pub default_gap: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scale: RASTER_SCALE,
            jpeg_quality: JPEG_QUALITY,
            background: CANVAS_BACKGROUND.to_string(),
            default_gap: DEFAULT_GAP,
        }
    }
}

impl ExportOptions {
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    pub fn spacing(&self) -> SpacingEngine {
        SpacingEngine::new(self.default_gap)
    }

    pub(crate) fn background_rgb(&self) -> Result<Srgb<u8>, ExportError> {
        Srgb::<u8>::from_str(self.background.trim())
            .map_err(|_| ExportError::InvalidBackground(self.background.clone()))
    }
}

/// A finished export, ready to be saved or handed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Writes the artifact into `dir` under its file name.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), bytes = self.bytes.len(), "export saved");
        Ok(path)
    }
}

// ============================================================================
// Shared resolution
// ============================================================================

/// An element with its markup loaded and aspect ratio decided.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedItem {
    pub markup: Option<String>,
    pub ratio: f32,
}

/// Loads every element's markup. Failures are logged and leave `markup`
/// empty; the ratio then comes from `cache`, or falls back to square.
pub(crate) fn resolve_items(
    items: &[IconRef],
    resolver: &AssetResolver,
    cache: Option<&AspectCache>,
) -> Vec<ResolvedItem> {
    items
        .iter()
        .map(|icon| {
            let source = icon.render_source();
            let markup = resolver
                .load_svg(source)
                .map_err(|err| {
                    tracing::warn!(id = %icon.id(), %source, %err, "skipping element that failed to load");
                })
                .ok();
            let ratio = markup
                .as_deref()
                .and_then(svg::aspect_ratio)
                .or_else(|| cache.and_then(|c| c.get(source)))
                .unwrap_or(FALLBACK_ASPECT);
            ResolvedItem { markup, ratio }
        })
        .collect()
}

/// Computes the export geometry for `items` at `scale`.
pub(crate) fn export_geometry(
    items: &[IconRef],
    resolved: &[ResolvedItem],
    options: &ExportOptions,
    scale: f32,
) -> Geometry {
    let ratios: Vec<f32> = resolved.iter().map(|item| item.ratio).collect();
    Geometry::compute(items, &ratios, &options.spacing(), scale)
}

fn check_preconditions(items: &[IconRef], font: &FontResource) -> Result<(), ExportError> {
    if items.is_empty() {
        return Err(ExportError::EmptyCanvas);
    }
    if !font.is_ready() {
        return Err(ExportError::FontNotReady);
    }
    Ok(())
}

// ============================================================================
// Guard and job
// ============================================================================

/// Holds the export-in-progress flag for as long as it lives.
#[derive(Debug)]
pub struct ExportGuard {
    flag: Arc<AtomicBool>,
}

impl ExportGuard {
    /// Raises `flag`, failing if it is already raised.
    pub fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, ExportError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExportError::ExportInProgress)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A started export over a snapshot of the sequence.
pub struct ExportJob {
    snapshot: Sequence,
    resolver: AssetResolver,
    font: FontResource,
    ratios: AspectCache,
    options: ExportOptions,
    /// Font database for rasterizing, loaded on the first raster render.
    render_options: OnceLock<usvg::Options<'static>>,
    _guard: ExportGuard,
}

impl std::fmt::Debug for ExportJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportJob")
            .field("items", &self.snapshot.len())
            .field("options", &self.options)
            .field("fonts_loaded", &self.render_options.get().is_some())
            .finish_non_exhaustive()
    }
}

impl ExportJob {
    /// Validates preconditions and takes the guard.
    ///
    /// Fails with [`ExportError::ExportInProgress`] if another job holds
    /// `flag`, and with the precondition errors before any work is done.
    pub fn start(
        flag: &Arc<AtomicBool>,
        snapshot: Sequence,
        resolver: AssetResolver,
        font: FontResource,
        ratios: AspectCache,
        options: ExportOptions,
    ) -> Result<Self, ExportError> {
        let guard = ExportGuard::acquire(flag)?;
        check_preconditions(snapshot.items(), &font)?;
        tracing::info!(items = snapshot.len(), "export started");
        Ok(Self {
            snapshot,
            resolver,
            font,
            ratios,
            options,
            render_options: OnceLock::new(),
            _guard: guard,
        })
    }

    pub fn snapshot(&self) -> &Sequence {
        &self.snapshot
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Renders the snapshot as a JPEG.
    pub fn raster(&self) -> Result<ExportArtifact, ExportError> {
        let opt = self
            .render_options
            .get_or_init(|| svg::render_options(self.font.data()));
        raster::compose(
            self.snapshot.items(),
            &self.resolver,
            &self.font,
            Some(&self.ratios),
            opt,
            &self.options,
        )
    }

    /// Renders the snapshot as a merged SVG document.
    pub fn vector(&self) -> Result<ExportArtifact, ExportError> {
        vector::compose(
            self.snapshot.items(),
            &self.resolver,
            &self.font,
            Some(&self.ratios),
            &self.options,
        )
    }

    pub fn render(&self, format: ExportFormat) -> Result<ExportArtifact, ExportError> {
        match format {
            ExportFormat::Jpg => self.raster(),
            ExportFormat::Svg => self.vector(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
