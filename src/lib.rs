//! signboard-renderer: Editing and export engine for transit wayfinding signs
//!
//! A sign is an ordered strip of pictograms, line badges, color bands and
//! bilingual text, laid out left to right at a fixed height of 150 units.
//! This crate models that strip, applies the category-dependent spacing
//! rules between neighbors, and exports the result as a JPEG or a single
//! merged SVG whose geometry matches the on-screen layout.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use signboard_renderer::{Editor, ExportFormat, FontResource, MemoryAssets};
//!
//! let assets = MemoryAssets::new()
//!     .with("line@01.svg", r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 150 150"/>"#)
//!     .with("sub@03.svg", r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 30 150"/>"#);
//! let font = FontResource::from_bytes(b"\0\x01\0\0".to_vec()).unwrap();
//! let mut editor = Editor::new(Arc::new(assets), font);
//!
//! editor.add_file("line@01.svg").unwrap();
//! editor.add_file("sub@03.svg").unwrap();
//! editor.add_file("line@01.svg").unwrap();
//!
//! // Bands join their neighbors without a gap.
//! let canvas = editor.canvas();
//! assert_eq!(canvas.total_width, 25.0 + 150.0 + 30.0 + 150.0 + 25.0);
//!
//! let job = editor.begin_export().unwrap();
//! let svg = job.render(ExportFormat::Svg).unwrap();
//! assert_eq!(svg.mime, "image/svg+xml");
//! ```
//!
//! # Configuration Documents
//!
//! The sequence can be saved to and loaded from a portable JSON document
//! with the [`Configurable`] trait or the free functions:
//!
//! ```
//! use signboard_renderer::{BlobRegistry, IconRef, Sequence, export_config, import_config};
//!
//! let blobs = BlobRegistry::new();
//! let seq = Sequence::from_items([IconRef::new("way@01.svg").unwrap()]);
//! let json = export_config(&seq, &blobs).unwrap();
//! assert_eq!(import_config(&json, &blobs).unwrap(), seq);
//! ```

mod asset;
mod category;
mod config;
mod drag;
mod editor;
mod export;
mod font;
mod generate;
mod history;
mod layout;
mod sequence;
mod spacing;
mod store;
mod svg;

pub use asset::{
    AssetError, AssetResolver, AssetSource, Blob, BlobRegistry, DirAssets, MemoryAssets,
    SVG_MIME, is_blob_url, is_data_url,
};
pub use category::{BandRole, Category, CategoryTraits, Glyph};
pub use config::{
    CONFIG_VERSION, CanvasConfig, ConfigError, ItemRecord, export_config, import_config,
};
pub use drag::{DragError, DragSession, DragSource, DragState, insertion_point};
pub use editor::{Configurable, Editor, EditorError};
pub use export::{
    CANVAS_BACKGROUND, ExportArtifact, ExportError, ExportFormat, ExportGuard, ExportJob,
    ExportOptions, JPEG_QUALITY, RASTER_SCALE, render_raster, render_vector,
};
pub use font::{
    CN_FONT_FAMILY, EN_FONT_FAMILY, FontError, FontResource, FontSpec, HeuristicMeasurer,
    TextMeasurer,
};
pub use generate::{
    BandSide, ContentGenerator, ErrorCode, ErrorDetails, Generated, GenerationError,
    normalize_color,
};
pub use history::History;
pub use layout::{
    AspectCache, EDGE_MARGIN, FALLBACK_ASPECT, Geometry, HitBox, RENDER_HEIGHT, Rect, Slot,
};
pub use sequence::{
    Alignment, CustomContent, Direction, IconId, IconRef, InsertionPoint, InvalidCustomization,
    Sequence, TextContent,
};
pub use spacing::{
    BAND_EXIT_GAP, BAND_TEXT_GAP, DEFAULT_GAP, DOT_GAP, NUMERAL_GAP, SpacingEngine, SpacingRule,
    spacing,
};
pub use store::{STORE_FILE, SequenceStore, StoreError};
pub use svg::{SvgError, SvgFragment, ViewBox, aspect_ratio, parse_view_box};
