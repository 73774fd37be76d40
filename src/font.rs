//! Font data ownership and text measurement.
//!
//! [`FontResource`] holds the Chinese label font that generated text elements
//! and the vector export embed. It starts out empty and is filled once, either
//! eagerly or by a background loader; operations that need it check
//! [`FontResource::is_ready`] first.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use unicode_width::UnicodeWidthChar;

/// Family name the generated markup uses for the Chinese label font.
pub const CN_FONT_FAMILY: &str = "SourceHanSansSC";

/// Family list used for the English label line.
pub const EN_FONT_FAMILY: &str = "'Arial-Bold', Arial";

/// Errors raised while loading font data.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("font data has already been loaded")]
    AlreadyLoaded,
    #[error("font data is empty")]
    Empty,
    #[error("failed to read font file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// FontResource
// ============================================================================

/// Lazily initialized font bytes.
///
/// Clones share the same slot, so a loader can fill a clone while the owner
/// keeps polling [`is_ready`](Self::is_ready).
#[derive(Debug, Clone, Default)]
pub struct FontResource {
    data: Arc<OnceLock<Arc<[u8]>>>,
}

impl FontResource {
    /// Creates a resource in the not-ready state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resource that is ready immediately.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self, FontError> {
        let font = Self::new();
        font.set(bytes)?;
        Ok(font)
    }

    /// Fills the resource. Fails if it was already filled.
    pub fn set(&self, bytes: impl Into<Arc<[u8]>>) -> Result<(), FontError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(FontError::Empty);
        }
        let len = bytes.len();
        self.data.set(bytes).map_err(|_| FontError::AlreadyLoaded)?;
        tracing::debug!(bytes = len, "font data ready");
        Ok(())
    }

    /// Reads a font file from disk into the resource.
    pub fn load_file(&self, path: &Path) -> Result<(), FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.set(bytes)
    }

    pub fn is_ready(&self) -> bool {
        self.data.get().is_some()
    }

    /// Returns the font bytes, or `None` while not ready.
    pub fn data(&self) -> Option<Arc<[u8]>> {
        self.data.get().cloned()
    }

    /// MIME type sniffed from the font header.
    pub fn mime(&self) -> Option<&'static str> {
        self.data.get().map(|data| sniff_mime(data))
    }

    /// Returns a `data:` URL suitable for an `@font-face` `src`.
    pub fn to_data_url(&self) -> Option<String> {
        let data = self.data.get()?;
        Some(format!(
            "data:{};base64,{}",
            sniff_mime(data),
            BASE64.encode(data)
        ))
    }
}

fn sniff_mime(data: &[u8]) -> &'static str {
    match data.get(..4) {
        Some(b"wOF2") => "font/woff2",
        Some(b"wOFF") => "font/woff",
        Some(b"OTTO") => "font/otf",
        _ => "font/ttf",
    }
}

/// Builds the `<style>` block declaring the embedded label font.
pub(crate) fn font_face_css(font: &FontResource) -> Option<String> {
    let url = font.to_data_url()?;
    Some(format!(
        "@font-face {{ font-family: '{CN_FONT_FAMILY}'; src: url('{url}'); font-weight: 500; }}"
    ))
}

// ============================================================================
// Text measurement
// ============================================================================

/// Font selection used when measuring a text run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub family: &'static str,
    pub weight: u16,
    pub size: f32,
}

impl FontSpec {
    pub const fn new(family: &'static str, weight: u16, size: f32) -> Self {
        Self {
            family,
            weight,
            size,
        }
    }
}

/// Measures the horizontal advance of a run of text.
pub trait TextMeasurer {
    /// Returns the advance width of `text` in logical units.
    fn measure(&self, text: &str, font: &FontSpec) -> f32;
}

/// Font-independent measurer based on per-character advance estimates.
///
/// Wide (CJK) characters advance by one em. Narrow characters use a small
/// table tuned for bold sans-serif Latin text.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicMeasurer {
    /// Multiplier applied to narrow-character advances for weights of 600
    /// and above.
    pub bold_factor: f32,
}

impl Default for HeuristicMeasurer {
    fn default() -> Self {
        Self { bold_factor: 1.06 }
    }
}

impl HeuristicMeasurer {
    fn narrow_advance(c: char) -> f32 {
        match c {
            ' ' => 0.278,
            'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.278,
            'f' | 't' | 'r' | 'I' | '(' | ')' | '-' | '/' => 0.333,
            'm' | 'M' => 0.833,
            'w' => 0.722,
            'W' => 0.944,
            '0'..='9' => 0.556,
            c if c.is_ascii_uppercase() => 0.667,
            _ => 0.556,
        }
    }
}

impl TextMeasurer for HeuristicMeasurer {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        let bold = if font.weight >= 600 {
            self.bold_factor
        } else {
            1.0
        };
        let ems: f32 = text
            .chars()
            .map(|c| match c.width() {
                Some(2) => 1.0,
                Some(0) | None => 0.0,
                _ => Self::narrow_advance(c) * bold,
            })
            .sum();
        ems * font.size
    }
}

// ============================================================================
// Tests
// ============================================================================
