//! Asset loading and transient blob storage.
//!
//! Static pictograms are loaded by name through an [`AssetSource`]. Generated
//! or imported content lives in a [`BlobRegistry`] under `blob:` URLs that are
//! only valid for the lifetime of the registry. [`AssetResolver`] combines the
//! two so callers can load whatever an element's render source points at.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use uuid::Uuid;

/// MIME type of every pictogram and generated element.
pub const SVG_MIME: &str = "image/svg+xml";

/// Errors raised while loading element content.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("invalid asset name: {0}")]
    InvalidName(String),
    #[error("transient content is no longer available: {0}")]
    BlobRevoked(String),
    #[error("malformed data URL: {0}")]
    DataUrl(String),
    #[error("content is not valid UTF-8: {0}")]
    Encoding(String),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// AssetSource
// ============================================================================

/// A provider of static pictogram files.
pub trait AssetSource: Send + Sync {
    /// Loads the raw bytes of the named asset.
    fn load(&self, name: &str) -> Result<Vec<u8>, AssetError>;
}

/// Assets read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirAssets {
    fn load(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let name = name.trim_start_matches("./");
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(AssetError::InvalidName(name.to_string()));
        }
        let path = self.root.join(name);
        std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound(name.to_string())
            } else {
                AssetError::Io { path, source }
            }
        })
    }
}

/// Assets held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an asset.
    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), data.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }
}

impl AssetSource for MemoryAssets {
    fn load(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let name = name.trim_start_matches("./");
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }
}

// ============================================================================
// BlobRegistry
// ============================================================================

/// Transient binary content with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Arc<[u8]>,
    pub mime: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    pub fn svg(markup: &str) -> Self {
        Self::new(markup.as_bytes(), SVG_MIME)
    }

    /// Encodes this blob as a base64 `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }

    /// Decodes a `data:` URL.
    pub fn from_data_url(url: &str) -> Result<Self, AssetError> {
        let malformed = || AssetError::DataUrl(truncate(url, 48));
        let rest = url.strip_prefix("data:").ok_or_else(malformed)?;
        let (header, payload) = rest.split_once(',').ok_or_else(malformed)?;

        let (mime, is_base64) = match header.strip_suffix(";base64") {
            Some(mime) => (mime, true),
            None => (header, false),
        };
        let mime = if mime.is_empty() { "text/plain" } else { mime };

        let bytes = if is_base64 {
            BASE64.decode(payload.trim()).map_err(|_| malformed())?
        } else {
            payload.as_bytes().to_vec()
        };
        Ok(Self::new(bytes, mime))
    }
}

/// Shared store of transient content addressed by `blob:` URLs.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    blobs: Arc<RwLock<HashMap<String, Blob>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a blob and returns a fresh `blob:` URL for it.
    pub fn register(&self, blob: Blob) -> String {
        let url = format!("blob:{}", Uuid::new_v4());
        self.blobs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(url.clone(), blob);
        url
    }

    /// Returns the blob behind `url`, if it is still registered.
    pub fn get(&self, url: &str) -> Option<Blob> {
        self.blobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    /// Drops a blob. Returns true if it was registered.
    pub fn revoke(&self, url: &str) -> bool {
        self.blobs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(url)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns true for URLs that point into a [`BlobRegistry`].
pub fn is_blob_url(url: &str) -> bool {
    url.starts_with("blob:")
}

/// Returns true for inline `data:` URLs.
pub fn is_data_url(url: &str) -> bool {
    url.starts_with("data:")
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

// ============================================================================
// AssetResolver
// ============================================================================

/// Loads element content from static assets, blobs, or data URLs.
#[derive(Clone)]
pub struct AssetResolver {
    assets: Arc<dyn AssetSource>,
    blobs: BlobRegistry,
}

impl std::fmt::Debug for AssetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetResolver")
            .field("blobs", &self.blobs.len())
            .finish_non_exhaustive()
    }
}

impl AssetResolver {
    pub fn new(assets: Arc<dyn AssetSource>, blobs: BlobRegistry) -> Self {
        Self { assets, blobs }
    }

    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    pub fn assets(&self) -> &Arc<dyn AssetSource> {
        &self.assets
    }

    /// Loads the bytes behind a render source.
    pub fn load(&self, source: &str) -> Result<Vec<u8>, AssetError> {
        if is_blob_url(source) {
            self.blobs
                .get(source)
                .map(|blob| blob.bytes.to_vec())
                .ok_or_else(|| AssetError::BlobRevoked(source.to_string()))
        } else if is_data_url(source) {
            Blob::from_data_url(source).map(|blob| blob.bytes.to_vec())
        } else {
            self.assets.load(source)
        }
    }

    /// Loads a render source as UTF-8 SVG markup.
    pub fn load_svg(&self, source: &str) -> Result<String, AssetError> {
        let bytes = self.load(source)?;
        String::from_utf8(bytes).map_err(|_| AssetError::Encoding(truncate(source, 48)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_assets_lookup() {
        let assets = MemoryAssets::new().with("line@01.svg", "<svg/>");
        assert_eq!(assets.load("line@01.svg").unwrap(), b"<svg/>");
        assert_eq!(assets.load("./line@01.svg").unwrap(), b"<svg/>");
        assert!(matches!(assets.load("nope.svg"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn dir_assets_reads_files_and_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("way@01.svg"), "<svg/>").unwrap();
        let assets = DirAssets::new(dir.path());

        assert_eq!(assets.load("way@01.svg").unwrap(), b"<svg/>");
        assert!(matches!(assets.load("missing.svg"), Err(AssetError::NotFound(_))));
        assert!(matches!(
            assets.load("../etc/passwd"),
            Err(AssetError::InvalidName(_))
        ));
    }

    #[test]
    fn data_url_roundtrip() {
        let blob = Blob::svg("<svg>中文</svg>");
        let url = blob.to_data_url();
        assert!(url.starts_with("data:image/svg+xml;base64,"));
        assert_eq!(Blob::from_data_url(&url).unwrap(), blob);
    }

    #[test]
    fn data_url_without_base64() {
        let blob = Blob::from_data_url("data:image/svg+xml,<svg/>").unwrap();
        assert_eq!(&*blob.bytes, b"<svg/>");
        assert!(Blob::from_data_url("data:image/svg+xml;base64,@@@").is_err());
        assert!(Blob::from_data_url("not a url").is_err());
    }

    #[test]
    fn registry_register_and_revoke() {
        let registry = BlobRegistry::new();
        let url = registry.register(Blob::svg("<svg/>"));
        assert!(is_blob_url(&url));
        assert_eq!(registry.len(), 1);

        let shared = registry.clone();
        assert!(shared.get(&url).is_some());
        assert!(shared.revoke(&url));
        assert!(registry.get(&url).is_none());
    }

    #[test]
    fn resolver_dispatches_by_scheme() {
        let blobs = BlobRegistry::new();
        let url = blobs.register(Blob::svg("<svg id=\"blob\"/>"));
        let resolver = AssetResolver::new(
            Arc::new(MemoryAssets::new().with("stn@01.svg", "<svg id=\"static\"/>")),
            blobs.clone(),
        );

        assert!(resolver.load_svg(&url).unwrap().contains("blob"));
        assert!(resolver.load_svg("stn@01.svg").unwrap().contains("static"));
        let data = Blob::svg("<svg id=\"inline\"/>").to_data_url();
        assert!(resolver.load_svg(&data).unwrap().contains("inline"));

        blobs.revoke(&url);
        assert!(matches!(resolver.load(&url), Err(AssetError::BlobRevoked(_))));
    }
}
