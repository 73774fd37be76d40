//! Local persistence of the working sequence.
//!
//! [`SequenceStore`] mirrors the sequence into `canvas-items.json` under a
//! data directory so a session survives restarts. Transient `blob:` content
//! cannot outlive the process, so it is written inline as `blobData` and
//! registered again on load.
//!
//! The file is a cache: a missing or unreadable file yields an empty
//! sequence, and items that no longer decode are dropped with a warning.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::asset::{Blob, BlobRegistry, is_blob_url};
use crate::config::ItemRecord;
use crate::sequence::{IconRef, Sequence};

/// Name of the persisted file inside the data directory.
pub const STORE_FILE: &str = "canvas-items.json";

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Inline copy of a blob's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct BlobData {
    mime: String,
    /// Base64-encoded bytes.
    data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredItem {
    #[serde(flatten)]
    record: ItemRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blob_data: Option<BlobData>,
}

/// File-backed storage for the working sequence.
#[derive(Debug, Clone)]
pub struct SequenceStore {
    data_dir: PathBuf,
}

impl SequenceStore {
    /// Opens a store in `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Full path of the persisted file.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    /// Writes `seq`, inlining any `blob:` content still registered in `blobs`.
    pub fn save(&self, seq: &Sequence, blobs: &BlobRegistry) -> Result<(), StoreError> {
        let items: Vec<StoredItem> = seq.iter().map(|icon| stored_item(icon, blobs)).collect();
        let json = serde_json::to_string(&items)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(self.path(), json)?;
        tracing::debug!(items = items.len(), path = %self.path().display(), "sequence persisted");
        Ok(())
    }

    /// Reads the persisted sequence, registering inline content in `blobs`.
    ///
    /// Returns `Ok(None)` when nothing has been saved yet.
    pub fn try_load(&self, blobs: &BlobRegistry) -> Result<Option<Sequence>, StoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let stored: Vec<StoredItem> = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let items: Vec<IconRef> = stored
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match restore_item(item, blobs) {
                Ok(icon) => Some(icon),
                Err(reason) => {
                    tracing::warn!(index, %reason, "dropping stored item");
                    None
                }
            })
            .collect();
        Ok(Some(Sequence::from_items(items)))
    }

    /// Like [`try_load`](Self::try_load), but any failure yields an empty
    /// sequence.
    pub fn load(&self, blobs: &BlobRegistry) -> Sequence {
        match self.try_load(blobs) {
            Ok(seq) => seq.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to load {}: {e}", self.path().display());
                Sequence::new()
            }
        }
    }

    /// Deletes the persisted file, if any.
    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn stored_item(icon: &IconRef, blobs: &BlobRegistry) -> StoredItem {
    let mut record = ItemRecord::from_icon(icon);
    let mut blob_data = None;
    if let Some(url) = icon.custom_url().filter(|u| is_blob_url(u)) {
        match blobs.get(url) {
            Some(blob) => {
                record.custom_url = None;
                blob_data = Some(BlobData {
                    mime: blob.mime.clone(),
                    data: BASE64.encode(&blob.bytes),
                });
            }
            None => tracing::warn!(id = %icon.id(), %url, "blob no longer available; storing URL"),
        }
    }
    StoredItem { record, blob_data }
}

fn restore_item(item: StoredItem, blobs: &BlobRegistry) -> Result<IconRef, String> {
    let inline = item
        .blob_data
        .map(|data| {
            BASE64
                .decode(data.data.as_bytes())
                .map(|bytes| Blob::new(bytes, data.mime))
                .map_err(|e| format!("invalid blob data: {e}"))
        })
        .transpose()?;

    // Validate before registering so a rejected item leaves nothing behind.
    let icon = item.record.to_icon(item.record.custom_url.clone())?;
    Ok(match inline {
        Some(blob) => icon.with_custom_url(Some(blobs.register(blob))),
        None => icon,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{Alignment, CustomContent, TextContent};

    fn text_icon(blobs: &BlobRegistry) -> IconRef {
        let url = blobs.register(Blob::svg("<svg>出口</svg>"));
        IconRef::generated(
            "text@custom-1.svg",
            url,
            CustomContent::Text(TextContent::new("出口", "Exit", Alignment::Start)),
        )
        .unwrap()
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::open(dir.path()).unwrap();
        let blobs = BlobRegistry::new();
        let seq = Sequence::from_items([IconRef::new("line@01.svg").unwrap(), text_icon(&blobs)]);

        store.save(&seq, &blobs).unwrap();
        assert!(store.path().ends_with("canvas-items.json"));

        let fresh = BlobRegistry::new();
        let loaded = store.load(&fresh);
        assert_eq!(loaded.ids(), seq.ids());

        let url = loaded.items()[1].custom_url().unwrap();
        assert!(url.starts_with("blob:"));
        assert_eq!(&*fresh.get(url).unwrap().bytes, "<svg>出口</svg>".as_bytes());
        assert_eq!(
            loaded.items()[1].custom_content(),
            seq.items()[1].custom_content()
        );
    }

    #[test]
    fn blob_urls_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::open(dir.path()).unwrap();
        let blobs = BlobRegistry::new();
        store
            .save(&Sequence::from_items([text_icon(&blobs)]), &blobs)
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value[0].get("customUrl").is_none());
        assert_eq!(value[0]["blobData"]["mime"], "image/svg+xml");
        assert_eq!(value[0]["file"], "text@custom-1.svg");
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::open(dir.path().join("nested")).unwrap();
        let blobs = BlobRegistry::new();
        assert!(store.try_load(&blobs).unwrap().is_none());
        assert!(store.load(&blobs).is_empty());
    }

    #[test]
    fn corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::open(dir.path()).unwrap();
        std::fs::write(store.path(), "[{oops").unwrap();

        let blobs = BlobRegistry::new();
        assert!(matches!(
            store.try_load(&blobs),
            Err(StoreError::Serialization(_))
        ));
        assert!(store.load(&blobs).is_empty());
    }

    #[test]
    fn undecodable_items_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::open(dir.path()).unwrap();
        std::fs::write(
            store.path(),
            r#"[{"file":"nope.svg","id":"x"},{"file":"way@01.svg","id":"y"}]"#,
        )
        .unwrap();

        let loaded = store.load(&BlobRegistry::new());
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.items()[0].file(), "way@01.svg");
    }

    #[test]
    fn clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::open(dir.path()).unwrap();
        let blobs = BlobRegistry::new();
        store.save(&Sequence::new(), &blobs).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }
}
