//! Portable canvas configuration documents.
//!
//! A [`CanvasConfig`] captures the element sequence in a JSON format that can
//! be saved to a file and loaded into another session. Transient `blob:`
//! content is inlined as base64 `data:` URLs on export and registered as fresh
//! blobs on import.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "items": [
//!     { "file": "line@01.svg", "id": "3b2f..." },
//!     {
//!       "file": "text@custom-1712000000000.svg",
//!       "id": "9c1e...",
//!       "customUrl": "data:image/svg+xml;base64,PHN2Zy...",
//!       "customText": { "cn": "出口", "en": "Exit", "alignment": "start" }
//!     }
//!   ],
//!   "version": "1.0.0",
//!   "exportDate": "2024-04-01T08:00:00.000Z"
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use signboard_renderer::{BlobRegistry, IconRef, Sequence, export_config, import_config};
//!
//! let blobs = BlobRegistry::new();
//! let seq = Sequence::from_items([IconRef::new("line@01.svg").unwrap()]);
//!
//! let json = export_config(&seq, &blobs).unwrap();
//! let restored = import_config(&json, &blobs).unwrap();
//! assert_eq!(restored, seq);
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::{Blob, BlobRegistry, is_blob_url, is_data_url};
use crate::sequence::{CustomContent, IconId, IconRef, Sequence, TextContent};

/// The only configuration version this crate reads and writes.
pub const CONFIG_VERSION: &str = "1.0.0";

/// Errors raised while reading or writing configuration documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration file: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("incompatible configuration version: {found}")]
    VersionMismatch { found: String },
    #[error("invalid item #{index}: {reason}")]
    InvalidItem { index: usize, reason: String },
}

// ============================================================================
// ItemRecord
// ============================================================================

/// Wire form of a placed element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct ItemRecord {
    pub file: String,

    /// Element id. Ids that are not UUIDs are replaced on load.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<TextContent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_color_band: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_band_color: Option<String>,
}

impl ItemRecord {
    /// Captures an element as-is; `customUrl` is copied verbatim.
    pub fn from_icon(icon: &IconRef) -> Self {
        let mut record = Self {
            file: icon.file().to_string(),
            id: icon.id().to_string(),
            custom_url: icon.custom_url().map(str::to_string),
            custom_text: None,
            custom_color: None,
            has_color_band: None,
            color_band_color: None,
        };
        match icon.custom_content() {
            Some(CustomContent::Text(text)) => record.custom_text = Some(text.clone()),
            Some(CustomContent::Color(color)) => record.custom_color = Some(color.clone()),
            Some(CustomContent::TextBand { text, color }) => {
                record.custom_text = Some(text.clone());
                record.has_color_band = Some(true);
                record.color_band_color = Some(color.clone());
            }
            None => {}
        }
        record
    }

    /// Reconstructs the custom content described by this record.
    pub fn content(&self) -> Option<CustomContent> {
        let band_color = || {
            self.color_band_color
                .clone()
                .or_else(|| self.custom_color.clone())
        };
        match (&self.custom_text, self.has_color_band.unwrap_or(false)) {
            (Some(text), true) => band_color().map(|color| CustomContent::TextBand {
                text: text.clone(),
                color,
            }),
            (Some(text), false) => Some(CustomContent::Text(text.clone())),
            (None, _) => self.custom_color.clone().map(CustomContent::Color),
        }
    }

    /// Builds the element with the given render URL, validating the record.
    pub fn to_icon(&self, custom_url: Option<String>) -> Result<IconRef, String> {
        let id = Uuid::parse_str(&self.id)
            .map(IconId::from_uuid)
            .unwrap_or_else(|_| {
                tracing::debug!(id = %self.id, "replacing non-UUID element id");
                IconId::new()
            });
        IconRef::with_id(id, self.file.as_str())
            .and_then(|icon| icon.with_content(self.content()))
            .map(|icon| icon.with_custom_url(custom_url))
            .map_err(|err| err.to_string())
    }
}

// ============================================================================
// CanvasConfig
// ============================================================================

/// A serializable snapshot of the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct CanvasConfig {
    pub items: Vec<ItemRecord>,
    pub version: String,
    /// ISO-8601 timestamp; informational only.
    pub export_date: String,
}

impl CanvasConfig {
    /// Creates a config from records, stamped with the current time.
    pub fn new(items: Vec<ItemRecord>) -> Self {
        Self {
            items,
            version: CONFIG_VERSION.to_string(),
            export_date: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(ConfigError::Serialize)
    }

    /// Serializes to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Deserializes from a JSON string. The version is not checked here.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    /// Captures `seq`, inlining `blob:` content as `data:` URLs.
    ///
    /// A blob that is no longer registered keeps its URL and is logged.
    pub fn capture(seq: &Sequence, blobs: &BlobRegistry) -> Self {
        let items = seq
            .iter()
            .map(|icon| {
                let mut record = ItemRecord::from_icon(icon);
                if let Some(url) = icon.custom_url().filter(|u| is_blob_url(u)) {
                    match blobs.get(url) {
                        Some(blob) => record.custom_url = Some(blob.to_data_url()),
                        None => tracing::warn!(id = %icon.id(), %url, "blob no longer available; keeping URL"),
                    }
                }
                record
            })
            .collect();
        Self::new(items)
    }

    /// Checks the version and decodes every item, registering inlined
    /// content in `blobs` only once all items are known to be valid.
    pub fn restore(&self, blobs: &BlobRegistry) -> Result<Sequence, ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::VersionMismatch {
                found: self.version.clone(),
            });
        }

        let mut decoded = Vec::with_capacity(self.items.len());
        let mut seen = HashSet::with_capacity(self.items.len());
        for (index, record) in self.items.iter().enumerate() {
            let invalid = |reason: String| ConfigError::InvalidItem { index, reason };
            let inline = match record.custom_url.as_deref() {
                Some(url) if is_data_url(url) => {
                    Some(Blob::from_data_url(url).map_err(|err| invalid(err.to_string()))?)
                }
                _ => None,
            };
            let icon = record.to_icon(record.custom_url.clone()).map_err(invalid)?;
            if !seen.insert(icon.id()) {
                return Err(invalid(format!("duplicate id {}", icon.id())));
            }
            decoded.push((icon, inline));
        }

        let items: Vec<IconRef> = decoded
            .into_iter()
            .map(|(icon, inline)| match inline {
                Some(blob) => icon.with_custom_url(Some(blobs.register(blob))),
                None => icon,
            })
            .collect();
        Ok(Sequence::from_items(items))
    }
}

/// Serializes `seq` into a configuration document.
pub fn export_config(seq: &Sequence, blobs: &BlobRegistry) -> Result<String, ConfigError> {
    CanvasConfig::capture(seq, blobs).to_json()
}

/// Parses a configuration document into a new sequence.
///
/// Nothing is registered in `blobs` unless the whole document is valid.
pub fn import_config(json: &str, blobs: &BlobRegistry) -> Result<Sequence, ConfigError> {
    let config = CanvasConfig::from_json(json).inspect_err(|err| {
        tracing::warn!(%err, "configuration import failed");
    })?;
    config.restore(blobs).inspect_err(|err| {
        tracing::warn!(%err, "configuration import failed");
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Alignment;

    fn text() -> TextContent {
        TextContent::new("出口", "Exit", Alignment::Middle)
    }

    fn sample(blobs: &BlobRegistry) -> Sequence {
        let url = blobs.register(Blob::svg("<svg>text</svg>"));
        Sequence::from_items([
            IconRef::new("line@01.svg").unwrap(),
            IconRef::generated("text@custom-1.svg", url, CustomContent::Text(text())).unwrap(),
            IconRef::new("cls@01.svg")
                .unwrap()
                .with_custom_url(Some("cls@01_ff0000.svg".into()))
                .with_content(Some(CustomContent::Color("#ff0000".into())))
                .unwrap(),
        ])
    }

    #[test]
    fn export_inlines_blobs_as_data_urls() {
        let blobs = BlobRegistry::new();
        let seq = sample(&blobs);
        let config = CanvasConfig::capture(&seq, &blobs);

        assert_eq!(config.version, "1.0.0");
        let url = config.items[1].custom_url.as_deref().unwrap();
        assert!(url.starts_with("data:image/svg+xml;base64,"));
        assert_eq!(config.items[2].custom_url.as_deref(), Some("cls@01_ff0000.svg"));
        assert_eq!(config.items[2].custom_color.as_deref(), Some("#ff0000"));
        assert!(config.export_date.ends_with('Z'));
    }

    #[test]
    fn json_uses_camel_case_and_omits_empty_fields() {
        let blobs = BlobRegistry::new();
        let json = export_config(&sample(&blobs), &blobs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value.get("exportDate").is_some());
        assert!(value["items"][0].get("customUrl").is_none());
        assert_eq!(value["items"][1]["customText"]["alignment"], "middle");
    }

    #[test]
    fn import_rematerializes_fresh_blobs() {
        let blobs = BlobRegistry::new();
        let seq = sample(&blobs);
        let json = export_config(&seq, &blobs).unwrap();

        let fresh = BlobRegistry::new();
        let restored = import_config(&json, &fresh).unwrap();

        assert_eq!(restored.ids(), seq.ids());
        let text = &restored.items()[1];
        let url = text.custom_url().unwrap();
        assert!(url.starts_with("blob:"));
        assert_eq!(&*fresh.get(url).unwrap().bytes, b"<svg>text</svg>");
        assert_eq!(text.custom_content(), seq.items()[1].custom_content());
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let blobs = BlobRegistry::new();
        let json = r#"{"items":[],"version":"0.9.0","exportDate":"x"}"#;
        assert!(matches!(
            import_config(json, &blobs),
            Err(ConfigError::VersionMismatch { found }) if found == "0.9.0"
        ));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let blobs = BlobRegistry::new();
        assert!(matches!(
            import_config("{not json", &blobs),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn invalid_item_rejects_whole_document_without_registering() {
        let blobs = BlobRegistry::new();
        let inline = Blob::svg("<svg/>").to_data_url();
        let json = format!(
            r#"{{"items":[
                {{"file":"text@custom-1.svg","id":"a","customUrl":"{inline}","customText":{{"cn":"a","en":"b","alignment":"start"}}}},
                {{"file":"bogus.svg","id":"b"}}
            ],"version":"1.0.0","exportDate":"x"}}"#
        );
        assert!(matches!(
            import_config(&json, &blobs),
            Err(ConfigError::InvalidItem { index: 1, .. })
        ));
        assert!(blobs.is_empty());
    }

    #[test]
    fn repeated_id_rejects_whole_document() {
        let blobs = BlobRegistry::new();
        let id = Uuid::new_v4();
        let inline = Blob::svg("<svg/>").to_data_url();
        let json = format!(
            r#"{{"items":[
                {{"file":"text@custom-1.svg","id":"{id}","customUrl":"{inline}","customText":{{"cn":"a","en":"b","alignment":"start"}}}},
                {{"file":"line@01.svg","id":"{id}"}}
            ],"version":"1.0.0","exportDate":"x"}}"#
        );
        assert!(matches!(
            import_config(&json, &blobs),
            Err(ConfigError::InvalidItem { index: 1, .. })
        ));
        assert!(blobs.is_empty());
    }

    #[test]
    fn text_on_wrong_category_is_invalid() {
        let blobs = BlobRegistry::new();
        let json = r#"{"items":[{"file":"way@01.svg","id":"a","customText":{"cn":"a","en":"b","alignment":"start"}}],"version":"1.0.0","exportDate":"x"}"#;
        assert!(matches!(
            import_config(json, &blobs),
            Err(ConfigError::InvalidItem { index: 0, .. })
        ));
    }

    #[test]
    fn record_content_mapping() {
        let band = IconRef::new("sub@text-custom-1.svg").unwrap().with_content(Some(
            CustomContent::TextBand {
                text: text(),
                color: "#00ff00".into(),
            },
        ))
        .unwrap();
        let record = ItemRecord::from_icon(&band);
        assert_eq!(record.has_color_band, Some(true));
        assert_eq!(record.color_band_color.as_deref(), Some("#00ff00"));
        assert_eq!(record.content(), band.custom_content().cloned());
    }

    #[test]
    fn legacy_ids_are_replaced() {
        let record: ItemRecord =
            serde_json::from_str(r#"{"file":"line@01.svg","id":"1712000000000"}"#).unwrap();
        let icon = record.to_icon(None).unwrap();
        assert_ne!(icon.id().to_string(), "1712000000000");
    }
}
