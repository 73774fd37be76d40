//! The ordered element sequence.
//!
//! A [`Sequence`] is the left-to-right list of [`IconRef`]s on the canvas.
//! Every mutating operation returns a new sequence and leaves `self`
//! untouched; operations naming an id that is not present return an unchanged
//! copy.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::{Category, Glyph};

// ============================================================================
// IconId
// ============================================================================

/// Stable, unique identity of a placed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IconId(Uuid);

impl IconId {
    /// Creates a new unique id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an id from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for IconId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IconId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Custom content
// ============================================================================

/// Horizontal text alignment inside a generated text element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum Alignment {
    #[default]
    Start,
    Middle,
    End,
}

impl Alignment {
    /// Returns the SVG `text-anchor` value.
    pub fn text_anchor(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

/// A bilingual label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct TextContent {
    /// Chinese line.
    pub cn: String,
    /// English line.
    pub en: String,
    pub alignment: Alignment,
}

impl TextContent {
    pub fn new(cn: impl Into<String>, en: impl Into<String>, alignment: Alignment) -> Self {
        Self {
            cn: cn.into(),
            en: en.into(),
            alignment,
        }
    }
}

/// User-supplied override of an element's appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomContent {
    /// Free-standing bilingual text.
    Text(TextContent),
    /// Recolored pictogram or band, color as `#rrggbb`.
    Color(String),
    /// Bilingual text above a color band.
    TextBand { text: TextContent, color: String },
}

impl CustomContent {
    pub fn text(&self) -> Option<&TextContent> {
        match self {
            Self::Text(text) | Self::TextBand { text, .. } => Some(text),
            Self::Color(_) => None,
        }
    }

    pub fn color(&self) -> Option<&str> {
        match self {
            Self::Color(color) | Self::TextBand { color, .. } => Some(color),
            Self::Text(_) => None,
        }
    }

    /// Checks that content of this kind may be attached to `category`.
    pub fn validate_for(&self, category: Category) -> Result<(), InvalidCustomization> {
        match self {
            Self::Text(_) if !category.accepts_text() => {
                Err(InvalidCustomization::TextNotAllowed(category))
            }
            Self::Color(_) if !category.is_colorable() => {
                Err(InvalidCustomization::ColorNotAllowed(category))
            }
            Self::TextBand { .. } if category != Category::Sub => {
                Err(InvalidCustomization::TextNotAllowed(category))
            }
            _ => Ok(()),
        }
    }
}

/// Rejected element construction or customization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidCustomization {
    #[error("unknown element category in asset name `{0}`")]
    UnknownCategory(String),
    #[error("elements of category `{0}` cannot carry custom text")]
    TextNotAllowed(Category),
    #[error("elements of category `{0}` cannot be recolored")]
    ColorNotAllowed(Category),
}

// ============================================================================
// IconRef
// ============================================================================

/// A placed element.
///
/// `file` is the asset name (`line@01.svg`) or, for generated content, the
/// synthetic name the generator assigned (`text@custom-1712.svg`). When
/// `custom_url` is set it takes precedence over `file` for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconRef {
    id: IconId,
    category: Category,
    glyph: Glyph,
    file: String,
    custom_url: Option<String>,
    custom: Option<CustomContent>,
}

impl IconRef {
    /// Creates an element for a static asset, assigning a fresh id.
    pub fn new(file: impl Into<String>) -> Result<Self, InvalidCustomization> {
        Self::with_id(IconId::new(), file)
    }

    /// Creates an element with a caller-supplied id.
    pub fn with_id(id: IconId, file: impl Into<String>) -> Result<Self, InvalidCustomization> {
        let file = file.into();
        let category = Category::from_asset_name(&file)
            .ok_or_else(|| InvalidCustomization::UnknownCategory(file.clone()))?;
        Ok(Self {
            id,
            category,
            glyph: Glyph::classify(&file),
            file,
            custom_url: None,
            custom: None,
        })
    }

    /// Creates an element backed by generated content.
    pub fn generated(
        file: impl Into<String>,
        custom_url: impl Into<String>,
        content: CustomContent,
    ) -> Result<Self, InvalidCustomization> {
        let mut icon = Self::new(file)?;
        content.validate_for(icon.category)?;
        icon.custom_url = Some(custom_url.into());
        icon.custom = Some(content);
        Ok(icon)
    }

    /// Attaches a custom URL without content metadata (plain recolored assets
    /// loaded from older configurations).
    pub(crate) fn with_custom_url(mut self, custom_url: Option<String>) -> Self {
        self.custom_url = custom_url;
        self
    }

    /// Attaches custom content, which the category must accept.
    pub fn with_content(
        mut self,
        content: Option<CustomContent>,
    ) -> Result<Self, InvalidCustomization> {
        if let Some(content) = &content {
            content.validate_for(self.category)?;
        }
        self.custom = content;
        Ok(self)
    }

    pub fn id(&self) -> IconId {
        self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn glyph(&self) -> Glyph {
        self.glyph
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn custom_url(&self) -> Option<&str> {
        self.custom_url.as_deref()
    }

    pub fn custom_content(&self) -> Option<&CustomContent> {
        self.custom.as_ref()
    }

    /// Returns the reference the renderer should load: the custom URL if
    /// present, otherwise the asset name.
    pub fn render_source(&self) -> &str {
        self.custom_url.as_deref().unwrap_or(&self.file)
    }

    /// Clones this element under a fresh id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: IconId::new(),
            ..self.clone()
        }
    }

    /// Returns a copy with source and content replaced together.
    ///
    /// The category is re-derived from the new file name and must accept the
    /// content; on error `self` is unaffected.
    pub fn customized(
        &self,
        file: impl Into<String>,
        custom_url: impl Into<String>,
        content: CustomContent,
    ) -> Result<Self, InvalidCustomization> {
        let mut replaced = Self::with_id(self.id, file)?;
        content.validate_for(replaced.category)?;
        replaced.custom_url = Some(custom_url.into());
        replaced.custom = Some(content);
        Ok(replaced)
    }
}

// ============================================================================
// Sequence
// ============================================================================

/// Direction for [`Sequence::move_adjacent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn inverse(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Where an element should be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPoint {
    /// Immediately before the element with this id.
    Before(IconId),
    /// After the last element.
    End,
}

/// Ordered list of placed elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence {
    items: Vec<IconRef>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sequence, dropping any element whose id repeats an earlier one.
    pub fn from_items(items: impl IntoIterator<Item = IconRef>) -> Self {
        let mut seq = Self::new();
        for item in items {
            if seq.contains(item.id) {
                tracing::warn!(id = %item.id, "dropping element with duplicate id");
                continue;
            }
            seq.items.push(item);
        }
        seq
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[IconRef] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &IconRef> {
        self.items.iter()
    }

    pub fn ids(&self) -> Vec<IconId> {
        self.items.iter().map(IconRef::id).collect()
    }

    pub fn get(&self, id: IconId) -> Option<&IconRef> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn index_of(&self, id: IconId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn contains(&self, id: IconId) -> bool {
        self.index_of(id).is_some()
    }

    /// Appends an element. Ignored if its id is already present.
    pub fn add(&self, icon: IconRef) -> Self {
        self.insert(icon, InsertionPoint::End)
    }

    /// Inserts an element at `at`. A `Before` target that is not present
    /// falls back to appending.
    pub fn insert(&self, icon: IconRef, at: InsertionPoint) -> Self {
        if self.contains(icon.id) {
            return self.clone();
        }
        let mut items = self.items.clone();
        let index = match at {
            InsertionPoint::Before(target) => self.index_of(target).unwrap_or(items.len()),
            InsertionPoint::End => items.len(),
        };
        items.insert(index, icon);
        Self { items }
    }

    pub fn remove(&self, id: IconId) -> Self {
        Self {
            items: self.items.iter().filter(|item| item.id != id).cloned().collect(),
        }
    }

    /// Swaps an element with its neighbor. No-op at either boundary.
    pub fn move_adjacent(&self, id: IconId, direction: Direction) -> Self {
        let mut items = self.items.clone();
        if let Some(index) = self.index_of(id) {
            match direction {
                Direction::Left if index > 0 => items.swap(index, index - 1),
                Direction::Right if index + 1 < items.len() => items.swap(index, index + 1),
                _ => {}
            }
        }
        Self { items }
    }

    /// Inserts a copy of the element (with a fresh id) right after it.
    pub fn duplicate(&self, id: IconId) -> Self {
        let mut items = self.items.clone();
        if let Some(index) = self.index_of(id) {
            items.insert(index + 1, items[index].duplicate());
        }
        Self { items }
    }

    /// Relocates an element to just before `target`, or to the end.
    ///
    /// Targeting the element itself, or a target that is not present, leaves
    /// the order unchanged.
    pub fn reorder_to(&self, id: IconId, target: InsertionPoint) -> Self {
        let Some(from) = self.index_of(id) else {
            return self.clone();
        };
        if let InsertionPoint::Before(before) = target {
            if before == id || !self.contains(before) {
                return self.clone();
            }
        }

        let mut items = self.items.clone();
        let moved = items.remove(from);
        let index = match target {
            InsertionPoint::Before(before) => items
                .iter()
                .position(|item| item.id == before)
                .unwrap_or(items.len()),
            InsertionPoint::End => items.len(),
        };
        items.insert(index, moved);
        Self { items }
    }

    /// Replaces an element in place, keeping its position. The replacement
    /// must carry the same id.
    pub fn replace(&self, replacement: IconRef) -> Self {
        let items = self
            .items
            .iter()
            .map(|item| {
                if item.id == replacement.id {
                    replacement.clone()
                } else {
                    item.clone()
                }
            })
            .collect();
        Self { items }
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a IconRef;
    type IntoIter = std::slice::Iter<'a, IconRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<IconRef> for Sequence {
    fn from_iter<T: IntoIterator<Item = IconRef>>(iter: T) -> Self {
        Self::from_items(iter)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn icon(file: &str) -> IconRef {
        IconRef::new(file).unwrap()
    }

    fn sample() -> Sequence {
        Sequence::from_items([
            icon("line@01.svg"),
            icon("sub@03.svg"),
            icon("way@01.svg"),
            icon("stn@01.svg"),
        ])
    }

    fn files(seq: &Sequence) -> Vec<&str> {
        seq.iter().map(IconRef::file).collect()
    }

    #[test]
    fn with_content_enforces_category() {
        let text = CustomContent::Text(TextContent::new("出口", "Exit", Alignment::Start));
        assert!(matches!(
            icon("way@01.svg").with_content(Some(text.clone())),
            Err(InvalidCustomization::TextNotAllowed(Category::Way))
        ));
        assert!(matches!(
            icon("line@01.svg").with_content(Some(CustomContent::Color("#ff0000".into()))),
            Err(InvalidCustomization::ColorNotAllowed(_))
        ));

        let labeled = icon("text@custom-1.svg").with_content(Some(text)).unwrap();
        assert!(labeled.custom_content().is_some());
        let cleared = labeled.with_content(None).unwrap();
        assert!(cleared.custom_content().is_none());
    }

    #[test]
    fn new_icon_derives_tags() {
        let dot = icon("oth@Dot.svg");
        assert_eq!(dot.category(), Category::Other);
        assert!(dot.glyph().is_dot());
        assert_eq!(dot.render_source(), "oth@Dot.svg");

        assert!(matches!(
            IconRef::new("bogus.svg"),
            Err(InvalidCustomization::UnknownCategory(_))
        ));
    }

    #[test]
    fn add_appends_and_rejects_duplicate_id() {
        let seq = Sequence::new();
        let a = icon("line@01.svg");
        let seq = seq.add(a.clone());
        let seq = seq.add(a);
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn operations_do_not_mutate_original() {
        let seq = sample();
        let id = seq.items()[0].id();
        let _ = seq.remove(id);
        let _ = seq.duplicate(id);
        let _ = seq.move_adjacent(id, Direction::Right);
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.items()[0].id(), id);
    }

    #[test]
    fn remove_preserves_order() {
        let seq = sample();
        let removed = seq.remove(seq.items()[1].id());
        assert_eq!(files(&removed), ["line@01.svg", "way@01.svg", "stn@01.svg"]);
    }

    #[test]
    fn unknown_id_is_noop() {
        let seq = sample();
        let ghost = IconId::new();
        assert_eq!(seq.remove(ghost), seq);
        assert_eq!(seq.duplicate(ghost), seq);
        assert_eq!(seq.move_adjacent(ghost, Direction::Left), seq);
        assert_eq!(seq.reorder_to(ghost, InsertionPoint::End), seq);
    }

    #[test]
    fn move_adjacent_is_noop_at_boundaries() {
        let seq = sample();
        let first = seq.items()[0].id();
        let last = seq.items()[3].id();
        assert_eq!(seq.move_adjacent(first, Direction::Left), seq);
        assert_eq!(seq.move_adjacent(last, Direction::Right), seq);
    }

    #[test]
    fn move_adjacent_then_inverse_restores() {
        let seq = sample();
        for index in 0..seq.len() {
            let id = seq.items()[index].id();
            for direction in [Direction::Left, Direction::Right] {
                let at_boundary = (index == 0 && direction == Direction::Left)
                    || (index == seq.len() - 1 && direction == Direction::Right);
                if at_boundary {
                    continue;
                }
                let moved = seq.move_adjacent(id, direction);
                assert_ne!(moved, seq);
                assert_eq!(moved.move_adjacent(id, direction.inverse()), seq);
            }
        }
    }

    #[test]
    fn duplicate_inserts_clone_after_source() {
        let seq = sample();
        let source = seq.items()[1].clone();
        let dup = seq.duplicate(source.id());

        assert_eq!(dup.len(), seq.len() + 1);
        let clone = &dup.items()[2];
        assert_ne!(clone.id(), source.id());
        assert_eq!(clone.file(), source.file());
        assert_eq!(clone.category(), source.category());
        assert_eq!(clone.glyph(), source.glyph());
        assert_eq!(clone.custom_url(), source.custom_url());
        assert_eq!(clone.custom_content(), source.custom_content());
        assert_eq!(dup.items()[3].id(), seq.items()[2].id());
    }

    #[test]
    fn reorder_to_before_target_and_end() {
        let seq = sample();
        let ids = seq.ids();

        let moved = seq.reorder_to(ids[3], InsertionPoint::Before(ids[0]));
        assert_eq!(moved.ids(), [ids[3], ids[0], ids[1], ids[2]]);

        let moved = seq.reorder_to(ids[0], InsertionPoint::Before(ids[3]));
        assert_eq!(moved.ids(), [ids[1], ids[2], ids[0], ids[3]]);

        let moved = seq.reorder_to(ids[1], InsertionPoint::End);
        assert_eq!(moved.ids(), [ids[0], ids[2], ids[3], ids[1]]);

        assert_eq!(seq.reorder_to(ids[1], InsertionPoint::Before(ids[1])), seq);
        assert_eq!(seq.reorder_to(ids[1], InsertionPoint::Before(ids[2])), seq);
    }

    #[test]
    fn insert_before_missing_target_appends() {
        let seq = sample();
        let extra = icon("exit@01.svg");
        let extra_id = extra.id();
        let seq = seq.insert(extra, InsertionPoint::Before(IconId::new()));
        assert_eq!(seq.items().last().map(IconRef::id), Some(extra_id));
    }

    #[test]
    fn customization_validation() {
        let text = CustomContent::Text(TextContent::new("出口", "Exit", Alignment::Start));
        assert!(text.validate_for(Category::Text).is_ok());
        assert!(text.validate_for(Category::Sub).is_ok());
        assert!(text.validate_for(Category::Line).is_err());

        let color = CustomContent::Color("#ff0000".into());
        assert!(color.validate_for(Category::Class).is_ok());
        assert!(color.validate_for(Category::ClassSecondary).is_ok());
        assert!(color.validate_for(Category::Sub).is_ok());
        assert_eq!(
            color.validate_for(Category::Way),
            Err(InvalidCustomization::ColorNotAllowed(Category::Way))
        );
    }

    #[test]
    fn customized_replaces_source_and_content_together() {
        let original = icon("cls@01.svg");
        let content = CustomContent::Color("#123456".into());
        let replaced = original
            .customized("cls@01_123456.svg", "blob:abc", content.clone())
            .unwrap();
        assert_eq!(replaced.id(), original.id());
        assert_eq!(replaced.render_source(), "blob:abc");
        assert_eq!(replaced.custom_content(), Some(&content));

        let bad = original.customized(
            "line@01.svg",
            "blob:def",
            CustomContent::Color("#000000".into()),
        );
        assert!(bad.is_err());
    }
}
