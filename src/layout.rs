//! Horizontal layout shared by the canvas and both export compositors.
//!
//! Every element is drawn at the full render height, so its width follows
//! from its aspect ratio. [`Geometry::compute`] places elements left to right
//! starting at the edge margin, separated by the gaps the [`SpacingEngine`]
//! decides. The canvas lays out at scale 1; exports pass their own scale.

use std::collections::HashMap;

use crate::asset::AssetResolver;
use crate::sequence::{IconId, IconRef};
use crate::spacing::SpacingEngine;
use crate::svg;

/// Height of every element, in logical units.
pub const RENDER_HEIGHT: f32 = 150.0;

/// Empty space before the first and after the last element.
pub const EDGE_MARGIN: f32 = 25.0;

/// Aspect ratio assumed for content whose size cannot be determined.
pub const FALLBACK_ASPECT: f32 = 1.0;

// ============================================================================
// Geometry
// ============================================================================

/// An axis-aligned rectangle in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the right edge coordinate (x + width).
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Returns the horizontal center.
    pub fn mid_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.y + self.height
    }
}

/// Placement of one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub id: IconId,
    pub rect: Rect,
    /// Gap between this element and the next one; 0 for the last element.
    pub gap_after: f32,
}

/// Placement of a whole sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub scale: f32,
    pub height: f32,
    pub total_width: f32,
    pub slots: Vec<Slot>,
}

impl Geometry {
    /// Lays out `items` using one aspect ratio per item.
    ///
    /// Missing or non-positive ratios fall back to [`FALLBACK_ASPECT`].
    pub fn compute(items: &[IconRef], ratios: &[f32], engine: &SpacingEngine, scale: f32) -> Self {
        let height = RENDER_HEIGHT * scale;
        let margin = EDGE_MARGIN * scale;
        let gaps = engine.gaps(items);

        let mut slots = Vec::with_capacity(items.len());
        let mut x = margin;
        for (index, item) in items.iter().enumerate() {
            let ratio = ratios
                .get(index)
                .copied()
                .filter(|r| r.is_finite() && *r > 0.0)
                .unwrap_or(FALLBACK_ASPECT);
            let width = RENDER_HEIGHT * scale * ratio;
            let gap_after = gaps[index] * scale;
            slots.push(Slot {
                id: item.id(),
                rect: Rect::new(x, 0.0, width, height),
                gap_after,
            });
            x += width + gap_after;
        }

        Self {
            scale,
            height,
            total_width: x + margin,
            slots,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, id: IconId) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    /// Sum of all element widths.
    pub fn content_width(&self) -> f32 {
        self.slots.iter().map(|slot| slot.rect.width).sum()
    }

    /// Sum of all gaps.
    pub fn gap_width(&self) -> f32 {
        self.slots.iter().map(|slot| slot.gap_after).sum()
    }

    /// Element boxes for drag hit testing, skipping `exclude`.
    pub fn hit_boxes(&self, exclude: Option<IconId>) -> Vec<HitBox> {
        self.slots
            .iter()
            .filter(|slot| Some(slot.id) != exclude)
            .map(|slot| HitBox {
                id: slot.id,
                left: slot.rect.x,
                width: slot.rect.width,
            })
            .collect()
    }

    /// Returns the element under a point, if any.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<IconId> {
        self.slots
            .iter()
            .find(|slot| slot.rect.contains(x, y))
            .map(|slot| slot.id)
    }
}

/// Horizontal extent of an element as seen by the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitBox {
    pub id: IconId,
    pub left: f32,
    pub width: f32,
}

impl HitBox {
    /// Signed distance from the box's horizontal midpoint to `pointer_x`.
    /// Negative when the midpoint lies to the right of the pointer.
    pub fn offset(&self, pointer_x: f32) -> f32 {
        pointer_x - self.left - self.width / 2.0
    }
}

// ============================================================================
// Aspect ratios
// ============================================================================

/// Memoized aspect ratios keyed by render source.
#[derive(Debug, Clone, Default)]
pub struct AspectCache {
    ratios: HashMap<String, f32>,
}

impl AspectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a known ratio, e.g. one measured by the shell.
    pub fn insert(&mut self, source: impl Into<String>, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.ratios.insert(source.into(), ratio);
        }
    }

    pub fn get(&self, source: &str) -> Option<f32> {
        self.ratios.get(source).copied()
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    /// Returns the ratio for `icon`, loading and parsing its markup on a miss.
    ///
    /// Content that cannot be loaded or has no usable size is reported as
    /// [`FALLBACK_ASPECT`] and not cached.
    pub fn ratio_for(&mut self, icon: &IconRef, resolver: &AssetResolver) -> f32 {
        let source = icon.render_source();
        if let Some(ratio) = self.get(source) {
            return ratio;
        }
        let parsed = resolver
            .load_svg(source)
            .map_err(|err| tracing::warn!(%source, %err, "could not load element"))
            .ok()
            .and_then(|markup| svg::aspect_ratio(&markup));
        match parsed {
            Some(ratio) => {
                self.insert(source, ratio);
                ratio
            }
            None => FALLBACK_ASPECT,
        }
    }

    /// Ratios for every item, in order.
    pub fn ratios(&mut self, items: &[IconRef], resolver: &AssetResolver) -> Vec<f32> {
        items
            .iter()
            .map(|icon| self.ratio_for(icon, resolver))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
