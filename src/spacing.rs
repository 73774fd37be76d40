//! Gap rules between adjacent elements.
//!
//! [`SpacingEngine`] evaluates an ordered list of [`SpacingRule`]s against a
//! pair of neighbors; the first rule that matches decides the gap, otherwise
//! the default gap applies. The canvas and both export compositors call the
//! same engine so that on-screen and exported layouts agree.

use crate::category::BandRole;
use crate::sequence::IconRef;

/// Nominal gap between unrelated elements, in logical units.
pub const DEFAULT_GAP: f32 = 25.0;

/// Gap between a special numeral and a numbered plate.
pub const NUMERAL_GAP: f32 = 5.0;

/// Gap around a dot marker.
pub const DOT_GAP: f32 = 15.0;

/// Gap next to an exit band in the band series.
pub const BAND_EXIT_GAP: f32 = 10.0;

/// Gap next to a text band in the band series.
pub const BAND_TEXT_GAP: f32 = 15.0;

/// A single spacing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacingRule {
    /// Special numeral next to a numbered plate, either order.
    NumeralAdjacency,
    /// Dot marker next to the letter-A plate, either order.
    DotLetterPair,
    /// Color band next to a color band or a line.
    BandLine,
    /// Anything next to a dot marker.
    DotMarker,
    /// Two members of the extended band series.
    BandSeries,
}

impl SpacingRule {
    /// Evaluation order used by [`SpacingEngine::default`].
    pub const STANDARD: [SpacingRule; 5] = [
        SpacingRule::NumeralAdjacency,
        SpacingRule::DotLetterPair,
        SpacingRule::BandLine,
        SpacingRule::DotMarker,
        SpacingRule::BandSeries,
    ];

    /// Returns the gap this rule assigns to the pair, or `None` if the rule
    /// does not apply.
    pub fn evaluate(self, prev: &IconRef, next: &IconRef) -> Option<f32> {
        let (a, b) = (prev.glyph(), next.glyph());
        match self {
            Self::NumeralAdjacency => {
                let hit = (a.is_special_numeral() && b.is_series_plate())
                    || (a.is_series_plate() && b.is_special_numeral());
                hit.then_some(NUMERAL_GAP)
            }
            Self::DotLetterPair => {
                let hit = (a.is_dot() && b.is_letter_a()) || (a.is_letter_a() && b.is_dot());
                hit.then_some(0.0)
            }
            Self::BandLine => {
                let (pc, nc) = (prev.category(), next.category());
                let hit = (pc.is_band() && nc.joins_band()) || (nc.is_band() && pc.joins_band());
                hit.then_some(0.0)
            }
            Self::DotMarker => (a.is_dot() || b.is_dot()).then_some(DOT_GAP),
            Self::BandSeries => {
                let (ra, rb) = (a.band_role()?, b.band_role()?);
                let either = |role: BandRole| ra == role || rb == role;
                Some(if either(BandRole::Exit) {
                    BAND_EXIT_GAP
                } else if either(BandRole::Long) {
                    0.0
                } else if either(BandRole::Text) {
                    BAND_TEXT_GAP
                } else {
                    0.0
                })
            }
        }
    }
}

/// Ordered, first-match-wins spacing evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct SpacingEngine {
    rules: Vec<SpacingRule>,
    default_gap: f32,
}

impl Default for SpacingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_GAP)
    }
}

impl SpacingEngine {
    /// Creates an engine with the standard rule order and the given default gap.
    pub fn new(default_gap: f32) -> Self {
        Self {
            rules: SpacingRule::STANDARD.to_vec(),
            default_gap,
        }
    }

    /// Creates an engine with a custom rule order.
    pub fn with_rules(rules: impl Into<Vec<SpacingRule>>, default_gap: f32) -> Self {
        Self {
            rules: rules.into(),
            default_gap,
        }
    }

    pub fn rules(&self) -> &[SpacingRule] {
        &self.rules
    }

    pub fn default_gap(&self) -> f32 {
        self.default_gap
    }

    /// Gap between two neighbors, in logical units.
    pub fn spacing(&self, prev: &IconRef, next: &IconRef) -> f32 {
        self.rules
            .iter()
            .find_map(|rule| rule.evaluate(prev, next))
            .unwrap_or(self.default_gap)
    }

    /// Gap following each element of `items`; the last entry is always 0.
    pub fn gaps(&self, items: &[IconRef]) -> Vec<f32> {
        let mut gaps: Vec<f32> = items
            .windows(2)
            .map(|pair| self.spacing(&pair[0], &pair[1]))
            .collect();
        if !items.is_empty() {
            gaps.push(0.0);
        }
        gaps
    }
}

/// Spacing with the standard rules and an explicit default gap.
pub fn spacing(prev: &IconRef, next: &IconRef, default_gap: f32) -> f32 {
    SpacingEngine::new(default_gap).spacing(prev, next)
}

// ============================================================================
// Tests
// ============================================================================
