//! Element categories and glyph classification.
//!
//! Every placed element carries a [`Category`] and a [`Glyph`] tag. Both are
//! derived once from the asset name when the element is created (see
//! [`Category::from_asset_name`] and [`Glyph::classify`]) and never re-parsed
//! afterwards. Spacing and customization rules dispatch on these tags.

use serde::{Deserialize, Serialize};

// ============================================================================
// Category
// ============================================================================

/// Semantic category of a signage element.
///
/// Asset names follow the `<code>@<name>.svg` convention, where `<code>` is one
/// of the short codes listed below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum Category {
    #[serde(rename = "line")]
    Line,
    #[serde(rename = "way")]
    Way,
    #[serde(rename = "stn")]
    Station,
    #[serde(rename = "oth")]
    Other,
    /// Color band.
    #[serde(rename = "sub")]
    Sub,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "cls")]
    Class,
    #[serde(rename = "clss")]
    ClassSecondary,
    #[serde(rename = "exit")]
    Exit,
    #[serde(rename = "branch")]
    Branch,
    #[serde(rename = "ic")]
    Interchange,
    #[serde(rename = "turn")]
    Turn,
}

/// Behavior flags for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryTraits {
    /// Adjoins other bands and lines without a gap.
    pub band: bool,
    /// Bands merge into elements of this category.
    pub band_joinable: bool,
    /// Fill color may be customized.
    pub colorable: bool,
    /// May carry custom text content.
    pub textual: bool,
}

impl CategoryTraits {
    const fn new(band: bool, band_joinable: bool, colorable: bool, textual: bool) -> Self {
        Self {
            band,
            band_joinable,
            colorable,
            textual,
        }
    }
}

impl Category {
    /// All categories in palette order.
    pub const ALL: [Category; 12] = [
        Category::Line,
        Category::Way,
        Category::Station,
        Category::Other,
        Category::Sub,
        Category::Text,
        Category::Class,
        Category::ClassSecondary,
        Category::Exit,
        Category::Branch,
        Category::Interchange,
        Category::Turn,
    ];

    /// Returns the short code used as the asset name prefix.
    pub fn code(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Way => "way",
            Self::Station => "stn",
            Self::Other => "oth",
            Self::Sub => "sub",
            Self::Text => "text",
            Self::Class => "cls",
            Self::ClassSecondary => "clss",
            Self::Exit => "exit",
            Self::Branch => "branch",
            Self::Interchange => "ic",
            Self::Turn => "turn",
        }
    }

    /// Looks up a category by its short code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Derives the category from an asset name such as `line@01.svg`.
    ///
    /// Returns `None` if the name has no `@` or the prefix is unknown.
    pub fn from_asset_name(name: &str) -> Option<Self> {
        let (prefix, _) = name.split_once('@')?;
        Self::from_code(prefix)
    }

    /// Returns the behavior table entry for this category.
    pub fn traits(self) -> CategoryTraits {
        match self {
            Self::Sub => CategoryTraits::new(true, true, true, true),
            Self::Line => CategoryTraits::new(false, true, false, false),
            Self::Text => CategoryTraits::new(false, false, false, true),
            Self::Class | Self::ClassSecondary => CategoryTraits::new(false, false, true, false),
            _ => CategoryTraits::new(false, false, false, false),
        }
    }

    /// Returns true for color-band elements.
    pub fn is_band(self) -> bool {
        self.traits().band
    }

    /// Returns true if a color band adjoins this category with no gap.
    pub fn joins_band(self) -> bool {
        self.traits().band_joinable
    }

    /// Returns true if the fill color of this category may be customized.
    pub fn is_colorable(self) -> bool {
        self.traits().colorable
    }

    /// Returns true if this category may carry custom text.
    pub fn accepts_text(self) -> bool {
        self.traits().textual
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Glyph
// ============================================================================

/// Role of a member of the extended color-band series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandRole {
    Plain,
    Exit,
    Long,
    Text,
}

/// Fine-grained classification of specific pictograms that spacing rules
/// single out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Glyph {
    /// No special spacing behavior.
    #[default]
    Plain,
    /// One of the numeral glyphs `oth@one|two|thr|fou`.
    SpecialNumeral,
    /// Member of the numbered plate series `oth@01`..`oth@30` or `oth@A`.
    SeriesPlate { letter_a: bool },
    /// The dot marker `oth@Dot`.
    Dot,
    /// Member of the extended color-band series.
    Band { role: BandRole },
}

impl Glyph {
    /// Classifies an asset name.
    pub fn classify(name: &str) -> Self {
        let Some(stem) = name.strip_suffix(".svg") else {
            return Self::Plain;
        };
        let Some((prefix, rest)) = stem.split_once('@') else {
            return Self::Plain;
        };

        match prefix {
            "oth" => match rest {
                "one" | "two" | "thr" | "fou" => Self::SpecialNumeral,
                "Dot" => Self::Dot,
                "A" => Self::SeriesPlate { letter_a: true },
                n if two_digit_in(n, 1, 30) => Self::SeriesPlate { letter_a: false },
                _ => Self::Plain,
            },
            "sub" => match rest {
                "exit" => Self::Band {
                    role: BandRole::Exit,
                },
                "long" => Self::Band {
                    role: BandRole::Long,
                },
                "text" => Self::Band {
                    role: BandRole::Text,
                },
                "space" => Self::Band {
                    role: BandRole::Plain,
                },
                n if two_digit_in(n, 3, 20) => Self::Band {
                    role: BandRole::Plain,
                },
                _ => Self::Plain,
            },
            _ => Self::Plain,
        }
    }

    pub fn is_special_numeral(self) -> bool {
        matches!(self, Self::SpecialNumeral)
    }

    pub fn is_series_plate(self) -> bool {
        matches!(self, Self::SeriesPlate { .. })
    }

    pub fn is_letter_a(self) -> bool {
        matches!(self, Self::SeriesPlate { letter_a: true })
    }

    pub fn is_dot(self) -> bool {
        matches!(self, Self::Dot)
    }

    /// Returns the band role if this glyph belongs to the band series.
    pub fn band_role(self) -> Option<BandRole> {
        match self {
            Self::Band { role } => Some(role),
            _ => None,
        }
    }
}

/// Matches exactly two ASCII digits whose value lies in `lo..=hi`.
fn two_digit_in(s: &str, lo: u8, hi: u8) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let value = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    (lo..=hi).contains(&value)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_asset_name() {
        assert_eq!(Category::from_asset_name("line@01.svg"), Some(Category::Line));
        assert_eq!(Category::from_asset_name("clss@02.svg"), Some(Category::ClassSecondary));
        assert_eq!(Category::from_asset_name("ic@x.svg"), Some(Category::Interchange));
        assert_eq!(Category::from_asset_name("nope@01.svg"), None);
        assert_eq!(Category::from_asset_name("line.svg"), None);
    }

    #[test]
    fn code_roundtrip() {
        for category in Category::ALL {
            assert_eq!(Category::from_code(category.code()), Some(category));
        }
    }

    #[test]
    fn behavior_table() {
        assert!(Category::Sub.is_band());
        assert!(Category::Sub.joins_band());
        assert!(Category::Line.joins_band());
        assert!(!Category::Line.is_band());
        assert!(!Category::Way.joins_band());

        assert!(Category::Sub.is_colorable());
        assert!(Category::Class.is_colorable());
        assert!(Category::ClassSecondary.is_colorable());
        assert!(!Category::Text.is_colorable());

        assert!(Category::Text.accepts_text());
        assert!(Category::Sub.accepts_text());
        assert!(!Category::Line.accepts_text());
    }

    #[test]
    fn classify_other_series() {
        assert_eq!(Glyph::classify("oth@one.svg"), Glyph::SpecialNumeral);
        assert_eq!(Glyph::classify("oth@fou.svg"), Glyph::SpecialNumeral);
        assert_eq!(Glyph::classify("oth@Dot.svg"), Glyph::Dot);
        assert!(Glyph::classify("oth@01.svg").is_series_plate());
        assert!(Glyph::classify("oth@30.svg").is_series_plate());
        assert!(Glyph::classify("oth@A.svg").is_letter_a());
        assert_eq!(Glyph::classify("oth@00.svg"), Glyph::Plain);
        assert_eq!(Glyph::classify("oth@31.svg"), Glyph::Plain);
        assert_eq!(Glyph::classify("oth@B.svg"), Glyph::Plain);
    }

    #[test]
    fn classify_band_series() {
        assert_eq!(Glyph::classify("sub@exit.svg").band_role(), Some(BandRole::Exit));
        assert_eq!(Glyph::classify("sub@long.svg").band_role(), Some(BandRole::Long));
        assert_eq!(Glyph::classify("sub@text.svg").band_role(), Some(BandRole::Text));
        assert_eq!(Glyph::classify("sub@space.svg").band_role(), Some(BandRole::Plain));
        assert_eq!(Glyph::classify("sub@03.svg").band_role(), Some(BandRole::Plain));
        assert_eq!(Glyph::classify("sub@20.svg").band_role(), Some(BandRole::Plain));
        // The left/right band templates are not part of the series.
        assert_eq!(Glyph::classify("sub@01.svg").band_role(), None);
        assert_eq!(Glyph::classify("sub@21.svg").band_role(), None);
        assert_eq!(Glyph::classify("sub@custom-1.svg").band_role(), None);
    }
}
