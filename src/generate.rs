//! Generated element content: bilingual text, text over a color band, plain
//! color bands, and recolored pictograms.
//!
//! Every generator produces SVG markup, registers it in the
//! [`BlobRegistry`](crate::asset::BlobRegistry) and returns a [`Generated`]
//! value carrying the synthetic file name, the `blob:` URL and the
//! [`CustomContent`] that describes it. Failures are reported as
//! [`GenerationError`]s with a machine-readable code; none of them are fatal
//! to the editor.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use palette::Srgb;
use serde::Serialize;

use crate::asset::{AssetResolver, Blob};
use crate::category::Category;
use crate::font::{
    CN_FONT_FAMILY, EN_FONT_FAMILY, FontResource, FontSpec, HeuristicMeasurer, TextMeasurer,
    font_face_css,
};
use crate::layout::RENDER_HEIGHT;
use crate::sequence::{Alignment, CustomContent, IconRef, InvalidCustomization, TextContent};
use crate::svg::{self, escape_attr, escape_text};

// Free-standing text.
const TEXT_CN: FontSpec = FontSpec::new(CN_FONT_FAMILY, 500, 54.68);
const TEXT_EN: FontSpec = FontSpec::new(EN_FONT_FAMILY, 700, 34.4);
const TEXT_CN_Y: f32 = 71.81;
const TEXT_EN_Y: f32 = 115.0;
const TEXT_PADDING: f32 = 5.0;

// Text above a color band.
const BAND_CN: FontSpec = FontSpec::new(CN_FONT_FAMILY, 500, 47.63);
const BAND_EN: FontSpec = FontSpec::new(EN_FONT_FAMILY, 700, 26.46);
const BAND_CN_Y: f32 = 65.61;
const BAND_EN_Y: f32 = 99.0;
const BAND_PADDING: f32 = 2.0;
const BAND_TOP: f32 = 110.0;
const BAND_HEIGHT: f32 = 40.0;

const LABEL_FILL: &str = "#fff";

// ============================================================================
// Errors
// ============================================================================

/// Machine-readable generation failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    TextGenerationError,
    ColorGenerationError,
    FontNotReady,
    InvalidColor,
    NotColorable,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextGenerationError => "TEXT_GENERATION_ERROR",
            Self::ColorGenerationError => "COLOR_GENERATION_ERROR",
            Self::FontNotReady => "FONT_NOT_READY",
            Self::InvalidColor => "INVALID_COLOR",
            Self::NotColorable => "NOT_COLORABLE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic context attached to a [`GenerationError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Generator that failed.
    pub source: &'static str,
    /// Inputs and underlying error text.
    pub context: BTreeMap<String, String>,
}

/// A failed content generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct GenerationError {
    pub code: ErrorCode,
    pub message: String,
    pub details: ErrorDetails,
}

impl GenerationError {
    fn new(code: ErrorCode, source: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: ErrorDetails {
                timestamp: chrono::Utc::now().timestamp_millis(),
                source,
                context: BTreeMap::new(),
            },
        }
    }

    fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.details.context.insert(key.to_string(), value.to_string());
        self
    }
}

// ============================================================================
// Colors
// ============================================================================

/// Parses a user color and normalizes it to lowercase `#rrggbb`.
///
/// Accepts `#rgb`, `#rrggbb` and the same forms without the leading `#`.
pub fn normalize_color(input: &str) -> Result<String, GenerationError> {
    let trimmed = input.trim();
    let color = Srgb::<u8>::from_str(trimmed).map_err(|err| {
        GenerationError::new(
            ErrorCode::InvalidColor,
            "normalize_color",
            format!("`{trimmed}` is not a valid hex color"),
        )
        .with("color", trimmed)
        .with("error", err)
    })?;
    Ok(format!(
        "#{:02x}{:02x}{:02x}",
        color.red, color.green, color.blue
    ))
}

// ============================================================================
// Generated
// ============================================================================

/// Which end of a line a plain color band attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandSide {
    #[default]
    Left,
    Right,
}

impl BandSide {
    /// Asset used as the band template.
    pub fn template(self) -> &'static str {
        match self {
            Self::Left => "sub@01.svg",
            Self::Right => "sub@02.svg",
        }
    }
}

/// Output of a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    /// Synthetic asset name; its prefix determines the category.
    pub file: String,
    /// `blob:` URL of the registered markup.
    pub url: String,
    pub content: CustomContent,
}

impl Generated {
    /// Creates a new element for this content.
    pub fn into_icon(self) -> Result<IconRef, InvalidCustomization> {
        IconRef::generated(self.file, self.url, self.content)
    }

    /// Replaces the source and content of `icon`, keeping its id.
    pub fn apply_to(self, icon: &IconRef) -> Result<IconRef, InvalidCustomization> {
        icon.customized(self.file, self.url, self.content)
    }
}

// ============================================================================
// ContentGenerator
// ============================================================================

/// Builds generated element content.
#[derive(Clone)]
pub struct ContentGenerator {
    resolver: AssetResolver,
    font: FontResource,
    measurer: Arc<dyn TextMeasurer + Send + Sync>,
}

impl std::fmt::Debug for ContentGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentGenerator")
            .field("resolver", &self.resolver)
            .field("font_ready", &self.font.is_ready())
            .finish_non_exhaustive()
    }
}

impl ContentGenerator {
    /// Creates a generator using the heuristic text measurer.
    pub fn new(resolver: AssetResolver, font: FontResource) -> Self {
        Self::with_measurer(resolver, font, Arc::new(HeuristicMeasurer::default()))
    }

    pub fn with_measurer(
        resolver: AssetResolver,
        font: FontResource,
        measurer: Arc<dyn TextMeasurer + Send + Sync>,
    ) -> Self {
        Self {
            resolver,
            font,
            measurer,
        }
    }

    pub fn font(&self) -> &FontResource {
        &self.font
    }

    /// Generates a free-standing bilingual text element.
    pub fn text(&self, text: TextContent) -> Result<Generated, GenerationError> {
        const SOURCE: &str = "generate_text";
        check_text(&text, SOURCE)?;
        let font_css = self.font_css(SOURCE)?;

        let cn_width = self.measurer.measure(&text.cn, &TEXT_CN);
        let en_width = self.measurer.measure(&text.en, &TEXT_EN);
        let width = cn_width.max(en_width) + TEXT_PADDING;
        let x = anchor_x(text.alignment, width);
        let anchor = text.alignment.text_anchor();

        let mut markup = open_svg(width, &font_css);
        write_label(&mut markup, &text.cn, x, TEXT_CN_Y, anchor, &TEXT_CN);
        write_label(&mut markup, &text.en, x, TEXT_EN_Y, anchor, &TEXT_EN);
        markup.push_str("</svg>");

        let file = format!("text@custom-{}.svg", timestamp());
        tracing::info!(%file, width, "generated text element");
        Ok(self.register(file, &markup, CustomContent::Text(text)))
    }

    /// Generates bilingual text above a color band.
    pub fn text_band(&self, text: TextContent, color: &str) -> Result<Generated, GenerationError> {
        const SOURCE: &str = "generate_text_band";
        check_text(&text, SOURCE)?;
        let color = normalize_color(color)?;
        let font_css = self.font_css(SOURCE)?;

        let cn_width = self.measurer.measure(&text.cn, &BAND_CN);
        let en_width = self.measurer.measure(&text.en, &BAND_EN);
        let width = (cn_width.max(en_width) + BAND_PADDING).ceil();
        let x = anchor_x(text.alignment, width);
        let anchor = text.alignment.text_anchor();

        let mut markup = open_svg(width, &font_css);
        markup.push_str("<g>");
        write_label(&mut markup, &text.cn, x, BAND_CN_Y, anchor, &BAND_CN);
        write_label(&mut markup, &text.en, x, BAND_EN_Y, anchor, &BAND_EN);
        markup.push_str("</g>");
        let _ = write!(
            markup,
            r#"<g><rect x="0" y="{BAND_TOP}" width="{width}" height="{BAND_HEIGHT}" fill="{color}"/></g>"#
        );
        markup.push_str("</svg>");

        let file = format!("sub@text-custom-{}.svg", timestamp());
        tracing::info!(%file, width, %color, "generated text band");
        Ok(self.register(file, &markup, CustomContent::TextBand { text, color }))
    }

    /// Generates a plain color band from the left or right template.
    pub fn band(&self, side: BandSide, color: &str) -> Result<Generated, GenerationError> {
        const SOURCE: &str = "generate_band";
        let color = normalize_color(color)?;
        let template = side.template();
        let markup = self.load_template(template, SOURCE)?;
        let (markup, replaced) = svg::replace_fill_colors(&markup, &color);
        if replaced == 0 {
            tracing::warn!(%template, "band template has no replaceable fill colors");
        }

        let file = format!("sub@custom-{}.svg", timestamp());
        tracing::info!(%file, %template, %color, "generated color band");
        Ok(self.register(file, &markup, CustomContent::Color(color)))
    }

    /// Recolors an existing pictogram.
    ///
    /// Only categories that allow color customization are accepted.
    pub fn recolor(&self, file: &str, color: &str) -> Result<Generated, GenerationError> {
        const SOURCE: &str = "recolor";
        let colorable = Category::from_asset_name(file).is_some_and(Category::is_colorable);
        if !colorable {
            return Err(GenerationError::new(
                ErrorCode::NotColorable,
                SOURCE,
                format!("`{file}` cannot be recolored"),
            )
            .with("file", file));
        }
        let color = normalize_color(color)?;
        let markup = self.load_template(file, SOURCE)?;
        let (markup, replaced) = svg::replace_fill_colors(&markup, &color);
        if replaced == 0 {
            tracing::warn!(%file, "no replaceable fill colors found");
        }

        let stem = file.split('.').next().unwrap_or(file);
        let generated = format!("{stem}_{}.svg", color.trim_start_matches('#'));
        tracing::info!(from = %file, to = %generated, "recolored element");
        Ok(self.register(generated, &markup, CustomContent::Color(color)))
    }

    fn font_css(&self, source: &'static str) -> Result<String, GenerationError> {
        font_face_css(&self.font).ok_or_else(|| {
            GenerationError::new(
                ErrorCode::FontNotReady,
                source,
                "fonts are still loading, try again shortly",
            )
        })
    }

    fn load_template(&self, file: &str, source: &'static str) -> Result<String, GenerationError> {
        self.resolver.load_svg(file).map_err(|err| {
            GenerationError::new(
                ErrorCode::ColorGenerationError,
                source,
                format!("failed to load `{file}`"),
            )
            .with("file", file)
            .with("error", err)
        })
    }

    fn register(&self, file: String, markup: &str, content: CustomContent) -> Generated {
        let url = self.resolver.blobs().register(Blob::svg(markup));
        Generated { file, url, content }
    }
}

fn check_text(text: &TextContent, source: &'static str) -> Result<(), GenerationError> {
    if text.cn.trim().is_empty() && text.en.trim().is_empty() {
        return Err(
            GenerationError::new(ErrorCode::TextGenerationError, source, "text is empty")
                .with("alignment", text.alignment.text_anchor()),
        );
    }
    Ok(())
}

fn timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn anchor_x(alignment: Alignment, width: f32) -> f32 {
    match alignment {
        Alignment::Start => 0.0,
        Alignment::Middle => width / 2.0,
        Alignment::End => width,
    }
}

fn open_svg(width: f32, font_css: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{RENDER_HEIGHT}" viewBox="0 0 {width} {RENDER_HEIGHT}"><defs><style>{font_css}</style></defs>"#
    )
}

// Labels are styled with presentation attributes rather than classes so they
// survive identity stripping in the vector export.
fn write_label(out: &mut String, text: &str, x: f32, y: f32, anchor: &str, font: &FontSpec) {
    let _ = write!(
        out,
        r#"<text x="{x}" y="{y}" text-anchor="{anchor}" font-family="{}" font-size="{}" font-weight="{}" fill="{LABEL_FILL}">{}</text>"#,
        escape_attr(font.family),
        font.size,
        font.weight,
        escape_text(text),
    );
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{BlobRegistry, MemoryAssets};

    const BAND_TEMPLATE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 40 150"><rect width="40" height="150" fill="#003670"/></svg>"##;

    fn generator(font_ready: bool) -> ContentGenerator {
        let assets = MemoryAssets::new()
            .with("sub@01.svg", BAND_TEMPLATE)
            .with("sub@02.svg", BAND_TEMPLATE)
            .with(
                "cls@01.svg",
                r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 150 150"><style>.a{fill:#3670ab}</style><path class="a" d="M0 0h1"/></svg>"##,
            );
        let resolver = AssetResolver::new(Arc::new(assets), BlobRegistry::new());
        let font = if font_ready {
            FontResource::from_bytes(b"\0\x01\0\0font".to_vec()).unwrap()
        } else {
            FontResource::new()
        };
        ContentGenerator::new(resolver, font)
    }

    fn markup(generator: &ContentGenerator, generated: &Generated) -> String {
        generator.resolver.load_svg(&generated.url).unwrap()
    }

    #[test]
    fn text_element_width_and_layout() {
        let generator = generator(true);
        let text = TextContent::new("出口", "Exit & <Way>", Alignment::Middle);
        let generated = generator.text(text.clone()).unwrap();

        assert!(generated.file.starts_with("text@custom-"));
        assert_eq!(generated.content, CustomContent::Text(text));

        let svg = markup(&generator, &generated);
        let cn = HeuristicMeasurer::default().measure("出口", &TEXT_CN);
        let en = HeuristicMeasurer::default().measure("Exit & <Way>", &TEXT_EN);
        let width = cn.max(en) + 5.0;
        assert_eq!(svg::aspect_ratio(&svg), Some(width / 150.0));
        assert!(svg.contains(r#"y="71.81""#));
        assert!(svg.contains(r#"y="115""#));
        assert!(svg.contains(r#"text-anchor="middle""#));
        assert!(svg.contains("Exit &amp; &lt;Way&gt;"));
        assert!(svg.contains("@font-face"));

        let icon = generated.into_icon().unwrap();
        assert_eq!(icon.category(), Category::Text);
    }

    #[test]
    fn text_requires_font() {
        let err = generator(false)
            .text(TextContent::new("出口", "Exit", Alignment::Start))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FontNotReady);
        assert_eq!(err.details.source, "generate_text");
    }

    #[test]
    fn empty_text_is_rejected() {
        let err = generator(true)
            .text(TextContent::new(" ", "", Alignment::Start))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TextGenerationError);
    }

    #[test]
    fn text_band_has_band_rect_and_integer_width() {
        let generator = generator(true);
        let generated = generator
            .text_band(TextContent::new("换乘", "Transfer", Alignment::End), "#FF0000")
            .unwrap();
        assert!(generated.file.starts_with("sub@text-custom-"));

        let svg = markup(&generator, &generated);
        let vb = svg::parse_view_box(&svg).unwrap();
        assert_eq!(vb.width, vb.width.ceil());
        assert!(svg.contains(r##"y="110""##));
        assert!(svg.contains(r##"fill="#ff0000""##));
        assert!(svg.contains(r#"y="65.61""#));

        let icon = generated.into_icon().unwrap();
        assert_eq!(icon.category(), Category::Sub);
        assert_eq!(icon.custom_content().and_then(CustomContent::color), Some("#ff0000"));
    }

    #[test]
    fn band_recolors_template() {
        let generator = generator(false);
        let generated = generator.band(BandSide::Right, "0a0").unwrap();
        assert!(generated.file.starts_with("sub@custom-"));
        assert_eq!(generated.content, CustomContent::Color("#00aa00".into()));

        let svg = markup(&generator, &generated);
        assert!(svg.contains(r##"fill="#00aa00""##));
        assert!(!svg.contains("#003670"));
    }

    #[test]
    fn invalid_color_is_reported() {
        let err = generator(false).band(BandSide::Left, "red-ish").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidColor);
        assert_eq!(err.details.context.get("color").map(String::as_str), Some("red-ish"));
    }

    #[test]
    fn recolor_names_file_after_color() {
        let generator = generator(false);
        let generated = generator.recolor("cls@01.svg", "#123abc").unwrap();
        assert_eq!(generated.file, "cls@01_123abc.svg");
        assert!(markup(&generator, &generated).contains("fill:#123abc"));
    }

    #[test]
    fn recolor_rejects_other_categories_and_missing_assets() {
        let generator = generator(false);
        let err = generator.recolor("way@01.svg", "#123abc").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotColorable);

        let err = generator.recolor("clss@09.svg", "#123abc").unwrap_err();
        assert_eq!(err.code, ErrorCode::ColorGenerationError);
        assert!(err.details.context.contains_key("error"));
    }

    #[test]
    fn error_serializes_with_code() {
        let err = generator(false).band(BandSide::Left, "nope").unwrap_err();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_COLOR");
        assert_eq!(json["details"]["source"], "normalize_color");
    }
}
