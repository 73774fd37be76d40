//! SVG utilities shared by the generators and the export compositors.
//!
//! Covers view-box inspection, identity stripping for merging many elements
//! into one document, fill recoloring, and rasterization through resvg.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, Options, Tree};

/// Errors raised while parsing or rasterizing element markup.
#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    #[error("malformed SVG markup: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("SVG could not be rendered: {0}")]
    Render(#[from] usvg::Error),
    #[error("root element is not <svg>")]
    NotSvg,
}

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

// ============================================================================
// View box
// ============================================================================

/// The coordinate system declared by an SVG root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewBox {
    pub fn new(min_x: f32, min_y: f32, width: f32, height: f32) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Reads the root `viewBox`, falling back to the `width`/`height` attributes.
pub fn parse_view_box(markup: &str) -> Option<ViewBox> {
    let doc = roxmltree::Document::parse(markup).ok()?;
    root_view_box(doc.root_element())
}

/// Returns the intrinsic aspect ratio of an SVG document.
pub fn aspect_ratio(markup: &str) -> Option<f32> {
    parse_view_box(markup).map(|vb| vb.aspect_ratio())
}

fn root_view_box(root: roxmltree::Node<'_, '_>) -> Option<ViewBox> {
    if let Some(raw) = root.attribute("viewBox") {
        let nums: Vec<f32> = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        if let [min_x, min_y, width, height] = nums[..] {
            let vb = ViewBox::new(min_x, min_y, width, height);
            if vb.is_valid() {
                return Some(vb);
            }
        }
    }

    let width = root.attribute("width").and_then(parse_length)?;
    let height = root.attribute("height").and_then(parse_length)?;
    let vb = ViewBox::new(0.0, 0.0, width, height);
    vb.is_valid().then_some(vb)
}

fn parse_length(raw: &str) -> Option<f32> {
    raw.trim().trim_end_matches("px").trim().parse().ok()
}

// ============================================================================
// Identity stripping
// ============================================================================

/// The inner markup of an element document, ready to be embedded in a group.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgFragment {
    pub view_box: Option<ViewBox>,
    pub body: String,
}

/// Serializes the children of the root `<svg>` with `id` and `class`
/// removed from each direct child.
///
/// Nested descendants keep their attributes so that styles scoped inside a
/// child group continue to apply.
pub fn strip_child_identity(markup: &str) -> Result<SvgFragment, SvgError> {
    let doc = roxmltree::Document::parse(markup)?;
    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(SvgError::NotSvg);
    }

    let mut body = String::with_capacity(markup.len());
    for child in root.children() {
        write_node(&mut body, child, true);
    }

    Ok(SvgFragment {
        view_box: root_view_box(root),
        body,
    })
}

fn write_node(out: &mut String, node: roxmltree::Node<'_, '_>, strip: bool) {
    if node.is_text() {
        if let Some(text) = node.text() {
            out.push_str(&escape_text(text));
        }
        return;
    }
    if !node.is_element() {
        return;
    }

    let name = qualified_name(node.tag_name().namespace(), node.tag_name().name());
    out.push('<');
    out.push_str(&name);
    for attr in node.attributes() {
        if strip && attr.namespace().is_none() && matches!(attr.name(), "id" | "class") {
            continue;
        }
        out.push(' ');
        out.push_str(&qualified_name(attr.namespace(), attr.name()));
        out.push_str("=\"");
        out.push_str(&escape_attr(attr.value()));
        out.push('"');
    }

    if !node.has_children() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in node.children() {
        write_node(out, child, false);
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn qualified_name(namespace: Option<&str>, local: &str) -> String {
    match namespace {
        Some(XLINK_NS) => format!("xlink:{local}"),
        Some(XML_NS) => format!("xml:{local}"),
        Some(SVG_NS) | None => local.to_string(),
        Some(_) => local.to_string(),
    }
}

/// Escapes character data for inclusion in SVG text content.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes a value for a double-quoted attribute.
pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

// ============================================================================
// Recoloring
// ============================================================================

/// Replaces every hex fill color with `color`.
///
/// Handles `fill="#rrggbb"` / `fill='#rgb'` attributes and `fill:#rrggbb`
/// declarations inside `style` attributes or `<style>` blocks. `none` and
/// `transparent` are preserved. Returns the new markup and the number of
/// replacements made.
pub fn replace_fill_colors(svg: &str, color: &str) -> (String, usize) {
    let mut result = String::with_capacity(svg.len());
    let mut count = 0;
    let mut remaining = svg;

    while let Some(start) = remaining.find("fill") {
        let after_name = &remaining[start + "fill".len()..];
        result.push_str(&remaining[..start + "fill".len()]);
        remaining = after_name;

        // Only `fill=` and `fill:` forms, not `fill-opacity` or `fill-rule`.
        let Some(sep) = remaining.chars().next().filter(|c| *c == '=' || *c == ':') else {
            continue;
        };
        result.push(sep);
        remaining = &remaining[1..];

        let trimmed = remaining.trim_start();
        result.push_str(&remaining[..remaining.len() - trimmed.len()]);
        remaining = trimmed;

        let quote = remaining.chars().next().filter(|c| *c == '"' || *c == '\'');
        if let Some(q) = quote {
            result.push(q);
            remaining = &remaining[1..];
        }

        let value_len = remaining
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_hexdigit() || *c == '#'))
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let value = &remaining[..value_len];

        if is_hex_color(value) {
            result.push_str(color);
            count += 1;
        } else {
            result.push_str(value);
        }
        remaining = &remaining[value_len..];
    }

    result.push_str(remaining);
    (result, count)
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

// ============================================================================
// Rasterization
// ============================================================================

/// Builds usvg options with system fonts plus any supplied font data.
pub fn render_options(font_data: Option<Arc<[u8]>>) -> Options<'static> {
    let mut opt = Options::default();
    opt.fontdb_mut().load_system_fonts();
    if let Some(data) = font_data {
        opt.fontdb_mut().load_font_data(data.to_vec());
    }
    opt
}

/// Renders `markup` into `pixmap`, stretched to fill the rectangle at
/// (`x`, 0) with the given pixel size.
pub fn render_into(
    pixmap: &mut Pixmap,
    markup: &str,
    opt: &Options<'_>,
    x: f32,
    width: f32,
    height: f32,
) -> Result<(), SvgError> {
    let tree = Tree::from_str(markup, opt)?;
    let size = tree.size();
    let transform = Transform::from_translate(x, 0.0)
        .pre_scale(width / size.width(), height / size.height());
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    Ok(())
}

/// Converts a tiny_skia Pixmap to an image::RgbaImage.
pub fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let width = pixmap.width();
    let height = pixmap.height();
    let mut img = RgbaImage::new(width, height);

    for (pixel, out) in pixmap.pixels().iter().zip(img.pixels_mut()) {
        // tiny_skia uses premultiplied alpha, we need to unpremultiply
        let (r, g, b, a) = unpremultiply(pixel.red(), pixel.green(), pixel.blue(), pixel.alpha());
        *out = Rgba([r, g, b, a]);
    }

    img
}

/// Unpremultiplies a premultiplied alpha pixel.
fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> (u8, u8, u8, u8) {
    if a == 0 {
        (0, 0, 0, 0)
    } else {
        let a_f = a as f32 / 255.0;
        (
            (r as f32 / a_f).round().min(255.0) as u8,
            (g as f32 / a_f).round().min(255.0) as u8,
            (b as f32 / a_f).round().min(255.0) as u8,
            a,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use resvg::tiny_skia::Color;

    const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 150 150"><rect width="150" height="150" fill="#ff0000"/></svg>"##;

    #[test]
    fn view_box_from_attribute() {
        let vb = parse_view_box(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 300 150"/>"#)
            .unwrap();
        assert_eq!(vb, ViewBox::new(0.0, 0.0, 300.0, 150.0));
        assert_eq!(vb.aspect_ratio(), 2.0);
    }

    #[test]
    fn view_box_with_commas_and_fallback_to_size() {
        let vb = parse_view_box(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="10,5,75,150"/>"#)
            .unwrap();
        assert_eq!(vb.min_x, 10.0);
        assert_eq!(vb.aspect_ratio(), 0.5);

        let ratio =
            aspect_ratio(r#"<svg xmlns="http://www.w3.org/2000/svg" width="450px" height="150"/>"#);
        assert_eq!(ratio, Some(3.0));

        assert_eq!(aspect_ratio(r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#), None);
        assert_eq!(aspect_ratio("not svg"), None);
    }

    #[test]
    fn strip_removes_ids_and_classes_from_direct_children() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 150"><g id="a" class="cls-1" opacity="0.5"><path id="inner" class="cls-2" d="M0 0"/></g><rect class="x" width="1" height="1"/></svg>"#;
        let fragment = strip_child_identity(markup).unwrap();

        assert_eq!(fragment.view_box.unwrap().width, 100.0);
        assert!(fragment.body.starts_with(r#"<g opacity="0.5">"#));
        assert!(fragment.body.contains(r#"<path id="inner" class="cls-2" d="M0 0"/>"#));
        assert!(fragment.body.contains(r#"<rect width="1" height="1"/>"#));
        assert!(!fragment.body.contains(r#"id="a""#));
    }

    #[test]
    fn strip_keeps_xlink_prefix_and_escapes_text() {
        let markup = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><use xlink:href="#p"/><text>A &amp; B</text></svg>"##;
        let fragment = strip_child_identity(markup).unwrap();
        assert!(fragment.body.contains(r##"<use xlink:href="#p"/>"##));
        assert!(fragment.body.contains("<text>A &amp; B</text>"));
    }

    #[test]
    fn strip_rejects_non_svg_root() {
        assert!(matches!(
            strip_child_identity("<html/>"),
            Err(SvgError::NotSvg)
        ));
        assert!(matches!(strip_child_identity("<svg"), Err(SvgError::Xml(_))));
    }

    #[test]
    fn replace_fill_colors_handles_attribute_and_style_forms() {
        let svg = r##"<path fill="#003670"/><path style="fill:#3670ab;stroke:#000"/><rect fill='#abc'/><g fill="none" fill-rule="evenodd"/>"##;
        let (out, count) = replace_fill_colors(svg, "#ff0000");
        assert_eq!(count, 3);
        assert!(out.contains(r##"<path fill="#ff0000"/>"##));
        assert!(out.contains("fill:#ff0000;stroke:#000"));
        assert!(out.contains("fill='#ff0000'"));
        assert!(out.contains(r#"fill="none" fill-rule="evenodd""#));
    }

    #[test]
    fn replace_fill_colors_without_matches() {
        let (out, count) = replace_fill_colors("<svg/>", "#ffffff");
        assert_eq!(out, "<svg/>");
        assert_eq!(count, 0);
    }

    #[test]
    fn render_into_fills_slot() {
        let mut pixmap = Pixmap::new(40, 20).unwrap();
        pixmap.fill(Color::from_rgba8(0, 0, 255, 255));
        let opt = Options::default();

        render_into(&mut pixmap, SQUARE, &opt, 20.0, 20.0, 20.0).unwrap();
        let img = pixmap_to_rgba_image(&pixmap);

        assert_eq!(img.get_pixel(5, 10).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(30, 10).0, [255, 0, 0, 255]);
    }

    #[test]
    fn unpremultiply_transparent() {
        assert_eq!(unpremultiply(10, 10, 10, 0), (0, 0, 0, 0));
        assert_eq!(unpremultiply(128, 0, 0, 128), (255, 0, 0, 128));
    }
}
