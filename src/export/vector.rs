//! Merged SVG export.

use std::fmt::Write as _;

use super::{
    ExportArtifact, ExportError, ExportOptions, check_preconditions, export_geometry,
    resolve_items,
};
use crate::asset::{AssetResolver, SVG_MIME};
use crate::font::{FontResource, font_face_css};
use crate::layout::{AspectCache, RENDER_HEIGHT};
use crate::sequence::IconRef;
use crate::svg;

const FILE_STEM: &str = "signage";

/// Renders `items` into a single SVG document at scale 1.
pub fn render_vector(
    items: &[IconRef],
    resolver: &AssetResolver,
    font: &FontResource,
    options: &ExportOptions,
) -> Result<ExportArtifact, ExportError> {
    compose(items, resolver, font, None, options)
}

pub(super) fn compose(
    items: &[IconRef],
    resolver: &AssetResolver,
    font: &FontResource,
    cache: Option<&AspectCache>,
    options: &ExportOptions,
) -> Result<ExportArtifact, ExportError> {
    check_preconditions(items, font)?;
    let background = options.background_rgb()?;

    let resolved = resolve_items(items, resolver, cache);
    let geometry = export_geometry(items, &resolved, options, 1.0);
    let total = geometry.total_width;

    let mut doc = String::new();
    let _ = write!(
        doc,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{total}" height="{RENDER_HEIGHT}" viewBox="0 0 {total} {RENDER_HEIGHT}">"#
    );
    doc.push_str(r#"<defs><style type="text/css">"#);
    if let Some(css) = font_face_css(font) {
        doc.push_str(&css);
    }
    doc.push_str("@font-face { font-family: 'Arial-Bold'; src: local('Arial Bold'); }");
    doc.push_str("</style></defs>");
    let _ = write!(
        doc,
        r##"<rect width="100%" height="100%" fill="#{:02x}{:02x}{:02x}"/>"##,
        background.red, background.green, background.blue
    );

    let mut drawn = 0;
    for ((icon, item), slot) in items.iter().zip(&resolved).zip(&geometry.slots) {
        let Some(markup) = item.markup.as_deref() else {
            continue;
        };
        let fragment = match svg::strip_child_identity(markup) {
            Ok(fragment) => fragment,
            Err(err) => {
                tracing::warn!(id = %icon.id(), source = %icon.render_source(), %err, "skipping element that failed to parse");
                continue;
            }
        };

        let x = slot.rect.x;
        let mut transform = format!("translate({x},0)");
        if let Some(vb) = fragment.view_box {
            let sx = slot.rect.width / vb.width;
            let sy = slot.rect.height / vb.height;
            let _ = write!(transform, " scale({sx},{sy})");
            if vb.min_x != 0.0 || vb.min_y != 0.0 {
                let _ = write!(transform, " translate({},{})", 0.0 - vb.min_x, 0.0 - vb.min_y);
            }
        }
        let _ = write!(doc, r#"<g transform="{transform}">"#);
        doc.push_str(&fragment.body);
        doc.push_str("</g>");
        drawn += 1;
    }
    doc.push_str("</svg>");

    let file_name = format!("{FILE_STEM}_{}.svg", chrono::Utc::now().format("%Y-%m-%d"));
    tracing::info!(width = total, drawn, total_items = items.len(), %file_name, "vector export finished");
    Ok(ExportArtifact {
        file_name,
        mime: SVG_MIME,
        bytes: doc.into_bytes(),
    })
}
