//! JPEG export.

use image::DynamicImage;
use resvg::tiny_skia::{Color, Pixmap};
use resvg::usvg;

use super::{
    ExportArtifact, ExportError, ExportOptions, check_preconditions, export_geometry,
    resolve_items,
};
use crate::asset::AssetResolver;
use crate::font::FontResource;
use crate::layout::AspectCache;
use crate::sequence::IconRef;
use crate::svg;

const FILE_NAME: &str = "signage.jpg";
const MIME: &str = "image/jpeg";

/// Renders `items` to a JPEG at `options.scale`.
pub fn render_raster(
    items: &[IconRef],
    resolver: &AssetResolver,
    font: &FontResource,
    options: &ExportOptions,
) -> Result<ExportArtifact, ExportError> {
    check_preconditions(items, font)?;
    let opt = svg::render_options(font.data());
    compose(items, resolver, font, None, &opt, options)
}

pub(super) fn compose(
    items: &[IconRef],
    resolver: &AssetResolver,
    font: &FontResource,
    cache: Option<&AspectCache>,
    opt: &usvg::Options<'_>,
    options: &ExportOptions,
) -> Result<ExportArtifact, ExportError> {
    check_preconditions(items, font)?;
    let scale = options.scale;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ExportError::InvalidScale(scale));
    }
    let background = options.background_rgb()?;

    let resolved = resolve_items(items, resolver, cache);
    let geometry = export_geometry(items, &resolved, options, scale);

    let width = geometry.total_width.ceil() as u32;
    let height = geometry.height.round() as u32;
    let mut pixmap =
        Pixmap::new(width, height).ok_or(ExportError::PixmapAlloc { width, height })?;
    pixmap.fill(Color::from_rgba8(
        background.red,
        background.green,
        background.blue,
        255,
    ));

    let mut drawn = 0;
    for ((icon, item), slot) in items.iter().zip(&resolved).zip(&geometry.slots) {
        let Some(markup) = item.markup.as_deref() else {
            continue;
        };
        let rect = slot.rect;
        match svg::render_into(&mut pixmap, markup, opt, rect.x, rect.width, rect.height) {
            Ok(()) => drawn += 1,
            Err(err) => {
                tracing::warn!(id = %icon.id(), source = %icon.render_source(), %err, "skipping element that failed to render");
            }
        }
    }

    let rgb = DynamicImage::ImageRgba8(svg::pixmap_to_rgba_image(&pixmap)).to_rgb8();
    let mut bytes = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, options.jpeg_quality);
    encoder.encode(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)?;

    tracing::info!(width, height, drawn, total = items.len(), "raster export finished");
    Ok(ExportArtifact {
        file_name: FILE_NAME.to_string(),
        mime: MIME,
        bytes,
    })
}
