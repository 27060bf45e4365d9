use std::borrow::Cow;

use anyhow::Context;
use image::imageops::{self, FilterType};

use crate::data_structures::texture::TextureData;

/// Decode an encoded image (PNG, JPEG, WebP, ...) into RGBA8 pixels.
pub fn decode_texture(bytes: &[u8], label: &str) -> anyhow::Result<TextureData> {
    let img = image::load_from_memory(bytes)
        .with_context(|| format!("Failed to decode texture {label}"))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::debug!("Decoded {label} ({width}x{height})");
    Ok(TextureData {
        label: label.to_string(),
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

/// Shrink `data` so that neither side exceeds `max_dimension`, keeping its
/// aspect ratio. Textures that already fit are borrowed unchanged.
pub fn fit_texture(data: &TextureData, max_dimension: u32) -> anyhow::Result<Cow<'_, TextureData>> {
    let longest = data.width.max(data.height);
    if longest <= max_dimension {
        return Ok(Cow::Borrowed(data));
    }
    let scale = max_dimension as f64 / longest as f64;
    let shrink = |extent: u32| ((extent as f64 * scale).round() as u32).clamp(1, max_dimension);
    let (width, height) = (shrink(data.width), shrink(data.height));

    let image = image::RgbaImage::from_raw(data.width, data.height, data.rgba.clone())
        .with_context(|| format!("Pixel buffer of {} does not match its size", data.label))?;
    let resized = imageops::resize(&image, width, height, FilterType::Triangle);
    log::warn!(
        "Texture {} is {}x{}, above the device limit of {max_dimension}; downscaled to {width}x{height}",
        data.label,
        data.width,
        data.height,
    );
    Ok(Cow::Owned(TextureData {
        label: data.label.clone(),
        width,
        height,
        rgba: resized.into_raw(),
    }))
}
