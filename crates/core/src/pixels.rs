//! CPU-side pixel staging: channel expansion, row flipping and encoding.
//!
//! Textures always upload four channels. Caller data with fewer channels is
//! expanded here before it is encoded into the byte layout of the negotiated
//! pixel type.

use half::f16;

use crate::texture::Precision;

/// Expands `channels`-interleaved values to RGBA.
///
/// Missing color channels are zero and a missing alpha channel is `alpha`.
/// Trailing values that do not make up a whole pixel are dropped.
pub fn expand_to_rgba(data: &[f32], channels: usize, alpha: f32) -> Vec<f32> {
    let channels = channels.clamp(1, 4);
    if channels == 4 {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len() / channels * 4);
    for pixel in data.chunks_exact(channels) {
        out.extend_from_slice(pixel);
        for c in channels..4 {
            out.push(if c == 3 { alpha } else { 0.0 });
        }
    }
    out
}

/// Reverses the order of rows of `row_len` elements, in place.
pub fn flip_rows<T>(data: &mut [T], row_len: usize) {
    if row_len == 0 {
        return;
    }
    let rows = data.len() / row_len;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (upper, lower) = data.split_at_mut(bottom * row_len);
        upper[top * row_len..(top + 1) * row_len].swap_with_slice(&mut lower[..row_len]);
    }
}

/// Encodes values into the upload byte layout for `precision`.
///
/// Byte precision rounds and clamps to 0-255. Float precision is native-endian
/// `f32`, half-float is IEEE binary16.
pub fn encode(values: &[f32], precision: Precision) -> Vec<u8> {
    match precision {
        Precision::Byte => values
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect(),
        Precision::Float => bytemuck::cast_slice::<f32, u8>(values).to_vec(),
        Precision::HalfFloat => {
            let halves: Vec<u16> = values.iter().map(|&v| f16::from_f32(v).to_bits()).collect();
            bytemuck::cast_slice::<u16, u8>(&halves).to_vec()
        }
    }
}

/// Decoded image pixels, `channels` values per pixel, top row first.
#[cfg(feature = "image")]
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

/// Decodes an encoded image (PNG) keeping the first `channels` channels.
///
/// Values are 0-255, or 0-1 when `normalize` is set (for float textures).
#[cfg(feature = "image")]
pub fn decode_image(
    bytes: &[u8],
    channels: usize,
    normalize: bool,
) -> Result<DecodedImage, crate::error::RenderError> {
    let rgba = image::load_from_memory(bytes)
        .map_err(|e| crate::error::RenderError::Image(e.to_string()))?
        .to_rgba8();
    let channels = channels.clamp(1, 4);
    let scale = if normalize { 1.0 / 255.0 } else { 1.0 };
    let data = rgba
        .pixels()
        .flat_map(|p| p.0[..channels].iter().map(move |&v| f32::from(v) * scale))
        .collect();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        data,
    })
}
