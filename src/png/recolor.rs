//! Pixel-level operations backed by the `png` crate's decode/encode contract:
//! palette downgrade (truecolor -> indexed) and the 1-pixel nearest/bilinear
//! downscale used to clear hostile IHDR bytes.
//!
//! The `png` crate itself only decodes and encodes; color-statistics
//! counting and resampling are implemented here directly over the decoded
//! RGBA8 buffer.

use crate::limits::MAX_PALETTE_COLORS;
use crate::{PdvzipError, PdvzipResult};
use png::{BitDepth, ColorType, Decoder, Encoder, Transformations};
use std::collections::HashMap;
use std::io::Cursor;

/// A decoded image, always normalized to 8-bit RGBA for the purposes of this module.
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Decode `data` to an 8-bit-per-channel RGBA buffer, regardless of the
/// source color type or bit depth.
pub fn decode_rgba(data: &[u8]) -> PdvzipResult<DecodedImage> {
    let mut decoder = Decoder::new(Cursor::new(data));
    decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16 | Transformations::ALPHA);
    let mut reader = decoder
        .read_info()
        .map_err(|e| PdvzipError::BadImage(format!("PNG decode failed: {e}")))?;

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| PdvzipError::BadImage(format!("PNG decode failed: {e}")))?;
    buf.truncate(info.buffer_size());

    let rgba = match info.color_type {
        ColorType::Rgba => buf,
        ColorType::Rgb => rgb_to_rgba(&buf),
        ColorType::GrayscaleAlpha => gray_alpha_to_rgba(&buf),
        ColorType::Grayscale => gray_to_rgba(&buf),
        ColorType::Indexed => {
            return Err(PdvzipError::Invariant(
                "decode_rgba called on an already-indexed image".into(),
            ))
        }
    };

    Ok(DecodedImage { width: info.width, height: info.height, rgba })
}

/// Decode an already-indexed (color type 3) PNG to its raw per-pixel palette
/// indices plus the RGBA palette (RGB from PLTE, alpha from tRNS if present).
pub fn decode_indexed(data: &[u8]) -> PdvzipResult<(u32, u32, Vec<[u8; 4]>, Vec<u8>)> {
    let mut decoder = Decoder::new(Cursor::new(data));
    decoder.set_transformations(Transformations::IDENTITY);
    let mut reader = decoder
        .read_info()
        .map_err(|e| PdvzipError::BadImage(format!("PNG decode failed: {e}")))?;

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| PdvzipError::BadImage(format!("PNG decode failed: {e}")))?;
    buf.truncate(info.buffer_size());

    if info.color_type != ColorType::Indexed {
        return Err(PdvzipError::Invariant("decode_indexed called on non-indexed image".into()));
    }

    let full_info = reader.info();
    let plte = full_info
        .palette
        .as_ref()
        .ok_or_else(|| PdvzipError::BadImage("indexed image has no PLTE chunk".into()))?;
    let trns = full_info.trns.as_ref();

    let palette: Vec<[u8; 4]> = plte
        .chunks_exact(3)
        .enumerate()
        .map(|(i, rgb)| {
            let a = trns.and_then(|t| t.get(i)).copied().unwrap_or(0xFF);
            [rgb[0], rgb[1], rgb[2], a]
        })
        .collect();

    Ok((info.width, info.height, palette, buf))
}

fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 0xFF]).collect()
}

fn gray_to_rgba(gray: &[u8]) -> Vec<u8> {
    gray.iter().flat_map(|&g| [g, g, g, 0xFF]).collect()
}

fn gray_alpha_to_rgba(ga: &[u8]) -> Vec<u8> {
    ga.chunks_exact(2).flat_map(|p| [p[0], p[0], p[0], p[1]]).collect()
}

/// Count unique RGBA colors in `rgba`, stopping early (returning `None`) once
/// the count exceeds `MAX_PALETTE_COLORS`. On success, returns the palette in
/// first-seen order together with the per-pixel palette index.
pub fn color_stats(rgba: &[u8]) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let mut palette: Vec<[u8; 4]> = Vec::new();
    let mut index_of: HashMap<[u8; 4], u8> = HashMap::new();
    let mut indices = Vec::with_capacity(rgba.len() / 4);

    for px in rgba.chunks_exact(4) {
        let color = [px[0], px[1], px[2], px[3]];
        let idx = match index_of.get(&color) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_COLORS {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push(color);
                index_of.insert(color, idx);
                idx
            }
        };
        indices.push(idx);
    }

    Some((palette, indices))
}

/// Re-encode an indexed image (palette + per-pixel indices) as a fresh PNG
/// buffer, color type 3 (indexed), 8 bits per channel.
pub fn encode_indexed(width: u32, height: u32, palette: &[[u8; 4]], indices: &[u8]) -> PdvzipResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Indexed);
        encoder.set_depth(BitDepth::Eight);

        let rgb_palette: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
        encoder.set_palette(rgb_palette);

        if palette.iter().any(|c| c[3] != 0xFF) {
            let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
            encoder.set_trns(trns);
        }

        let mut writer = encoder
            .write_header()
            .map_err(|e| PdvzipError::BadImage(format!("PNG encode failed: {e}")))?;
        writer
            .write_image_data(indices)
            .map_err(|e| PdvzipError::BadImage(format!("PNG encode failed: {e}")))?;
    }
    Ok(out)
}

/// Re-encode a truecolor RGBA buffer (used after bilinear downscaling).
pub fn encode_rgba(width: u32, height: u32, rgba: &[u8]) -> PdvzipResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| PdvzipError::BadImage(format!("PNG encode failed: {e}")))?;
        writer
            .write_image_data(rgba)
            .map_err(|e| PdvzipError::BadImage(format!("PNG encode failed: {e}")))?;
    }
    Ok(out)
}

/// Re-encode an indexed image after nearest-neighbor downscaling, reusing the
/// existing palette (indices are resampled, not colors).
pub fn encode_indexed_from_source_palette(
    width: u32,
    height: u32,
    palette: &[[u8; 4]],
    indices: &[u8],
) -> PdvzipResult<Vec<u8>> {
    encode_indexed(width, height, palette, indices)
}

/// Nearest-neighbor downscale of an indexed (palette) image to `(w-1, h-1)`.
pub fn downscale_indexed_nearest(width: u32, height: u32, indices: &[u8]) -> (u32, u32, Vec<u8>) {
    let (new_w, new_h) = (width - 1, height - 1);
    let mut out = Vec::with_capacity((new_w * new_h) as usize);
    for y in 0..new_h {
        let src_y = (y as u64 * height as u64 / new_h as u64) as u32;
        for x in 0..new_w {
            let src_x = (x as u64 * width as u64 / new_w as u64) as u32;
            out.push(indices[(src_y * width + src_x) as usize]);
        }
    }
    (new_w, new_h, out)
}

/// Bilinear downscale of a truecolor RGBA image to `(w-1, h-1)`.
pub fn downscale_rgba_bilinear(width: u32, height: u32, rgba: &[u8]) -> (u32, u32, Vec<u8>) {
    let (new_w, new_h) = (width - 1, height - 1);
    let mut out = Vec::with_capacity((new_w * new_h * 4) as usize);

    let sample = |x: f64, y: f64| -> [u8; 4] {
        let x0 = x.floor().max(0.0) as u32;
        let y0 = y.floor().max(0.0) as u32;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let px = |xx: u32, yy: u32, c: usize| rgba[((yy * width + xx) * 4) as usize + c] as f64;

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = px(x0, y0, c) * (1.0 - fx) + px(x1, y0, c) * fx;
            let bottom = px(x0, y1, c) * (1.0 - fx) + px(x1, y1, c) * fx;
            out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
        out
    };

    for y in 0..new_h {
        let src_y = y as f64 * (height - 1) as f64 / (new_h - 1).max(1) as f64;
        for x in 0..new_w {
            let src_x = x as f64 * (width - 1) as f64 / (new_w - 1).max(1) as f64;
            out.extend_from_slice(&sample(src_x, src_y));
        }
    }
    (new_w, new_h, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_stats_counts_unique_colors() {
        let rgba = [
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            255, 0, 0, 255, // red again
        ];
        let (palette, indices) = color_stats(&rgba).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(indices, vec![0, 1, 0]);
    }

    #[test]
    fn color_stats_bails_past_budget() {
        let mut rgba = Vec::new();
        for i in 0..=MAX_PALETTE_COLORS {
            rgba.extend_from_slice(&[i as u8, (i >> 8) as u8, 0, 255]);
        }
        assert!(color_stats(&rgba).is_none());
    }

    #[test]
    fn nearest_downscale_shrinks_by_one_pixel() {
        let indices = vec![0u8; 16];
        let (w, h, out) = downscale_indexed_nearest(4, 4, &indices);
        assert_eq!((w, h), (3, 3));
        assert_eq!(out.len(), 9);
    }

    #[test]
    fn bilinear_downscale_shrinks_by_one_pixel() {
        let rgba = vec![128u8; 4 * 4 * 4];
        let (w, h, out) = downscale_rgba_bilinear(4, 4, &rgba);
        assert_eq!((w, h), (3, 3));
        assert_eq!(out.len(), 9 * 4);
    }
}
