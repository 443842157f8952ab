// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! PNG encoding of a bitmap rectangle.
//!
//! The back-end (`png` crate) handles chunking, filtering and deflate; this
//! module owns everything pixel-format aware: rectangle clamping, row
//! iteration direction, channel reordering, alpha handling and the palette
//! path through the [`Quantizer`].
//!
//! # Channel orientation
//!
//! The source rasters come from capture devices, so the row transforms
//! mirror what a capture pipeline needs:
//!
//! - `Bgra8` sources get their blue and red channels swapped.
//! - `Argb8` sources get the leading alpha byte moved last (RGBA output)
//!   or skipped (RGB output); other 4-byte sources skip the trailing byte
//!   for RGB output.
//! - RGBA output inverts the alpha byte: the pipeline's alpha is a
//!   transparency value, PNG's is opacity.
//! - `Rgb8` sources pass through (with alpha 255 appended for RGBA output).

use bytes::{BufMut, BytesMut};

use crate::bitmap::{Bitmap, PixelFormat};
use crate::error::EncodeError;
use crate::geometry::ImageRect;
use crate::quantizer::Quantizer;
use crate::MIME_PNG;

/// Target PNG color type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngColorType {
    /// 8-bit indexed color with a quantized 256-entry palette.
    Palette,
    /// 8-bit RGB.
    Rgb,
    /// 8-bit RGB with alpha.
    Rgba,
}

/// Compresses a bitmap rectangle into a PNG stream appended to `result`.
///
/// `compression` is a deflate level in `[0, 9]` (0 fastest, 9 best), or -1
/// for the back-end default. `flip` reverses the row traversal. The
/// rectangle is clamped to the bitmap bounds; the clamped rectangle must be
/// non-empty and the pixel format must be 4 bytes per pixel (`Rgba8`,
/// `Argb8`, `Bgra8`), or `Rgb8` for the non-palette color types.
///
/// Returns the `"image/png"` MIME type on success.
///
/// # Errors
///
/// [`EncodeError::InvalidCompression`], [`EncodeError::EmptyRect`],
/// [`EncodeError::UnsupportedPixelFormat`], or a back-end failure.
pub fn generate_png(
    image: &Bitmap,
    result: &mut BytesMut,
    rect: ImageRect,
    flip: bool,
    compression: i32,
    color_type: PngColorType,
) -> Result<&'static str, EncodeError> {
    if !(-1..=9).contains(&compression) {
        return Err(EncodeError::InvalidCompression(compression));
    }

    let source = image.read();
    let rect = rect.clamped_to(source.size());
    if rect.is_empty() {
        return Err(EncodeError::EmptyRect);
    }

    let format = source.pixel_format();
    let bpp = source.bytes_per_pixel();
    match (format, color_type) {
        (PixelFormat::Rgba8 | PixelFormat::Argb8 | PixelFormat::Bgra8, _)
        | (PixelFormat::Rgb8, PngColorType::Rgb | PngColorType::Rgba) => {}
        _ => return Err(EncodeError::UnsupportedPixelFormat(format)),
    }

    let width = rect.width as usize;
    let height = rect.height as usize;

    let mut encoder = png::Encoder::new(
        BufMut::writer(&mut *result),
        rect.width as u32,
        rect.height as u32,
    );
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(compression_preset(compression));
    encoder.set_color(match color_type {
        PngColorType::Palette => png::ColorType::Indexed,
        PngColorType::Rgb => png::ColorType::Rgb,
        PngColorType::Rgba => png::ColorType::Rgba,
    });

    // The palette path substitutes the quantizer's index image for the
    // pixel source: stride becomes the rect width and the x-offset drops
    // to zero.
    let mut quantizer = Quantizer::new();
    let (pixels, stride, x0, y0, y_end) = if color_type == PngColorType::Palette {
        quantizer.quantize(source.data(), source.stride(), rect, 0xff);
        let mut palette = Vec::with_capacity(256 * 3);
        for entry in quantizer.palette_rgb() {
            palette.extend_from_slice(entry);
        }
        encoder.set_palette(palette);
        (quantizer.index_data(), width, 0, 0, rect.height)
    } else {
        (
            source.data(),
            source.stride(),
            rect.left as usize * bpp,
            rect.top,
            rect.bottom(),
        )
    };

    let row_bytes = match color_type {
        PngColorType::Palette => width,
        PngColorType::Rgb => width * 3,
        PngColorType::Rgba => width * 4,
    };
    let src_row_bytes = if color_type == PngColorType::Palette {
        width
    } else {
        width * bpp
    };

    let mut image_data = Vec::with_capacity(row_bytes * height);
    let (mut y, y_end, step) = if flip { (y_end - 1, y0 - 1, -1) } else { (y0, y_end, 1) };
    while y != y_end {
        let offset = y as usize * stride + x0;
        let row = &pixels[offset..offset + src_row_bytes];
        match color_type {
            PngColorType::Palette => image_data.extend_from_slice(row),
            PngColorType::Rgb => push_rgb_row(&mut image_data, row, format),
            PngColorType::Rgba => push_rgba_row(&mut image_data, row, format),
        }
        y += step;
    }

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image_data)?;
    writer.finish()?;

    Ok(MIME_PNG)
}

/// Maps a `[-1, 9]` deflate level onto the back-end's compression presets.
fn compression_preset(level: i32) -> png::Compression {
    match level {
        0..=3 => png::Compression::Fast,
        7..=9 => png::Compression::Best,
        _ => png::Compression::Default, // -1 and 4..=6
    }
}

/// Appends one source row as RGB bytes, dropping the filler/alpha byte of
/// 4-byte sources.
fn push_rgb_row(out: &mut Vec<u8>, row: &[u8], format: PixelFormat) {
    match format {
        PixelFormat::Rgba8 => {
            for px in row.chunks_exact(4) {
                out.extend_from_slice(&[px[0], px[1], px[2]]);
            }
        }
        PixelFormat::Bgra8 => {
            for px in row.chunks_exact(4) {
                out.extend_from_slice(&[px[2], px[1], px[0]]);
            }
        }
        PixelFormat::Argb8 => {
            for px in row.chunks_exact(4) {
                out.extend_from_slice(&[px[1], px[2], px[3]]);
            }
        }
        // Validated to be Rgb8 by the caller.
        _ => out.extend_from_slice(row),
    }
}

/// Appends one source row as RGBA bytes with the alpha channel inverted
/// (transparency in, opacity out). `Rgb8` rows gain an opaque alpha.
fn push_rgba_row(out: &mut Vec<u8>, row: &[u8], format: PixelFormat) {
    match format {
        PixelFormat::Rgba8 => {
            for px in row.chunks_exact(4) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255 - px[3]]);
            }
        }
        PixelFormat::Bgra8 => {
            for px in row.chunks_exact(4) {
                out.extend_from_slice(&[px[2], px[1], px[0], 255 - px[3]]);
            }
        }
        PixelFormat::Argb8 => {
            for px in row.chunks_exact(4) {
                out.extend_from_slice(&[px[1], px[2], px[3], 255 - px[0]]);
            }
        }
        // Validated to be Rgb8 by the caller.
        _ => {
            for px in row.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::geometry::ImageSize;

    fn bitmap_bgra(width: i32, height: i32, pixel: [u8; 4]) -> Bitmap {
        let bitmap = Bitmap::with_size(ImageSize::new(width, height), PixelFormat::Bgra8);
        for px in bitmap.write().data_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&pixel);
        }
        bitmap
    }

    #[test]
    fn test_compression_out_of_range_is_rejected() {
        let bitmap = bitmap_bgra(2, 2, [0, 0, 255, 0]);
        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        for level in [-2, 10, 100] {
            let err = generate_png(&bitmap, &mut out, rect, false, level, PngColorType::Rgb);
            assert!(
                matches!(err, Err(EncodeError::InvalidCompression(l)) if l == level),
                "level {level} must be rejected"
            );
        }
        assert!(out.is_empty(), "no output on failed validation");
    }

    #[test]
    fn test_empty_rect_is_rejected() {
        let bitmap = bitmap_bgra(2, 2, [0, 0, 255, 0]);
        let mut out = BytesMut::new();
        let rect = ImageRect::new(5, 5, 2, 2); // clamps to empty
        let err = generate_png(&bitmap, &mut out, rect, false, -1, PngColorType::Rgb);
        assert!(matches!(err, Err(EncodeError::EmptyRect)));
    }

    #[test]
    fn test_unsupported_formats_are_rejected() {
        for format in [
            PixelFormat::Unknown,
            PixelFormat::Yuv8,
            PixelFormat::Yuv10,
            PixelFormat::A8,
            PixelFormat::Rgb10,
            PixelFormat::Rgb32F,
        ] {
            let bitmap = Bitmap::with_size(ImageSize::new(2, 2), format);
            let mut out = BytesMut::new();
            let rect = ImageRect::of(bitmap.size());
            let err = generate_png(&bitmap, &mut out, rect, false, -1, PngColorType::Rgba);
            assert!(
                matches!(err, Err(EncodeError::UnsupportedPixelFormat(f)) if f == format),
                "{format:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_palette_rejects_3_byte_source() {
        let bitmap = Bitmap::with_size(ImageSize::new(2, 2), PixelFormat::Rgb8);
        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        let err = generate_png(&bitmap, &mut out, rect, false, -1, PngColorType::Palette);
        assert!(matches!(
            err,
            Err(EncodeError::UnsupportedPixelFormat(PixelFormat::Rgb8))
        ));
    }

    #[test]
    fn test_signature_and_mime() {
        let bitmap = bitmap_bgra(4, 4, [0, 0, 255, 0]);
        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        let mime = generate_png(&bitmap, &mut out, rect, false, -1, PngColorType::Rgb)
            .expect("encode succeeds");
        assert_eq!(mime, MIME_PNG);
        assert_eq!(&out[..8], b"\x89PNG\r\n\x1a\n", "PNG signature");
    }
}
