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

//! JPEG encoding of a bitmap rectangle.
//!
//! The back-end consumes the source byte order directly through its
//! extended input color spaces (`Rgba`, `Bgra`, `Rgb`), so no channel
//! conversion pass is needed for those formats; `Argb8` rows are swizzled
//! to RGBA during row assembly, since the back-end has no alpha-first
//! input space.

use bytes::BytesMut;
use jpeg_encoder::{ColorType, Encoder};

use crate::bitmap::{Bitmap, PixelFormat};
use crate::error::EncodeError;
use crate::geometry::ImageRect;
use crate::MIME_JPEG;

/// Compresses a bitmap rectangle into a baseline interchange JPEG appended
/// to `result`.
///
/// `quality` is in `[0, 100]` (the back-end floors it at 1). `flip`
/// reverses the row traversal. The rectangle is clamped to the bitmap
/// bounds; the clamped rectangle must be non-empty and the pixel format one
/// of `Rgba8`, `Argb8`, `Bgra8` or `Rgb8`.
///
/// Returns the `"image/jpeg"` MIME type on success.
///
/// # Errors
///
/// [`EncodeError::InvalidQuality`], [`EncodeError::EmptyRect`],
/// [`EncodeError::UnsupportedPixelFormat`],
/// [`EncodeError::DimensionsTooLarge`], or a back-end failure.
pub fn generate_jpeg(
    image: &Bitmap,
    result: &mut BytesMut,
    rect: ImageRect,
    flip: bool,
    quality: i32,
) -> Result<&'static str, EncodeError> {
    if !(0..=100).contains(&quality) {
        return Err(EncodeError::InvalidQuality(quality));
    }

    let source = image.read();
    let rect = rect.clamped_to(source.size());
    if rect.is_empty() {
        return Err(EncodeError::EmptyRect);
    }
    let (Ok(width), Ok(height)) = (u16::try_from(rect.width), u16::try_from(rect.height)) else {
        return Err(EncodeError::DimensionsTooLarge {
            width: rect.width,
            height: rect.height,
        });
    };

    let format = source.pixel_format();
    let color_type = match format {
        PixelFormat::Rgba8 | PixelFormat::Argb8 => ColorType::Rgba,
        PixelFormat::Bgra8 => ColorType::Bgra,
        PixelFormat::Rgb8 => ColorType::Rgb,
        _ => return Err(EncodeError::UnsupportedPixelFormat(format)),
    };

    let bpp = source.bytes_per_pixel();
    let stride = source.stride();
    let pixels = source.data();
    let x0 = rect.left as usize * bpp;
    let row_bytes = rect.width as usize * bpp;

    // The back-end takes the whole image at once, so the rows are gathered
    // (flip-aware) into one contiguous buffer first.
    let mut scanlines = Vec::with_capacity(row_bytes * rect.height as usize);
    let (mut y, y_end, step) = if flip {
        (rect.bottom() - 1, rect.top - 1, -1)
    } else {
        (rect.top, rect.bottom(), 1)
    };
    while y != y_end {
        let offset = y as usize * stride + x0;
        let row = &pixels[offset..offset + row_bytes];
        if format == PixelFormat::Argb8 {
            for px in row.chunks_exact(4) {
                scanlines.extend_from_slice(&[px[1], px[2], px[3], px[0]]);
            }
        } else {
            scanlines.extend_from_slice(row);
        }
        y += step;
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)] // validated to [0, 100]
    let quality = (quality.max(1)) as u8;
    let mut jpeg = Vec::new();
    let encoder = Encoder::new(&mut jpeg, quality);
    encoder.encode(&scanlines, width, height, color_type)?;

    result.extend_from_slice(&jpeg);
    Ok(MIME_JPEG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::geometry::ImageSize;

    #[test]
    fn test_quality_out_of_range_is_rejected() {
        let bitmap = Bitmap::with_size(ImageSize::new(2, 2), PixelFormat::Bgra8);
        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        for quality in [-1, 101, 9000] {
            let err = generate_jpeg(&bitmap, &mut out, rect, false, quality);
            assert!(
                matches!(err, Err(EncodeError::InvalidQuality(q)) if q == quality),
                "quality {quality} must be rejected"
            );
        }
    }

    #[test]
    fn test_unsupported_format_is_rejected() {
        let bitmap = Bitmap::with_size(ImageSize::new(2, 2), PixelFormat::A8);
        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        let err = generate_jpeg(&bitmap, &mut out, rect, false, 90);
        assert!(matches!(
            err,
            Err(EncodeError::UnsupportedPixelFormat(PixelFormat::A8))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_soi_marker_and_mime() {
        let bitmap = Bitmap::with_size(ImageSize::new(8, 8), PixelFormat::Bgra8);
        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        let mime = generate_jpeg(&bitmap, &mut out, rect, false, 90).expect("encode succeeds");
        assert_eq!(mime, MIME_JPEG);
        assert_eq!(&out[..2], &[0xFF, 0xD8], "JPEG SOI marker");
    }
}
