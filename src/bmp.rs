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

//! BMP encoding of a bitmap rectangle.
//!
//! Emits a `BITMAPFILEHEADER` (14 bytes) followed by a `BITMAPV4HEADER`
//! (108 bytes) with the BI_BITFIELDS compression tag, followed by the raw
//! 32-bit pixel array. The bit-field masks describe the source byte order
//! directly, so pixel rows are copied without any channel conversion.
//!
//! The pixel array is bottom-up (positive height): the i-th emitted source
//! row lands at array row `height - 1 - i`.

use bytes::{BufMut, BytesMut};

use crate::bitmap::{Bitmap, PixelFormat};
use crate::error::EncodeError;
use crate::geometry::ImageRect;
use crate::MIME_BMP;

/// `BITMAPFILEHEADER` size.
const FILE_HEADER_SIZE: usize = 14;
/// `BITMAPV4HEADER` size.
const V4_HEADER_SIZE: usize = 108;
/// Offset of the pixel array from the start of the file.
const PIXELS_OFFSET: usize = FILE_HEADER_SIZE + V4_HEADER_SIZE;
/// BI_BITFIELDS compression tag.
const BI_BITFIELDS: u32 = 3;

/// Compresses a bitmap rectangle into a 32-bit bit-field BMP appended to
/// `result`.
///
/// `flip` reverses the source row traversal; `with_alpha` controls whether
/// the alpha mask is emitted or zeroed. The rectangle is clamped to the
/// bitmap bounds; the clamped rectangle must be non-empty and the pixel
/// format one of `Rgba8`, `Argb8` or `Bgra8`.
///
/// Returns the `"image/bmp"` MIME type on success.
///
/// # Errors
///
/// [`EncodeError::EmptyRect`] or [`EncodeError::UnsupportedPixelFormat`].
pub fn generate_bmp(
    image: &Bitmap,
    result: &mut BytesMut,
    rect: ImageRect,
    flip: bool,
    with_alpha: bool,
) -> Result<&'static str, EncodeError> {
    let source = image.read();
    let rect = rect.clamped_to(source.size());
    if rect.is_empty() {
        return Err(EncodeError::EmptyRect);
    }

    // Masks describe the source byte order as little-endian u32 lanes.
    let (red_mask, green_mask, blue_mask, alpha_mask) = match source.pixel_format() {
        PixelFormat::Rgba8 => (0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000),
        PixelFormat::Argb8 => (0x0000_FF00, 0x00FF_0000, 0xFF00_0000, 0x0000_00FF),
        PixelFormat::Bgra8 => (0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000),
        format => return Err(EncodeError::UnsupportedPixelFormat(format)),
    };

    let width = rect.width as usize;
    let height = rect.height as usize;
    let row_stride = width * 4;
    let image_size = row_stride * height;
    let file_size = PIXELS_OFFSET + image_size;

    result.reserve(file_size);

    // BITMAPFILEHEADER
    result.put_slice(b"BM");
    result.put_u32_le(file_size as u32);
    result.put_u32_le(0); // reserved
    result.put_u32_le(PIXELS_OFFSET as u32);

    // BITMAPV4HEADER
    result.put_u32_le(V4_HEADER_SIZE as u32);
    result.put_i32_le(rect.width);
    result.put_i32_le(rect.height); // positive height: bottom-up rows
    result.put_u16_le(1); // planes
    result.put_u16_le(32); // bits per pixel
    result.put_u32_le(BI_BITFIELDS);
    result.put_u32_le(0); // image size (uncompressed may be 0)
    result.put_i32_le(0); // x pixels per meter
    result.put_i32_le(0); // y pixels per meter
    result.put_u32_le(0); // colors used
    result.put_u32_le(0); // important colors
    result.put_u32_le(red_mask);
    result.put_u32_le(green_mask);
    result.put_u32_le(blue_mask);
    result.put_u32_le(if with_alpha { alpha_mask } else { 0 });
    result.put_bytes(0, 52); // color space type, endpoints, gamma

    // Pixel array: source rows traverse the rectangle (reversed by `flip`),
    // destination rows fill bottom-up.
    let pixels_base = result.len();
    result.resize(pixels_base + image_size, 0);

    let pixels = source.data();
    let stride = source.stride();
    let x0 = rect.left as usize * 4;

    let (mut y, y_end, step) = if flip {
        (rect.bottom() - 1, rect.top - 1, -1)
    } else {
        (rect.top, rect.bottom(), 1)
    };
    let mut out_row = height - 1;
    while y != y_end {
        let src = y as usize * stride + x0;
        let dst = pixels_base + out_row * row_stride;
        result[dst..dst + row_stride].copy_from_slice(&pixels[src..src + row_stride]);
        y += step;
        out_row = out_row.wrapping_sub(1);
    }

    Ok(MIME_BMP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::geometry::ImageSize;

    fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
    }

    fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([buf[offset], buf[offset + 1]])
    }

    #[test]
    fn test_single_pixel_layout() {
        let bitmap = Bitmap::with_size(ImageSize::new(1, 1), PixelFormat::Rgba8);
        bitmap.write().data_mut().copy_from_slice(&[10, 20, 30, 40]);

        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        let mime = generate_bmp(&bitmap, &mut out, rect, false, true).expect("encode succeeds");

        assert_eq!(mime, MIME_BMP);
        assert_eq!(out.len(), 126, "14 + 108 + 4 bytes");
        assert_eq!(&out[0..2], b"BM");
        assert_eq!(read_u32_le(&out, 2), 126, "bfSize");
        assert_eq!(read_u32_le(&out, 10), 122, "bfOffBits");
        assert_eq!(read_u32_le(&out, 14), 108, "bV4Size");
        assert_eq!(read_u32_le(&out, 18), 1, "bV4Width");
        assert_eq!(read_u32_le(&out, 22), 1, "bV4Height");
        assert_eq!(read_u16_le(&out, 26), 1, "bV4Planes");
        assert_eq!(read_u16_le(&out, 28), 32, "bV4BitCount");
        assert_eq!(read_u32_le(&out, 30), 3, "bV4V4Compression = BI_BITFIELDS");
        assert_eq!(&out[122..126], &[10, 20, 30, 40], "raw source pixel");
    }

    #[test]
    fn test_masks_per_pixel_format() {
        let cases = [
            (PixelFormat::Rgba8, [0x0000_00FF_u32, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000]),
            (PixelFormat::Argb8, [0x0000_FF00, 0x00FF_0000, 0xFF00_0000, 0x0000_00FF]),
            (PixelFormat::Bgra8, [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000]),
        ];
        for (format, [r, g, b, a]) in cases {
            let bitmap = Bitmap::with_size(ImageSize::new(2, 2), format);
            let mut out = BytesMut::new();
            let rect = ImageRect::of(bitmap.size());
            generate_bmp(&bitmap, &mut out, rect, false, true).expect("encode succeeds");
            assert_eq!(read_u32_le(&out, 54), r, "{format:?} red mask");
            assert_eq!(read_u32_le(&out, 58), g, "{format:?} green mask");
            assert_eq!(read_u32_le(&out, 62), b, "{format:?} blue mask");
            assert_eq!(read_u32_le(&out, 66), a, "{format:?} alpha mask");
        }
    }

    #[test]
    fn test_alpha_mask_zeroed_without_alpha() {
        let bitmap = Bitmap::with_size(ImageSize::new(2, 2), PixelFormat::Bgra8);
        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        generate_bmp(&bitmap, &mut out, rect, false, false).expect("encode succeeds");
        assert_eq!(read_u32_le(&out, 66), 0, "alpha mask must be zero");
    }

    #[test]
    fn test_rows_are_bottom_up() {
        // Two rows with distinct bytes; BMP stores the top source row last.
        let bitmap = Bitmap::with_size(ImageSize::new(1, 2), PixelFormat::Bgra8);
        bitmap
            .write()
            .data_mut()
            .copy_from_slice(&[1, 1, 1, 1, 2, 2, 2, 2]);

        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        generate_bmp(&bitmap, &mut out, rect, false, true).expect("encode succeeds");
        assert_eq!(&out[122..126], &[2, 2, 2, 2], "bottom array row = last source row");
        assert_eq!(&out[126..130], &[1, 1, 1, 1], "top array row = first source row");

        // Flip reverses the source traversal, so the array rows swap.
        let mut flipped = BytesMut::new();
        generate_bmp(&bitmap, &mut flipped, rect, true, true).expect("encode succeeds");
        assert_eq!(&flipped[122..126], &[1, 1, 1, 1]);
        assert_eq!(&flipped[126..130], &[2, 2, 2, 2]);
    }

    #[test]
    fn test_unsupported_format_is_rejected() {
        let bitmap = Bitmap::with_size(ImageSize::new(2, 2), PixelFormat::Rgb8);
        let mut out = BytesMut::new();
        let rect = ImageRect::of(bitmap.size());
        let err = generate_bmp(&bitmap, &mut out, rect, false, true);
        assert!(matches!(
            err,
            Err(EncodeError::UnsupportedPixelFormat(PixelFormat::Rgb8))
        ));
    }
}
