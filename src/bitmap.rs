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

//! Bitmap storage: an owned raster buffer with size and pixel format.
//!
//! A [`Bitmap`] guards its `(size, format, buffer)` triple with a
//! reader-writer lock: [`Bitmap::resize`] takes the exclusive side, all other
//! accessors go through a shared [`BitmapRead`] guard so concurrent encodes
//! of the same bitmap observe a consistent snapshot. Buffers are 32-byte
//! aligned, and a process-wide atomic counter tracks the total bytes held
//! across all live bitmaps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::geometry::ImageSize;

/// Pixel format: byte order and channel semantics of one pixel.
///
/// Only `A8`, `Rgb8`, `Rgba8`, `Argb8` and `Bgra8` are encodable by this
/// crate; the remaining tags exist so capture devices can label frames they
/// produce in other layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Format not known or not yet assigned.
    Unknown,
    /// Packed 8-bit YUV, 2 bytes per pixel.
    Yuv8,
    /// Packed 10-bit YUV.
    Yuv10,
    /// Single 8-bit alpha channel.
    A8,
    /// 8-bit channels in `{r, g, b, a}` byte order.
    Rgba8,
    /// 8-bit channels in `{a, r, g, b}` byte order.
    Argb8,
    /// 8-bit channels in `{b, g, r, a}` byte order.
    Bgra8,
    /// 8-bit channels in `{r, g, b}` byte order, 3 bytes per pixel.
    Rgb8,
    /// Packed 10-bit RGB.
    Rgb10,
    /// 32-bit float RGB.
    Rgb32F,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::A8 => 1,
            Self::Yuv8 => 2,
            Self::Rgb8 => 3,
            Self::Unknown
            | Self::Yuv10
            | Self::Rgba8
            | Self::Argb8
            | Self::Bgra8
            | Self::Rgb10
            | Self::Rgb32F => 4,
        }
    }
}

/// Total bytes currently held by all live bitmap buffers in the process.
static TOTAL_BITMAP_BYTES: AtomicU64 = AtomicU64::new(0);

/// Returns the total number of bytes currently held by bitmap buffers
/// across the process.
#[must_use]
pub fn total_bitmap_memory() -> u64 {
    TOTAL_BITMAP_BYTES.load(Ordering::Relaxed)
}

/// One 32-byte storage block; the unit of bitmap buffer alignment.
#[derive(Debug, Clone, Copy)]
#[repr(C, align(32))]
struct Block([u8; 32]);

// SAFETY: a plain byte array with no padding; every bit pattern is valid.
unsafe impl bytemuck::Zeroable for Block {}
// SAFETY: same as above; `Block` is `Copy` and `'static`.
unsafe impl bytemuck::Pod for Block {}

const ZERO_BLOCK: Block = Block([0; 32]);

/// Growable byte buffer with 32-byte alignment.
#[derive(Debug, Default)]
struct AlignedBuffer {
    blocks: Vec<Block>,
    len: usize,
}

impl AlignedBuffer {
    fn as_slice(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.blocks)[..self.len]
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.blocks)[..self.len]
    }

    /// Resizes to `new_len` bytes, preserving the common prefix and
    /// zero-filling any newly exposed bytes.
    fn resize(&mut self, new_len: usize) {
        self.blocks.resize(new_len.div_ceil(32), ZERO_BLOCK);
        if new_len > self.len {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.blocks);
            bytes[self.len..new_len].fill(0);
        }
        self.len = new_len;
    }
}

#[derive(Debug)]
struct BitmapState {
    size: ImageSize,
    pixel_format: PixelFormat,
    data: AlignedBuffer,
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// An owned raster buffer with size and pixel format.
#[derive(Debug)]
pub struct Bitmap {
    state: RwLock<BitmapState>,
}

/// A bitmap shared between producer and consumer threads.
pub type SharedBitmap = Arc<Bitmap>;

impl Bitmap {
    /// Creates an empty bitmap with [`PixelFormat::Unknown`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BitmapState {
                size: ImageSize::default(),
                pixel_format: PixelFormat::Unknown,
                data: AlignedBuffer::default(),
            }),
        }
    }

    /// Creates a bitmap with the given dimensions and pixel format,
    /// zero-filled.
    #[must_use]
    pub fn with_size(size: ImageSize, pixel_format: PixelFormat) -> Self {
        let bitmap = Self::new();
        bitmap.resize(size, pixel_format);
        bitmap
    }

    /// Resizes the bitmap and changes its pixel format atomically.
    ///
    /// Takes the exclusive lock. A no-op if and only if width, height and
    /// pixel format are all unchanged. The buffer is reallocated to exactly
    /// `width * height * bytes_per_pixel` bytes; newly exposed bytes are
    /// zero.
    pub fn resize(&self, size: ImageSize, pixel_format: PixelFormat) {
        let mut state = write_lock(&self.state);
        if size == state.size && state.pixel_format == pixel_format {
            return;
        }

        let old_len = state.data.len as u64;
        let width = size.width.max(0) as usize;
        let height = size.height.max(0) as usize;
        state.data.resize(width * height * pixel_format.bytes_per_pixel());
        TOTAL_BITMAP_BYTES.fetch_sub(old_len, Ordering::Relaxed);
        TOTAL_BITMAP_BYTES.fetch_add(state.data.len as u64, Ordering::Relaxed);

        state.size = size;
        state.pixel_format = pixel_format;
    }

    /// Acquires the shared lock for reading pixels and metadata.
    ///
    /// The returned guard presents a consistent `(size, format, buffer)`
    /// snapshot; encoders hold it for the duration of an encode.
    #[must_use]
    pub fn read(&self) -> BitmapRead<'_> {
        BitmapRead {
            guard: self.state.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Acquires the exclusive lock for writing pixels.
    #[must_use]
    pub fn write(&self) -> BitmapWrite<'_> {
        BitmapWrite {
            guard: write_lock(&self.state),
        }
    }

    /// Current size (momentary shared lock).
    #[must_use]
    pub fn size(&self) -> ImageSize {
        self.read().size()
    }

    /// Current pixel format (momentary shared lock).
    #[must_use]
    pub fn pixel_format(&self) -> PixelFormat {
        self.read().pixel_format()
    }
}

impl Drop for Bitmap {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        TOTAL_BITMAP_BYTES.fetch_sub(state.data.len as u64, Ordering::Relaxed);
    }
}

fn write_lock(state: &RwLock<BitmapState>) -> RwLockWriteGuard<'_, BitmapState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Shared read guard over a bitmap's `(size, format, buffer)` snapshot.
#[derive(Debug)]
pub struct BitmapRead<'a> {
    guard: RwLockReadGuard<'a, BitmapState>,
}

impl BitmapRead<'_> {
    /// Bitmap size.
    #[must_use]
    pub fn size(&self) -> ImageSize {
        self.guard.size
    }

    /// Pixel format.
    #[must_use]
    pub fn pixel_format(&self) -> PixelFormat {
        self.guard.pixel_format
    }

    /// Bytes per pixel of the current format.
    #[must_use]
    pub fn bytes_per_pixel(&self) -> usize {
        self.pixel_format().bytes_per_pixel()
    }

    /// Bytes between the beginnings of consecutive rows.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.guard.size.width.max(0) as usize * self.bytes_per_pixel()
    }

    /// The pixel bytes; length is exactly `width * height * bytes_per_pixel`.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.guard.data.as_slice()
    }
}

/// Exclusive write guard for filling a bitmap's pixels.
#[derive(Debug)]
pub struct BitmapWrite<'a> {
    guard: RwLockWriteGuard<'a, BitmapState>,
}

impl BitmapWrite<'_> {
    /// Bitmap size.
    #[must_use]
    pub fn size(&self) -> ImageSize {
        self.guard.size
    }

    /// Bytes between the beginnings of consecutive rows.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.guard.size.width.max(0) as usize * self.guard.pixel_format.bytes_per_pixel()
    }

    /// Mutable pixel bytes.
    #[must_use]
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.guard.data.as_mut_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_length_matches_dimensions() {
        let bitmap = Bitmap::with_size(ImageSize::new(7, 5), PixelFormat::Rgb8);
        let read = bitmap.read();
        assert_eq!(read.data().len(), 7 * 5 * 3);
        assert_eq!(read.stride(), 21);
    }

    #[test]
    fn test_buffer_is_32_byte_aligned() {
        let bitmap = Bitmap::with_size(ImageSize::new(33, 3), PixelFormat::Bgra8);
        let read = bitmap.read();
        assert_eq!(read.data().as_ptr() as usize % 32, 0, "buffer must be 32-byte aligned");
    }

    #[test]
    fn test_resize_noop_requires_all_three_equal() {
        let bitmap = Bitmap::with_size(ImageSize::new(4, 4), PixelFormat::Bgra8);
        bitmap.write().data_mut()[0] = 0xAA;

        // Same size, same format: contents survive.
        bitmap.resize(ImageSize::new(4, 4), PixelFormat::Bgra8);
        assert_eq!(bitmap.read().data()[0], 0xAA);

        // Same size, different format: the buffer is re-made.
        bitmap.resize(ImageSize::new(4, 4), PixelFormat::Rgb8);
        assert_eq!(bitmap.read().data().len(), 4 * 4 * 3);
        assert_eq!(bitmap.pixel_format(), PixelFormat::Rgb8);
    }

    #[test]
    fn test_resize_zero_fills_new_bytes() {
        let bitmap = Bitmap::with_size(ImageSize::new(2, 2), PixelFormat::Bgra8);
        bitmap.write().data_mut().fill(0xFF);
        bitmap.resize(ImageSize::new(1, 1), PixelFormat::Bgra8);
        bitmap.resize(ImageSize::new(2, 2), PixelFormat::Bgra8);
        let read = bitmap.read();
        assert_eq!(&read.data()[..4], &[0xFF; 4], "retained prefix survives");
        assert!(read.data()[4..].iter().all(|&b| b == 0), "grown bytes are zeroed");
    }

    #[test]
    fn test_total_memory_counter() {
        let before = total_bitmap_memory();
        let bitmap = Bitmap::with_size(ImageSize::new(256, 256), PixelFormat::Bgra8);
        assert!(
            total_bitmap_memory() >= before + 256 * 256 * 4,
            "counter grows with the allocation"
        );
        drop(bitmap);
    }

    #[test]
    fn test_bytes_per_pixel_table() {
        assert_eq!(PixelFormat::A8.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::Yuv8.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
        for format in [
            PixelFormat::Unknown,
            PixelFormat::Yuv10,
            PixelFormat::Rgba8,
            PixelFormat::Argb8,
            PixelFormat::Bgra8,
            PixelFormat::Rgb10,
            PixelFormat::Rgb32F,
        ] {
            assert_eq!(format.bytes_per_pixel(), 4, "{format:?}");
        }
    }
}
