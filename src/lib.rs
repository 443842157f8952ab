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
// WITHOUT WARRANTIES OR CONDITIONS, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! In-memory raster image codec library.
//!
//! Given a decoded [`Bitmap`] in one of several pixel formats, this crate
//! produces a compressed byte stream in PNG, JPEG or BMP, optionally
//! restricted to a sub-rectangle, optionally vertically flipped. It also
//! provides Wu color quantization (the PNG palette path), nearest /
//! bilinear / bicubic rescaling of RGBA rasters, and a frame-flow device
//! abstraction that carries frames through bounded queues with
//! drop-on-overflow semantics for live capture pipelines.
//!
//! # Encoding
//!
//! ```
//! use bytes::BytesMut;
//! use raster_codecs::{
//!     generate_png, Bitmap, ImageRect, ImageSize, PixelFormat, PngColorType,
//! };
//!
//! let bitmap = Bitmap::with_size(ImageSize::new(16, 16), PixelFormat::Bgra8);
//! let mut encoded = BytesMut::new();
//! let mime = generate_png(
//!     &bitmap,
//!     &mut encoded,
//!     ImageRect::of(bitmap.size()),
//!     false,
//!     -1,
//!     PngColorType::Rgb,
//! )?;
//! assert_eq!(mime, "image/png");
//! # Ok::<(), raster_codecs::EncodeError>(())
//! ```
//!
//! # Frame flow
//!
//! Capture devices push frames with
//! [`Device::schedule_input_frame`](device::Device::schedule_input_frame);
//! consumers take them with the `acquire_*` operations and recycle the
//! containers afterwards. Overflow under the drop flag discards the oldest
//! frames and counts them, so a slow consumer sees fresh frames rather
//! than a growing backlog.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]

pub mod bitmap;
pub mod bmp;
pub mod device;
pub mod error;
pub mod geometry;
pub mod jpeg;
pub mod png;
pub mod quantizer;
pub mod rescaler;

// MIME types returned by the encoders.

/// MIME type of PNG output.
pub const MIME_PNG: &str = "image/png";

/// MIME type of JPEG output.
pub const MIME_JPEG: &str = "image/jpeg";

/// MIME type of BMP output.
pub const MIME_BMP: &str = "image/bmp";

// Re-export the crate surface.
pub use crate::bitmap::{
    total_bitmap_memory, Bitmap, BitmapRead, BitmapWrite, PixelFormat, SharedBitmap,
};
pub use crate::bmp::generate_bmp;
pub use crate::device::{
    Device, FrameContainer, FrameIo, FrameQueue, FRAME_DEFAULT, FRAME_INPUT, FRAME_LOCAL,
    FRAME_OUTPUT, MAX_PENDING_FRAMES,
};
pub use crate::error::EncodeError;
pub use crate::geometry::{ImageRect, ImageSize};
pub use crate::jpeg::generate_jpeg;
pub use crate::png::{generate_png, PngColorType};
pub use crate::quantizer::Quantizer;
pub use crate::rescaler::{RescaleMode, Rescaler};
