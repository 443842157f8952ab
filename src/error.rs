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

//! Error types for the encoding paths.

use crate::bitmap::PixelFormat;

/// Errors reported by the PNG, JPEG and BMP encoders.
///
/// Invalid-argument conditions (unsupported pixel format, empty rectangle,
/// out-of-range parameters) are detected before any output is produced.
/// Back-end failures may leave the result buffer partially populated.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// The bitmap's pixel format is not supported by the selected encoder.
    #[error("unsupported pixel format: {0:?}")]
    UnsupportedPixelFormat(PixelFormat),

    /// The clamped rectangle covers no pixels, or the bitmap is empty.
    #[error("empty source rectangle")]
    EmptyRect,

    /// PNG compression level outside `[-1, 9]`.
    #[error("compression level {0} out of range [-1, 9]")]
    InvalidCompression(i32),

    /// JPEG quality outside `[0, 100]`.
    #[error("quality {0} out of range [0, 100]")]
    InvalidQuality(i32),

    /// The rectangle exceeds what the selected back-end can represent.
    #[error("rectangle {width}x{height} exceeds the back-end dimension limit")]
    DimensionsTooLarge {
        /// Clamped rectangle width.
        width: i32,
        /// Clamped rectangle height.
        height: i32,
    },

    /// The PNG back-end reported a write failure.
    #[error("png back-end failure: {0}")]
    PngBackend(#[from] png::EncodingError),

    /// The JPEG back-end reported a write failure.
    #[error("jpeg back-end failure: {0}")]
    JpegBackend(#[from] jpeg_encoder::EncodingError),

    /// I/O failure while streaming rows to a back-end.
    #[error("encoder i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
