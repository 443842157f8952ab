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

//! Image geometry primitives: sizes and rectangles in pixel units.

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl ImageSize {
    /// Creates a new size.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero (or negative).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// A rectangle in pixel units.
///
/// `bottom` is `top + height`; `right` is `left + width`. Coordinates may be
/// negative or out of bounds before [`ImageRect::clamped_to`] is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageRect {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl ImageRect {
    /// Creates a new rectangle.
    #[must_use]
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle covering a whole image of the given size.
    #[must_use]
    pub fn of(size: ImageSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersects the rectangle with the bounds of an image of `size`.
    ///
    /// The result is always contained in `[0, size.width] x [0, size.height]`
    /// and never has negative dimensions. The operation is total: any input
    /// rectangle, however far out of bounds, produces a valid (possibly
    /// empty) result.
    #[must_use]
    pub fn clamped_to(&self, size: ImageSize) -> Self {
        let bound_w = size.width.max(0);
        let bound_h = size.height.max(0);
        let left = self.left.clamp(0, bound_w);
        let top = self.top.clamp(0, bound_h);
        Self {
            left,
            top,
            width: self.width.clamp(0, bound_w - left),
            height: self.height.clamp(0, bound_h - top),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside() {
        let rect = ImageRect::new(2, 3, 4, 5);
        let clamped = rect.clamped_to(ImageSize::new(10, 10));
        assert_eq!(clamped, rect, "in-bounds rect must be unchanged");
    }

    #[test]
    fn test_clamp_overflow() {
        let rect = ImageRect::new(8, 8, 10, 10);
        let clamped = rect.clamped_to(ImageSize::new(10, 10));
        assert_eq!(clamped, ImageRect::new(8, 8, 2, 2));
    }

    #[test]
    fn test_clamp_negative_origin() {
        let rect = ImageRect::new(-5, -5, 20, 20);
        let clamped = rect.clamped_to(ImageSize::new(10, 10));
        assert_eq!(clamped, ImageRect::new(0, 0, 10, 10));
    }

    /// Totality: any rect is mapped into the image bounds.
    #[test]
    fn test_clamp_contained_for_arbitrary_inputs() {
        let size = ImageSize::new(640, 480);
        let candidates = [
            ImageRect::new(i32::MIN, i32::MAX, i32::MAX, i32::MIN),
            ImageRect::new(-1, -1, -1, -1),
            ImageRect::new(1000, 1000, 1000, 1000),
            ImageRect::new(0, 0, 0, 0),
            ImageRect::new(639, 479, 5, 5),
        ];
        for rect in candidates {
            let c = rect.clamped_to(size);
            assert!(c.left >= 0 && c.top >= 0, "origin clamped: {c:?}");
            assert!(c.width >= 0 && c.height >= 0, "extent clamped: {c:?}");
            assert!(
                c.right() <= size.width && c.bottom() <= size.height,
                "rect {c:?} escapes {size:?}"
            );
        }
    }

    /// Degenerate sizes behave like empty images instead of panicking.
    #[test]
    fn test_clamp_against_negative_size() {
        let rect = ImageRect::new(1, 1, 4, 4);
        let clamped = rect.clamped_to(ImageSize::new(-3, 7));
        assert_eq!(clamped, ImageRect::new(0, 1, 0, 4));
        assert!(clamped.is_empty());
    }

    #[test]
    fn test_full_rect_of_size() {
        let size = ImageSize::new(7, 9);
        let rect = ImageRect::of(size);
        assert_eq!(rect, ImageRect::new(0, 0, 7, 9));
        assert!(!rect.is_empty());
        assert!(ImageRect::of(ImageSize::default()).is_empty());
    }
}
