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

//! Rescaling of 4-byte RGBA rasters.
//!
//! Three modes: nearest neighbor (16.16 fixed-point inverse map), bilinear
//! and bicubic. Bilinear and bicubic run as two separable passes — first
//! horizontal into a `dst_width x src_height` intermediate, then vertical
//! into the destination. Each pass picks between two 1-D resamplers by the
//! per-axis scale factor:
//!
//! - |scale| < 1: an area integral — every destination sample averages the
//!   source cells covered by the inverse of its 1-pixel footprint, with
//!   out-of-source cells contributing transparent black.
//! - otherwise: linear interpolation at `p - 0.5` sample centers, or a
//!   Catmull-Rom-style 4-tap cubic with source indices clamped to the
//!   raster.
//!
//! The position/scale parameters are in logical destination space: scale 1
//! fills the destination exactly, position 0 centers the source, position 1
//! shifts it by half a destination size.

use crate::geometry::ImageSize;

/// Resampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescaleMode {
    /// Nearest-neighbor point sampling.
    Nearest,
    /// Separable bilinear interpolation.
    Bilinear,
    /// Separable Catmull-Rom-style bicubic interpolation.
    Bicubic,
}

/// Axis selector for the 1-D resamplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    X,
    Y,
}

/// A borrowed RGBA raster with `width * 4` stride.
struct View<'a> {
    data: &'a [u8],
    width: i32,
    height: i32,
}

impl View<'_> {
    #[inline]
    fn get(&self, x: i32, y: i32) -> [f32; 4] {
        let off = (y * self.width + x) as usize * 4;
        let px = &self.data[off..off + 4];
        [px[0] as f32, px[1] as f32, px[2] as f32, px[3] as f32]
    }

    #[inline]
    fn extent(&self, dir: Dir) -> i32 {
        match dir {
            Dir::X => self.width,
            Dir::Y => self.height,
        }
    }

    /// Sample along `dir` at `pos` with the cross coordinate `q`;
    /// out-of-raster positions are transparent black.
    #[inline]
    fn sample(&self, dir: Dir, pos: i32, q: i32) -> [f32; 4] {
        if pos < 0 || pos >= self.extent(dir) {
            return [0.0; 4];
        }
        match dir {
            Dir::X => self.get(pos, q),
            Dir::Y => self.get(q, pos),
        }
    }
}

/// An owned destination raster under construction.
struct Raster {
    data: Vec<u8>,
    width: i32,
    height: i32,
}

impl Raster {
    fn new(width: i32, height: i32) -> Self {
        Self {
            data: vec![0; width.max(0) as usize * height.max(0) as usize * 4],
            width,
            height,
        }
    }

    #[inline]
    fn set(&mut self, x: i32, y: i32, value: [f32; 4]) {
        let off = (y * self.width + x) as usize * 4;
        // `as u8` saturates, clamping cubic overshoot into range.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        for (dst, v) in self.data[off..off + 4].iter_mut().zip(value) {
            *dst = v as u8;
        }
    }

    fn view(&self) -> View<'_> {
        View {
            data: &self.data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Area-integral resample at `p` along `dir`: the average over the window
/// `[p - s/2, p + s/2)` where `s` is the inverse scale. Cells outside the
/// raster count as transparent black.
fn integrate(src: &View<'_>, p: f32, q: i32, scale: f32, dir: Dir) -> [f32; 4] {
    let s = 1.0 / scale;
    let minus = p - 0.5 * s;
    let plus = p + 0.5 * s;
    let num = (plus - minus).abs();

    // Floor indexing keeps the fractional edge weights attached to the
    // right cells for negative coordinates; out-of-raster cells sample as
    // transparent black below.
    #[allow(clippy::cast_possible_truncation)]
    let start = minus.floor() as i32;
    #[allow(clippy::cast_possible_truncation)]
    let end = plus.floor() as i32;

    let (f0, f1) = if minus < plus {
        (1.0 - (minus - start as f32), plus - end as f32)
    } else {
        (minus - start as f32, 1.0 - (plus - end as f32))
    };

    let a = src.sample(dir, start, q);
    let b = src.sample(dir, end, q);
    let mut val = [0.0_f32; 4];
    for c in 0..4 {
        val[c] = a[c] * f0 + b[c] * f1;
    }
    if (end - start).abs() > 1 {
        let (lo, hi) = if start > end { (end, start) } else { (start, end) };
        for pos in lo + 1..hi {
            let s_ = src.sample(dir, pos, q);
            for c in 0..4 {
                val[c] += s_[c];
            }
        }
    }
    for v in &mut val {
        *v /= num;
    }
    val
}

/// Linear interpolation at `p` (sample centers at `x + 0.5`) along `dir`.
fn lint(src: &View<'_>, p: f32, q: i32, dir: Dir) -> [f32; 4] {
    let res = src.extent(dir);
    if p < 0.0 || p >= res as f32 {
        return [0.0; 4];
    }
    let p = p - 0.5;
    #[allow(clippy::cast_possible_truncation)]
    let mut p1 = p as i32;
    if p1 < 0 {
        p1 = 0;
    }
    #[allow(clippy::cast_possible_truncation)]
    let mut p2 = (p + 1.0) as i32;
    if p2 >= res {
        p2 = res - 1;
    }

    let f2 = p - p1 as f32;
    let f1 = 1.0 - f2;
    let a = src.sample(dir, p1, q);
    let b = src.sample(dir, p2, q);
    let mut val = [0.0_f32; 4];
    for c in 0..4 {
        val[c] = a[c] * f1 + b[c] * f2;
    }
    val
}

/// Catmull-Rom-style cubic through the four taps `a1..a4` at fraction `x1`.
fn cubic(x1: f32, a1: f32, a2: f32, a3: f32, a4: f32) -> f32 {
    let x2 = x1 * x1;
    let x3 = x2 * x1;
    0.5 * (x3 - x2) * a4
        + (1.0 - 2.5 * x2 + 1.5 * x3) * a2
        + (x2 - 0.5 * (x3 + x1)) * a1
        + (2.0 * x2 + 0.5 * (x1 - 3.0 * x3)) * a3
}

/// Four-tap cubic resample at `p` along `dir`, with tap indices clamped to
/// the raster; out-of-raster positions are transparent black.
fn cubic_sample(src: &View<'_>, p: f32, q: i32, dir: Dir) -> [f32; 4] {
    let res = src.extent(dir);
    if p < 0.0 || p >= res as f32 {
        return [0.0; 4];
    }
    #[allow(clippy::cast_possible_truncation)]
    let p1 = (p.floor() as i32).clamp(0, res - 1);
    let fx = (p - p1 as f32).clamp(0.0, 1.0);
    let p2 = (p1 + 1).clamp(0, res - 1);
    let p3 = (p2 + 1).clamp(0, res - 1);
    let p0 = (p1 - 1).clamp(0, res - 1);

    let t0 = src.sample(dir, p0, q);
    let t1 = src.sample(dir, p1, q);
    let t2 = src.sample(dir, p2, q);
    let t3 = src.sample(dir, p3, q);
    let mut val = [0.0_f32; 4];
    for c in 0..4 {
        val[c] = cubic(fx, t0[c], t1[c], t2[c], t3[c]);
    }
    val
}

/// Rescaler for 4-byte RGBA rasters.
///
/// The destination buffer is owned by the rescaler and borrowable through
/// [`Rescaler::pixels`] until the next [`Rescaler::rescale`] call.
#[derive(Debug, Default)]
pub struct Rescaler {
    data: Vec<u8>,
    size: ImageSize,
}

impl Rescaler {
    /// Creates a rescaler with an empty destination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rescales `pixels` (a `src_size` RGBA raster) into a `dst_size`
    /// destination.
    ///
    /// `xpos`/`ypos`/`xscale`/`yscale` are in logical destination space:
    /// scale 1 fills the destination exactly, position 0 centers, position
    /// 1 shifts by half a destination size.
    ///
    /// # Panics
    ///
    /// Panics if `pixels` is shorter than `src_size` requires.
    #[allow(clippy::too_many_arguments)]
    pub fn rescale(
        &mut self,
        pixels: &[u8],
        src_size: ImageSize,
        mode: RescaleMode,
        dst_size: ImageSize,
        xpos: f32,
        ypos: f32,
        xscale: f32,
        yscale: f32,
    ) {
        self.size = dst_size;
        if src_size.is_empty() || dst_size.is_empty() {
            self.data.clear();
            return;
        }

        let src = View {
            data: pixels,
            width: src_size.width,
            height: src_size.height,
        };
        let result = match mode {
            RescaleMode::Nearest => resize_nearest(&src, dst_size, xpos, ypos, xscale, yscale),
            RescaleMode::Bilinear => {
                resize_separable(&src, dst_size, xpos, ypos, xscale, yscale, lint)
            }
            RescaleMode::Bicubic => {
                resize_separable(&src, dst_size, xpos, ypos, xscale, yscale, cubic_sample)
            }
        };
        self.data = result.data;
    }

    /// The destination pixels of the most recent rescale.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// The destination size of the most recent rescale.
    #[must_use]
    pub fn size(&self) -> ImageSize {
        self.size
    }
}

/// Fixed-point 16.16 nearest-neighbor resize.
#[allow(clippy::cast_possible_truncation)] // fixed-point derivation truncates by design
fn resize_nearest(
    src: &View<'_>,
    dst_size: ImageSize,
    xpos: f32,
    ypos: f32,
    xscale: f32,
    yscale: f32,
) -> Raster {
    let xp = (src.width as f32 * (1.0 + xpos - xscale) * 65536.0 / (2.0 * xscale)) as i32;
    let yp = (src.height as f32 * (1.0 + ypos - yscale) * 65536.0 / (2.0 * yscale)) as i32;
    let xscale = xscale * dst_size.width as f32 / src.width as f32;
    let yscale = yscale * dst_size.height as f32 / src.height as f32;
    let xf = (65536.0 / xscale) as i32;
    let yf = (65536.0 / yscale) as i32;

    let mut out = Raster::new(dst_size.width, dst_size.height);
    for y in 0..dst_size.height {
        for x in 0..dst_size.width {
            let oldx = (x * xf + (xf >> 1) - xp) >> 16;
            let oldy = (y * yf + (yf >> 1) - yp) >> 16;
            if oldx < 0 || oldx >= src.width || oldy < 0 || oldy >= src.height {
                out.set(x, y, [0.0; 4]);
            } else {
                out.set(x, y, src.get(oldx, oldy));
            }
        }
    }
    out
}

/// Two-pass separable resize. `interp` is the magnification resampler
/// (linear or cubic); minification uses the area integral on either axis
/// independently.
fn resize_separable(
    src: &View<'_>,
    dst_size: ImageSize,
    xpos: f32,
    ypos: f32,
    xscale: f32,
    yscale: f32,
    interp: fn(&View<'_>, f32, i32, Dir) -> [f32; 4],
) -> Raster {
    let xpos = dst_size.width as f32 * (1.0 + xpos - xscale) / 2.0 - 0.5;
    let ypos = dst_size.height as f32 * (1.0 + ypos - yscale) / 2.0 - 0.5;
    let xscale = xscale * dst_size.width as f32 / src.width as f32;
    let yscale = yscale * dst_size.height as f32 / src.height as f32;

    // Horizontal pass into a dst_width x src_height intermediate.
    let mut mid = Raster::new(dst_size.width, src.height);
    if xscale.abs() < 1.0 {
        for y in 0..src.height {
            for x in 0..dst_size.width {
                let fx = (x as f32 - xpos) / xscale;
                mid.set(x, y, integrate(src, fx, y, xscale, Dir::X));
            }
        }
    } else {
        for y in 0..src.height {
            for x in 0..dst_size.width {
                let fx = (x as f32 - xpos) / xscale;
                mid.set(x, y, interp(src, fx, y, Dir::X));
            }
        }
    }

    // Vertical pass from the intermediate into the destination.
    let mid_view = mid.view();
    let mut out = Raster::new(dst_size.width, dst_size.height);
    if yscale.abs() < 1.0 {
        for y in 0..dst_size.height {
            for x in 0..dst_size.width {
                let fy = (y as f32 - ypos) / yscale;
                out.set(x, y, integrate(&mid_view, fy, x, yscale, Dir::Y));
            }
        }
    } else {
        for y in 0..dst_size.height {
            for x in 0..dst_size.width {
                let fy = (y as f32 - ypos) / yscale;
                out.set(x, y, interp(&mid_view, fy, x, Dir::Y));
            }
        }
    }
    out
}
