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

//! Color quantization using Xiaolin Wu's greedy orthogonal bipartition
//! algorithm (Graphics Gems vol. II, pp. 126-133).
//!
//! The quantizer reduces a true-color rectangle to an indexed palette of at
//! most 255 colors in three stages:
//!
//! 1. **Histogramming.** Every pixel is binned into a 33x33x33 RGB lattice
//!    (channel bytes right-shifted by 3, plus 1; lattice axis 0 holds the
//!    marginal row), accumulating counts, per-channel sums and the sum of
//!    squared channel values.
//! 2. **Moment transform.** The histograms are converted in place into 3-D
//!    cumulative moment tables, so the sum of any statistic over an
//!    open-closed box can be read with 8 lookups via inclusion-exclusion.
//! 3. **Box splitting.** Starting from one box covering the lattice, the
//!    highest-variance box is repeatedly bipartitioned along the axis and
//!    cut position that maximize the sum-of-squares objective, until the
//!    requested color count is reached or no box can be split further.
//!
//! No nearest-neighbor refinement is performed; each pixel maps to the box
//! containing its lattice cell, which keeps indexing a pure table lookup.

use crate::geometry::ImageRect;

/// Lattice size per axis. Valid coordinates are `1..=32`; 0 is marginal.
const HIST_DIM: usize = 33;
/// Number of cells in the full 3-D lattice.
const HIST_CELLS: usize = HIST_DIM * HIST_DIM * HIST_DIM;
/// Hard upper bound on the number of boxes the splitter will produce.
const MAX_COLORS: usize = 8192;

/// Packed lattice index for `(r, g, b)` coordinates:
/// `(r<<10) + (r<<6) + r + (g<<5) + g + b`, i.e. `r*1089 + g*33 + b`.
#[inline]
fn ind(r: usize, g: usize, b: usize) -> usize {
    (r << 10) + (r << 6) + r + (g << 5) + g + b
}

/// Cut axis; ties break red over green over blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Red,
    Green,
    Blue,
}

/// An axis-aligned box on the lattice. Low bounds are exclusive, high
/// bounds inclusive, so the box sums are open-closed on every axis.
#[derive(Debug, Clone, Copy, Default)]
struct ColorBox {
    r0: usize,
    r1: usize,
    g0: usize,
    g1: usize,
    b0: usize,
    b1: usize,
    vol: i64,
}

impl ColorBox {
    fn update_volume(&mut self) {
        self.vol = (self.r1 - self.r0) as i64 * (self.g1 - self.g0) as i64 * (self.b1 - self.b0) as i64;
    }
}

/// The cumulative moment tables: weight, per-channel sums, squared sum.
struct Moments {
    wt: Vec<i32>,
    mr: Vec<i32>,
    mg: Vec<i32>,
    mb: Vec<i32>,
    m2: Vec<f32>,
}

impl Moments {
    fn new() -> Self {
        Self {
            wt: vec![0; HIST_CELLS],
            mr: vec![0; HIST_CELLS],
            mg: vec![0; HIST_CELLS],
            mb: vec![0; HIST_CELLS],
            m2: vec![0.0; HIST_CELLS],
        }
    }
}

/// Sum of an integer statistic over a box via 8-point inclusion-exclusion.
fn volume(c: &ColorBox, mmt: &[i32]) -> i32 {
    mmt[ind(c.r1, c.g1, c.b1)] - mmt[ind(c.r1, c.g1, c.b0)] - mmt[ind(c.r1, c.g0, c.b1)]
        + mmt[ind(c.r1, c.g0, c.b0)]
        - mmt[ind(c.r0, c.g1, c.b1)]
        + mmt[ind(c.r0, c.g1, c.b0)]
        + mmt[ind(c.r0, c.g0, c.b1)]
        - mmt[ind(c.r0, c.g0, c.b0)]
}

/// Same as [`volume`] for the float table.
fn volume_f32(c: &ColorBox, mmt: &[f32]) -> f32 {
    mmt[ind(c.r1, c.g1, c.b1)] - mmt[ind(c.r1, c.g1, c.b0)] - mmt[ind(c.r1, c.g0, c.b1)]
        + mmt[ind(c.r1, c.g0, c.b0)]
        - mmt[ind(c.r0, c.g1, c.b1)]
        + mmt[ind(c.r0, c.g1, c.b0)]
        + mmt[ind(c.r0, c.g0, c.b1)]
        - mmt[ind(c.r0, c.g0, c.b0)]
}

/// The part of [`volume`] that does not depend on the box's upper bound on
/// the cut axis. `bottom + top(pos)` is the volume of the lower sub-box when
/// splitting at `pos`.
fn bottom(c: &ColorBox, dir: Axis, mmt: &[i32]) -> i32 {
    match dir {
        Axis::Red => {
            -mmt[ind(c.r0, c.g1, c.b1)] + mmt[ind(c.r0, c.g1, c.b0)] + mmt[ind(c.r0, c.g0, c.b1)]
                - mmt[ind(c.r0, c.g0, c.b0)]
        }
        Axis::Green => {
            -mmt[ind(c.r1, c.g0, c.b1)] + mmt[ind(c.r1, c.g0, c.b0)] + mmt[ind(c.r0, c.g0, c.b1)]
                - mmt[ind(c.r0, c.g0, c.b0)]
        }
        Axis::Blue => {
            -mmt[ind(c.r1, c.g1, c.b0)] + mmt[ind(c.r1, c.g0, c.b0)] + mmt[ind(c.r0, c.g1, c.b0)]
                - mmt[ind(c.r0, c.g0, c.b0)]
        }
    }
}

/// The remainder of [`volume`] with `pos` substituted for the box's upper
/// bound on the cut axis.
fn top(c: &ColorBox, dir: Axis, pos: usize, mmt: &[i32]) -> i32 {
    match dir {
        Axis::Red => {
            mmt[ind(pos, c.g1, c.b1)] - mmt[ind(pos, c.g1, c.b0)] - mmt[ind(pos, c.g0, c.b1)]
                + mmt[ind(pos, c.g0, c.b0)]
        }
        Axis::Green => {
            mmt[ind(c.r1, pos, c.b1)] - mmt[ind(c.r1, pos, c.b0)] - mmt[ind(c.r0, pos, c.b1)]
                + mmt[ind(c.r0, pos, c.b0)]
        }
        Axis::Blue => {
            mmt[ind(c.r1, c.g1, pos)] - mmt[ind(c.r1, c.g0, pos)] - mmt[ind(c.r0, c.g1, pos)]
                + mmt[ind(c.r0, c.g0, pos)]
        }
    }
}

/// Weighted variance of a box (times its size, like the raw statistics).
fn variance(c: &ColorBox, m: &Moments) -> f32 {
    let dr = volume(c, &m.mr) as f32;
    let dg = volume(c, &m.mg) as f32;
    let db = volume(c, &m.mb) as f32;
    let xx = volume_f32(c, &m.m2);
    xx - (dr * dr + dg * dg + db * db) / volume(c, &m.wt) as f32
}

/// Scans cut positions `first..last` on `dir`, maximizing the sum of the
/// two sub-boxes' squared-sum objectives. Positions that would leave either
/// sub-box empty of pixels are skipped. Returns the best objective and the
/// cut position, or -1 when no valid cut exists.
#[allow(clippy::too_many_arguments)]
fn maximize(
    c: &ColorBox,
    dir: Axis,
    first: usize,
    last: usize,
    whole_r: i32,
    whole_g: i32,
    whole_b: i32,
    whole_w: i32,
    m: &Moments,
) -> (f32, i32) {
    let base_r = bottom(c, dir, &m.mr);
    let base_g = bottom(c, dir, &m.mg);
    let base_b = bottom(c, dir, &m.mb);
    let base_w = bottom(c, dir, &m.wt);

    let mut max = 0.0_f32;
    let mut cut = -1_i32;
    for i in first..last {
        let mut half_r = base_r + top(c, dir, i, &m.mr);
        let mut half_g = base_g + top(c, dir, i, &m.mg);
        let mut half_b = base_b + top(c, dir, i, &m.mb);
        let mut half_w = base_w + top(c, dir, i, &m.wt);
        if half_w == 0 {
            continue;
        }
        let mut temp = (half_r as f32 * half_r as f32
            + half_g as f32 * half_g as f32
            + half_b as f32 * half_b as f32)
            / half_w as f32;

        half_r = whole_r - half_r;
        half_g = whole_g - half_g;
        half_b = whole_b - half_b;
        half_w = whole_w - half_w;
        if half_w == 0 {
            continue;
        }
        temp += (half_r as f32 * half_r as f32
            + half_g as f32 * half_g as f32
            + half_b as f32 * half_b as f32)
            / half_w as f32;

        if temp > max {
            max = temp;
            cut = i as i32;
        }
    }
    (max, cut)
}

/// Bipartitions `set1` in place, returning the new upper box, or `None`
/// when the box cannot be split.
fn try_cut(set1: &mut ColorBox, m: &Moments) -> Option<ColorBox> {
    let whole_r = volume(set1, &m.mr);
    let whole_g = volume(set1, &m.mg);
    let whole_b = volume(set1, &m.mb);
    let whole_w = volume(set1, &m.wt);

    let (maxr, cutr) = maximize(set1, Axis::Red, set1.r0 + 1, set1.r1, whole_r, whole_g, whole_b, whole_w, m);
    let (maxg, cutg) = maximize(set1, Axis::Green, set1.g0 + 1, set1.g1, whole_r, whole_g, whole_b, whole_w, m);
    let (maxb, cutb) = maximize(set1, Axis::Blue, set1.b0 + 1, set1.b1, whole_r, whole_g, whole_b, whole_w, m);

    let (dir, cut) = if maxr >= maxg && maxr >= maxb {
        (Axis::Red, cutr)
    } else if maxg >= maxr && maxg >= maxb {
        (Axis::Green, cutg)
    } else {
        (Axis::Blue, cutb)
    };
    if cut < 0 {
        return None;
    }
    let cut = cut as usize;

    let mut set2 = ColorBox {
        r0: set1.r0,
        r1: set1.r1,
        g0: set1.g0,
        g1: set1.g1,
        b0: set1.b0,
        b1: set1.b1,
        vol: 0,
    };
    match dir {
        Axis::Red => {
            set1.r1 = cut;
            set2.r0 = cut;
        }
        Axis::Green => {
            set1.g1 = cut;
            set2.g0 = cut;
        }
        Axis::Blue => {
            set1.b1 = cut;
            set2.b0 = cut;
        }
    }
    set1.update_volume();
    set2.update_volume();
    Some(set2)
}

/// Writes `label` into the tag table over the box's closed lattice cells.
fn mark(c: &ColorBox, label: u8, tag: &mut [u8]) {
    for r in (c.r0 + 1)..=c.r1 {
        for g in (c.g0 + 1)..=c.g1 {
            for b in (c.b0 + 1)..=c.b1 {
                tag[ind(r, g, b)] = label;
            }
        }
    }
}

/// Wu color quantizer: produces a palette and an index image for a
/// rectangle of a 4-byte-per-pixel raster.
///
/// The first three bytes of each pixel are read as `{b, g, r}` — the
/// capture pipeline's native BGRA byte order.
#[derive(Debug)]
pub struct Quantizer {
    rgb: [[u8; 3]; 256],
    rgba: [[u8; 4]; 256],
    palette_len: usize,
    index_data: Vec<u8>,
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Quantizer {
    /// Creates an empty quantizer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rgb: [[0; 3]; 256],
            rgba: [[0; 4]; 256],
            palette_len: 0,
            index_data: Vec::new(),
        }
    }

    /// Quantizes `rect` of the raster into at most `num_colors` colors.
    ///
    /// `pixels` is the raster base; `stride` is the byte distance between
    /// row starts; `rect` must lie within the raster (callers clamp first).
    /// `num_colors` is clamped to `1..=8191`; values above 255 exceed the
    /// palette storage and are only meaningful to callers that consume the
    /// box partition through the index image.
    ///
    /// The result is deterministic: identical input and `num_colors` yield
    /// bit-identical palette and index image.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is too short for the addressed rectangle.
    pub fn quantize(&mut self, pixels: &[u8], stride: usize, rect: ImageRect, num_colors: usize) {
        let mut num_colors = num_colors.clamp(1, MAX_COLORS - 1);

        let width = rect.width.max(0) as usize;
        let height = rect.height.max(0) as usize;
        let left = rect.left.max(0) as usize;
        let top = rect.top.max(0) as usize;

        let mut moments = Moments::new();
        let mut qadd = vec![0_u16; width * height];
        histogram(&mut moments, &mut qadd, pixels, stride, left, top, width, height);
        compute_moments(&mut moments);

        let mut cube = vec![ColorBox::default(); num_colors];
        cube[0].r1 = HIST_DIM - 1;
        cube[0].g1 = HIST_DIM - 1;
        cube[0].b1 = HIST_DIM - 1;

        let mut vv = vec![0.0_f32; num_colors];
        let mut next = 0_usize;
        let mut i = 1_usize;
        while i < num_colors {
            let produced = match try_cut(&mut cube[next], &moments) {
                Some(set2) => {
                    cube[i] = set2;
                    vv[next] = if cube[next].vol > 1 { variance(&cube[next], &moments) } else { 0.0 };
                    vv[i] = if cube[i].vol > 1 { variance(&cube[i], &moments) } else { 0.0 };
                    i
                }
                None => {
                    // This box cannot be split; never try it again.
                    vv[next] = 0.0;
                    i - 1
                }
            };

            let mut max = vv[0];
            next = 0;
            for (k, &v) in vv.iter().enumerate().take(produced + 1).skip(1) {
                if v > max {
                    max = v;
                    next = k;
                }
            }
            if max <= 0.0 {
                num_colors = produced + 1;
                break;
            }
            i = produced + 1;
        }

        self.rgb = [[0; 3]; 256];
        self.rgba = [[0; 4]; 256];
        let mut tag = vec![0_u8; HIST_CELLS];
        for (k, c) in cube.iter().enumerate().take(num_colors) {
            #[allow(clippy::cast_possible_truncation)] // labels beyond the palette wrap, as documented
            mark(c, k as u8, &mut tag);
            let weight = volume(c, &moments.wt);
            if k < 256 {
                if weight > 0 {
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    let r = (volume(c, &moments.mr) / weight) as u8;
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    let g = (volume(c, &moments.mg) / weight) as u8;
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    let b = (volume(c, &moments.mb) / weight) as u8;
                    self.rgb[k] = [r, g, b];
                    self.rgba[k] = [r, g, b, 255];
                } else {
                    self.rgb[k] = [0; 3];
                    self.rgba[k] = [0; 4];
                }
            }
        }

        self.index_data.clear();
        self.index_data.reserve(qadd.len());
        self.index_data.extend(qadd.iter().map(|&q| tag[q as usize]));
        self.palette_len = num_colors;
    }

    /// Discards the index image.
    pub fn clear(&mut self) {
        self.index_data.clear();
    }

    /// The 24-bit palette. Entries past [`Self::palette_len`] are zero.
    #[must_use]
    pub fn palette_rgb(&self) -> &[[u8; 3]; 256] {
        &self.rgb
    }

    /// The 32-bit palette; populated entries with nonzero weight carry
    /// alpha 255.
    #[must_use]
    pub fn palette_rgba(&self) -> &[[u8; 4]; 256] {
        &self.rgba
    }

    /// Number of palette entries actually produced.
    #[must_use]
    pub fn palette_len(&self) -> usize {
        self.palette_len
    }

    /// The index image: `rect.width * rect.height` palette indices in row
    /// order.
    #[must_use]
    pub fn index_data(&self) -> &[u8] {
        &self.index_data
    }
}

/// Builds the 3-D histograms and fills `qadd` with each pixel's lattice
/// index.
#[allow(clippy::too_many_arguments)]
fn histogram(
    m: &mut Moments,
    qadd: &mut [u16],
    pixels: &[u8],
    stride: usize,
    left: usize,
    top: usize,
    width: usize,
    height: usize,
) {
    let mut table = [0_i32; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = (i * i) as i32;
    }

    let mut out = 0_usize;
    for y in 0..height {
        for x in 0..width {
            let src = &pixels[(y + top) * stride + (x + left) * 4..];
            let b = src[0] as usize;
            let g = src[1] as usize;
            let r = src[2] as usize;

            let inr = (r >> 3) + 1;
            let ing = (g >> 3) + 1;
            let inb = (b >> 3) + 1;
            let idx = ind(inr, ing, inb);
            #[allow(clippy::cast_possible_truncation)] // lattice indices fit u16 (max 35936)
            {
                qadd[out] = idx as u16;
            }
            out += 1;

            m.wt[idx] += 1;
            m.mr[idx] += r as i32;
            m.mg[idx] += g as i32;
            m.mb[idx] += b as i32;
            m.m2[idx] += (table[r] + table[g] + table[b]) as f32;
        }
    }
}

/// Converts the histograms into cumulative moments in place, one 1-D
/// prefix-sum pass per axis, so box sums become 8-lookup differences.
fn compute_moments(m: &mut Moments) {
    let mut area = [0_i32; HIST_DIM];
    let mut area_r = [0_i32; HIST_DIM];
    let mut area_g = [0_i32; HIST_DIM];
    let mut area_b = [0_i32; HIST_DIM];
    let mut area2 = [0.0_f32; HIST_DIM];

    for r in 1..HIST_DIM {
        area.fill(0);
        area_r.fill(0);
        area_g.fill(0);
        area_b.fill(0);
        area2.fill(0.0);

        for g in 1..HIST_DIM {
            let mut line = 0_i32;
            let mut line_r = 0_i32;
            let mut line_g = 0_i32;
            let mut line_b = 0_i32;
            let mut line2 = 0.0_f32;
            for b in 1..HIST_DIM {
                let ind1 = ind(r, g, b);
                line += m.wt[ind1];
                line_r += m.mr[ind1];
                line_g += m.mg[ind1];
                line_b += m.mb[ind1];
                line2 += m.m2[ind1];

                area[b] += line;
                area_r[b] += line_r;
                area_g[b] += line_g;
                area_b[b] += line_b;
                area2[b] += line2;

                let ind2 = ind1 - 1089; // same cell in the r-1 plane
                m.wt[ind1] = m.wt[ind2] + area[b];
                m.mr[ind1] = m.mr[ind2] + area_r[b];
                m.mg[ind1] = m.mg[ind2] + area_g[b];
                m.mb[ind1] = m.mb[ind2] + area_b[b];
                m.m2[ind1] = m.m2[ind2] + area2[b];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a BGRA raster from `(r, g, b)` triples.
    fn bgra_raster(colors: &[(u8, u8, u8)]) -> Vec<u8> {
        let mut data = Vec::with_capacity(colors.len() * 4);
        for &(r, g, b) in colors {
            data.extend_from_slice(&[b, g, r, 255]);
        }
        data
    }

    #[test]
    fn test_four_distinct_colors_yield_four_entries() {
        let data = bgra_raster(&[(255, 0, 0), (0, 255, 0), (0, 0, 255), (255, 255, 255)]);
        let mut q = Quantizer::new();
        q.quantize(&data, 8, ImageRect::new(0, 0, 2, 2), 4);

        assert_eq!(q.palette_len(), 4, "four distinct colors, four boxes");
        assert_eq!(q.index_data().len(), 4);

        // Each source color must appear exactly in the palette, and its
        // pixel must map to that entry.
        for (i, &(r, g, b)) in [(255, 0, 0), (0, 255, 0), (0, 0, 255), (255, 255, 255)]
            .iter()
            .enumerate()
        {
            let idx = q.index_data()[i] as usize;
            assert!(idx < q.palette_len(), "index {idx} out of palette range");
            assert_eq!(q.palette_rgb()[idx], [r, g, b], "pixel {i} palette entry");
            assert_eq!(q.palette_rgba()[idx], [r, g, b, 255]);
        }
    }

    #[test]
    fn test_single_color_collapses_to_one_entry() {
        let data = bgra_raster(&[(10, 200, 30); 16]);
        let mut q = Quantizer::new();
        q.quantize(&data, 16, ImageRect::new(0, 0, 4, 4), 255);

        assert_eq!(q.palette_len(), 1, "one distinct color, one box");
        assert!(q.index_data().iter().all(|&i| i == 0));
        assert_eq!(q.palette_rgb()[0], [10, 200, 30]);
    }

    #[test]
    fn test_palette_count_bounded_and_indices_valid() {
        // A gradient with more distinct colors than the color budget.
        let mut colors = Vec::new();
        for y in 0..16_u8 {
            for x in 0..16_u8 {
                colors.push((x * 16, y * 16, x.wrapping_mul(y)));
            }
        }
        let data = bgra_raster(&colors);
        let mut q = Quantizer::new();
        q.quantize(&data, 16 * 4, ImageRect::new(0, 0, 16, 16), 16);

        assert!(q.palette_len() >= 1 && q.palette_len() <= 16);
        assert!(
            q.index_data().iter().all(|&i| (i as usize) < q.palette_len()),
            "all indices must reference produced palette entries"
        );
    }

    #[test]
    fn test_determinism() {
        let mut colors = Vec::new();
        for i in 0..64_u32 {
            colors.push(((i * 7 % 256) as u8, (i * 13 % 256) as u8, (i * 29 % 256) as u8));
        }
        let data = bgra_raster(&colors);
        let rect = ImageRect::new(0, 0, 8, 8);

        let mut a = Quantizer::new();
        let mut b = Quantizer::new();
        a.quantize(&data, 32, rect, 8);
        b.quantize(&data, 32, rect, 8);

        assert_eq!(a.palette_len(), b.palette_len());
        assert_eq!(a.palette_rgb(), b.palette_rgb());
        assert_eq!(a.palette_rgba(), b.palette_rgba());
        assert_eq!(a.index_data(), b.index_data());
    }

    /// Oversized color budgets are clamped, not rejected.
    #[test]
    fn test_num_colors_clamp() {
        let data = bgra_raster(&[(1, 2, 3), (4, 5, 6)]);
        let mut q = Quantizer::new();
        q.quantize(&data, 8, ImageRect::new(0, 0, 2, 1), 100_000);
        assert!(q.palette_len() <= 255);
    }

    /// The quantizer honors the rectangle offset and raster stride.
    #[test]
    fn test_sub_rectangle_with_stride() {
        // 4x2 raster; quantize only the right 2x2 half (solid green).
        let mut colors = vec![(255, 0, 0); 8];
        colors[2] = (0, 255, 0);
        colors[3] = (0, 255, 0);
        colors[6] = (0, 255, 0);
        colors[7] = (0, 255, 0);
        let data = bgra_raster(&colors);
        let mut q = Quantizer::new();
        q.quantize(&data, 16, ImageRect::new(2, 0, 2, 2), 255);

        assert_eq!(q.palette_len(), 1);
        assert_eq!(q.palette_rgb()[0], [0, 255, 0]);
        assert_eq!(q.index_data(), &[0, 0, 0, 0]);
    }
}
