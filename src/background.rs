//! Per-pixel stochastic background model (ViBe-style), spec.md §4.1.
//!
//! Owns, per pixel, an unordered bag of `N` recently-observed colors plus
//! two "history images" that receive cheap O(1) comparisons each frame.
//! Samples are only valid after the first `segment` call seeds them from
//! the incoming frame (perturbed by small per-channel noise).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::frame::{l1_distance, Frame, Mask};

fn perturb_channel(v: u8, rng: &mut StdRng) -> u8 {
    let noise: i32 = rng.random_range(-10..=10);
    (v as i32 + noise).clamp(0, 255) as u8
}

fn perturb_color(c: [u8; 3], rng: &mut StdRng) -> [u8; 3] {
    [perturb_channel(c[0], rng), perturb_channel(c[1], rng), perturb_channel(c[2], rng)]
}

pub struct BackgroundModel {
    width: usize,
    height: usize,
    num_samples: usize,
    tau: i32,
    kappa: u32,
    update_factor: u32,
    rng: StdRng,
    initialized: bool,
    samples: Vec<[u8; 3]>,
    h0: Vec<[u8; 3]>,
    h1: Vec<[u8; 3]>,
    swap_flag: bool,
    /// Per-pixel update tables, precomputed once at construction (spec.md
    /// §4.1): `jump[i] in [1, 2*update_factor]`, `replace[i] in [0, N+1]`
    /// (0/1 select a history image, 2..=N+1 select `samples[.][slot-2]`),
    /// `neighbor[i] in {-1, 0, +1}` (a same-row column offset). Each has
    /// length `2*max(H,W)+1`.
    jump: Vec<u32>,
    replace: Vec<usize>,
    neighbor: Vec<i32>,
}

impl BackgroundModel {
    /// `color_distance_raw` is the per-channel L1 threshold; the effective
    /// threshold used by `segment`/`update` is `3 * color_distance_raw`
    /// (spec.md §4.1: raw 20 ⇒ effective 60, scaled by channel count).
    pub fn new(
        width: usize,
        height: usize,
        num_samples: usize,
        color_distance_raw: i32,
        min_close_samples: u32,
        update_factor: u32,
        rng_seed: u64,
    ) -> Self {
        let update_factor = update_factor.max(1);
        let mut rng = StdRng::seed_from_u64(rng_seed);
        let table_len = 2 * width.max(height) + 1;
        let jump = (0..table_len).map(|_| rng.random_range(1..=2 * update_factor)).collect();
        let replace = (0..table_len).map(|_| rng.random_range(0..=num_samples + 1)).collect();
        let neighbor = (0..table_len).map(|_| rng.random_range(-1i32..=1i32)).collect();

        BackgroundModel {
            width,
            height,
            num_samples,
            tau: color_distance_raw * 3,
            kappa: min_close_samples,
            update_factor,
            rng,
            initialized: false,
            samples: vec![[0u8; 3]; width * height * num_samples],
            h0: vec![[0u8; 3]; width * height],
            h1: vec![[0u8; 3]; width * height],
            swap_flag: false,
            jump,
            replace,
            neighbor,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Marks the model uninitialized; the next `segment` call reseeds from
    /// whatever frame it receives.
    pub fn clear(&mut self) {
        self.initialized = false;
    }

    fn seed(&mut self, frame: &Frame) {
        let n = self.num_samples;
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let px = frame.pixel(x, y);
                self.h0[idx] = px;
                self.h1[idx] = px;
                for k in 0..n {
                    self.samples[idx * n + k] = perturb_color(px, &mut self.rng);
                }
            }
        }
        self.initialized = true;
    }

    /// Produces an 8-bit mask (`0` background, `255` foreground).
    /// Reseeds from `frame` on the first call after construction or
    /// `clear()`.
    pub fn segment(&mut self, frame: &Frame) -> Mask {
        frame
            .check_dims("BackgroundModel::segment", self.width, self.height)
            .expect("BackgroundModel::segment: frame dimensions must match the configured (H, W)");

        if !self.initialized {
            self.seed(frame);
        }

        let mut mask = Mask::background(self.width, self.height);
        self.segment_into(frame, &mut mask);
        self.swap_flag = !self.swap_flag;
        mask
    }

    /// Per-pixel inner loop, parallelized over disjoint row chunks of
    /// `h0`/`h1`/`samples`/the output mask (spec.md §5): each pixel's
    /// writes stay within its own history cell and sample row, so chunking
    /// by row is race-free.
    fn segment_into(&mut self, frame: &Frame, mask: &mut Mask) {
        let w = self.width;
        let n = self.num_samples;
        let tau = self.tau;
        let kappa = self.kappa as i32;
        let target_is_h0 = !self.swap_flag;
        let frame_data = frame.as_slice();

        let h0 = &mut self.h0;
        let h1 = &mut self.h1;
        let samples = &mut self.samples;
        let mask_data = mask.as_mut_slice();

        h0.par_chunks_mut(w)
            .zip(h1.par_chunks_mut(w))
            .zip(samples.par_chunks_mut(w * n))
            .zip(mask_data.par_chunks_mut(w))
            .zip(frame_data.par_chunks(w * 3))
            .for_each(|((((h0_row, h1_row), samples_row), mask_row), frame_row)| {
                for x in 0..w {
                    let px = [frame_row[x * 3], frame_row[x * 3 + 1], frame_row[x * 3 + 2]];
                    let mut counter = kappa - 1;
                    if l1_distance(px, h0_row[x]) > tau {
                        counter = kappa;
                    }
                    if l1_distance(px, h1_row[x]) <= tau {
                        counter -= 1;
                    }
                    if counter > 0 {
                        let base = x * n;
                        for k in 0..n {
                            if l1_distance(px, samples_row[base + k]) <= tau {
                                counter -= 1;
                                if target_is_h0 {
                                    h0_row[x] = px;
                                } else {
                                    h1_row[x] = px;
                                }
                                if counter <= 0 {
                                    break;
                                }
                            }
                        }
                    }
                    mask_row[x] = if counter > 0 { 255 } else { 0 };
                }
            });
    }

    /// Writes `px` into the slot selected by `slot` at pixel `i` (and, for
    /// the interior path, additionally at pixel `i_neighbor`): `slot` 0/1
    /// select `h0`/`h1`, anything else selects `samples[.][slot-2]`.
    #[inline]
    fn write_slot(&mut self, i: usize, slot: usize, px: [u8; 3]) {
        if slot == 0 {
            self.h0[i] = px;
        } else if slot == 1 {
            self.h1[i] = px;
        } else {
            let k = slot - 2;
            if k < self.num_samples {
                self.samples[i * self.num_samples + k] = px;
            }
        }
    }

    /// Sparsely rewrites the model from pixels marked background
    /// (`update_mask[i] == 0`) in `frame`, using the precomputed
    /// `jump`/`replace`/`neighbor` tables (spec.md §4.1). Each interior row
    /// is walked by repeated jumps rather than pixel-by-pixel, realizing a
    /// ~1/update_factor per-pixel update probability without a per-pixel
    /// random draw; every written-to pixel also propagates the same color
    /// into its same-row neighbor at `x + neighbor[shift]`. The first row,
    /// last row, first column and last column are walked the same way but
    /// write only the targeted cell, since a same-row neighbor write would
    /// leave those borders. Kept strictly sequential (spec.md §5): the
    /// neighbor write crosses pixel boundaries each iteration depends on.
    pub fn update(&mut self, frame: &Frame, update_mask: &Mask) {
        frame
            .check_dims("BackgroundModel::update", self.width, self.height)
            .expect("BackgroundModel::update: frame dimensions must match the configured (H, W)");
        update_mask
            .check_dims("BackgroundModel::update", self.width, self.height)
            .expect("BackgroundModel::update: mask dimensions must match the configured (H, W)");
        assert!(self.initialized, "BackgroundModel::update: model not initialized, call segment first");

        let w = self.width;
        let h = self.height;
        if w == 0 || h == 0 {
            return;
        }
        let table_len = self.jump.len();

        // Interior rows: jump-walked, own pixel plus same-row neighbor.
        if h > 2 {
            for y in 1..h - 1 {
                let mut shift = self.rng.random_range(0..w) % table_len;
                let mut x = self.jump[shift] as usize;
                while x < w - 1 {
                    if update_mask.get(x, y) == 0 {
                        let slot = self.replace[shift];
                        let delta = self.neighbor[shift];
                        let px = frame.pixel(x, y);
                        let i = y * w + x;
                        self.write_slot(i, slot, px);
                        let nx = (x as i32 + delta) as usize;
                        let ni = y * w + nx;
                        self.write_slot(ni, slot, px);
                    }
                    shift += 1;
                    if shift >= table_len {
                        break;
                    }
                    x += self.jump[shift] as usize;
                }
            }
        }

        // Border rows (no neighbor propagation): own pixel only.
        let mut border_rows = vec![0usize];
        if h > 1 {
            border_rows.push(h - 1);
        }
        for y in border_rows {
            self.update_line_own_only(frame, update_mask, (0..w).map(|x| (x, y)));
        }

        // Border columns (no neighbor propagation), interior rows only to
        // avoid re-touching the corners already covered above.
        if h > 2 {
            let mut border_cols = vec![0usize];
            if w > 1 {
                border_cols.push(w - 1);
            }
            for x in border_cols {
                self.update_line_own_only(frame, update_mask, (1..h - 1).map(|y| (x, y)));
            }
        }
    }

    /// Jump-walks a 1-D sequence of `(x, y)` pixel positions, writing only
    /// the targeted pixel's slot (no same-row neighbor write) — used for
    /// the frame border, where a neighbor write could leave the image.
    fn update_line_own_only(&mut self, frame: &Frame, update_mask: &Mask, line: impl Iterator<Item = (usize, usize)>) {
        let w = self.width;
        let table_len = self.jump.len();
        let positions: Vec<(usize, usize)> = line.collect();
        let len = positions.len();
        if len == 0 {
            return;
        }

        let mut shift = self.rng.random_range(0..table_len);
        let mut idx = (self.jump[shift] as usize).saturating_sub(1);
        while idx < len {
            let (x, y) = positions[idx];
            if update_mask.get(x, y) == 0 {
                let slot = self.replace[shift];
                let px = frame.pixel(x, y);
                self.write_slot(y * w + x, slot, px);
            }
            shift += 1;
            if shift >= table_len {
                break;
            }
            idx += self.jump[shift] as usize;
        }
    }
}
