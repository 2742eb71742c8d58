//! Trajectory accumulation (spec.md §4.6): an ordered, timestamped sequence
//! of bounding-box samples plus a reference copy of the frame captured when
//! the trajectory was created.

use chrono::{DateTime, Utc};
use nalgebra::{Matrix3, Vector3};

use crate::frame::Frame;
use crate::geometry::Rect;
use crate::tracker::Tag;

/// One observation appended to a [`Trajectory`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub rect: Rect,
    pub center: (f32, f32),
    pub velocity: (f32, f32),
    pub timestamp: DateTime<Utc>,
}

impl SamplePoint {
    pub fn new(rect: Rect, velocity: (f32, f32), timestamp: DateTime<Utc>) -> Self {
        SamplePoint { rect, center: rect.center(), velocity, timestamp }
    }
}

/// An ordered sequence of samples an object followed, plus the frame it was
/// first seen in (copied once, at creation).
#[derive(Debug, Clone)]
pub struct Trajectory {
    tag: Tag,
    frame: Frame,
    samples: Vec<SamplePoint>,
    age: u32,
}

impl Trajectory {
    /// Creates a trajectory holding its own copy of `frame` and a single
    /// starting sample.
    pub fn new(tag: Tag, frame: Frame, first: SamplePoint) -> Self {
        Trajectory { tag, frame, samples: vec![first], age: 0 }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn samples(&self) -> &[SamplePoint] {
        &self.samples
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    /// Appends a sample and resets age to 0.
    pub fn add(&mut self, rect: Rect, velocity: (f32, f32), timestamp: DateTime<Utc>) {
        self.samples.push(SamplePoint::new(rect, velocity, timestamp));
        self.age = 0;
    }

    pub fn increment_age(&mut self) {
        self.age += 1;
    }

    /// Forces `age` past `max_age` so the next sweep ends this trajectory
    /// in the same frame (spec.md §4.5 step 6 / §9 open question 1).
    pub fn force_end(&mut self, max_age: u32) {
        self.age = max_age.saturating_add(1);
    }

    pub fn get_start_time(&self) -> DateTime<Utc> {
        self.samples[0].timestamp
    }

    pub fn get_num_samples(&self) -> usize {
        self.samples.len()
    }

    /// `|Δy|` between the first and last sample's centers.
    pub fn get_range_y(&self) -> f32 {
        let first = self.samples.first().expect("a trajectory always holds at least one sample");
        let last = self.samples.last().expect("a trajectory always holds at least one sample");
        (last.center.1 - first.center.1).abs()
    }

    /// A trajectory qualifies as a falling object when it accumulated
    /// enough samples and covered enough vertical distance (spec.md §4.5
    /// step 9).
    pub fn qualifies(&self, min_num_samples: usize, min_fall_distance: f32) -> bool {
        self.get_num_samples() >= min_num_samples && self.get_range_y() >= min_fall_distance
    }

    /// Weighted least-squares parabola `y = a*x^2 + b*x + c` fit for
    /// rendering only (spec.md §4.6), weighting later samples higher via
    /// `w_i = exp(-i/N)` where `i` is the distance from the most recent
    /// sample. Needs at least 3 samples to be well-posed; returns `None`
    /// otherwise or if the normal equations are singular.
    pub fn fit_parabola(&self) -> Option<(f32, f32, f32)> {
        let n = self.samples.len();
        if n < 3 {
            return None;
        }

        let mut ata = Matrix3::<f32>::zeros();
        let mut aty = Vector3::<f32>::zeros();
        for (k, sample) in self.samples.iter().enumerate() {
            let (xc, yc) = sample.center;
            let distance_from_end = (n - 1 - k) as f32;
            let weight = (-distance_from_end / n as f32).exp();
            let row = Vector3::new(xc * xc, xc, 1.0);
            ata += row * row.transpose() * weight;
            aty += row * (yc * weight);
        }

        let cholesky = ata.cholesky()?;
        let theta = cholesky.solve(&aty);
        Some((theta[0], theta[1], theta[2]))
    }
}
