//! Bounding-box state estimator: wraps [`StateEstimator`] with the
//! measurement encoding and lifecycle bookkeeping spec.md §4.3 describes,
//! generalizing the teacher's `KalmanBlobie` (position-only, 6-state) to a
//! full bbox state (cx, cy, s, r, vx, vy, vs).

use crate::geometry::Rect;
use crate::kalman::{Matrix4, Matrix4x7, Matrix7, Matrix7x2, StateEstimator, Vector2, Vector4, Vector7};

/// `(x, y, w, h) -> (cx, cy, area, aspect_ratio)`. Computed literally as
/// spec.md §4.3 defines it (`w*h`, `w/h`) with no clamp — a negative `w`/`h`
/// (accepted as-is per spec.md §6) still yields its real product/ratio;
/// only `measurementToRect`'s inverse direction clamps negative inputs.
pub fn rect_to_measurement(r: Rect) -> (f32, f32, f32, f32) {
    let (cx, cy) = r.center();
    let s = r.w * r.h;
    let ratio = if r.h.abs() > f32::EPSILON { r.w / r.h } else { 0.0 };
    (cx, cy, s, ratio)
}

/// `(cx, cy, area, aspect_ratio) -> (x, y, w, h)`. Returns the zero
/// rectangle for a negative area or aspect ratio (spec.md §4.3).
pub fn measurement_to_rect(cx: f32, cy: f32, s: f32, r: f32) -> Rect {
    if s < 0.0 || r < 0.0 {
        return Rect::zero();
    }
    let w = (s * r).sqrt();
    let h = if w.abs() > f32::EPSILON { s / w } else { 0.0 };
    Rect::new(cx - w / 2.0, cy - h / 2.0, w, h)
}

/// Constant-velocity bbox track: age (frames since last update), hits
/// (lifetime updates), hit_streak (consecutive updates from age==1).
#[derive(Debug, Clone)]
pub struct TrackedBox {
    estimator: StateEstimator,
    age: u32,
    hits: u32,
    hit_streak: u32,
}

impl TrackedBox {
    /// Builds a track seeded from an unmatched detection, age=0, hits=0,
    /// hit_streak=0. `dt` is the per-`predict` time step (one frame, so 1.0
    /// unless the driver supplies wall-clock-scaled deltas).
    pub fn new(rect: Rect, dt: f32) -> Self {
        let (cx, cy, s, r) = rect_to_measurement(rect);
        let x0 = Vector7::new(cx, cy, s, r, 0.0, 0.0, 0.0);

        // F: identity with dt coupling position to velocity on (cx,vx),
        // (cy,vy), (s,vs); resolved against the oc-sort-style reference
        // kalman box tracker in the example pack (see DESIGN.md) since
        // spec.md's own index notation for this is ambiguous.
        let mut f = Matrix7::identity();
        f[(0, 4)] = dt;
        f[(1, 5)] = dt;
        f[(2, 6)] = dt;

        // B: constant-acceleration kinematics, control u=(ax, ay) only
        // drives (cx, cy, vx, vy); s/r/vs have no control input.
        let mut b = Matrix7x2::zeros();
        let half_dt2 = 0.5 * dt * dt;
        b[(0, 0)] = half_dt2;
        b[(1, 1)] = half_dt2;
        b[(4, 0)] = dt;
        b[(5, 1)] = dt;

        let p0 = Matrix7::from_diagonal(&Vector7::new(10.0, 10.0, 10.0, 10.0, 1e4, 1e4, 1e4));
        let q = Matrix7::from_diagonal(&Vector7::new(1.0, 1.0, 1.0, 1e-2, 1e-2, 1e-2, 1e-4));
        #[rustfmt::skip]
        let h = Matrix4x7::new(
            1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
        );
        let r_mat = Matrix4::from_diagonal(&Vector4::new(1.0, 1.0, 10.0, 10.0));

        TrackedBox {
            estimator: StateEstimator::new(x0, p0, f, b, q, h, r_mat),
            age: 0,
            hits: 0,
            hit_streak: 0,
        }
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn hit_streak(&self) -> u32 {
        self.hit_streak
    }

    /// Current rectangle implied by the filter's state (last predicted or
    /// updated value, whichever ran most recently).
    pub fn rect(&self) -> Rect {
        let x = self.estimator.state();
        measurement_to_rect(x[0], x[1], x[2], x[3])
    }

    /// Current (vx, vy) from the filter state.
    pub fn velocity(&self) -> (f32, f32) {
        let x = self.estimator.state();
        (x[4], x[5])
    }

    /// Increments age, runs the filter predict with control `a`, returns
    /// the predicted rectangle.
    pub fn predict(&mut self, a: (f32, f32)) -> Rect {
        self.age += 1;
        let u = Vector2::new(a.0, a.1);
        let x = self.estimator.predict(u);
        measurement_to_rect(x[0], x[1], x[2], x[3])
    }

    /// Increments hits; bumps hit_streak iff age==1 (else resets it to 0);
    /// resets age to 0; runs the filter update against `z`.
    pub fn update(&mut self, z: Rect) -> Rect {
        self.hits += 1;
        if self.age == 1 {
            self.hit_streak += 1;
        } else {
            self.hit_streak = 0;
        }
        self.age = 0;

        let (cx, cy, s, r) = rect_to_measurement(z);
        let zm = Vector4::new(cx, cy, s, r);
        // R is positive-definite by construction (spec.md §4.2) so the
        // innovation covariance is always invertible here.
        let x = self
            .estimator
            .update(zm)
            .expect("TrackedBox::update: innovation covariance singular despite positive-definite R");
        measurement_to_rect(x[0], x[1], x[2], x[3])
    }
}
