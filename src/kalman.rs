//! Fixed-size linear Kalman filter core: state dimension 7, measurement
//! dimension 4, control dimension 2 (spec.md §4.2). Generalizes the
//! teacher's `KalmanFilterLinear` (state 6, measurement 2) to the
//! bounding-box state TrackedBox needs, keeping the same `predict`/`update`
//! split and the same `nalgebra::SMatrix` fixed-size matrix style.

use std::error::Error;
use std::fmt;

use nalgebra::SMatrix;

pub type Vector7 = SMatrix<f32, 7, 1>;
pub type Matrix7 = SMatrix<f32, 7, 7>;
pub type Vector4 = SMatrix<f32, 4, 1>;
pub type Matrix4 = SMatrix<f32, 4, 4>;
pub type Matrix4x7 = SMatrix<f32, 4, 7>;
pub type Matrix7x4 = SMatrix<f32, 7, 4>;
pub type Vector2 = SMatrix<f32, 2, 1>;
pub type Matrix7x2 = SMatrix<f32, 7, 2>;

#[derive(Debug)]
pub struct SingularInnovationError(String);
impl fmt::Display for SingularInnovationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "There is an error: {}", self.0)
    }
}
impl Error for SingularInnovationError {}

/// Linear Gaussian state estimator over (x, P, F, B, Q, H, R), carried the
/// way the teacher's `KalmanFilterLinear` carries its own matrices, but
/// sized for the bounding-box state TrackedBox needs (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct StateEstimator {
    x: Vector7,
    p: Matrix7,
    f: Matrix7,
    b: Matrix7x2,
    q: Matrix7,
    h: Matrix4x7,
    r: Matrix4,
    i: Matrix7,
}

impl StateEstimator {
    pub fn new(x: Vector7, p: Matrix7, f: Matrix7, b: Matrix7x2, q: Matrix7, h: Matrix4x7, r: Matrix4) -> Self {
        StateEstimator { x, p, f, b, q, h, r, i: Matrix7::identity() }
    }

    pub fn state(&self) -> Vector7 {
        self.x
    }

    pub fn covariance(&self) -> Matrix7 {
        self.p
    }

    /// `x ← F·x + B·u`; `P ← F·P·Fᵀ + Q`.
    pub fn predict(&mut self, u: Vector2) -> Vector7 {
        self.x = (self.f * self.x) + (self.b * u);
        self.p = (self.f * self.p * self.f.transpose()) + self.q;
        self.x
    }

    /// `K ← P·Hᵀ·(H·P·Hᵀ + R)⁻¹`; `x ← x + K·(z − H·x)`; `P ← (I − K·H)·P`.
    pub fn update(&mut self, z: Vector4) -> Result<Vector7, SingularInnovationError> {
        let ht = self.h.transpose();
        let innovation_covariance = (self.h * self.p * ht) + self.r;
        let innovation_covariance_inv = match innovation_covariance.try_inverse() {
            Some(result) => result,
            None => {
                return Err(SingularInnovationError(
                    "can't invert innovation covariance H*P*H^T + R".to_string(),
                ));
            }
        };
        let kalman_gain = self.p * ht * innovation_covariance_inv;
        self.x = self.x + kalman_gain * (z - self.h * self.x);
        self.p = (self.i - (kalman_gain * self.h)) * self.p;
        Ok(self.x)
    }
}
