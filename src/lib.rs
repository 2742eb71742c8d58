//! Real-time falling-object detection core: per-pixel background
//! subtraction, an IoU/Kalman multi-object tracker, and trajectory
//! accumulation for objects that fall past a fixed camera.

pub mod assignment;
pub mod background;
pub mod config;
pub mod frame;
pub mod geometry;
pub mod kalman;
pub mod tracked_box;
pub mod tracker;
pub mod trajectory;

pub use background::BackgroundModel;
pub use config::{BackgroundModelConfig, Config, TrackerConfig};
pub use frame::{Frame, Mask};
pub use geometry::Rect;
pub use tracked_box::TrackedBox;
pub use tracker::{Tag, Tracker};
pub use trajectory::{SamplePoint, Trajectory};
