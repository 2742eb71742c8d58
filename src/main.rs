//! Demo binary: drives the core over a synthetic falling-rectangle scene
//! and prints each completed trajectory. Video ingestion, detection, and
//! display are out of scope for the core (see DESIGN.md) so this binary
//! fabricates both the frames and the detection boxes itself.

use std::env;

use chrono::{Duration, Utc};

use fallwatch_core::{BackgroundModel, Config, Frame, Rect, Tracker};

fn main() {
    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => Config::new(path),
        None => {
            println!("No config file given, using built-in demo defaults.");
            Config {
                background: fallwatch_core::BackgroundModelConfig {
                    width: 640,
                    height: 480,
                    num_samples: 20,
                    color_distance_raw: 20,
                    min_close_samples: 2,
                    update_factor: 6,
                    rng_seed: 42,
                },
                tracker: fallwatch_core::TrackerConfig::default(),
            }
        }
    };

    let width = config.background.width;
    let height = config.background.height;

    let mut background = BackgroundModel::new(
        width,
        height,
        config.background.num_samples,
        config.background.color_distance_raw,
        config.background.min_close_samples,
        config.background.update_factor,
        config.background.rng_seed,
    );

    let mut tracker = Tracker::new(
        config.tracker,
        Box::new(|tag, trajectory: &fallwatch_core::Trajectory| {
            println!(
                "trajectory ended: tag={} samples={} start={} range_y={:.1}px",
                tag.0,
                trajectory.get_num_samples(),
                trajectory.get_start_time(),
                trajectory.get_range_y(),
            );
        }),
    );

    let base = Frame::zeroed(width, height);
    let start = Utc::now();

    for k in 0..30 {
        let rect = Rect::new(width as f32 / 2.0 - 20.0, 50.0 + 10.0 * k as f32, 40.0, 60.0);
        let mask = background.segment(&base);
        background.update(&base, &mask);
        let ts = start + Duration::milliseconds(33 * k as i64);
        tracker.update(&[rect], &base, ts);
    }

    // Let the last track age out and force its trajectory to end.
    for k in 30..40 {
        let ts = start + Duration::milliseconds(33 * k as i64);
        tracker.update(&[], &base, ts);
    }

    println!("demo run complete: {} live tracks, {} open trajectories", tracker.tracks().len(), tracker.trajectories().len());
}
