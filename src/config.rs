//! TOML-backed configuration, modeled on the teacher's `AppSettings::new`:
//! read the whole file, parse, and panic with a diagnostic on malformed
//! TOML rather than threading a `Result` through startup.

use std::fs;

use serde::{Deserialize, Serialize};

fn default_num_samples() -> usize {
    20
}

fn default_color_distance_raw() -> i32 {
    20
}

fn default_min_close_samples() -> u32 {
    2
}

/// Update-subsampling factor; the option table only pins "5-6" so 6 is the
/// default here, matching the larger (more conservative, slower-adapting)
/// end of that range.
fn default_update_factor() -> u32 {
    6
}

fn default_rng_seed() -> u64 {
    0
}

fn default_max_bbox_age() -> u32 {
    2
}

fn default_min_bbox_hit_streak() -> u32 {
    3
}

fn default_max_trajectory_age() -> u32 {
    15
}

fn default_min_trajectory_num_samples() -> usize {
    16
}

fn default_min_trajectory_fall_distance() -> f32 {
    128.0
}

fn default_iou_threshold() -> f32 {
    0.25
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackgroundModelConfig {
    pub width: usize,
    pub height: usize,
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,
    #[serde(default = "default_color_distance_raw")]
    pub color_distance_raw: i32,
    #[serde(default = "default_min_close_samples")]
    pub min_close_samples: u32,
    #[serde(default = "default_update_factor")]
    pub update_factor: u32,
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrackerConfig {
    #[serde(default = "default_max_bbox_age")]
    pub max_bbox_age: u32,
    #[serde(default = "default_min_bbox_hit_streak")]
    pub min_bbox_hit_streak: u32,
    #[serde(default = "default_max_trajectory_age")]
    pub max_trajectory_age: u32,
    #[serde(default = "default_min_trajectory_num_samples")]
    pub min_trajectory_num_samples: usize,
    #[serde(default = "default_min_trajectory_fall_distance")]
    pub min_trajectory_fall_distance: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            max_bbox_age: default_max_bbox_age(),
            min_bbox_hit_streak: default_min_bbox_hit_streak(),
            max_trajectory_age: default_max_trajectory_age(),
            min_trajectory_num_samples: default_min_trajectory_num_samples(),
            min_trajectory_fall_distance: default_min_trajectory_fall_distance(),
            iou_threshold: default_iou_threshold(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub background: BackgroundModelConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl Config {
    /// Reads and parses `filename` as TOML. Panics on an unreadable file or
    /// malformed TOML, naming the component, matching the teacher's
    /// `AppSettings::new` convention of treating a bad config as fatal at
    /// startup rather than a recoverable error.
    pub fn new(filename: &str) -> Self {
        let toml_contents = fs::read_to_string(filename)
            .unwrap_or_else(|err| panic!("Config::new: can't read configuration file {}: {}", filename, err));
        match toml::from_str::<Config>(&toml_contents) {
            Ok(config) => config,
            Err(err) => panic!("Config::new: can't parse TOML configuration file due the error: {:?}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_in_defaults() {
        let raw = r#"
            [background]
            width = 640
            height = 480
        "#;
        let config: Config = toml::from_str(raw).expect("minimal config should parse");
        assert_eq!(config.background.num_samples, 20);
        assert_eq!(config.background.color_distance_raw, 20);
        assert_eq!(config.tracker.max_bbox_age, 2);
        assert_eq!(config.tracker.iou_threshold, 0.25);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let raw = r#"
            [background]
            width = 320
            height = 240
            num_samples = 12
            rng_seed = 7

            [tracker]
            iou_threshold = 0.4
        "#;
        let config: Config = toml::from_str(raw).expect("config should parse");
        assert_eq!(config.background.num_samples, 12);
        assert_eq!(config.background.rng_seed, 7);
        assert_eq!(config.tracker.iou_threshold, 0.4);
        assert_eq!(config.tracker.max_trajectory_age, 15);
    }
}
