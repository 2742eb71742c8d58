//! Multi-object tracker (spec.md §4.5): predicts every live track, solves an
//! IoU assignment against the frame's detections, and promotes consistently
//! matched tracks into trajectories. Ownership follows the teacher's
//! `KalmanBlobiesTracker` shape (`HashMap<id, _>` keyed by an opaque tag),
//! generalized to the IoU/Hungarian association this spec needs instead of
//! nearest-neighbor distance matching.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::assignment;
use crate::config::TrackerConfig;
use crate::frame::Frame;
use crate::geometry::Rect;
use crate::tracked_box::TrackedBox;
use crate::trajectory::Trajectory;

/// Gravity-plus-drift control bias applied to every track's predict step
/// (spec.md §4.5 step 2).
const GRAVITY_BIAS: (f32, f32) = (0.05, 0.7);

/// Monotonically increasing identifier, unique for the lifetime of the
/// `Tracker` instance that issued it. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u64);

pub struct Tracker {
    config: TrackerConfig,
    next_tag: u64,
    tracks: HashMap<Tag, TrackedBox>,
    trajectories: HashMap<Tag, Trajectory>,
    on_trajectory_ended: Box<dyn FnMut(Tag, &Trajectory)>,
}

impl Tracker {
    pub fn new(config: TrackerConfig, on_trajectory_ended: Box<dyn FnMut(Tag, &Trajectory)>) -> Self {
        Tracker { config, next_tag: 0, tracks: HashMap::new(), trajectories: HashMap::new(), on_trajectory_ended }
    }

    pub fn tracks(&self) -> &HashMap<Tag, TrackedBox> {
        &self.tracks
    }

    pub fn trajectories(&self) -> &HashMap<Tag, Trajectory> {
        &self.trajectories
    }

    fn issue_tag(&mut self) -> Tag {
        let tag = Tag(self.next_tag);
        self.next_tag += 1;
        tag
    }

    /// Drops all tracks and trajectories without firing the end callback.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.trajectories.clear();
    }

    /// Runs one frame of the association pipeline. `detections` are
    /// accepted as-is, including negative or out-of-frame coordinates.
    pub fn update(&mut self, detections: &[Rect], frame: &Frame, timestamp: DateTime<Utc>) {
        // Step 1: bootstrap.
        if self.tracks.is_empty() {
            for &rect in detections {
                let tag = self.issue_tag();
                self.tracks.insert(tag, TrackedBox::new(rect, 1.0));
            }
            return;
        }

        // Step 2: predict every existing track, in a stable tag order so
        // the cost matrix's row index is deterministic.
        let mut tags: Vec<Tag> = self.tracks.keys().copied().collect();
        tags.sort();
        let mut predicted = Vec::with_capacity(tags.len());
        for &tag in &tags {
            let track = self.tracks.get_mut(&tag).expect("tag collected from tracks must still be present");
            predicted.push(track.predict(GRAVITY_BIAS));
        }

        // Step 3: cost matrix (maximized IoU).
        let cost: Vec<Vec<f32>> = predicted.iter().map(|p| detections.iter().map(|d| p.iou(d)).collect()).collect();

        // Step 4: solve.
        let (assign, mut reverse, _total) = assignment::solve(&cost, true);

        // Step 5: apply matches.
        for (i, &tag) in tags.iter().enumerate() {
            if let Some(j) = assign[i] {
                if cost[i][j] > self.config.iou_threshold {
                    let track = self.tracks.get_mut(&tag).expect("tag must still be present");
                    track.update(detections[j]);
                } else {
                    reverse[j] = None;
                }
            }
        }

        // Step 6: expire.
        let mut expired = Vec::new();
        for (&tag, track) in self.tracks.iter() {
            if track.age() > self.config.max_bbox_age {
                expired.push(tag);
            }
        }
        for tag in expired {
            self.tracks.remove(&tag);
            if let Some(trajectory) = self.trajectories.get_mut(&tag) {
                trajectory.force_end(self.config.max_trajectory_age);
            }
        }

        // Step 7: spawn new tracks for unmatched detections.
        for (j, &det) in detections.iter().enumerate() {
            if reverse[j].is_none() {
                let tag = self.issue_tag();
                self.tracks.insert(tag, TrackedBox::new(det, 1.0));
            }
        }

        // Step 8: promote qualifying tracks to trajectories.
        for (&tag, track) in self.tracks.iter() {
            if track.hit_streak() >= self.config.min_bbox_hit_streak {
                let rect = track.rect();
                let velocity = track.velocity();
                self.trajectories
                    .entry(tag)
                    .and_modify(|trajectory| trajectory.add(rect, velocity, timestamp))
                    .or_insert_with(|| {
                        let sample = crate::trajectory::SamplePoint::new(rect, velocity, timestamp);
                        Trajectory::new(tag, frame.clone(), sample)
                    });
            }
        }

        // Step 9: age and sweep trajectories, firing the end callback for
        // qualifying ones (force-ended trajectories from step 6 are caught
        // here too, in the same frame they were force-ended).
        let mut ended = Vec::new();
        for (&tag, trajectory) in self.trajectories.iter_mut() {
            if trajectory.age() > self.config.max_trajectory_age {
                ended.push(tag);
            } else {
                trajectory.increment_age();
            }
        }
        for tag in ended {
            let trajectory = self.trajectories.remove(&tag).expect("tag collected from trajectories must still be present");
            if trajectory.qualifies(self.config.min_trajectory_num_samples, self.config.min_trajectory_fall_distance) {
                (self.on_trajectory_ended)(tag, &trajectory);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ts(offset_ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(offset_ms).unwrap()
    }

    fn test_config() -> TrackerConfig {
        TrackerConfig {
            max_bbox_age: 2,
            min_bbox_hit_streak: 3,
            max_trajectory_age: 5,
            min_trajectory_num_samples: 16,
            min_trajectory_fall_distance: 128.0,
            iou_threshold: 0.25,
        }
    }

    /// Scenario A (spec.md §8): a single falling rectangle, 30 frames.
    #[test]
    fn single_falling_rectangle_fires_one_end_callback() {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let fired_inner = fired.clone();
        let mut tracker = Tracker::new(
            test_config(),
            Box::new(move |tag, trajectory: &Trajectory| {
                fired_inner.borrow_mut().push((tag, trajectory.get_num_samples(), trajectory.get_range_y()));
            }),
        );
        let frame = Frame::zeroed(1000, 800);

        for k in 0..30 {
            let rect = Rect::new(500.0, 50.0 + 10.0 * k as f32, 40.0, 60.0);
            tracker.update(&[rect], &frame, ts(k as i64 * 33));
        }
        // Drain trajectories past max_trajectory_age with no further detections.
        for k in 30..40 {
            tracker.update(&[], &frame, ts(k as i64 * 33));
        }

        let events = fired.borrow();
        assert_eq!(events.len(), 1, "expected exactly one end-of-trajectory callback, got {:?}", *events);
        assert!(events[0].1 >= 16);
        assert!(events[0].2 >= 128.0);
    }

    /// Scenario C (spec.md §8): transient single-frame noise never promotes
    /// to a trajectory and the track is swept away.
    #[test]
    fn transient_blob_never_becomes_a_trajectory() {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let fired_inner = fired.clone();
        let config = test_config();
        let max_age = config.max_bbox_age;
        let mut tracker = Tracker::new(
            config,
            Box::new(move |tag, _trajectory: &Trajectory| {
                fired_inner.borrow_mut().push(tag);
            }),
        );
        let frame = Frame::zeroed(200, 200);

        tracker.update(&[Rect::new(10.0, 10.0, 20.0, 20.0)], &frame, ts(0));
        assert_eq!(tracker.tracks().len(), 1);

        for k in 1..(max_age as i64 + 3) {
            tracker.update(&[], &frame, ts(k * 33));
        }

        assert!(tracker.tracks().is_empty());
        assert!(tracker.trajectories().is_empty());
        assert!(fired.borrow().is_empty());
    }

    /// Scenario B (spec.md §8): crossing rectangles keep their tags.
    #[test]
    fn crossing_rectangles_do_not_swap_tags() {
        let mut tracker = Tracker::new(test_config(), Box::new(|_tag, _trajectory: &Trajectory| {}));
        let frame = Frame::zeroed(1000, 200);

        let a0 = Rect::new(0.0, 50.0, 40.0, 40.0);
        let b0 = Rect::new(900.0, 50.0, 40.0, 40.0);
        tracker.update(&[a0, b0], &frame, ts(0));
        let mut tags: Vec<Tag> = tracker.tracks().keys().copied().collect();
        tags.sort();
        let (tag_a, tag_b) = (tags[0], tags[1]);

        for k in 1..20 {
            let ax = 0.0 + 45.0 * k as f32;
            let bx = 900.0 - 45.0 * k as f32;
            let a = Rect::new(ax, 50.0, 40.0, 40.0);
            let b = Rect::new(bx, 50.0, 40.0, 40.0);
            tracker.update(&[a, b], &frame, ts(k as i64 * 33));
        }

        let mut final_tags: Vec<Tag> = tracker.tracks().keys().copied().collect();
        final_tags.sort();
        let mut expected = vec![tag_a, tag_b];
        expected.sort();
        assert_eq!(final_tags, expected);
    }

    #[test]
    fn tags_are_monotonic_and_never_reused() {
        let mut tracker = Tracker::new(test_config(), Box::new(|_tag, _trajectory: &Trajectory| {}));
        let frame = Frame::zeroed(100, 100);
        tracker.update(&[Rect::new(0.0, 0.0, 10.0, 10.0)], &frame, ts(0));
        tracker.update(&[Rect::new(50.0, 50.0, 10.0, 10.0)], &frame, ts(33));
        let tags: Vec<u64> = tracker.tracks().keys().map(|t| t.0).collect();
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1]);
    }

    /// Boundary behavior 11 (spec.md §8): empty detections advance age
    /// without creating tracks or firing callbacks.
    #[test]
    fn empty_detections_do_not_create_tracks_or_fire_callbacks() {
        let fired = Rc::new(RefCell::new(false));
        let fired_inner = fired.clone();
        let mut tracker = Tracker::new(
            test_config(),
            Box::new(move |_tag, _trajectory: &Trajectory| {
                *fired_inner.borrow_mut() = true;
            }),
        );
        let frame = Frame::zeroed(50, 50);
        tracker.update(&[], &frame, ts(0));
        assert!(tracker.tracks().is_empty());
        assert!(!*fired.borrow());
    }

    #[test]
    fn clear_drops_state_without_firing_callbacks() {
        let fired = Rc::new(RefCell::new(false));
        let fired_inner = fired.clone();
        let mut tracker = Tracker::new(
            test_config(),
            Box::new(move |_tag, _trajectory: &Trajectory| {
                *fired_inner.borrow_mut() = true;
            }),
        );
        let frame = Frame::zeroed(50, 50);
        tracker.update(&[Rect::new(0.0, 0.0, 10.0, 10.0)], &frame, ts(0));
        tracker.clear();
        assert!(tracker.tracks().is_empty());
        assert!(tracker.trajectories().is_empty());
        assert!(!*fired.borrow());
    }
}
