//! Temporal smoothing of per-object boxes.
//!
//! Each track key holds an exponentially weighted running average of
//! (x, y, w, h) and a max-decay score. Keys are assigned by the caller and are
//! not stable object identities: `car-0` is simply the first car the detector
//! reported this frame.

use anyhow::{anyhow, Result};
use std::collections::HashMap;

use crate::detect::{BoundingBox, ObjectClass};

/// Blend weight for new observations.
pub const DEFAULT_ALPHA: f32 = 0.45;
/// Tracks unseen for longer than this many cycles are dropped.
pub const DEFAULT_MAX_IDLE_CYCLES: u32 = 30;

/// One observation (or smoothed value) for a track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub score: f32,
}

impl Observation {
    pub fn from_box(bbox: &BoundingBox, score: f32) -> Self {
        Self {
            x: bbox.x,
            y: bbox.y,
            w: bbox.width,
            h: bbox.height,
            score,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.y, self.w, self.h)
    }
}

#[derive(Clone, Debug)]
pub struct SmoothedTrack {
    pub value: Observation,
    pub updates: u64,
    last_seen_cycle: u64,
}

/// Track key for the `ordinal`-th object of `class` in detector order.
pub fn track_key(class: ObjectClass, ordinal: usize) -> String {
    format!("{}-{}", class.as_str(), ordinal)
}

/// Owned smoothing state. The render-loop driver owns one and lends it to the
/// mapper each cycle.
#[derive(Debug)]
pub struct TrackSmoother {
    alpha: f32,
    max_idle_cycles: Option<u32>,
    cycle: u64,
    tracks: HashMap<String, SmoothedTrack>,
}

impl TrackSmoother {
    pub fn new(alpha: f32, max_idle_cycles: Option<u32>) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(anyhow!("smoothing alpha must be within (0, 1], got {}", alpha));
        }
        Ok(Self {
            alpha,
            max_idle_cycles,
            cycle: 0,
            tracks: HashMap::new(),
        })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Blend `obs` into the track for `key` and return the smoothed value.
    pub fn observe(&mut self, key: &str, obs: Observation) -> Observation {
        let alpha = self.alpha;
        let cycle = self.cycle;
        match self.tracks.get_mut(key) {
            Some(track) => {
                let old = track.value;
                let keep = 1.0 - alpha;
                track.value = Observation {
                    x: old.x * keep + obs.x * alpha,
                    y: old.y * keep + obs.y * alpha,
                    w: old.w * keep + obs.w * alpha,
                    h: old.h * keep + obs.h * alpha,
                    score: (old.score * keep).max(obs.score),
                };
                track.updates += 1;
                track.last_seen_cycle = cycle;
                track.value
            }
            None => {
                self.tracks.insert(
                    key.to_string(),
                    SmoothedTrack {
                        value: obs,
                        updates: 1,
                        last_seen_cycle: cycle,
                    },
                );
                obs
            }
        }
    }

    /// Close the current cycle and drop tracks idle past the limit.
    ///
    /// Returns the number of evicted tracks.
    pub fn end_cycle(&mut self) -> usize {
        let before = self.tracks.len();
        if let Some(limit) = self.max_idle_cycles {
            let now = self.cycle;
            self.tracks
                .retain(|_, track| now.saturating_sub(track.last_seen_cycle) <= limit as u64);
        }
        self.cycle += 1;
        before - self.tracks.len()
    }

    pub fn get(&self, key: &str) -> Option<&SmoothedTrack> {
        self.tracks.get(key)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

impl Default for TrackSmoother {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            max_idle_cycles: Some(DEFAULT_MAX_IDLE_CYCLES),
            cycle: 0,
            tracks: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(x: f32, score: f32) -> Observation {
        Observation {
            x,
            y: x,
            w: 10.0,
            h: 10.0,
            score,
        }
    }

    #[test]
    fn first_observation_seeds_the_track() {
        let mut smoother = TrackSmoother::default();
        let out = smoother.observe("car-0", obs(100.0, 0.8));
        assert_eq!(out, obs(100.0, 0.8));
    }

    #[test]
    fn position_blends_at_alpha() {
        let mut smoother = TrackSmoother::default();
        smoother.observe("car-0", obs(0.0, 0.8));
        let out = smoother.observe("car-0", obs(100.0, 0.8));
        assert!((out.x - 45.0).abs() < 1e-4);
        assert!((out.y - 45.0).abs() < 1e-4);
        assert_eq!(out.w, 10.0);
    }

    #[test]
    fn score_uses_max_decay() {
        let mut smoother = TrackSmoother::default();
        smoother.observe("person-0", obs(0.0, 0.9));
        let out = smoother.observe("person-0", obs(0.0, 0.3));
        assert!((out.score - 0.495).abs() < 1e-5);

        let out = smoother.observe("person-0", obs(0.0, 0.95));
        assert!((out.score - 0.95).abs() < 1e-6);
    }

    #[test]
    fn idle_tracks_are_evicted() -> Result<()> {
        let mut smoother = TrackSmoother::new(DEFAULT_ALPHA, Some(2))?;
        smoother.observe("car-0", obs(0.0, 0.5));
        assert_eq!(smoother.end_cycle(), 0);
        assert_eq!(smoother.end_cycle(), 0);
        assert_eq!(smoother.end_cycle(), 0);
        assert!(smoother.get("car-0").is_some());
        assert_eq!(smoother.end_cycle(), 1);
        assert!(smoother.get("car-0").is_none());
        Ok(())
    }

    #[test]
    fn unbounded_smoother_keeps_stale_tracks() -> Result<()> {
        let mut smoother = TrackSmoother::new(DEFAULT_ALPHA, None)?;
        smoother.observe("bus-0", obs(5.0, 0.5));
        for _ in 0..1000 {
            smoother.end_cycle();
        }
        assert_eq!(smoother.get("bus-0").map(|t| t.value.x), Some(5.0));
        Ok(())
    }

    #[test]
    fn rejects_invalid_alpha() {
        assert!(TrackSmoother::new(0.0, None).is_err());
        assert!(TrackSmoother::new(1.2, None).is_err());
    }

    #[test]
    fn keys_follow_class_and_ordinal() {
        assert_eq!(track_key(ObjectClass::Motorbike, 2), "motorbike-2");
    }
}
