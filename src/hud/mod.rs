//! Detection-to-HUD mapping.
//!
//! This is the one piece of real logic in the crate. Every presentation mode
//! consumes its output:
//!
//! - `filter`: which detector outputs count (class set + confidence cut)
//! - `side`: left / right / both classification for side bubbles
//! - `polar`: angle + distance placement around the car
//! - `smoothing`: per-key exponential smoothing across frames
//!
//! `HudMapper::map_frame` runs the whole chain for one frame. It is pure apart
//! from the optional `TrackSmoother`, which the caller owns.

pub mod filter;
pub mod polar;
pub mod side;
pub mod smoothing;

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;

use crate::detect::{BoundingBox, Detection, ObjectClass};
use crate::frame::FrameContext;

pub use filter::{FilterPolicy, DEFAULT_CONFIDENCE_THRESHOLD};
pub use polar::{map_to_polar, DistanceCurve, PolarPosition};
pub use side::{classify_side, Side, SideSummary};
pub use smoothing::{track_key, Observation, TrackSmoother};

/// One detection after filtering, smoothing and placement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MappedObject {
    pub key: String,
    pub class: ObjectClass,
    pub score: f32,
    /// Box the placement was computed from (smoothed when smoothing is on).
    pub bbox: BoundingBox,
    pub polar: PolarPosition,
    pub side: Side,
}

/// Mapper output for one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MappedFrame {
    pub context: FrameContext,
    pub objects: Vec<MappedObject>,
    pub sides: SideSummary,
}

impl MappedFrame {
    pub fn empty(context: FrameContext) -> Self {
        Self {
            context,
            objects: Vec::new(),
            sides: SideSummary::default(),
        }
    }

    /// Objects ordered nearest first.
    pub fn nearest_first(&self) -> Vec<&MappedObject> {
        let mut objects: Vec<&MappedObject> = self.objects.iter().collect();
        objects.sort_by(|a, b| a.polar.r.total_cmp(&b.polar.r));
        objects
    }
}

#[derive(Clone, Debug, Default)]
pub struct HudMapper {
    filter: FilterPolicy,
    curve: DistanceCurve,
}

impl HudMapper {
    pub fn new(filter: FilterPolicy, curve: DistanceCurve) -> Self {
        Self { filter, curve }
    }

    pub fn filter(&self) -> &FilterPolicy {
        &self.filter
    }

    pub fn curve(&self) -> DistanceCurve {
        self.curve
    }

    /// Map one frame of detections.
    ///
    /// When `smoother` is given, each admitted detection is blended into its
    /// track before placement and the smoother's cycle is closed afterwards.
    pub fn map_frame(
        &self,
        detections: &[Detection],
        context: FrameContext,
        mut smoother: Option<&mut TrackSmoother>,
    ) -> Result<MappedFrame> {
        let context = FrameContext::new(context.width, context.height)?;
        let mut ordinals: HashMap<ObjectClass, usize> = HashMap::new();
        let mut objects = Vec::new();

        for (class, det) in self.filter.apply(detections) {
            let ordinal = ordinals.entry(class).or_insert(0);
            let key = track_key(class, *ordinal);
            *ordinal += 1;

            let (bbox, score) = match smoother.as_deref_mut() {
                Some(smoother) => {
                    let smoothed = smoother.observe(&key, Observation::from_box(&det.bbox, det.score));
                    (smoothed.bbox(), smoothed.score)
                }
                None => (det.bbox, det.score),
            };

            let polar = map_to_polar(&bbox, &context, self.curve)?;
            let side = classify_side(&bbox, context.width);
            objects.push(MappedObject {
                key,
                class,
                score,
                bbox,
                polar,
                side,
            });
        }

        if let Some(smoother) = smoother {
            let evicted = smoother.end_cycle();
            if evicted > 0 {
                log::debug!("smoother evicted {} idle track(s)", evicted);
            }
        }

        let sides = SideSummary::collect(objects.iter().map(|obj| (obj.class, obj.side)));
        Ok(MappedFrame {
            context,
            objects,
            sides,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FrameContext {
        FrameContext {
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn maps_admitted_detections_in_order() -> Result<()> {
        let mapper = HudMapper::default();
        let detections = vec![
            Detection::new("car", 0.9, BoundingBox::new(500.0, 200.0, 100.0, 80.0)),
            Detection::new("dog", 0.9, BoundingBox::new(10.0, 10.0, 10.0, 10.0)),
            Detection::new("person", 0.5, BoundingBox::new(20.0, 200.0, 40.0, 120.0)),
            Detection::new("car", 0.7, BoundingBox::new(290.0, 200.0, 60.0, 40.0)),
        ];
        let mapped = mapper.map_frame(&detections, ctx(), None)?;
        let keys: Vec<&str> = mapped.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["car-0", "person-0", "car-1"]);

        assert_eq!(mapped.objects[0].side, Side::Right);
        assert_eq!(mapped.objects[1].side, Side::Left);
        assert_eq!(mapped.objects[2].side, Side::Both);
        assert_eq!(mapped.sides.left, vec![ObjectClass::Person, ObjectClass::Car]);
        assert_eq!(mapped.sides.right, vec![ObjectClass::Car, ObjectClass::Car]);
        Ok(())
    }

    #[test]
    fn smoothing_pulls_toward_previous_position() -> Result<()> {
        let mapper = HudMapper::default();
        let mut smoother = TrackSmoother::default();
        let first = vec![Detection::new("car", 0.9, BoundingBox::new(0.0, 200.0, 60.0, 40.0))];
        let second = vec![Detection::new("car", 0.9, BoundingBox::new(400.0, 200.0, 60.0, 40.0))];

        mapper.map_frame(&first, ctx(), Some(&mut smoother))?;
        let mapped = mapper.map_frame(&second, ctx(), Some(&mut smoother))?;
        assert!((mapped.objects[0].bbox.x - 180.0).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn empty_context_is_rejected() {
        let mapper = HudMapper::default();
        let ctx = FrameContext {
            width: 0,
            height: 480,
        };
        assert!(mapper.map_frame(&[], ctx, None).is_err());
    }

    #[test]
    fn nearest_first_orders_by_distance() -> Result<()> {
        let mapper = HudMapper::default();
        let detections = vec![
            Detection::new("car", 0.9, BoundingBox::new(0.0, 0.0, 20.0, 20.0)),
            Detection::new("bus", 0.9, BoundingBox::new(0.0, 0.0, 300.0, 200.0)),
        ];
        let mapped = mapper.map_frame(&detections, ctx(), None)?;
        assert_eq!(mapped.nearest_first()[0].class, ObjectClass::Bus);
        Ok(())
    }
}
