use anyhow::Result;
use std::f32::consts::FRAC_PI_3;

use hud_overlay::hud::polar::{angle_for, raw_closeness};
use hud_overlay::hud::side::side_for_normalized;
use hud_overlay::hud::{
    map_to_polar, DistanceCurve, FilterPolicy, HudMapper, Observation, Side, TrackSmoother,
};
use hud_overlay::{BoundingBox, Detection, FrameContext};

fn ctx() -> FrameContext {
    FrameContext {
        width: 640,
        height: 480,
    }
}

#[test]
fn side_bands_cover_every_center() {
    assert_eq!(side_for_normalized(0.3), Side::Left);
    assert_eq!(side_for_normalized(0.7), Side::Right);
    assert_eq!(side_for_normalized(0.5), Side::Both);
    assert_eq!(side_for_normalized(0.46), Side::Both);
    assert_eq!(side_for_normalized(0.54), Side::Both);
    assert_eq!(side_for_normalized(0.4599), Side::Left);
    assert_eq!(side_for_normalized(0.5401), Side::Right);

    for step in 0..=1000 {
        let nx = step as f32 / 1000.0;
        let side = side_for_normalized(nx);
        let expected = if nx < 0.46 {
            Side::Left
        } else if nx > 0.54 {
            Side::Right
        } else {
            Side::Both
        };
        assert_eq!(side, expected, "nx = {}", nx);
    }
}

#[test]
fn angle_is_bounded_and_increasing() {
    assert!((angle_for(-1.0) + FRAC_PI_3).abs() < 1e-6);
    assert_eq!(angle_for(0.0), 0.0);
    assert!((angle_for(1.0) - FRAC_PI_3).abs() < 1e-6);

    let mut previous = f32::NEG_INFINITY;
    for step in -100..=100 {
        let angle = angle_for(step as f32 / 100.0);
        assert!(angle > previous);
        assert!(angle.abs() <= FRAC_PI_3 + 1e-6);
        previous = angle;
    }
}

#[test]
fn larger_boxes_map_closer_under_both_curves() -> Result<()> {
    assert_eq!(raw_closeness(0.25), 0.0);
    assert!((raw_closeness(0.01) - 0.8).abs() < 1e-6);

    let context = FrameContext {
        width: 1000,
        height: 1000,
    };
    // area ratios 0.25 and 0.01
    let near = BoundingBox::new(250.0, 400.0, 500.0, 500.0);
    let far = BoundingBox::new(450.0, 400.0, 100.0, 100.0);
    for curve in [DistanceCurve::Clamp, DistanceCurve::Affine] {
        let r_near = map_to_polar(&near, &context, curve)?.r;
        let r_far = map_to_polar(&far, &context, curve)?.r;
        assert!(r_near < r_far, "{:?}: {} !< {}", curve, r_near, r_far);
        assert!(r_near >= curve.floor() && r_far <= 1.0);
    }
    Ok(())
}

#[test]
fn smoothing_converges_on_a_constant_observation() -> Result<()> {
    let mut smoother = TrackSmoother::new(0.45, None)?;
    let start = Observation {
        x: 0.0,
        y: 0.0,
        w: 0.0,
        h: 0.0,
        score: 0.5,
    };
    let target = Observation {
        x: 320.0,
        y: 240.0,
        w: 80.0,
        h: 60.0,
        score: 0.5,
    };
    smoother.observe("car-0", start);
    // From an unrelated start the gap shrinks by 0.55 per step.
    let mut value = start;
    for _ in 0..8 {
        value = smoother.observe("car-0", target);
    }
    assert!((value.x - target.x).abs() / target.x < 0.01);
    assert!((value.w - target.w).abs() / target.w < 0.01);

    // A previously unseen key starts exactly at its first observation.
    let fresh = smoother.observe("person-0", target);
    assert_eq!(fresh, target);
    Ok(())
}

#[test]
fn score_smoothing_follows_the_max_rule() -> Result<()> {
    let mut smoother = TrackSmoother::new(0.45, None)?;
    let bbox = BoundingBox::new(10.0, 10.0, 40.0, 40.0);
    smoother.observe("car-0", Observation::from_box(&bbox, 0.9));
    let second = smoother.observe("car-0", Observation::from_box(&bbox, 0.3));
    assert!(second.score >= 0.9 * (1.0 - 0.45) - 1e-6);
    assert!((second.score - 0.495).abs() < 1e-6);
    Ok(())
}

#[test]
fn irrelevant_classes_and_weak_scores_never_reach_the_output() -> Result<()> {
    let mapper = HudMapper::new(FilterPolicy::with_threshold(0.4)?, DistanceCurve::Affine);
    let boxes = [
        BoundingBox::new(0.0, 0.0, 640.0, 480.0),
        BoundingBox::new(300.0, 200.0, 10.0, 10.0),
        BoundingBox::new(-50.0, -50.0, 2000.0, 10.0),
    ];
    let mut detections = Vec::new();
    for bbox in boxes {
        detections.push(Detection::new("dog", 0.99, bbox));
        detections.push(Detection::new("car", 0.2, bbox));
    }
    // Exactly at the threshold is not enough.
    detections.push(Detection::new("bicycle", 0.4, boxes[0]));
    detections.push(Detection::new("person", 0.41, boxes[1]));

    let mut smoother = TrackSmoother::default();
    let mapped = mapper.map_frame(&detections, ctx(), Some(&mut smoother))?;
    assert_eq!(mapped.objects.len(), 1);
    assert_eq!(mapped.objects[0].key, "person-0");
    assert_eq!(smoother.len(), 1);
    Ok(())
}

#[test]
fn mapping_is_a_function_of_its_inputs() -> Result<()> {
    let mapper = HudMapper::default();
    let detections = vec![
        Detection::new("car", 0.9, BoundingBox::new(400.0, 200.0, 120.0, 90.0)),
        Detection::new("person", 0.7, BoundingBox::new(40.0, 180.0, 30.0, 90.0)),
        Detection::new("car", 0.8, BoundingBox::new(280.0, 220.0, 60.0, 40.0)),
    ];
    let first = mapper.map_frame(&detections, ctx(), None)?;
    let second = mapper.map_frame(&detections, ctx(), None)?;
    assert_eq!(first, second);

    let keys: Vec<&str> = first.objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["car-0", "person-0", "car-1"]);
    for object in &first.objects {
        assert!(object.polar.angle.is_finite() && object.polar.r.is_finite());
    }
    Ok(())
}
