//! Polar placement around the car icon.
//!
//! Horizontal position becomes an angle in [-60°, +60°] off the car's heading.
//! Box size stands in for range: a box covering a quarter of the frame (or more)
//! is as close as it gets.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_3;

use crate::detect::BoundingBox;
use crate::frame::FrameContext;

/// Half-width of the angular fan.
pub const MAX_ANGLE: f32 = FRAC_PI_3;

/// How raw closeness becomes a drawn distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceCurve {
    /// clamp(raw, 0.05, 1.0)
    Clamp,
    /// 0.2 + raw * 0.8
    #[default]
    Affine,
}

impl DistanceCurve {
    pub fn apply(&self, raw_closeness: f32) -> f32 {
        match self {
            DistanceCurve::Clamp => raw_closeness.clamp(0.05, 1.0),
            DistanceCurve::Affine => 0.2 + raw_closeness * 0.8,
        }
    }

    /// Smallest distance the curve can produce.
    pub fn floor(&self) -> f32 {
        match self {
            DistanceCurve::Clamp => 0.05,
            DistanceCurve::Affine => 0.2,
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(DistanceCurve::Clamp),
            "affine" => Ok(DistanceCurve::Affine),
            other => Err(anyhow!("unknown distance curve '{}'; expected clamp or affine", other)),
        }
    }
}

/// Angle (radians, 0 = straight ahead, positive = right) and distance
/// (small = near).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PolarPosition {
    pub angle: f32,
    pub r: f32,
}

/// Angle for a horizontal position `nx` in [-1, 1]. Inputs outside are clamped.
pub fn angle_for(nx: f32) -> f32 {
    nx.clamp(-1.0, 1.0) * 60f32.to_radians()
}

/// 1 - min(1, sqrt(area_ratio) * 2): 0 at a quarter-frame box, 1 for a point.
pub fn raw_closeness(area_ratio: f32) -> f32 {
    1.0 - (area_ratio.max(0.0).sqrt() * 2.0).min(1.0)
}

pub fn map_to_polar(
    bbox: &BoundingBox,
    context: &FrameContext,
    curve: DistanceCurve,
) -> Result<PolarPosition> {
    if !bbox.is_finite() {
        return Err(anyhow!("bounding box has non-finite coordinates: {:?}", bbox));
    }
    if context.width == 0 || context.height == 0 {
        return Err(anyhow!("frame context must be non-empty"));
    }
    let (center_x, _) = bbox.center();
    let nx = (center_x / context.width as f32) * 2.0 - 1.0;
    let angle = angle_for(nx);
    let area_ratio = bbox.area() / context.area();
    let r = curve.apply(raw_closeness(area_ratio));
    Ok(PolarPosition { angle, r })
}
