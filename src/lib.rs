//! Proximity HUD
//!
//! Turns object detections from a forward camera into a stylized top-down
//! "heads-up display": a car icon with colored bubbles for the people and
//! vehicles around it.
//!
//! # Pipeline
//!
//! One cycle of the render loop:
//!
//! 1. A `FrameSource` hands out a frame (camera, still image, or synthetic).
//! 2. The frame is downscaled for analysis and passed to the default
//!    `DetectorBackend` in the `BackendRegistry`.
//! 3. `HudMapper` filters the detections, smooths them per track, and places
//!    each one by side and by polar position.
//! 4. A `HudRenderer` draws the mapped frame onto a `Canvas`, which a
//!    `FrameSink` stores or discards.
//!
//! # Module Structure
//!
//! - `detect`: detection types, backend trait, registry, stub/tract backends
//! - `hud`: the detection-to-HUD mapper (filter, side, polar, smoothing)
//! - `ingest`: frame sources
//! - `render`: canvas, presentation modes, frame sinks
//! - `sim`: simulated traffic backend
//! - `camera`: pinhole projection shared by `sim` and the billboard view
//! - `driver`: the start/stop render loop
//! - `config`, `ui`: configuration loading and console progress

pub mod camera;
pub mod config;
pub mod detect;
pub mod driver;
pub mod frame;
pub mod hud;
pub mod ingest;
pub mod render;
pub mod sim;
pub mod ui;

pub use detect::{BackendRegistry, BoundingBox, Detection, DetectorBackend, ObjectClass};
pub use driver::{CycleReport, DriverState, DriverStats, HudDriver};
pub use frame::{Frame, FrameContext};
pub use hud::{HudMapper, MappedFrame, MappedObject};
pub use render::{Canvas, HudRenderer, RenderMode};

/// Failures the driver reports to the user as distinct conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HudError {
    /// The detector could not be loaded or warmed up.
    DetectorLoad(String),
    /// The camera or reference image could not be opened.
    CameraAcquisition(String),
    /// A single render-loop cycle failed. The loop keeps going.
    Cycle(String),
    /// A stop was requested before `start` finished.
    Interrupted(String),
}

impl HudError {
    pub fn code(&self) -> &'static str {
        match self {
            HudError::DetectorLoad(_) => "DETECTOR_LOAD",
            HudError::CameraAcquisition(_) => "CAMERA_ACQUISITION",
            HudError::Cycle(_) => "CYCLE",
            HudError::Interrupted(_) => "INTERRUPTED",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            HudError::DetectorLoad(message)
            | HudError::CameraAcquisition(message)
            | HudError::Cycle(message)
            | HudError::Interrupted(message) => message,
        }
    }
}

impl std::fmt::Display for HudError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for HudError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hud_errors_survive_anyhow() {
        let err: anyhow::Error = HudError::CameraAcquisition("no /dev/video0".to_string()).into();
        assert_eq!(err.to_string(), "CAMERA_ACQUISITION: no /dev/video0");
        assert_eq!(
            err.downcast_ref::<HudError>(),
            Some(&HudError::CameraAcquisition("no /dev/video0".to_string()))
        );
    }
}
