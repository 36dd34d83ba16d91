use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

/// Scripted backend for tests and model-less demos.
///
/// Each call returns the next scripted frame, wrapping around at the end. Script
/// boxes are fractions of the frame (0..1) and are scaled to the pixel size passed
/// to `detect`, so one script works for any analysis resolution.
pub struct StubBackend {
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl StubBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self { script, cursor: 0 }
    }

    /// A short street scene: a pedestrian drifting in on the left, a car pacing
    /// on the right, a truck ahead, plus detector noise the HUD must ignore.
    pub fn street_scene() -> Self {
        let frames = (0..24)
            .map(|i| {
                let t = i as f32 / 24.0;
                vec![
                    Detection::new("person", 0.82, BoundingBox::new(0.05 + 0.2 * t, 0.45, 0.08, 0.3)),
                    Detection::new("car", 0.91, BoundingBox::new(0.68, 0.5, 0.22 + 0.05 * t, 0.18)),
                    Detection::new("truck", 0.66, BoundingBox::new(0.45, 0.38, 0.1, 0.1)),
                    Detection::new("dog", 0.88, BoundingBox::new(0.3, 0.7, 0.05, 0.05)),
                    Detection::new("car", 0.2, BoundingBox::new(0.1, 0.4, 0.04, 0.03)),
                ]
            })
            .collect();
        Self::new(frames)
    }

    pub fn calls(&self) -> usize {
        self.cursor
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::street_scene()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        if self.script.is_empty() {
            self.cursor += 1;
            return Ok(Vec::new());
        }
        let frame = &self.script[self.cursor % self.script.len()];
        self.cursor += 1;

        let (sx, sy) = (width as f32, height as f32);
        Ok(frame
            .iter()
            .map(|det| Detection {
                label: det.label.clone(),
                score: det.score,
                bbox: det.bbox.scaled(sx, sy),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_replays_script_in_pixels() -> Result<()> {
        let mut backend = StubBackend::new(vec![
            vec![Detection::new("car", 0.9, BoundingBox::new(0.5, 0.5, 0.25, 0.25))],
            vec![],
        ]);

        let r1 = backend.detect(&[], 200, 100)?;
        assert_eq!(r1.len(), 1);
        assert_eq!(r1[0].bbox, BoundingBox::new(100.0, 50.0, 50.0, 25.0));

        let r2 = backend.detect(&[], 200, 100)?;
        assert!(r2.is_empty());

        let r3 = backend.detect(&[], 200, 100)?;
        assert_eq!(r3.len(), 1);
        assert_eq!(backend.calls(), 3);
        Ok(())
    }

    #[test]
    fn street_scene_contains_noise() -> Result<()> {
        let mut backend = StubBackend::street_scene();
        let detections = backend.detect(&[], 640, 480)?;
        assert!(detections.iter().any(|d| d.label == "dog"));
        assert!(detections.iter().any(|d| d.score < 0.35));
        Ok(())
    }
}
