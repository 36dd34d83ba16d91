use anyhow::{anyhow, Result};

use crate::detect::{Detection, ObjectClass};

/// Default detector confidence cut.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;

/// Which detector outputs reach the mapper.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterPolicy {
    classes: Vec<ObjectClass>,
    confidence_threshold: f32,
}

impl FilterPolicy {
    pub fn new(classes: Vec<ObjectClass>, confidence_threshold: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold must be within 0..=1, got {}",
                confidence_threshold
            ));
        }
        if classes.is_empty() {
            return Err(anyhow!("filter policy must allow at least one class"));
        }
        Ok(Self {
            classes,
            confidence_threshold,
        })
    }

    pub fn with_threshold(confidence_threshold: f32) -> Result<Self> {
        Self::new(ObjectClass::ALL.to_vec(), confidence_threshold)
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn classes(&self) -> &[ObjectClass] {
        &self.classes
    }

    /// Returns the resolved class when the detection passes the policy. The
    /// score must be strictly above the threshold.
    pub fn admit(&self, detection: &Detection) -> Option<ObjectClass> {
        if !detection.score.is_finite() || detection.score <= self.confidence_threshold {
            return None;
        }
        if !detection.bbox.is_finite() {
            return None;
        }
        detection
            .object_class()
            .filter(|class| self.classes.contains(class))
    }

    /// Admitted detections in detector output order.
    pub fn apply<'a>(&self, detections: &'a [Detection]) -> Vec<(ObjectClass, &'a Detection)> {
        detections
            .iter()
            .filter_map(|det| self.admit(det).map(|class| (class, det)))
            .collect()
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            classes: ObjectClass::ALL.to_vec(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}
