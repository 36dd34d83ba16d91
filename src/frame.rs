//! Frames and frame context.
//!
//! - `Frame`: one RGB24 image handed from a source to the detector.
//! - `FrameContext`: the width/height a detection was computed against.
//!
//! Sources produce full-size frames. Before detection the driver takes an
//! analysis copy no wider than the configured maximum; the context of that copy
//! is what normalizes bounding boxes, so box pixels and frame size always agree.

use anyhow::{anyhow, Result};
use image::{imageops::FilterType, RgbImage};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::detect::{BackendRegistry, Detection};

/// Default analysis width; larger frames are downscaled before detection.
pub const DEFAULT_ANALYSIS_MAX_WIDTH: u32 = 640;

// ----------------------------------------------------------------------------
// FrameContext
// ----------------------------------------------------------------------------

/// Dimensions of the image a detection was computed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameContext {
    pub width: u32,
    pub height: u32,
}

impl FrameContext {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame context must be non-empty, got {}x{}", width, height));
        }
        Ok(Self { width, height })
    }

    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One RGB24 frame.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture sequence number assigned by the source.
    pub sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if width == 0 || height == 0 {
            return Err(anyhow!("frame must be non-empty, got {}x{}", width, height));
        }
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        })
    }

    /// Solid-color frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], sequence: u64) -> Result<Self> {
        let pixel_count = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixel_count * 3);
        for _ in 0..pixel_count {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height, sequence)
    }

    pub fn from_image(image: RgbImage, sequence: u64) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, sequence)
    }

    pub fn context(&self) -> FrameContext {
        FrameContext {
            width: self.width,
            height: self.height,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// Copy of this frame no wider than `max_width`, aspect preserved.
    ///
    /// Frames already within bounds are copied unchanged.
    pub fn analysis_copy(&self, max_width: u32) -> Result<Frame> {
        if max_width == 0 {
            return Err(anyhow!("analysis width must be > 0"));
        }
        if self.width <= max_width {
            return Frame::new(self.data.clone(), self.width, self.height, self.sequence);
        }
        let scale = max_width as f32 / self.width as f32;
        let target_w = max_width;
        let target_h = ((self.height as f32 * scale).floor() as u32).max(1);
        let image = RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))?;
        let resized = image::imageops::resize(&image, target_w, target_h, FilterType::Triangle);
        Frame::from_image(resized, self.sequence)
    }

    /// Run the registry's default detector on this frame.
    pub fn run_detector(&self, registry: &BackendRegistry) -> Result<Vec<Detection>> {
        registry.detect(&self.data, self.width, self.height)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
