//! Frame sources.
//!
//! This module provides the sources the HUD can run on:
//! - Synthetic frames (`stub://...`) for simulation and tests
//! - A still reference image replayed every cycle ("test mode")
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//!
//! All sources produce RGB24 `Frame`s. A source that cannot be opened fails
//! `connect()`; the driver reports that as a camera-acquisition failure and
//! stays stopped.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod still;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::frame::Frame;

pub use still::StillImageSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Something that hands out frames on demand.
pub trait FrameSource: Send {
    /// Human-readable source description for status text and logs.
    fn describe(&self) -> String;

    /// Open the underlying device or file.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the device. Sources may be connected again afterwards.
    fn disconnect(&mut self) {}

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Requested capture geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceSettings {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            target_fps: 15,
        }
    }
}

/// Open a source by URL.
///
/// - `stub://<name>`: synthetic frames
/// - `image:<path>` or a path ending in .jpg/.jpeg/.png: still image
/// - `v4l2://<device>` or `/dev/video*`: camera (feature: ingest-v4l2)
pub fn open_source(url: &str, settings: SourceSettings) -> Result<Box<dyn FrameSource>> {
    let url = url.trim();
    if url.is_empty() {
        return Err(anyhow!("source url must not be empty"));
    }
    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(url, settings)));
    }
    if let Some(path) = url.strip_prefix("image:") {
        return Ok(Box::new(StillImageSource::new(path)));
    }
    if is_image_path(url) {
        return Ok(Box::new(StillImageSource::new(url)));
    }
    if let Some(device) = camera_device(url) {
        return open_camera(device, settings);
    }
    Err(anyhow!(
        "unsupported source '{}'; expected stub://, image:<path>, or a v4l2 device",
        url
    ))
}

fn is_image_path(url: &str) -> bool {
    if url.contains("://") {
        return false;
    }
    Path::new(url)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

fn camera_device(url: &str) -> Option<&str> {
    if let Some(device) = url.strip_prefix("v4l2://") {
        return Some(device);
    }
    if url.starts_with("/dev/video") {
        return Some(url);
    }
    None
}

#[cfg(feature = "ingest-v4l2")]
fn open_camera(device: &str, settings: SourceSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::new(V4l2Config {
        device: device.to_string(),
        target_fps: settings.target_fps,
        width: settings.width,
        height: settings.height,
    })?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_camera(device: &str, _settings: SourceSettings) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "camera {} requires the ingest-v4l2 feature",
        device
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_urls_open_synthetic_sources() -> Result<()> {
        let mut source = open_source("stub://road", SourceSettings::default())?;
        source.connect()?;
        let frame = source.next_frame()?;
        assert_eq!(frame.width, 1280);
        assert_eq!(frame.height, 720);
        Ok(())
    }

    #[test]
    fn image_paths_open_still_sources() -> Result<()> {
        let source = open_source("image:/tmp/ref.bin", SourceSettings::default())?;
        assert!(source.describe().contains("/tmp/ref.bin"));
        let source = open_source("reference.JPG", SourceSettings::default())?;
        assert!(source.describe().contains("reference.JPG"));
        Ok(())
    }

    #[test]
    fn remote_and_unknown_urls_are_rejected() {
        assert!(open_source("rtsp://camera/stream", SourceSettings::default()).is_err());
        assert!(open_source("", SourceSettings::default()).is_err());
    }
}
