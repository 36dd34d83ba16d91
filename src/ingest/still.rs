//! Still reference image source ("test mode").
//!
//! The image is decoded once on `connect()` and handed out again on every
//! `next_frame()`, so the whole pipeline can be exercised without a camera.
//! A missing or undecodable file fails `connect()`.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

pub struct StillImageSource {
    path: PathBuf,
    image: Option<image::RgbImage>,
    frame_count: u64,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image: None,
            frame_count: 0,
        }
    }

    /// Dimensions of the decoded image, once connected.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|image| image.dimensions())
    }
}

impl FrameSource for StillImageSource {
    fn describe(&self) -> String {
        format!("{} (still image)", self.path.display())
    }

    fn connect(&mut self) -> Result<()> {
        let decoded = image::open(&self.path)
            .with_context(|| format!("decode reference image {}", self.path.display()))?
            .to_rgb8();
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(anyhow!("reference image {} is empty", self.path.display()));
        }
        log::info!(
            "StillImageSource: loaded {} ({}x{})",
            self.path.display(),
            decoded.width(),
            decoded.height()
        );
        self.image = Some(decoded);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| anyhow!("reference image {} not loaded", self.path.display()))?;
        self.frame_count += 1;
        Frame::from_image(image.clone(), self.frame_count)
    }

    fn disconnect(&mut self) {
        self.image = None;
    }

    fn is_healthy(&self) -> bool {
        self.image.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn replays_the_same_image_every_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reference.png");
        image::RgbImage::from_pixel(8, 6, image::Rgb([10, 20, 30])).save(&path)?;

        let mut source = StillImageSource::new(&path);
        source.connect()?;
        assert_eq!(source.dimensions(), Some((8, 6)));

        let f1 = source.next_frame()?;
        let f2 = source.next_frame()?;
        assert_eq!(f1.pixels(), f2.pixels());
        assert_eq!(&f1.pixels()[..3], &[10, 20, 30]);
        assert_eq!(f2.sequence, 2);
        Ok(())
    }

    #[test]
    fn missing_file_fails_connect() {
        let mut source = StillImageSource::new("/nonexistent/reference.jpg");
        assert!(source.connect().is_err());
        assert!(!source.is_healthy());
    }

    #[test]
    fn garbage_file_fails_connect() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile()?;
        file.write_all(b"not an image")?;
        let mut source = StillImageSource::new(file.path());
        assert!(source.connect().is_err());
        Ok(())
    }
}
