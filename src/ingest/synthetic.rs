//! Synthetic frame source (`stub://`).
//!
//! Produces flat road-gray frames with a faint horizon band. Used by the
//! simulation mode, where the detector ignores pixels, and by tests.

use anyhow::Result;

use super::{FrameSource, SourceSettings, SourceStats};
use crate::frame::Frame;

const SKY: [u8; 3] = [186, 196, 210];
const ROAD: [u8; 3] = [92, 96, 104];

pub struct SyntheticSource {
    url: String,
    settings: SourceSettings,
    frame_count: u64,
    connected: bool,
    template: Option<Vec<u8>>,
}

impl SyntheticSource {
    pub fn new(url: &str, settings: SourceSettings) -> Self {
        Self {
            url: url.to_string(),
            settings,
            frame_count: 0,
            connected: false,
            template: None,
        }
    }

    fn render_template(&self) -> Vec<u8> {
        let width = self.settings.width as usize;
        let height = self.settings.height as usize;
        let horizon = height * 2 / 5;
        let mut pixels = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            let color = if y < horizon { SKY } else { ROAD };
            for _ in 0..width {
                pixels.extend_from_slice(&color);
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.url)
    }

    fn connect(&mut self) -> Result<()> {
        if self.template.is_none() {
            self.template = Some(self.render_template());
        }
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.url,
            self.settings.width,
            self.settings.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let template = match (&self.template, self.connected) {
            (Some(template), true) => template.clone(),
            _ => anyhow::bail!("synthetic source {} not connected", self.url),
        };
        self.frame_count += 1;
        Frame::new(
            template,
            self.settings.width,
            self.settings.height,
            self.frame_count,
        )
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SourceSettings {
        SourceSettings {
            width: 64,
            height: 40,
            target_fps: 15,
        }
    }

    #[test]
    fn synthetic_source_produces_sequenced_frames() -> Result<()> {
        let mut source = SyntheticSource::new("stub://test", settings());
        source.connect()?;

        let f1 = source.next_frame()?;
        let f2 = source.next_frame()?;
        assert_eq!((f1.width, f1.height), (64, 40));
        assert_eq!(f1.sequence + 1, f2.sequence);
        assert_eq!(&f1.pixels()[..3], &SKY);
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn frames_require_connection() {
        let mut source = SyntheticSource::new("stub://test", settings());
        assert!(source.next_frame().is_err());
        assert!(!source.is_healthy());
    }
}
