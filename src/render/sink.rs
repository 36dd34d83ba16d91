use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::Canvas;

/// Where finished HUD frames go.
pub trait FrameSink: Send {
    /// Offer the frame rendered in `cycle`. Returns the file written, if any.
    fn submit(&mut self, cycle: u64, canvas: &Canvas) -> Result<Option<PathBuf>>;

    fn frames_written(&self) -> u64;
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn submit(&mut self, _cycle: u64, _canvas: &Canvas) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    fn frames_written(&self) -> u64 {
        0
    }
}

/// Writes every `every`-th cycle to `dir/hud_NNNNNN.png`.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    every: u64,
    written: u64,
}

impl PngSequenceSink {
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Result<Self> {
        if every == 0 {
            return Err(anyhow!("save interval must be at least 1"));
        }
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            every,
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, cycle: u64) -> PathBuf {
        self.dir.join(format!("hud_{:06}.png", cycle))
    }
}

impl FrameSink for PngSequenceSink {
    fn submit(&mut self, cycle: u64, canvas: &Canvas) -> Result<Option<PathBuf>> {
        if cycle % self.every != 0 {
            return Ok(None);
        }
        let path = self.path_for(cycle);
        canvas.save_png(&path)?;
        self.written += 1;
        log::debug!("wrote {}", path.display());
        Ok(Some(path))
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BACKGROUND;

    #[test]
    fn writes_every_nth_cycle() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sink = PngSequenceSink::new(dir.path().join("frames"), 3)?;
        let mut canvas = Canvas::new(8, 8)?;
        canvas.clear(BACKGROUND);

        let written: Vec<Option<PathBuf>> = (0..7)
            .map(|cycle| sink.submit(cycle, &canvas))
            .collect::<Result<_>>()?;
        let cycles: Vec<usize> = written
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|_| i))
            .collect();
        assert_eq!(cycles, vec![0, 3, 6]);
        assert_eq!(sink.frames_written(), 3);
        assert!(dir.path().join("frames/hud_000003.png").exists());
        Ok(())
    }

    #[test]
    fn zero_interval_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(PngSequenceSink::new(dir.path(), 0).is_err());
        Ok(())
    }
}
