use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hud_overlay::detect::StubBackend;
use hud_overlay::driver::DriverOptions;
use hud_overlay::ingest::{FrameSource, SourceStats, StillImageSource};
use hud_overlay::render::{NullSink, PngSequenceSink, PolarRenderer, SideBubbleRenderer};
use hud_overlay::{
    BackendRegistry, BoundingBox, Detection, DetectorBackend, DriverState, Frame, HudDriver,
    HudError,
};

/// Hands out grey frames and fails on the listed frame numbers.
struct ScriptedSource {
    fail_on: Vec<u64>,
    next: u64,
    connected: bool,
}

impl ScriptedSource {
    fn new(fail_on: Vec<u64>) -> Self {
        Self {
            fail_on,
            next: 0,
            connected: false,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let seq = self.next;
        self.next += 1;
        if self.fail_on.contains(&seq) {
            return Err(anyhow!("dropped frame {}", seq));
        }
        Frame::filled(320, 240, [90, 90, 90], seq)
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.next,
            source: self.describe(),
        }
    }
}

/// Detector whose model load fails a fixed number of times.
struct FlakyModel {
    failures_left: Arc<AtomicUsize>,
}

impl DetectorBackend for FlakyModel {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn detect(&mut self, _pixels: &[u8], width: u32, _height: u32) -> Result<Vec<Detection>> {
        Ok(vec![Detection::new(
            "bus",
            0.8,
            BoundingBox::new(width as f32 * 0.7, 10.0, 40.0, 40.0),
        )])
    }

    fn warm_up(&mut self) -> Result<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(anyhow!("model file not found"));
        }
        Ok(())
    }
}

fn options() -> DriverOptions {
    DriverOptions {
        frame_delay: Duration::ZERO,
        canvas_width: 240,
        canvas_height: 160,
        ..DriverOptions::default()
    }
}

fn script() -> Vec<Vec<Detection>> {
    vec![vec![
        Detection::new("car", 0.9, BoundingBox::new(0.1, 0.4, 0.2, 0.2)),
        Detection::new("person", 0.6, BoundingBox::new(0.75, 0.3, 0.1, 0.3)),
    ]]
}

fn stub_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new(script()));
    registry
}

#[test]
fn failed_cycles_are_counted_and_the_loop_continues() -> Result<()> {
    let mut driver = HudDriver::new(
        Box::new(ScriptedSource::new(vec![1, 2])),
        stub_registry(),
        Box::new(PolarRenderer::default()),
        Box::new(NullSink),
        options(),
    )?;
    driver.start()?;

    let stats = driver.run(Some(6));
    assert_eq!(stats.cycles_ok, 4);
    assert_eq!(stats.cycle_errors, 2);
    assert_eq!(stats.last_object_count, 2);
    assert_eq!(driver.state(), DriverState::Running);
    // The last cycle succeeded, so the error no longer shows.
    assert_eq!(driver.status(), "running (scripted, stub)");

    driver.stop();
    assert_eq!(driver.state(), DriverState::Stopped);
    Ok(())
}

#[test]
fn cycle_error_is_reported_in_the_status() -> Result<()> {
    let mut driver = HudDriver::new(
        Box::new(ScriptedSource::new(vec![0])),
        stub_registry(),
        Box::new(SideBubbleRenderer),
        Box::new(NullSink),
        options(),
    )?;
    driver.start()?;
    let stats = driver.run(Some(1));
    assert_eq!(stats.cycle_errors, 1);
    assert!(driver.status().contains("dropped frame 0"));
    Ok(())
}

#[test]
fn detector_load_failure_leaves_the_driver_stopped() -> Result<()> {
    let failures = Arc::new(AtomicUsize::new(1));
    let mut registry = BackendRegistry::new();
    registry.register(FlakyModel {
        failures_left: failures.clone(),
    });
    let mut driver = HudDriver::new(
        Box::new(ScriptedSource::new(Vec::new())),
        registry,
        Box::new(PolarRenderer::default()),
        Box::new(NullSink),
        options(),
    )?;

    match driver.start() {
        Err(HudError::DetectorLoad(message)) => assert!(message.contains("model file not found")),
        other => panic!("expected a detector load failure, got {:?}", other),
    }
    assert_eq!(driver.state(), DriverState::Stopped);
    assert_eq!(driver.stats().start_failures, 1);
    assert!(driver.status().starts_with("detector failed to load"));
    assert_eq!(driver.run(Some(3)).cycles_ok, 0);

    // Second attempt: the model loads.
    driver.start()?;
    assert_eq!(driver.state(), DriverState::Running);
    let report = driver.run_cycle()?;
    assert_eq!(report.mapped.objects.len(), 1);
    assert_eq!(report.mapped.objects[0].key, "bus-0");
    Ok(())
}

#[test]
fn missing_reference_image_is_a_camera_failure() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut driver = HudDriver::new(
        Box::new(StillImageSource::new(dir.path().join("missing.jpg"))),
        stub_registry(),
        Box::new(PolarRenderer::default()),
        Box::new(NullSink),
        options(),
    )?;

    let err = driver.start().expect_err("start should fail");
    assert_eq!(err.code(), "CAMERA_ACQUISITION");
    assert_eq!(driver.state(), DriverState::Stopped);
    assert!(driver.status().starts_with("camera unavailable"));
    Ok(())
}

#[test]
fn reference_image_frames_are_rendered_to_png() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let reference = dir.path().join("reference.png");
    image::RgbImage::from_pixel(800, 450, image::Rgb([120, 130, 140])).save(&reference)?;

    let out = dir.path().join("frames");
    let mut driver = HudDriver::new(
        Box::new(StillImageSource::new(&reference)),
        stub_registry(),
        Box::new(PolarRenderer::default()),
        Box::new(PngSequenceSink::new(&out, 2)?),
        options(),
    )?;
    driver.start()?;
    let stats = driver.run(Some(5));
    assert_eq!(stats.cycles_ok, 5);
    // cycles 0, 2 and 4
    assert_eq!(stats.frames_written, 3);
    assert!(out.join("hud_000004.png").exists());
    assert!(!out.join("hud_000001.png").exists());

    let saved = image::open(out.join("hud_000000.png"))?;
    assert_eq!((saved.width(), saved.height()), (240, 160));
    Ok(())
}

#[test]
fn setting_the_stop_flag_ends_the_loop() -> Result<()> {
    let mut driver = HudDriver::new(
        Box::new(ScriptedSource::new(Vec::new())),
        stub_registry(),
        Box::new(PolarRenderer::default()),
        Box::new(NullSink),
        options(),
    )?;
    driver.start()?;
    driver.stop_flag().store(true, Ordering::SeqCst);
    let stats = driver.run(None);
    assert_eq!(stats.cycles_ok, 0);
    assert_eq!(driver.state(), DriverState::Stopped);
    Ok(())
}

#[test]
fn stop_requested_between_start_attempts_is_honoured() -> Result<()> {
    let failures = Arc::new(AtomicUsize::new(1));
    let mut registry = BackendRegistry::new();
    registry.register(FlakyModel {
        failures_left: failures.clone(),
    });
    let mut driver = HudDriver::new(
        Box::new(ScriptedSource::new(Vec::new())),
        registry,
        Box::new(PolarRenderer::default()),
        Box::new(NullSink),
        options(),
    )?;

    assert!(matches!(driver.start(), Err(HudError::DetectorLoad(_))));
    // Ctrl-C while waiting to retry.
    driver.stop_flag().store(true, Ordering::SeqCst);

    match driver.start() {
        Err(HudError::Interrupted(_)) => {}
        other => panic!("expected the retry to be cancelled, got {:?}", other),
    }
    assert_eq!(driver.state(), DriverState::Stopped);
    assert_eq!(driver.run(Some(5)).cycles_ok, 0);
    assert_eq!(driver.status(), "stopped");
    Ok(())
}
