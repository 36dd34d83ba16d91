//! Render loop driver.
//!
//! The driver owns one source, one detector registry, the mapper state and a
//! renderer, and runs them strictly one cycle at a time. Stopping is
//! cooperative: setting the shared stop flag ends the loop before the next
//! cycle; a cycle already in progress finishes normally. `start` never clears
//! the flag, so a stop requested while the detector loads still wins.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::HudConfig;
use crate::detect::{BackendRegistry, StubBackend};
use crate::frame::DEFAULT_ANALYSIS_MAX_WIDTH;
use crate::hud::{DistanceCurve, HudMapper, MappedFrame, TrackSmoother};
use crate::ingest::{open_source, FrameSource};
use crate::render::{cosmetic_speed_kmh, Canvas, FrameSink, HudRenderer, HudScene};
use crate::render::{NullSink, PngSequenceSink, PolarRenderer, RenderMode};
use crate::sim::{SimulatedTraffic, SpeedControl};
use crate::HudError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Running,
}

/// What the speed readout shows.
#[derive(Clone, Debug, Default)]
pub enum Speedometer {
    /// 40 ± 5 km/h wobble; there is no real speed signal on a camera feed.
    #[default]
    Cosmetic,
    /// Follows the simulation speed slider.
    Simulated(SpeedControl),
}

impl Speedometer {
    fn read(&self, elapsed: Duration) -> f32 {
        match self {
            Speedometer::Cosmetic => cosmetic_speed_kmh(elapsed.as_secs_f64()),
            Speedometer::Simulated(control) => control.speed_kmh(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DriverOptions {
    pub analysis_max_width: u32,
    /// Pause after each completed cycle. Zero runs back to back.
    pub frame_delay: Duration,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub speedometer: Speedometer,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            analysis_max_width: DEFAULT_ANALYSIS_MAX_WIDTH,
            frame_delay: Duration::from_millis(70),
            canvas_width: 900,
            canvas_height: 600,
            speedometer: Speedometer::Cosmetic,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub cycles_ok: u64,
    pub cycle_errors: u64,
    pub start_failures: u64,
    pub frames_written: u64,
    /// Mapped objects in the most recent successful cycle.
    pub last_object_count: usize,
}

/// Outcome of one successful cycle.
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub cycle: u64,
    pub detections: usize,
    pub mapped: MappedFrame,
    pub written: Option<PathBuf>,
}

pub struct HudDriver {
    source: Box<dyn FrameSource>,
    registry: BackendRegistry,
    mapper: HudMapper,
    smoother: Option<TrackSmoother>,
    renderer: Box<dyn HudRenderer>,
    sink: Box<dyn FrameSink>,
    canvas: Canvas,
    options: DriverOptions,
    state: DriverState,
    stop_requested: Arc<AtomicBool>,
    status: String,
    stats: DriverStats,
    started_at: Instant,
    cycle: u64,
}

impl HudDriver {
    pub fn new(
        source: Box<dyn FrameSource>,
        registry: BackendRegistry,
        renderer: Box<dyn HudRenderer>,
        sink: Box<dyn FrameSink>,
        options: DriverOptions,
    ) -> Result<Self> {
        if options.analysis_max_width == 0 {
            return Err(anyhow!("analysis width must be > 0"));
        }
        let canvas = Canvas::new(options.canvas_width, options.canvas_height)?;
        Ok(Self {
            source,
            registry,
            mapper: HudMapper::default(),
            smoother: Some(TrackSmoother::default()),
            renderer,
            sink,
            canvas,
            options,
            state: DriverState::Stopped,
            stop_requested: Arc::new(AtomicBool::new(false)),
            status: "stopped".to_string(),
            stats: DriverStats::default(),
            started_at: Instant::now(),
            cycle: 0,
        })
    }

    pub fn with_mapper(mut self, mapper: HudMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Replace the smoother; `None` maps raw detections.
    pub fn with_smoother(mut self, smoother: Option<TrackSmoother>) -> Self {
        self.smoother = smoother;
        self
    }

    /// Shared stop flag. Setting it ends `run` before the next cycle and makes
    /// any later `start` fail with `HudError::Interrupted`.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_requested.clone()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn smoother(&self) -> Option<&TrackSmoother> {
        self.smoother.as_ref()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Load the detector, then open the source.
    ///
    /// On failure the driver stays stopped with the reason in `status()`;
    /// calling `start` again retries from the beginning. The stop flag is
    /// checked before warm-up and again after each slow step.
    pub fn start(&mut self) -> Result<(), HudError> {
        if self.state == DriverState::Running {
            return Ok(());
        }
        if self.stop_requested() {
            return Err(self.start_interrupted(false));
        }

        self.status = "loading detector".to_string();
        if let Err(err) = self.registry.warm_up_default() {
            return Err(self.start_failed(HudError::DetectorLoad(format!("{:#}", err))));
        }
        if self.stop_requested() {
            return Err(self.start_interrupted(false));
        }

        self.status = format!("opening {}", self.source.describe());
        if let Err(err) = self.source.connect() {
            return Err(self.start_failed(HudError::CameraAcquisition(format!("{:#}", err))));
        }
        if self.stop_requested() {
            return Err(self.start_interrupted(true));
        }

        self.state = DriverState::Running;
        self.started_at = Instant::now();
        self.status = self.running_status();
        log::info!("HUD driver started: {}", self.status);
        Ok(())
    }

    fn running_status(&self) -> String {
        format!(
            "running ({}, {})",
            self.source.describe(),
            self.registry.default_name().unwrap_or("no detector")
        )
    }

    fn start_interrupted(&mut self, connected: bool) -> HudError {
        if connected {
            self.source.disconnect();
        }
        self.status = "stopped".to_string();
        log::info!("HUD driver start cancelled: stop requested");
        HudError::Interrupted("stop requested before the driver was running".to_string())
    }

    fn start_failed(&mut self, err: HudError) -> HudError {
        self.stats.start_failures += 1;
        self.status = match &err {
            HudError::DetectorLoad(msg) => format!("detector failed to load: {}", msg),
            HudError::CameraAcquisition(msg) => format!("camera unavailable: {}", msg),
            HudError::Cycle(msg) => format!("cycle error: {}", msg),
            HudError::Interrupted(msg) => format!("stopped: {}", msg),
        };
        log::warn!("HUD driver failed to start: {}", err);
        err
    }

    /// One frame through the whole pipeline.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        if self.state != DriverState::Running {
            return Err(anyhow!("driver is not running"));
        }
        let cycle = self.cycle;
        self.cycle += 1;

        let frame = self.source.next_frame()?;
        let analysis = frame.analysis_copy(self.options.analysis_max_width)?;
        let detections = analysis.run_detector(&self.registry)?;
        let mapped = self
            .mapper
            .map_frame(&detections, analysis.context(), self.smoother.as_mut())?;

        let scene = HudScene {
            frame: &mapped,
            speed_kmh: self.options.speedometer.read(self.started_at.elapsed()),
            status: &self.status,
        };
        self.renderer.render(&scene, &mut self.canvas)?;
        let written = self.sink.submit(cycle, &self.canvas)?;

        self.stats.cycles_ok += 1;
        self.stats.frames_written = self.sink.frames_written();
        self.stats.last_object_count = mapped.objects.len();
        log::debug!(
            "cycle {}: {} detections, {} mapped (left {}, right {})",
            cycle,
            detections.len(),
            mapped.objects.len(),
            mapped.sides.left.len(),
            mapped.sides.right.len()
        );

        Ok(CycleReport {
            cycle,
            detections: detections.len(),
            mapped,
            written,
        })
    }

    /// Run cycles until stopped or `max_cycles` attempts have been made.
    ///
    /// Cycle errors are counted and shown in the status line; they never end
    /// the loop.
    pub fn run(&mut self, max_cycles: Option<u64>) -> DriverStats {
        let mut attempts = 0u64;
        while self.state == DriverState::Running && !self.stop_requested() {
            if max_cycles.is_some_and(|max| attempts >= max) {
                break;
            }
            attempts += 1;

            match self.run_cycle() {
                Ok(report) => {
                    if self.status.starts_with("cycle error") {
                        self.status = self.running_status();
                    }
                    if let Some(path) = report.written {
                        log::debug!("frame {} saved to {}", report.cycle, path.display());
                    }
                }
                Err(err) => {
                    let err = HudError::Cycle(format!("{:#}", err));
                    self.stats.cycle_errors += 1;
                    self.status = format!("cycle error: {}", err.message());
                    log::warn!("{}", err);
                }
            }

            let finished = max_cycles.is_some_and(|max| attempts >= max);
            if !finished && !self.options.frame_delay.is_zero() {
                std::thread::sleep(self.options.frame_delay);
            }
        }

        if self.state == DriverState::Running && self.stop_requested() {
            self.stop();
        }
        self.stats.clone()
    }

    /// Release the source. The stop flag is left as it is, so an explicit
    /// `stop` can be followed by another `start`.
    pub fn stop(&mut self) {
        if self.state == DriverState::Running {
            self.source.disconnect();
            log::info!(
                "HUD driver stopped after {} cycles ({} errors)",
                self.stats.cycles_ok,
                self.stats.cycle_errors
            );
        }
        self.state = DriverState::Stopped;
        self.status = "stopped".to_string();
    }
}

// ----------------------------------------------------------------------------
// Assembly from configuration
// ----------------------------------------------------------------------------

/// Registry with every backend this build can offer, default set from the
/// config. Also returns the simulation's speed slider.
pub fn build_registry(cfg: &HudConfig) -> Result<(BackendRegistry, SpeedControl)> {
    let speed = SpeedControl::new(cfg.sim.speed)?;
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::street_scene());
    registry.register(SimulatedTraffic::new(
        cfg.sim.seed,
        cfg.sim.objects,
        speed.clone(),
    ));
    register_tract(&mut registry, cfg)?;
    registry.set_default(&cfg.detector.backend).map_err(|err| {
        anyhow!(
            "{}; available detectors: {}",
            err,
            registry.list().join(", ")
        )
    })?;
    Ok((registry, speed))
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut BackendRegistry, cfg: &HudConfig) -> Result<()> {
    use crate::detect::TractBackend;

    if let (Some(model), Some(labels)) = (&cfg.detector.model_path, &cfg.detector.labels_path) {
        registry.register(TractBackend::new(model, labels, cfg.detector.input_size));
    } else if cfg.detector.backend == "tract" {
        return Err(anyhow!(
            "detector 'tract' needs detector.model_path and detector.labels_path"
        ));
    }
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut BackendRegistry, cfg: &HudConfig) -> Result<()> {
    if cfg.detector.backend == "tract" {
        return Err(anyhow!("detector 'tract' requires the backend-tract feature"));
    }
    Ok(())
}

/// Driver wired up from `cfg`: source, detector, mapper, smoother, renderer
/// and sink.
pub fn driver_from_config(cfg: &HudConfig) -> Result<HudDriver> {
    cfg.validate()?;
    let (registry, speed) = build_registry(cfg)?;
    let source = open_source(&cfg.source.url, cfg.source_settings())?;
    let sink: Box<dyn FrameSink> = match &cfg.render.output_dir {
        Some(dir) => Box::new(PngSequenceSink::new(dir, cfg.render.save_every)?),
        None => Box::new(NullSink),
    };
    let speedometer = if cfg.detector.backend == "sim" {
        Speedometer::Simulated(speed)
    } else {
        Speedometer::Cosmetic
    };
    let mapper = HudMapper::new(cfg.filter_policy()?, cfg.mapping.distance_curve);
    let renderer = renderer_for(cfg.render.mode, cfg.mapping.distance_curve);

    let driver = HudDriver::new(
        source,
        registry,
        renderer,
        sink,
        DriverOptions {
            analysis_max_width: cfg.source.analysis_max_width,
            frame_delay: cfg.pacing.frame_delay,
            canvas_width: cfg.render.width,
            canvas_height: cfg.render.height,
            speedometer,
        },
    )?
    .with_mapper(mapper)
    .with_smoother(cfg.smoother()?);
    Ok(driver)
}

fn renderer_for(mode: RenderMode, curve: DistanceCurve) -> Box<dyn HudRenderer> {
    match mode {
        RenderMode::Polar => Box::new(PolarRenderer {
            r_floor: curve.floor(),
            ..PolarRenderer::default()
        }),
        other => other.renderer(),
    }
}
