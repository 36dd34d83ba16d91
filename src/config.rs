use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::ObjectClass;
use crate::frame::DEFAULT_ANALYSIS_MAX_WIDTH;
use crate::hud::smoothing::{DEFAULT_ALPHA, DEFAULT_MAX_IDLE_CYCLES};
use crate::hud::{DistanceCurve, FilterPolicy, TrackSmoother, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::ingest::SourceSettings;
use crate::render::RenderMode;
use crate::sim::MAX_SPEED_FACTOR;

const DEFAULT_SOURCE_URL: &str = "stub://front_camera";
const DEFAULT_SOURCE_FPS: u32 = 15;
const DEFAULT_SOURCE_WIDTH: u32 = 1280;
const DEFAULT_SOURCE_HEIGHT: u32 = 720;
const DEFAULT_DETECTOR: &str = "stub";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_CANVAS_WIDTH: u32 = 900;
const DEFAULT_CANVAS_HEIGHT: u32 = 600;
const DEFAULT_SAVE_EVERY: u64 = 1;
const DEFAULT_FRAME_DELAY_MS: u64 = 70;
const DEFAULT_SIM_SEED: u64 = 7;
const DEFAULT_SIM_OBJECTS: usize = 6;
const MIN_ANALYSIS_WIDTH: u32 = 32;

#[derive(Debug, Deserialize, Default)]
struct HudConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    filter: Option<FilterConfigFile>,
    mapping: Option<MappingConfigFile>,
    smoothing: Option<SmoothingConfigFile>,
    render: Option<RenderConfigFile>,
    pacing: Option<PacingConfigFile>,
    sim: Option<SimConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    analysis_max_width: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct FilterConfigFile {
    confidence_threshold: Option<f32>,
    classes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct MappingConfigFile {
    distance_curve: Option<DistanceCurve>,
}

#[derive(Debug, Deserialize, Default)]
struct SmoothingConfigFile {
    enabled: Option<bool>,
    alpha: Option<f32>,
    /// 0 keeps idle tracks forever.
    max_idle_cycles: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    mode: Option<RenderMode>,
    width: Option<u32>,
    height: Option<u32>,
    output_dir: Option<PathBuf>,
    save_every: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PacingConfigFile {
    frame_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SimConfigFile {
    speed: Option<f32>,
    seed: Option<u64>,
    objects: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct HudConfig {
    pub source: SourceConfig,
    pub detector: DetectorConfig,
    pub filter: FilterConfig,
    pub mapping: MappingConfig,
    pub smoothing: SmoothingConfig,
    pub render: RenderConfig,
    pub pacing: PacingConfig,
    pub sim: SimConfig,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    pub analysis_max_width: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Registered backend name: "stub", "sim" or "tract".
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub confidence_threshold: f32,
    pub classes: Vec<ObjectClass>,
}

#[derive(Debug, Clone)]
pub struct MappingConfig {
    pub distance_curve: DistanceCurve,
}

#[derive(Debug, Clone)]
pub struct SmoothingConfig {
    pub enabled: bool,
    pub alpha: f32,
    pub max_idle_cycles: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub mode: RenderMode,
    pub width: u32,
    pub height: u32,
    /// PNG output directory; `None` discards frames.
    pub output_dir: Option<PathBuf>,
    pub save_every: u64,
}

#[derive(Debug, Clone)]
pub struct PacingConfig {
    pub frame_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub speed: f32,
    pub seed: u64,
    pub objects: usize,
}

impl HudConfig {
    /// Defaults, then the file named by `HUD_CONFIG`, then `HUD_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HUD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in defaults, ignoring the environment.
    pub fn defaults() -> Result<Self> {
        Self::from_file(HudConfigFile::default())
    }

    fn from_file(file: HudConfigFile) -> Result<Self> {
        let source = file.source.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let filter = file.filter.unwrap_or_default();
        let smoothing = file.smoothing.unwrap_or_default();
        let render = file.render.unwrap_or_default();
        let sim = file.sim.unwrap_or_default();

        let classes = match filter.classes {
            Some(names) => parse_classes(&names)?,
            None => ObjectClass::ALL.to_vec(),
        };
        let max_idle_cycles = match smoothing.max_idle_cycles {
            Some(0) => None,
            Some(cycles) => Some(cycles),
            None => Some(DEFAULT_MAX_IDLE_CYCLES),
        };

        Ok(Self {
            source: SourceConfig {
                url: source
                    .url
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
                analysis_max_width: source
                    .analysis_max_width
                    .unwrap_or(DEFAULT_ANALYSIS_MAX_WIDTH),
            },
            detector: DetectorConfig {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
                model_path: detector.model_path,
                labels_path: detector.labels_path,
                input_size: detector.input_size.unwrap_or(DEFAULT_MODEL_INPUT),
            },
            filter: FilterConfig {
                confidence_threshold: filter
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                classes,
            },
            mapping: MappingConfig {
                distance_curve: file
                    .mapping
                    .and_then(|mapping| mapping.distance_curve)
                    .unwrap_or_default(),
            },
            smoothing: SmoothingConfig {
                enabled: smoothing.enabled.unwrap_or(true),
                alpha: smoothing.alpha.unwrap_or(DEFAULT_ALPHA),
                max_idle_cycles,
            },
            render: RenderConfig {
                mode: render.mode.unwrap_or_default(),
                width: render.width.unwrap_or(DEFAULT_CANVAS_WIDTH),
                height: render.height.unwrap_or(DEFAULT_CANVAS_HEIGHT),
                output_dir: render.output_dir,
                save_every: render.save_every.unwrap_or(DEFAULT_SAVE_EVERY),
            },
            pacing: PacingConfig {
                frame_delay: Duration::from_millis(
                    file.pacing
                        .and_then(|pacing| pacing.frame_delay_ms)
                        .unwrap_or(DEFAULT_FRAME_DELAY_MS),
                ),
            },
            sim: SimConfig {
                speed: sim.speed.unwrap_or(1.0),
                seed: sim.seed.unwrap_or(DEFAULT_SIM_SEED),
                objects: sim.objects.unwrap_or(DEFAULT_SIM_OBJECTS),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("HUD_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(backend) = std::env::var("HUD_DETECTOR") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(confidence) = std::env::var("HUD_CONFIDENCE") {
            self.filter.confidence_threshold = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("HUD_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Ok(mode) = std::env::var("HUD_RENDER_MODE") {
            if !mode.trim().is_empty() {
                self.render.mode = RenderMode::parse(&mode)?;
            }
        }
        if let Ok(dir) = std::env::var("HUD_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.render.output_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(delay) = std::env::var("HUD_FRAME_DELAY_MS") {
            let millis: u64 = delay.trim().parse().map_err(|_| {
                anyhow!("HUD_FRAME_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.pacing.frame_delay = Duration::from_millis(millis);
        }
        if let Ok(speed) = std::env::var("HUD_SIM_SPEED") {
            self.sim.speed = speed
                .trim()
                .parse()
                .map_err(|_| anyhow!("HUD_SIM_SPEED must be a number between 0 and 5"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.filter.confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold must be within [0, 1], got {}",
                self.filter.confidence_threshold
            ));
        }
        if self.filter.classes.is_empty() {
            return Err(anyhow!("filter.classes must not be empty"));
        }
        if !(self.smoothing.alpha > 0.0 && self.smoothing.alpha <= 1.0) {
            return Err(anyhow!(
                "smoothing alpha must be within (0, 1], got {}",
                self.smoothing.alpha
            ));
        }
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source frame size must be greater than zero"));
        }
        if self.source.analysis_max_width < MIN_ANALYSIS_WIDTH {
            return Err(anyhow!(
                "analysis_max_width must be at least {}, got {}",
                MIN_ANALYSIS_WIDTH,
                self.source.analysis_max_width
            ));
        }
        if self.render.width == 0 || self.render.height == 0 {
            return Err(anyhow!("render canvas size must be greater than zero"));
        }
        if self.render.save_every == 0 {
            return Err(anyhow!("render.save_every must be at least 1"));
        }
        if !(0.0..=MAX_SPEED_FACTOR).contains(&self.sim.speed) {
            return Err(anyhow!(
                "simulation speed must be within [0, {}], got {}",
                MAX_SPEED_FACTOR,
                self.sim.speed
            ));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        Ok(())
    }

    pub fn filter_policy(&self) -> Result<FilterPolicy> {
        FilterPolicy::new(self.filter.classes.clone(), self.filter.confidence_threshold)
    }

    /// The smoother the driver should own, if smoothing is on.
    pub fn smoother(&self) -> Result<Option<TrackSmoother>> {
        if !self.smoothing.enabled {
            return Ok(None);
        }
        TrackSmoother::new(self.smoothing.alpha, self.smoothing.max_idle_cycles).map(Some)
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            width: self.source.width,
            height: self.source.height,
            target_fps: self.source.target_fps,
        }
    }
}

fn read_config_file(path: &Path) -> Result<HudConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_classes(names: &[String]) -> Result<Vec<ObjectClass>> {
    let mut classes = Vec::new();
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let class = ObjectClass::from_label(name)
            .ok_or_else(|| anyhow!("unknown object class '{}' in filter.classes", name))?;
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    Ok(classes)
}
