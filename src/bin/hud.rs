//! hud - proximity HUD render loop
//!
//! Reads frames from a camera, a still reference image, or the traffic
//! simulation; maps detections around a top-down car; writes the rendered
//! HUD frames as PNGs. Stop with Ctrl-C.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use hud_overlay::config::HudConfig;
use hud_overlay::driver::driver_from_config;
use hud_overlay::hud::DistanceCurve;
use hud_overlay::render::RenderMode;
use hud_overlay::ui::Ui;
use hud_overlay::HudError;

#[derive(Parser, Debug)]
#[command(name = "hud", version, about = "Proximity HUD render loop")]
struct Args {
    /// Frame source: stub://name, image:<path>, v4l2:///dev/videoN or /dev/videoN
    #[arg(long, env = "HUD_SOURCE_URL")]
    source: Option<String>,

    /// Run on a still reference image instead of the camera
    #[arg(long, requires = "reference")]
    test_mode: bool,

    /// Reference image used by --test-mode
    #[arg(long, value_name = "PATH")]
    reference: Option<PathBuf>,

    /// Presentation mode (side|polar|billboard)
    #[arg(long, value_name = "MODE")]
    mode: Option<String>,

    /// Drive the HUD from simulated traffic instead of a detector
    #[arg(long, conflicts_with = "test_mode")]
    simulate: bool,

    /// Simulation speed factor (0..5)
    #[arg(long, value_name = "FACTOR")]
    speed: Option<f32>,

    /// Detector backend name (stub|sim|tract)
    #[arg(long, value_name = "NAME")]
    detector: Option<String>,

    /// Minimum detector confidence (0..1)
    #[arg(long, value_name = "SCORE")]
    confidence: Option<f32>,

    /// Distance curve (clamp|affine)
    #[arg(long, value_name = "CURVE")]
    distance_curve: Option<String>,

    /// Map raw detections without temporal smoothing
    #[arg(long)]
    no_smoothing: bool,

    /// Stop after this many cycles (default: run until Ctrl-C)
    #[arg(long, value_name = "N")]
    frames: Option<u64>,

    /// Directory for rendered PNG frames (default: discard)
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Save every Nth frame
    #[arg(long, value_name = "N")]
    save_every: Option<u64>,

    /// Pause between cycles in milliseconds
    #[arg(long, value_name = "MS")]
    frame_delay_ms: Option<u64>,

    /// Extra start attempts when the detector or camera is unavailable
    #[arg(long, default_value_t = 0, value_name = "N")]
    retries: u32,

    /// Delay between start attempts in milliseconds
    #[arg(long, default_value_t = 2000, value_name = "MS")]
    retry_delay_ms: u64,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let ui = Ui::from_args(Some(args.ui.as_str()), is_tty, false);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = HudConfig::load()?;
        apply_args(&mut cfg, &args)?;
        cfg.validate()?;
        cfg
    };
    log::info!(
        "source={} detector={} mode={} threshold={} curve={:?} smoothing={}",
        cfg.source.url,
        cfg.detector.backend,
        cfg.render.mode.as_str(),
        cfg.filter.confidence_threshold,
        cfg.mapping.distance_curve,
        cfg.smoothing.enabled
    );

    let mut driver = driver_from_config(&cfg)?;

    let stop = driver.stop_flag();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut attempt = 0u32;
    loop {
        let mut stage = ui.stage("Start detector + source");
        match driver.start() {
            Ok(()) => break,
            Err(HudError::Interrupted(_)) => {
                stage.fail();
                drop(stage);
                eprintln!("hud: stopped before the render loop started");
                return Ok(());
            }
            Err(err) => {
                stage.fail();
                drop(stage);
                eprintln!("hud: {}", driver.status());
                if attempt >= args.retries || !retryable(&err) {
                    return Err(err.into());
                }
                attempt += 1;
                log::info!("retrying start ({}/{})", attempt, args.retries);
                if !sleep_unless_stopped(&stop, Duration::from_millis(args.retry_delay_ms)) {
                    eprintln!("hud: stopped while waiting to retry");
                    return Ok(());
                }
            }
        }
    }

    let status = ui.status_line();
    status.update(driver.status());
    let stats = match args.frames {
        Some(frames) => driver.run(Some(frames)),
        None => {
            // Run in slices so the status line stays current.
            loop {
                let stats = driver.run(Some(15));
                status.update(&format!(
                    "{} | {} cycles, {} errors, {} objects",
                    driver.status(),
                    stats.cycles_ok,
                    stats.cycle_errors,
                    stats.last_object_count
                ));
                if driver.state() != hud_overlay::DriverState::Running {
                    break stats;
                }
            }
        }
    };
    driver.stop();
    status.finish(&format!(
        "hud: {} cycles, {} cycle errors, {} frames written",
        stats.cycles_ok, stats.cycle_errors, stats.frames_written
    ));

    Ok(())
}

fn apply_args(cfg: &mut HudConfig, args: &Args) -> Result<()> {
    if let Some(source) = &args.source {
        cfg.source.url = source.clone();
    }
    if args.test_mode {
        let reference = args
            .reference
            .as_ref()
            .ok_or_else(|| anyhow!("--test-mode needs --reference <image>"))?;
        cfg.source.url = format!("image:{}", reference.display());
    }
    if args.simulate {
        cfg.source.url = "stub://simulation".to_string();
        cfg.detector.backend = "sim".to_string();
    }
    if let Some(detector) = &args.detector {
        cfg.detector.backend = detector.clone();
    }
    if let Some(speed) = args.speed {
        cfg.sim.speed = speed;
    }
    if let Some(mode) = &args.mode {
        cfg.render.mode = RenderMode::parse(mode)?;
    }
    if let Some(confidence) = args.confidence {
        cfg.filter.confidence_threshold = confidence;
    }
    if let Some(curve) = &args.distance_curve {
        cfg.mapping.distance_curve = DistanceCurve::parse(curve)?;
    }
    if args.no_smoothing {
        cfg.smoothing.enabled = false;
    }
    if let Some(out) = &args.out {
        cfg.render.output_dir = Some(out.clone());
    }
    if let Some(every) = args.save_every {
        cfg.render.save_every = every;
    }
    if let Some(delay) = args.frame_delay_ms {
        cfg.pacing.frame_delay = Duration::from_millis(delay);
    }
    Ok(())
}

/// Sleep for `delay` in short slices. Returns false as soon as a stop is
/// requested.
fn sleep_unless_stopped(stop: &AtomicBool, delay: Duration) -> bool {
    let slice = Duration::from_millis(50);
    let deadline = Instant::now() + delay;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(slice.min(deadline - now));
    }
}

fn retryable(err: &HudError) -> bool {
    matches!(err, HudError::DetectorLoad(_) | HudError::CameraAcquisition(_))
}
