//! demo - fixed-length simulation run for the proximity HUD

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use hud_overlay::config::HudConfig;
use hud_overlay::driver::driver_from_config;
use hud_overlay::render::RenderMode;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Simulated seconds per presentation mode.
    #[arg(long, default_value_t = 4)]
    seconds: u64,
    /// Frames per simulated second.
    #[arg(long, default_value_t = 15)]
    fps: u32,
    /// Simulation speed factor (0..5).
    #[arg(long, default_value_t = 1.0)]
    speed: f32,
    /// Output directory for rendered frames.
    #[arg(long, default_value = "demo_out")]
    out: String,
    /// Save every Nth frame.
    #[arg(long, default_value_t = 5)]
    save_every: u64,
    /// Deterministic traffic seed.
    #[arg(long)]
    seed: Option<u64>,
}

struct ModeSummary {
    mode: RenderMode,
    cycles: u64,
    errors: u64,
    frames_written: u64,
    last_objects: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    let out_dir = PathBuf::from(&args.out);
    fs::create_dir_all(&out_dir)?;
    let total_frames = args.seconds.saturating_mul(args.fps as u64);

    let mut summaries = Vec::new();
    let mut last_frame = None;
    for mode in [RenderMode::Side, RenderMode::Polar, RenderMode::Billboard] {
        stage(&format!("simulate {} frames in {} mode", total_frames, mode.as_str()));

        let mut cfg = HudConfig::defaults()?;
        cfg.source.url = "stub://simulation".to_string();
        cfg.detector.backend = "sim".to_string();
        cfg.sim.speed = args.speed;
        if let Some(seed) = args.seed {
            cfg.sim.seed = seed;
        }
        cfg.render.mode = mode;
        cfg.render.output_dir = Some(out_dir.join(mode.as_str()));
        cfg.render.save_every = args.save_every;
        cfg.pacing.frame_delay = Duration::ZERO;

        let mut driver = driver_from_config(&cfg)?;
        driver.start()?;
        let mut last_report = None;
        for _ in 0..total_frames {
            match driver.run_cycle() {
                Ok(report) => last_report = Some(report),
                Err(err) => eprintln!("demo: cycle failed: {:#}", err),
            }
        }
        driver.stop();

        let stats = driver.stats().clone();
        summaries.push(ModeSummary {
            mode,
            cycles: stats.cycles_ok,
            errors: total_frames.saturating_sub(stats.cycles_ok),
            frames_written: stats.frames_written,
            last_objects: stats.last_object_count,
        });
        if let Some(report) = last_report {
            last_frame = Some(report.mapped);
        }
    }

    let mapped_path = out_dir.join("last_mapped_frame.json");
    if let Some(frame) = &last_frame {
        let json = serde_json::to_vec_pretty(frame)?;
        fs::write(&mapped_path, json)
            .with_context(|| format!("writing {}", mapped_path.display()))?;
    }

    println!("demo summary:");
    for summary in &summaries {
        println!(
            "  {:<9} cycles: {:>4}  errors: {}  frames written: {:>3}  objects (last): {}",
            summary.mode.as_str(),
            summary.cycles,
            summary.errors,
            summary.frames_written,
            summary.last_objects
        );
    }
    println!("  output: {}", out_dir.display());
    if last_frame.is_some() {
        println!("  mapped frame: {}", mapped_path.display());
    }
    println!("next steps:");
    println!("  cargo run --bin hud -- --simulate --mode polar --out {}", out_dir.display());
    println!("  ls -la {}", out_dir.display());

    if summaries.iter().any(|s| s.errors > 0) {
        return Err(anyhow!("demo finished with cycle errors"));
    }
    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
