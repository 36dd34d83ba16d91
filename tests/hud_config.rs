use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use hud_overlay::config::HudConfig;
use hud_overlay::hud::DistanceCurve;
use hud_overlay::{ObjectClass, RenderMode};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "HUD_CONFIG",
        "HUD_SOURCE_URL",
        "HUD_DETECTOR",
        "HUD_CONFIDENCE",
        "HUD_RENDER_MODE",
        "HUD_OUTPUT_DIR",
        "HUD_FRAME_DELAY_MS",
        "HUD_SIM_SPEED",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": {
            "url": "v4l2:///dev/video2",
            "target_fps": 10,
            "width": 1920,
            "height": 1080,
            "analysis_max_width": 480
        },
        "detector": { "backend": "stub" },
        "filter": {
            "confidence_threshold": 0.35,
            "classes": ["person", "car", "bicycle"]
        },
        "mapping": { "distance_curve": "clamp" },
        "smoothing": { "alpha": 0.5, "max_idle_cycles": 12 },
        "render": { "mode": "side", "width": 640, "height": 480, "save_every": 3 },
        "pacing": { "frame_delay_ms": 40 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("HUD_CONFIG", file.path());
    std::env::set_var("HUD_CONFIDENCE", "0.5");
    std::env::set_var("HUD_RENDER_MODE", "3d");
    std::env::set_var("HUD_OUTPUT_DIR", "/tmp/hud-frames");

    let cfg = HudConfig::load().expect("load config");

    assert_eq!(cfg.source.url, "v4l2:///dev/video2");
    assert_eq!(cfg.source.target_fps, 10);
    assert_eq!(cfg.source.width, 1920);
    assert_eq!(cfg.source.height, 1080);
    assert_eq!(cfg.source.analysis_max_width, 480);
    assert_eq!(cfg.filter.confidence_threshold, 0.5);
    assert_eq!(
        cfg.filter.classes,
        vec![ObjectClass::Person, ObjectClass::Car, ObjectClass::Bicycle]
    );
    assert_eq!(cfg.mapping.distance_curve, DistanceCurve::Clamp);
    assert_eq!(cfg.smoothing.alpha, 0.5);
    assert_eq!(cfg.smoothing.max_idle_cycles, Some(12));
    assert_eq!(cfg.render.mode, RenderMode::Billboard);
    assert_eq!(cfg.render.width, 640);
    assert_eq!(cfg.render.save_every, 3);
    assert_eq!(cfg.render.output_dir, Some(PathBuf::from("/tmp/hud-frames")));
    assert_eq!(cfg.pacing.frame_delay, Duration::from_millis(40));

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[source]
url = "stub://simulation"

[detector]
backend = "sim"

[sim]
speed = 2.5
seed = 99
objects = 4
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("HUD_CONFIG", file.path());
    std::env::set_var("HUD_SIM_SPEED", "3");

    let cfg = HudConfig::load().expect("load config");
    assert_eq!(cfg.source.url, "stub://simulation");
    assert_eq!(cfg.detector.backend, "sim");
    assert_eq!(cfg.sim.speed, 3.0);
    assert_eq!(cfg.sim.seed, 99);
    assert_eq!(cfg.sim.objects, 4);
    // Unset sections keep their defaults.
    assert_eq!(cfg.render.mode, RenderMode::Polar);
    assert_eq!(cfg.filter.confidence_threshold, 0.4);

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HUD_SOURCE_URL", "image:/tmp/reference.jpg");
    std::env::set_var("HUD_DETECTOR", " sim ");
    std::env::set_var("HUD_FRAME_DELAY_MS", "0");

    let cfg = HudConfig::load().expect("load config");
    assert_eq!(cfg.source.url, "image:/tmp/reference.jpg");
    assert_eq!(cfg.detector.backend, "sim");
    assert_eq!(cfg.pacing.frame_delay, Duration::ZERO);
    assert!(cfg.smoothing.enabled);
    assert_eq!(cfg.render.output_dir, None);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HUD_CONFIDENCE", "1.5");
    assert!(HudConfig::load().is_err());
    std::env::set_var("HUD_CONFIDENCE", "high");
    assert!(HudConfig::load().is_err());
    clear_env();

    std::env::set_var("HUD_SIM_SPEED", "9");
    assert!(HudConfig::load().is_err());
    clear_env();

    std::env::set_var("HUD_RENDER_MODE", "hologram");
    assert!(HudConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "filter": { "classes": ["person", "dog"] } }"#)
        .expect("write config");
    std::env::set_var("HUD_CONFIG", file.path());
    assert!(HudConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "render": { "save_every": 0 } }"#)
        .expect("write config");
    std::env::set_var("HUD_CONFIG", file.path());
    assert!(HudConfig::load().is_err());

    clear_env();
}
