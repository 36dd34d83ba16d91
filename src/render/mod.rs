//! HUD presentation modes.
//!
//! Each mode is a thin `HudRenderer` over the same `MappedFrame`:
//! - `side`: left/right bubbles next to the car
//! - `polar`: top-down car with bubbles placed by angle and distance
//! - `billboard`: perspective ground plane with camera-facing sprites
//!
//! Renderers draw onto a `Canvas`; a `FrameSink` decides what happens to the
//! finished surface.

pub mod billboard;
pub mod canvas;
pub mod polar;
pub mod side;
pub mod sink;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::ObjectClass;
use crate::hud::MappedFrame;

pub use billboard::BillboardRenderer;
pub use canvas::{text_width, Canvas, Color, FontSize};
pub use polar::PolarRenderer;
pub use side::SideBubbleRenderer;
pub use sink::{FrameSink, NullSink, PngSequenceSink};

// ----------------------------------------------------------------------------
// Palette
// ----------------------------------------------------------------------------

pub const BACKGROUND: Color = Color::rgb(0xf3, 0xf5, 0xf9);
pub const CLOUD: Color = Color::rgba(200, 205, 215, 0.9);
pub const CAR_BODY: Color = Color::rgb(255, 255, 255);
pub const CAR_ROOF: Color = Color::rgb(0x15, 0x19, 0x1f);
pub const CAR_SHADOW: Color = Color::rgba(0, 0, 0, 0.25);
pub const TEXT: Color = Color::rgb(0x15, 0x19, 0x1f);
pub const TEXT_MUTED: Color = Color::rgba(0x15, 0x19, 0x1f, 0.6);

const BUBBLE_ALPHA: f32 = 0.95;

/// Bubble color for an object class.
pub fn class_color(class: ObjectClass) -> Color {
    match class {
        ObjectClass::Person => Color::rgba(255, 190, 60, BUBBLE_ALPHA),
        ObjectClass::Car => Color::rgba(120, 220, 120, BUBBLE_ALPHA),
        _ => Color::rgba(255, 130, 100, BUBBLE_ALPHA),
    }
}

// ----------------------------------------------------------------------------
// Scene + renderer seam
// ----------------------------------------------------------------------------

/// Everything a renderer needs for one frame.
#[derive(Clone, Copy, Debug)]
pub struct HudScene<'a> {
    pub frame: &'a MappedFrame,
    pub speed_kmh: f32,
    pub status: &'a str,
}

pub trait HudRenderer: Send {
    fn name(&self) -> &'static str;

    fn render(&mut self, scene: &HudScene<'_>, canvas: &mut Canvas) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Side,
    #[default]
    Polar,
    Billboard,
}

impl RenderMode {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "side" => Ok(RenderMode::Side),
            "polar" => Ok(RenderMode::Polar),
            "billboard" | "3d" => Ok(RenderMode::Billboard),
            other => Err(anyhow!(
                "unknown render mode '{}'; expected side, polar, or billboard",
                other
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Side => "side",
            RenderMode::Polar => "polar",
            RenderMode::Billboard => "billboard",
        }
    }

    pub fn renderer(&self) -> Box<dyn HudRenderer> {
        match self {
            RenderMode::Side => Box::new(SideBubbleRenderer),
            RenderMode::Polar => Box::new(PolarRenderer::default()),
            RenderMode::Billboard => Box::new(BillboardRenderer::default()),
        }
    }
}

/// Cosmetic speedometer value shown while running on a camera: 40 ± 5 km/h.
pub fn cosmetic_speed_kmh(elapsed_secs: f64) -> f32 {
    (40.0 + 5.0 * elapsed_secs.sin()).round().max(0.0) as f32
}

/// Top-down car silhouette centred on (cx, cy): shadowed white body with a
/// dark panoramic roof.
pub(crate) fn draw_car(canvas: &mut Canvas, cx: f32, cy: f32, car_w: f32, car_h: f32) {
    let x = cx - car_w / 2.0;
    let y = cy - car_h / 2.0;
    canvas.round_rect_shadow(x, y, car_w, car_h, 18.0, 20.0, 10.0, CAR_SHADOW);
    canvas.fill_round_rect(x, y, car_w, car_h, 18.0, CAR_BODY);
    canvas.fill_round_rect(
        cx - car_w * 0.35,
        cy - car_h * 0.35,
        car_w * 0.7,
        car_h * 0.7,
        10.0,
        CAR_ROOF,
    );
}

/// Speed readout (top left) and status line (bottom left).
pub(crate) fn draw_chrome(canvas: &mut Canvas, scene: &HudScene<'_>) {
    let speed = format!("{:.0} km/h", scene.speed_kmh.max(0.0));
    canvas.draw_text(&speed, 12, 10, FontSize::Large, TEXT);
    if !scene.status.is_empty() {
        let y = canvas.height() as i32 - 18;
        canvas.draw_text(scene.status, 12, y, FontSize::Small, TEXT_MUTED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_follows_class() {
        assert_eq!(class_color(ObjectClass::Person), Color::rgba(255, 190, 60, 0.95));
        assert_eq!(class_color(ObjectClass::Car), Color::rgba(120, 220, 120, 0.95));
        assert_eq!(class_color(ObjectClass::Bus), class_color(ObjectClass::Bicycle));
    }

    #[test]
    fn parses_modes() -> Result<()> {
        assert_eq!(RenderMode::parse("SIDE")?, RenderMode::Side);
        assert_eq!(RenderMode::parse("3d")?, RenderMode::Billboard);
        assert!(RenderMode::parse("hologram").is_err());
        assert_eq!(RenderMode::Billboard.renderer().name(), "billboard");
        Ok(())
    }

    #[test]
    fn cosmetic_speed_stays_near_forty() {
        for t in 0..100 {
            let speed = cosmetic_speed_kmh(t as f64 * 0.37);
            assert!((35.0..=45.0).contains(&speed));
        }
        assert_eq!(cosmetic_speed_kmh(0.0), 40.0);
    }
}
