use anyhow::Result;

use super::{class_color, draw_car, draw_chrome, Canvas, FontSize, HudRenderer, HudScene};
use super::{BACKGROUND, CLOUD, TEXT_MUTED};
use crate::hud::{MappedObject, PolarPosition};

/// Top-down HUD: the car sits low in the frame, objects fan out ahead of it.
#[derive(Clone, Debug)]
pub struct PolarRenderer {
    /// Smallest `r` the mapper can produce; the closest bubble is drawn at
    /// full size.
    pub r_floor: f32,
    pub labels: bool,
}

impl Default for PolarRenderer {
    fn default() -> Self {
        Self {
            r_floor: crate::hud::DistanceCurve::default().floor(),
            labels: true,
        }
    }
}

/// Where a bubble goes and how big it is, in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BubblePlacement {
    pub x: f32,
    pub y: f32,
    /// Vertical radius; the horizontal radius is 0.7 of it.
    pub radius: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolarLayout {
    pub width: f32,
    pub height: f32,
    pub r_floor: f32,
}

impl PolarLayout {
    pub fn new(width: u32, height: u32, r_floor: f32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            r_floor,
        }
    }

    fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    pub fn center_x(&self) -> f32 {
        self.width / 2.0
    }

    /// Vertical centre of the car icon.
    pub fn car_y(&self) -> f32 {
        self.height * 0.7 - 40.0
    }

    pub fn car_size(&self) -> (f32, f32) {
        (self.width * 0.22, self.height * 0.25)
    }

    pub fn place(&self, polar: &PolarPosition) -> BubblePlacement {
        let radius_base = self.min_side() * 0.42 * polar.r;
        let x = self.center_x() + radius_base * polar.angle.sin();
        let y = self.car_y() - radius_base * polar.angle.cos();
        let radius = self.min_side() * 0.18 * (1.0 - (polar.r - self.r_floor)).clamp(0.0, 1.0);
        BubblePlacement { x, y, radius }
    }
}

impl PolarRenderer {
    fn draw_background(&self, canvas: &mut Canvas, layout: &PolarLayout) {
        canvas.clear(BACKGROUND);
        let (w, h) = (layout.width, layout.height);
        let cx = layout.center_x();
        let cy = layout.car_y();
        canvas.fill_ellipse(cx - w * 0.35, cy, w * 0.25, h * 0.35, CLOUD);
        canvas.fill_ellipse(cx + w * 0.35, cy, w * 0.25, h * 0.35, CLOUD);
        canvas.fill_ellipse(cx, cy - 40.0, w * 0.25, h * 0.4, CLOUD);
    }

    fn draw_bubble(&self, canvas: &mut Canvas, layout: &PolarLayout, object: &MappedObject) {
        let bubble = layout.place(&object.polar);
        if bubble.radius <= 0.0 {
            return;
        }
        let color = class_color(object.class);
        canvas.fill_radial_ellipse(
            bubble.x,
            bubble.y,
            bubble.radius * 0.7,
            bubble.radius,
            bubble.radius * 0.1,
            bubble.radius,
            color,
        );
        if self.labels {
            canvas.draw_text_centered(
                object.class.as_str(),
                bubble.x,
                (bubble.y + bubble.radius * 0.5) as i32,
                FontSize::Small,
                TEXT_MUTED,
            );
        }
    }
}

impl HudRenderer for PolarRenderer {
    fn name(&self) -> &'static str {
        "polar"
    }

    fn render(&mut self, scene: &HudScene<'_>, canvas: &mut Canvas) -> Result<()> {
        let layout = PolarLayout::new(canvas.width(), canvas.height(), self.r_floor);
        self.draw_background(canvas, &layout);

        let (car_w, car_h) = layout.car_size();
        draw_car(canvas, layout.center_x(), layout.car_y(), car_w, car_h);

        // Far bubbles first so near ones end up on top.
        let mut objects = scene.frame.nearest_first();
        objects.reverse();
        for object in objects {
            self.draw_bubble(canvas, &layout, object);
        }

        draw_chrome(canvas, scene);
        Ok(())
    }
}
