use anyhow::Result;

use super::{class_color, draw_car, draw_chrome, Canvas, FontSize, HudRenderer, HudScene};
use super::{BACKGROUND, CLOUD, TEXT};
use crate::detect::ObjectClass;

/// Car in the middle, one bubble per occupied side.
///
/// The first object on a side (detector order) picks the bubble's color and
/// label; any others show up as a "+N" count.
#[derive(Clone, Debug, Default)]
pub struct SideBubbleRenderer;

/// Text under a side bubble: the lead class plus a count of the rest.
pub fn side_label(classes: &[ObjectClass]) -> Option<String> {
    let lead = classes.first()?;
    Some(match classes.len() {
        1 => lead.as_str().to_string(),
        n => format!("{} +{}", lead.as_str(), n - 1),
    })
}

impl SideBubbleRenderer {
    fn draw_side(&self, canvas: &mut Canvas, x: f32, y: f32, radius: f32, classes: &[ObjectClass]) {
        let (Some(lead), Some(label)) = (classes.first(), side_label(classes)) else {
            return;
        };
        canvas.fill_radial_ellipse(
            x,
            y,
            radius * 0.7,
            radius,
            radius * 0.1,
            radius,
            class_color(*lead),
        );
        canvas.draw_text_centered(&label, x, (y + radius + 6.0) as i32, FontSize::Small, TEXT);
    }
}

impl HudRenderer for SideBubbleRenderer {
    fn name(&self) -> &'static str {
        "side"
    }

    fn render(&mut self, scene: &HudScene<'_>, canvas: &mut Canvas) -> Result<()> {
        let w = canvas.width() as f32;
        let h = canvas.height() as f32;
        let cx = w / 2.0;
        let cy = h * 0.55;
        let (car_w, car_h) = (w * 0.22, h * 0.35);

        canvas.clear(BACKGROUND);
        canvas.fill_ellipse(cx, cy, w * 0.45, h * 0.4, CLOUD);
        draw_car(canvas, cx, cy, car_w, car_h);

        let radius = w.min(h) * 0.16;
        let offset = car_w / 2.0 + radius;
        let sides = &scene.frame.sides;
        self.draw_side(canvas, cx - offset, cy, radius, &sides.left);
        self.draw_side(canvas, cx + offset, cy, radius, &sides.right);

        draw_chrome(canvas, scene);
        Ok(())
    }
}
