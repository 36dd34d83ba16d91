//! Perspective HUD with camera-facing sprites.
//!
//! World frame as in `crate::camera`. A chase camera sits behind and above
//! the car; every mapped object becomes a flat sprite standing on the ground
//! at its polar position.

use anyhow::Result;
use nalgebra::Point3;

use super::{class_color, draw_chrome, Canvas, Color, FontSize, HudRenderer, HudScene};
use super::{BACKGROUND, CAR_BODY, CAR_ROOF, CAR_SHADOW, TEXT};
use crate::camera::{PinholeCamera, Projected};
use crate::hud::{MappedObject, PolarPosition};

const GROUND: Color = Color::rgb(214, 219, 228);
const LANE: Color = Color::rgba(255, 255, 255, 0.85);

#[derive(Clone, Debug)]
pub struct BillboardRenderer {
    /// Distance in meters that r = 1 stands for.
    pub range_m: f32,
    pub sprite_m: f32,
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub fov_y_deg: f32,
}

impl Default for BillboardRenderer {
    fn default() -> Self {
        Self {
            range_m: 30.0,
            sprite_m: 2.2,
            eye: Point3::new(0.0, 6.0, -10.0),
            target: Point3::new(0.0, 0.0, 8.0),
            fov_y_deg: 55.0,
        }
    }
}

/// A sprite ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct Sprite<'a> {
    pub object: &'a MappedObject,
    pub center: Projected,
    pub size: f32,
}

impl BillboardRenderer {
    /// Ground position of a polar placement.
    pub fn world_position(&self, polar: &PolarPosition) -> Point3<f32> {
        let d = polar.r * self.range_m;
        Point3::new(d * polar.angle.sin(), 0.0, d * polar.angle.cos())
    }

    /// Chase camera for a `width` x `height` canvas.
    pub fn camera(&self, width: u32, height: u32) -> PinholeCamera {
        PinholeCamera::with_fov(&self.eye, &self.target, self.fov_y_deg, width, height)
    }

    /// Project and sort sprites back to front.
    pub fn sprites<'a>(&self, camera: &PinholeCamera, objects: &'a [MappedObject]) -> Vec<Sprite<'a>> {
        let mut sprites: Vec<Sprite<'a>> = objects
            .iter()
            .filter_map(|object| {
                let base = self.world_position(&object.polar);
                let mid = Point3::new(base.x, self.sprite_m / 2.0, base.z);
                let center = camera.project(&mid)?;
                Some(Sprite {
                    object,
                    center,
                    size: camera.scale_at(self.sprite_m, center.depth),
                })
            })
            .collect();
        sprites.sort_by(|a, b| b.center.depth.total_cmp(&a.center.depth));
        sprites
    }

    fn ground_quad(
        &self,
        camera: &PinholeCamera,
        (x0, x1): (f32, f32),
        (z0, z1): (f32, f32),
    ) -> Option<Vec<(f32, f32)>> {
        [
            Point3::new(x0, 0.0, z0),
            Point3::new(x1, 0.0, z0),
            Point3::new(x1, 0.0, z1),
            Point3::new(x0, 0.0, z1),
        ]
        .iter()
        .map(|corner| camera.project(corner).map(|p| (p.x, p.y)))
        .collect()
    }

    fn draw_world(&self, canvas: &mut Canvas, camera: &PinholeCamera) {
        let far = self.range_m * 1.6;
        if let Some(ground) = self.ground_quad(camera, (-14.0, 14.0), (-4.0, far)) {
            canvas.fill_convex(&ground, GROUND);
        }
        for lane_x in [-5.25_f32, -1.75, 1.75, 5.25] {
            let from = camera.project(&Point3::new(lane_x, 0.0, -4.0));
            let to = camera.project(&Point3::new(lane_x, 0.0, far));
            if let (Some(a), Some(b)) = (from, to) {
                canvas.draw_line((a.x, a.y), (b.x, b.y), 2.0, LANE);
            }
        }

        // Car footprint, 1.9 m x 4.6 m, with a roof panel.
        if let Some(shadow) = self.ground_quad(camera, (-1.15, 1.15), (-2.6, 2.6)) {
            canvas.fill_convex(&shadow, CAR_SHADOW);
        }
        if let Some(body) = self.ground_quad(camera, (-0.95, 0.95), (-2.3, 2.3)) {
            canvas.fill_convex(&body, CAR_BODY);
        }
        if let Some(roof) = self.ground_quad(camera, (-0.66, 0.66), (-1.6, 1.6)) {
            canvas.fill_convex(&roof, CAR_ROOF);
        }
    }

    fn draw_sprite(&self, canvas: &mut Canvas, sprite: &Sprite<'_>) {
        let color = class_color(sprite.object.class);
        let r = sprite.size / 2.0;
        let (x, y) = (sprite.center.x, sprite.center.y);
        canvas.fill_ellipse(x, y + r, r * 0.8, r * 0.18, CAR_SHADOW);
        canvas.fill_radial_ellipse(x, y, r * 0.7, r, r * 0.1, r, color);
        canvas.draw_text_centered(
            sprite.object.class.as_str(),
            x,
            (y - r - 12.0) as i32,
            FontSize::Small,
            TEXT,
        );
    }
}

impl HudRenderer for BillboardRenderer {
    fn name(&self) -> &'static str {
        "billboard"
    }

    fn render(&mut self, scene: &HudScene<'_>, canvas: &mut Canvas) -> Result<()> {
        let camera = self.camera(canvas.width(), canvas.height());
        canvas.clear(BACKGROUND);
        self.draw_world(canvas, &camera);
        for sprite in self.sprites(&camera, &scene.frame.objects) {
            self.draw_sprite(canvas, &sprite);
        }
        draw_chrome(canvas, scene);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, ObjectClass};
    use crate::hud::Side;

    fn object(angle: f32, r: f32) -> MappedObject {
        MappedObject {
            key: "car-0".to_string(),
            class: ObjectClass::Car,
            score: 0.9,
            bbox: BoundingBox::default(),
            polar: PolarPosition { angle, r },
            side: Side::Both,
        }
    }

    fn camera() -> PinholeCamera {
        BillboardRenderer::default().camera(800, 600)
    }

    #[test]
    fn straight_ahead_projects_to_screen_centre_line() {
        let p = camera().project(&Point3::new(0.0, 0.0, 20.0));
        assert!(p.is_some_and(|p| (p.x - 400.0).abs() < 1e-3));
    }

    #[test]
    fn points_behind_the_camera_are_culled() {
        assert!(camera().project(&Point3::new(0.0, 6.0, -20.0)).is_none());
    }

    #[test]
    fn sprites_are_sorted_back_to_front_and_shrink_with_distance() {
        let renderer = BillboardRenderer::default();
        let objects = vec![object(0.0, 0.3), object(0.5, 0.9), object(-0.5, 0.6)];
        let sprites = renderer.sprites(&camera(), &objects);
        assert_eq!(sprites.len(), 3);
        assert!(sprites[0].center.depth > sprites[1].center.depth);
        assert!(sprites[1].center.depth > sprites[2].center.depth);
        assert!(sprites[0].size < sprites[2].size);
        assert_eq!(sprites[2].object.polar.r, 0.3);
    }

    #[test]
    fn positive_angle_lands_right_of_centre() {
        let renderer = BillboardRenderer::default();
        let objects = vec![object(0.8, 0.5)];
        let sprites = renderer.sprites(&camera(), &objects);
        assert!(sprites[0].center.x > 400.0);
    }
}
