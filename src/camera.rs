//! Pinhole camera shared by the 3D billboard view and the traffic simulation.
//!
//! World frame: car at the origin, x to the right, y up, z forward, meters.
//! That frame is left-handed, so the view transform is built with
//! `Isometry3::look_at_lh`: camera space keeps x right and y up, and looks
//! down +z.

use nalgebra::{Isometry3, Point2, Point3, Vector3};

/// Points closer to the camera than this are not projected.
pub const DEFAULT_NEAR_PLANE: f32 = 0.5;

/// A projected point: screen position plus camera depth.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projected {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct PinholeCamera {
    view: Isometry3<f32>,
    focal: f32,
    principal: Point2<f32>,
    near: f32,
}

impl PinholeCamera {
    /// Camera at `eye` looking at `target`, with an explicit focal length (pixels)
    /// and principal point.
    pub fn look_at(eye: &Point3<f32>, target: &Point3<f32>, focal: f32, principal: Point2<f32>) -> Self {
        Self {
            view: Isometry3::look_at_lh(eye, target, &Vector3::y()),
            focal,
            principal,
            near: DEFAULT_NEAR_PLANE,
        }
    }

    /// Camera with a vertical field of view, centred on a `width` x `height`
    /// image.
    pub fn with_fov(
        eye: &Point3<f32>,
        target: &Point3<f32>,
        fov_y_deg: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let focal = (height as f32 / 2.0) / (fov_y_deg.to_radians() / 2.0).tan();
        let principal = Point2::new(width as f32 / 2.0, height as f32 / 2.0);
        Self::look_at(eye, target, focal, principal)
    }

    pub fn with_near_plane(mut self, near: f32) -> Self {
        self.near = near;
        self
    }

    pub fn focal(&self) -> f32 {
        self.focal
    }

    /// Screen position of a world point, or `None` at or behind the near plane.
    pub fn project(&self, p: &Point3<f32>) -> Option<Projected> {
        let cam = self.view.transform_point(p);
        let depth = cam.z;
        if !depth.is_finite() || depth <= self.near {
            return None;
        }
        Some(Projected {
            x: self.principal.x + self.focal * cam.x / depth,
            y: self.principal.y - self.focal * cam.y / depth,
            depth,
        })
    }

    /// On-screen height of something `size` meters tall at `depth`.
    pub fn scale_at(&self, size: f32, depth: f32) -> f32 {
        self.focal * size / depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level_camera() -> PinholeCamera {
        PinholeCamera::look_at(
            &Point3::new(0.0, 1.0, 0.0),
            &Point3::new(0.0, 1.0, 10.0),
            100.0,
            Point2::new(50.0, 40.0),
        )
    }

    #[test]
    fn points_ahead_follow_the_pinhole_model() {
        let camera = level_camera();
        let p = camera.project(&Point3::new(2.0, 0.0, 10.0));
        let p = p.unwrap_or(Projected {
            x: f32::NAN,
            y: f32::NAN,
            depth: f32::NAN,
        });
        assert!((p.depth - 10.0).abs() < 1e-4);
        // 2 m right and 1 m below the eye, 10 m ahead.
        assert!((p.x - 70.0).abs() < 1e-3, "{}", p.x);
        assert!((p.y - 50.0).abs() < 1e-3, "{}", p.y);
    }

    #[test]
    fn points_behind_or_near_are_culled() {
        let camera = level_camera().with_near_plane(1.0);
        assert!(camera.project(&Point3::new(0.0, 1.0, -5.0)).is_none());
        assert!(camera.project(&Point3::new(0.0, 1.0, 0.9)).is_none());
        assert!(camera.project(&Point3::new(0.0, 1.0, 1.1)).is_some());
    }

    #[test]
    fn fov_sets_focal_length() {
        let camera = PinholeCamera::with_fov(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(0.0, 0.0, 1.0),
            90.0,
            200,
            100,
        );
        assert!((camera.focal() - 50.0).abs() < 1e-3);
        assert!((camera.scale_at(2.0, 10.0) - 10.0).abs() < 1e-3);
    }
}
