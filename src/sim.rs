//! Simulated traffic.
//!
//! `SimulatedTraffic` is a detector backend that ignores the pixels it is
//! given. It moves a handful of road users around the car and reports them as
//! the bounding boxes a forward camera would see, so the simulation runs
//! through the same filter, mapper and renderers as a real camera.
//!
//! Positions are car-relative meters: `x` to the right, `z` ahead.

use anyhow::{anyhow, Result};
use nalgebra::{Point2, Point3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::camera::PinholeCamera;
use crate::detect::{BoundingBox, Detection, DetectorBackend};

/// Simulation step per detect call, before the speed factor.
pub const TICK_SECS: f32 = 1.0 / 15.0;
pub const MAX_SPEED_FACTOR: f32 = 5.0;
/// Ego speed at factor 1.0 (50 km/h).
pub const BASE_SPEED_MPS: f32 = 50.0 / 3.6;

const CAMERA_HEIGHT_M: f32 = 1.3;
const SPAWN_NEAR_M: f32 = 30.0;
const SPAWN_FAR_M: f32 = 60.0;
const DESPAWN_NEAR_M: f32 = 2.0;
const DESPAWN_FAR_M: f32 = 90.0;
const LANES: [f32; 3] = [-3.5, 0.0, 3.5];
const SIDEWALKS: [f32; 2] = [-6.5, 6.5];

/// Shared speed slider. Cloned handles all see the same value.
#[derive(Clone, Debug)]
pub struct SpeedControl {
    bits: Arc<AtomicU32>,
}

impl SpeedControl {
    pub fn new(factor: f32) -> Result<Self> {
        let control = Self {
            bits: Arc::new(AtomicU32::new(0)),
        };
        control.set(factor)?;
        Ok(control)
    }

    pub fn set(&self, factor: f32) -> Result<()> {
        if !(0.0..=MAX_SPEED_FACTOR).contains(&factor) {
            return Err(anyhow!(
                "simulation speed must be within [0, {}], got {}",
                MAX_SPEED_FACTOR,
                factor
            ));
        }
        self.bits.store(factor.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Ego speed shown on the speedometer.
    pub fn speed_kmh(&self) -> f32 {
        self.get() * BASE_SPEED_MPS * 3.6
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Car,
    Truck,
    Bus,
    Person,
    Bicycle,
    Motorbike,
}

impl Kind {
    const ALL: [Kind; 6] = [
        Kind::Car,
        Kind::Truck,
        Kind::Bus,
        Kind::Person,
        Kind::Bicycle,
        Kind::Motorbike,
    ];

    fn label(self) -> &'static str {
        match self {
            Kind::Car => "car",
            Kind::Truck => "truck",
            Kind::Bus => "bus",
            Kind::Person => "person",
            Kind::Bicycle => "bicycle",
            Kind::Motorbike => "motorbike",
        }
    }

    /// (width, height) in meters as seen from behind.
    fn size(self) -> (f32, f32) {
        match self {
            Kind::Car => (1.8, 1.5),
            Kind::Truck => (2.5, 3.4),
            Kind::Bus => (2.55, 3.2),
            Kind::Person => (0.6, 1.75),
            Kind::Bicycle => (0.6, 1.7),
            Kind::Motorbike => (0.8, 1.5),
        }
    }

    /// Own forward speed range in m/s at factor 1.0.
    fn speed_range(self) -> (f32, f32) {
        match self {
            Kind::Person => (-1.5, 1.5),
            Kind::Bicycle => (3.0, 6.0),
            _ => (6.0, 16.0),
        }
    }

    fn on_sidewalk(self) -> bool {
        matches!(self, Kind::Person | Kind::Bicycle)
    }
}

#[derive(Clone, Debug)]
struct SimObject {
    kind: Kind,
    x: f32,
    z: f32,
    /// Own forward speed, m/s.
    speed: f32,
    /// Lateral drift, m/s.
    drift: f32,
}

pub struct SimulatedTraffic {
    rng: StdRng,
    objects: Vec<SimObject>,
    speed: SpeedControl,
    ticks: u64,
}

impl SimulatedTraffic {
    pub fn new(seed: u64, object_count: usize, speed: SpeedControl) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let objects = (0..object_count)
            .map(|_| {
                let mut object = spawn(&mut rng);
                // Spread the initial population over the whole range.
                object.z = rng.gen_range(8.0..SPAWN_FAR_M);
                object
            })
            .collect();
        Self {
            rng,
            objects,
            speed,
            ticks: 0,
        }
    }

    pub fn speed_control(&self) -> SpeedControl {
        self.speed.clone()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance the world by one tick.
    pub fn step(&mut self) {
        let factor = self.speed.get();
        let dt = TICK_SECS * factor;
        let ego = BASE_SPEED_MPS;
        for object in &mut self.objects {
            object.z += (object.speed - ego) * dt;
            object.x += object.drift * dt;
            if object.z < DESPAWN_NEAR_M || object.z > DESPAWN_FAR_M || object.x.abs() > 20.0 {
                *object = spawn(&mut self.rng);
            }
        }
        self.ticks += 1;
    }

    /// What a forward camera `width` x `height` would see right now.
    pub fn observe(&self, width: u32, height: u32) -> Vec<Detection> {
        let camera = forward_camera(width, height);
        let mut detections: Vec<(f32, Detection)> = self
            .objects
            .iter()
            .filter_map(|object| {
                let bbox = project_box(&camera, object, width, height)?;
                let score = (0.95 - object.z / SPAWN_FAR_M * 0.4).clamp(0.45, 0.95);
                Some((object.z, Detection::new(object.kind.label(), score, bbox)))
            })
            .collect();
        // Detectors tend to report prominent objects first.
        detections.sort_by(|a, b| a.0.total_cmp(&b.0));
        detections.into_iter().map(|(_, det)| det).collect()
    }
}

impl Default for SimulatedTraffic {
    fn default() -> Self {
        let speed = SpeedControl {
            bits: Arc::new(AtomicU32::new(1.0f32.to_bits())),
        };
        Self::new(7, 6, speed)
    }
}

fn spawn(rng: &mut StdRng) -> SimObject {
    let kind = Kind::ALL[rng.gen_range(0..Kind::ALL.len())];
    let x = if kind.on_sidewalk() {
        SIDEWALKS[rng.gen_range(0..SIDEWALKS.len())]
    } else {
        LANES[rng.gen_range(0..LANES.len())]
    };
    let (lo, hi) = kind.speed_range();
    let drift = if kind == Kind::Person {
        rng.gen_range(-0.8..0.8)
    } else {
        0.0
    };
    SimObject {
        kind,
        x,
        z: rng.gen_range(SPAWN_NEAR_M..SPAWN_FAR_M),
        speed: rng.gen_range(lo..hi),
        drift,
    }
}

/// Forward camera 1.3 m up; the horizon sits at 45% of the frame height.
fn forward_camera(width: u32, height: u32) -> PinholeCamera {
    let eye = Point3::new(0.0, CAMERA_HEIGHT_M, 0.0);
    let ahead = Point3::new(0.0, CAMERA_HEIGHT_M, 1.0);
    let principal = Point2::new(width as f32 / 2.0, height as f32 * 0.45);
    PinholeCamera::look_at(&eye, &ahead, width as f32 * 0.8, principal).with_near_plane(1.0)
}

/// Image-space box of `object`, clipped to the frame. None when off-screen.
fn project_box(camera: &PinholeCamera, object: &SimObject, width: u32, height: u32) -> Option<BoundingBox> {
    let (w_m, h_m) = object.kind.size();
    let bottom_left = camera.project(&Point3::new(object.x - w_m / 2.0, 0.0, object.z))?;
    let top_right = camera.project(&Point3::new(object.x + w_m / 2.0, h_m, object.z))?;

    let x0 = bottom_left.x.max(0.0);
    let x1 = top_right.x.min(width as f32);
    let y0 = top_right.y.max(0.0);
    let y1 = bottom_left.y.min(height as f32);
    if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
        return None;
    }
    Some(BoundingBox::new(x0, y0, x1 - x0, y1 - y0))
}

impl DetectorBackend for SimulatedTraffic {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn detect(&mut self, _pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        if width == 0 || height == 0 {
            return Err(anyhow!("simulation needs a non-empty frame size"));
        }
        self.step();
        Ok(self.observe(width, height))
    }
}
