//! Orbit trajectories of the two animated point lights.
//!
//! The angle advances by a fixed step per frame. Height bobs at half the
//! angular rate, so a full period spans 4π; the accumulator wraps there to
//! keep precision without changing the path.

use std::f32::consts::PI;

use cgmath::Vector3;

use crate::config::{OrbitConfig, Trajectory};

pub const PERIOD: f32 = 4.0 * PI;

#[derive(Clone, Debug)]
pub struct Orbit {
    config: OrbitConfig,
    angle: f32,
}

impl Orbit {
    pub fn new(config: &OrbitConfig) -> Self {
        Self {
            config: config.clone(),
            angle: 0.0,
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Step one frame forward and return the new position.
    pub fn advance(&mut self) -> Vector3<f32> {
        self.angle = (self.angle + self.config.step) % PERIOD;
        self.position()
    }

    pub fn position(&self) -> Vector3<f32> {
        position_at(&self.config, self.angle)
    }
}

pub fn position_at(config: &OrbitConfig, angle: f32) -> Vector3<f32> {
    let (s, c) = angle.sin_cos();
    let half = angle / 2.0;
    match config.trajectory {
        Trajectory::CosSin => Vector3::new(
            c * config.radius,
            config.bob_base + half.sin() * config.bob_amplitude,
            s * config.radius,
        ),
        Trajectory::SinCos => Vector3::new(
            s * config.radius,
            config.bob_base + half.cos() * config.bob_amplitude,
            c * config.radius,
        ),
    }
}
