//! Pointer input mapped onto the resolution scale and the primary light.

use cgmath::Vector3;

use crate::{config::PointerConfig, host::Viewport};

/// What a single pointer position asks the scene to change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEffect {
    pub pixel_ratio: f32,
    pub light_position: Vector3<f32>,
}

/// Position along one axis, normalized to `[0, 1]`. A zero extent yields 0.
pub fn normalize(coordinate: f32, extent: u32) -> f32 {
    if extent == 0 {
        return 0.0;
    }
    (coordinate / extent as f32).clamp(0.0, 1.0)
}

pub fn pixel_ratio(fx: f32, config: &PointerConfig) -> f32 {
    let span = config.max_pixel_ratio - config.min_pixel_ratio;
    (config.min_pixel_ratio + span * fx).clamp(config.min_pixel_ratio, config.max_pixel_ratio)
}

/// Left edge is -extent, top edge is +extent; depth is fixed.
pub fn light_position(fx: f32, fy: f32, config: &PointerConfig) -> Vector3<f32> {
    Vector3::new(
        (fx * 2.0 - 1.0) * config.light_extent,
        -(fy * 2.0 - 1.0) * config.light_extent,
        config.light_depth,
    )
}

/// Map client coordinates within `viewport` to a [`PointerEffect`].
pub fn map_pointer(x: f32, y: f32, viewport: Viewport, config: &PointerConfig) -> PointerEffect {
    let fx = normalize(x, viewport.width);
    let fy = normalize(y, viewport.height);
    PointerEffect {
        pixel_ratio: pixel_ratio(fx, config),
        light_position: light_position(fx, fy, config),
    }
}
