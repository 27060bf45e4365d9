use crate::config::LightConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    /// Uniform fill light without position.
    Ambient,
    /// Omnidirectional light; `range == 0.0` means unlimited.
    Point { range: f32, decay: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: wgpu::Color,
    pub intensity: f32,
    pub cast_shadow: bool,
}

impl Light {
    pub fn ambient(config: &LightConfig) -> Self {
        Self {
            kind: LightKind::Ambient,
            color: config.color,
            intensity: config.intensity,
            cast_shadow: false,
        }
    }

    pub fn point(config: &LightConfig) -> Self {
        Self {
            kind: LightKind::Point {
                range: config.range,
                decay: config.decay,
            },
            color: config.color,
            intensity: config.intensity,
            cast_shadow: config.cast_shadow,
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self.kind, LightKind::Point { .. })
    }

    /// Colour premultiplied by intensity, as consumed by shaders.
    pub fn radiance(&self) -> [f32; 3] {
        let i = self.intensity as f64;
        [
            (self.color.r * i) as f32,
            (self.color.g * i) as f32,
            (self.color.b * i) as f32,
        ]
    }
}
