use crate::data_structures::texture::TextureId;

/// Metalness/roughness material bound to an optional texture slot.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalMaterial {
    pub color: wgpu::Color,
    pub map: Option<TextureId>,
    pub metalness: f32,
    pub roughness: f32,
    pub reflectivity: f32,
}

impl Default for PhysicalMaterial {
    fn default() -> Self {
        Self {
            color: wgpu::Color::WHITE,
            map: None,
            metalness: 0.0,
            roughness: 1.0,
            reflectivity: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Material {
    /// Whatever the asset shipped with; only the base colour is kept.
    Imported { base_color: [f32; 4] },
    Physical(PhysicalMaterial),
}

impl Material {
    pub fn map(&self) -> Option<TextureId> {
        match self {
            Material::Imported { .. } => None,
            Material::Physical(physical) => physical.map,
        }
    }
}
