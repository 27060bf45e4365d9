//! Scene configuration.
//!
//! Every constant of the showcase scene lives in [`SceneConfig`]. The
//! [`Default`] implementation is the scene as shipped; callers tweak fields in
//! code before handing the config to [`crate::flow::run`] or
//! [`crate::controller::SceneController::mount`].

use cgmath::{Deg, Rad, Vector3};

/// Convert a `0xRRGGBB` literal into a linear-ish [`wgpu::Color`].
pub fn hex(rgb: u32) -> wgpu::Color {
    let channel = |shift: u32| ((rgb >> shift) & 0xff) as f64 / 255.0;
    wgpu::Color {
        r: channel(16),
        g: channel(8),
        b: channel(0),
        a: 1.0,
    }
}

#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub background: wgpu::Color,
    pub camera: CameraConfig,
    pub renderer: RendererSettings,
    pub pointer: PointerConfig,
    pub ambient: LightConfig,
    pub primary: LightConfig,
    pub warm: LightConfig,
    pub cool: LightConfig,
    pub warm_orbit: OrbitConfig,
    pub cool_orbit: OrbitConfig,
    pub model: ModelConfig,
    pub assets: AssetPaths,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: hex(0x0b0d17),
            camera: CameraConfig::default(),
            renderer: RendererSettings::default(),
            pointer: PointerConfig::default(),
            ambient: LightConfig {
                color: hex(0x404040),
                intensity: 1.0,
                range: 0.0,
                decay: 0.0,
                cast_shadow: false,
                position: Vector3::new(0.0, 0.0, 0.0),
            },
            primary: LightConfig {
                color: hex(0xffffff),
                intensity: 1.2,
                range: 0.0,
                decay: 0.0,
                cast_shadow: false,
                position: Vector3::new(0.0, 0.0, 5.0),
            },
            warm: LightConfig {
                color: hex(0xff7a33),
                intensity: 2.0,
                range: 20.0,
                decay: 2.0,
                cast_shadow: true,
                position: Vector3::new(4.0, 2.0, 0.0),
            },
            cool: LightConfig {
                color: hex(0x3399ff),
                intensity: 1.6,
                range: 18.0,
                decay: 2.0,
                cast_shadow: true,
                position: Vector3::new(0.0, 2.2, 5.0),
            },
            warm_orbit: OrbitConfig {
                step: 0.02,
                radius: 4.0,
                bob_base: 2.0,
                bob_amplitude: 1.5,
                trajectory: Trajectory::CosSin,
            },
            cool_orbit: OrbitConfig {
                step: 0.013,
                radius: 5.0,
                bob_base: 1.0,
                bob_amplitude: 1.2,
                trajectory: Trajectory::SinCos,
            },
            model: ModelConfig::default(),
            assets: AssetPaths::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub position: Vector3<f32>,
    /// Rotation around X (pitch), Y (yaw) and Z (roll).
    pub rotation: [Rad<f32>; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy: Deg(75.0),
            znear: 0.1,
            zfar: 1000.0,
            position: Vector3::new(0.0, 1.2, 6.0),
            rotation: [Rad(-0.12), Rad(0.0), Rad(0.0)],
        }
    }
}

/// Numeric precision hint. The bundled renderer maps it onto the depth buffer format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug)]
pub struct RendererSettings {
    pub antialias: bool,
    pub power_preference: wgpu::PowerPreference,
    pub precision: Precision,
    pub shadows: bool,
    /// Resolution scale applied right after creation, before any pointer input.
    pub initial_pixel_ratio: f32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            antialias: false,
            power_preference: wgpu::PowerPreference::HighPerformance,
            precision: Precision::Low,
            shadows: true,
            initial_pixel_ratio: 0.5,
        }
    }
}

/// How pointer movement maps onto the resolution scale and the primary light.
#[derive(Clone, Debug)]
pub struct PointerConfig {
    pub min_pixel_ratio: f32,
    pub max_pixel_ratio: f32,
    /// Half-extent of the square the primary light moves in.
    pub light_extent: f32,
    pub light_depth: f32,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            min_pixel_ratio: 0.3,
            max_pixel_ratio: 1.0,
            light_extent: 5.0,
            light_depth: 5.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LightConfig {
    pub color: wgpu::Color,
    pub intensity: f32,
    /// Zero means unlimited range.
    pub range: f32,
    pub decay: f32,
    pub cast_shadow: bool,
    /// Initial position; ignored for ambient lights.
    pub position: Vector3<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trajectory {
    /// x = cos, z = sin, bob = sin
    CosSin,
    /// x = sin, z = cos, bob = cos
    SinCos,
}

#[derive(Clone, Debug)]
pub struct OrbitConfig {
    /// Angle added per frame, in radians.
    pub step: f32,
    pub radius: f32,
    pub bob_base: f32,
    pub bob_amplitude: f32,
    pub trajectory: Trajectory,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub scale: f32,
    pub offset: Vector3<f32>,
    /// Y rotation added per frame once the model is attached, in radians.
    pub spin: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub reflectivity: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            scale: 0.5,
            offset: Vector3::new(0.0, -1.0, 0.0),
            spin: 0.005,
            metalness: 0.2,
            roughness: 0.35,
            reflectivity: 0.5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AssetPaths {
    pub texture: String,
    pub model: String,
    /// Directory holding the mesh decompression runtime.
    pub decoder: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            texture: "textures/marble.jpg".to_string(),
            model: "models/statue.glb".to_string(),
            decoder: "draco/".to_string(),
        }
    }
}
