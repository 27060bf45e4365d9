//! Perspective camera with an explicit position and rotation.
//!
//! The camera does not follow a target; it is placed once at mount and never
//! moves afterwards.

use cgmath::{Deg, Euler, Matrix4, Point3, Quaternion, Rad, SquareMatrix, Vector3, perspective};

use crate::config::CameraConfig;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub fovy: Deg<f32>,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
    pub position: Point3<f32>,
    pub rotation: Euler<Rad<f32>>,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let [x, y, z] = config.rotation;
        Self {
            fovy: config.fovy,
            aspect,
            znear: config.znear,
            zfar: config.zfar,
            position: Point3::new(config.position.x, config.position.y, config.position.z),
            rotation: Euler::new(x, y, z),
        }
    }

    /// World-to-camera matrix, the inverse of the camera's own placement.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let placement = Matrix4::from_translation(self.position - Point3::new(0.0, 0.0, 0.0))
            * Matrix4::from(Quaternion::from(self.rotation));
        placement.invert().unwrap_or_else(Matrix4::identity)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    /// Direction the camera looks at in world space.
    pub fn forward(&self) -> Vector3<f32> {
        Quaternion::from(self.rotation) * Vector3::new(0.0, 0.0, -1.0)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &PerspectiveCamera) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = camera.view_proj().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}
