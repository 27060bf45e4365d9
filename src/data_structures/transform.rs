//! Local transformation of a scene node.
//!
//! Rotations are kept as Euler angles so that per-axis increments (the model's
//! slow spin around Y) stay readable and exact.

use cgmath::{Euler, Matrix4, Quaternion, Rad, Vector3};

/// Position, rotation (XYZ Euler angles) and scale of a node relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Euler<Rad<f32>>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Euler::new(Rad(0.0), Rad(0.0), Rad(0.0)),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }

    /// Build from glTF-style decomposed parts (`[x, y, z, w]` quaternion).
    pub fn from_decomposed(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        let [x, y, z, w] = rotation;
        let quaternion = Quaternion::new(w, x, y, z);
        Self {
            position: translation.into(),
            rotation: Euler::from(quaternion),
            scale: scale.into(),
        }
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vector3::new(scale, scale, scale);
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(Quaternion::from(self.rotation))
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Transform as _};

    #[test]
    fn identity_matrix() {
        assert_eq!(Transform::new().to_matrix(), Matrix4::identity());
    }

    #[test]
    fn scale_then_translate() {
        let mut t = Transform::from_position(Vector3::new(0.0, -1.0, 0.0));
        t.set_uniform_scale(0.5);
        let p = t.to_matrix().transform_point(cgmath::Point3::new(2.0, 2.0, 2.0));
        assert!((p.x - 1.0).abs() < 1e-6);
        assert!((p.y - 0.0).abs() < 1e-6);
        assert!((p.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn decomposed_identity_rotation() {
        let t = Transform::from_decomposed([1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0], [1.0; 3]);
        assert_eq!(t.position, Vector3::new(1.0, 2.0, 3.0));
        assert!(t.rotation.x.0.abs() < 1e-6);
        assert!(t.rotation.y.0.abs() < 1e-6);
        assert!(t.rotation.z.0.abs() < 1e-6);
    }
}
