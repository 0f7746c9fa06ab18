//! Math utilities and types
//!
//! nalgebra aliases used by the constant records, the camera and the render
//! item transforms. Matrices are column-major; `to_gpu_matrix` hands them to
//! constant records in the same layout GLSL `mat4` expects.

pub use nalgebra::{Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Translate / rotate / scale composition of a render item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in world space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Per-axis scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Transform with only a translation
    pub fn from_translation(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Replace the scale, keeping position and rotation
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Replace the rotation, keeping position and scale
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Move by `offset` in world space
    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// Rotate about the world Y axis
    pub fn rotate_y(&mut self, radians: f32) {
        self.rotation = Quat::from_axis_angle(&Vec3::y_axis(), radians) * self.rotation;
    }

    /// World matrix: translation * rotation * scale
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Column-major array layout used by every constant record
pub fn to_gpu_matrix(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

/// Inverse of `matrix`, or identity when it is singular
pub fn inverse_or_identity(matrix: &Mat4) -> Mat4 {
    matrix.try_inverse().unwrap_or_else(Mat4::identity)
}

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Clamp a value between min and max
    pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
        value.max(min).min(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_transform_matrix_composition_order() {
        let transform = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(Vec3::new(2.0, 2.0, 2.0));
        let moved = transform.to_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));

        // Scale applies before translation
        assert_relative_eq!(moved.x, 3.0, epsilon = EPSILON);
        assert_relative_eq!(moved.y, 2.0, epsilon = EPSILON);
        assert_relative_eq!(moved.z, 3.0, epsilon = EPSILON);
    }

    #[test]
    fn test_rotate_y_quarter_turn() {
        let mut transform = Transform::identity();
        transform.rotate_y(std::f32::consts::FRAC_PI_2);
        let turned = transform.to_matrix().transform_vector(&Vec3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(turned.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(turned.z, -1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_gpu_matrix_is_column_major() {
        let matrix = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0));
        let columns = to_gpu_matrix(&matrix);

        assert_relative_eq!(columns[3][0], 4.0);
        assert_relative_eq!(columns[3][1], 5.0);
        assert_relative_eq!(columns[3][2], 6.0);
        assert_relative_eq!(columns[3][3], 1.0);
    }

    #[test]
    fn test_singular_inverse_falls_back_to_identity() {
        let singular = Mat4::zeros();
        assert_eq!(inverse_or_identity(&singular), Mat4::identity());
    }
}
