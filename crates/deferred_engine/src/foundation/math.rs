//! Math utilities and types
//!
//! Provides the fundamental math types shared by the transform graph, the
//! light subsystem and the pipeline. All projection helpers follow OpenGL
//! clip-space conventions (right-handed view space looking down -Z, depth
//! mapped to [-1, 1]) because the shading programs consume them unchanged.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, UnitQuaternion, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
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
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform from its three components
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Convert to a transformation matrix (`T * R * S`)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose an affine transformation matrix into scale, rotation and position.
    ///
    /// Shear and perspective terms are discarded. A negative determinant is
    /// folded into the X scale so the remaining basis is a proper rotation.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let basis = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let mut scale = Vec3::new(
            basis.column(0).magnitude(),
            basis.column(1).magnitude(),
            basis.column(2).magnitude(),
        );
        if basis.determinant() < 0.0 {
            scale.x = -scale.x;
        }

        let safe = |s: f32| if s.abs() > f32::EPSILON { s } else { 1.0 };
        let rotation_matrix = Mat3::from_columns(&[
            basis.column(0) / safe(scale.x),
            basis.column(1) / safe(scale.y),
            basis.column(2) / safe(scale.z),
        ]);
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Number of workgroups needed to cover `extent` invocations.
    pub fn dispatch_groups(extent: u32, workgroup: u32) -> u32 {
        extent.div_ceil(workgroup.max(1))
    }
}

/// Extension trait for Mat4 with the projection helpers used by cameras and lights
pub trait Mat4Ext {
    /// Right-handed perspective projection (`fov_y` in radians)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed orthographic projection
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Maps clip-space [-1, 1] to texture-space [0, 1] (shadow lookups)
    fn shadow_bias() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &stable_up(target - eye, up))
    }

    #[rustfmt::skip]
    fn shadow_bias() -> Mat4 {
        Mat4::new(
            0.5, 0.0, 0.0, 0.5,
            0.0, 0.5, 0.0, 0.5,
            0.0, 0.0, 0.5, 0.5,
            0.0, 0.0, 0.0, 1.0,
        )
    }
}

/// Picks an up vector that is not parallel to `forward`.
pub fn stable_up(forward: Vec3, up: Vec3) -> Vec3 {
    if forward.normalize().cross(&up.normalize()).magnitude_squared() < 1e-8 {
        if up.z.abs() < 0.9 {
            Vec3::z()
        } else {
            Vec3::x()
        }
    } else {
        up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_matrix_decomposition_roundtrip() {
        let original = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Unit::new_normalize(Vec3::new(1.0, 1.0, 1.0)), 0.5),
            Vec3::new(2.0, 1.5, 0.8),
        );

        let decomposed = Transform::from_matrix(original.to_matrix());

        assert_relative_eq!(decomposed.position, original.position, epsilon = 1e-5);
        assert_relative_eq!(decomposed.scale, original.scale, epsilon = 1e-5);
        // Quaternions might flip sign but represent same rotation
        let dot = original.rotation.coords.dot(&decomposed.rotation.coords);
        assert!(dot.abs() > 0.999, "Quaternion rotation mismatch: dot product = {dot}");
    }

    #[test]
    fn test_shadow_bias_maps_clip_corners() {
        let bias = Mat4::shadow_bias();
        let low = bias.transform_point(&Point3::new(-1.0, -1.0, -1.0));
        let high = bias.transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(low.coords, Vec3::zeros(), epsilon = 1e-6);
        assert_relative_eq!(high.coords, Vec3::new(1.0, 1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_dispatch_groups_rounds_up() {
        assert_eq!(utils::dispatch_groups(1024, 32), 32);
        assert_eq!(utils::dispatch_groups(1366, 32), 43);
        assert_eq!(utils::dispatch_groups(1, 16), 1);
    }

    #[test]
    fn test_look_at_straight_down_is_finite() {
        let view = Mat4::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::zeros(), Vec3::y());
        assert!(view.iter().all(|v| v.is_finite()));
    }
}
