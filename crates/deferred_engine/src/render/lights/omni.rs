//! Omnidirectional shadow-casting lights
//!
//! Shadows render into a cube map, one layer per face, in the usual cube map
//! face order (+X, -X, +Y, -Y, +Z, -Z).

use crate::foundation::math::{constants, Mat4, Mat4Ext, Vec3};

/// Near plane of the cube shadow projection
const OMNI_NEAR: f32 = 0.5;

/// Face directions and up vectors in cube map layer order
const CUBE_FACES: [([f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, -1.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
    ([0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
];

/// View matrices of the six cube faces seen from `position`
pub fn cube_face_views(position: Vec3) -> [Mat4; 6] {
    CUBE_FACES.map(|(direction, up)| Mat4::look_at(position, position + Vec3::from(direction), Vec3::from(up)))
}

/// 90 degree square projection used for every cube face
pub fn cube_projection(near: f32, far: f32) -> Mat4 {
    Mat4::perspective(constants::HALF_PI, 1.0, near, far)
}

/// Point light casting shadows in every direction
#[derive(Debug, Clone, PartialEq)]
pub struct OmniLight {
    /// World-space position
    pub position: Vec3,
    /// Distance after which the light has no effect
    pub range: f32,
}

impl OmniLight {
    /// Omnidirectional light at `position`
    pub const fn new(position: Vec3, range: f32) -> Self {
        Self { position, range }
    }

    /// Face views and shared projection
    pub fn matrices(&self) -> ([Mat4; 6], Mat4) {
        (
            cube_face_views(self.position),
            cube_projection(OMNI_NEAR, self.range.max(OMNI_NEAR * 2.0)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use approx::assert_relative_eq;

    #[test]
    fn test_each_face_looks_down_its_axis() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let views = cube_face_views(position);
        for (view, (direction, _)) in views.iter().zip(CUBE_FACES) {
            let ahead = view.transform_point(&Point3::from(position + Vec3::from(direction)));
            // Straight ahead in view space is -Z
            assert_relative_eq!(ahead.coords, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        }
    }
}
