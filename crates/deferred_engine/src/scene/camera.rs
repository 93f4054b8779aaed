//! # Camera
//!
//! Perspective camera feeding the G-buffer pass, visibility tests and
//! directional shadow fitting.
//!
//! ## Conventions
//! - Right-handed, Y-up world space
//! - View space looks down -Z (OpenGL convention)
//! - Clip-space depth in [-1, 1]
//!
//! Matrices are computed on demand. The camera stores a direction rather
//! than a look-at target so it can be steered by orientation alone.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{utils, Mat4, Mat4Ext, Point3, Vec3};
use crate::scene::bounds::Frustum;

/// Perspective camera
///
/// # Coordinate System
/// Uses standard right-handed Y-up coordinate system in view space:
/// - X+ = Right
/// - Y+ = Up
/// - Z- = Forward
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Normalized viewing direction
    direction: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,

    /// Aspect ratio (width / height) for projection calculations
    pub aspect: f32,

    /// Distance to near clipping plane
    pub near: f32,

    /// Distance to far clipping plane
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::zeros(), 60.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl Camera {
    /// Create a new perspective camera looking down -Z
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view angle in degrees
    /// * `aspect` - Aspect ratio (width / height) of the viewport
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    ///
    /// # Example
    /// ```rust
    /// use deferred_engine::foundation::math::Vec3;
    /// use deferred_engine::scene::Camera;
    ///
    /// let mut camera = Camera::perspective(Vec3::new(0.0, 2.0, 5.0), 75.0, 16.0 / 9.0, 0.1, 100.0);
    /// camera.look_at(Vec3::zeros());
    /// assert!(camera.direction().z < 0.0);
    /// ```
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            direction: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::y(),
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        }
    }

    /// Update camera position in world space
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {position:?}");
    }

    /// Viewing direction (unit length)
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Point the camera along `direction`
    ///
    /// Zero-length directions are ignored.
    pub fn set_direction(&mut self, direction: Vec3) {
        if let Some(direction) = direction.try_normalize(f32::EPSILON) {
            self.direction = direction;
        } else {
            log::warn!("Ignoring zero-length camera direction");
        }
    }

    /// Turn the camera towards `target`
    pub fn look_at(&mut self, target: Vec3) {
        self.set_direction(target - self.position);
    }

    /// Point the camera looking at `target`
    pub fn target(&self) -> Vec3 {
        self.position + self.direction
    }

    /// Update camera aspect ratio for viewport changes
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if (self.aspect - aspect).abs() > 0.01 {
            log::debug!("Camera aspect ratio changed: {:.3} -> {aspect:.3}", self.aspect);
        }
        self.aspect = aspect;
    }

    /// World-to-view transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target(), self.up)
    }

    /// View-to-clip transform
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect, self.near, self.far)
    }

    /// Combined `projection * view`
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Visibility frustum in world space
    pub fn frustum(&self) -> Frustum {
        Frustum::from_matrix(&self.view_projection_matrix())
    }

    /// World-space corners of the view frustum, near plane first
    ///
    /// Order per plane: bottom-left, bottom-right, top-left, top-right.
    /// Directional lights fit their shadow projection around these.
    pub fn frustum_corners(&self) -> [Vec3; 8] {
        let inverse = self
            .view_projection_matrix()
            .try_inverse()
            .unwrap_or_else(Mat4::identity);
        let mut corners = [Vec3::zeros(); 8];
        let mut i = 0;
        for z in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for x in [-1.0, 1.0] {
                    corners[i] = inverse.transform_point(&Point3::new(x, y, z)).coords;
                    i += 1;
                }
            }
        }
        corners
    }

    /// Block uploaded to the camera binding slot
    pub fn gpu_data(&self) -> GpuViewProjection {
        GpuViewProjection::new(&self.view_matrix(), &self.projection_matrix())
    }
}

/// `{ mat4 view; mat4 projection; }` camera block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuViewProjection {
    /// World-to-view, column-major
    pub view: [[f32; 4]; 4],
    /// View-to-clip, column-major
    pub projection: [[f32; 4]; 4],
}

impl GpuViewProjection {
    /// Pack a view/projection pair
    pub fn new(view: &Mat4, projection: &Mat4) -> Self {
        Self {
            view: (*view).into(),
            projection: (*projection).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_look_at_normalizes_direction() {
        let mut camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 0.0, -5.0));
        assert_relative_eq!(camera.direction(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);

        camera.set_direction(Vec3::zeros());
        assert_relative_eq!(camera.direction(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_frustum_corners_lie_on_near_and_far_planes() {
        let camera = Camera::perspective(Vec3::new(1.0, 2.0, 3.0), 90.0, 1.0, 1.0, 50.0);
        let corners = camera.frustum_corners();

        for corner in &corners[..4] {
            assert_relative_eq!(corner.z, 3.0 - 1.0, epsilon = 1e-3);
        }
        for corner in &corners[4..] {
            assert_relative_eq!(corner.z, 3.0 - 50.0, epsilon = 5e-2);
        }
        // 90 degree fov, aspect 1: far half-extent equals far distance
        assert_relative_eq!(corners[7].x - 1.0, 50.0, epsilon = 5e-2);
    }

    #[test]
    fn test_gpu_block_is_two_matrices() {
        assert_eq!(std::mem::size_of::<GpuViewProjection>(), 128);
        let camera = Camera::default();
        let block = camera.gpu_data();
        assert_relative_eq!(block.view[3][2], camera.view_matrix()[(2, 3)]);
    }
}
