//! Directional (orthographic) lights

use crate::foundation::math::{stable_up, Mat4, Mat4Ext, Vec3};
use crate::scene::camera::Camera;

/// Extra depth in front of the fitted volume so casters outside the view still shadow it
const CASTER_MARGIN: f32 = 50.0;

/// Light with parallel rays and an orthographic shadow projection
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    direction: Vec3,
    /// Fit the projection around the reference camera's frustum when one is given
    pub fit_to_camera: bool,
    /// Center of the fallback shadow volume
    pub position: Vec3,
    /// Half-extent of the fallback shadow volume
    pub size: f32,
    /// Near plane of the fallback shadow volume
    pub near: f32,
    /// Far plane of the fallback shadow volume
    pub far: f32,
}

impl DirectionalLight {
    /// Light shining along `direction`
    pub fn new(direction: Vec3) -> Self {
        Self {
            direction: direction.try_normalize(f32::EPSILON).unwrap_or(-Vec3::y()),
            fit_to_camera: true,
            position: Vec3::zeros(),
            size: 50.0,
            near: 1.0,
            far: 500.0,
        }
    }

    /// Direction the light travels (unit length)
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Change the direction, ignoring zero-length input
    pub fn set_direction(&mut self, direction: Vec3) {
        if let Some(direction) = direction.try_normalize(f32::EPSILON) {
            self.direction = direction;
        }
    }

    /// View and projection of the shadow volume
    pub fn matrices(&self, camera: Option<&Camera>) -> (Mat4, Mat4) {
        match camera {
            Some(camera) if self.fit_to_camera => self.fit(&camera.frustum_corners()),
            _ => self.fallback(),
        }
    }

    /// Fixed box of `size` around `position`
    fn fallback(&self) -> (Mat4, Mat4) {
        let eye = self.position - self.direction * (self.near + self.far) * 0.5;
        let view = Mat4::look_at(eye, eye + self.direction, Vec3::y());
        let projection = Mat4::orthographic(-self.size, self.size, -self.size, self.size, self.near, self.far);
        (view, projection)
    }

    /// Tight orthographic box around `corners`, seen along the light direction
    fn fit(&self, corners: &[Vec3; 8]) -> (Mat4, Mat4) {
        let center = corners.iter().sum::<Vec3>() / 8.0;
        let radius = corners
            .iter()
            .map(|c| (c - center).magnitude())
            .fold(0.0_f32, f32::max);

        let eye = center - self.direction * (radius + CASTER_MARGIN);
        let up = stable_up(self.direction, Vec3::y());
        let view = Mat4::look_at(eye, center, up);

        let mut min = Vec3::repeat(f32::MAX);
        let mut max = Vec3::repeat(f32::MIN);
        for corner in corners {
            let p = view.transform_point(&(*corner).into()).coords;
            min = min.inf(&p);
            max = max.sup(&p);
        }
        // View space looks down -Z: nearest point has the largest z
        let projection = Mat4::orthographic(min.x, max.x, min.y, max.y, (-max.z - CASTER_MARGIN).max(0.0), -min.z);
        (view, projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;

    #[test]
    fn test_fitted_volume_contains_camera_frustum() {
        let mut camera = Camera::perspective(Vec3::new(0.0, 15.0, -20.0), 60.0, 16.0 / 9.0, 0.1, 200.0);
        camera.look_at(Vec3::new(0.0, 5.0, 0.0));
        let light = DirectionalLight::new(Vec3::new(-1.0, -2.0, 0.5));

        let (view, projection) = light.matrices(Some(&camera));
        let vp = projection * view;
        for corner in camera.frustum_corners() {
            let clip = vp.transform_point(&Point3::from(corner));
            for v in clip.coords.iter() {
                assert!(v.abs() <= 1.0 + 1e-3, "corner {corner:?} maps outside clip space: {clip:?}");
            }
        }
    }

    #[test]
    fn test_fallback_without_camera() {
        let light = DirectionalLight::new(Vec3::new(0.0, -1.0, 0.0));
        let (view, projection) = light.matrices(None);
        let clip = (projection * view).transform_point(&Point3::new(10.0, 0.0, -10.0));
        assert!(clip.coords.iter().all(|v| v.abs() <= 1.0));
        assert!(view.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_direction_is_ignored() {
        let mut light = DirectionalLight::new(Vec3::x());
        light.set_direction(Vec3::zeros());
        assert_eq!(light.direction(), Vec3::x());
    }
}
