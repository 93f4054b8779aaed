//! Spot lights: positioned, cone-limited, perspective shadow projection

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Near plane of spot shadow projections
const SPOT_NEAR: f32 = 0.5;

/// Light emitted from a point inside a cone
#[derive(Debug, Clone, PartialEq)]
pub struct SpotLight {
    /// World-space position
    pub position: Vec3,
    direction: Vec3,
    /// Distance after which the light has no effect (shadow far plane)
    pub range: f32,
    /// Full cone angle in radians (shadow field of view)
    pub angle: f32,
}

impl SpotLight {
    /// Spot light at `position` pointing along `direction`
    pub fn new(position: Vec3, direction: Vec3, range: f32, angle: f32) -> Self {
        Self {
            position,
            direction: direction.try_normalize(f32::EPSILON).unwrap_or(-Vec3::y()),
            range,
            angle,
        }
    }

    /// Pointing direction (unit length)
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Change the direction, ignoring zero-length input
    pub fn set_direction(&mut self, direction: Vec3) {
        if let Some(direction) = direction.try_normalize(f32::EPSILON) {
            self.direction = direction;
        }
    }

    /// Aim the light at `target`
    pub fn look_at(&mut self, target: Vec3) {
        self.set_direction(target - self.position);
    }

    /// View and projection of the shadow frustum
    pub fn matrices(&self) -> (Mat4, Mat4) {
        let view = Mat4::look_at(self.position, self.position + self.direction, Vec3::y());
        let projection = Mat4::perspective(self.angle, 1.0, SPOT_NEAR, self.range.max(SPOT_NEAR * 2.0));
        (view, projection)
    }
}
