//! Non-shadow-casting point lights
//!
//! These carry no GPU resources of their own. The scene packs all of them
//! into one buffer bound at [`POINT_LIGHT_SLOT`](crate::render::binding::POINT_LIGHT_SLOT).

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Vec3;

/// `{ vec3 position; float radius; vec3 color; float pad; }`, std140/std430 compatible
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PointLight {
    /// World-space position
    pub position: [f32; 3],
    /// Influence radius
    pub radius: f32,
    /// Linear RGB color, intensity premultiplied
    pub color: [f32; 3],
    /// Keeps the struct 16-byte aligned
    pub padding: f32,
}

impl PointLight {
    /// Create a point light
    pub fn new(position: Vec3, radius: f32, color: Vec3) -> Self {
        Self {
            position: position.into(),
            radius,
            color: color.into(),
            padding: 0.0,
        }
    }

    /// Position as a vector
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    /// Move the light
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position.into();
    }

    /// Color as a vector
    pub fn color(&self) -> Vec3 {
        Vec3::from(self.color)
    }

    /// Change the color
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_two_vec4() {
        assert_eq!(std::mem::size_of::<PointLight>(), 32);
        let light = PointLight::new(Vec3::new(1.0, 2.0, 3.0), 10.0, Vec3::new(0.5, 0.25, 0.125));
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&light));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 10.0, 0.5, 0.25, 0.125, 0.0]);
    }
}
