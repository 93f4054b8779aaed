//! Light subsystem
//!
//! Shadow-casting lights share one envelope, [`Light`], holding what every
//! variant has (color, intensity, the `dynamic` policy flag, a shadow map and
//! a GPU uniform block) and a [`LightKind`] with the per-variant geometry.
//! Non-shadow point lights are plain data, see [`PointLight`].
//!
//! Shadow policy: a dynamic light redraws its shadow map every time the
//! scene refreshes its lights; a static light draws it once and keeps it.

pub mod directional;
pub mod omni;
pub mod point;
pub mod shadow_map;
pub mod spot;

use bytemuck::{Pod, Zeroable};

pub use directional::DirectionalLight;
pub use omni::OmniLight;
pub use point::PointLight;
pub use shadow_map::ShadowMap;
pub use spot::SpotLight;

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::backend::{BufferHandle, GpuBackend, ProgramHandle};
use crate::render::error::BackendResult;
use crate::scene::camera::Camera;
use crate::scene::renderable::MeshInstance;

/// Per-variant light geometry
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    /// Parallel rays, orthographic shadow
    Directional(DirectionalLight),
    /// Cone from a point, perspective shadow
    Spot(SpotLight),
    /// Every direction from a point, cube shadow
    Omnidirectional(OmniLight),
}

/// Uniform block of a shadow-casting light
///
/// | field | directional | spot | omnidirectional |
/// |---|---|---|---|
/// | `position` | `(0, 0, 0, 0)` | `(p, 1)` | `(p, 1)` |
/// | `direction` | `(d, 0)` | `(d, cos(angle / 2))` | `(0, 0, 0, 0)` |
/// | `color` | `(c * i, 0)` | `(c * i, range)` | `(c * i, range)` |
/// | `depth_mvp` | bias * P * V | bias * P * V | P |
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightBlock {
    /// Position, `w = 1` for positional lights
    pub position: [f32; 4],
    /// Direction, `w` holds the spot cone cosine
    pub direction: [f32; 4],
    /// Premultiplied color, `w` holds the range
    pub color: [f32; 4],
    /// Shadow lookup matrix, column-major
    pub depth_mvp: [[f32; 4]; 4],
}

/// A shadow-casting light and the GPU resources it owns
#[derive(Debug, Clone)]
pub struct Light {
    /// Linear RGB color
    pub color: Vec3,
    /// Scalar multiplier applied to `color`
    pub intensity: f32,
    /// Redraw the shadow map on every light refresh instead of once
    pub dynamic: bool,
    kind: LightKind,
    shadow_map: ShadowMap,
    gpu_buffer: BufferHandle,
    shadow_rendered: bool,
}

impl Light {
    /// Create a light of `kind`, allocating its shadow map and uniform buffer.
    ///
    /// Omnidirectional lights get a cube shadow map. Lights start static.
    pub fn new(backend: &mut dyn GpuBackend, kind: LightKind, shadow_resolution: u32) -> BackendResult<Self> {
        let label = match &kind {
            LightKind::Directional(_) => "directional light",
            LightKind::Spot(_) => "spot light",
            LightKind::Omnidirectional(_) => "omni light",
        };
        let shadow_map = if matches!(kind, LightKind::Omnidirectional(_)) {
            ShadowMap::new_cube(backend, label, shadow_resolution)?
        } else {
            ShadowMap::new(backend, label, shadow_resolution)?
        };
        let gpu_buffer = backend.create_buffer(label)?;

        let mut light = Self {
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            dynamic: false,
            kind,
            shadow_map,
            gpu_buffer,
            shadow_rendered: false,
        };
        light.update_matrices(None);
        Ok(light)
    }

    /// Directional light shining along `direction`
    pub fn directional(backend: &mut dyn GpuBackend, direction: Vec3, shadow_resolution: u32) -> BackendResult<Self> {
        Self::new(backend, LightKind::Directional(DirectionalLight::new(direction)), shadow_resolution)
    }

    /// Spot light with a full cone `angle` (radians) and `range`
    pub fn spot(
        backend: &mut dyn GpuBackend,
        position: Vec3,
        direction: Vec3,
        range: f32,
        angle: f32,
        shadow_resolution: u32,
    ) -> BackendResult<Self> {
        Self::new(
            backend,
            LightKind::Spot(SpotLight::new(position, direction, range, angle)),
            shadow_resolution,
        )
    }

    /// Omnidirectional light with a cube shadow map
    pub fn omnidirectional(
        backend: &mut dyn GpuBackend,
        position: Vec3,
        range: f32,
        shadow_resolution: u32,
    ) -> BackendResult<Self> {
        Self::new(backend, LightKind::Omnidirectional(OmniLight::new(position, range)), shadow_resolution)
    }

    /// Builder-style color
    #[must_use]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Builder-style dynamic flag
    #[must_use]
    pub const fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// Variant geometry
    pub const fn kind(&self) -> &LightKind {
        &self.kind
    }

    /// Mutable variant geometry; call [`Light::update_matrices`] afterwards
    pub fn kind_mut(&mut self) -> &mut LightKind {
        &mut self.kind
    }

    /// Whether this light uses a cube shadow map
    pub const fn is_omnidirectional(&self) -> bool {
        matches!(self.kind, LightKind::Omnidirectional(_))
    }

    /// Owned shadow map
    pub const fn shadow_map(&self) -> &ShadowMap {
        &self.shadow_map
    }

    /// Uniform buffer holding [`Light::gpu_block`]
    pub const fn gpu_buffer(&self) -> BufferHandle {
        self.gpu_buffer
    }

    /// Whether the shadow map has been drawn at least once
    pub const fn shadow_rendered(&self) -> bool {
        self.shadow_rendered
    }

    /// Whether the next refresh must redraw the shadow map
    pub const fn needs_shadow_render(&self) -> bool {
        self.dynamic || !self.shadow_rendered
    }

    /// Force the next refresh to redraw the shadow map, even for static lights
    pub fn invalidate_shadow(&mut self) {
        self.shadow_rendered = false;
    }

    /// Whether the projection depends on the reference camera
    pub const fn follows_camera(&self) -> bool {
        matches!(&self.kind, LightKind::Directional(d) if d.fit_to_camera)
    }

    /// Recompute the shadow view/projection from the current geometry.
    ///
    /// Directional lights fit around `camera`'s frustum when given one.
    pub fn update_matrices(&mut self, camera: Option<&Camera>) {
        match &self.kind {
            LightKind::Directional(light) => {
                let (view, projection) = light.matrices(camera);
                self.shadow_map.set_matrices(view, projection);
            }
            LightKind::Spot(light) => {
                let (view, projection) = light.matrices();
                self.shadow_map.set_matrices(view, projection);
            }
            LightKind::Omnidirectional(light) => {
                let (views, projection) = light.matrices();
                self.shadow_map.set_cube_matrices(views, projection);
            }
        }
    }

    /// Render the shadow map from the light's point of view over all of `objects`
    pub fn draw_shadow_map(&mut self, objects: &[MeshInstance], backend: &mut dyn GpuBackend, program: ProgramHandle) {
        self.shadow_map.draw(objects, backend, program);
        self.shadow_rendered = true;
    }

    /// Shadow lookup matrix mapping world space to shadow texture space
    pub fn biased_depth_mvp(&self) -> Mat4 {
        Mat4::shadow_bias() * self.shadow_map.projection() * self.shadow_map.view()
    }

    /// Binary-packed uniform block
    pub fn gpu_block(&self) -> LightBlock {
        let color = self.color * self.intensity;
        match &self.kind {
            LightKind::Directional(light) => LightBlock {
                position: [0.0; 4],
                direction: light.direction().push(0.0).into(),
                color: color.push(0.0).into(),
                depth_mvp: self.biased_depth_mvp().into(),
            },
            LightKind::Spot(light) => LightBlock {
                position: light.position.push(1.0).into(),
                direction: light.direction().push((light.angle * 0.5).cos()).into(),
                color: color.push(light.range).into(),
                depth_mvp: self.biased_depth_mvp().into(),
            },
            LightKind::Omnidirectional(light) => LightBlock {
                position: light.position.push(1.0).into(),
                direction: [0.0; 4],
                color: color.push(light.range).into(),
                depth_mvp: self.shadow_map.projection().into(),
            },
        }
    }

    /// Upload [`Light::gpu_block`] into the light's buffer
    pub fn upload(&self, backend: &mut dyn GpuBackend) -> BackendResult<()> {
        backend.upload_buffer(self.gpu_buffer, bytemuck::bytes_of(&self.gpu_block()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use crate::render::recording::RecordingBackend;
    use approx::assert_relative_eq;

    #[test]
    fn test_block_layout() {
        assert_eq!(std::mem::size_of::<LightBlock>(), 112);
    }

    #[test]
    fn test_spot_block_and_bias() {
        let mut backend = RecordingBackend::new();
        let mut light = Light::spot(
            &mut backend,
            Vec3::new(45.0, 85.0, -20.0),
            Vec3::new(-45.0, -85.0, 20.0),
            150.0,
            std::f32::consts::FRAC_PI_2,
            512,
        )
        .unwrap()
        .with_color(Vec3::new(2.0, 2.0, 2.0));
        light.intensity = 0.5;

        let block = light.gpu_block();
        assert_eq!(block.position, [45.0, 85.0, -20.0, 1.0]);
        assert_eq!(block.color, [1.0, 1.0, 1.0, 150.0]);
        assert_relative_eq!(block.direction[3], std::f32::consts::FRAC_PI_4.cos(), epsilon = 1e-6);

        // A point straight ahead lands in the middle of the shadow texture
        let ahead = Point3::new(45.0, 85.0, -20.0) + Vec3::new(-45.0, -85.0, 20.0).normalize() * 10.0;
        let uv = light.biased_depth_mvp().transform_point(&ahead);
        assert_relative_eq!(uv.x, 0.5, epsilon = 1e-4);
        assert_relative_eq!(uv.y, 0.5, epsilon = 1e-4);
        assert!(uv.z > 0.0 && uv.z < 1.0);
    }

    #[test]
    fn test_shadow_resolution_fixed_and_only_matrices_change() {
        let mut backend = RecordingBackend::new();
        let mut light = Light::spot(&mut backend, Vec3::zeros(), -Vec3::y(), 20.0, 1.0, 1024).unwrap();
        let texture = light.shadow_map().texture();
        let before = light.shadow_map().view();
        let textures = backend.texture_count();

        if let LightKind::Spot(spot) = light.kind_mut() {
            spot.position = Vec3::new(0.0, 10.0, 0.0);
        }
        light.update_matrices(None);

        assert_eq!(light.shadow_map().texture(), texture);
        assert_eq!(light.shadow_map().resolution(), 1024);
        assert_eq!(backend.texture_count(), textures);
        assert_ne!(light.shadow_map().view(), before);
    }

    #[test]
    fn test_static_light_needs_one_render() {
        let mut backend = RecordingBackend::new();
        let program = backend.declare_program("ShadowDepth", &["DepthVP"], [1, 1, 1]);
        let mut light = Light::directional(&mut backend, Vec3::new(0.0, -1.0, 0.2), 256).unwrap();

        assert!(light.needs_shadow_render());
        light.draw_shadow_map(&[], &mut backend, program);
        assert!(!light.needs_shadow_render());

        light.dynamic = true;
        assert!(light.needs_shadow_render());
    }

    #[test]
    fn test_omni_light_gets_cube_map() {
        let mut backend = RecordingBackend::new();
        let light = Light::omnidirectional(&mut backend, Vec3::zeros(), 30.0, 256).unwrap();
        assert!(light.is_omnidirectional());
        assert!(light.shadow_map().is_cube());
        let desc = backend.texture_desc(light.shadow_map().texture()).unwrap();
        assert_eq!(desc.layers(), 6);
    }
}
