//! Skybox drawn behind the scene

use crate::foundation::math::Mat4;
use crate::render::backend::{set_uniform_or_log, GpuBackend, MeshHandle, ProgramHandle, TextureHandle, UniformValue};

/// Texture unit the cube map is sampled from
pub const SKYBOX_UNIT: u32 = 0;

/// Cube-mapped background
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skybox {
    mesh: MeshHandle,
    program: ProgramHandle,
    cubemap: Option<TextureHandle>,
}

impl Skybox {
    /// Skybox drawing the unit cube `mesh` with `program`
    pub const fn new(mesh: MeshHandle, program: ProgramHandle) -> Self {
        Self {
            mesh,
            program,
            cubemap: None,
        }
    }

    /// Whether a cube map is installed
    pub const fn is_loaded(&self) -> bool {
        self.cubemap.is_some()
    }

    /// Installed cube map
    pub const fn cubemap(&self) -> Option<TextureHandle> {
        self.cubemap
    }

    /// Install a cube map (for example a baked probe)
    pub fn set_cubemap(&mut self, cubemap: TextureHandle) {
        self.cubemap = Some(cubemap);
    }

    /// Draw around the viewer; the translation of `view` is ignored
    pub fn draw(&self, backend: &mut dyn GpuBackend, projection: &Mat4, view: &Mat4) {
        let Some(cubemap) = self.cubemap else {
            return;
        };
        let mut rotation_only = *view;
        rotation_only.fixed_view_mut::<3, 1>(0, 3).fill(0.0);

        backend.use_program(self.program);
        set_uniform_or_log(backend, self.program, "Projection", UniformValue::Mat4(*projection));
        set_uniform_or_log(backend, self.program, "View", UniformValue::Mat4(rotation_only));
        set_uniform_or_log(backend, self.program, "SkyBox", UniformValue::Int(SKYBOX_UNIT as i32));
        backend.bind_texture(SKYBOX_UNIT, cubemap);
        backend.draw_mesh(self.mesh, &Mat4::identity());
        backend.use_none();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::recording::RecordingBackend;

    #[test]
    fn test_unloaded_skybox_draws_nothing() {
        let mut backend = RecordingBackend::new();
        let skybox = Skybox::new(MeshHandle(0), ProgramHandle(0));
        skybox.draw(&mut backend, &Mat4::identity(), &Mat4::identity());
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_view_translation_is_stripped() {
        let mut backend = RecordingBackend::new();
        let program = backend.declare_program("Skybox", &["Projection", "View", "SkyBox"], [1, 1, 1]);
        let mut skybox = Skybox::new(MeshHandle(0), program);
        skybox.set_cubemap(TextureHandle(3));

        let view = Mat4::new_translation(&Vec3::new(5.0, 6.0, 7.0));
        skybox.draw(&mut backend, &Mat4::identity(), &view);

        assert_eq!(backend.uniform(program, "View"), Some(UniformValue::Mat4(Mat4::identity())));
    }
}
