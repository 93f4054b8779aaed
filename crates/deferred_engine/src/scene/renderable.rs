//! Renderable objects: a mesh, a material and a model transform

use crate::foundation::collections::TransformKey;
use crate::foundation::math::Mat4;
use crate::render::backend::{set_uniform_or_log, GpuBackend, MeshHandle, ProgramHandle, UniformValue};
use crate::scene::bounds::{Frustum, AABB};

/// A shading program together with the uniform values it is drawn with
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    program: ProgramHandle,
    uniforms: Vec<(String, UniformValue)>,
}

impl Material {
    /// Material drawn with `program` and no uniforms
    pub const fn new(program: ProgramHandle) -> Self {
        Self {
            program,
            uniforms: Vec::new(),
        }
    }

    /// Shading program
    pub const fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Replace the shading program
    pub fn set_program(&mut self, program: ProgramHandle) {
        self.program = program;
    }

    /// Set (or replace) a named uniform
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match self.uniforms.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some((_, slot)) => *slot = value,
            None => self.uniforms.push((name.to_string(), value)),
        }
    }

    /// Builder-style [`Material::set_uniform`]
    #[must_use]
    pub fn with_uniform(mut self, name: &str, value: UniformValue) -> Self {
        self.set_uniform(name, value);
        self
    }

    /// Value of a named uniform
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.iter().find(|(n, _)| n.as_str() == name).map(|(_, v)| *v)
    }

    /// Bind the program (or `program_override`) and assign every uniform.
    ///
    /// Uniforms the program does not declare are logged and skipped.
    pub fn apply(&self, backend: &mut dyn GpuBackend, program_override: Option<ProgramHandle>) {
        let program = program_override.unwrap_or(self.program);
        backend.use_program(program);
        for (name, value) in &self.uniforms {
            set_uniform_or_log(backend, program, name, *value);
        }
    }
}

/// One drawable instance of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    /// Geometry supplied by the asset loader
    pub mesh: MeshHandle,
    /// Shading
    pub material: Material,
    model: Mat4,
    transform: Option<TransformKey>,
    bounds: AABB,
}

impl MeshInstance {
    /// Instance with a fixed model matrix and object-space `bounds`
    pub const fn new(mesh: MeshHandle, material: Material, model: Mat4, bounds: AABB) -> Self {
        Self {
            mesh,
            material,
            model,
            transform: None,
            bounds,
        }
    }

    /// Follow a node of the scene's transform graph
    #[must_use]
    pub const fn with_transform(mut self, key: TransformKey) -> Self {
        self.transform = Some(key);
        self
    }

    /// Transform node driving the model matrix, if any
    pub const fn transform(&self) -> Option<TransformKey> {
        self.transform
    }

    /// Model (object-to-world) matrix
    pub const fn model(&self) -> &Mat4 {
        &self.model
    }

    /// Replace the model matrix, returning whether it changed
    pub fn set_model(&mut self, model: Mat4) -> bool {
        let changed = self.model != model;
        self.model = model;
        changed
    }

    /// Object-space bounds
    pub const fn bounds(&self) -> &AABB {
        &self.bounds
    }

    /// World-space bounds
    pub fn world_bounds(&self) -> AABB {
        self.bounds.transformed(&self.model)
    }

    /// Whether the bounds intersect the frustum of `projection * view`
    pub fn is_visible(&self, projection: &Mat4, view: &Mat4) -> bool {
        self.is_visible_in(&Frustum::from_projection_view(projection, view))
    }

    /// Whether the bounds intersect `frustum`
    pub fn is_visible_in(&self, frustum: &Frustum) -> bool {
        frustum.intersects_aabb(&self.world_bounds())
    }

    /// Draw with the object's own material
    pub fn draw(&self, backend: &mut dyn GpuBackend) {
        self.material.apply(backend, None);
        backend.draw_mesh(self.mesh, &self.model);
    }

    /// Draw with the material's uniforms on another program
    pub fn draw_with_program(&self, backend: &mut dyn GpuBackend, program: ProgramHandle) {
        self.material.apply(backend, Some(program));
        backend.draw_mesh(self.mesh, &self.model);
    }

    /// Draw geometry only, with whatever program is bound (depth passes)
    pub fn draw_geometry(&self, backend: &mut dyn GpuBackend) {
        backend.draw_mesh(self.mesh, &self.model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4Ext, Vec3};
    use crate::render::recording::{GpuCommand, RecordingBackend};

    fn cube_at(x: f32) -> MeshInstance {
        MeshInstance::new(
            MeshHandle(1),
            Material::new(ProgramHandle(0)),
            Mat4::new_translation(&Vec3::new(x, 0.0, -10.0)),
            AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)),
        )
    }

    #[test]
    fn test_missing_uniform_is_skipped_not_fatal() {
        let mut backend = RecordingBackend::new();
        let program = backend.declare_program("GBuffer", &["R"], [1, 1, 1]);
        let material = Material::new(program)
            .with_uniform("R", UniformValue::Float(0.95))
            .with_uniform("F0", UniformValue::Float(0.15));

        material.apply(&mut backend, None);

        assert_eq!(backend.uniform(program, "R"), Some(UniformValue::Float(0.95)));
        assert_eq!(backend.uniform(program, "F0"), None);
        assert_eq!(backend.commands()[0], GpuCommand::UseProgram(program));
    }

    #[test]
    fn test_set_uniform_replaces() {
        let material = Material::new(ProgramHandle(0))
            .with_uniform("R", UniformValue::Float(0.1))
            .with_uniform("R", UniformValue::Float(0.2));
        assert_eq!(material.uniform("R"), Some(UniformValue::Float(0.2)));
    }

    #[test]
    fn test_visibility() {
        let projection = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.5, 100.0);
        let view = Mat4::identity();
        assert!(cube_at(0.0).is_visible(&projection, &view));
        assert!(!cube_at(40.0).is_visible(&projection, &view));
    }
}
