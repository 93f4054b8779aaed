//! Deferred lighting compute batch
//!
//! Shared by the main frame and probe baking. [`LightingPass::prepare`]
//! assigns everything that stays constant across dispatches (G-buffer image
//! units, shadow map samplers, light counts, post settings). Each
//! [`LightingPass::dispatch`] rebinds the three image units, optionally to a
//! single cube face, and launches one grid covering the target.
//!
//! Channel 0 is read and overwritten with the lit colour, channel 1 is read
//! and its alpha reused for ambient occlusion, channel 2 is read only.

use crate::foundation::math::{utils, Vec3};
use crate::render::backend::{
    set_uniform_or_log, GpuBackend, ImageAccess, ImageBinding, ProgramHandle, TextureHandle, UniformValue,
};
use crate::render::binding::{self, GBUFFER_CHANNELS};
use crate::render::post::PostProcessSettings;
use crate::scene::Scene;

const CHANNEL_UNIFORMS: [&str; GBUFFER_CHANNELS as usize] = ["ColorMaterial", "PositionDepth", "Normal"];

const CHANNEL_ACCESS: [ImageAccess; GBUFFER_CHANNELS as usize] =
    [ImageAccess::ReadWrite, ImageAccess::ReadWrite, ImageAccess::ReadOnly];

/// The `DeferredShadowCS` program and how to drive it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightingPass {
    program: ProgramHandle,
}

impl LightingPass {
    /// Wrap a linked lighting program
    pub const fn new(program: ProgramHandle) -> Self {
        Self { program }
    }

    /// Underlying program
    pub const fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Make the program current and assign the per-batch inputs
    pub fn prepare(
        &self,
        backend: &mut dyn GpuBackend,
        scene: &Scene,
        settings: &PostProcessSettings,
        camera_position: Vec3,
    ) {
        let program = self.program;
        backend.use_program(program);

        for (unit, name) in CHANNEL_UNIFORMS.iter().enumerate() {
            set_uniform_or_log(backend, program, name, UniformValue::Int(unit as i32));
        }

        for (i, light) in scene.lights().iter().enumerate() {
            let unit = binding::shadow_map_unit(i);
            backend.bind_texture(unit, light.shadow_map().texture());
            set_uniform_or_log(backend, program, &format!("ShadowMaps[{i}]"), UniformValue::Int(unit as i32));
        }
        for (i, light) in scene.omni_lights().iter().enumerate() {
            let unit = binding::omni_shadow_map_unit(scene.lights().len(), i);
            backend.bind_texture(unit, light.shadow_map().texture());
            set_uniform_or_log(
                backend,
                program,
                &format!("OmniShadowMaps[{i}]"),
                UniformValue::Int(unit as i32),
            );
        }

        let counts = [
            ("ShadowCount", scene.lights().len()),
            ("OmniCount", scene.omni_lights().len()),
            ("LightCount", scene.point_lights().len()),
        ];
        for (name, count) in counts {
            set_uniform_or_log(backend, program, name, UniformValue::Int(count as i32));
        }
        set_uniform_or_log(backend, program, "CameraPosition", UniformValue::Vec3(camera_position));
        settings.apply_lighting(backend, program);
    }

    /// Bind the G-buffer images (or one layer of them) and dispatch over `size`.
    ///
    /// Returns the workgroup grid.
    pub fn dispatch(
        &self,
        backend: &mut dyn GpuBackend,
        channels: &[TextureHandle; GBUFFER_CHANNELS as usize],
        layer: Option<u32>,
        size: (u32, u32),
    ) -> [u32; 3] {
        for (unit, (texture, access)) in channels.iter().zip(CHANNEL_ACCESS).enumerate() {
            let image = match layer {
                Some(layer) => ImageBinding::layer(*texture, layer, access),
                None => ImageBinding::whole(*texture, access),
            };
            backend.bind_image(unit as u32, image);
        }

        let [wx, wy, _] = backend.workgroup_size(self.program);
        let groups = [utils::dispatch_groups(size.0, wx), utils::dispatch_groups(size.1, wy), 1];
        log::trace!("Lighting dispatch {groups:?} over {}x{} (layer {layer:?})", size.0, size.1);
        backend.dispatch(self.program, groups);
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::lights::{Light, PointLight};
    use crate::render::recording::{GpuCommand, RecordingBackend};

    fn lighting_program(backend: &mut RecordingBackend) -> ProgramHandle {
        backend.declare_program(
            "DeferredShadowCS",
            &[
                "ColorMaterial",
                "PositionDepth",
                "Normal",
                "ShadowMaps[0]",
                "ShadowMaps[1]",
                "ShadowCount",
                "OmniCount",
                "LightCount",
                "CameraPosition",
                "Exposure",
                "Bloom",
            ],
            [32, 32, 1],
        )
    }

    #[test]
    fn test_shadow_maps_bound_after_gbuffer_units() {
        let mut backend = RecordingBackend::new();
        let program = lighting_program(&mut backend);
        let mut scene = Scene::new();
        let a = Light::directional(&mut backend, -Vec3::y(), 256).unwrap();
        let b = Light::directional(&mut backend, Vec3::new(1.0, -1.0, 0.0), 256).unwrap();
        let textures = [a.shadow_map().texture(), b.shadow_map().texture()];
        scene.add_light(a);
        scene.add_light(b);
        scene.add_point_light(PointLight::new(Vec3::zeros(), 10.0, Vec3::new(1.0, 1.0, 1.0)));

        let pass = LightingPass::new(program);
        pass.prepare(&mut backend, &scene, &PostProcessSettings::default(), Vec3::new(1.0, 2.0, 3.0));

        assert!(backend.commands().contains(&GpuCommand::BindTexture { unit: 3, texture: textures[0] }));
        assert!(backend.commands().contains(&GpuCommand::BindTexture { unit: 4, texture: textures[1] }));
        assert_eq!(backend.uniform(program, "ShadowMaps[1]"), Some(UniformValue::Int(4)));
        assert_eq!(backend.uniform(program, "ShadowCount"), Some(UniformValue::Int(2)));
        assert_eq!(backend.uniform(program, "LightCount"), Some(UniformValue::Int(1)));
        assert_eq!(backend.uniform(program, "Normal"), Some(UniformValue::Int(2)));
        assert_eq!(
            backend.uniform(program, "CameraPosition"),
            Some(UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)))
        );
    }

    #[test]
    fn test_dispatch_covers_target_and_binds_images() {
        let mut backend = RecordingBackend::new();
        let program = lighting_program(&mut backend);
        let channels = [TextureHandle(7), TextureHandle(8), TextureHandle(9)];

        let groups = LightingPass::new(program).dispatch(&mut backend, &channels, Some(4), (1366, 720));

        assert_eq!(groups, [43, 23, 1]);
        let commands = backend.commands();
        assert_eq!(
            commands[2],
            GpuCommand::BindImage {
                unit: 2,
                binding: ImageBinding::layer(TextureHandle(9), 4, ImageAccess::ReadOnly),
            }
        );
        assert_eq!(commands[3], GpuCommand::Dispatch { program, groups });
    }
}
