//! Deferred renderer
//!
//! One call to [`DeferredRenderer::render_frame`] runs four stages:
//!
//! 1. **G-buffer**: upload the camera block, then rasterise the skybox and
//!    every visible object into the three G-buffer channels.
//! 2. **Shadows**: [`Scene::update`] refreshes light blocks, shadow maps and
//!    the point light array as their dirty flags require.
//! 3. **Lighting**: one compute dispatch reads the G-buffer and shadow maps
//!    and writes the lit colour into channel 0.
//! 4. **Post-process**: bloom and tone mapping into the default framebuffer.
//!
//! Stages declare what they read and write on a [`FrameGraph`]; the memory
//! barriers between them come out of [`FrameGraph::compile`].
//!
//! A stage whose program was never registered is logged and skipped; the
//! remaining stages still run.

use crate::config::RendererConfig;
use crate::render::backend::{BufferHandle, GpuBackend};
use crate::render::binding;
use crate::render::context::{programs, RenderContext};
use crate::render::error::{log_recoverable, BackendResult};
use crate::render::gbuffer::GBuffer;
use crate::render::graph::{FrameGraph, ResourceId, Step};
use crate::render::lighting::LightingPass;
use crate::render::post::{PostProcess, PostProcessSettings, PostPrograms};
use crate::render::sync::StageFlags;
use crate::scene::{Camera, Scene, UpdateReport};

/// Stages of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Geometry into the G-buffer
    GBuffer,
    /// Light blocks, shadow maps and point lights
    Shadows,
    /// Compute lighting
    Lighting,
    /// Bloom and tone mapping
    PostProcess,
}

/// What a frame did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame index, starting at 0
    pub frame: u64,
    /// Objects that passed the frustum test
    pub objects_drawn: usize,
    /// Scene refresh
    pub scene: UpdateReport,
    /// Lighting grid, if the lighting stage ran
    pub dispatch: Option<[u32; 3]>,
    /// Memory barriers issued
    pub barriers: usize,
    /// Bloom blur draws
    pub bloom_passes: usize,
}

/// Owner of the size-dependent targets and the per-frame sequence
#[derive(Debug)]
pub struct DeferredRenderer {
    config: RendererConfig,
    ctx: RenderContext,
    camera_buffer: BufferHandle,
    gbuffer: GBuffer,
    post: PostProcess,
    frame: u64,
}

impl DeferredRenderer {
    /// Create the camera block, G-buffer and bloom targets
    pub fn new(config: RendererConfig, ctx: &RenderContext, backend: &mut dyn GpuBackend) -> BackendResult<Self> {
        let camera_buffer = backend.create_buffer("camera")?;
        backend.bind_uniform_buffer(binding::CAMERA_SLOT, camera_buffer);

        let (width, height) = config.internal_size();
        let gbuffer = GBuffer::new(backend, width, height)?;
        let post = PostProcess::new(backend, &config.post, width, height)?;

        log::info!(
            "Deferred renderer ready: window {}x{}, internal {width}x{height}",
            config.width,
            config.height
        );

        Ok(Self {
            config,
            ctx: ctx.clone(),
            camera_buffer,
            gbuffer,
            post,
            frame: 0,
        })
    }

    /// Active configuration
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Mutable post-processing controls (exposure, bloom, ambient occlusion)
    pub fn post_settings_mut(&mut self) -> &mut PostProcessSettings {
        &mut self.config.post
    }

    /// G-buffer targets
    pub const fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    /// Camera block buffer bound to slot 0
    pub const fn camera_buffer(&self) -> BufferHandle {
        self.camera_buffer
    }

    /// Frames rendered so far
    pub const fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Change the resolution the deferred passes run at.
    ///
    /// `None`, or a size with a zero component, follows the window size.
    pub fn set_internal_resolution(
        &mut self,
        backend: &mut dyn GpuBackend,
        resolution: Option<(u32, u32)>,
    ) -> BackendResult<()> {
        self.config.internal_resolution = resolution;
        self.recreate_targets(backend)
    }

    /// Window resized; targets follow unless an internal resolution is set
    pub fn resize(&mut self, backend: &mut dyn GpuBackend, width: u32, height: u32) -> BackendResult<()> {
        self.config.width = width;
        self.config.height = height;
        self.recreate_targets(backend)
    }

    fn recreate_targets(&mut self, backend: &mut dyn GpuBackend) -> BackendResult<()> {
        let (width, height) = self.config.internal_size();
        if self.gbuffer.size() == (width, height) {
            return Ok(());
        }
        self.gbuffer = GBuffer::new(backend, width, height)?;
        self.post = PostProcess::new(backend, &self.config.post, width, height)?;
        log::debug!("Render targets recreated at {width}x{height}");
        Ok(())
    }

    fn frame_graph(scene: &Scene) -> FrameGraph<Stage> {
        let mut graph = FrameGraph::new();
        graph
            .add_pass(Stage::GBuffer, StageFlags::GRAPHICS)
            .writes(ResourceId::GBuffer(0))
            .writes(ResourceId::GBuffer(1))
            .writes(ResourceId::GBuffer(2));

        let shadows = graph
            .add_pass(Stage::Shadows, StageFlags::GRAPHICS)
            .writes(ResourceId::LightBlocks)
            .writes(ResourceId::PointLightBuffer);
        for i in 0..scene.lights().len() {
            shadows.writes(ResourceId::ShadowMap(i));
        }
        for i in 0..scene.omni_lights().len() {
            shadows.writes(ResourceId::OmniShadowMap(i));
        }

        let lighting = graph
            .add_pass(Stage::Lighting, StageFlags::COMPUTE)
            .reads(ResourceId::GBuffer(0))
            .reads(ResourceId::GBuffer(1))
            .reads(ResourceId::GBuffer(2))
            .reads(ResourceId::LightBlocks)
            .reads(ResourceId::PointLightBuffer)
            .writes(ResourceId::GBuffer(0))
            .writes(ResourceId::GBuffer(1));
        for i in 0..scene.lights().len() {
            lighting.reads(ResourceId::ShadowMap(i));
        }
        for i in 0..scene.omni_lights().len() {
            lighting.reads(ResourceId::OmniShadowMap(i));
        }

        graph
            .add_pass(Stage::PostProcess, StageFlags::GRAPHICS)
            .reads(ResourceId::GBuffer(0))
            .writes(ResourceId::Bloom)
            .writes(ResourceId::Backbuffer);
        graph
    }

    /// Render one frame of `scene` seen from `camera`
    pub fn render_frame(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        backend: &mut dyn GpuBackend,
    ) -> BackendResult<FrameReport> {
        scene.sync_transforms();
        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };

        for step in Self::frame_graph(scene).compile() {
            match step {
                Step::Barrier(barrier) => {
                    backend.memory_barrier(barrier);
                    report.barriers += 1;
                }
                Step::Pass(Stage::GBuffer) => report.objects_drawn = self.geometry_pass(scene, camera, backend)?,
                Step::Pass(Stage::Shadows) => report.scene = scene.update(backend, &self.ctx, Some(camera))?,
                Step::Pass(Stage::Lighting) => report.dispatch = self.lighting_pass(scene, camera, backend),
                Step::Pass(Stage::PostProcess) => report.bloom_passes = self.post_pass(backend),
            }
        }

        log::trace!("Frame {}: {report:?}", self.frame);
        self.frame += 1;
        Ok(report)
    }

    fn geometry_pass(&self, scene: &Scene, camera: &Camera, backend: &mut dyn GpuBackend) -> BackendResult<usize> {
        log_recoverable(backend.upload_buffer(self.camera_buffer, bytemuck::bytes_of(&camera.gpu_data())))?;

        let projection = camera.projection_matrix();
        let view = camera.view_matrix();
        backend.begin_framebuffer(Some(self.gbuffer.framebuffer()), None);
        backend.clear();
        let drawn = scene.draw(backend, &projection, &view);
        backend.end_framebuffer();
        Ok(drawn)
    }

    fn lighting_pass(&self, scene: &Scene, camera: &Camera, backend: &mut dyn GpuBackend) -> Option<[u32; 3]> {
        let pass = LightingPass::new(self.ctx.program(programs::DEFERRED_LIGHTING)?);
        pass.prepare(backend, scene, &self.config.post, camera.position);
        let groups = pass.dispatch(backend, self.gbuffer.channels(), None, self.gbuffer.size());
        backend.use_none();
        Some(groups)
    }

    fn post_pass(&self, backend: &mut dyn GpuBackend) -> usize {
        let settings = &self.config.post;
        let programs = PostPrograms {
            composite: self.ctx.program(programs::POST_PROCESS),
            blur: if settings.bloom_enabled() {
                self.ctx.program(programs::BLOOM_BLUR)
            } else {
                None
            },
        };
        self.post.run(backend, programs, settings, self.gbuffer.lit_color()).blur_draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::recording::{GpuCommand, RecordingBackend};
    use crate::render::sync::Barrier;

    fn renderer_with(names: &[&str]) -> (RecordingBackend, RenderContext, DeferredRenderer) {
        let mut backend = RecordingBackend::new();
        let mut ctx = RenderContext::new();
        for name in names {
            let program = backend.declare_program(name, &["Exposure", "Bloom", "Horizontal"], [16, 16, 1]);
            ctx.register_program(*name, program);
        }
        let renderer = DeferredRenderer::new(RendererConfig::default(), &ctx, &mut backend).unwrap();
        (backend, ctx, renderer)
    }

    fn camera() -> Camera {
        Camera::perspective(Vec3::new(0.0, 5.0, 20.0), 60.0, 1366.0 / 720.0, 0.1, 500.0)
    }

    #[test]
    fn test_new_binds_camera_and_sizes_targets() {
        let (backend, _, renderer) = renderer_with(&[]);
        assert_eq!(backend.bound_block(binding::CAMERA_SLOT), Some(renderer.camera_buffer()));
        assert_eq!(renderer.gbuffer().size(), (1366, 720));
        let desc = backend.texture_desc(renderer.gbuffer().channel(1)).unwrap();
        assert_eq!(desc.format, crate::render::backend::TextureFormat::Rgba32F);
    }

    #[test]
    fn test_frame_orders_stages_with_two_barriers() {
        let (mut backend, _, mut renderer) = renderer_with(&[
            programs::DEFERRED_LIGHTING,
            programs::POST_PROCESS,
            programs::BLOOM_BLUR,
        ]);
        let mut scene = Scene::new();
        scene.init(&mut backend).unwrap();
        backend.clear_commands();

        let report = renderer.render_frame(&mut scene, &camera(), &mut backend).unwrap();

        assert_eq!(report.frame, 0);
        assert_eq!(report.barriers, 2);
        assert_eq!(report.dispatch, Some([86, 45, 1]));
        assert_eq!(report.bloom_passes, 4);

        let commands = backend.commands();
        let dispatch = commands.iter().position(|c| matches!(c, GpuCommand::Dispatch { .. })).unwrap();
        let barriers: Vec<usize> = commands
            .iter()
            .enumerate()
            .filter_map(|(i, c)| matches!(c, GpuCommand::MemoryBarrier(_)).then_some(i))
            .collect();
        assert!(barriers[0] < dispatch && dispatch < barriers[1]);
        assert_eq!(commands[barriers[0]], GpuCommand::MemoryBarrier(Barrier::graphics_write_to_compute_read()));
        assert_eq!(
            commands[barriers[1]],
            GpuCommand::MemoryBarrier(Barrier::new(StageFlags::COMPUTE, StageFlags::GRAPHICS))
        );
        let composite = commands
            .iter()
            .position(|c| matches!(c, GpuCommand::BeginFramebuffer { framebuffer: None, .. }))
            .unwrap();
        assert!(barriers[1] < composite);
    }

    #[test]
    fn test_missing_lighting_program_skips_dispatch() {
        let (mut backend, _, mut renderer) = renderer_with(&[programs::POST_PROCESS]);
        let mut scene = Scene::new();
        scene.init(&mut backend).unwrap();

        let report = renderer.render_frame(&mut scene, &camera(), &mut backend).unwrap();
        assert_eq!(report.dispatch, None);
        assert_eq!(backend.dispatch_count(), 0);
        assert_eq!(renderer.frame_count(), 1);
    }

    #[test]
    fn test_internal_resolution_recreates_targets() {
        let (mut backend, _, mut renderer) = renderer_with(&[]);
        let before = backend.texture_count();

        renderer.set_internal_resolution(&mut backend, Some((640, 360))).unwrap();
        assert_eq!(renderer.gbuffer().size(), (640, 360));
        assert!(backend.texture_count() > before);

        let after = backend.texture_count();
        renderer.resize(&mut backend, 1920, 1080).unwrap();
        assert_eq!(renderer.gbuffer().size(), (640, 360));
        assert_eq!(backend.texture_count(), after);

        renderer.set_internal_resolution(&mut backend, None).unwrap();
        assert_eq!(renderer.gbuffer().size(), (1920, 1080));
    }

    #[test]
    fn test_bloom_toggle_skips_blur() {
        let (mut backend, _, mut renderer) = renderer_with(&[programs::POST_PROCESS, programs::BLOOM_BLUR]);
        let mut scene = Scene::new();
        scene.init(&mut backend).unwrap();
        renderer.post_settings_mut().toggle_bloom();

        let report = renderer.render_frame(&mut scene, &camera(), &mut backend).unwrap();
        assert_eq!(report.bloom_passes, 0);
    }
}
