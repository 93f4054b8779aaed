//! Environment probe baking
//!
//! A probe is the deferred pipeline run from a fixed point into cube maps.
//! The fill pass rasterises the whole scene once into all six layers of the
//! probe G-buffer (the `Probe` program expands each triangle to the faces).
//! Lighting then runs face by face: the three image units are rebound to the
//! face's layer before each dispatch. Faces write disjoint layers, so the only
//! barrier of the lighting batch follows its last dispatch.

use crate::foundation::math::Vec3;
use crate::render::backend::{BufferHandle, FramebufferHandle, GpuBackend, TextureDesc, TextureFormat, TextureHandle};
use crate::render::binding::{self, GBUFFER_CHANNELS};
use crate::render::context::{programs, RenderContext};
use crate::render::error::BackendResult;
use crate::render::graph::{Access, FrameGraph, ResourceId, Step};
use crate::render::lighting::LightingPass;
use crate::render::post::PostProcessSettings;
use crate::render::sync::StageFlags;
use crate::scene::{Camera, Scene, UpdateReport};

const CUBE_FACES: u32 = 6;
const NEAR: f32 = 0.5;
const FAR: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeStage {
    Fill,
    Face(u32),
}

/// What a bake or relight did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Scene refresh before baking
    pub scene: UpdateReport,
    /// Lighting dispatches (one per face)
    pub dispatches: usize,
    /// Memory barriers issued
    pub barriers: usize,
}

/// Cube-map G-buffer rendered from a fixed position
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentProbe {
    position: Vec3,
    resolution: u32,
    camera_buffer: BufferHandle,
    channels: [TextureHandle; GBUFFER_CHANNELS as usize],
    depth: TextureHandle,
    framebuffer: FramebufferHandle,
}

impl EnvironmentProbe {
    /// Allocate the probe targets and upload its camera block
    pub fn new(position: Vec3, resolution: u32, backend: &mut dyn GpuBackend) -> BackendResult<Self> {
        let camera_buffer = backend.create_buffer("probe camera")?;
        let mut camera = Camera::perspective(position, 90.0, 1.0, NEAR, FAR);
        camera.set_direction(Vec3::z());
        backend.upload_buffer(camera_buffer, bytemuck::bytes_of(&camera.gpu_data()))?;
        backend.bind_uniform_buffer(binding::PROBE_CAMERA_SLOT, camera_buffer);

        let mut cube = |label: &str, format| backend.create_texture(&TextureDesc::new_cube(label, resolution, format));
        let channels = [
            cube("probe color/material", TextureFormat::Rgba32F)?,
            cube("probe position/depth", TextureFormat::Rgba32F)?,
            cube("probe normal/F0/R", TextureFormat::Rgba32F)?,
        ];
        let depth = cube("probe depth", TextureFormat::Depth32F)?;
        let framebuffer = backend.create_framebuffer(&channels, Some(depth))?;
        log::debug!("Environment probe at {position:?}, {resolution}px faces");

        Ok(Self {
            position,
            resolution,
            camera_buffer,
            channels,
            depth,
            framebuffer,
        })
    }

    /// Probe origin
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Edge length of each face
    pub const fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Lit environment cube map, valid after [`EnvironmentProbe::bake`]
    pub const fn cubemap(&self) -> TextureHandle {
        self.channels[0]
    }

    /// Probe G-buffer channels
    pub const fn channels(&self) -> &[TextureHandle; GBUFFER_CHANNELS as usize] {
        &self.channels
    }

    /// Cube depth attachment
    pub const fn depth(&self) -> TextureHandle {
        self.depth
    }

    /// Layered framebuffer the fill pass renders into
    pub const fn framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }

    /// Fill the probe G-buffer from `scene` and light every face.
    ///
    /// `settings` are applied with linear output and bloom disabled.
    pub fn bake(
        &self,
        scene: &mut Scene,
        ctx: &RenderContext,
        backend: &mut dyn GpuBackend,
        settings: &PostProcessSettings,
    ) -> BackendResult<ProbeReport> {
        self.run(scene, ctx, backend, settings, true)
    }

    /// Light every face again without refilling the geometry.
    ///
    /// Use after light changes when the scene geometry is unchanged.
    pub fn relight(
        &self,
        scene: &mut Scene,
        ctx: &RenderContext,
        backend: &mut dyn GpuBackend,
        settings: &PostProcessSettings,
    ) -> BackendResult<ProbeReport> {
        self.run(scene, ctx, backend, settings, false)
    }

    fn run(
        &self,
        scene: &mut Scene,
        ctx: &RenderContext,
        backend: &mut dyn GpuBackend,
        settings: &PostProcessSettings,
        fill: bool,
    ) -> BackendResult<ProbeReport> {
        let mut report = ProbeReport {
            scene: scene.update(backend, ctx, None)?,
            ..ProbeReport::default()
        };
        backend.bind_uniform_buffer(binding::PROBE_CAMERA_SLOT, self.camera_buffer);

        let fill_program = if fill { ctx.program(programs::PROBE) } else { None };
        let lighting = ctx.program(programs::DEFERRED_LIGHTING).map(LightingPass::new);
        let settings = settings.linear();

        let mut graph = FrameGraph::new();
        if report.scene.shadow_maps_drawn > 0 {
            for i in 0..scene.lights().len() {
                graph.import(ResourceId::ShadowMap(i), StageFlags::GRAPHICS);
            }
            for i in 0..scene.omni_lights().len() {
                graph.import(ResourceId::OmniShadowMap(i), StageFlags::GRAPHICS);
            }
        }
        if fill_program.is_some() {
            let pass = graph.add_pass(ProbeStage::Fill, StageFlags::GRAPHICS);
            for channel in 0..GBUFFER_CHANNELS as u8 {
                pass.writes(ResourceId::ProbeChannel(channel));
            }
        }
        if lighting.is_some() {
            for face in 0..CUBE_FACES {
                let pass = graph
                    .add_pass(ProbeStage::Face(face), StageFlags::COMPUTE)
                    .reads(Access::layer(ResourceId::ProbeChannel(0), face))
                    .reads(Access::layer(ResourceId::ProbeChannel(1), face))
                    .reads(Access::layer(ResourceId::ProbeChannel(2), face))
                    .writes(Access::layer(ResourceId::ProbeChannel(0), face))
                    .writes(Access::layer(ResourceId::ProbeChannel(1), face));
                for i in 0..scene.lights().len() {
                    pass.reads(ResourceId::ShadowMap(i));
                }
                for i in 0..scene.omni_lights().len() {
                    pass.reads(ResourceId::OmniShadowMap(i));
                }
            }
        }
        graph.export(ResourceId::ProbeChannel(0), StageFlags::GRAPHICS);

        for step in graph.compile() {
            match step {
                Step::Barrier(barrier) => {
                    backend.memory_barrier(barrier);
                    report.barriers += 1;
                }
                Step::Pass(ProbeStage::Fill) => {
                    if let Some(program) = fill_program {
                        backend.begin_framebuffer(Some(self.framebuffer), None);
                        backend.clear();
                        scene.draw_with_program(backend, program);
                        backend.end_framebuffer();
                    }
                }
                Step::Pass(ProbeStage::Face(face)) => {
                    if let Some(pass) = lighting {
                        if face == 0 {
                            pass.prepare(backend, scene, &settings, self.position);
                        }
                        let size = (self.resolution, self.resolution);
                        pass.dispatch(backend, &self.channels, Some(face), size);
                        report.dispatches += 1;
                    }
                }
            }
        }
        backend.use_none();

        log::debug!(
            "Probe {}: {} dispatches, {} barriers",
            if fill { "baked" } else { "relit" },
            report.dispatches,
            report.barriers
        );
        Ok(report)
    }
}
