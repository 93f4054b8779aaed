//! Scene aggregator
//!
//! The scene owns every renderable object and light. Two coarse dirty flags
//! decide what [`Scene::update`] has to send to the GPU:
//!
//! - `dirty_lights` is raised by adding a light or by taking mutable access
//!   to the shadow-casting or omnidirectional light lists. A refresh uploads
//!   and rebinds every light block. Dynamic lights (and static lights that
//!   were never drawn) get new shadow matrices and a redrawn shadow map.
//! - `dirty_point_lights` is raised by mutable access to the point light
//!   array. A refresh re-uploads the whole array in one transfer.
//!
//! Both flags start raised so the first update initialises everything.
//! Objects that follow a transform node pick up its world matrix during
//! `update`; if any of them moved while a dynamic light exists the light
//! flag is raised as well. So does a camera other than the one dynamic
//! directional lights were last fitted to, including after a refresh
//! without a camera (probe baking).

use crate::foundation::math::Mat4;
use crate::render::backend::{BufferHandle, GpuBackend, ProgramHandle};
use crate::render::binding;
use crate::render::context::{programs, RenderContext};
use crate::render::error::BackendResult;
use crate::render::lights::{Light, PointLight};
use crate::scene::bounds::Frustum;
use crate::scene::camera::Camera;
use crate::scene::renderable::MeshInstance;
use crate::scene::skybox::Skybox;
use crate::scene::transform_graph::TransformGraph;

/// What a call to [`Scene::update`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Objects whose model matrix was refreshed from the transform graph
    pub objects_moved: usize,
    /// Light blocks uploaded and rebound
    pub light_blocks_uploaded: usize,
    /// Shadow maps rendered
    pub shadow_maps_drawn: usize,
    /// Whether the point light array was uploaded
    pub point_lights_uploaded: bool,
}

/// Objects, lights and skybox of one scene
#[derive(Debug, Clone)]
pub struct Scene {
    objects: Vec<MeshInstance>,
    lights: Vec<Light>,
    omni_lights: Vec<Light>,
    point_lights: Vec<PointLight>,
    point_light_buffer: Option<BufferHandle>,
    skybox: Option<Skybox>,
    transforms: TransformGraph,
    dirty_lights: bool,
    dirty_point_lights: bool,
    pending_moves: usize,
    fitted_view_projection: Option<Mat4>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            lights: Vec::new(),
            omni_lights: Vec::new(),
            point_lights: Vec::new(),
            point_light_buffer: None,
            skybox: None,
            transforms: TransformGraph::new(),
            dirty_lights: true,
            dirty_point_lights: true,
            pending_moves: 0,
            fitted_view_projection: None,
        }
    }

    /// Create the point light buffer and bind it to its slot
    pub fn init(&mut self, backend: &mut dyn GpuBackend) -> BackendResult<()> {
        let buffer = backend.create_buffer("point lights")?;
        backend.bind_uniform_buffer(binding::POINT_LIGHT_SLOT, buffer);
        self.point_light_buffer = Some(buffer);
        log::debug!("Scene initialised, point lights bound to slot {}", binding::POINT_LIGHT_SLOT);
        Ok(())
    }

    /// Renderable objects
    pub fn objects(&self) -> &[MeshInstance] {
        &self.objects
    }

    /// Mutable renderable objects
    pub fn objects_mut(&mut self) -> &mut Vec<MeshInstance> {
        &mut self.objects
    }

    /// Add an object, returning its index
    pub fn add_object(&mut self, object: MeshInstance) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    /// Shadow-casting (directional and spot) lights
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Mutable shadow-casting lights; marks light state dirty
    pub fn lights_mut(&mut self) -> &mut Vec<Light> {
        self.dirty_lights = true;
        &mut self.lights
    }

    /// Omnidirectional lights
    pub fn omni_lights(&self) -> &[Light] {
        &self.omni_lights
    }

    /// Mutable omnidirectional lights; marks light state dirty
    pub fn omni_lights_mut(&mut self) -> &mut Vec<Light> {
        self.dirty_lights = true;
        &mut self.omni_lights
    }

    /// Add a shadow-casting light, returning its index in its list.
    ///
    /// Omnidirectional lights go to the omni list, everything else to the
    /// shadow-casting list.
    pub fn add_light(&mut self, light: Light) -> usize {
        let list = if light.is_omnidirectional() {
            self.omni_lights_mut()
        } else {
            self.lights_mut()
        };
        list.push(light);
        list.len() - 1
    }

    /// Non-shadow point lights
    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    /// Mutable point lights; marks the point light buffer dirty
    pub fn point_lights_mut(&mut self) -> &mut Vec<PointLight> {
        self.dirty_point_lights = true;
        &mut self.point_lights
    }

    /// Add a point light
    pub fn add_point_light(&mut self, light: PointLight) {
        self.point_lights_mut().push(light);
    }

    /// Buffer mirroring the point light array, once initialised
    pub const fn point_light_buffer(&self) -> Option<BufferHandle> {
        self.point_light_buffer
    }

    /// Skybox, if any
    pub const fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    /// Mutable skybox, if any
    pub fn skybox_mut(&mut self) -> Option<&mut Skybox> {
        self.skybox.as_mut()
    }

    /// Install the skybox
    pub fn set_skybox(&mut self, skybox: Skybox) {
        self.skybox = Some(skybox);
    }

    /// Transform hierarchy driving object model matrices
    pub const fn transforms(&self) -> &TransformGraph {
        &self.transforms
    }

    /// Mutable transform hierarchy
    pub fn transforms_mut(&mut self) -> &mut TransformGraph {
        &mut self.transforms
    }

    /// Whether light blocks and shadow maps are pending a refresh
    pub const fn lights_dirty(&self) -> bool {
        self.dirty_lights
    }

    /// Whether the point light buffer is pending an upload
    pub const fn point_lights_dirty(&self) -> bool {
        self.dirty_point_lights
    }

    /// Bring GPU-side light state in line with the scene.
    ///
    /// `camera` is the reference directional lights fit their shadow volume to.
    pub fn update(
        &mut self,
        backend: &mut dyn GpuBackend,
        ctx: &RenderContext,
        camera: Option<&Camera>,
    ) -> BackendResult<UpdateReport> {
        self.sync_transforms();
        let mut report = UpdateReport {
            objects_moved: std::mem::take(&mut self.pending_moves),
            ..UpdateReport::default()
        };

        let any_dynamic = self.lights.iter().chain(&self.omni_lights).any(|l| l.dynamic);
        if report.objects_moved > 0 && any_dynamic {
            log::trace!("{} objects moved, refreshing dynamic shadows", report.objects_moved);
            self.dirty_lights = true;
        }
        if let Some(camera) = camera {
            let refit = self.fitted_view_projection != Some(camera.view_projection_matrix());
            if refit && self.lights.iter().any(|l| l.dynamic && l.follows_camera()) {
                self.dirty_lights = true;
            }
        }

        if self.dirty_lights {
            let (uploaded, drawn) = self.update_lights(backend, ctx, camera)?;
            report.light_blocks_uploaded = uploaded;
            report.shadow_maps_drawn = drawn;
        }
        if self.dirty_point_lights {
            report.point_lights_uploaded = self.update_point_light_buffer(backend)?;
        }
        Ok(report)
    }

    /// Refresh every light block and the shadow maps that need drawing.
    ///
    /// Only lights whose shadow map is about to be drawn get new matrices, so
    /// an uploaded lookup matrix always matches the texture it samples. A
    /// static light keeps the projection it was drawn with; changing its
    /// geometry takes [`Light::invalidate_shadow`].
    ///
    /// Returns the number of blocks uploaded and of shadow maps drawn.
    pub fn update_lights(
        &mut self,
        backend: &mut dyn GpuBackend,
        ctx: &RenderContext,
        camera: Option<&Camera>,
    ) -> BackendResult<(usize, usize)> {
        binding::check_slot_collisions(self.lights.len(), self.omni_lights.len());
        self.fitted_view_projection = camera.map(Camera::view_projection_matrix);

        for (i, light) in self.lights.iter_mut().enumerate() {
            if light.needs_shadow_render() {
                light.update_matrices(camera);
            }
            light.upload(backend)?;
            backend.bind_uniform_buffer(binding::shadow_light_slot(i), light.gpu_buffer());
        }
        for (i, light) in self.omni_lights.iter_mut().enumerate() {
            if light.needs_shadow_render() {
                light.update_matrices(camera);
            }
            light.upload(backend)?;
            backend.bind_uniform_buffer(binding::omni_light_slot(i), light.gpu_buffer());
        }
        let uploaded = self.lights.len() + self.omni_lights.len();

        let mut drawn = 0;
        let mut depth_program: Option<Option<ProgramHandle>> = None;
        let mut cube_program: Option<Option<ProgramHandle>> = None;
        for light in self.lights.iter_mut().chain(self.omni_lights.iter_mut()) {
            if !light.needs_shadow_render() {
                continue;
            }
            let program = if light.is_omnidirectional() {
                *cube_program.get_or_insert_with(|| ctx.program(programs::SHADOW_DEPTH_CUBE))
            } else {
                *depth_program.get_or_insert_with(|| ctx.program(programs::SHADOW_DEPTH))
            };
            if let Some(program) = program {
                light.draw_shadow_map(&self.objects, backend, program);
                drawn += 1;
            }
        }

        self.dirty_lights = false;
        log::trace!("Lights refreshed: {uploaded} blocks, {drawn} shadow maps");
        Ok((uploaded, drawn))
    }

    /// Upload the whole point light array in one transfer.
    ///
    /// Returns `false` when the scene was never initialised; the array stays
    /// dirty so a later update can upload it.
    pub fn update_point_light_buffer(&mut self, backend: &mut dyn GpuBackend) -> BackendResult<bool> {
        let Some(buffer) = self.point_light_buffer else {
            log::error!("Point light buffer not found; call Scene::init first");
            return Ok(false);
        };
        backend.upload_buffer(buffer, bytemuck::cast_slice(&self.point_lights))?;
        self.dirty_point_lights = false;
        Ok(true)
    }

    /// Copy world matrices of transform-driven objects, returning how many changed.
    ///
    /// Moves are remembered until the next [`Scene::update`], so syncing
    /// before drawing does not hide them from the shadow refresh.
    pub fn sync_transforms(&mut self) -> usize {
        let mut moved = 0;
        for object in &mut self.objects {
            if let Some(key) = object.transform() {
                if object.set_model(self.transforms.global(key)) {
                    moved += 1;
                }
            }
        }
        self.pending_moves += moved;
        moved
    }

    /// Draw the skybox, then every object visible from `projection * view`.
    ///
    /// Returns the number of objects drawn.
    pub fn draw(&self, backend: &mut dyn GpuBackend, projection: &Mat4, view: &Mat4) -> usize {
        if let Some(skybox) = &self.skybox {
            skybox.draw(backend, projection, view);
        }

        let frustum = Frustum::from_projection_view(projection, view);
        let mut drawn = 0;
        for object in self.objects.iter().filter(|o| o.is_visible_in(&frustum)) {
            object.draw(backend);
            drawn += 1;
        }
        backend.use_none();
        drawn
    }

    /// Draw every object with `program` in place of its own, without culling
    pub fn draw_with_program(&self, backend: &mut dyn GpuBackend, program: ProgramHandle) {
        for object in &self.objects {
            object.draw_with_program(backend, program);
        }
        backend.use_none();
    }
}
