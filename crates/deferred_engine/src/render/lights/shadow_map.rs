//! Shadow map render targets
//!
//! A shadow map is allocated once at its fixed resolution. Afterwards only
//! the view and projection it renders with change.

use crate::foundation::math::Mat4;
use crate::render::backend::{
    set_uniform_or_log, FramebufferHandle, GpuBackend, ProgramHandle, TextureDesc, TextureFormat, TextureHandle,
    UniformValue,
};
use crate::render::error::BackendResult;
use crate::scene::bounds::Frustum;
use crate::scene::renderable::MeshInstance;

/// Depth-moment target rendered from a light's point of view
#[derive(Debug, Clone)]
pub struct ShadowMap {
    resolution: u32,
    moments: TextureHandle,
    depth: TextureHandle,
    framebuffer: FramebufferHandle,
    views: Vec<Mat4>,
    projection: Mat4,
}

impl ShadowMap {
    /// Allocate a 2D shadow map
    pub fn new(backend: &mut dyn GpuBackend, label: &str, resolution: u32) -> BackendResult<Self> {
        Self::allocate(backend, label, resolution, false)
    }

    /// Allocate a cube shadow map (one layer per face)
    pub fn new_cube(backend: &mut dyn GpuBackend, label: &str, resolution: u32) -> BackendResult<Self> {
        Self::allocate(backend, label, resolution, true)
    }

    fn allocate(backend: &mut dyn GpuBackend, label: &str, resolution: u32, cube: bool) -> BackendResult<Self> {
        let (moments_desc, depth_desc) = if cube {
            (
                TextureDesc::new_cube(format!("{label} moments"), resolution, TextureFormat::Rg32F),
                TextureDesc::new_cube(format!("{label} depth"), resolution, TextureFormat::Depth32F),
            )
        } else {
            (
                TextureDesc::new_2d(format!("{label} moments"), resolution, resolution, TextureFormat::Rg32F),
                TextureDesc::new_2d(format!("{label} depth"), resolution, resolution, TextureFormat::Depth32F),
            )
        };
        let moments = backend.create_texture(&moments_desc)?;
        let depth = backend.create_texture(&depth_desc)?;
        let framebuffer = backend.create_framebuffer(&[moments], Some(depth))?;
        log::debug!("Created {label} shadow map ({resolution}x{resolution}, cube: {cube})");

        Ok(Self {
            resolution,
            moments,
            depth,
            framebuffer,
            views: vec![Mat4::identity(); if cube { 6 } else { 1 }],
            projection: Mat4::identity(),
        })
    }

    /// Edge length in texels
    pub const fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Texture sampled by the lighting pass
    pub const fn texture(&self) -> TextureHandle {
        self.moments
    }

    /// Depth attachment
    pub const fn depth_texture(&self) -> TextureHandle {
        self.depth
    }

    /// Framebuffer the map renders into
    pub const fn framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }

    /// Whether the map is a cube map
    pub fn is_cube(&self) -> bool {
        self.views.len() == 6
    }

    /// View matrix of the first (or only) face
    pub fn view(&self) -> Mat4 {
        self.views[0]
    }

    /// View matrices, one per layer
    pub fn views(&self) -> &[Mat4] {
        &self.views
    }

    /// Projection shared by every layer
    pub const fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Set the matrices of a 2D map
    pub fn set_matrices(&mut self, view: Mat4, projection: Mat4) {
        self.views[0] = view;
        self.projection = projection;
    }

    /// Set the six face views of a cube map
    pub fn set_cube_matrices(&mut self, views: [Mat4; 6], projection: Mat4) {
        if self.is_cube() {
            self.views.copy_from_slice(&views);
        } else {
            log::warn!("Cube matrices set on a 2D shadow map; keeping the first face only");
            self.views[0] = views[0];
        }
        self.projection = projection;
    }

    /// Render depth moments of every object visible from the light.
    ///
    /// Always a full pass over `objects`, one per layer.
    pub fn draw(&self, objects: &[MeshInstance], backend: &mut dyn GpuBackend, program: ProgramHandle) {
        backend.use_program(program);
        for (layer, view) in self.views.iter().enumerate() {
            let view_projection = self.projection * view;
            let frustum = Frustum::from_matrix(&view_projection);
            let layer = self.is_cube().then_some(layer as u32);

            backend.begin_framebuffer(Some(self.framebuffer), layer);
            backend.clear();
            set_uniform_or_log(backend, program, "DepthVP", UniformValue::Mat4(view_projection));
            for object in objects.iter().filter(|o| o.is_visible_in(&frustum)) {
                object.draw_geometry(backend);
            }
            backend.end_framebuffer();
        }
        backend.use_none();
    }
}
