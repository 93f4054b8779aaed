//! Backend abstraction traits for the rendering system
//!
//! The deferred core never talks to a graphics API directly. Everything it
//! needs from the device (buffers bound to numbered slots, textures and
//! image units, programs with named uniforms, draws, dispatches and memory
//! barriers) goes through [`GpuBackend`]. Slot numbers are a convention
//! shared by every component, see [`crate::render::binding`].

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::error::BackendResult;
use crate::render::sync::Barrier;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Handle to a texture (2D, 2D array or cube map)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Handle to a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub u32);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Handle to mesh geometry supplied by the asset loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// Texel formats used by the deferred pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 4 x 32-bit float, G-buffer channels and probe targets
    Rgba32F,
    /// 4 x 16-bit float, bloom targets
    Rgba16F,
    /// 2 x 32-bit float, variance shadow map moments
    Rg32F,
    /// 32-bit float depth
    Depth32F,
}

/// Description of a texture to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug label
    pub label: String,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// Cube map with six layers
    pub cube: bool,
}

impl TextureDesc {
    /// 2D texture
    pub fn new_2d(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
            cube: false,
        }
    }

    /// Square cube map
    pub fn new_cube(label: impl Into<String>, size: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width: size,
            height: size,
            format,
            cube: true,
        }
    }

    /// Number of array layers
    pub const fn layers(&self) -> u32 {
        if self.cube {
            6
        } else {
            1
        }
    }
}

/// Access mode of an image bound for compute load/store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAccess {
    /// `readonly`
    ReadOnly,
    /// `writeonly`
    WriteOnly,
    /// Read and written in place
    ReadWrite,
}

/// Image unit binding: a texture, optionally a single layer of it, and an access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageBinding {
    /// Bound texture
    pub texture: TextureHandle,
    /// Single layer, or the whole texture when `None`
    pub layer: Option<u32>,
    /// Access mode
    pub access: ImageAccess,
}

impl ImageBinding {
    /// Bind every layer of `texture`
    pub const fn whole(texture: TextureHandle, access: ImageAccess) -> Self {
        Self {
            texture,
            layer: None,
            access,
        }
    }

    /// Bind one layer of `texture`
    pub const fn layer(texture: TextureHandle, layer: u32, access: ImageAccess) -> Self {
        Self {
            texture,
            layer: Some(layer),
            access,
        }
    }
}

/// Value assigned to a named uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `float`
    Float(f32),
    /// `int` or sampler unit
    Int(i32),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `mat4`
    Mat4(Mat4),
}

/// Device interface consumed by the deferred core
///
/// Creation calls return errors the caller treats as fatal. Uniform
/// assignment reports missing names so callers can log and continue.
/// Everything else only records work and cannot fail.
pub trait GpuBackend {
    /// Create an empty buffer
    fn create_buffer(&mut self, label: &str) -> BackendResult<BufferHandle>;

    /// Replace the whole contents of `buffer` in one transfer
    fn upload_buffer(&mut self, buffer: BufferHandle, bytes: &[u8]) -> BackendResult<()>;

    /// Bind `buffer` to uniform/storage block `slot`
    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle);

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureHandle>;

    /// Create a framebuffer from colour attachments and an optional depth attachment
    fn create_framebuffer(
        &mut self,
        colors: &[TextureHandle],
        depth: Option<TextureHandle>,
    ) -> BackendResult<FramebufferHandle>;

    /// Bind `texture` to sampler unit `unit`
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// Bind an image (or one of its layers) to image unit `unit`
    fn bind_image(&mut self, unit: u32, binding: ImageBinding);

    /// Start rendering into `framebuffer` (`None` is the default target).
    /// `layer` selects a single layer of layered attachments.
    fn begin_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>, layer: Option<u32>);

    /// Clear the attachments of the current framebuffer
    fn clear(&mut self);

    /// Finish rendering into the current framebuffer
    fn end_framebuffer(&mut self);

    /// Make `program` current
    fn use_program(&mut self, program: ProgramHandle);

    /// Unbind any program
    fn use_none(&mut self);

    /// Assign a named uniform of `program`
    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) -> BackendResult<()>;

    /// Local workgroup size declared by a compute program
    fn workgroup_size(&self, program: ProgramHandle) -> [u32; 3];

    /// Draw a mesh with the current program
    fn draw_mesh(&mut self, mesh: MeshHandle, model: &Mat4);

    /// Draw a full-screen triangle with the current program
    fn draw_fullscreen(&mut self);

    /// Launch `groups` workgroups of a compute program
    fn dispatch(&mut self, program: ProgramHandle, groups: [u32; 3]);

    /// Make prior writes visible to later stages
    fn memory_barrier(&mut self, barrier: Barrier);
}

/// Assign a uniform, logging instead of failing when it does not exist.
pub fn set_uniform_or_log(backend: &mut dyn GpuBackend, program: ProgramHandle, name: &str, value: UniformValue) {
    if let Err(err) = backend.set_uniform(program, name, value) {
        log::error!("{err}");
    }
}
