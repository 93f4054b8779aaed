//! Headless backend that records every command
//!
//! [`RecordingBackend`] keeps the resources it is asked to create in memory
//! and appends each call to a command log. Programs must be declared up
//! front with the uniforms they expose and their workgroup size, which lets
//! uniform misses be reported the same way a real shader layer would.

use std::collections::{HashMap, HashSet};

use crate::foundation::math::Mat4;
use crate::render::backend::{
    BufferHandle, FramebufferHandle, GpuBackend, ImageBinding, MeshHandle, ProgramHandle, TextureDesc,
    TextureHandle, UniformValue,
};
use crate::render::error::{BackendResult, RenderError};
use crate::render::sync::Barrier;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Buffer created
    CreateBuffer(BufferHandle),
    /// Whole-buffer upload of `size` bytes
    UploadBuffer {
        /// Target buffer
        buffer: BufferHandle,
        /// Bytes transferred
        size: usize,
    },
    /// Block binding
    BindUniformBuffer {
        /// Slot number
        slot: u32,
        /// Bound buffer
        buffer: BufferHandle,
    },
    /// Texture created
    CreateTexture(TextureHandle),
    /// Framebuffer created
    CreateFramebuffer(FramebufferHandle),
    /// Sampler binding
    BindTexture {
        /// Texture unit
        unit: u32,
        /// Bound texture
        texture: TextureHandle,
    },
    /// Image unit binding
    BindImage {
        /// Image unit
        unit: u32,
        /// Bound image view
        binding: ImageBinding,
    },
    /// Render target switch
    BeginFramebuffer {
        /// Target, `None` for the default framebuffer
        framebuffer: Option<FramebufferHandle>,
        /// Layer of layered attachments
        layer: Option<u32>,
    },
    /// Attachment clear
    Clear,
    /// Render target finished
    EndFramebuffer,
    /// Program bound
    UseProgram(ProgramHandle),
    /// Program unbound
    UseNone,
    /// Uniform assigned
    SetUniform {
        /// Program
        program: ProgramHandle,
        /// Uniform name
        name: String,
        /// Assigned value
        value: UniformValue,
    },
    /// Mesh draw
    DrawMesh {
        /// Program current at draw time
        program: Option<ProgramHandle>,
        /// Drawn mesh
        mesh: MeshHandle,
        /// Model matrix
        model: Mat4,
    },
    /// Full-screen triangle
    DrawFullscreen(Option<ProgramHandle>),
    /// Compute dispatch
    Dispatch {
        /// Compute program
        program: ProgramHandle,
        /// Workgroup counts
        groups: [u32; 3],
    },
    /// Memory barrier
    MemoryBarrier(Barrier),
}

#[derive(Debug, Clone)]
struct ProgramInfo {
    name: String,
    uniforms: HashSet<String>,
    workgroup: [u32; 3],
    values: HashMap<String, UniformValue>,
}

#[derive(Debug, Clone)]
struct BufferRecord {
    label: String,
    contents: Vec<u8>,
}

/// In-memory [`GpuBackend`] that logs every call
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    commands: Vec<GpuCommand>,
    buffers: Vec<BufferRecord>,
    textures: Vec<TextureDesc>,
    framebuffer_count: u32,
    programs: Vec<ProgramInfo>,
    block_slots: HashMap<u32, BufferHandle>,
    current_program: Option<ProgramHandle>,
    fail_allocations: bool,
}

impl RecordingBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a program with its uniform names and compute workgroup size
    pub fn declare_program(&mut self, name: &str, uniforms: &[&str], workgroup: [u32; 3]) -> ProgramHandle {
        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(ProgramInfo {
            name: name.to_string(),
            uniforms: uniforms.iter().map(|u| (*u).to_string()).collect(),
            workgroup,
            values: HashMap::new(),
        });
        handle
    }

    /// Make every later resource creation fail with a device error
    pub fn fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Every command recorded so far
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Drop the command log, keeping resources
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Count commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.iter().filter(|&c| predicate(c)).count()
    }

    /// Number of compute dispatches
    pub fn dispatch_count(&self) -> usize {
        self.count(|c| matches!(c, GpuCommand::Dispatch { .. }))
    }

    /// Number of memory barriers
    pub fn barrier_count(&self) -> usize {
        self.count(|c| matches!(c, GpuCommand::MemoryBarrier(_)))
    }

    /// Number of uploads into `buffer`
    pub fn upload_count(&self, buffer: BufferHandle) -> usize {
        self.count(|c| matches!(c, GpuCommand::UploadBuffer { buffer: b, .. } if *b == buffer))
    }

    /// Number of uploads into any buffer
    pub fn total_upload_count(&self) -> usize {
        self.count(|c| matches!(c, GpuCommand::UploadBuffer { .. }))
    }

    /// Number of framebuffer passes targeting `framebuffer`
    pub fn framebuffer_pass_count(&self, framebuffer: FramebufferHandle) -> usize {
        self.count(|c| {
            matches!(c, GpuCommand::BeginFramebuffer { framebuffer: Some(f), .. } if *f == framebuffer)
        })
    }

    /// Current contents of `buffer`
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer.0 as usize).map(|b| b.contents.as_slice())
    }

    /// Debug label of `buffer`
    pub fn buffer_label(&self, buffer: BufferHandle) -> Option<&str> {
        self.buffers.get(buffer.0 as usize).map(|b| b.label.as_str())
    }

    /// Buffer currently bound to block `slot`
    pub fn bound_block(&self, slot: u32) -> Option<BufferHandle> {
        self.block_slots.get(&slot).copied()
    }

    /// Description `texture` was created with
    pub fn texture_desc(&self, texture: TextureHandle) -> Option<&TextureDesc> {
        self.textures.get(texture.0 as usize)
    }

    /// Number of textures created
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Last value assigned to a uniform of `program`
    pub fn uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        self.programs.get(program.0 as usize)?.values.get(name).copied()
    }

    fn check_allocation(&self, what: &str) -> BackendResult<()> {
        if self.fail_allocations {
            Err(RenderError::Device(format!("out of device memory creating {what}")))
        } else {
            Ok(())
        }
    }
}

impl GpuBackend for RecordingBackend {
    fn create_buffer(&mut self, label: &str) -> BackendResult<BufferHandle> {
        self.check_allocation(label)?;
        let handle = BufferHandle(self.buffers.len() as u32);
        self.buffers.push(BufferRecord {
            label: label.to_string(),
            contents: Vec::new(),
        });
        self.commands.push(GpuCommand::CreateBuffer(handle));
        Ok(handle)
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, bytes: &[u8]) -> BackendResult<()> {
        let record = self
            .buffers
            .get_mut(buffer.0 as usize)
            .ok_or_else(|| RenderError::ResourceNotFound(format!("{buffer:?}")))?;
        record.contents.clear();
        record.contents.extend_from_slice(bytes);
        self.commands.push(GpuCommand::UploadBuffer {
            buffer,
            size: bytes.len(),
        });
        Ok(())
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.block_slots.insert(slot, buffer);
        self.commands.push(GpuCommand::BindUniformBuffer { slot, buffer });
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureHandle> {
        self.check_allocation(&desc.label)?;
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(desc.clone());
        self.commands.push(GpuCommand::CreateTexture(handle));
        Ok(handle)
    }

    fn create_framebuffer(
        &mut self,
        colors: &[TextureHandle],
        depth: Option<TextureHandle>,
    ) -> BackendResult<FramebufferHandle> {
        self.check_allocation("framebuffer")?;
        if let Some(missing) = colors
            .iter()
            .chain(depth.iter())
            .find(|t| t.0 as usize >= self.textures.len())
        {
            return Err(RenderError::ResourceNotFound(format!("{missing:?}")));
        }
        let handle = FramebufferHandle(self.framebuffer_count);
        self.framebuffer_count += 1;
        self.commands.push(GpuCommand::CreateFramebuffer(handle));
        Ok(handle)
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.commands.push(GpuCommand::BindTexture { unit, texture });
    }

    fn bind_image(&mut self, unit: u32, binding: ImageBinding) {
        self.commands.push(GpuCommand::BindImage { unit, binding });
    }

    fn begin_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>, layer: Option<u32>) {
        self.commands.push(GpuCommand::BeginFramebuffer { framebuffer, layer });
    }

    fn clear(&mut self) {
        self.commands.push(GpuCommand::Clear);
    }

    fn end_framebuffer(&mut self) {
        self.commands.push(GpuCommand::EndFramebuffer);
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn use_none(&mut self) {
        self.current_program = None;
        self.commands.push(GpuCommand::UseNone);
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) -> BackendResult<()> {
        let info = self
            .programs
            .get_mut(program.0 as usize)
            .ok_or_else(|| RenderError::ProgramNotFound(format!("{program:?}")))?;
        if !info.uniforms.contains(name) {
            return Err(RenderError::UniformNotFound {
                program: info.name.clone(),
                name: name.to_string(),
            });
        }
        info.values.insert(name.to_string(), value);
        self.commands.push(GpuCommand::SetUniform {
            program,
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn workgroup_size(&self, program: ProgramHandle) -> [u32; 3] {
        self.programs
            .get(program.0 as usize)
            .map_or([1, 1, 1], |info| info.workgroup)
    }

    fn draw_mesh(&mut self, mesh: MeshHandle, model: &Mat4) {
        self.commands.push(GpuCommand::DrawMesh {
            program: self.current_program,
            mesh,
            model: *model,
        });
    }

    fn draw_fullscreen(&mut self) {
        self.commands.push(GpuCommand::DrawFullscreen(self.current_program));
    }

    fn dispatch(&mut self, program: ProgramHandle, groups: [u32; 3]) {
        self.commands.push(GpuCommand::Dispatch { program, groups });
    }

    fn memory_barrier(&mut self, barrier: Barrier) {
        self.commands.push(GpuCommand::MemoryBarrier(barrier));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::TextureFormat;

    #[test]
    fn test_upload_replaces_contents() {
        let mut backend = RecordingBackend::new();
        let buffer = backend.create_buffer("lights").unwrap();

        backend.upload_buffer(buffer, &[1, 2, 3, 4]).unwrap();
        backend.upload_buffer(buffer, &[9, 9]).unwrap();

        assert_eq!(backend.buffer_contents(buffer), Some(&[9u8, 9][..]));
        assert_eq!(backend.upload_count(buffer), 2);
        assert_eq!(backend.buffer_label(buffer), Some("lights"));
    }

    #[test]
    fn test_undeclared_uniform_is_reported() {
        let mut backend = RecordingBackend::new();
        let program = backend.declare_program("Skybox", &["Projection", "View"], [1, 1, 1]);

        assert!(backend.set_uniform(program, "View", UniformValue::Mat4(Mat4::identity())).is_ok());
        let err = backend
            .set_uniform(program, "Model", UniformValue::Float(1.0))
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::UniformNotFound {
                program: "Skybox".into(),
                name: "Model".into()
            }
        );
    }

    #[test]
    fn test_failed_allocation_is_a_device_error() {
        let mut backend = RecordingBackend::new();
        backend.fail_allocations(true);
        let desc = TextureDesc::new_2d("gbuffer", 4, 4, TextureFormat::Rgba32F);
        assert!(matches!(backend.create_texture(&desc), Err(RenderError::Device(_))));
    }

    #[test]
    fn test_draw_records_current_program() {
        let mut backend = RecordingBackend::new();
        let program = backend.declare_program("ShadowDepth", &[], [1, 1, 1]);
        backend.use_program(program);
        backend.draw_mesh(MeshHandle(7), &Mat4::identity());
        backend.use_none();
        backend.draw_fullscreen();

        assert_eq!(
            backend.commands()[1],
            GpuCommand::DrawMesh {
                program: Some(program),
                mesh: MeshHandle(7),
                model: Mat4::identity()
            }
        );
        assert_eq!(backend.commands()[3], GpuCommand::DrawFullscreen(None));
    }
}
