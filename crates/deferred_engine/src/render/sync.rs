//! Memory barriers between GPU stages
//!
//! A [`Barrier`] names which stages produced data and which stages consume
//! it. Backends translate it to their own primitive; for Vulkan that is a
//! global `VkMemoryBarrier` plus the pipeline stage masks for
//! `vkCmdPipelineBarrier`.
//!
//! # Usage
//!
//! ```
//! use deferred_engine::render::sync::{Barrier, StageFlags};
//!
//! // Compute writes an image that later fragment shaders sample
//! let barrier = Barrier::compute_write_to_shader_read();
//! assert!(barrier.src.contains(StageFlags::COMPUTE));
//! let vk_barrier = barrier.to_vk();
//! assert!(vk_barrier.dst_access_mask.contains(ash::vk::AccessFlags::SHADER_READ));
//! ```

use ash::vk;

bitflags::bitflags! {
    /// Coarse pipeline stages a pass runs on
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageFlags: u32 {
        /// Rasterization (vertex through fragment and attachments)
        const GRAPHICS = 1 << 0;
        /// Compute shaders
        const COMPUTE = 1 << 1;
        /// Copies and buffer uploads
        const TRANSFER = 1 << 2;
        /// CPU access to mapped memory
        const HOST = 1 << 3;
    }
}

impl StageFlags {
    /// Vulkan pipeline stages covered by these flags
    pub fn to_vk_stages(self) -> vk::PipelineStageFlags {
        let mut stages = vk::PipelineStageFlags::empty();
        if self.contains(Self::GRAPHICS) {
            stages |= vk::PipelineStageFlags::ALL_GRAPHICS;
        }
        if self.contains(Self::COMPUTE) {
            stages |= vk::PipelineStageFlags::COMPUTE_SHADER;
        }
        if self.contains(Self::TRANSFER) {
            stages |= vk::PipelineStageFlags::TRANSFER;
        }
        if self.contains(Self::HOST) {
            stages |= vk::PipelineStageFlags::HOST;
        }
        stages
    }

    fn write_access(self) -> vk::AccessFlags {
        let mut access = vk::AccessFlags::empty();
        if self.contains(Self::GRAPHICS) {
            access |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
                | vk::AccessFlags::SHADER_WRITE;
        }
        if self.contains(Self::COMPUTE) {
            access |= vk::AccessFlags::SHADER_WRITE;
        }
        if self.contains(Self::TRANSFER) {
            access |= vk::AccessFlags::TRANSFER_WRITE;
        }
        if self.contains(Self::HOST) {
            access |= vk::AccessFlags::HOST_WRITE;
        }
        access
    }

    fn read_access(self) -> vk::AccessFlags {
        let mut access = vk::AccessFlags::empty();
        if self.contains(Self::GRAPHICS) {
            access |= vk::AccessFlags::SHADER_READ
                | vk::AccessFlags::UNIFORM_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
        }
        if self.contains(Self::COMPUTE) {
            access |= vk::AccessFlags::SHADER_READ | vk::AccessFlags::UNIFORM_READ;
        }
        if self.contains(Self::TRANSFER) {
            access |= vk::AccessFlags::TRANSFER_READ;
        }
        if self.contains(Self::HOST) {
            access |= vk::AccessFlags::HOST_READ;
        }
        access
    }
}

/// Global memory barrier between producing and consuming stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Barrier {
    /// Stages whose writes must complete
    pub src: StageFlags,
    /// Stages that will read the results
    pub dst: StageFlags,
}

impl Barrier {
    /// Barrier from `src` writes to `dst` reads
    pub const fn new(src: StageFlags, dst: StageFlags) -> Self {
        Self { src, dst }
    }

    /// Compute write → shader read (lighting result sampled by post or skybox)
    pub const fn compute_write_to_shader_read() -> Self {
        Self::new(StageFlags::COMPUTE, StageFlags::GRAPHICS.union(StageFlags::COMPUTE))
    }

    /// Attachment write → compute read (G-buffer or shadow maps consumed by lighting)
    pub const fn graphics_write_to_compute_read() -> Self {
        Self::new(StageFlags::GRAPHICS, StageFlags::COMPUTE)
    }

    /// Host write → shader read (uniform and storage buffer updates)
    pub const fn host_write_to_shader_read() -> Self {
        Self::new(StageFlags::HOST, StageFlags::GRAPHICS.union(StageFlags::COMPUTE))
    }

    /// Vulkan global memory barrier with access masks derived from the stages
    pub fn to_vk(self) -> vk::MemoryBarrier {
        vk::MemoryBarrier::builder()
            .src_access_mask(self.src.write_access())
            .dst_access_mask(self.dst.read_access())
            .build()
    }

    /// Source and destination stage masks for `vkCmdPipelineBarrier`
    pub fn to_vk_stages(self) -> (vk::PipelineStageFlags, vk::PipelineStageFlags) {
        (self.src.to_vk_stages(), self.dst.to_vk_stages())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_to_fragment_matches_vulkan_pattern() {
        let barrier = Barrier::compute_write_to_shader_read().to_vk();
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::SHADER_WRITE);
        assert!(barrier.dst_access_mask.contains(vk::AccessFlags::SHADER_READ));
    }

    #[test]
    fn test_stage_masks() {
        let (src, dst) = Barrier::graphics_write_to_compute_read().to_vk_stages();
        assert_eq!(src, vk::PipelineStageFlags::ALL_GRAPHICS);
        assert_eq!(dst, vk::PipelineStageFlags::COMPUTE_SHADER);
    }

    #[test]
    fn test_host_upload_barrier() {
        let barrier = Barrier::host_write_to_shader_read().to_vk();
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::HOST_WRITE);
    }
}
