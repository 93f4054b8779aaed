//! Geometry buffer
//!
//! Three RGBA32F colour targets plus depth at the internal resolution:
//!
//! | channel | xyz | w |
//! |---|---|---|
//! | 0 | albedo | material id |
//! | 1 | world position | depth |
//! | 2 | encoded normal (xy), F0 (z) | roughness |
//!
//! Channel 0 is overwritten in place with the lit colour by the lighting pass.

use crate::render::backend::{FramebufferHandle, GpuBackend, TextureDesc, TextureFormat, TextureHandle};
use crate::render::binding::GBUFFER_CHANNELS;
use crate::render::error::BackendResult;

/// G-buffer render targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GBuffer {
    channels: [TextureHandle; GBUFFER_CHANNELS as usize],
    depth: TextureHandle,
    framebuffer: FramebufferHandle,
    width: u32,
    height: u32,
}

impl GBuffer {
    /// Allocate every target at `width` x `height`
    pub fn new(backend: &mut dyn GpuBackend, width: u32, height: u32) -> BackendResult<Self> {
        let mut create = |label: &str, format| {
            backend.create_texture(&TextureDesc::new_2d(label, width, height, format))
        };
        let channels = [
            create("gbuffer color/material", TextureFormat::Rgba32F)?,
            create("gbuffer position/depth", TextureFormat::Rgba32F)?,
            create("gbuffer normal/F0/R", TextureFormat::Rgba32F)?,
        ];
        let depth = create("gbuffer depth", TextureFormat::Depth32F)?;
        let framebuffer = backend.create_framebuffer(&channels, Some(depth))?;
        log::debug!("G-buffer created at {width}x{height}");

        Ok(Self {
            channels,
            depth,
            framebuffer,
            width,
            height,
        })
    }

    /// Colour target `index` (0..3)
    pub const fn channel(&self, index: usize) -> TextureHandle {
        self.channels[index]
    }

    /// All colour targets in channel order
    pub const fn channels(&self) -> &[TextureHandle; GBUFFER_CHANNELS as usize] {
        &self.channels
    }

    /// Target holding the lit colour after the lighting pass
    pub const fn lit_color(&self) -> TextureHandle {
        self.channels[0]
    }

    /// Depth attachment
    pub const fn depth(&self) -> TextureHandle {
        self.depth
    }

    /// Framebuffer with every target attached
    pub const fn framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }

    /// Size in pixels
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
