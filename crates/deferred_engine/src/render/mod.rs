//! # Deferred Rendering
//!
//! Pipeline orchestration over a narrow device interface.
//!
//! ## Architecture
//!
//! - **Backend**: [`GpuBackend`] is the only way the core reaches the device;
//!   [`RecordingBackend`] implements it headlessly for tests and tools
//! - **Binding convention**: fixed block slots and texture units shared by
//!   every component, see [`binding`]
//! - **Frame graph**: passes declare reads and writes, barriers follow
//! - **Lights**: shadow-casting light envelope plus packed point lights
//! - **Pipeline**: G-buffer, shadows, compute lighting, post-processing
//! - **Probe**: the same pipeline baked into a cube map

pub mod backend;
pub mod binding;
pub mod context;
pub mod deferred;
pub mod error;
pub mod gbuffer;
pub mod graph;
pub mod lighting;
pub mod lights;
pub mod post;
pub mod probe;
pub mod recording;
pub mod sync;


pub use backend::{
    BufferHandle, FramebufferHandle, GpuBackend, ImageAccess, ImageBinding, MeshHandle, ProgramHandle, TextureDesc,
    TextureFormat, TextureHandle, UniformValue,
};
pub use context::{programs, RenderContext};
pub use deferred::{DeferredRenderer, FrameReport, Stage};
pub use error::{BackendResult, RenderError};
pub use gbuffer::GBuffer;
pub use graph::{Access, FrameGraph, ResourceId, Step};
pub use lighting::LightingPass;
pub use lights::{Light, LightKind, PointLight, ShadowMap};
pub use post::{PostProcess, PostProcessSettings};
pub use probe::{EnvironmentProbe, ProbeReport};
pub use recording::{GpuCommand, RecordingBackend};
pub use sync::{Barrier, StageFlags};
