//! # Deferred Engine
//!
//! Core of a real-time deferred renderer.
//!
//! ## Features
//!
//! - **Transform graph**: arena-backed hierarchy with eager world-matrix propagation
//! - **Lights and shadows**: directional, spot and omnidirectional shadow casters
//!   plus a packed array of point lights
//! - **Scene**: dirty-flag driven refresh of light blocks, shadow maps and point lights
//! - **Deferred pipeline**: G-buffer, shadows, compute lighting and post-processing,
//!   with barriers derived from declared pass dependencies
//! - **Environment probes**: cube-map baking through the same pipeline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deferred_engine::prelude::*;
//!
//! fn main() -> Result<(), RenderError> {
//!     let mut backend = RecordingBackend::new();
//!     let mut ctx = RenderContext::new();
//!     let lighting = backend.declare_program(programs::DEFERRED_LIGHTING, &[], [32, 32, 1]);
//!     ctx.register_program(programs::DEFERRED_LIGHTING, lighting);
//!
//!     let mut scene = Scene::new();
//!     scene.init(&mut backend)?;
//!     scene.add_point_light(PointLight::new(Vec3::new(0.0, 5.0, 0.0), 20.0, Vec3::new(1.0, 0.8, 0.6)));
//!
//!     let camera = Camera::perspective(Vec3::new(0.0, 2.0, 10.0), 60.0, 16.0 / 9.0, 0.1, 500.0);
//!     let mut renderer = DeferredRenderer::new(RendererConfig::default(), &ctx, &mut backend)?;
//!     let report = renderer.render_frame(&mut scene, &camera, &mut backend)?;
//!     assert_eq!(report.barriers, 2);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigFormat, RendererConfig},
        foundation::math::{Mat4, Quat, Transform, Vec3},
        render::{
            programs, DeferredRenderer, EnvironmentProbe, FrameReport, GpuBackend, Light, PointLight,
            PostProcessSettings, RecordingBackend, RenderContext, RenderError,
        },
        scene::{Camera, Material, MeshInstance, Scene, Skybox, TransformGraph, AABB},
    };
}
