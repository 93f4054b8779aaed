//! Scene management
//!
//! Everything the renderer draws: the transform hierarchy, renderable
//! objects, the camera, the skybox and the [`Scene`] aggregator that owns
//! the lights and tracks which GPU-side state is stale.

pub mod bounds;
pub mod camera;
pub mod renderable;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod skybox;
pub mod transform_graph;

pub use bounds::{Frustum, Plane, AABB};
pub use camera::{Camera, GpuViewProjection};
pub use renderable::{Material, MeshInstance};
pub use scene::{Scene, UpdateReport};
pub use skybox::Skybox;
pub use transform_graph::{TransformGraph, TransformNode};
