//! Specialized collection types
//!
//! Stable, generation-checked keys for graph nodes. A key outlives removal of
//! its node without aliasing a later insertion, so dangling keys are caught
//! instead of silently resolving to a different node.

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to a node in a [`TransformGraph`](crate::scene::TransformGraph)
    pub struct TransformKey;
}

/// Keyed storage for transform nodes
pub type TransformMap<T> = SlotMap<TransformKey, T>;
