//! Per-frame pass dependency list
//!
//! Passes are declared in execution order together with the resources they
//! read and write. [`FrameGraph::compile`] walks that list and places a
//! memory barrier in front of every pass that touches a resource whose
//! latest write has not been synchronised yet. Barriers are therefore a
//! consequence of the declarations instead of hand-placed calls.
//!
//! Passes never reorder, there is no
//! resource aliasing, and every barrier is a global memory barrier whose
//! source stages are those of the writes it covers.

use crate::render::sync::{Barrier, StageFlags};

/// Resources tracked across the passes of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceId {
    /// G-buffer channel (0 = colour/material, 1 = position/depth, 2 = normal/F0/roughness)
    GBuffer(u8),
    /// Shadow map of the shadow-casting light at this index
    ShadowMap(usize),
    /// Cube shadow map of the omnidirectional light at this index
    OmniShadowMap(usize),
    /// Packed non-shadow point light array
    PointLightBuffer,
    /// Per-light uniform blocks
    LightBlocks,
    /// Default framebuffer
    Backbuffer,
    /// Bloom downsample/blur target
    Bloom,
    /// Probe G-buffer channel (cube map, one layer per face)
    ProbeChannel(u8),
}

/// A resource, or one array layer of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Access {
    /// Accessed resource
    pub resource: ResourceId,
    /// Single layer, or every layer when `None`
    pub layer: Option<u32>,
}

impl Access {
    /// Every layer of `resource`
    pub const fn whole(resource: ResourceId) -> Self {
        Self { resource, layer: None }
    }

    /// One layer of `resource`
    pub const fn layer(resource: ResourceId, layer: u32) -> Self {
        Self {
            resource,
            layer: Some(layer),
        }
    }

    /// Whether two accesses can touch the same memory
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.resource != other.resource {
            return false;
        }
        match (self.layer, other.layer) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl From<ResourceId> for Access {
    fn from(resource: ResourceId) -> Self {
        Self::whole(resource)
    }
}

/// Declared pass: identifier, stage and resource accesses
#[derive(Debug, Clone)]
pub struct PassDecl<P> {
    pass: P,
    stage: StageFlags,
    reads: Vec<Access>,
    writes: Vec<Access>,
}

impl<P> PassDecl<P> {
    /// Declare a read
    pub fn reads(&mut self, access: impl Into<Access>) -> &mut Self {
        self.reads.push(access.into());
        self
    }

    /// Declare a write
    pub fn writes(&mut self, access: impl Into<Access>) -> &mut Self {
        self.writes.push(access.into());
        self
    }

    fn touches(&self, access: &Access) -> bool {
        self.reads.iter().chain(&self.writes).any(|a| a.overlaps(access))
    }
}

/// Compiled step: either run a pass or issue a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<P> {
    /// Synchronise before continuing
    Barrier(Barrier),
    /// Execute the pass
    Pass(P),
}

/// Ordered pass list with declared dependencies
#[derive(Debug, Clone)]
pub struct FrameGraph<P> {
    passes: Vec<PassDecl<P>>,
    imports: Vec<(Access, StageFlags)>,
    exports: Vec<(Access, StageFlags)>,
}

impl<P> Default for FrameGraph<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> FrameGraph<P> {
    /// Create an empty graph
    pub const fn new() -> Self {
        Self {
            passes: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Append a pass running on `stage`
    pub fn add_pass(&mut self, pass: P, stage: StageFlags) -> &mut PassDecl<P> {
        self.passes.push(PassDecl {
            pass,
            stage,
            reads: Vec::new(),
            writes: Vec::new(),
        });
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    /// Mark a resource as written by `producer` before the graph starts
    pub fn import(&mut self, access: impl Into<Access>, producer: StageFlags) {
        self.imports.push((access.into(), producer));
    }

    /// Mark a resource as consumed by `consumer` after the graph finishes
    pub fn export(&mut self, access: impl Into<Access>, consumer: StageFlags) {
        self.exports.push((access.into(), consumer));
    }

    /// Number of declared passes
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether no pass was declared
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Resolve the declarations into an ordered list of passes and barriers
    pub fn compile(self) -> Vec<Step<P>> {
        let mut steps = Vec::with_capacity(self.passes.len() * 2);
        let mut pending = self.imports;

        for decl in self.passes {
            let src = pending
                .iter()
                .filter(|(access, _)| decl.touches(access))
                .fold(StageFlags::empty(), |acc, (_, stage)| acc | *stage);
            if !src.is_empty() {
                steps.push(Step::Barrier(Barrier::new(src, decl.stage)));
                pending.retain(|(_, stage)| !src.contains(*stage));
            }
            pending.extend(decl.writes.iter().map(|access| (*access, decl.stage)));
            steps.push(Step::Pass(decl.pass));
        }

        let mut src = StageFlags::empty();
        let mut dst = StageFlags::empty();
        for (export, consumer) in &self.exports {
            for (access, stage) in &pending {
                if access.overlaps(export) {
                    src |= *stage;
                    dst |= *consumer;
                }
            }
        }
        if !src.is_empty() {
            steps.push(Step::Barrier(Barrier::new(src, dst)));
        }

        steps
    }
}
