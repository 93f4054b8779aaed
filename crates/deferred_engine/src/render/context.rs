//! Render context
//!
//! Explicit registry of shader programs, passed to every component that
//! needs to look one up by name.

use std::collections::HashMap;

use crate::render::backend::ProgramHandle;

/// Well-known program names
pub mod programs {
    /// Deferred lighting compute program
    pub const DEFERRED_LIGHTING: &str = "DeferredShadowCS";
    /// Depth-only program for 2D shadow maps
    pub const SHADOW_DEPTH: &str = "ShadowDepth";
    /// Layered depth program for omni cube shadow maps
    pub const SHADOW_DEPTH_CUBE: &str = "ShadowDepthCube";
    /// Layered G-buffer fill for environment probes
    pub const PROBE: &str = "Probe";
    /// Skybox program
    pub const SKYBOX: &str = "Skybox";
    /// Tone mapping and bloom composite
    pub const POST_PROCESS: &str = "PostProcess";
    /// Separable bloom blur
    pub const BLOOM_BLUR: &str = "BloomBlur";
}

/// Named program registry
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    programs: HashMap<String, ProgramHandle>,
}

impl RenderContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a program under `name`
    pub fn register_program(&mut self, name: impl Into<String>, program: ProgramHandle) {
        let name = name.into();
        log::debug!("Registered program '{name}' as {program:?}");
        self.programs.insert(name, program);
    }

    /// Look up a program, logging when it is missing
    pub fn program(&self, name: &str) -> Option<ProgramHandle> {
        let found = self.programs.get(name).copied();
        if found.is_none() {
            log::error!("Program not found: {name}");
        }
        found
    }

    /// Whether `name` is registered
    pub fn has_program(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_miss() {
        let mut ctx = RenderContext::new();
        ctx.register_program(programs::SKYBOX, ProgramHandle(4));

        assert_eq!(ctx.program(programs::SKYBOX), Some(ProgramHandle(4)));
        assert_eq!(ctx.program(programs::BLOOM_BLUR), None);
        assert!(!ctx.has_program(programs::BLOOM_BLUR));
    }
}
