//! Renderer configuration

use serde::{Deserialize, Serialize};

use super::Config;
use crate::render::post::PostProcessSettings;

/// Top-level settings for the deferred renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Window (presentation) width in pixels
    pub width: u32,
    /// Window (presentation) height in pixels
    pub height: u32,
    /// Resolution the G-buffer and lighting pass run at, if different from the window
    pub internal_resolution: Option<(u32, u32)>,
    /// Edge length of every shadow map, fixed at light creation
    pub shadow_map_resolution: u32,
    /// Edge length of each environment probe cube face
    pub probe_resolution: u32,
    /// Tone mapping, bloom and ambient occlusion controls
    pub post: PostProcessSettings,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1366,
            height: 720,
            internal_resolution: None,
            shadow_map_resolution: 2048,
            probe_resolution: 1024,
            post: PostProcessSettings::default(),
        }
    }
}

impl Config for RendererConfig {}

impl RendererConfig {
    /// Size the deferred passes render at.
    ///
    /// The internal resolution only applies when both of its components are
    /// non-zero; otherwise the window size is used.
    pub fn internal_size(&self) -> (u32, u32) {
        match self.internal_resolution {
            Some((w, h)) if w != 0 && h != 0 => (w, h),
            _ => (self.width, self.height),
        }
    }
}
