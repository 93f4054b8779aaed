//! Post-processing: bloom and tone mapping
//!
//! Negative `bloom` (and `exposure`) values are sentinels: a negative bloom
//! disables the blur chain, a negative exposure keeps the output linear.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::render::backend::{
    set_uniform_or_log, FramebufferHandle, GpuBackend, ProgramHandle, TextureDesc, TextureFormat, TextureHandle,
    UniformValue,
};
use crate::render::error::BackendResult;

/// Lighting and post-processing controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessSettings {
    /// Tone mapping exposure; negative keeps the result linear
    pub exposure: f32,
    /// Bloom strength; negative disables bloom
    pub bloom: f32,
    /// Number of separable blur iterations over the bloom target
    pub bloom_blur: u32,
    /// Bloom target is the internal resolution divided by `2^bloom_downsampling`
    pub bloom_downsampling: u32,
    /// Ambient light added to every lit pixel
    pub ambient: [f32; 3],
    /// Variance clamp of variance shadow maps
    pub min_variance: f32,
    /// Ambient occlusion sample count
    pub ao_samples: u32,
    /// Ambient occlusion depth threshold
    pub ao_threshold: f32,
    /// Ambient occlusion sampling radius in pixels
    pub ao_radius: f32,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            exposure: 2.0,
            bloom: 1.2,
            bloom_blur: 2,
            bloom_downsampling: 3,
            ambient: [0.06; 3],
            min_variance: 1e-7,
            ao_samples: 16,
            ao_threshold: 1.0,
            ao_radius: 200.0,
        }
    }
}

impl PostProcessSettings {
    /// Whether the bloom chain runs
    pub fn bloom_enabled(&self) -> bool {
        self.bloom > 0.0
    }

    /// Flip bloom on or off, keeping its strength. Returns the new state.
    ///
    /// A zero strength has no sign to flip and stays off.
    pub fn toggle_bloom(&mut self) -> bool {
        if self.bloom != 0.0 {
            self.bloom = -self.bloom;
        } else {
            log::warn!("Bloom strength is zero; set a positive strength to enable bloom");
            self.bloom = 0.0;
        }
        self.bloom_enabled()
    }

    /// Same settings with linear output and no bloom (probe baking)
    #[must_use]
    pub const fn linear(mut self) -> Self {
        self.exposure = -1.0;
        self.bloom = -1.0;
        self
    }

    /// Assign the lighting-pass uniforms of these settings to `program`
    pub fn apply_lighting(&self, backend: &mut dyn GpuBackend, program: ProgramHandle) {
        let uniforms = [
            ("Exposure", UniformValue::Float(self.exposure)),
            ("Bloom", UniformValue::Float(self.bloom)),
            ("Ambiant", UniformValue::Vec3(Vec3::from(self.ambient))),
            ("MinVariance", UniformValue::Float(self.min_variance)),
            ("AOSamples", UniformValue::Int(self.ao_samples as i32)),
            ("AOThreshold", UniformValue::Float(self.ao_threshold)),
            ("AORadius", UniformValue::Float(self.ao_radius)),
        ];
        for (name, value) in uniforms {
            set_uniform_or_log(backend, program, name, value);
        }
    }

    /// Bloom target size for a given internal resolution
    pub const fn bloom_size(&self, width: u32, height: u32) -> (u32, u32) {
        let shift = if self.bloom_downsampling > 16 { 16 } else { self.bloom_downsampling };
        let w = width >> shift;
        let h = height >> shift;
        (if w == 0 { 1 } else { w }, if h == 0 { 1 } else { h })
    }
}

/// Programs used by the post-processing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostPrograms {
    /// Final composite and tone mapping
    pub composite: Option<ProgramHandle>,
    /// Separable blur
    pub blur: Option<ProgramHandle>,
}

/// What the post pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostReport {
    /// Full-screen blur draws
    pub blur_draws: usize,
    /// Whether the composite reached the default framebuffer
    pub composited: bool,
}

/// Bloom ping-pong targets and the composite into the default framebuffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcess {
    targets: [(TextureHandle, FramebufferHandle); 2],
    size: (u32, u32),
}

impl PostProcess {
    /// Allocate bloom targets for an internal resolution
    pub fn new(
        backend: &mut dyn GpuBackend,
        settings: &PostProcessSettings,
        width: u32,
        height: u32,
    ) -> BackendResult<Self> {
        let size = settings.bloom_size(width, height);
        let mut target = |label: &str| -> BackendResult<(TextureHandle, FramebufferHandle)> {
            let texture = backend.create_texture(&TextureDesc::new_2d(label, size.0, size.1, TextureFormat::Rgba16F))?;
            let framebuffer = backend.create_framebuffer(&[texture], None)?;
            Ok((texture, framebuffer))
        };
        let targets = [target("bloom ping")?, target("bloom pong")?];
        log::debug!("Bloom targets created at {}x{}", size.0, size.1);
        Ok(Self { targets, size })
    }

    /// Bloom target size
    pub const fn bloom_size(&self) -> (u32, u32) {
        self.size
    }

    /// Texture holding the blurred bloom after [`PostProcess::run`]
    pub const fn bloom_texture(&self) -> TextureHandle {
        self.targets[1].0
    }

    /// Blur the bright parts of `lit` and composite into the default framebuffer
    pub fn run(
        &self,
        backend: &mut dyn GpuBackend,
        programs: PostPrograms,
        settings: &PostProcessSettings,
        lit: TextureHandle,
    ) -> PostReport {
        let mut report = PostReport::default();

        if let (true, Some(blur)) = (settings.bloom_enabled(), programs.blur) {
            backend.use_program(blur);
            let mut source = lit;
            for _ in 0..settings.bloom_blur {
                for (horizontal, (texture, framebuffer)) in [(1, self.targets[0]), (0, self.targets[1])] {
                    set_uniform_or_log(backend, blur, "Horizontal", UniformValue::Int(horizontal));
                    backend.bind_texture(0, source);
                    backend.begin_framebuffer(Some(framebuffer), None);
                    backend.draw_fullscreen();
                    backend.end_framebuffer();
                    report.blur_draws += 1;
                    source = texture;
                }
            }
        }

        let Some(composite) = programs.composite else {
            log::trace!("No composite program, skipping tone mapping");
            backend.use_none();
            return report;
        };
        backend.use_program(composite);
        backend.bind_texture(0, lit);
        backend.bind_texture(1, self.bloom_texture());
        set_uniform_or_log(backend, composite, "Exposure", UniformValue::Float(settings.exposure));
        set_uniform_or_log(backend, composite, "Bloom", UniformValue::Float(settings.bloom));
        backend.begin_framebuffer(None, None);
        backend.draw_fullscreen();
        backend.end_framebuffer();
        backend.use_none();
        report.composited = true;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::RecordingBackend;

    fn programs(backend: &mut RecordingBackend) -> PostPrograms {
        PostPrograms {
            composite: Some(backend.declare_program("PostProcess", &["Exposure", "Bloom"], [1, 1, 1])),
            blur: Some(backend.declare_program("BloomBlur", &["Horizontal"], [1, 1, 1])),
        }
    }

    #[test]
    fn test_toggle_bloom_negates() {
        let mut settings = PostProcessSettings::default();
        assert!(!settings.toggle_bloom());
        assert!((settings.bloom + 1.2).abs() < f32::EPSILON);
        assert!(settings.toggle_bloom());
        assert!((settings.bloom - 1.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_toggle_zero_bloom_stays_off_without_negative_zero() {
        let mut settings = PostProcessSettings {
            bloom: -0.0,
            ..PostProcessSettings::default()
        };
        assert!(!settings.toggle_bloom());
        assert!(settings.bloom.is_sign_positive());
        assert!(!settings.toggle_bloom());
        assert_eq!(settings.bloom, 0.0);

        settings.bloom = 0.8;
        assert!(!settings.toggle_bloom());
        assert!(settings.toggle_bloom());
    }

    #[test]
    fn test_bloom_size_downsamples() {
        let settings = PostProcessSettings::default();
        assert_eq!(settings.bloom_size(1366, 720), (170, 90));
        assert_eq!(settings.bloom_size(4, 4), (1, 1));
    }

    #[test]
    fn test_blur_chain_runs_configured_passes() {
        let mut backend = RecordingBackend::new();
        let settings = PostProcessSettings::default();
        let post = PostProcess::new(&mut backend, &settings, 1366, 720).unwrap();
        let programs = programs(&mut backend);

        let report = post.run(&mut backend, programs, &settings, TextureHandle(0));
        assert_eq!(report.blur_draws, 4);
        assert!(report.composited);
    }

    #[test]
    fn test_negative_bloom_skips_blur() {
        let mut backend = RecordingBackend::new();
        let mut settings = PostProcessSettings::default();
        settings.toggle_bloom();
        let post = PostProcess::new(&mut backend, &settings, 640, 360).unwrap();
        let programs = programs(&mut backend);

        let report = post.run(&mut backend, programs, &settings, TextureHandle(0));
        assert_eq!(report.blur_draws, 0);
        assert_eq!(backend.uniform(programs.composite.unwrap(), "Bloom"), Some(UniformValue::Float(-1.2)));
    }

    #[test]
    fn test_linear_sentinels() {
        let linear = PostProcessSettings::default().linear();
        assert!((linear.exposure + 1.0).abs() < f32::EPSILON);
        assert!(!linear.bloom_enabled());
        assert_eq!(linear.ao_samples, 16);
    }
}
