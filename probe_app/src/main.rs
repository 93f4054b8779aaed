//! Environment probe demo
//!
//! Builds the courtyard test scene (eight point lights, two shadow-casting
//! spot lights), bakes an environment probe above it and installs the result
//! as the skybox, then renders a few frames with flickering torches. Runs on
//! the recording backend and logs what every frame issued.
//!
//! Usage: `envmap_probe [config.toml|config.ron]`

use deferred_engine::foundation::{logging, math::constants};
use deferred_engine::prelude::*;
use deferred_engine::render::{GpuCommand, MeshHandle, ProgramHandle};
use rand::Rng;

const FRAMES: usize = 4;

/// Torch lights flicker around these positions
const TORCHES: [(usize, [f32; 3]); 4] = [
    (3, [19.5, 5.4, 5.8]),
    (4, [-24.7, 5.4, 5.8]),
    (5, [-24.7, 5.4, -8.7]),
    (6, [19.5, 5.4, -8.7]),
];

fn declare_programs(backend: &mut RecordingBackend, ctx: &mut RenderContext) {
    let lighting_uniforms: Vec<String> = ["ColorMaterial", "PositionDepth", "Normal", "ShadowCount", "OmniCount"]
        .into_iter()
        .map(String::from)
        .chain((0..2).map(|i| format!("ShadowMaps[{i}]")))
        .chain(
            [
                "LightCount",
                "CameraPosition",
                "Exposure",
                "Bloom",
                "Ambiant",
                "MinVariance",
                "AOSamples",
                "AOThreshold",
                "AORadius",
            ]
            .into_iter()
            .map(String::from),
        )
        .collect();
    let lighting_uniforms: Vec<&str> = lighting_uniforms.iter().map(String::as_str).collect();

    let declared: [(&str, &[&str], [u32; 3]); 7] = [
        (programs::DEFERRED_LIGHTING, &lighting_uniforms, [32, 32, 1]),
        (programs::SHADOW_DEPTH, &["DepthVP"], [1, 1, 1]),
        (programs::SHADOW_DEPTH_CUBE, &["DepthVP"], [1, 1, 1]),
        (programs::PROBE, &[], [1, 1, 1]),
        (programs::SKYBOX, &["Projection", "View", "SkyBox"], [1, 1, 1]),
        (programs::POST_PROCESS, &["Exposure", "Bloom"], [1, 1, 1]),
        (programs::BLOOM_BLUR, &["Horizontal"], [1, 1, 1]),
    ];
    for (name, uniforms, workgroup) in declared {
        let program = backend.declare_program(name, uniforms, workgroup);
        ctx.register_program(name, program);
    }
}

fn build_scene(
    backend: &mut RecordingBackend,
    ctx: &RenderContext,
    config: &RendererConfig,
    geometry: ProgramHandle,
) -> Result<Scene, RenderError> {
    let mut scene = Scene::new();
    scene.init(backend)?;

    scene.add_object(MeshInstance::new(
        MeshHandle(1),
        Material::new(geometry),
        Mat4::new_scaling(0.04),
        AABB::from_center_extents(Vec3::new(0.0, 500.0, 0.0), Vec3::new(1500.0, 625.0, 750.0)),
    ));

    let point_lights = [
        ([42.8, 7.1, -1.5], 10.0, [2.0, 2.0, 2.0]),
        ([42.0, 23.1, 16.1], 15.0, [2.0, 2.0, 2.0]),
        ([-50.0, 22.8, -18.6], 20.0, [2.0, 2.0, 2.0]),
        ([19.5, 5.4, 5.8], 5.0, [0.8, 0.1, 0.2]),
        ([-24.7, 5.4, 5.8], 5.0, [0.8, 0.1, 0.2]),
        ([-24.7, 5.4, -8.7], 5.0, [0.8, 0.1, 0.2]),
        ([19.5, 5.4, -8.7], 5.0, [0.8, 0.1, 0.2]),
        ([-47.0, 4.5, -1.5], 20.0, [1.8, 1.8, 1.8]),
    ];
    for (position, radius, color) in point_lights {
        scene.add_point_light(PointLight::new(Vec3::from(position), radius, Vec3::from(color)));
    }

    let resolution = config.shadow_map_resolution;
    let high = Vec3::new(45.0, 85.0, -20.0);
    let low = Vec3::new(45.0, 12.0, -18.0);
    scene.add_light(
        Light::spot(backend, high, Vec3::zeros() - high, 150.0, constants::HALF_PI, resolution)?
            .with_color(Vec3::new(2.0, 2.0, 2.0)),
    );
    scene.add_light(
        Light::spot(backend, low, Vec3::new(45.0, 0.0, -18.1) - low, 20.0, constants::HALF_PI, resolution)?
            .with_color(Vec3::new(1.5, 1.5, 1.5)),
    );

    if let Some(program) = ctx.program(programs::SKYBOX) {
        scene.set_skybox(Skybox::new(MeshHandle(2), program));
    }
    Ok(scene)
}

fn flicker(scene: &mut Scene, rng: &mut impl Rng) {
    let lights = scene.point_lights_mut();
    for (index, base) in TORCHES {
        let jitter = Vec3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()) * 0.2;
        lights[index].set_position(Vec3::from(base) + jitter);
        lights[index].set_color(Vec3::new(0.8, 0.28, 0.2) * (4.0 + 0.75 * rng.gen::<f32>()));
    }
}

fn load_config() -> RendererConfig {
    let Some(path) = std::env::args().nth(1) else {
        return RendererConfig::default();
    };
    match RendererConfig::load_from_file(&path) {
        Ok(config) => {
            log::info!("Loaded configuration from {path}");
            config
        }
        Err(e) => {
            log::warn!("Could not load {path}: {e}; using defaults");
            RendererConfig::default()
        }
    }
}

fn run() -> Result<(), RenderError> {
    let config = load_config();
    let mut backend = RecordingBackend::new();
    let mut ctx = RenderContext::new();
    declare_programs(&mut backend, &mut ctx);
    let geometry = backend.declare_program("GBuffer", &[], [1, 1, 1]);

    let mut scene = build_scene(&mut backend, &ctx, &config, geometry)?;
    log::info!(
        "Scene ready: {} objects, {} shadow lights, {} point lights",
        scene.objects().len(),
        scene.lights().len(),
        scene.point_lights().len()
    );

    let probe = EnvironmentProbe::new(Vec3::new(0.0, 100.0, 0.0), config.probe_resolution, &mut backend)?;
    let bake = probe.bake(&mut scene, &ctx, &mut backend, &config.post)?;
    log::info!(
        "Probe baked: {} dispatches, {} barriers, {} shadow maps",
        bake.dispatches,
        bake.barriers,
        bake.scene.shadow_maps_drawn
    );
    if let Some(skybox) = scene.skybox_mut() {
        skybox.set_cubemap(probe.cubemap());
    }

    let (width, height) = config.internal_size();
    let mut camera = Camera::perspective(Vec3::new(-30.0, 15.0, 0.0), 75.0, width as f32 / height as f32, 0.1, 1000.0);
    camera.look_at(Vec3::new(0.0, 10.0, 0.0));

    let mut renderer = DeferredRenderer::new(config, &ctx, &mut backend)?;
    let mut rng = rand::thread_rng();
    for _ in 0..FRAMES {
        flicker(&mut scene, &mut rng);
        backend.clear_commands();
        let report = renderer.render_frame(&mut scene, &camera, &mut backend)?;
        log::info!(
            "Frame {}: {} objects, {} shadow maps, points uploaded: {}, grid {:?}, {} barriers, {} commands",
            report.frame,
            report.objects_drawn,
            report.scene.shadow_maps_drawn,
            report.scene.point_lights_uploaded,
            report.dispatch,
            report.barriers,
            backend.commands().len()
        );
    }

    let relight = probe.relight(&mut scene, &ctx, &mut backend, &renderer.config().post)?;
    log::info!("Probe relit: {} dispatches, {} barriers", relight.dispatches, relight.barriers);

    if renderer.post_settings_mut().toggle_bloom() {
        log::info!("Bloom enabled");
    } else {
        log::info!("Bloom disabled");
    }
    backend.clear_commands();
    let report = renderer.render_frame(&mut scene, &camera, &mut backend)?;
    let blur_draws = backend.count(|c| matches!(c, GpuCommand::DrawFullscreen(_)));
    log::info!("Frame {} without bloom: {blur_draws} full-screen draws", report.frame);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_with_level(log::LevelFilter::Debug);

    log::info!("Starting environment probe demo");
    match run() {
        Ok(()) => {
            log::info!("Environment probe demo completed successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Environment probe demo failed: {e}");
            Err(e.into())
        }
    }
}
