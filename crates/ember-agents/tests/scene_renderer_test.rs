// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drives the scene renderer end to end on the headless device.

use std::sync::Arc;

use ember_agents::{
    Camera, FixedWeather, LightManager, RenderManager, Scene, SceneRenderer, SceneUpdate,
    StaticLights, WeatherManager,
};
use ember_core::math::{Aabb, Mat4, Vec3};
use ember_core::renderer::api::{Color, TextureFormat};
use ember_core::renderer::{
    DrawPassKind, GraphError, Material, MaterialFlags, Mesh, RenderPass, RendererSettings,
    ResourceError, SwapChain, ViewportShading, WeatherConstants,
};
use ember_infra::graphics::headless::{DrawKind, TextureContents};
use ember_infra::{HeadlessDevice, HeadlessSwapChain};
use ember_lanes::batch_lane::{BatchInstance, BatchRenderer};
use ember_lanes::graph_lane::ShaderLibrary;
use ember_lanes::render_lane::names;
use ember_lanes::resource_lane::ResourceKind;

const CLEAR: Color = Color::new(0.25, 0.5, 0.75, 1.0);

#[derive(Debug)]
struct Cube;

impl Mesh for Cube {
    fn index_count(&self) -> u32 {
        36
    }

    fn begin_draw(&self, _pass: &mut dyn RenderPass<'_>) {}
}

#[derive(Debug)]
struct Opaque;

impl Material for Opaque {
    fn flags(&self) -> MaterialFlags {
        MaterialFlags::CASTS_SHADOWS
    }

    fn begin_draw(&self, _pass: &mut dyn RenderPass<'_>, _kind: DrawPassKind) -> bool {
        true
    }
}

/// Adds one cube per position on the first update.
#[derive(Debug, Default)]
struct Cubes {
    positions: Vec<Vec3>,
    added: bool,
}

impl RenderManager for Cubes {
    fn update(&mut self, _ctx: &SceneUpdate<'_>, batches: &mut BatchRenderer) {
        if self.added {
            return;
        }
        self.added = true;
        let batch = batches.add_batch(Arc::new(Cube), Arc::new(Opaque));
        for position in &self.positions {
            batches
                .add_instance(
                    batch,
                    BatchInstance::Static {
                        transform: Mat4::from_translation(*position),
                        bounds: Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5))
                            .into(),
                    },
                )
                .unwrap();
        }
    }
}

#[derive(Debug, Default)]
struct TestScene {
    cubes: Cubes,
    lights: StaticLights,
    weather: FixedWeather,
}

impl TestScene {
    fn with_cubes(positions: &[Vec3]) -> Self {
        Self {
            cubes: Cubes {
                positions: positions.to_vec(),
                added: false,
            },
            ..Self::default()
        }
    }
}

impl Scene for TestScene {
    fn render_manager(&mut self) -> &mut dyn RenderManager {
        &mut self.cubes
    }

    fn light_manager(&mut self) -> &mut dyn LightManager {
        &mut self.lights
    }

    fn weather_manager(&mut self) -> &mut dyn WeatherManager {
        &mut self.weather
    }
}

fn settings(width: u32, height: u32) -> RendererSettings {
    RendererSettings {
        width,
        height,
        shadow_atlas_size: 256,
        brdf_lut_size: 16,
        ..RendererSettings::default()
    }
}

fn renderer(device: &HeadlessDevice, settings: RendererSettings) -> SceneRenderer {
    let mut renderer =
        pollster::block_on(SceneRenderer::initialize(Arc::new(device.clone()), settings))
            .expect("the renderer initializes on the headless device");
    renderer.set_clear_color(CLEAR);
    renderer
}

fn camera() -> Camera {
    Camera::look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO)
}

fn draws_in(device: &HeadlessDevice, pass: &str) -> Vec<u32> {
    device
        .executed_draws()
        .iter()
        .filter(|d| d.pass == pass && d.kind != DrawKind::Direct)
        .map(|d| d.instance_count)
        .collect()
}

// --- Frames ---

#[test]
fn test_empty_scene_presents_the_clear_color() {
    let device = HeadlessDevice::with_compute(false);
    let swap_chain = HeadlessSwapChain::new(device.clone(), 64, 48).unwrap();
    let mut renderer = renderer(&device, settings(64, 48));
    let mut scene = TestScene::default();

    renderer.render(&swap_chain, &mut scene, &camera()).unwrap();

    let back_buffer = swap_chain.back_buffer_texture().unwrap();
    let info = device.texture_info(back_buffer).unwrap();
    assert_eq!(info.contents, TextureContents::Cleared(CLEAR));
    assert_eq!(info.geometry_draws, 0, "no geometry may reach the back buffer");
    assert_eq!(swap_chain.presented_frames(), 1);
    assert_eq!(renderer.frame_index(), 1);
}

#[test]
fn test_offscreen_instance_is_culled_from_shading_only() {
    let device = HeadlessDevice::with_compute(false);
    let swap_chain = HeadlessSwapChain::new(device.clone(), 64, 48).unwrap();
    let mut renderer = renderer(&device, settings(64, 48));
    let mut scene = TestScene::with_cubes(&[Vec3::new(500.0, 0.0, 0.0)]);

    renderer.render(&swap_chain, &mut scene, &camera()).unwrap();

    assert_eq!(draws_in(&device, "GBufferPass"), vec![0], "culled set must be empty");
    assert_eq!(
        draws_in(&device, "DepthPrePass"),
        vec![1],
        "the unculled set keeps the instance"
    );
}

#[test]
fn test_weather_constants_reach_the_weather_buffer() {
    let device = HeadlessDevice::with_compute(false);
    let swap_chain = HeadlessSwapChain::new(device.clone(), 32, 32).unwrap();
    let mut renderer = renderer(&device, settings(32, 32));
    let mut scene = TestScene::default();
    let weather = WeatherConstants {
        fog_density: 0.25,
        ..WeatherConstants::default()
    };
    scene.weather = FixedWeather(weather);

    renderer.render(&swap_chain, &mut scene, &camera()).unwrap();

    let handle = renderer.resources().get_buffer(names::WEATHER).unwrap();
    let buffer = renderer.resources().buffer(&handle).unwrap().buffer;
    let bytes = device.buffer_contents(buffer).unwrap();
    let size = std::mem::size_of::<WeatherConstants>();
    let uploaded: WeatherConstants = bytemuck::pod_read_unaligned(&bytes[..size]);
    assert_eq!(uploaded, weather);
}

// --- Resize ---

#[test]
fn test_resize_recreates_viewport_resources() {
    let device = HeadlessDevice::with_compute(false);
    let swap_chain = HeadlessSwapChain::new(device.clone(), 1920, 1080).unwrap();
    let mut renderer = renderer(&device, settings(1920, 1080));
    let mut scene = TestScene::default();
    renderer.render(&swap_chain, &mut scene, &camera()).unwrap();

    let texture = |name: &str| {
        let handle = renderer.resources().get_texture(name).unwrap();
        renderer.resources().texture(&handle).unwrap().clone()
    };
    let old_depth = texture(names::DEPTH_STENCIL);
    let old_ao = texture(names::AO_BUFFER);
    assert_eq!((old_depth.width, old_depth.height), (1920, 1080));

    swap_chain.resize(1280, 720);
    renderer.render(&swap_chain, &mut scene, &camera()).unwrap();

    assert_eq!(renderer.output_size(), (1280, 720));
    let handle = renderer.resources().get_texture(names::DEPTH_STENCIL).unwrap();
    let depth = renderer.resources().texture(&handle).unwrap();
    assert_eq!((depth.width, depth.height), (1280, 720));
    assert!(device.is_view_destroyed(old_depth.view), "old depth view leaked");
    assert!(device.is_view_destroyed(old_ao.view), "old AO view leaked");
    if let Some(old) = old_ao.texture {
        assert!(device.is_texture_destroyed(old), "old AO texture leaked");
    }

    let back_buffer = swap_chain.back_buffer_texture().unwrap();
    let info = device.texture_info(back_buffer).unwrap();
    assert_eq!((info.size.width, info.size.height), (1280, 720));
    assert_eq!(info.contents, TextureContents::Cleared(CLEAR));
}

#[test]
fn test_resize_to_the_same_size_keeps_fixed_resources() {
    let device = HeadlessDevice::with_compute(false);
    let mut renderer = renderer(&device, settings(64, 48));
    let view_of = |renderer: &SceneRenderer, name: &str| {
        let handle = renderer.resources().get_texture(name).unwrap();
        renderer.resources().texture(&handle).unwrap().view
    };
    let lut = view_of(&renderer, names::BRDF_LUT);
    let atlas = view_of(&renderer, names::SHADOW_ATLAS);
    let depth = view_of(&renderer, names::DEPTH_STENCIL);

    renderer.resize(64, 48).unwrap();
    renderer.resize(64, 48).unwrap();

    assert_eq!(view_of(&renderer, names::BRDF_LUT), lut);
    assert_eq!(view_of(&renderer, names::SHADOW_ATLAS), atlas);
    assert_ne!(view_of(&renderer, names::DEPTH_STENCIL), depth);
    assert_eq!(renderer.resources().viewport(), (64, 48));
}

#[test]
fn test_render_resolution_scales_the_internal_size() {
    let device = HeadlessDevice::with_compute(false);
    let renderer = renderer(
        &device,
        RendererSettings {
            render_resolution: 0.5,
            ..settings(128, 64)
        },
    );

    assert_eq!(renderer.output_size(), (128, 64));
    assert_eq!(renderer.resources().viewport(), (64, 32));
}

// --- Screenshots ---

#[test]
fn test_screenshot_captures_the_frame_and_releases_temporaries() {
    let device = HeadlessDevice::with_compute(false);
    let mut renderer = renderer(&device, settings(100, 50));
    let mut scene = TestScene::default();

    let first = pollster::block_on(renderer.take_screenshot(&mut scene, &camera())).unwrap();
    let textures = device.live_texture_count();
    let buffers = device.live_buffer_count();
    let second = pollster::block_on(renderer.take_screenshot(&mut scene, &camera())).unwrap();

    assert_eq!((second.width, second.height), (100, 50));
    assert_eq!(second.format, TextureFormat::Rgba8Unorm);
    assert_eq!(second.pixels.len(), 100 * 50 * 4, "row padding must be stripped");
    assert_eq!(second.pixel(0, 0), Some(&[64, 128, 191, 255][..]));
    assert_eq!(second.pixel(99, 49), Some(&[64, 128, 191, 255][..]));
    assert_eq!(first, second);

    assert_eq!(device.live_texture_count(), textures, "screenshot texture leaked");
    assert_eq!(device.live_buffer_count(), buffers, "readback buffer leaked");
    assert_eq!(device.find_texture("Screenshot"), None);
}

#[test]
fn test_screenshot_leaves_no_dangling_output() {
    let device = HeadlessDevice::with_compute(false);
    let mut renderer = renderer(&device, settings(64, 48));
    let mut scene = TestScene::default();

    pollster::block_on(renderer.take_screenshot(&mut scene, &camera())).unwrap();
    let output = renderer.resources().get_texture(names::OUTPUT).unwrap();
    assert!(
        renderer.resources().texture(&output).is_err(),
        "no target was bound before the capture"
    );
    assert!(!renderer.context().resource(names::OUTPUT).unwrap().allocated);

    let swap_chain = HeadlessSwapChain::new(device.clone(), 64, 48).unwrap();
    renderer.render(&swap_chain, &mut scene, &camera()).unwrap();
    pollster::block_on(renderer.take_screenshot(&mut scene, &camera())).unwrap();
    let bound = renderer.resources().texture(&output).unwrap();
    assert_eq!(bound.view, swap_chain.acquire().unwrap().view);
    assert_eq!((bound.width, bound.height), (64, 48));
}

// --- Errors ---

#[test]
fn test_pass_init_failure_is_a_downcastable_graph_error() {
    let device = HeadlessDevice::with_compute(false);
    let result = pollster::block_on(SceneRenderer::initialize_with_shaders(
        Arc::new(device.clone()),
        settings(32, 32),
        ShaderLibrary::new(),
    ));

    let err = result.expect_err("passes cannot initialize without shaders");
    let graph_error = err
        .downcast_ref::<GraphError>()
        .expect("the graph error stays reachable through the context");
    assert!(matches!(graph_error, GraphError::PassFailed { .. }));
}

#[test]
fn test_shader_compile_failure_is_reported() {
    let device = HeadlessDevice::with_compute(false);
    device.fail_shader("post_process");

    let result = pollster::block_on(SceneRenderer::initialize(
        Arc::new(device.clone()),
        settings(32, 32),
    ));

    let err = result.expect_err("a rejected shader fails initialization");
    assert!(err.downcast_ref::<ResourceError>().is_some());
    assert!(format!("{err:#}").contains("post_process"));
}

// --- Introspection ---

#[test]
fn test_context_tracks_the_renderer() {
    let device = HeadlessDevice::with_compute(false);
    let swap_chain = HeadlessSwapChain::new(device.clone(), 64, 48).unwrap();
    let mut renderer = renderer(&device, settings(64, 48));
    let context = renderer.context();
    let panel = context.clone();

    assert_eq!(context.viewport(), (64, 48));
    assert_eq!(context.frame_index(), 0);
    let passes: Vec<_> = context.passes().iter().map(|node| node.name).collect();
    assert_eq!(passes.first(), Some(&"BRDFLUT"));
    assert_eq!(passes.last(), Some(&"PostProcessPass"));
    let depth = context.resource(names::DEPTH_STENCIL).unwrap();
    assert_eq!(depth.kind, ResourceKind::DepthStencil);
    assert!(depth.allocated);
    assert_eq!(depth.size, Some((64, 48)));

    renderer.set_shading(ViewportShading::Wireframe);
    renderer
        .render(&swap_chain, &mut TestScene::default(), &camera())
        .unwrap();

    assert_eq!(panel.frame_index(), 1, "clones share the same state");
    assert_eq!(panel.shading(), ViewportShading::Wireframe);
    assert!(panel.timings().iter().any(|t| t.name == "GBufferPass"));
    assert!(panel.resource(names::OUTPUT).is_some());

    renderer.resize(32, 16).unwrap();
    assert_eq!(panel.viewport(), (32, 16));
    assert_eq!(
        panel.resource(names::DEPTH_STENCIL).unwrap().size,
        Some((32, 16))
    );
}
