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

//! Runs the whole deferred graph on the headless device.

use std::sync::Arc;

use ember_core::math::{Aabb, Mat4, Vec3};
use ember_core::renderer::api::*;
use ember_core::renderer::{
    DrawPassKind, GraphicsDevice, Light, Material, MaterialFlags, Mesh, NullProfiler, PointLight,
    RenderPass, RendererSettings, ViewportShading, WeatherConstants,
};
use ember_infra::graphics::headless::{DrawKind, TextureContents};
use ember_infra::HeadlessDevice;
use ember_lanes::batch_lane::{BatchInstance, BatchRenderer};
use ember_lanes::culling_lane::{CullingContext, CullingFlags, CullingManager, DrawTypeId};
use ember_lanes::graph_lane::{
    FrameData, PassInitContext, RenderGraph, ShaderLibrary, SharedLayouts, ViewData,
};
use ember_lanes::render_lane::{self, names, FrameResources};
use ember_lanes::resource_lane::ResourceBuilder;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
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

struct Pipeline {
    device: HeadlessDevice,
    resources: ResourceBuilder,
    graph: RenderGraph,
    layouts: SharedLayouts,
    frame_resources: FrameResources,
    batches: BatchRenderer,
    culling: CullingContext,
    manager: CullingManager,
    output: TextureId,
    lights: Vec<Light>,
}

fn settings() -> RendererSettings {
    RendererSettings {
        width: WIDTH,
        height: HEIGHT,
        shadow_atlas_size: 256,
        brdf_lut_size: 16,
        ..RendererSettings::default()
    }
}

fn camera() -> ViewData {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh(1.0, WIDTH as f32 / HEIGHT as f32, 0.1, 100.0);
    ViewData::new(view, projection, 0.1, 100.0, (WIDTH, HEIGHT))
}

impl Pipeline {
    fn new(compute: bool) -> Self {
        let device = HeadlessDevice::with_compute(compute);
        let mut resources = ResourceBuilder::new(Arc::new(device.clone()), WIDTH, HEIGHT);
        let frame_resources = render_lane::create_frame_resources(&mut resources).unwrap();
        let shaders = ShaderLibrary::with_builtin_shaders(&device).unwrap();
        let layouts = SharedLayouts::new(&device).unwrap();
        let mut graph = render_lane::build_deferred_graph().unwrap();
        graph
            .init(&mut PassInitContext {
                device: &device,
                resources: &mut resources,
                shaders: &shaders,
                layouts: &layouts,
                settings: &settings(),
            })
            .unwrap();
        resources.create_resources().unwrap();

        let output = device
            .create_texture(&TextureDescriptor::d2(
                "Output",
                WIDTH,
                HEIGHT,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
            ))
            .unwrap();
        let view = device
            .create_texture_view(output, &TextureViewDescriptor::default())
            .unwrap();
        resources
            .import_texture(
                names::OUTPUT,
                Some(output),
                view,
                (WIDTH, HEIGHT),
                TextureFormat::Rgba8Unorm,
            )
            .unwrap();

        Self {
            device,
            resources,
            graph,
            layouts,
            frame_resources,
            batches: BatchRenderer::new(),
            culling: CullingContext::new(),
            manager: CullingManager::new(),
            output,
            lights: Vec::new(),
        }
    }

    fn add_cubes(&mut self, positions: &[Vec3]) {
        let batch = self.batches.add_batch(Arc::new(Cube), Arc::new(Opaque));
        for position in positions {
            self.batches
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

    fn render(&mut self) {
        let device: &dyn GraphicsDevice = &self.device;
        let view = camera();
        let camera_buffer = self
            .resources
            .buffer(&self.frame_resources.camera)
            .unwrap()
            .buffer;
        device
            .write_buffer(camera_buffer, 0, bytemuck::bytes_of(&view.to_constants()))
            .unwrap();

        self.batches.visibility_test_all(&view.frustum);
        self.batches.begin_update();
        self.batches.update_all().unwrap();
        self.batches.end_update(device).unwrap();
        self.culling.clear();
        self.batches.append_draw_types(&mut self.culling).unwrap();
        self.manager.upload(device, &self.culling).unwrap();
        self.batches
            .prepare_bind_groups(device, self.layouts.instances, &self.manager)
            .unwrap();

        let camera_bind_group = self
            .layouts
            .camera_bind_group(device, camera_buffer)
            .unwrap();
        let frame = FrameData {
            frame_index: 0,
            view,
            clear_color: CLEAR,
            shading: ViewportShading::Rendered,
            culling_flags: CullingFlags::FRUSTUM,
            camera_bind_group,
            batches: &self.batches,
            culling: &self.culling,
            culling_manager: &self.manager,
            lights: &self.lights,
            weather: WeatherConstants::default(),
        };
        self.graph
            .execute(device, &self.resources, &frame, &NullProfiler)
            .unwrap();
    }

    fn draws_in(&self, pass: &str) -> Vec<u32> {
        self.device
            .executed_draws()
            .iter()
            .filter(|d| d.pass == pass && d.kind != DrawKind::Direct)
            .map(|d| d.instance_count)
            .collect()
    }
}

// --- Empty frames ---

#[test]
fn test_empty_frame_presents_the_clear_color() {
    for compute in [false, true] {
        let mut pipeline = Pipeline::new(compute);
        pipeline.render();

        let info = pipeline.device.texture_info(pipeline.output).unwrap();
        assert_eq!(info.contents, TextureContents::Cleared(CLEAR));
        assert_eq!(info.geometry_draws, 0, "no geometry may reach the output");
        assert!(
            pipeline
                .device
                .executed_draws()
                .iter()
                .filter(|d| d.kind != DrawKind::Direct)
                .all(|d| !d.rasterizes()),
            "compute={compute}: an empty frame rasterized geometry"
        );
        assert_eq!(pipeline.device.submission_count(), 1);
    }
}

#[test]
fn test_empty_type_still_gets_an_args_record() {
    let mut pipeline = Pipeline::new(false);
    pipeline.add_cubes(&[]);
    pipeline.render();

    assert_eq!(pipeline.culling.type_count(), 1);
    assert_eq!(pipeline.culling.instance_count(DrawTypeId(0)), 0);
    assert_eq!(pipeline.draws_in("GBufferPass"), vec![0]);
    assert!(pipeline.draws_in("DepthPrePass").iter().all(|&n| n == 0));
}

// --- Culling ---

#[test]
fn test_offscreen_instance_is_culled_but_still_casts_depth() {
    let mut pipeline = Pipeline::new(false);
    pipeline.add_cubes(&[Vec3::new(500.0, 0.0, 0.0)]);
    pipeline.render();

    assert_eq!(pipeline.draws_in("GBufferPass"), vec![0], "culled set must be empty");
    assert_eq!(
        pipeline.draws_in("DepthPrePass"),
        vec![1],
        "the unculled set keeps the instance"
    );
}

#[test]
fn test_cpu_kernel_keeps_visible_instances() {
    let mut pipeline = Pipeline::new(false);
    pipeline.add_cubes(&[Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 900.0, 0.0)]);
    pipeline.render();

    assert_eq!(pipeline.draws_in("GBufferPass"), vec![2]);
    assert_eq!(pipeline.draws_in("DepthPrePass"), vec![3]);
}

#[test]
fn test_gpu_kernel_dispatches_one_workgroup_per_256_instances() {
    let mut pipeline = Pipeline::new(true);
    let positions: Vec<_> = (0..300).map(|i| Vec3::new(i as f32 * 0.01, 0.0, 0.0)).collect();
    pipeline.add_cubes(&positions);
    pipeline.render();

    let dispatches = pipeline.device.executed_dispatches();
    let cull = dispatches
        .iter()
        .find(|d| d.pass == "ObjectCull")
        .expect("the cull kernel must dispatch");
    assert_eq!(cull.workgroups, [2, 1, 1]);
}

// --- Lights and shadows ---

#[test]
fn test_cpu_light_grid_bins_a_centered_light() {
    let mut pipeline = Pipeline::new(false);
    pipeline.lights.push(Light::Point(PointLight {
        position: Vec3::ZERO,
        color: Vec3::ONE,
        intensity: 1.0,
        range: 2.0,
        casts_shadows: false,
    }));
    pipeline.render();

    let grid = pipeline.resources.get_buffer(names::LIGHT_GRID).unwrap();
    let buffer = pipeline.resources.buffer(&grid).unwrap().buffer;
    let bytes = pipeline.device.buffer_contents(buffer).unwrap();
    let cells: &[[u32; 2]] = bytemuck::cast_slice(&bytes);
    assert_eq!(cells.len(), 4 * 3, "64x48 pixels in 16 pixel tiles");
    assert!(cells.iter().any(|cell| cell[1] == 1));
    assert!(cells.iter().all(|cell| cell[1] <= 1));
}

#[test]
fn test_shadow_casters_draw_once_per_point_light_face() {
    let mut pipeline = Pipeline::new(false);
    pipeline.add_cubes(&[Vec3::ZERO]);
    pipeline.lights.push(Light::Point(PointLight {
        position: Vec3::new(0.0, 3.0, 0.0),
        color: Vec3::ONE,
        intensity: 1.0,
        range: 10.0,
        casts_shadows: true,
    }));
    pipeline.render();

    assert_eq!(pipeline.draws_in("ShadowMapPass"), vec![1; 6]);
}

// --- Resize ---

#[test]
fn test_resize_keeps_fixed_resources() {
    let mut pipeline = Pipeline::new(false);
    pipeline.render();

    let lut = pipeline.resources.get_texture(names::BRDF_LUT).unwrap();
    let lut_view = pipeline.resources.texture(&lut).unwrap().view;
    let atlas = pipeline.resources.get_texture(names::SHADOW_ATLAS).unwrap();
    let atlas_view = pipeline.resources.texture(&atlas).unwrap().view;
    let old_depth = pipeline
        .resources
        .texture(&pipeline.frame_resources.depth)
        .unwrap()
        .clone();

    pipeline.resources.resize_begin();
    pipeline.resources.resize_end(WIDTH, HEIGHT).unwrap();

    assert_eq!(pipeline.resources.texture(&lut).unwrap().view, lut_view);
    assert_eq!(pipeline.resources.texture(&atlas).unwrap().view, atlas_view);
    let depth = pipeline
        .resources
        .texture(&pipeline.frame_resources.depth)
        .unwrap();
    assert_eq!((depth.width, depth.height), (WIDTH, HEIGHT));
    assert!(pipeline.device.is_view_destroyed(old_depth.view));

    pipeline.render();
    let info = pipeline.device.texture_info(pipeline.output).unwrap();
    assert_eq!(info.contents, TextureContents::Cleared(CLEAR));
}
