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

use std::sync::Arc;

use anyhow::Context;
use ember_core::math::Frustum;
use ember_core::renderer::api::{BindGroupId, BufferId, Color, TextureFormat, TextureId, TextureViewId};
use ember_core::renderer::{
    GraphicsDevice, Light, RenderError, RendererSettings, ResourceError, SwapChain, ViewportShading,
};
use ember_lanes::batch_lane::BatchRenderer;
use ember_lanes::culling_lane::{CullingContext, CullingFlags, CullingManager};
use ember_lanes::graph_lane::{FrameData, PassInitContext, RenderGraph, ShaderLibrary, SharedLayouts};
use ember_lanes::render_lane::{self, names, FrameResources};
use ember_lanes::resource_lane::ResourceBuilder;
use ember_telemetry::CpuProfiler;

use super::camera::Camera;
use super::context::RendererContext;
use super::scene::{Scene, SceneUpdate};

/// A texture the graph's final pass writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// The texture behind `view`, when the caller owns one.
    pub texture: Option<TextureId>,
    /// The view to render into.
    pub view: TextureViewId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Texel format of the view.
    pub format: TextureFormat,
}

/// Owns the deferred frame graph and everything it renders from.
///
/// Size-dependent resources follow the output size scaled by
/// `RendererSettings::render_resolution`. A resize is atomic: `resize`
/// releases and recreates them before returning, so no frame can observe a
/// half-resized resource set.
#[derive(Debug)]
pub struct SceneRenderer {
    pub(super) device: Arc<dyn GraphicsDevice>,
    settings: RendererSettings,
    pub(super) resources: ResourceBuilder,
    graph: RenderGraph,
    shaders: ShaderLibrary,
    layouts: SharedLayouts,
    frame_resources: FrameResources,
    batches: BatchRenderer,
    culling: CullingContext,
    culling_manager: CullingManager,
    camera_bind_group: Option<(BufferId, BindGroupId)>,
    lights: Vec<Light>,
    shading: ViewportShading,
    clear_color: Color,
    frame_index: u64,
    profiler: Arc<CpuProfiler>,
    context: RendererContext,
}

impl SceneRenderer {
    /// Compiles the built-in shaders, wires the deferred graph and allocates
    /// every resource at `settings.render_size()`.
    pub async fn initialize(
        device: Arc<dyn GraphicsDevice>,
        settings: RendererSettings,
    ) -> anyhow::Result<Self> {
        let shaders = ShaderLibrary::with_builtin_shaders(device.as_ref())
            .context("failed to compile the built-in shaders")?;
        Self::initialize_with_shaders(device, settings, shaders).await
    }

    /// Like [`initialize`](Self::initialize), with a shader library the
    /// caller compiled, e.g. one loaded from disk for hot reload.
    pub async fn initialize_with_shaders(
        device: Arc<dyn GraphicsDevice>,
        settings: RendererSettings,
        shaders: ShaderLibrary,
    ) -> anyhow::Result<Self> {
        let (width, height) = settings.render_size();
        let mut resources = ResourceBuilder::new(device.clone(), width, height);
        let frame_resources = render_lane::create_frame_resources(&mut resources)
            .context("failed to declare the frame resources")?;
        let layouts = SharedLayouts::new(device.as_ref())
            .context("failed to create the shared bind group layouts")?;

        let mut graph =
            render_lane::build_deferred_graph().context("failed to build the deferred graph")?;
        let init = graph.init(&mut PassInitContext {
            device: device.as_ref(),
            resources: &mut resources,
            shaders: &shaders,
            layouts: &layouts,
            settings: &settings,
        });
        if let Err(err) = init {
            log::error!("SceneRenderer: pass initialization failed: {err}");
            return Err(err).context("failed to initialize the render passes");
        }
        resources
            .create_resources()
            .context("failed to allocate the frame resources")?;

        log::info!(
            "SceneRenderer: initialized {} passes at {width}x{height} (output {}x{})",
            graph.nodes().len(),
            settings.width,
            settings.height,
        );

        let profiler = Arc::new(CpuProfiler::new());
        let context = RendererContext::new(profiler.clone());
        let shading = settings.shading;
        let renderer = Self {
            device,
            settings,
            resources,
            graph,
            shaders,
            layouts,
            frame_resources,
            batches: BatchRenderer::new(),
            culling: CullingContext::new(),
            culling_manager: CullingManager::new(),
            camera_bind_group: None,
            lights: Vec::new(),
            shading,
            clear_color: Color::BLACK,
            frame_index: 0,
            profiler,
            context,
        };
        renderer.publish();
        Ok(renderer)
    }

    /// Renders `scene` into the next back buffer of `swap_chain` and presents it.
    ///
    /// Resizes first when the back buffer no longer matches the output size.
    pub fn render(
        &mut self,
        swap_chain: &dyn SwapChain,
        scene: &mut dyn Scene,
        camera: &Camera,
    ) -> Result<(), RenderError> {
        let frame = swap_chain.acquire()?;
        if (frame.width, frame.height) != self.output_size() {
            self.resize(frame.width, frame.height)?;
        }
        let target = RenderTarget {
            texture: None,
            view: frame.view,
            width: frame.width,
            height: frame.height,
            format: swap_chain.format(),
        };
        self.render_to(&target, scene, camera)?;
        swap_chain.present(frame)
    }

    /// Renders `scene` into an arbitrary target, e.g. an offscreen bake.
    ///
    /// The internal resources keep their size; only the final pass writes
    /// at the target's size.
    pub fn render_to(
        &mut self,
        target: &RenderTarget,
        scene: &mut dyn Scene,
        camera: &Camera,
    ) -> Result<(), RenderError> {
        if self.resources.is_resizing() {
            return Err(RenderError::ResizeInProgress);
        }
        self.resources.import_texture(
            names::OUTPUT,
            target.texture,
            target.view,
            (target.width, target.height),
            target.format,
        )?;

        let viewport = self.resources.viewport();
        let device = self.device.clone();
        let device = device.as_ref();
        let view = camera.view_data(viewport);

        let update = SceneUpdate {
            device,
            camera,
            frame_index: self.frame_index,
            viewport,
        };
        scene.render_manager().update(&update, &mut self.batches);
        let light_manager = scene.light_manager();
        light_manager.update(&update);
        self.lights.clear();
        self.lights.extend_from_slice(light_manager.lights());
        let weather_manager = scene.weather_manager();
        weather_manager.update(&update);
        let weather = weather_manager.constants();

        let camera_buffer = self.resources.buffer(&self.frame_resources.camera)?.buffer;
        let weather_buffer = self.resources.buffer(&self.frame_resources.weather)?.buffer;
        device.write_buffer(camera_buffer, 0, bytemuck::bytes_of(&view.to_constants()))?;
        device.write_buffer(weather_buffer, 0, bytemuck::bytes_of(&weather))?;
        let camera_bind_group = self.camera_bind_group(camera_buffer)?;

        self.prepare_draws(device, &view.frustum)?;

        let frame = FrameData {
            frame_index: self.frame_index,
            view,
            clear_color: self.clear_color,
            shading: self.shading,
            culling_flags: CullingFlags::from_settings(&self.settings.culling),
            camera_bind_group,
            batches: &self.batches,
            culling: &self.culling,
            culling_manager: &self.culling_manager,
            lights: &self.lights,
            weather,
        };
        self.graph
            .execute(device, &self.resources, &frame, self.profiler.as_ref())?;

        self.frame_index += 1;
        self.publish();
        Ok(())
    }

    fn prepare_draws(
        &mut self,
        device: &dyn GraphicsDevice,
        frustum: &Frustum,
    ) -> Result<(), ResourceError> {
        self.batches.visibility_test_all(frustum);
        self.batches.begin_update();
        self.batches.update_all()?;
        self.batches.end_update(device)?;

        self.culling.clear();
        self.batches.append_draw_types(&mut self.culling)?;
        self.culling_manager.upload(device, &self.culling)?;
        self.batches
            .prepare_bind_groups(device, self.layouts.instances, &self.culling_manager)
    }

    fn camera_bind_group(&mut self, buffer: BufferId) -> Result<BindGroupId, ResourceError> {
        if let Some((cached, group)) = self.camera_bind_group {
            if cached == buffer {
                return Ok(group);
            }
            if let Err(e) = self.device.destroy_bind_group(group) {
                log::warn!("SceneRenderer: failed to destroy the camera bind group: {e}");
            }
        }
        let group = self
            .layouts
            .camera_bind_group(self.device.as_ref(), buffer)?;
        self.camera_bind_group = Some((buffer, group));
        Ok(group)
    }

    /// Changes the output size and recreates every size-dependent resource.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.settings.width = width.max(1);
        self.settings.height = height.max(1);
        let (render_width, render_height) = self.settings.render_size();
        log::info!(
            "SceneRenderer: resizing to {}x{} (render {render_width}x{render_height})",
            self.settings.width,
            self.settings.height,
        );
        self.resources.resize_begin();
        self.resources.resize_end(render_width, render_height)?;
        self.publish();
        Ok(())
    }

    /// Output size in pixels.
    pub fn output_size(&self) -> (u32, u32) {
        (self.settings.width, self.settings.height)
    }

    /// Switches the editor shading mode from the next frame on.
    pub fn set_shading(&mut self, shading: ViewportShading) {
        if self.shading != shading {
            log::debug!("SceneRenderer: shading {:?} -> {shading:?}", self.shading);
            self.shading = shading;
            self.publish();
        }
    }

    /// Current editor shading mode.
    pub fn shading(&self) -> ViewportShading {
        self.shading
    }

    /// Color the light buffer is cleared to before shading.
    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    /// A read-only handle for editor panels.
    pub fn context(&self) -> RendererContext {
        self.context.clone()
    }

    /// The named resources the graph renders from.
    pub fn resources(&self) -> &ResourceBuilder {
        &self.resources
    }

    /// The deferred graph.
    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    /// The batches drawn every frame. Render managers normally edit these.
    pub fn batches_mut(&mut self) -> &mut BatchRenderer {
        &mut self.batches
    }

    /// The active settings, with the current output size.
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Frames rendered so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub(super) fn publish(&self) {
        self.context
            .publish(&self.resources, &self.graph, self.shading, self.frame_index);
    }
}

impl Drop for SceneRenderer {
    fn drop(&mut self) {
        let device = self.device.clone();
        let device = device.as_ref();
        if let Some((_, group)) = self.camera_bind_group.take() {
            if let Err(e) = device.destroy_bind_group(group) {
                log::warn!("SceneRenderer: failed to destroy the camera bind group: {e}");
            }
        }
        self.graph.release(device);
        self.batches.release(device);
        self.culling_manager.release(device);
        self.shaders.release(device);
        self.resources.release_resources();
        log::debug!("SceneRenderer: released");
    }
}
