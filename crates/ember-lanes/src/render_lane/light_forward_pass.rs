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

use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, ResourceError};

use super::common::{depth_state, destroy_pipeline, empty_layout, GeometryPipeline};
use super::light_deferred_pass::LIGHT_BUFFER_FORMAT;
use super::lighting::LightingBindings;
use super::names;
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::TextureRef;

/// Blends forward materials (transparents, decals) over the deferred result
/// with the same tiled lights and shadows.
#[derive(Debug, Default)]
pub struct LightForwardPass {
    light_buffer: Option<TextureRef>,
    depth: Option<TextureRef>,
    lighting: Option<LightingBindings>,
    empty_group: Option<BindGroupId>,
    pipeline: Option<RenderPipelineId>,
}

impl LightForwardPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderGraphPass for LightForwardPass {
    fn name(&self) -> &'static str {
        "LightForwardPass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder
            .read_write(names::LIGHT_BUFFER)
            .read(names::DEPTH_STENCIL)
            .read(names::SHADOW_ATLAS)
            .read(names::LIGHT_GRID)
            .read(names::LIGHT_INDEX_LIST);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        self.light_buffer = Some(ctx.resources.get_texture(names::LIGHT_BUFFER)?);
        self.depth = Some(ctx.resources.get_texture(names::DEPTH_STENCIL)?);
        let lighting = LightingBindings::new(ctx)?;
        let empty = empty_layout(ctx.device)?;
        self.empty_group = Some(ctx.device.create_bind_group(&BindGroupDescriptor {
            label: Some("Empty"),
            layout: empty,
            entries: &[],
        })?);
        self.pipeline = Some(
            GeometryPipeline {
                label: "LightForwardPass",
                module: ctx.shaders.get("forward")?,
                fragment_entry: Some("fs_main"),
                layouts: &[ctx.layouts.camera, ctx.layouts.instances, empty, lighting.layout()],
                targets: vec![ColorTargetState {
                    format: LIGHT_BUFFER_FORMAT,
                    blend: Some(BlendMode::Alpha),
                }],
                depth: depth_state(false, CompareFunction::LessEqual),
                cull_mode: CullMode::None,
            }
            .create(ctx.device)?,
        );
        self.lighting = Some(lighting);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let (Some(light_buffer), Some(depth), Some(empty), Some(pipeline), Some(lighting)) = (
            &self.light_buffer,
            &self.depth,
            self.empty_group,
            self.pipeline,
            self.lighting.as_mut(),
        ) else {
            return Err(ResourceError::NotFound);
        };
        let frame = ctx.frame;
        let target = ctx.resources.texture(light_buffer)?.view;
        let depth = ctx.resources.texture(depth)?.view;
        let lighting_group = lighting.bind_group(ctx.device, ctx.resources)?;

        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("LightForwardPass"),
            color_attachments: &[RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: Operations::load(),
            }],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: None,
                stencil_ops: None,
            }),
        });
        pass.set_viewport(&frame.view.viewport());
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &frame.camera_bind_group, &[]);
        pass.set_bind_group(2, &empty, &[]);
        pass.set_bind_group(3, &lighting_group, &[]);
        frame.batches.draw_forward(pass.as_mut(), frame.culling_manager);
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some(lighting) = self.lighting.as_mut() {
            lighting.release(device);
        }
        if let Some(group) = self.empty_group.take() {
            let _ = device.destroy_bind_group(group);
        }
        destroy_pipeline(device, self.pipeline.take());
    }
}
