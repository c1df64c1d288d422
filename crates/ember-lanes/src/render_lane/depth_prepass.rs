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

use super::common::{depth_state, destroy_pipeline, GeometryPipeline};
use super::names;
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::TextureRef;

/// Lays down scene depth before any shading.
///
/// Every opaque instance is drawn from the unculled set, so the depth buffer
/// (and the Hi-Z pyramid built from it) never depends on last frame's
/// visibility. Materials may bind their own depth-only pipeline in
/// `begin_draw`; the pass pipeline is the fallback.
#[derive(Debug, Default)]
pub struct DepthPrePass {
    depth: Option<TextureRef>,
    pipeline: Option<RenderPipelineId>,
}

impl DepthPrePass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderGraphPass for DepthPrePass {
    fn name(&self) -> &'static str {
        "DepthPrePass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder.read(names::CAMERA).write(names::DEPTH_STENCIL);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        self.depth = Some(ctx.resources.get_texture(names::DEPTH_STENCIL)?);
        self.pipeline = Some(
            GeometryPipeline {
                label: "DepthPrePass",
                module: ctx.shaders.get("depth_prepass")?,
                fragment_entry: None,
                layouts: &[ctx.layouts.camera, ctx.layouts.instances],
                targets: Vec::new(),
                depth: depth_state(true, CompareFunction::Less),
                cull_mode: CullMode::Back,
            }
            .create(ctx.device)?,
        );
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let (Some(depth), Some(pipeline)) = (&self.depth, self.pipeline) else {
            return Err(ResourceError::NotFound);
        };
        let depth = ctx.resources.texture(depth)?;
        let frame = ctx.frame;

        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("DepthPrePass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth.view,
                depth_ops: Some(Operations::clear(1.0)),
                stencil_ops: None,
            }),
        });
        pass.set_viewport(&frame.view.viewport());
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &frame.camera_bind_group, &[]);
        let drawn = frame.batches.draw_depth(pass.as_mut(), frame.culling_manager);
        log::trace!("DepthPrePass: {drawn} batch(es)");
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        destroy_pipeline(device, self.pipeline.take());
    }
}
