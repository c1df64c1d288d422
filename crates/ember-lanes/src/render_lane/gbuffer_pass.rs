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
use crate::resource_lane::{GBufferRef, ResourceCreationFlags, ResourceSize, TextureRef};

/// Attachment formats of `GBuffer`: albedo, encoded normal, then roughness
/// and metallic.
pub const GBUFFER_FORMATS: [TextureFormat; 3] = [
    TextureFormat::Rgba8Unorm,
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba8Unorm,
];

/// Fills the G-Buffer with the opaque instances that survived culling.
///
/// Depth was laid down by the pre-pass, so the test is `LessEqual` against a
/// read-only depth attachment and every covered pixel is shaded once.
#[derive(Debug, Default)]
pub struct GBufferPass {
    gbuffer: Option<GBufferRef>,
    depth: Option<TextureRef>,
    pipeline: Option<RenderPipelineId>,
}

impl GBufferPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderGraphPass for GBufferPass {
    fn name(&self) -> &'static str {
        "GBufferPass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder
            .read(names::CULLED_INSTANCES)
            .read(names::DEPTH_STENCIL)
            .read(names::CAMERA)
            .write(names::GBUFFER);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        self.depth = Some(ctx.resources.get_texture(names::DEPTH_STENCIL)?);
        self.gbuffer = Some(ctx.resources.create_gbuffer(
            names::GBUFFER,
            &GBUFFER_FORMATS,
            ResourceSize::VIEWPORT,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            ResourceCreationFlags::empty(),
        )?);
        self.pipeline = Some(
            GeometryPipeline {
                label: "GBufferPass",
                module: ctx.shaders.get("gbuffer")?,
                fragment_entry: Some("fs_main"),
                layouts: &[ctx.layouts.camera, ctx.layouts.instances],
                targets: GBUFFER_FORMATS.iter().map(|&f| f.into()).collect(),
                depth: depth_state(false, CompareFunction::LessEqual),
                cull_mode: CullMode::Back,
            }
            .create(ctx.device)?,
        );
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let (Some(gbuffer), Some(depth), Some(pipeline)) = (&self.gbuffer, &self.depth, self.pipeline)
        else {
            return Err(ResourceError::NotFound);
        };
        let gbuffer = ctx.resources.gbuffer(gbuffer)?;
        let depth = ctx.resources.texture(depth)?;
        let frame = ctx.frame;

        let attachments: Vec<RenderPassColorAttachment> = gbuffer
            .targets
            .iter()
            .map(|target| RenderPassColorAttachment {
                view: target.view,
                resolve_target: None,
                ops: Operations::clear(Color::TRANSPARENT),
            })
            .collect();
        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("GBufferPass"),
            color_attachments: &attachments,
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth.view,
                depth_ops: None,
                stencil_ops: None,
            }),
        });
        pass.set_viewport(&frame.view.viewport());
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &frame.camera_bind_group, &[]);
        let drawn = frame.batches.draw_deferred(pass.as_mut(), frame.culling_manager);
        log::trace!("GBufferPass: {drawn} batch(es)");
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        destroy_pipeline(device, self.pipeline.take());
    }
}
