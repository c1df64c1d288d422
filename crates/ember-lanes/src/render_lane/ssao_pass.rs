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

use super::common::{
    destroy_pipeline, draw_fullscreen, fullscreen_pipeline, texture_entry, CachedBindGroup,
};
use super::names;
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::TextureRef;

/// Screen-space ambient occlusion from the pre-pass depth into `#AOBuffer`.
#[derive(Debug, Default)]
pub struct PostProcessPrePass {
    depth: Option<TextureRef>,
    ao: Option<TextureRef>,
    depth_layout: Option<BindGroupLayoutId>,
    pipeline: Option<RenderPipelineId>,
    bind_group: CachedBindGroup<TextureViewId>,
}

impl PostProcessPrePass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderGraphPass for PostProcessPrePass {
    fn name(&self) -> &'static str {
        "PostProcessPrePass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder
            .read(names::DEPTH_STENCIL)
            .read(names::CAMERA)
            .write(names::AO_BUFFER);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        self.depth = Some(ctx.resources.get_texture(names::DEPTH_STENCIL)?);
        self.ao = Some(ctx.resources.get_texture(names::AO_BUFFER)?);
        let depth_layout = ctx.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("SSAODepthLayout"),
            entries: &[texture_entry(0, ShaderStageFlags::FRAGMENT, TextureSampleType::Depth)],
        })?;
        self.depth_layout = Some(depth_layout);
        self.pipeline = Some(fullscreen_pipeline(
            ctx.device,
            "SSAO",
            ctx.shaders.get("ssao")?,
            "fs_main",
            &[ctx.layouts.camera, depth_layout],
            vec![TextureFormat::R16Float.into()],
        )?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let (Some(depth), Some(ao), Some(layout), Some(pipeline)) =
            (&self.depth, &self.ao, self.depth_layout, self.pipeline)
        else {
            return Err(ResourceError::NotFound);
        };
        let depth_view = ctx.resources.texture(depth)?.view;
        let ao_view = ctx.resources.texture(ao)?.view;
        let device = ctx.device;
        let bind_group = self.bind_group.get_or_create(device, depth_view, || {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("SSAODepth"),
                layout,
                entries: &[BindGroupEntry::new(0, BindingResource::TextureView(depth_view))],
            })
        })?;

        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("PostProcessPrePass"),
            color_attachments: &[RenderPassColorAttachment {
                view: ao_view,
                resolve_target: None,
                ops: Operations::clear(Color::WHITE),
            }],
            ..Default::default()
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &ctx.frame.camera_bind_group, &[]);
        pass.set_bind_group(1, &bind_group, &[]);
        draw_fullscreen(pass.as_mut());
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        self.bind_group.release(device);
        destroy_pipeline(device, self.pipeline.take());
    }
}
