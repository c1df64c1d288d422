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
    destroy_pipeline, draw_fullscreen, fullscreen_pipeline, sampler_entry, texture_entry,
    CachedBindGroup, FILTERED,
};
use super::names;
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::{SamplerRef, TextureRef};

/// Tone maps `LightBuffer` into `Output`.
///
/// `Output` is imported by the caller every frame and may change format
/// between frames (swap chain vs. offscreen target), so it is looked up on
/// each execution and one pipeline is kept per format.
#[derive(Debug, Default)]
pub struct PostProcessPass {
    light_buffer: Option<TextureRef>,
    sampler: Option<SamplerRef>,
    layout: Option<BindGroupLayoutId>,
    module: Option<ShaderModuleId>,
    pipelines: Vec<(TextureFormat, RenderPipelineId)>,
    bind_group: CachedBindGroup<u64>,
}

impl PostProcessPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }

    fn pipeline_for(
        &mut self,
        device: &dyn GraphicsDevice,
        format: TextureFormat,
    ) -> Result<RenderPipelineId, ResourceError> {
        if let Some((_, pipeline)) = self.pipelines.iter().find(|(f, _)| *f == format) {
            return Ok(*pipeline);
        }
        let (Some(layout), Some(module)) = (self.layout, self.module) else {
            return Err(ResourceError::NotFound);
        };
        log::debug!("PostProcessPass: creating pipeline for {format:?}");
        let pipeline =
            fullscreen_pipeline(device, "PostProcess", module, "fs_main", &[layout], vec![format.into()])?;
        self.pipelines.push((format, pipeline));
        Ok(pipeline)
    }
}

impl RenderGraphPass for PostProcessPass {
    fn name(&self) -> &'static str {
        "PostProcessPass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder.read(names::LIGHT_BUFFER).write(names::OUTPUT);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        self.light_buffer = Some(ctx.resources.get_texture(names::LIGHT_BUFFER)?);
        self.sampler = Some(
            ctx.resources
                .create_sampler(names::LINEAR_SAMPLER, SamplerDescriptor::LINEAR_CLAMP)?,
        );
        let fragment = ShaderStageFlags::FRAGMENT;
        self.layout = Some(ctx.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("PostProcessLayout"),
            entries: &[
                texture_entry(0, fragment, FILTERED),
                sampler_entry(1, fragment, SamplerBindingType::Filtering),
            ],
        })?);
        self.module = Some(ctx.shaders.get("post_process")?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let (Some(light_buffer), Some(sampler), Some(layout)) =
            (&self.light_buffer, &self.sampler, self.layout)
        else {
            return Err(ResourceError::NotFound);
        };
        let resources = ctx.resources;
        let device = ctx.device;
        let source = resources.texture(light_buffer)?.view;
        let sampler = resources.sampler(sampler)?;
        let output = resources.texture(&resources.get_texture(names::OUTPUT)?)?;

        let bind_group = self.bind_group.get_or_create(device, resources.generation(), || {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("PostProcess"),
                layout,
                entries: &[
                    BindGroupEntry::new(0, BindingResource::TextureView(source)),
                    BindGroupEntry::new(1, BindingResource::Sampler(sampler)),
                ],
            })
        })?;
        let pipeline = self.pipeline_for(device, output.format)?;

        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("PostProcessPass"),
            color_attachments: &[RenderPassColorAttachment {
                view: output.view,
                resolve_target: None,
                ops: Operations::clear(ctx.frame.clear_color),
            }],
            ..Default::default()
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        draw_fullscreen(pass.as_mut());
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        self.bind_group.release(device);
        for (_, pipeline) in self.pipelines.drain(..) {
            destroy_pipeline(device, Some(pipeline));
        }
    }
}
