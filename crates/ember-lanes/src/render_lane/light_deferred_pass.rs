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
use ember_core::renderer::{GraphicsDevice, ResourceError, ViewportShading};

use super::common::{
    destroy_pipeline, draw_fullscreen, empty_layout, fullscreen_pipeline, sampler_entry,
    texture_entry, CachedBindGroup, FILTERED, UNFILTERED,
};
use super::lighting::LightingBindings;
use super::names;
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::{
    GBufferRef, ResourceBuilder, ResourceCreationFlags, SamplerRef, TextureRef,
    TextureResourceDesc,
};

/// Format of `LightBuffer`, the HDR scene colour.
pub const LIGHT_BUFFER_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

#[derive(Debug)]
struct Inputs {
    gbuffer: GBufferRef,
    depth: TextureRef,
    ao: TextureRef,
    brdf_lut: TextureRef,
    sampler: SamplerRef,
}

/// Shades every G-Buffer pixel with the tiled lights, shadows, ambient
/// occlusion and fog into `LightBuffer`.
#[derive(Debug, Default)]
pub struct LightDeferredPass {
    inputs: Option<Inputs>,
    light_buffer: Option<TextureRef>,
    lighting: Option<LightingBindings>,
    gbuffer_layout: Option<BindGroupLayoutId>,
    empty_group: Option<BindGroupId>,
    gbuffer_group: CachedBindGroup<u64>,
    lit: Option<RenderPipelineId>,
    solid: Option<RenderPipelineId>,
}

impl LightDeferredPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }

    fn gbuffer_inputs(
        &mut self,
        device: &dyn GraphicsDevice,
        resources: &ResourceBuilder,
    ) -> Result<BindGroupId, ResourceError> {
        let (Some(inputs), Some(layout)) = (&self.inputs, self.gbuffer_layout) else {
            return Err(ResourceError::NotFound);
        };
        let gbuffer = resources.gbuffer(&inputs.gbuffer)?;
        let mut entries: Vec<BindGroupEntry> = gbuffer
            .targets
            .iter()
            .enumerate()
            .map(|(i, target)| BindGroupEntry::new(i as u32, BindingResource::TextureView(target.view)))
            .collect();
        entries.extend([
            BindGroupEntry::new(3, BindingResource::TextureView(resources.texture(&inputs.depth)?.view)),
            BindGroupEntry::new(4, BindingResource::TextureView(resources.texture(&inputs.ao)?.view)),
            BindGroupEntry::new(
                5,
                BindingResource::TextureView(resources.texture(&inputs.brdf_lut)?.view),
            ),
            BindGroupEntry::new(6, BindingResource::Sampler(resources.sampler(&inputs.sampler)?)),
        ]);
        self.gbuffer_group
            .get_or_create(device, resources.generation(), || {
                device.create_bind_group(&BindGroupDescriptor {
                    label: Some("GBufferInputs"),
                    layout,
                    entries: &entries,
                })
            })
    }
}

impl RenderGraphPass for LightDeferredPass {
    fn name(&self) -> &'static str {
        "LightDeferredPass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder
            .read(names::GBUFFER)
            .read(names::DEPTH_STENCIL)
            .read(names::AO_BUFFER)
            .read(names::SHADOW_ATLAS)
            .read(names::BRDF_LUT)
            .read(names::LIGHT_GRID)
            .read(names::LIGHT_INDEX_LIST)
            .read(names::WEATHER)
            .write(names::LIGHT_BUFFER);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        let resources = &mut *ctx.resources;
        self.inputs = Some(Inputs {
            gbuffer: resources.get_gbuffer(names::GBUFFER)?,
            depth: resources.get_texture(names::DEPTH_STENCIL)?,
            ao: resources.get_texture(names::AO_BUFFER)?,
            brdf_lut: resources.get_texture(names::BRDF_LUT)?,
            sampler: resources.create_sampler(names::LINEAR_SAMPLER, SamplerDescriptor::LINEAR_CLAMP)?,
        });
        self.light_buffer = Some(resources.create_texture_2d(
            names::LIGHT_BUFFER,
            TextureResourceDesc::viewport(
                LIGHT_BUFFER_FORMAT,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            ),
            ResourceCreationFlags::empty(),
        )?);
        let lighting = LightingBindings::new(ctx)?;

        let fragment = ShaderStageFlags::FRAGMENT;
        let gbuffer_layout = ctx.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("GBufferInputsLayout"),
            entries: &[
                texture_entry(0, fragment, UNFILTERED),
                texture_entry(1, fragment, UNFILTERED),
                texture_entry(2, fragment, UNFILTERED),
                texture_entry(3, fragment, TextureSampleType::Depth),
                texture_entry(4, fragment, UNFILTERED),
                texture_entry(5, fragment, FILTERED),
                sampler_entry(6, fragment, SamplerBindingType::Filtering),
            ],
        })?;
        let empty = empty_layout(ctx.device)?;
        self.empty_group = Some(ctx.device.create_bind_group(&BindGroupDescriptor {
            label: Some("Empty"),
            layout: empty,
            entries: &[],
        })?);

        let module = ctx.shaders.get("deferred_lighting")?;
        let layouts = [ctx.layouts.camera, gbuffer_layout, empty, lighting.layout()];
        self.lit = Some(fullscreen_pipeline(
            ctx.device,
            "LightDeferred",
            module,
            "fs_main",
            &layouts,
            vec![LIGHT_BUFFER_FORMAT.into()],
        )?);
        self.solid = Some(fullscreen_pipeline(
            ctx.device,
            "LightDeferredSolid",
            module,
            "fs_solid",
            &layouts,
            vec![LIGHT_BUFFER_FORMAT.into()],
        )?);
        self.gbuffer_layout = Some(gbuffer_layout);
        self.lighting = Some(lighting);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let frame = ctx.frame;
        let pipeline = match frame.shading {
            ViewportShading::Solid => self.solid,
            ViewportShading::Rendered | ViewportShading::Wireframe => self.lit,
        };
        let (Some(pipeline), Some(light_buffer), Some(empty)) =
            (pipeline, self.light_buffer.clone(), self.empty_group)
        else {
            return Err(ResourceError::NotFound);
        };
        let target = ctx.resources.texture(&light_buffer)?.view;
        let gbuffer_group = self.gbuffer_inputs(ctx.device, ctx.resources)?;
        let lighting_group = self
            .lighting
            .as_mut()
            .ok_or(ResourceError::NotFound)?
            .bind_group(ctx.device, ctx.resources)?;

        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("LightDeferredPass"),
            color_attachments: &[RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: Operations::clear(Color::BLACK),
            }],
            ..Default::default()
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &frame.camera_bind_group, &[]);
        pass.set_bind_group(1, &gbuffer_group, &[]);
        pass.set_bind_group(2, &empty, &[]);
        pass.set_bind_group(3, &lighting_group, &[]);
        draw_fullscreen(pass.as_mut());
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        self.gbuffer_group.release(device);
        if let Some(lighting) = self.lighting.as_mut() {
            lighting.release(device);
        }
        if let Some(group) = self.empty_group.take() {
            let _ = device.destroy_bind_group(group);
        }
        destroy_pipeline(device, self.lit.take());
        destroy_pipeline(device, self.solid.take());
    }
}
