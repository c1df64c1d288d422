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

//! Builds the hierarchical depth pyramid consumed by occlusion and light
//! culling.

use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, ResourceError};

use super::common::{
    destroy_pipeline, draw_fullscreen, fullscreen_pipeline, texture_entry, UNFILTERED,
};
use super::names;
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::{ResourceCreationFlags, ResourceSize, TextureRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChainKey {
    generation: u64,
    depth: TextureViewId,
}

/// Copies `#DepthStencil` into mip 0 of `#DepthChain`, then reduces each mip
/// into the next keeping the farthest depth of every 2x2 quad.
#[derive(Debug, Default)]
pub struct HiZDepthPass {
    depth: Option<TextureRef>,
    chain: Option<TextureRef>,
    copy_layout: Option<BindGroupLayoutId>,
    reduce_layout: Option<BindGroupLayoutId>,
    copy_pipeline: Option<RenderPipelineId>,
    reduce_pipeline: Option<RenderPipelineId>,
    bind_groups: Vec<BindGroupId>,
    key: Option<ChainKey>,
}

impl HiZDepthPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }

    fn destroy_bind_groups(&mut self, device: &dyn GraphicsDevice) {
        for group in self.bind_groups.drain(..) {
            let _ = device.destroy_bind_group(group);
        }
        self.key = None;
    }

    /// One group per mip: the depth buffer for mip 0, the previous mip after.
    fn rebuild_bind_groups(
        &mut self,
        device: &dyn GraphicsDevice,
        key: ChainKey,
        mip_views: &[TextureViewId],
    ) -> Result<(), ResourceError> {
        let (Some(copy_layout), Some(reduce_layout)) = (self.copy_layout, self.reduce_layout) else {
            return Err(ResourceError::NotFound);
        };
        self.destroy_bind_groups(device);
        for mip in 0..mip_views.len() {
            let group = if mip == 0 {
                device.create_bind_group(&BindGroupDescriptor {
                    label: Some("HiZCopy"),
                    layout: copy_layout,
                    entries: &[BindGroupEntry::new(0, BindingResource::TextureView(key.depth))],
                })?
            } else {
                device.create_bind_group(&BindGroupDescriptor {
                    label: Some("HiZReduce"),
                    layout: reduce_layout,
                    entries: &[BindGroupEntry::new(
                        1,
                        BindingResource::TextureView(mip_views[mip - 1]),
                    )],
                })?
            };
            self.bind_groups.push(group);
        }
        self.key = Some(key);
        Ok(())
    }
}

impl RenderGraphPass for HiZDepthPass {
    fn name(&self) -> &'static str {
        "HiZDepthPass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder.read(names::DEPTH_STENCIL).write(names::DEPTH_CHAIN);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        self.depth = Some(ctx.resources.get_texture(names::DEPTH_STENCIL)?);
        self.chain = Some(ctx.resources.create_mip_chain(
            names::DEPTH_CHAIN,
            TextureFormat::R32Float,
            ResourceSize::VIEWPORT,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            ResourceCreationFlags::empty(),
        )?);

        let fragment = ShaderStageFlags::FRAGMENT;
        let copy_layout = ctx.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("HiZCopyLayout"),
            entries: &[texture_entry(0, fragment, TextureSampleType::Depth)],
        })?;
        let reduce_layout = ctx.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("HiZReduceLayout"),
            entries: &[texture_entry(1, fragment, UNFILTERED)],
        })?;
        self.copy_layout = Some(copy_layout);
        self.reduce_layout = Some(reduce_layout);

        let module = ctx.shaders.get("hiz")?;
        let target = || vec![TextureFormat::R32Float.into()];
        self.copy_pipeline = Some(fullscreen_pipeline(
            ctx.device,
            "HiZCopy",
            module,
            "fs_copy",
            &[copy_layout],
            target(),
        )?);
        self.reduce_pipeline = Some(fullscreen_pipeline(
            ctx.device,
            "HiZReduce",
            module,
            "fs_reduce",
            &[reduce_layout],
            target(),
        )?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let (Some(depth), Some(chain), Some(copy), Some(reduce)) = (
            self.depth.clone(),
            self.chain.clone(),
            self.copy_pipeline,
            self.reduce_pipeline,
        ) else {
            return Err(ResourceError::NotFound);
        };
        let key = ChainKey {
            generation: ctx.resources.generation(),
            depth: ctx.resources.texture(&depth)?.view,
        };
        let mip_views = &ctx.resources.texture(&chain)?.mip_views;
        if self.key != Some(key) || self.bind_groups.len() != mip_views.len() {
            self.rebuild_bind_groups(ctx.device, key, mip_views)?;
        }

        for (mip, view) in mip_views.iter().enumerate() {
            let pipeline = if mip == 0 { copy } else { reduce };
            let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("HiZDepthPass"),
                color_attachments: &[RenderPassColorAttachment {
                    view: *view,
                    resolve_target: None,
                    ops: Operations::load(),
                }],
                ..Default::default()
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &self.bind_groups[mip], &[]);
            draw_fullscreen(pass.as_mut());
        }
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        self.destroy_bind_groups(device);
        destroy_pipeline(device, self.copy_pipeline.take());
        destroy_pipeline(device, self.reduce_pipeline.take());
    }
}
