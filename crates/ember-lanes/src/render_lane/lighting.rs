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

use super::common::{lighting_layout, CachedBindGroup};
use super::names;
use crate::graph_lane::PassInitContext;
use crate::resource_lane::{BufferRef, ResourceBuilder, SamplerRef, TextureRef};

/// Group 3 of the lighting shaders, resolved from the resources written by
/// the light cull and shadow passes.
#[derive(Debug)]
pub(crate) struct LightingBindings {
    layout: BindGroupLayoutId,
    lights: BufferRef,
    grid: BufferRef,
    indices: BufferRef,
    shadow_tiles: BufferRef,
    shadow_atlas: TextureRef,
    shadow_sampler: SamplerRef,
    weather: BufferRef,
    tiles: BufferRef,
    group: CachedBindGroup<u64>,
}

impl LightingBindings {
    pub(crate) fn new(ctx: &mut PassInitContext<'_>) -> Result<Self, ResourceError> {
        let resources = &mut *ctx.resources;
        Ok(Self {
            layout: lighting_layout(ctx.device)?,
            lights: resources.get_buffer(names::LIGHTS)?,
            grid: resources.get_buffer(names::LIGHT_GRID)?,
            indices: resources.get_buffer(names::LIGHT_INDEX_LIST)?,
            shadow_tiles: resources.get_buffer(names::SHADOW_TILES)?,
            shadow_atlas: resources.get_texture(names::SHADOW_ATLAS)?,
            shadow_sampler: resources
                .create_sampler(names::SHADOW_SAMPLER, SamplerDescriptor::SHADOW_COMPARE)?,
            weather: resources.get_buffer(names::WEATHER)?,
            tiles: resources.get_buffer(names::LIGHT_TILES)?,
            group: CachedBindGroup::default(),
        })
    }

    pub(crate) fn layout(&self) -> BindGroupLayoutId {
        self.layout
    }

    /// The group over the current resources, rebuilt after any reallocation.
    pub(crate) fn bind_group(
        &mut self,
        device: &dyn GraphicsDevice,
        resources: &ResourceBuilder,
    ) -> Result<BindGroupId, ResourceError> {
        let buffer = |handle: &BufferRef| resources.buffer(handle).map(|b| b.buffer);
        let entries = [
            BindGroupEntry::new(0, BindingResource::whole(buffer(&self.lights)?)),
            BindGroupEntry::new(1, BindingResource::whole(buffer(&self.grid)?)),
            BindGroupEntry::new(2, BindingResource::whole(buffer(&self.indices)?)),
            BindGroupEntry::new(3, BindingResource::whole(buffer(&self.shadow_tiles)?)),
            BindGroupEntry::new(
                4,
                BindingResource::TextureView(resources.texture(&self.shadow_atlas)?.view),
            ),
            BindGroupEntry::new(5, BindingResource::Sampler(resources.sampler(&self.shadow_sampler)?)),
            BindGroupEntry::new(6, BindingResource::whole(buffer(&self.weather)?)),
            BindGroupEntry::new(7, BindingResource::whole(buffer(&self.tiles)?)),
        ];
        let layout = self.layout;
        self.group.get_or_create(device, resources.generation(), || {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("Lighting"),
                layout,
                entries: &entries,
            })
        })
    }

    pub(crate) fn release(&mut self, device: &dyn GraphicsDevice) {
        self.group.release(device);
    }
}
