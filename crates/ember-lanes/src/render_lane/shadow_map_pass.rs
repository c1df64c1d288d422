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

use std::borrow::Cow;
use std::num::NonZeroU64;

use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, ResourceError};

use super::common::{depth_state, destroy_pipeline, CachedBindGroup, GeometryPipeline};
use super::names;
use super::shadow_atlas::{ShadowAtlasLayout, ShadowTileData, MAX_SHADOW_TILES};
use crate::buffer::MIN_UNIFORM_ALIGNMENT;
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::{BufferRef, BufferSize, ResourceCreationFlags, TextureRef};

/// Byte distance between two tile cameras in the camera buffer.
const CAMERA_STRIDE: u64 =
    (std::mem::size_of::<CameraConstants>() as u64).next_multiple_of(MIN_UNIFORM_ALIGNMENT);

/// Renders every shadow caster into its light's tiles of `ShadowAtlas` and
/// publishes the tile matrices in `ShadowTiles`.
#[derive(Debug, Default)]
pub struct ShadowMapPass {
    atlas: Option<TextureRef>,
    tiles: Option<BufferRef>,
    cameras: Option<BufferId>,
    camera_layout: Option<BindGroupLayoutId>,
    camera_group: CachedBindGroup<BufferId>,
    pipeline: Option<RenderPipelineId>,
    dropped_lights: u32,
}

impl ShadowMapPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderGraphPass for ShadowMapPass {
    fn name(&self) -> &'static str {
        "ShadowMapPass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder.write(names::SHADOW_ATLAS).write(names::SHADOW_TILES);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        self.atlas = Some(ctx.resources.create_shadow_atlas(
            names::SHADOW_ATLAS,
            TextureFormat::Depth32Float,
            ctx.settings.shadow_atlas_size.max(1),
            ResourceCreationFlags::empty(),
        )?);
        self.tiles = Some(ctx.resources.create_structured_buffer(
            names::SHADOW_TILES,
            BufferSize::Fixed(MAX_SHADOW_TILES as u64 * std::mem::size_of::<ShadowTileData>() as u64),
            BufferUsage::COPY_DST,
            ResourceCreationFlags::empty(),
        )?);
        self.cameras = Some(ctx.device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("ShadowCameras")),
            size: MAX_SHADOW_TILES as u64 * CAMERA_STRIDE,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?);

        let camera_layout = ctx.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("ShadowCameraLayout"),
            entries: &[BindGroupLayoutEntry::new(
                0,
                ShaderStageFlags::VERTEX,
                BindingType::UniformBuffer {
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<CameraConstants>() as u64),
                },
            )],
        })?;
        self.camera_layout = Some(camera_layout);

        let mut depth = depth_state(true, CompareFunction::LessEqual);
        depth.bias = DepthBias {
            constant: 2,
            slope_scale: 2.0,
        };
        self.pipeline = Some(
            GeometryPipeline {
                label: "ShadowMapPass",
                module: ctx.shaders.get("shadow")?,
                fragment_entry: None,
                layouts: &[camera_layout, ctx.layouts.instances],
                targets: Vec::new(),
                depth,
                cull_mode: CullMode::None,
            }
            .create(ctx.device)?,
        );
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let (Some(atlas), Some(tiles), Some(cameras), Some(layout), Some(pipeline)) = (
            &self.atlas,
            &self.tiles,
            self.cameras,
            self.camera_layout,
            self.pipeline,
        ) else {
            return Err(ResourceError::NotFound);
        };
        let frame = ctx.frame;
        let device = ctx.device;
        let atlas = ctx.resources.texture(atlas)?;
        let tiles_buffer = ctx.resources.buffer(tiles)?.buffer;

        let layout_for_frame = ShadowAtlasLayout::allocate(frame.lights, &frame.view);
        let dropped = layout_for_frame.dropped_lights();
        if dropped != self.dropped_lights {
            if dropped > 0 {
                log::warn!(
                    "ShadowMapPass: atlas full, {dropped} shadow-casting light(s) render without shadows"
                );
            }
            self.dropped_lights = dropped;
        }

        let shadow_tiles = layout_for_frame.tiles();
        if !shadow_tiles.is_empty() {
            device.write_buffer(
                tiles_buffer,
                0,
                bytemuck::cast_slice(&layout_for_frame.gpu_tiles()),
            )?;
            let mut staging = vec![0u8; shadow_tiles.len() * CAMERA_STRIDE as usize];
            for (tile, slot) in shadow_tiles
                .iter()
                .zip(staging.chunks_exact_mut(CAMERA_STRIDE as usize))
            {
                let camera = CameraConstants {
                    view_projection: tile.view_projection.to_cols_array_2d(),
                    ..frame.view.to_constants()
                };
                let bytes = bytemuck::bytes_of(&camera);
                slot[..bytes.len()].copy_from_slice(bytes);
            }
            device.write_buffer(cameras, 0, &staging)?;
        }

        let camera_group = self.camera_group.get_or_create(device, cameras, || {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("ShadowCameras"),
                layout,
                entries: &[BindGroupEntry::new(
                    0,
                    BindingResource::Buffer(BufferBinding {
                        buffer: cameras,
                        offset: 0,
                        size: NonZeroU64::new(std::mem::size_of::<CameraConstants>() as u64),
                    }),
                )],
            })
        })?;

        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("ShadowMapPass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: atlas.view,
                depth_ops: Some(Operations::clear(1.0)),
                stencil_ops: None,
            }),
        });
        for tile in shadow_tiles {
            pass.set_viewport(&tile.viewport(atlas.width));
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &camera_group, &[(tile.index as u64 * CAMERA_STRIDE) as u32]);
            frame
                .batches
                .draw_shadow_map(pass.as_mut(), tile.kind, frame.culling_manager);
        }
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        self.camera_group.release(device);
        destroy_pipeline(device, self.pipeline.take());
        if let Some(buffer) = self.cameras.take() {
            if let Err(err) = device.destroy_buffer(buffer) {
                log::warn!("ShadowMapPass: failed to destroy camera buffer: {err}");
            }
        }
    }
}
