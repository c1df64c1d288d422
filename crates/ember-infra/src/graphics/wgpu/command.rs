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
use ember_core::renderer::traits::{CommandEncoder, ComputePass, RenderPass};
use std::any::Any;
use std::ops::Range;
use std::sync::Arc;

use super::conversions::IntoWgpu;
use super::device::WgpuDevice;

pub struct WgpuRenderPass<'a> {
    pub(crate) pass: wgpu::RenderPass<'a>,
    pub(crate) device: &'a WgpuDevice,
}

impl<'pass> RenderPass<'pass> for WgpuRenderPass<'pass> {
    fn set_pipeline(&mut self, pipeline: &RenderPipelineId) {
        if let Some(pipeline) = self.device.get_wgpu_render_pipeline(*pipeline) {
            self.pass.set_pipeline(&pipeline);
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId, offsets: &[u32]) {
        if let Some(bind_group) = self.device.get_wgpu_bind_group(*bind_group) {
            self.pass.set_bind_group(index, bind_group.as_ref(), offsets);
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &BufferId, offset: u64) {
        if let Some(buffer) = self.device.get_wgpu_buffer(*buffer) {
            self.pass.set_vertex_buffer(slot, buffer.slice(offset..));
        }
    }

    fn set_index_buffer(&mut self, buffer: &BufferId, offset: u64, format: IndexFormat) {
        if let Some(buffer) = self.device.get_wgpu_buffer(*buffer) {
            self.pass
                .set_index_buffer(buffer.slice(offset..), format.into_wgpu());
        }
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.pass.set_viewport(
            viewport.x,
            viewport.y,
            viewport.width,
            viewport.height,
            viewport.min_depth,
            viewport.max_depth,
        );
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.pass.draw(vertices, instances);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.pass.draw_indexed(indices, base_vertex, instances);
    }

    fn draw_indexed_indirect(&mut self, indirect_buffer: &BufferId, indirect_offset: u64) {
        if let Some(buffer) = self.device.get_wgpu_buffer(*indirect_buffer) {
            self.pass.draw_indexed_indirect(&buffer, indirect_offset);
        }
    }
}

pub struct WgpuComputePass<'a> {
    pub(crate) pass: wgpu::ComputePass<'a>,
    pub(crate) device: &'a WgpuDevice,
}

impl<'pass> ComputePass<'pass> for WgpuComputePass<'pass> {
    fn set_pipeline(&mut self, pipeline: &ComputePipelineId) {
        if let Some(pipeline) = self.device.get_wgpu_compute_pipeline(*pipeline) {
            self.pass.set_pipeline(&pipeline);
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId, offsets: &[u32]) {
        if let Some(bind_group) = self.device.get_wgpu_bind_group(*bind_group) {
            self.pass.set_bind_group(index, bind_group.as_ref(), offsets);
        }
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.pass.dispatch_workgroups(x, y, z);
    }
}

pub struct WgpuCommandEncoder {
    pub(crate) encoder: wgpu::CommandEncoder,
    pub(crate) device: WgpuDevice,
}

impl WgpuCommandEncoder {
    /// Escape hatch for backend-specific recording.
    pub fn wgpu_encoder_mut(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }
}

impl CommandEncoder for WgpuCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        // Attachments whose view is unknown are dropped; the lookup already warned.
        let colors: Vec<(Arc<wgpu::TextureView>, Option<Arc<wgpu::TextureView>>, Operations<Color>)> =
            descriptor
                .color_attachments
                .iter()
                .filter_map(|att| {
                    let view = self.device.get_wgpu_texture_view(att.view)?;
                    let resolve = att
                        .resolve_target
                        .and_then(|id| self.device.get_wgpu_texture_view(id));
                    Some((view, resolve, att.ops))
                })
                .collect();
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = colors
            .iter()
            .map(|(view, resolve, ops)| {
                Some(wgpu::RenderPassColorAttachment {
                    view: view.as_ref(),
                    resolve_target: resolve.as_deref(),
                    ops: ops.into_wgpu(),
                    depth_slice: None,
                })
            })
            .collect();

        let depth = descriptor
            .depth_stencil_attachment
            .and_then(|ds| Some((self.device.get_wgpu_texture_view(ds.view)?, ds)));
        let depth_stencil_attachment =
            depth
                .as_ref()
                .map(|(view, ds)| wgpu::RenderPassDepthStencilAttachment {
                    view: view.as_ref(),
                    depth_ops: ds.depth_ops.map(IntoWgpu::into_wgpu),
                    stencil_ops: ds.stencil_ops.map(IntoWgpu::into_wgpu),
                });

        let pass = self
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: descriptor.label,
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

        Box::new(WgpuRenderPass {
            pass,
            device: &self.device,
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'_>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        let pass = self
            .encoder
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: descriptor.label,
                timestamp_writes: None,
            });

        Box::new(WgpuComputePass {
            pass,
            device: &self.device,
        })
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: &BufferId,
        source_offset: u64,
        destination: &BufferId,
        destination_offset: u64,
        size: u64,
    ) {
        if let (Some(source), Some(destination)) = (
            self.device.get_wgpu_buffer(*source),
            self.device.get_wgpu_buffer(*destination),
        ) {
            self.encoder.copy_buffer_to_buffer(
                &source,
                source_offset,
                &destination,
                destination_offset,
                size,
            );
        }
    }

    fn copy_texture_to_buffer(
        &mut self,
        source: &TextureId,
        destination: &BufferId,
        bytes_per_row: u32,
        size: Extent3D,
    ) {
        if let (Some(texture), Some(buffer)) = (
            self.device.get_wgpu_texture(*source),
            self.device.get_wgpu_buffer(*destination),
        ) {
            self.encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(bytes_per_row),
                        rows_per_image: Some(size.height),
                    },
                },
                size.into_wgpu(),
            );
        }
    }

    fn clear_buffer(&mut self, buffer: &BufferId, offset: u64, size: Option<u64>) {
        if let Some(buffer) = self.device.get_wgpu_buffer(*buffer) {
            self.encoder.clear_buffer(&buffer, offset, size);
        }
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let this = *self;
        this.device.register_command_buffer(this.encoder.finish())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
