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

use crate::renderer::api::*;
use std::any::Any;
use std::ops::Range;

/// Records GPU commands into a command buffer.
///
/// One encoder is created per frame by the graph executer and shared by every
/// pass, then finished and submitted once.
pub trait CommandEncoder {
    /// Begins a render pass. The pass borrows the encoder until dropped.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder>;

    /// Begins a compute pass. The pass borrows the encoder until dropped.
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'_>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder>;

    /// Copies `size` bytes between buffers.
    fn copy_buffer_to_buffer(
        &mut self,
        source: &BufferId,
        source_offset: u64,
        destination: &BufferId,
        destination_offset: u64,
        size: u64,
    );

    /// Copies mip 0 of a texture into a buffer with rows `bytes_per_row` apart.
    fn copy_texture_to_buffer(
        &mut self,
        source: &TextureId,
        destination: &BufferId,
        bytes_per_row: u32,
        size: Extent3D,
    );

    /// Fills a buffer range with zeroes. `size: None` clears to the end.
    fn clear_buffer(&mut self, buffer: &BufferId, offset: u64, size: Option<u64>);

    /// Finishes recording.
    fn finish(self: Box<Self>) -> CommandBufferId;

    /// Backend downcasting hook.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Commands recorded inside a render pass.
pub trait RenderPass<'pass> {
    /// Binds a render pipeline.
    fn set_pipeline(&mut self, pipeline: &RenderPipelineId);

    /// Binds a bind group at `index` with optional dynamic offsets.
    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId, offsets: &[u32]);

    /// Binds a vertex buffer to `slot`.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: &BufferId, offset: u64);

    /// Binds the index buffer.
    fn set_index_buffer(&mut self, buffer: &BufferId, offset: u64, format: IndexFormat);

    /// Restricts rasterization to `viewport`.
    fn set_viewport(&mut self, viewport: &Viewport);

    /// Draws non-indexed primitives.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    /// Draws indexed primitives.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);

    /// Draws with arguments read from a [`DrawIndexedIndirectArgs`] record at
    /// `indirect_offset` in `indirect_buffer`.
    fn draw_indexed_indirect(&mut self, indirect_buffer: &BufferId, indirect_offset: u64);
}

/// Commands recorded inside a compute pass.
pub trait ComputePass<'pass> {
    /// Binds a compute pipeline.
    fn set_pipeline(&mut self, pipeline: &ComputePipelineId);

    /// Binds a bind group at `index` with optional dynamic offsets.
    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId, offsets: &[u32]);

    /// Dispatches `x * y * z` workgroups.
    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32);
}
