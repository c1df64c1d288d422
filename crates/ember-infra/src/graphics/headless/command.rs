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

use super::device::HeadlessShared;
use ember_core::renderer::api::*;
use ember_core::renderer::traits::{CommandEncoder, ComputePass, RenderPass};
use std::any::Any;
use std::ops::Range;
use std::sync::Arc;

/// How a recorded draw sources its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    /// `draw`, non-indexed. Fullscreen passes use this.
    Direct,
    /// `draw_indexed` with CPU-provided counts.
    Indexed,
    /// `draw_indexed_indirect`; counts come from the args buffer at execution.
    IndexedIndirect {
        /// Args buffer.
        buffer: BufferId,
        /// Byte offset of the args record.
        offset: u64,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedDraw {
    pub pipeline: Option<RenderPipelineId>,
    pub kind: DrawKind,
    pub index_count: u32,
    pub instance_count: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct RenderPassRecord {
    pub label: String,
    pub color_attachments: Vec<RenderPassColorAttachment>,
    pub depth_attachment: Option<RenderPassDepthStencilAttachment>,
    pub draws: Vec<RecordedDraw>,
}

#[derive(Debug, Clone)]
pub(crate) struct ComputePassRecord {
    pub label: String,
    pub dispatches: Vec<(Option<ComputePipelineId>, [u32; 3])>,
}

#[derive(Debug, Clone)]
pub(crate) enum RecordedCommand {
    RenderPass(RenderPassRecord),
    ComputePass(ComputePassRecord),
    CopyBufferToBuffer {
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    },
    CopyTextureToBuffer {
        source: TextureId,
        destination: BufferId,
        bytes_per_row: u32,
        size: Extent3D,
    },
    ClearBuffer {
        buffer: BufferId,
        offset: u64,
        size: Option<u64>,
    },
}

/// Records commands into a list that the device replays on submit.
pub struct HeadlessCommandEncoder {
    shared: Arc<HeadlessShared>,
    label: String,
    commands: Vec<RecordedCommand>,
}

impl HeadlessCommandEncoder {
    pub(crate) fn new(shared: Arc<HeadlessShared>, label: Option<&str>) -> Self {
        Self {
            shared,
            label: label.unwrap_or("encoder").to_string(),
            commands: Vec::new(),
        }
    }

    /// Number of commands recorded so far.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

impl CommandEncoder for HeadlessCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        let record = RenderPassRecord {
            label: descriptor.label.unwrap_or("render pass").to_string(),
            color_attachments: descriptor.color_attachments.to_vec(),
            depth_attachment: descriptor.depth_stencil_attachment,
            draws: Vec::new(),
        };
        Box::new(HeadlessRenderPass {
            sink: &mut self.commands,
            record: Some(record),
            pipeline: None,
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'_>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        let record = ComputePassRecord {
            label: descriptor.label.unwrap_or("compute pass").to_string(),
            dispatches: Vec::new(),
        };
        Box::new(HeadlessComputePass {
            sink: &mut self.commands,
            record: Some(record),
            pipeline: None,
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
        self.commands.push(RecordedCommand::CopyBufferToBuffer {
            source: *source,
            source_offset,
            destination: *destination,
            destination_offset,
            size,
        });
    }

    fn copy_texture_to_buffer(
        &mut self,
        source: &TextureId,
        destination: &BufferId,
        bytes_per_row: u32,
        size: Extent3D,
    ) {
        self.commands.push(RecordedCommand::CopyTextureToBuffer {
            source: *source,
            destination: *destination,
            bytes_per_row,
            size,
        });
    }

    fn clear_buffer(&mut self, buffer: &BufferId, offset: u64, size: Option<u64>) {
        self.commands.push(RecordedCommand::ClearBuffer {
            buffer: *buffer,
            offset,
            size,
        });
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let this = *self;
        this.shared.store_pending(&this.label, this.commands)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct HeadlessRenderPass<'a> {
    sink: &'a mut Vec<RecordedCommand>,
    record: Option<RenderPassRecord>,
    pipeline: Option<RenderPipelineId>,
}

impl HeadlessRenderPass<'_> {
    fn push(&mut self, kind: DrawKind, index_count: u32, instance_count: u32) {
        if let Some(record) = self.record.as_mut() {
            record.draws.push(RecordedDraw {
                pipeline: self.pipeline,
                kind,
                index_count,
                instance_count,
            });
        }
    }
}

impl<'a> RenderPass<'a> for HeadlessRenderPass<'a> {
    fn set_pipeline(&mut self, pipeline: &RenderPipelineId) {
        self.pipeline = Some(*pipeline);
    }

    fn set_bind_group(&mut self, _index: u32, _bind_group: &BindGroupId, _offsets: &[u32]) {}

    fn set_vertex_buffer(&mut self, _slot: u32, _buffer: &BufferId, _offset: u64) {}

    fn set_index_buffer(&mut self, _buffer: &BufferId, _offset: u64, _format: IndexFormat) {}

    fn set_viewport(&mut self, _viewport: &Viewport) {}

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.push(DrawKind::Direct, vertices.len() as u32, instances.len() as u32);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, instances: Range<u32>) {
        self.push(DrawKind::Indexed, indices.len() as u32, instances.len() as u32);
    }

    fn draw_indexed_indirect(&mut self, indirect_buffer: &BufferId, indirect_offset: u64) {
        self.push(
            DrawKind::IndexedIndirect {
                buffer: *indirect_buffer,
                offset: indirect_offset,
            },
            0,
            0,
        );
    }
}

impl Drop for HeadlessRenderPass<'_> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.sink.push(RecordedCommand::RenderPass(record));
        }
    }
}

struct HeadlessComputePass<'a> {
    sink: &'a mut Vec<RecordedCommand>,
    record: Option<ComputePassRecord>,
    pipeline: Option<ComputePipelineId>,
}

impl<'a> ComputePass<'a> for HeadlessComputePass<'a> {
    fn set_pipeline(&mut self, pipeline: &ComputePipelineId) {
        self.pipeline = Some(*pipeline);
    }

    fn set_bind_group(&mut self, _index: u32, _bind_group: &BindGroupId, _offsets: &[u32]) {}

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        if let Some(record) = self.record.as_mut() {
            record.dispatches.push((self.pipeline, [x, y, z]));
        }
    }
}

impl Drop for HeadlessComputePass<'_> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.sink.push(RecordedCommand::ComputePass(record));
        }
    }
}
