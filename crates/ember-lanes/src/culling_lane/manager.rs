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

//! GPU residency of the culling set.

use ember_core::renderer::api::{
    BufferId, BufferUsage, DrawIndexedIndirectArgs, InstanceData, OcclusionParams,
};
use ember_core::renderer::{CommandEncoder, GraphicsDevice, ResourceError};

use super::{CullingContext, DrawTypeId};
use crate::buffer::GrowableBuffer;

/// Buffer ids of the uploaded culling set, valid until the next upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CullingBuffers {
    /// Per-type draw templates.
    pub type_data: BufferId,
    /// Instances in append order, the kernel input.
    pub instances: BufferId,
    /// First slot of each type in both compacted and no-cull instance buffers.
    pub instance_offsets: BufferId,
    /// Every instance, grouped by type.
    pub instances_no_cull: BufferId,
    /// Draw records covering every instance.
    pub draw_args_no_cull: BufferId,
    /// Visible instances, grouped by type.
    pub culled_instances: BufferId,
    /// Draw records the kernel counts into.
    pub swap_args: BufferId,
    /// Draw records consumed by indirect draws.
    pub draw_args: BufferId,
    /// Kernel parameters.
    pub params: BufferId,
}

/// Owns the device buffers fed by a [`CullingContext`] each frame.
#[derive(Debug)]
pub struct CullingManager {
    type_data: GrowableBuffer,
    instances: GrowableBuffer,
    instance_offsets: GrowableBuffer,
    instances_no_cull: GrowableBuffer,
    draw_args_no_cull: GrowableBuffer,
    culled_instances: GrowableBuffer,
    swap_args: GrowableBuffer,
    draw_args: GrowableBuffer,
    params: GrowableBuffer,
    type_count: u32,
    instance_count: u32,
    generation: u64,
}

impl Default for CullingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CullingManager {
    /// Creates a manager without any device buffer.
    pub fn new() -> Self {
        let storage = BufferUsage::STORAGE;
        let args = BufferUsage::STORAGE | BufferUsage::INDIRECT | BufferUsage::COPY_SRC;
        Self {
            type_data: GrowableBuffer::new("TypeData", storage),
            instances: GrowableBuffer::new("InstanceData", storage),
            instance_offsets: GrowableBuffer::new("InstanceOffsets", storage),
            instances_no_cull: GrowableBuffer::new("InstanceDataNoCull", storage),
            draw_args_no_cull: GrowableBuffer::new("DrawArgsNoCull", args),
            culled_instances: GrowableBuffer::new("CulledInstances", storage),
            swap_args: GrowableBuffer::new("SwapArgs", args),
            draw_args: GrowableBuffer::new("DrawArgs", args),
            params: GrowableBuffer::new("OcclusionParams", BufferUsage::UNIFORM),
            type_count: 0,
            instance_count: 0,
            generation: 0,
        }
    }

    /// Uploads the staged set of `context`.
    ///
    /// The compacted draw records start with zero instances, so a frame whose
    /// kernel never runs draws nothing instead of stale data.
    pub fn upload(
        &mut self,
        device: &dyn GraphicsDevice,
        context: &CullingContext,
    ) -> Result<(), ResourceError> {
        let empty_args = context.empty_args();
        let mut grown = false;
        grown |= self.type_data.upload(device, context.types())?;
        grown |= self.instances.upload(device, context.instances())?;
        grown |= self.instance_offsets.upload(device, &context.type_offsets())?;
        grown |= self
            .instances_no_cull
            .upload(device, &context.no_cull_instances())?;
        grown |= self.draw_args_no_cull.upload(device, &context.no_cull_args())?;
        grown |= self.culled_instances.reserve(
            device,
            context.total_instance_count() as u64 * std::mem::size_of::<InstanceData>() as u64,
        )?;
        grown |= self.swap_args.upload(device, &empty_args)?;
        grown |= self.draw_args.upload(device, &empty_args)?;
        grown |= self
            .params
            .reserve(device, std::mem::size_of::<OcclusionParams>() as u64)?;
        if grown {
            self.generation += 1;
        }
        self.type_count = context.type_count();
        self.instance_count = context.total_instance_count();
        Ok(())
    }

    /// Writes the kernel parameters.
    pub fn write_params(
        &self,
        device: &dyn GraphicsDevice,
        params: &OcclusionParams,
    ) -> Result<(), ResourceError> {
        let buffer = self.params.id().ok_or(ResourceError::NotFound)?;
        device.write_buffer(buffer, 0, bytemuck::bytes_of(params))
    }

    /// Records the copy of the counted records into the indirect args buffer.
    pub fn record_args_copy(&self, encoder: &mut dyn CommandEncoder) {
        let (Some(buffers), true) = (self.buffers(), self.type_count > 0) else {
            return;
        };
        encoder.copy_buffer_to_buffer(
            &buffers.swap_args,
            0,
            &buffers.draw_args,
            0,
            self.type_count as u64 * DrawIndexedIndirectArgs::SIZE,
        );
    }

    /// Ids of every buffer, `None` before the first upload.
    pub fn buffers(&self) -> Option<CullingBuffers> {
        Some(CullingBuffers {
            type_data: self.type_data.id()?,
            instances: self.instances.id()?,
            instance_offsets: self.instance_offsets.id()?,
            instances_no_cull: self.instances_no_cull.id()?,
            draw_args_no_cull: self.draw_args_no_cull.id()?,
            culled_instances: self.culled_instances.id()?,
            swap_args: self.swap_args.id()?,
            draw_args: self.draw_args.id()?,
            params: self.params.id()?,
        })
    }

    /// Offset of a type's compacted draw record, `None` if the type was not
    /// part of the last upload.
    pub fn draw_args_offset(&self, draw_type: DrawTypeId) -> Option<u64> {
        (draw_type.0 < self.type_count).then(|| draw_type.0 as u64 * DrawIndexedIndirectArgs::SIZE)
    }

    /// Types in the last upload.
    pub fn type_count(&self) -> u32 {
        self.type_count
    }

    /// Instances in the last upload.
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Bumped whenever a buffer is recreated; bind groups over these buffers
    /// must be rebuilt when it changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Destroys every buffer.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        for buffer in [
            &mut self.type_data,
            &mut self.instances,
            &mut self.instance_offsets,
            &mut self.instances_no_cull,
            &mut self.draw_args_no_cull,
            &mut self.culled_instances,
            &mut self.swap_args,
            &mut self.draw_args,
            &mut self.params,
        ] {
            buffer.release(device);
        }
        self.type_count = 0;
        self.instance_count = 0;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::math::{Aabb, BoundingVolume, Mat4, Vec3};
    use ember_infra::HeadlessDevice;

    fn read_args(device: &HeadlessDevice, buffer: BufferId, count: usize) -> Vec<DrawIndexedIndirectArgs> {
        let bytes = device.buffer_contents(buffer).expect("args buffer is live");
        bytes
            .chunks_exact(DrawIndexedIndirectArgs::SIZE as usize)
            .take(count)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    fn populated(types: u32, per_type: u32) -> CullingContext {
        let bounds = BoundingVolume::from(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE));
        let mut context = CullingContext::new();
        for t in 0..types {
            context.append_type(6 * (t + 1));
            for i in 0..per_type {
                let transform = Mat4::from_translation(Vec3::new(i as f32, t as f32, 0.0));
                context.append_instance(&transform, &bounds).unwrap();
            }
        }
        context
    }

    #[test]
    fn test_upload_resets_counted_records() {
        let device = HeadlessDevice::new();
        let mut manager = CullingManager::new();
        manager.upload(&device, &populated(3, 2)).unwrap();

        let buffers = manager.buffers().expect("buffers exist after upload");
        let culled = read_args(&device, buffers.draw_args, 3);
        assert!(culled.iter().all(|args| args.instance_count == 0));
        assert_eq!(culled[2].index_count, 18);

        let no_cull = read_args(&device, buffers.draw_args_no_cull, 3);
        assert!(no_cull.iter().all(|args| args.instance_count == 2));
    }

    #[test]
    fn test_buffers_only_grow() {
        let device = HeadlessDevice::new();
        let mut manager = CullingManager::new();
        manager.upload(&device, &populated(2, 4)).unwrap();
        let first = manager.buffers().unwrap();
        let generation = manager.generation();

        manager.upload(&device, &populated(1, 1)).unwrap();
        assert_eq!(manager.buffers().unwrap(), first, "shrinking reuses buffers");
        assert_eq!(manager.generation(), generation);

        manager.upload(&device, &populated(4, 64)).unwrap();
        let grown = manager.buffers().unwrap();
        assert_ne!(grown.instances, first.instances);
        assert!(device.is_buffer_destroyed(first.instances));
        assert!(manager.generation() > generation);
    }

    #[test]
    fn test_offsets_only_for_uploaded_types() {
        let device = HeadlessDevice::new();
        let mut manager = CullingManager::new();
        assert_eq!(manager.draw_args_offset(DrawTypeId(0)), None);
        manager.upload(&device, &populated(2, 0)).unwrap();
        assert_eq!(manager.draw_args_offset(DrawTypeId(1)), Some(20));
        assert_eq!(manager.draw_args_offset(DrawTypeId(2)), None);
    }

    #[test]
    fn test_release_destroys_everything() {
        let device = HeadlessDevice::new();
        let mut manager = CullingManager::new();
        manager.upload(&device, &populated(1, 1)).unwrap();
        let before = device.live_buffer_count();
        manager.release(&device);
        assert_eq!(device.live_buffer_count(), before - 9);
        assert!(manager.buffers().is_none());
    }
}
