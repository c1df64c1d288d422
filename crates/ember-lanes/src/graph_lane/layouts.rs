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

use std::num::NonZeroU64;

use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, ResourceError};

use crate::batch_lane::instance_layout_entries;

/// Bind group layouts shared by every geometry pipeline.
///
/// Group 0 is the camera, group 1 the instance set of the draw. Group 2 and
/// above belong to materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedLayouts {
    /// Group 0: `CBCamera`.
    pub camera: BindGroupLayoutId,
    /// Group 1: see [`instance_layout_entries`].
    pub instances: BindGroupLayoutId,
}

impl SharedLayouts {
    /// Creates both layouts.
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let camera = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("CameraLayout"),
            entries: &[BindGroupLayoutEntry::new(
                0,
                ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT | ShaderStageFlags::COMPUTE,
                BindingType::UniformBuffer {
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<CameraConstants>() as u64),
                },
            )],
        })?;
        let instances = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("InstanceLayout"),
            entries: &instance_layout_entries(),
        })?;
        Ok(Self { camera, instances })
    }

    /// Binds `camera_buffer` as group 0.
    pub fn camera_bind_group(
        &self,
        device: &dyn GraphicsDevice,
        camera_buffer: BufferId,
    ) -> Result<BindGroupId, ResourceError> {
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("CameraBindGroup"),
            layout: self.camera,
            entries: &[BindGroupEntry::new(0, BindingResource::whole(camera_buffer))],
        })
    }
}
