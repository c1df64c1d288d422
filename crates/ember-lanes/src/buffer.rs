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

//! Device buffers that follow a CPU staging vector.

use std::borrow::Cow;

use bytemuck::Pod;
use ember_core::renderer::api::{BufferDescriptor, BufferId, BufferUsage};
use ember_core::renderer::{GraphicsDevice, ResourceError};

/// Dynamic uniform offsets must be multiples of this.
pub const MIN_UNIFORM_ALIGNMENT: u64 = 256;

/// Smallest allocation, so buffers of empty frames still bind.
const MIN_BUFFER_SIZE: u64 = 256;

/// A device buffer that is only recreated when it has to grow.
#[derive(Debug)]
pub(crate) struct GrowableBuffer {
    label: &'static str,
    usage: BufferUsage,
    buffer: Option<BufferId>,
    capacity: u64,
}

impl GrowableBuffer {
    pub(crate) const fn new(label: &'static str, usage: BufferUsage) -> Self {
        Self {
            label,
            usage,
            buffer: None,
            capacity: 0,
        }
    }

    /// Makes room for `size` bytes. Returns `true` if the buffer was recreated.
    pub(crate) fn reserve(
        &mut self,
        device: &dyn GraphicsDevice,
        size: u64,
    ) -> Result<bool, ResourceError> {
        if self.buffer.is_some() && size <= self.capacity {
            return Ok(false);
        }
        let mut capacity = self.capacity.max(MIN_BUFFER_SIZE);
        while capacity < size {
            capacity *= 2;
        }
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(self.label)),
            size: capacity,
            usage: self.usage | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        if let Some(old) = self.buffer.replace(buffer) {
            if let Err(err) = device.destroy_buffer(old) {
                log::warn!("Failed to destroy outgrown buffer '{}': {err}", self.label);
            }
        }
        log::debug!("Buffer '{}' grown to {capacity} bytes", self.label);
        self.capacity = capacity;
        Ok(true)
    }

    /// Reserves room for `data` and writes it at offset 0.
    pub(crate) fn upload<T: Pod>(
        &mut self,
        device: &dyn GraphicsDevice,
        data: &[T],
    ) -> Result<bool, ResourceError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let grown = self.reserve(device, bytes.len() as u64)?;
        if let (Some(buffer), false) = (self.buffer, bytes.is_empty()) {
            device.write_buffer(buffer, 0, bytes)?;
        }
        Ok(grown)
    }

    pub(crate) fn id(&self) -> Option<BufferId> {
        self.buffer
    }

    pub(crate) fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some(buffer) = self.buffer.take() {
            if let Err(err) = device.destroy_buffer(buffer) {
                log::warn!("Failed to destroy buffer '{}': {err}", self.label);
            }
        }
        self.capacity = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::HeadlessDevice;

    #[test]
    fn test_capacity_doubles_from_the_minimum() {
        let device = HeadlessDevice::new();
        let mut buffer = GrowableBuffer::new("Test", BufferUsage::STORAGE);
        assert!(buffer.reserve(&device, 10).unwrap());
        assert_eq!(buffer.capacity, MIN_BUFFER_SIZE);
        assert!(!buffer.reserve(&device, MIN_BUFFER_SIZE).unwrap());
        assert!(buffer.reserve(&device, 3 * MIN_BUFFER_SIZE).unwrap());
        assert_eq!(buffer.capacity, 4 * MIN_BUFFER_SIZE);
    }

    #[test]
    fn test_upload_writes_bytes() {
        let device = HeadlessDevice::new();
        let mut buffer = GrowableBuffer::new("Test", BufferUsage::STORAGE);
        buffer.upload(&device, &[1u32, 2, 3]).unwrap();
        let id = buffer.id().unwrap();
        let bytes = device.buffer_contents(id).unwrap();
        assert_eq!(&bytes[..12], bytemuck::cast_slice::<u32, u8>(&[1, 2, 3]));
        buffer.release(&device);
        assert!(device.is_buffer_destroyed(id));
    }
}
