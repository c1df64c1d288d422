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

use super::device::HeadlessDevice;
use ember_core::renderer::api::*;
use ember_core::renderer::traits::{GraphicsDevice, SwapChain, SwapChainFrame};
use ember_core::renderer::{RenderError, ResourceError};
use std::sync::Mutex;

#[derive(Debug)]
struct BackBuffer {
    texture: TextureId,
    view: TextureViewId,
    width: u32,
    height: u32,
}

/// A swap chain whose single back buffer is an ordinary headless texture.
#[derive(Debug)]
pub struct HeadlessSwapChain {
    device: HeadlessDevice,
    format: TextureFormat,
    back_buffer: Mutex<Option<BackBuffer>>,
    presented: Mutex<u64>,
    vsync: Mutex<bool>,
}

impl HeadlessSwapChain {
    /// Creates the chain with an `Rgba8Unorm` back buffer.
    pub fn new(device: HeadlessDevice, width: u32, height: u32) -> Result<Self, ResourceError> {
        let chain = Self {
            device,
            format: TextureFormat::Rgba8Unorm,
            back_buffer: Mutex::new(None),
            presented: Mutex::new(0),
            vsync: Mutex::new(false),
        };
        chain.recreate(width, height)?;
        Ok(chain)
    }

    /// The texture behind the current back buffer.
    pub fn back_buffer_texture(&self) -> Option<TextureId> {
        self.back_buffer
            .lock()
            .ok()
            .and_then(|b| b.as_ref().map(|b| b.texture))
    }

    /// Frames presented so far.
    pub fn presented_frames(&self) -> u64 {
        self.presented.lock().map(|p| *p).unwrap_or(0)
    }

    /// Current vsync setting.
    pub fn vsync(&self) -> bool {
        self.vsync.lock().map(|v| *v).unwrap_or(false)
    }

    fn recreate(&self, width: u32, height: u32) -> Result<(), ResourceError> {
        let mut slot = self
            .back_buffer
            .lock()
            .map_err(|_| ResourceError::BackendError("swap chain lock poisoned".into()))?;
        if let Some(old) = slot.take() {
            self.device.destroy_texture_view(old.view)?;
            self.device.destroy_texture(old.texture)?;
        }
        let width = width.max(1);
        let height = height.max(1);
        let texture = self.device.create_texture(&TextureDescriptor::d2(
            "BackBuffer",
            width,
            height,
            self.format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
        ))?;
        let view = self
            .device
            .create_texture_view(texture, &TextureViewDescriptor::default())?;
        *slot = Some(BackBuffer {
            texture,
            view,
            width,
            height,
        });
        Ok(())
    }
}

impl SwapChain for HeadlessSwapChain {
    fn acquire(&self) -> Result<SwapChainFrame, RenderError> {
        let slot = self
            .back_buffer
            .lock()
            .map_err(|_| RenderError::SurfaceAcquisitionFailed("swap chain lock poisoned".into()))?;
        slot.as_ref()
            .map(|b| SwapChainFrame {
                view: b.view,
                width: b.width,
                height: b.height,
            })
            .ok_or_else(|| RenderError::SurfaceAcquisitionFailed("no back buffer".into()))
    }

    fn present(&self, _frame: SwapChainFrame) -> Result<(), RenderError> {
        if let Ok(mut presented) = self.presented.lock() {
            *presented += 1;
        }
        Ok(())
    }

    fn resize(&self, width: u32, height: u32) {
        if let Err(err) = self.recreate(width, height) {
            log::error!("Failed to resize headless swap chain: {err}");
        }
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn set_vsync(&self, enabled: bool) {
        if let Ok(mut vsync) = self.vsync.lock() {
            *vsync = enabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_replaces_back_buffer() {
        let device = HeadlessDevice::new();
        let chain = HeadlessSwapChain::new(device.clone(), 64, 32).unwrap();
        let first = chain.back_buffer_texture().unwrap();

        chain.resize(16, 8);
        let frame = chain.acquire().unwrap();
        assert_eq!((frame.width, frame.height), (16, 8));
        assert!(device.is_texture_destroyed(first), "old back buffer disposed");
        assert_eq!(device.view_texture(frame.view), chain.back_buffer_texture());
    }
}
