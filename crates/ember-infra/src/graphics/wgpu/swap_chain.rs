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

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use ember_core::renderer::api::{TextureFormat, TextureViewId};
use ember_core::renderer::traits::{GraphicsDevice, SwapChain, SwapChainFrame};
use ember_core::renderer::RenderError;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use super::context::WgpuGraphicsContext;
use super::conversions::from_wgpu_texture_format;
use super::device::WgpuDevice;

#[derive(Debug)]
struct AcquiredFrame {
    texture: wgpu::SurfaceTexture,
    view: TextureViewId,
}

/// A [`SwapChain`] presenting to a window surface.
#[derive(Debug)]
pub struct WgpuSurfaceSwapChain {
    device: WgpuDevice,
    surface: wgpu::Surface<'static>,
    config: Mutex<wgpu::SurfaceConfiguration>,
    current: Mutex<Option<AcquiredFrame>>,
    format: TextureFormat,
}

impl WgpuSurfaceSwapChain {
    /// Creates a surface for `window`, a device able to present to it, and
    /// the swap chain itself.
    pub fn new<W>(window: Arc<W>, width: u32, height: u32) -> Result<(WgpuDevice, Self)>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = WgpuGraphicsContext::create_instance();
        let surface = instance
            .create_surface(window)
            .map_err(|e| anyhow!("Failed to create surface: {e}"))?;
        log::debug!("wgpu surface created for the window.");

        let context = pollster::block_on(WgpuGraphicsContext::new(&instance, Some(&surface)))?;

        let caps = surface.get_capabilities(&context.adapter);
        let (wgpu_format, format) = caps
            .formats
            .iter()
            .filter_map(|f| from_wgpu_texture_format(*f).map(|ours| (*f, ours)))
            .find(|(f, _)| f.is_srgb())
            .or_else(|| {
                caps.formats
                    .iter()
                    .find_map(|f| from_wgpu_texture_format(*f).map(|ours| (*f, ours)))
            })
            .ok_or_else(|| anyhow!("Surface offers no supported format: {:?}", caps.formats))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: wgpu_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&context.device, &config);
        log::info!(
            "Surface configured: {}x{} {:?}",
            config.width,
            config.height,
            wgpu_format
        );

        let device = WgpuDevice::new(context);
        let chain = Self {
            device: device.clone(),
            surface,
            config: Mutex::new(config),
            current: Mutex::new(None),
            format,
        };
        Ok((device, chain))
    }

    fn reconfigure(&self, update: impl FnOnce(&mut wgpu::SurfaceConfiguration)) {
        let Ok(mut config) = self.config.lock() else {
            log::error!("WgpuSurfaceSwapChain: configuration lock poisoned");
            return;
        };
        update(&mut config);
        self.surface.configure(&self.device.context().device, &config);
    }
}

impl SwapChain for WgpuSurfaceSwapChain {
    fn acquire(&self) -> Result<SwapChainFrame, RenderError> {
        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("WgpuSurfaceSwapChain: surface {e:?}, reconfiguring.");
                self.reconfigure(|_| {});
                self.surface
                    .get_current_texture()
                    .map_err(|e| RenderError::SurfaceAcquisitionFailed(format!("{e:?}")))?
            }
            Err(e) => {
                log::error!("WgpuSurfaceSwapChain: failed to acquire frame: {e:?}");
                return Err(RenderError::SurfaceAcquisitionFailed(format!("{e:?}")));
            }
        };

        let view = self.device.register_texture_view(
            texture
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        )?;
        let frame = SwapChainFrame {
            view,
            width: texture.texture.width(),
            height: texture.texture.height(),
        };
        let mut current = self
            .current
            .lock()
            .map_err(|_| RenderError::SurfaceAcquisitionFailed("frame lock poisoned".into()))?;
        if let Some(stale) = current.replace(AcquiredFrame { texture, view }) {
            log::warn!("WgpuSurfaceSwapChain: previous frame was never presented.");
            self.device.destroy_texture_view(stale.view)?;
        }
        Ok(frame)
    }

    fn present(&self, frame: SwapChainFrame) -> Result<(), RenderError> {
        let acquired = self
            .current
            .lock()
            .map_err(|_| RenderError::SurfaceAcquisitionFailed("frame lock poisoned".into()))?
            .take();
        match acquired {
            Some(acquired) if acquired.view == frame.view => {
                self.device.destroy_texture_view(acquired.view)?;
                acquired.texture.present();
                Ok(())
            }
            other => {
                log::warn!("WgpuSurfaceSwapChain: presented a frame that is not current.");
                if let Some(acquired) = other {
                    self.device.destroy_texture_view(acquired.view)?;
                }
                Ok(())
            }
        }
    }

    fn resize(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("WgpuSurfaceSwapChain: ignoring zero-sized resize.");
            return;
        }
        self.reconfigure(|config| {
            config.width = width;
            config.height = height;
        });
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn set_vsync(&self, enabled: bool) {
        self.reconfigure(|config| {
            config.present_mode = if enabled {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            };
        });
    }
}
