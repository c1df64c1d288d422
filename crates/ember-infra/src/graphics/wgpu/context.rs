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

use anyhow::{anyhow, Result};
use wgpu::{Adapter, Features, Instance};

/// Holds the core wgpu state objects: the adapter, logical device and queue.
///
/// Surfaces are owned by [`super::WgpuSurfaceSwapChain`], so the same context
/// type serves windowed and offscreen renderers.
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    pub adapter: Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    pub adapter_name: String,
    pub adapter_backend: wgpu::Backend,
    pub adapter_device_type: wgpu::DeviceType,
    pub active_device_features: Features,
    pub downlevel_flags: wgpu::DownlevelFlags,
}

impl WgpuGraphicsContext {
    /// Creates a wgpu instance with every native backend enabled.
    pub fn create_instance() -> Instance {
        Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        })
    }

    /// Asynchronously selects an adapter and creates the logical device.
    ///
    /// ## Arguments
    /// * `instance` - The shared `wgpu::Instance`.
    /// * `compatible_surface` - A surface the adapter must be able to present to, if any.
    pub async fn new(
        instance: &Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        log::info!("Initializing wgpu graphics context...");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("No suitable graphics adapter: {e}"))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        // Culling writes `first_instance` into indirect args; only request it when present.
        let wanted: Features = Features::INDIRECT_FIRST_INSTANCE;
        let required_features = adapter.features() & wanted;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Ember Logical Device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(std::sync::Arc::new(|e| {
            log::error!("wgpu uncaptured error: {e:?}");
        }));

        let active_device_features = device.features();
        let downlevel_flags = adapter.get_downlevel_capabilities().flags;
        log::debug!("Active device features: {active_device_features:?}");

        Ok(Self {
            adapter,
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
            adapter_device_type: adapter_info.device_type,
            active_device_features,
            downlevel_flags,
        })
    }

    /// Creates a context without a surface, blocking the calling thread.
    /// Used for offscreen bakes and tools.
    pub fn new_offscreen() -> Result<Self> {
        let instance = Self::create_instance();
        pollster::block_on(Self::new(&instance, None))
    }
}
