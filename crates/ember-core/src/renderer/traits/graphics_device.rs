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
use crate::renderer::error::ResourceError;
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

/// A future resolving to bytes read back from a GPU buffer.
pub type ReadbackFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, ResourceError>> + Send>>;

/// Optional device capabilities queried through [`GraphicsDevice::supports_feature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFeature {
    /// Compute pipelines and storage buffers are available.
    ComputeShaders,
    /// `draw_indexed_indirect` honours a non-zero `first_instance`.
    IndirectFirstInstance,
    /// Depth textures can be bound as storage for the Hi-Z reduction.
    StorageTextures,
}

/// The kind of graphics adapter backing a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdapterDeviceType {
    /// A GPU on a separate card.
    DiscreteGpu,
    /// A GPU sharing memory with the CPU.
    IntegratedGpu,
    /// A software rasterizer.
    Cpu,
    /// No real adapter, for example a headless test device.
    #[default]
    Other,
}

/// A summary of the adapter a device runs on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdapterInfo {
    /// Human readable adapter name.
    pub name: String,
    /// Backend API, such as `Vulkan` or `Metal`.
    pub backend: String,
    /// Adapter kind.
    pub device_type: AdapterDeviceType,
}

/// The contract every graphics backend fulfils.
///
/// All methods take `&self`; implementations keep their object tables behind
/// locks so a device can be shared across the renderer as an `Arc`.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a shader module from the provided descriptor.
    /// ## Errors
    /// * `ResourceError::Shader` - If the source fails to compile.
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError>;

    /// Destroys the shader module associated with the given ID.
    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError>;

    /// Creates a pipeline layout from the provided descriptor.
    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError>;

    /// Creates a render pipeline from the provided descriptor.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If the backend rejects the pipeline state.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Destroys the render pipeline associated with the given ID.
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError>;

    /// Creates a compute pipeline from the provided descriptor.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError>;

    /// Destroys the compute pipeline associated with the given ID.
    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError>;

    /// Creates a bind group layout.
    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError>;

    /// Creates a bind group.
    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError>;

    /// Destroys a bind group.
    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError>;

    /// Creates a new GPU buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a GPU buffer initialized with `data`.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Destroys the buffer associated with the given ID.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Uploads `data` into a buffer at `offset`.
    ///
    /// The write is ordered before any command buffer submitted afterwards.
    /// Callers never read the range back within the same frame.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Reads `size` bytes of a buffer back to the CPU.
    ///
    /// The buffer needs [`BufferUsage::MAP_READ`]. This stalls until the GPU
    /// catches up and is reserved for screenshots.
    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> ReadbackFuture;

    /// Creates a new texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys the texture associated with the given ID.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Uploads texels into mip 0 of a texture.
    fn write_texture(
        &self,
        texture: TextureId,
        data: &[u8],
        bytes_per_row: u32,
        size: Extent3D,
    ) -> Result<(), ResourceError>;

    /// Creates a view into a texture.
    fn create_texture_view(
        &self,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError>;

    /// Destroys a texture view.
    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError>;

    /// Creates a sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /// Starts recording a new command buffer.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a finished command buffer to the queue.
    fn submit_command_buffer(&self, command_buffer: CommandBufferId);

    /// Describes the adapter.
    fn get_adapter_info(&self) -> AdapterInfo;

    /// Returns `true` if the device supports `feature`.
    fn supports_feature(&self, feature: DeviceFeature) -> bool;
}
