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

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use ember_core::renderer::api::*;
use ember_core::renderer::traits::{
    AdapterDeviceType, AdapterInfo, CommandEncoder, DeviceFeature, GraphicsDevice, ReadbackFuture,
};
use ember_core::renderer::{PipelineError, ResourceError, ShaderError};
use wgpu::util::DeviceExt;

use super::command::WgpuCommandEncoder;
use super::context::WgpuGraphicsContext;
use super::conversions::IntoWgpu;

type Table<K, V> = Mutex<HashMap<K, Arc<V>>>;

/// The internal, non-clonable state of the [`WgpuDevice`].
#[derive(Debug)]
pub struct WgpuDeviceInternal {
    context: WgpuGraphicsContext,
    shader_modules: Table<ShaderModuleId, wgpu::ShaderModule>,
    pipeline_layouts: Table<PipelineLayoutId, wgpu::PipelineLayout>,
    render_pipelines: Table<RenderPipelineId, wgpu::RenderPipeline>,
    compute_pipelines: Table<ComputePipelineId, wgpu::ComputePipeline>,
    bind_group_layouts: Table<BindGroupLayoutId, wgpu::BindGroupLayout>,
    bind_groups: Table<BindGroupId, wgpu::BindGroup>,
    buffers: Table<BufferId, wgpu::Buffer>,
    textures: Table<TextureId, wgpu::Texture>,
    texture_views: Table<TextureViewId, wgpu::TextureView>,
    samplers: Table<SamplerId, wgpu::Sampler>,

    next_id: AtomicUsize,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, wgpu::CommandBuffer>>,
    command_buffer_id_counter: AtomicU64,
}

/// A clonable, thread-safe handle to the wgpu graphics device.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    inner: Arc<WgpuDeviceInternal>,
}

fn poisoned() -> ResourceError {
    ResourceError::BackendError("wgpu device table lock poisoned".to_string())
}

fn lookup<K: Hash + Eq + Copy + std::fmt::Debug, V>(table: &Table<K, V>, id: K) -> Option<Arc<V>> {
    let found = table.lock().ok()?.get(&id).cloned();
    if found.is_none() {
        log::warn!("WgpuDevice: {id:?} not found.");
    }
    found
}

fn insert<K: Hash + Eq + Copy, V>(table: &Table<K, V>, id: K, value: V) -> Result<K, ResourceError> {
    table.lock().map_err(|_| poisoned())?.insert(id, Arc::new(value));
    Ok(id)
}

fn remove<K: Hash + Eq + std::fmt::Debug, V>(
    table: &Table<K, V>,
    id: K,
) -> Result<Arc<V>, ResourceError> {
    table
        .lock()
        .map_err(|_| poisoned())?
        .remove(&id)
        .ok_or_else(|| {
            log::warn!("WgpuDevice: attempted to destroy unknown {id:?}");
            ResourceError::InvalidHandle
        })
}

impl WgpuDevice {
    /// Wraps an initialized context.
    pub fn new(context: WgpuGraphicsContext) -> Self {
        Self {
            inner: Arc::new(WgpuDeviceInternal {
                context,
                shader_modules: Mutex::default(),
                pipeline_layouts: Mutex::default(),
                render_pipelines: Mutex::default(),
                compute_pipelines: Mutex::default(),
                bind_group_layouts: Mutex::default(),
                bind_groups: Mutex::default(),
                buffers: Mutex::default(),
                textures: Mutex::default(),
                texture_views: Mutex::default(),
                samplers: Mutex::default(),
                next_id: AtomicUsize::new(1),
                pending_command_buffers: Mutex::default(),
                command_buffer_id_counter: AtomicU64::new(1),
            }),
        }
    }

    /// The underlying context.
    pub fn context(&self) -> &WgpuGraphicsContext {
        &self.inner.context
    }

    fn device(&self) -> &wgpu::Device {
        &self.inner.context.device
    }

    fn next(&self) -> usize {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Runs `create` inside a validation error scope and turns a validation
    /// failure into an error.
    fn validated<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        let device = self.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(device);
        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(value),
        }
    }

    pub(crate) fn get_wgpu_render_pipeline(&self, id: RenderPipelineId) -> Option<Arc<wgpu::RenderPipeline>> {
        lookup(&self.inner.render_pipelines, id)
    }

    pub(crate) fn get_wgpu_compute_pipeline(&self, id: ComputePipelineId) -> Option<Arc<wgpu::ComputePipeline>> {
        lookup(&self.inner.compute_pipelines, id)
    }

    pub(crate) fn get_wgpu_bind_group(&self, id: BindGroupId) -> Option<Arc<wgpu::BindGroup>> {
        lookup(&self.inner.bind_groups, id)
    }

    pub(crate) fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        lookup(&self.inner.buffers, id)
    }

    pub(crate) fn get_wgpu_texture(&self, id: TextureId) -> Option<Arc<wgpu::Texture>> {
        lookup(&self.inner.textures, id)
    }

    pub(crate) fn get_wgpu_texture_view(&self, id: TextureViewId) -> Option<Arc<wgpu::TextureView>> {
        lookup(&self.inner.texture_views, id)
    }

    /// Registers a view that wgpu created elsewhere, such as a surface texture view.
    pub(crate) fn register_texture_view(&self, view: wgpu::TextureView) -> Result<TextureViewId, ResourceError> {
        insert(&self.inner.texture_views, TextureViewId(self.next()), view)
    }

    pub(crate) fn register_command_buffer(&self, command_buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let id = CommandBufferId(
            self.inner
                .command_buffer_id_counter
                .fetch_add(1, Ordering::Relaxed),
        );
        match self.inner.pending_command_buffers.lock() {
            Ok(mut pending) => {
                pending.insert(id, command_buffer);
            }
            Err(_) => log::error!("WgpuDevice: pending command buffer table poisoned"),
        }
        id
    }
}

struct MapState {
    result: Mutex<Option<Result<(), ResourceError>>>,
}

/// Resolves once a `map_async` read completes, polling the device meanwhile.
struct MapReadFuture {
    device: WgpuDevice,
    buffer: Arc<wgpu::Buffer>,
    range: std::ops::Range<u64>,
    state: Arc<MapState>,
}

impl Future for MapReadFuture {
    type Output = Result<Vec<u8>, ResourceError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Err(e) = this.device.device().poll(wgpu::PollType::Poll) {
            log::warn!("WgpuDevice: poll failed while mapping: {e:?}");
        }
        let taken = match this.state.result.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => Some(Err(poisoned())),
        };
        match taken {
            Some(Ok(())) => {
                let data = this
                    .buffer
                    .slice(this.range.clone())
                    .get_mapped_range()
                    .to_vec();
                this.buffer.unmap();
                Poll::Ready(Ok(data))
            }
            Some(Err(e)) => Poll::Ready(Err(e)),
            None => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let label = descriptor.label.unwrap_or("shader").to_string();
        let ShaderSource::Wgsl(source) = &descriptor.source;
        let module = self
            .validated(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: descriptor.label,
                    source: wgpu::ShaderSource::Wgsl(source.clone()),
                })
            })
            .map_err(|details| ShaderError::CompilationError {
                label: label.clone(),
                details,
            })?;
        log::debug!("WgpuDevice: created shader module '{label}'");
        insert(&self.inner.shader_modules, ShaderModuleId(self.next()), module)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        remove(&self.inner.shader_modules, id).map(drop)
    }

    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError> {
        let layouts = descriptor
            .bind_group_layouts
            .iter()
            .map(|id| lookup(&self.inner.bind_group_layouts, *id).ok_or(ResourceError::InvalidHandle))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&wgpu::BindGroupLayout> = layouts.iter().map(Arc::as_ref).collect();
        let layout = self.device().create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: descriptor.label,
            bind_group_layouts: &refs,
            push_constant_ranges: &[],
        });
        insert(&self.inner.pipeline_layouts, PipelineLayoutId(self.next()), layout)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let layout = lookup(&self.inner.pipeline_layouts, descriptor.layout)
            .ok_or(ResourceError::InvalidHandle)?;
        let vertex_module = lookup(&self.inner.shader_modules, descriptor.vertex.module).ok_or(
            ShaderError::InvalidModule {
                id: descriptor.vertex.module,
            },
        )?;
        let fragment = match descriptor.fragment {
            Some(stage) => Some((
                lookup(&self.inner.shader_modules, stage.module)
                    .ok_or(ShaderError::InvalidModule { id: stage.module })?,
                stage.entry_point,
            )),
            None => None,
        };

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex_buffers
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|a| wgpu::VertexAttribute {
                        format: a.format.into_wgpu(),
                        offset: a.offset,
                        shader_location: a.shader_location,
                    })
                    .collect()
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex_buffers
            .iter()
            .zip(&attributes)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.array_stride,
                step_mode: layout.step_mode.into_wgpu(),
                attributes,
            })
            .collect();
        let targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format.into_wgpu(),
                    blend: target.blend.into_wgpu(),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let label = descriptor.label.as_deref();
        let pipeline = self
            .validated(|device| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label,
                    layout: Some(layout.as_ref()),
                    vertex: wgpu::VertexState {
                        module: &vertex_module,
                        entry_point: Some(descriptor.vertex.entry_point),
                        compilation_options: Default::default(),
                        buffers: &buffers,
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: descriptor.topology.into_wgpu(),
                        cull_mode: descriptor.cull_mode.into_wgpu(),
                        ..Default::default()
                    },
                    depth_stencil: descriptor.depth_stencil.map(IntoWgpu::into_wgpu),
                    multisample: wgpu::MultisampleState::default(),
                    fragment: fragment.as_ref().map(|(module, entry_point)| wgpu::FragmentState {
                        module: module.as_ref(),
                        entry_point: Some(*entry_point),
                        compilation_options: Default::default(),
                        targets: &targets,
                    }),
                    multiview: None,
                    cache: None,
                })
            })
            .map_err(|details| PipelineError::CompilationFailed {
                label: label.map(str::to_string),
                details,
            })?;
        log::debug!("WgpuDevice: created render pipeline '{}'", label.unwrap_or("unnamed"));
        insert(&self.inner.render_pipelines, RenderPipelineId(self.next()), pipeline)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        remove(&self.inner.render_pipelines, id).map(drop)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let layout = lookup(&self.inner.pipeline_layouts, descriptor.layout)
            .ok_or(ResourceError::InvalidHandle)?;
        let module = lookup(&self.inner.shader_modules, descriptor.stage.module).ok_or(
            ShaderError::InvalidModule {
                id: descriptor.stage.module,
            },
        )?;
        let label = descriptor.label.as_deref();
        let pipeline = self
            .validated(|device| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label,
                    layout: Some(layout.as_ref()),
                    module: &module,
                    entry_point: Some(descriptor.stage.entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                })
            })
            .map_err(|details| PipelineError::CompilationFailed {
                label: label.map(str::to_string),
                details,
            })?;
        insert(&self.inner.compute_pipelines, ComputePipelineId(self.next()), pipeline)
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        remove(&self.inner.compute_pipelines, id).map(drop)
    }

    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
            .entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility.into_wgpu(),
                ty: entry.ty.into_wgpu(),
                count: None,
            })
            .collect();
        let layout = self
            .validated(|device| {
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: descriptor.label,
                    entries: &entries,
                })
            })
            .map_err(PipelineError::LayoutCreationFailed)?;
        insert(&self.inner.bind_group_layouts, BindGroupLayoutId(self.next()), layout)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        let layout = lookup(&self.inner.bind_group_layouts, descriptor.layout)
            .ok_or(ResourceError::InvalidHandle)?;

        enum Resolved {
            Buffer(Arc<wgpu::Buffer>, BufferBinding),
            View(Arc<wgpu::TextureView>),
            Sampler(Arc<wgpu::Sampler>),
        }
        let resolved = descriptor
            .entries
            .iter()
            .map(|entry| {
                let resource = match entry.resource {
                    BindingResource::Buffer(binding) => {
                        self.get_wgpu_buffer(binding.buffer).map(|b| Resolved::Buffer(b, binding))
                    }
                    BindingResource::TextureView(id) => {
                        self.get_wgpu_texture_view(id).map(Resolved::View)
                    }
                    BindingResource::Sampler(id) => {
                        lookup(&self.inner.samplers, id).map(Resolved::Sampler)
                    }
                };
                resource
                    .map(|r| (entry.binding, r))
                    .ok_or(ResourceError::InvalidHandle)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let entries: Vec<wgpu::BindGroupEntry> = resolved
            .iter()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: match resource {
                    Resolved::Buffer(buffer, b) => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: buffer.as_ref(),
                        offset: b.offset,
                        size: b.size,
                    }),
                    Resolved::View(view) => wgpu::BindingResource::TextureView(view.as_ref()),
                    Resolved::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler.as_ref()),
                },
            })
            .collect();
        let bind_group = self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: descriptor.label,
            layout: &layout,
            entries: &entries,
        });
        insert(&self.inner.bind_groups, BindGroupId(self.next()), bind_group)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        remove(&self.inner.bind_groups, id).map(drop)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let buffer = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size,
            usage: descriptor.usage.into_wgpu(),
            mapped_at_creation: descriptor.mapped_at_creation,
        });
        log::trace!(
            "WgpuDevice: created buffer '{}' ({} bytes)",
            descriptor.label.as_deref().unwrap_or("unnamed"),
            descriptor.size
        );
        insert(&self.inner.buffers, BufferId(self.next()), buffer)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let mut contents = data.to_vec();
        if (contents.len() as u64) < descriptor.size {
            contents.resize(descriptor.size as usize, 0);
        }
        let buffer = self
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: descriptor.label.as_deref(),
                contents: &contents,
                usage: descriptor.usage.into_wgpu(),
            });
        insert(&self.inner.buffers, BufferId(self.next()), buffer)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let buffer = remove(&self.inner.buffers, id)?;
        buffer.destroy();
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self.get_wgpu_buffer(id).ok_or(ResourceError::NotFound)?;
        if offset + data.len() as u64 > buffer.size() {
            return Err(ResourceError::OutOfBounds);
        }
        self.inner.context.queue.write_buffer(&buffer, offset, data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> ReadbackFuture {
        let Some(buffer) = self.get_wgpu_buffer(id) else {
            return Box::pin(std::future::ready(Err(ResourceError::NotFound)));
        };
        let state = Arc::new(MapState {
            result: Mutex::new(None),
        });
        let callback_state = state.clone();
        let range = offset..offset + size;
        buffer
            .slice(range.clone())
            .map_async(wgpu::MapMode::Read, move |result| {
                let result = result.map_err(|e| ResourceError::BackendError(format!("map_async failed: {e:?}")));
                if let Ok(mut slot) = callback_state.result.lock() {
                    *slot = Some(result);
                }
            });
        Box::pin(MapReadFuture {
            device: self.clone(),
            buffer,
            range,
            state,
        })
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let texture = self
            .validated(|device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: descriptor.label.as_deref(),
                    size: descriptor.size.into_wgpu(),
                    mip_level_count: descriptor.mip_level_count,
                    sample_count: descriptor.sample_count,
                    dimension: descriptor.dimension.into_wgpu(),
                    format: descriptor.format.into_wgpu(),
                    usage: descriptor.usage.into_wgpu(),
                    view_formats: &[],
                })
            })
            .map_err(ResourceError::BackendError)?;
        log::debug!(
            "WgpuDevice: created texture '{}' {}x{}",
            descriptor.label.as_deref().unwrap_or("unnamed"),
            descriptor.size.width,
            descriptor.size.height
        );
        insert(&self.inner.textures, TextureId(self.next()), texture)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let texture = remove(&self.inner.textures, id)?;
        texture.destroy();
        Ok(())
    }

    fn write_texture(
        &self,
        texture: TextureId,
        data: &[u8],
        bytes_per_row: u32,
        size: Extent3D,
    ) -> Result<(), ResourceError> {
        let texture = self.get_wgpu_texture(texture).ok_or(ResourceError::NotFound)?;
        self.inner.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(size.height),
            },
            size.into_wgpu(),
        );
        Ok(())
    }

    fn create_texture_view(
        &self,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let texture = self.get_wgpu_texture(texture).ok_or(ResourceError::NotFound)?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: descriptor.label.as_deref(),
            format: descriptor.format.map(IntoWgpu::into_wgpu),
            dimension: descriptor.dimension.map(IntoWgpu::into_wgpu),
            aspect: descriptor.aspect.into_wgpu(),
            base_mip_level: descriptor.base_mip_level,
            mip_level_count: descriptor.mip_level_count,
            base_array_layer: descriptor.base_array_layer,
            array_layer_count: descriptor.array_layer_count,
            ..Default::default()
        });
        insert(&self.inner.texture_views, TextureViewId(self.next()), view)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        remove(&self.inner.texture_views, id).map(drop)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let address_mode = descriptor.address_mode.into_wgpu();
        let sampler = self.device().create_sampler(&wgpu::SamplerDescriptor {
            label: descriptor.label.as_deref(),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: descriptor.mag_filter.into_wgpu(),
            min_filter: descriptor.min_filter.into_wgpu(),
            mipmap_filter: descriptor.mipmap_filter.into_wgpu(),
            compare: descriptor.compare.map(IntoWgpu::into_wgpu),
            ..Default::default()
        });
        insert(&self.inner.samplers, SamplerId(self.next()), sampler)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        remove(&self.inner.samplers, id).map(drop)
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        let encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label });
        Box::new(WgpuCommandEncoder {
            encoder,
            device: self.clone(),
        })
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let buffer = match self.inner.pending_command_buffers.lock() {
            Ok(mut pending) => pending.remove(&command_buffer),
            Err(_) => None,
        };
        match buffer {
            Some(buffer) => {
                self.inner.context.queue.submit(std::iter::once(buffer));
            }
            None => log::warn!("WgpuDevice: submitted unknown {command_buffer:?}"),
        }
    }

    fn get_adapter_info(&self) -> AdapterInfo {
        let context = &self.inner.context;
        AdapterInfo {
            name: context.adapter_name.clone(),
            backend: format!("{:?}", context.adapter_backend),
            device_type: match context.adapter_device_type {
                wgpu::DeviceType::DiscreteGpu => AdapterDeviceType::DiscreteGpu,
                wgpu::DeviceType::IntegratedGpu => AdapterDeviceType::IntegratedGpu,
                wgpu::DeviceType::Cpu => AdapterDeviceType::Cpu,
                _ => AdapterDeviceType::Other,
            },
        }
    }

    fn supports_feature(&self, feature: DeviceFeature) -> bool {
        let context = &self.inner.context;
        match feature {
            DeviceFeature::ComputeShaders | DeviceFeature::StorageTextures => context
                .downlevel_flags
                .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
            DeviceFeature::IndirectFirstInstance => context
                .active_device_features
                .contains(wgpu::Features::INDIRECT_FIRST_INSTANCE),
        }
    }
}
