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

use super::command::{DrawKind, HeadlessCommandEncoder, RecordedCommand, RenderPassRecord};
use ember_core::renderer::api::*;
use ember_core::renderer::traits::{
    AdapterDeviceType, AdapterInfo, CommandEncoder, DeviceFeature, GraphicsDevice, ReadbackFuture,
};
use ember_core::renderer::{ResourceError, ShaderError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// What a texture currently holds, as far as the headless device can tell.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureContents {
    /// Never written.
    Undefined,
    /// Last written by a clear load op.
    Cleared(Color),
    /// Last written by `write_texture`.
    Uploaded(Vec<u8>),
}

/// Creation parameters and state of a live texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    /// Debug label.
    pub label: String,
    /// Size of mip 0.
    pub size: Extent3D,
    /// Texel format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
    /// Mip count.
    pub mip_level_count: u32,
    /// Current contents.
    pub contents: TextureContents,
    /// Indexed draws with a non-zero instance count that targeted the texture.
    pub geometry_draws: u64,
    /// Non-indexed fullscreen draws that targeted the texture.
    pub fullscreen_draws: u64,
}

/// A draw as it was executed on submit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedDraw {
    /// Label of the enclosing render pass.
    pub pass: String,
    /// Bound pipeline.
    pub pipeline: Option<RenderPipelineId>,
    /// Draw flavour.
    pub kind: DrawKind,
    /// Indices (or vertices) per instance.
    pub index_count: u32,
    /// Instances drawn; resolved from the args buffer for indirect draws.
    pub instance_count: u32,
}

impl ExecutedDraw {
    /// `true` if the draw produced any primitive.
    pub fn rasterizes(&self) -> bool {
        self.index_count > 0 && self.instance_count > 0
    }
}

/// A compute dispatch as it was executed on submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedDispatch {
    /// Label of the enclosing compute pass.
    pub pass: String,
    /// Bound pipeline.
    pub pipeline: Option<ComputePipelineId>,
    /// Workgroup counts.
    pub workgroups: [u32; 3],
}

#[derive(Debug)]
struct HeadlessBuffer {
    label: String,
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ObjectRef {
    Buffer(usize),
    Texture(usize),
    TextureView(usize),
    Sampler(usize),
    ShaderModule(usize),
    RenderPipeline(usize),
    ComputePipeline(usize),
    BindGroup(usize),
}

#[derive(Debug, Default)]
struct HeadlessState {
    buffers: HashMap<BufferId, HeadlessBuffer>,
    textures: HashMap<TextureId, TextureInfo>,
    views: HashMap<TextureViewId, TextureId>,
    samplers: HashSet<SamplerId>,
    shader_modules: HashMap<ShaderModuleId, String>,
    render_pipelines: HashMap<RenderPipelineId, String>,
    compute_pipelines: HashMap<ComputePipelineId, String>,
    pipeline_layouts: HashSet<PipelineLayoutId>,
    bind_group_layouts: HashSet<BindGroupLayoutId>,
    bind_groups: HashSet<BindGroupId>,
    destroyed: HashSet<ObjectRef>,
    pending: HashMap<CommandBufferId, Vec<RecordedCommand>>,
    executed_draws: Vec<ExecutedDraw>,
    executed_dispatches: Vec<ExecutedDispatch>,
    submissions: u64,
}

#[derive(Debug)]
pub(crate) struct HeadlessShared {
    state: Mutex<HeadlessState>,
    next_id: AtomicUsize,
    next_command_buffer: AtomicU64,
    compute: bool,
    failing_shaders: Mutex<HashSet<String>>,
    failing_textures: Mutex<HashSet<String>>,
}

impl HeadlessShared {
    fn lock(&self) -> Result<MutexGuard<'_, HeadlessState>, ResourceError> {
        self.state
            .lock()
            .map_err(|_| ResourceError::BackendError("headless device state poisoned".into()))
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn store_pending(&self, label: &str, commands: Vec<RecordedCommand>) -> CommandBufferId {
        let id = CommandBufferId(self.next_command_buffer.fetch_add(1, Ordering::Relaxed));
        match self.lock() {
            Ok(mut state) => {
                log::trace!("Finished '{label}' with {} command(s) as {id:?}", commands.len());
                state.pending.insert(id, commands);
            }
            Err(err) => log::error!("Dropping command buffer '{label}': {err}"),
        }
        id
    }
}

/// An in-memory [`GraphicsDevice`].
///
/// Cloning yields another handle to the same device.
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    shared: Arc<HeadlessShared>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// A device with compute support.
    pub fn new() -> Self {
        Self::with_compute(true)
    }

    /// A device that reports whether compute shaders are available.
    pub fn with_compute(compute: bool) -> Self {
        Self {
            shared: Arc::new(HeadlessShared {
                state: Mutex::new(HeadlessState::default()),
                next_id: AtomicUsize::new(1),
                next_command_buffer: AtomicU64::new(1),
                compute,
                failing_shaders: Mutex::new(HashSet::new()),
                failing_textures: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Makes texture creation fail for textures labelled `label`.
    pub fn fail_texture(&self, label: &str) {
        if let Ok(mut failing) = self.shared.failing_textures.lock() {
            failing.insert(label.to_string());
        }
    }

    /// Forgets every injected shader and texture failure.
    pub fn clear_failures(&self) {
        if let Ok(mut failing) = self.shared.failing_shaders.lock() {
            failing.clear();
        }
        if let Ok(mut failing) = self.shared.failing_textures.lock() {
            failing.clear();
        }
    }

    /// Makes shader modules labelled `label` fail to compile.
    pub fn fail_shader(&self, label: &str) {
        if let Ok(mut failing) = self.shared.failing_shaders.lock() {
            failing.insert(label.to_string());
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&HeadlessState) -> R) -> Option<R> {
        self.shared.lock().ok().map(|state| f(&*state))
    }

    /// Bytes currently held by a buffer.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.with_state(|s| s.buffers.get(&id).map(|b| b.data.clone()))
            .flatten()
    }

    /// Label of a live buffer.
    pub fn buffer_label(&self, id: BufferId) -> Option<String> {
        self.with_state(|s| s.buffers.get(&id).map(|b| b.label.clone()))
            .flatten()
    }

    /// Creation parameters and state of a live texture.
    pub fn texture_info(&self, id: TextureId) -> Option<TextureInfo> {
        self.with_state(|s| s.textures.get(&id).cloned()).flatten()
    }

    /// The texture a live view points at.
    pub fn view_texture(&self, view: TextureViewId) -> Option<TextureId> {
        self.with_state(|s| s.views.get(&view).copied()).flatten()
    }

    /// Finds a live texture by label.
    pub fn find_texture(&self, label: &str) -> Option<TextureId> {
        self.with_state(|s| {
            s.textures
                .iter()
                .filter(|(_, info)| info.label == label)
                .map(|(id, _)| *id)
                .max()
        })
        .flatten()
    }

    /// Number of live textures.
    pub fn live_texture_count(&self) -> usize {
        self.with_state(|s| s.textures.len()).unwrap_or(0)
    }

    /// Number of live buffers.
    pub fn live_buffer_count(&self) -> usize {
        self.with_state(|s| s.buffers.len()).unwrap_or(0)
    }

    /// `true` once `destroy_texture` ran for `id`.
    pub fn is_texture_destroyed(&self, id: TextureId) -> bool {
        self.with_state(|s| s.destroyed.contains(&ObjectRef::Texture(id.0)))
            .unwrap_or(false)
    }

    /// `true` once `destroy_texture_view` ran for `id`.
    pub fn is_view_destroyed(&self, id: TextureViewId) -> bool {
        self.with_state(|s| s.destroyed.contains(&ObjectRef::TextureView(id.0)))
            .unwrap_or(false)
    }

    /// `true` once `destroy_buffer` ran for `id`.
    pub fn is_buffer_destroyed(&self, id: BufferId) -> bool {
        self.with_state(|s| s.destroyed.contains(&ObjectRef::Buffer(id.0)))
            .unwrap_or(false)
    }

    /// Draws executed since the last [`HeadlessDevice::clear_history`].
    pub fn executed_draws(&self) -> Vec<ExecutedDraw> {
        self.with_state(|s| s.executed_draws.clone())
            .unwrap_or_default()
    }

    /// Dispatches executed since the last [`HeadlessDevice::clear_history`].
    pub fn executed_dispatches(&self) -> Vec<ExecutedDispatch> {
        self.with_state(|s| s.executed_dispatches.clone())
            .unwrap_or_default()
    }

    /// Number of command buffers submitted.
    pub fn submission_count(&self) -> u64 {
        self.with_state(|s| s.submissions).unwrap_or(0)
    }

    /// Forgets executed draws and dispatches.
    pub fn clear_history(&self) {
        if let Ok(mut state) = self.shared.lock() {
            state.executed_draws.clear();
            state.executed_dispatches.clear();
        }
    }

    fn destroy(
        &self,
        what: &str,
        remove: impl FnOnce(&mut HeadlessState) -> bool,
        object: ObjectRef,
        id: impl std::fmt::Debug,
    ) -> Result<(), ResourceError> {
        let mut state = self.shared.lock()?;
        if remove(&mut *state) {
            state.destroyed.insert(object);
            log::debug!("Destroyed {what} {id:?}");
            Ok(())
        } else {
            log::warn!("Attempted to destroy unknown {what} {id:?}");
            Err(ResourceError::InvalidHandle)
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let label = descriptor.label.unwrap_or("shader").to_string();
        let fails = self
            .shared
            .failing_shaders
            .lock()
            .map(|failing| failing.contains(&label))
            .unwrap_or(false);
        if fails {
            return Err(ShaderError::CompilationError {
                label,
                details: "rejected by headless device".to_string(),
            }
            .into());
        }
        let id = ShaderModuleId(self.shared.next());
        self.shared.lock()?.shader_modules.insert(id, label);
        Ok(id)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.destroy(
            "shader module",
            |s| s.shader_modules.remove(&id).is_some(),
            ObjectRef::ShaderModule(id.0),
            id,
        )
    }

    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError> {
        let mut state = self.shared.lock()?;
        if let Some(missing) = descriptor
            .bind_group_layouts
            .iter()
            .find(|l| !state.bind_group_layouts.contains(l))
        {
            log::warn!("Pipeline layout references unknown bind group layout {missing:?}");
            return Err(ResourceError::InvalidHandle);
        }
        let id = PipelineLayoutId(self.shared.next());
        state.pipeline_layouts.insert(id);
        Ok(id)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let mut state = self.shared.lock()?;
        let modules_known = state.shader_modules.contains_key(&descriptor.vertex.module)
            && descriptor
                .fragment
                .map_or(true, |f| state.shader_modules.contains_key(&f.module));
        if !modules_known || !state.pipeline_layouts.contains(&descriptor.layout) {
            return Err(ResourceError::InvalidHandle);
        }
        let id = RenderPipelineId(self.shared.next());
        let label = descriptor.label.as_deref().unwrap_or("render pipeline").to_string();
        log::debug!("Created render pipeline '{label}' as {id:?}");
        state.render_pipelines.insert(id, label);
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.destroy(
            "render pipeline",
            |s| s.render_pipelines.remove(&id).is_some(),
            ObjectRef::RenderPipeline(id.0),
            id,
        )
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let mut state = self.shared.lock()?;
        if !state.shader_modules.contains_key(&descriptor.stage.module)
            || !state.pipeline_layouts.contains(&descriptor.layout)
        {
            return Err(ResourceError::InvalidHandle);
        }
        let id = ComputePipelineId(self.shared.next());
        let label = descriptor.label.as_deref().unwrap_or("compute pipeline").to_string();
        log::debug!("Created compute pipeline '{label}' as {id:?}");
        state.compute_pipelines.insert(id, label);
        Ok(id)
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.destroy(
            "compute pipeline",
            |s| s.compute_pipelines.remove(&id).is_some(),
            ObjectRef::ComputePipeline(id.0),
            id,
        )
    }

    fn create_bind_group_layout(
        &self,
        _descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let id = BindGroupLayoutId(self.shared.next());
        self.shared.lock()?.bind_group_layouts.insert(id);
        Ok(id)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        let mut state = self.shared.lock()?;
        if !state.bind_group_layouts.contains(&descriptor.layout) {
            return Err(ResourceError::InvalidHandle);
        }
        for entry in descriptor.entries {
            let known = match entry.resource {
                BindingResource::Buffer(b) => state.buffers.contains_key(&b.buffer),
                BindingResource::TextureView(v) => state.views.contains_key(&v),
                BindingResource::Sampler(s) => state.samplers.contains(&s),
            };
            if !known {
                log::warn!(
                    "Bind group '{}' binding {} references a dead resource",
                    descriptor.label.unwrap_or("unnamed"),
                    entry.binding
                );
                return Err(ResourceError::InvalidHandle);
            }
        }
        let id = BindGroupId(self.shared.next());
        state.bind_groups.insert(id);
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        self.destroy(
            "bind group",
            |s| s.bind_groups.remove(&id),
            ObjectRef::BindGroup(id.0),
            id,
        )
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.shared.next());
        let label = descriptor.label.as_deref().unwrap_or("buffer").to_string();
        log::trace!("Created buffer '{label}' ({} bytes) as {id:?}", descriptor.size);
        self.shared.lock()?.buffers.insert(
            id,
            HeadlessBuffer {
                label,
                usage: descriptor.usage,
                data: vec![0; descriptor.size as usize],
            },
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let id = self.create_buffer(&BufferDescriptor {
            size: descriptor.size.max(data.len() as u64),
            ..descriptor.clone()
        })?;
        self.write_buffer(id, 0, data)?;
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.destroy(
            "buffer",
            |s| s.buffers.remove(&id).is_some(),
            ObjectRef::Buffer(id.0),
            id,
        )
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.shared.lock()?;
        let buffer = state.buffers.get_mut(&id).ok_or_else(|| {
            log::warn!("write_buffer on unknown buffer {id:?}");
            ResourceError::NotFound
        })?;
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.data.len() {
            return Err(ResourceError::OutOfBounds);
        }
        buffer.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> ReadbackFuture {
        let result = self.shared.lock().and_then(|state| {
            let buffer = state.buffers.get(&id).ok_or(ResourceError::NotFound)?;
            if !buffer.usage.contains(BufferUsage::MAP_READ) {
                return Err(ResourceError::BackendError(format!(
                    "buffer '{}' is not mappable for reading",
                    buffer.label
                )));
            }
            let start = offset as usize;
            let end = start + size as usize;
            buffer
                .data
                .get(start..end)
                .map(<[u8]>::to_vec)
                .ok_or(ResourceError::OutOfBounds)
        });
        Box::pin(std::future::ready(result))
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(ResourceError::BackendError(
                "texture dimensions must be non-zero".to_string(),
            ));
        }
        let label = descriptor.label.as_deref().unwrap_or("texture").to_string();
        let fails = self
            .shared
            .failing_textures
            .lock()
            .map(|failing| failing.contains(&label))
            .unwrap_or(false);
        if fails {
            return Err(ResourceError::BackendError(format!(
                "texture '{label}' rejected by headless device"
            )));
        }
        let id = TextureId(self.shared.next());
        log::debug!(
            "Created texture '{label}' {}x{} {:?} as {id:?}",
            descriptor.size.width,
            descriptor.size.height,
            descriptor.format
        );
        self.shared.lock()?.textures.insert(
            id,
            TextureInfo {
                label,
                size: descriptor.size,
                format: descriptor.format,
                usage: descriptor.usage,
                mip_level_count: descriptor.mip_level_count,
                contents: TextureContents::Undefined,
                geometry_draws: 0,
                fullscreen_draws: 0,
            },
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.destroy(
            "texture",
            |s| s.textures.remove(&id).is_some(),
            ObjectRef::Texture(id.0),
            id,
        )
    }

    fn write_texture(
        &self,
        texture: TextureId,
        data: &[u8],
        _bytes_per_row: u32,
        _size: Extent3D,
    ) -> Result<(), ResourceError> {
        let mut state = self.shared.lock()?;
        let info = state.textures.get_mut(&texture).ok_or(ResourceError::NotFound)?;
        info.contents = TextureContents::Uploaded(data.to_vec());
        Ok(())
    }

    fn create_texture_view(
        &self,
        texture: TextureId,
        _descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let mut state = self.shared.lock()?;
        if !state.textures.contains_key(&texture) {
            log::warn!("create_texture_view on unknown texture {texture:?}");
            return Err(ResourceError::NotFound);
        }
        let id = TextureViewId(self.shared.next());
        state.views.insert(id, texture);
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        self.destroy(
            "texture view",
            |s| s.views.remove(&id).is_some(),
            ObjectRef::TextureView(id.0),
            id,
        )
    }

    fn create_sampler(&self, _descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let id = SamplerId(self.shared.next());
        self.shared.lock()?.samplers.insert(id);
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.destroy(
            "sampler",
            |s| s.samplers.remove(&id),
            ObjectRef::Sampler(id.0),
            id,
        )
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(HeadlessCommandEncoder::new(self.shared.clone(), label))
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let Ok(mut state) = self.shared.lock() else {
            log::error!("Headless device state poisoned, dropping {command_buffer:?}");
            return;
        };
        let Some(commands) = state.pending.remove(&command_buffer) else {
            log::warn!("Submitted unknown or already submitted {command_buffer:?}");
            return;
        };
        state.submissions += 1;
        for command in commands {
            state.execute(command);
        }
    }

    fn get_adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "Headless".to_string(),
            backend: "Headless".to_string(),
            device_type: AdapterDeviceType::Other,
        }
    }

    fn supports_feature(&self, feature: DeviceFeature) -> bool {
        match feature {
            DeviceFeature::ComputeShaders | DeviceFeature::StorageTextures => self.shared.compute,
            DeviceFeature::IndirectFirstInstance => true,
        }
    }
}

impl HeadlessState {
    fn execute(&mut self, command: RecordedCommand) {
        match command {
            RecordedCommand::RenderPass(record) => self.execute_render_pass(record),
            RecordedCommand::ComputePass(record) => {
                for (pipeline, workgroups) in record.dispatches {
                    self.executed_dispatches.push(ExecutedDispatch {
                        pass: record.label.clone(),
                        pipeline,
                        workgroups,
                    });
                }
            }
            RecordedCommand::CopyBufferToBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            } => {
                let bytes = self.buffers.get(&source).and_then(|b| {
                    b.data
                        .get(source_offset as usize..(source_offset + size) as usize)
                        .map(<[u8]>::to_vec)
                });
                match (bytes, self.buffers.get_mut(&destination)) {
                    (Some(bytes), Some(dst)) => {
                        let start = destination_offset as usize;
                        if let Some(slot) = dst.data.get_mut(start..start + bytes.len()) {
                            slot.copy_from_slice(&bytes);
                        } else {
                            log::warn!("Buffer copy into {destination:?} out of bounds");
                        }
                    }
                    _ => log::warn!("Buffer copy {source:?} -> {destination:?} skipped"),
                }
            }
            RecordedCommand::ClearBuffer {
                buffer,
                offset,
                size,
            } => {
                if let Some(b) = self.buffers.get_mut(&buffer) {
                    let start = (offset as usize).min(b.data.len());
                    let end = size.map_or(b.data.len(), |s| (start + s as usize).min(b.data.len()));
                    b.data[start..end].fill(0);
                }
            }
            RecordedCommand::CopyTextureToBuffer {
                source,
                destination,
                bytes_per_row,
                size,
            } => self.copy_texture_to_buffer(source, destination, bytes_per_row, size),
        }
    }

    fn execute_render_pass(&mut self, record: RenderPassRecord) {
        let mut targets = Vec::new();
        for attachment in &record.color_attachments {
            if let Some(texture) = self.views.get(&attachment.view).copied() {
                if let LoadOp::Clear(color) = attachment.ops.load {
                    self.set_contents(texture, TextureContents::Cleared(color));
                }
                targets.push(texture);
            }
        }
        if let Some(depth) = record.depth_attachment {
            if let Some(texture) = self.views.get(&depth.view).copied() {
                if let Some(Operations {
                    load: LoadOp::Clear(value),
                    ..
                }) = depth.depth_ops
                {
                    let value = value as f64;
                    self.set_contents(
                        texture,
                        TextureContents::Cleared(Color::new(value, value, value, value)),
                    );
                }
                targets.push(texture);
            }
        }

        for draw in record.draws {
            let (index_count, instance_count) = match draw.kind {
                DrawKind::IndexedIndirect { buffer, offset } => self.indirect_counts(buffer, offset),
                _ => (draw.index_count, draw.instance_count),
            };
            let executed = ExecutedDraw {
                pass: record.label.clone(),
                pipeline: draw.pipeline,
                kind: draw.kind,
                index_count,
                instance_count,
            };
            if executed.rasterizes() {
                for texture in &targets {
                    if let Some(info) = self.textures.get_mut(texture) {
                        match executed.kind {
                            DrawKind::Direct => info.fullscreen_draws += 1,
                            _ => info.geometry_draws += 1,
                        }
                    }
                }
            }
            self.executed_draws.push(executed);
        }
    }

    fn set_contents(&mut self, texture: TextureId, contents: TextureContents) {
        if let Some(info) = self.textures.get_mut(&texture) {
            info.contents = contents;
        }
    }

    fn indirect_counts(&self, buffer: BufferId, offset: u64) -> (u32, u32) {
        let start = offset as usize;
        let end = start + DrawIndexedIndirectArgs::SIZE as usize;
        self.buffers
            .get(&buffer)
            .and_then(|b| b.data.get(start..end))
            .map(|bytes| {
                let args: DrawIndexedIndirectArgs = bytemuck::pod_read_unaligned(bytes);
                (args.index_count, args.instance_count)
            })
            .unwrap_or_else(|| {
                log::warn!("Indirect args at {buffer:?}+{offset} out of bounds");
                (0, 0)
            })
    }

    fn copy_texture_to_buffer(
        &mut self,
        source: TextureId,
        destination: BufferId,
        bytes_per_row: u32,
        size: Extent3D,
    ) {
        let Some(info) = self.textures.get(&source) else {
            log::warn!("Texture copy from unknown {source:?}");
            return;
        };
        let texel_size = info.format.bytes_per_pixel() as usize;
        let row_bytes = size.width as usize * texel_size;
        let texel = match &info.contents {
            TextureContents::Cleared(color) => encode_texel(info.format, *color),
            _ => vec![0; texel_size],
        };
        let uploaded = match &info.contents {
            TextureContents::Uploaded(data) => Some(data.clone()),
            _ => None,
        };
        let Some(dst) = self.buffers.get_mut(&destination) else {
            log::warn!("Texture copy into unknown {destination:?}");
            return;
        };
        for row in 0..size.height as usize {
            let dst_start = row * bytes_per_row as usize;
            let Some(dst_row) = dst.data.get_mut(dst_start..dst_start + row_bytes) else {
                log::warn!("Texture copy into {destination:?} out of bounds");
                return;
            };
            match &uploaded {
                Some(data) => {
                    let src_start = row * row_bytes;
                    if let Some(src_row) = data.get(src_start..src_start + row_bytes) {
                        dst_row.copy_from_slice(src_row);
                    }
                }
                None => {
                    for chunk in dst_row.chunks_exact_mut(texel_size) {
                        chunk.copy_from_slice(&texel);
                    }
                }
            }
        }
    }
}

fn encode_texel(format: TextureFormat, color: Color) -> Vec<u8> {
    let unorm = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let srgb = |v: f64| {
        let v = v.clamp(0.0, 1.0);
        let encoded = if v <= 0.003_130_8 {
            v * 12.92
        } else {
            1.055 * v.powf(1.0 / 2.4) - 0.055
        };
        unorm(encoded)
    };
    let half = |v: f64| f32_to_f16_bits(v as f32).to_le_bytes();
    let float = |v: f64| (v as f32).to_le_bytes();
    let Color { r, g, b, a } = color;
    match format {
        TextureFormat::R8Unorm => vec![unorm(r)],
        TextureFormat::R16Float => half(r).to_vec(),
        TextureFormat::R32Float | TextureFormat::Depth32Float => float(r).to_vec(),
        TextureFormat::Rg16Float => [half(r), half(g)].concat(),
        TextureFormat::Rgba8Unorm => vec![unorm(r), unorm(g), unorm(b), unorm(a)],
        TextureFormat::Rgba8UnormSrgb => vec![srgb(r), srgb(g), srgb(b), unorm(a)],
        TextureFormat::Bgra8Unorm => vec![unorm(b), unorm(g), unorm(r), unorm(a)],
        TextureFormat::Bgra8UnormSrgb => vec![srgb(b), srgb(g), srgb(r), unorm(a)],
        TextureFormat::Rgb10a2Unorm => {
            let ten = |v: f64| (v.clamp(0.0, 1.0) * 1023.0).round() as u32;
            let two = (a.clamp(0.0, 1.0) * 3.0).round() as u32;
            (ten(r) | ten(g) << 10 | ten(b) << 20 | two << 30)
                .to_le_bytes()
                .to_vec()
        }
        TextureFormat::Rgba16Float => [half(r), half(g), half(b), half(a)].concat(),
        TextureFormat::Rgba32Float => [float(r), float(g), float(b), float(a)].concat(),
        TextureFormat::Depth24PlusStencil8 => {
            ((r.clamp(0.0, 1.0) * 16_777_215.0).round() as u32)
                .to_le_bytes()
                .to_vec()
        }
    }
}

/// Converts to IEEE half precision, flushing subnormals to zero.
fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    if value.is_nan() {
        return sign | 0x7e00;
    }
    let exponent = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    if exponent >= 0x1f {
        return sign | 0x7c00;
    }
    if exponent <= 0 {
        return sign;
    }
    sign | ((exponent as u16) << 10) | ((bits & 0x007f_ffff) >> 13) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn buffer(device: &HeadlessDevice, size: u64, usage: BufferUsage) -> BufferId {
        device
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed("test")),
                size,
                usage,
                mapped_at_creation: false,
            })
            .expect("buffer")
    }

    #[test]
    fn test_copies_apply_on_submit() {
        let device = HeadlessDevice::new();
        let src = buffer(&device, 8, BufferUsage::COPY_SRC | BufferUsage::COPY_DST);
        let dst = buffer(&device, 8, BufferUsage::COPY_DST | BufferUsage::MAP_READ);
        device.write_buffer(src, 0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        let mut encoder = device.create_command_encoder(Some("copy"));
        encoder.copy_buffer_to_buffer(&src, 4, &dst, 0, 4);
        let cb = encoder.finish();
        assert_eq!(device.buffer_contents(dst).unwrap(), vec![0; 8], "nothing before submit");

        device.submit_command_buffer(cb);
        let read = pollster::block_on(device.read_buffer(dst, 0, 4)).unwrap();
        assert_eq!(read, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_indirect_draws_resolve_counts_at_execution() {
        let device = HeadlessDevice::new();
        let args = buffer(&device, 40, BufferUsage::INDIRECT | BufferUsage::COPY_DST);
        let record = DrawIndexedIndirectArgs {
            index_count: 36,
            instance_count: 3,
            ..Default::default()
        };
        device
            .write_buffer(args, DrawIndexedIndirectArgs::SIZE, bytemuck::bytes_of(&record))
            .unwrap();

        let mut encoder = device.create_command_encoder(None);
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Geometry"),
                ..Default::default()
            });
            pass.draw_indexed_indirect(&args, 0);
            pass.draw_indexed_indirect(&args, DrawIndexedIndirectArgs::SIZE);
        }
        device.submit_command_buffer(encoder.finish());

        let draws = device.executed_draws();
        assert_eq!(draws.len(), 2);
        assert!(!draws[0].rasterizes(), "first record is zeroed");
        assert_eq!((draws[1].index_count, draws[1].instance_count), (36, 3));
        assert_eq!(draws[1].pass, "Geometry");
    }

    #[test]
    fn test_destroy_tracks_and_rejects_unknown_ids() {
        let device = HeadlessDevice::new();
        let texture = device
            .create_texture(&TextureDescriptor::d2(
                "t",
                4,
                4,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT,
            ))
            .unwrap();
        device.destroy_texture(texture).unwrap();
        assert!(device.is_texture_destroyed(texture));
        assert!(matches!(
            device.destroy_texture(texture),
            Err(ResourceError::InvalidHandle)
        ));
    }

    #[test]
    fn test_cleared_texture_reads_back_its_clear_color() {
        let device = HeadlessDevice::new();
        let texture = device
            .create_texture(&TextureDescriptor::d2(
                "target",
                2,
                2,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
            ))
            .unwrap();
        let view = device
            .create_texture_view(texture, &TextureViewDescriptor::default())
            .unwrap();
        let readback = buffer(&device, 256 * 2, BufferUsage::COPY_DST | BufferUsage::MAP_READ);

        let mut encoder = device.create_command_encoder(None);
        {
            let attachments = [RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations::clear(Color::new(1.0, 0.0, 0.0, 1.0)),
            }];
            let _pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Clear"),
                color_attachments: &attachments,
                depth_stencil_attachment: None,
            });
        }
        encoder.copy_texture_to_buffer(&texture, &readback, 256, Extent3D::d2(2, 2));
        device.submit_command_buffer(encoder.finish());

        let bytes = device.buffer_contents(readback).unwrap();
        assert_eq!(&bytes[0..8], &[255, 0, 0, 255, 255, 0, 0, 255]);
        assert_eq!(&bytes[256..260], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_half_float_encoding() {
        assert_eq!(f32_to_f16_bits(0.0), 0);
        assert_eq!(f32_to_f16_bits(1.0), 0x3c00);
        assert_eq!(f32_to_f16_bits(-2.0), 0xc000);
        assert_eq!(f32_to_f16_bits(1.0e6), 0x7c00);
    }
}
