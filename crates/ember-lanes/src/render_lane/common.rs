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

//! Pipeline and bind group helpers shared by the built-in passes.

use std::borrow::Cow;
use std::num::NonZeroU64;

use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, RenderPass, ResourceError};

/// Byte stride of [`standard_vertex_layout`].
pub const STANDARD_VERTEX_STRIDE: u64 = 64;

/// The vertex layout of every built-in geometry pipeline: position at
/// location 0, normal at 1, uv at 2, then four joint indices at 3 and their
/// weights at 4, interleaved. Rigid meshes leave the weights at zero.
pub fn standard_vertex_layout() -> VertexBufferLayout {
    VertexBufferLayout {
        array_stride: STANDARD_VERTEX_STRIDE,
        step_mode: VertexStepMode::Vertex,
        attributes: vec![
            VertexAttribute {
                format: VertexFormat::Float32x3,
                offset: 0,
                shader_location: 0,
            },
            VertexAttribute {
                format: VertexFormat::Float32x3,
                offset: 12,
                shader_location: 1,
            },
            VertexAttribute {
                format: VertexFormat::Float32x2,
                offset: 24,
                shader_location: 2,
            },
            VertexAttribute {
                format: VertexFormat::Uint32x4,
                offset: 32,
                shader_location: 3,
            },
            VertexAttribute {
                format: VertexFormat::Float32x4,
                offset: 48,
                shader_location: 4,
            },
        ],
    }
}

// --- Layout entries ---

pub(crate) fn uniform_entry<T>(binding: u32, visibility: ShaderStageFlags) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry::new(
        binding,
        visibility,
        BindingType::UniformBuffer {
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        },
    )
}

pub(crate) fn storage_entry(
    binding: u32,
    visibility: ShaderStageFlags,
    read_only: bool,
) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry::new(binding, visibility, BindingType::StorageBuffer { read_only })
}

pub(crate) fn texture_entry(
    binding: u32,
    visibility: ShaderStageFlags,
    sample_type: TextureSampleType,
) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry::new(
        binding,
        visibility,
        BindingType::Texture {
            sample_type,
            view_dimension: TextureViewDimension::D2,
        },
    )
}

pub(crate) fn sampler_entry(
    binding: u32,
    visibility: ShaderStageFlags,
    ty: SamplerBindingType,
) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry::new(binding, visibility, BindingType::Sampler(ty))
}

/// Unfilterable float texture, read with `textureLoad`.
pub(crate) const UNFILTERED: TextureSampleType = TextureSampleType::Float { filterable: false };
/// Filterable float texture.
pub(crate) const FILTERED: TextureSampleType = TextureSampleType::Float { filterable: true };

/// Group 3 of the lighting shaders: lights, light grid, index list, shadow
/// tiles, shadow atlas, comparison sampler, weather and tile parameters.
pub(crate) fn lighting_layout(device: &dyn GraphicsDevice) -> Result<BindGroupLayoutId, ResourceError> {
    let fragment = ShaderStageFlags::FRAGMENT;
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("LightingLayout"),
        entries: &[
            storage_entry(0, fragment, true),
            storage_entry(1, fragment, true),
            storage_entry(2, fragment, true),
            storage_entry(3, fragment, true),
            texture_entry(4, fragment, TextureSampleType::Depth),
            sampler_entry(5, fragment, SamplerBindingType::Comparison),
            uniform_entry::<WeatherConstants>(6, fragment),
            BindGroupLayoutEntry::new(
                7,
                fragment,
                BindingType::UniformBuffer {
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(16),
                },
            ),
        ],
    })
}

/// A layout without bindings, used to fill unused group slots.
pub(crate) fn empty_layout(device: &dyn GraphicsDevice) -> Result<BindGroupLayoutId, ResourceError> {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("EmptyLayout"),
        entries: &[],
    })
}

// --- Pipelines ---

/// Depth state over the main `Depth32Float` buffer.
pub(crate) fn depth_state(write: bool, compare: CompareFunction) -> DepthStencilState {
    DepthStencilState {
        format: TextureFormat::Depth32Float,
        depth_write_enabled: write,
        depth_compare: compare,
        bias: DepthBias::default(),
    }
}

/// Creates a pipeline drawing the fullscreen triangle of `fullscreen.wgsl`.
pub(crate) fn fullscreen_pipeline(
    device: &dyn GraphicsDevice,
    label: &str,
    module: ShaderModuleId,
    fragment_entry: &str,
    layouts: &[BindGroupLayoutId],
    targets: Vec<ColorTargetState>,
) -> Result<RenderPipelineId, ResourceError> {
    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
    })?;
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(Cow::Owned(label.to_string())),
        layout,
        vertex: ShaderStage {
            module,
            entry_point: "vs_main",
        },
        vertex_buffers: Vec::new(),
        fragment: Some(ShaderStage {
            module,
            entry_point: fragment_entry,
        }),
        color_targets: targets,
        depth_stencil: None,
        topology: PrimitiveTopology::TriangleList,
        cull_mode: CullMode::None,
    })
}

/// Parameters of a pipeline drawing meshes with the standard vertex layout.
pub(crate) struct GeometryPipeline<'a> {
    pub label: &'a str,
    pub module: ShaderModuleId,
    pub fragment_entry: Option<&'a str>,
    pub layouts: &'a [BindGroupLayoutId],
    pub targets: Vec<ColorTargetState>,
    pub depth: DepthStencilState,
    pub cull_mode: CullMode,
}

impl GeometryPipeline<'_> {
    pub(crate) fn create(self, device: &dyn GraphicsDevice) -> Result<RenderPipelineId, ResourceError> {
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(self.label),
            bind_group_layouts: self.layouts,
        })?;
        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Owned(self.label.to_string())),
            layout,
            vertex: ShaderStage {
                module: self.module,
                entry_point: "vs_main",
            },
            vertex_buffers: vec![standard_vertex_layout()],
            fragment: self.fragment_entry.map(|entry_point| ShaderStage {
                module: self.module,
                entry_point,
            }),
            color_targets: self.targets,
            depth_stencil: Some(self.depth),
            topology: PrimitiveTopology::TriangleList,
            cull_mode: self.cull_mode,
        })
    }
}

/// Destroys a render pipeline, logging failures.
pub(crate) fn destroy_pipeline(device: &dyn GraphicsDevice, pipeline: Option<RenderPipelineId>) {
    if let Some(pipeline) = pipeline {
        if let Err(err) = device.destroy_render_pipeline(pipeline) {
            log::warn!("Failed to destroy pipeline {pipeline:?}: {err}");
        }
    }
}

/// Draws the fullscreen triangle.
pub(crate) fn draw_fullscreen(pass: &mut dyn RenderPass<'_>) {
    pass.draw(0..3, 0..1);
}

// --- Bind groups ---

/// A bind group that is rebuilt whenever its key changes, typically the
/// resource builder generation.
#[derive(Debug)]
pub(crate) struct CachedBindGroup<K> {
    entry: Option<(K, BindGroupId)>,
}

impl<K> Default for CachedBindGroup<K> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<K: PartialEq + Copy> CachedBindGroup<K> {
    /// Returns the cached group for `key`, creating it if the key changed.
    pub(crate) fn get_or_create(
        &mut self,
        device: &dyn GraphicsDevice,
        key: K,
        create: impl FnOnce() -> Result<BindGroupId, ResourceError>,
    ) -> Result<BindGroupId, ResourceError> {
        if let Some((cached, id)) = self.entry {
            if cached == key {
                return Ok(id);
            }
            // The resources behind the old group may already be gone.
            let _ = device.destroy_bind_group(id);
            self.entry = None;
        }
        let id = create()?;
        self.entry = Some((key, id));
        Ok(id)
    }

    /// Destroys the cached group.
    pub(crate) fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some((_, id)) = self.entry.take() {
            let _ = device.destroy_bind_group(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::HeadlessDevice;

    #[test]
    fn test_standard_vertex_layout_is_tightly_packed() {
        let layout = standard_vertex_layout();
        let end = layout
            .attributes
            .iter()
            .map(|a| a.offset + a.format.size())
            .max()
            .unwrap();
        assert_eq!(end, layout.array_stride);
    }

    #[test]
    fn test_cached_bind_group_rebuilds_on_key_change() {
        let device = HeadlessDevice::new();
        let layout = empty_layout(&device).unwrap();
        let create = || {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("Test"),
                layout,
                entries: &[],
            })
        };
        let mut cache = CachedBindGroup::default();

        let first = cache.get_or_create(&device, 1u64, create).unwrap();
        let again = cache.get_or_create(&device, 1u64, create).unwrap();
        assert_eq!(first, again, "Same key must reuse the group");

        let rebuilt = cache.get_or_create(&device, 2u64, create).unwrap();
        assert_ne!(first, rebuilt, "A new key must rebuild the group");
        cache.release(&device);
    }
}
