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

//! Shader module, pipeline layout and pipeline descriptors.

use super::bind_group::BindGroupLayoutId;
use super::texture::{CompareFunction, TextureFormat};
use std::borrow::Cow;

/// The source code of a shader module.
#[derive(Debug, Clone)]
pub enum ShaderSource<'a> {
    /// WGSL text.
    Wgsl(Cow<'a, str>),
}

/// A descriptor used to create a [`ShaderModuleId`].
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// The shader code.
    pub source: ShaderSource<'a>,
}

/// An opaque handle to a compiled shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderModuleId(pub usize);

/// A descriptor used to create a [`PipelineLayoutId`].
#[derive(Debug, Clone)]
pub struct PipelineLayoutDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Bind group layouts, indexed by group number.
    pub bind_group_layouts: &'a [BindGroupLayoutId],
}

/// An opaque handle to a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineLayoutId(pub usize);

/// An entry point into a shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStage<'a> {
    /// The module containing the entry point.
    pub module: ShaderModuleId,
    /// The function name.
    pub entry_point: &'a str,
}

/// The format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two `f32`.
    Float32x2,
    /// Three `f32`.
    Float32x3,
    /// Four `f32`.
    Float32x4,
    /// One `u32`.
    Uint32,
    /// Four `u32`.
    Uint32x4,
    /// Four normalized `u8`.
    Unorm8x4,
}

impl VertexFormat {
    /// Size in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 | Self::Uint32x4 => 16,
            Self::Uint32 | Self::Unorm8x4 => 4,
        }
    }
}

/// A vertex attribute inside a [`VertexBufferLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset from the start of the vertex.
    pub offset: u64,
    /// `@location` in the shader.
    pub shader_location: u32,
}

/// Whether a vertex buffer advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Per vertex.
    #[default]
    Vertex,
    /// Per instance.
    Instance,
}

/// Layout of one bound vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBufferLayout {
    /// Stride between elements in bytes.
    pub array_stride: u64,
    /// Step mode.
    pub step_mode: VertexStepMode,
    /// Attributes read from the buffer.
    pub attributes: Vec<VertexAttribute>,
}

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Triangle strip.
    TriangleStrip,
    /// Independent lines, used by wireframe shading.
    LineList,
}

/// Face culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    #[default]
    Back,
}

/// Colour blending presets used by the built-in passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Overwrite the destination.
    Replace,
    /// Standard alpha blending.
    Alpha,
    /// `src + dst`, used to accumulate light.
    Additive,
}

/// A colour attachment slot of a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTargetState {
    /// Attachment format.
    pub format: TextureFormat,
    /// Blending, `None` disables blending.
    pub blend: Option<BlendMode>,
}

impl From<TextureFormat> for ColorTargetState {
    fn from(format: TextureFormat) -> Self {
        Self {
            format,
            blend: None,
        }
    }
}

/// Depth bias applied to rasterized depth, used by shadow pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    /// Constant bias.
    pub constant: i32,
    /// Slope-scaled bias.
    pub slope_scale: f32,
}

/// Depth test configuration of a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    /// Depth attachment format.
    pub format: TextureFormat,
    /// Whether passing fragments write depth.
    pub depth_write_enabled: bool,
    /// The depth test.
    pub depth_compare: CompareFunction,
    /// Depth bias.
    pub bias: DepthBias,
}

/// A descriptor used to create a [`RenderPipelineId`].
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Pipeline layout.
    pub layout: PipelineLayoutId,
    /// Vertex stage.
    pub vertex: ShaderStage<'a>,
    /// Vertex buffers consumed by the vertex stage.
    pub vertex_buffers: Vec<VertexBufferLayout>,
    /// Fragment stage, absent for depth-only pipelines.
    pub fragment: Option<ShaderStage<'a>>,
    /// Colour targets written by the fragment stage.
    pub color_targets: Vec<ColorTargetState>,
    /// Depth state.
    pub depth_stencil: Option<DepthStencilState>,
    /// Topology.
    pub topology: PrimitiveTopology,
    /// Culling.
    pub cull_mode: CullMode,
}

/// An opaque handle to a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineId(pub usize);

/// A descriptor used to create a [`ComputePipelineId`].
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Pipeline layout.
    pub layout: PipelineLayoutId,
    /// Compute entry point.
    pub stage: ShaderStage<'a>,
}

/// An opaque handle to a compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputePipelineId(pub usize);
