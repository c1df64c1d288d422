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

//! Bind group layouts and bind groups.
//!
//! Groups follow a fixed convention across the renderer: group 0 holds frame
//! data, group 1 holds per-draw instance data and group 2 belongs to the
//! material.

use super::buffer::BufferId;
use super::texture::{SamplerId, TextureFormat, TextureViewDimension, TextureViewId};
use crate::ember_bitflags;
use std::num::NonZeroU64;

ember_bitflags! {
    /// Shader stages a binding is visible to.
    pub struct ShaderStageFlags: u32 {
        /// Vertex stage.
        const VERTEX = 1 << 0;
        /// Fragment stage.
        const FRAGMENT = 1 << 1;
        /// Compute stage.
        const COMPUTE = 1 << 2;
    }
}

/// How a sampled texture is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSampleType {
    /// Filterable or unfilterable floats.
    Float {
        /// Whether the texture may be sampled with a filtering sampler.
        filterable: bool,
    },
    /// Depth values.
    Depth,
    /// Unsigned integers.
    Uint,
}

/// The kind of sampler expected by a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerBindingType {
    /// Filtering sampler.
    Filtering,
    /// Non-filtering sampler.
    NonFiltering,
    /// Comparison sampler.
    Comparison,
}

/// The type of resource bound at a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// A uniform buffer.
    UniformBuffer {
        /// Uses dynamic offsets.
        has_dynamic_offset: bool,
        /// Minimum binding size.
        min_binding_size: Option<NonZeroU64>,
    },
    /// A storage buffer.
    StorageBuffer {
        /// Read-only access.
        read_only: bool,
    },
    /// A sampled texture.
    Texture {
        /// Sample type.
        sample_type: TextureSampleType,
        /// View dimension.
        view_dimension: TextureViewDimension,
    },
    /// A write-only storage texture.
    StorageTexture {
        /// Texel format.
        format: TextureFormat,
        /// View dimension.
        view_dimension: TextureViewDimension,
    },
    /// A sampler.
    Sampler(SamplerBindingType),
}

/// One binding slot of a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutEntry {
    /// `@binding` index.
    pub binding: u32,
    /// Stages that can see the binding.
    pub visibility: ShaderStageFlags,
    /// Resource type.
    pub ty: BindingType,
}

impl BindGroupLayoutEntry {
    /// Shorthand for an entry.
    pub const fn new(binding: u32, visibility: ShaderStageFlags, ty: BindingType) -> Self {
        Self {
            binding,
            visibility,
            ty,
        }
    }
}

/// A descriptor used to create a [`BindGroupLayoutId`].
#[derive(Debug, Clone)]
pub struct BindGroupLayoutDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Binding slots.
    pub entries: &'a [BindGroupLayoutEntry],
}

/// An opaque handle to a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindGroupLayoutId(pub usize);

/// A range of a buffer bound to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferBinding {
    /// The buffer.
    pub buffer: BufferId,
    /// Byte offset.
    pub offset: u64,
    /// Bound size, `None` binds to the end of the buffer.
    pub size: Option<NonZeroU64>,
}

/// A resource bound to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingResource {
    /// A buffer range.
    Buffer(BufferBinding),
    /// A texture view.
    TextureView(TextureViewId),
    /// A sampler.
    Sampler(SamplerId),
}

impl BindingResource {
    /// Binds an entire buffer.
    pub const fn whole(buffer: BufferId) -> Self {
        Self::Buffer(BufferBinding {
            buffer,
            offset: 0,
            size: None,
        })
    }
}

/// One resource of a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupEntry {
    /// `@binding` index.
    pub binding: u32,
    /// Bound resource.
    pub resource: BindingResource,
}

impl BindGroupEntry {
    /// Shorthand for an entry.
    pub const fn new(binding: u32, resource: BindingResource) -> Self {
        Self { binding, resource }
    }
}

/// A descriptor used to create a [`BindGroupId`].
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Layout the group conforms to.
    pub layout: BindGroupLayoutId,
    /// Bound resources.
    pub entries: &'a [BindGroupEntry],
}

/// An opaque handle to a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindGroupId(pub usize);
