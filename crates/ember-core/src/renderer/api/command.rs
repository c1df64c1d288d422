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

//! Render and compute pass descriptors.

use super::common::Color;
use super::texture::TextureViewId;

/// What happens to an attachment at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    /// Clear to the given value.
    Clear(V),
    /// Keep the existing contents.
    Load,
}

/// What happens to an attachment at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// Keep the rendered contents.
    Store,
    /// Contents may be discarded.
    Discard,
}

/// Load and store operations of an attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operations<V> {
    /// Load operation.
    pub load: LoadOp<V>,
    /// Store operation.
    pub store: StoreOp,
}

impl<V> Operations<V> {
    /// Clear then store.
    pub const fn clear(value: V) -> Self {
        Self {
            load: LoadOp::Clear(value),
            store: StoreOp::Store,
        }
    }

    /// Load then store.
    pub const fn load() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }
}

/// A colour attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassColorAttachment {
    /// Target view.
    pub view: TextureViewId,
    /// Multisample resolve target.
    pub resolve_target: Option<TextureViewId>,
    /// Load and store.
    pub ops: Operations<Color>,
}

/// The depth-stencil attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDepthStencilAttachment {
    /// Target view.
    pub view: TextureViewId,
    /// Depth operations, `None` makes depth read-only.
    pub depth_ops: Option<Operations<f32>>,
    /// Stencil operations.
    pub stencil_ops: Option<Operations<u32>>,
}

/// Describes a render pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderPassDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Colour attachments.
    pub color_attachments: &'a [RenderPassColorAttachment],
    /// Depth attachment.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
}

/// Describes a compute pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputePassDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
}

/// An opaque handle to a finished command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);
