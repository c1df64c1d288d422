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

//! Typed, lazily resolved references to named resources.
//!
//! A [`ResourceRef`] stores the index of a slot in the builder's table, never
//! the GPU object itself. Recreating a resource on resize swaps the object in
//! the slot, so every outstanding reference follows it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ember_core::renderer::api::{BufferId, SamplerId, TextureFormat, TextureId, TextureViewId};

use super::descriptor::ResourceKind;

/// A live texture (or imported view) owned by the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureResource {
    /// The texture, `None` for views imported without one.
    pub texture: Option<TextureId>,
    /// A view over every mip.
    pub view: TextureViewId,
    /// One view per mip; empty unless the resource is a mip chain.
    pub mip_views: Vec<TextureViewId>,
    /// Width of mip 0.
    pub width: u32,
    /// Height of mip 0.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
}

/// A live set of same-sized colour targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GBufferResource {
    /// Targets in attachment order.
    pub targets: Vec<TextureResource>,
    /// Shared width.
    pub width: u32,
    /// Shared height.
    pub height: u32,
}

/// A live buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferResource {
    /// The buffer.
    pub buffer: BufferId,
    /// Byte size.
    pub size: u64,
}

/// The GPU objects currently backing a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuResource {
    /// A texture or imported view.
    Texture(TextureResource),
    /// A G-Buffer.
    GBuffer(GBufferResource),
    /// A buffer.
    Buffer(BufferResource),
    /// A sampler.
    Sampler(SamplerId),
}

/// A family of resource kinds that resolve to the same object type.
pub trait ResourceClass: 'static {
    /// The resolved object.
    type Object;

    /// Name used in `KindMismatch` errors.
    const NAME: &'static str;

    /// Returns `true` if a slot of `kind` can be viewed as this class.
    fn accepts(kind: ResourceKind) -> bool;

    /// Extracts the object from a slot.
    fn object(resource: &GpuResource) -> Option<&Self::Object>;
}

/// Marker for texture-backed resources.
#[derive(Debug)]
pub enum Texture {}
/// Marker for buffer-backed resources.
#[derive(Debug)]
pub enum Buffer {}
/// Marker for G-Buffers.
#[derive(Debug)]
pub enum GBuffer {}
/// Marker for samplers.
#[derive(Debug)]
pub enum Sampler {}

impl ResourceClass for Texture {
    type Object = TextureResource;
    const NAME: &'static str = "texture";

    fn accepts(kind: ResourceKind) -> bool {
        matches!(
            kind,
            ResourceKind::Texture2D
                | ResourceKind::DepthStencil
                | ResourceKind::ShadowAtlas
                | ResourceKind::MipChain
        )
    }

    fn object(resource: &GpuResource) -> Option<&TextureResource> {
        match resource {
            GpuResource::Texture(texture) => Some(texture),
            _ => None,
        }
    }
}

impl ResourceClass for Buffer {
    type Object = BufferResource;
    const NAME: &'static str = "buffer";

    fn accepts(kind: ResourceKind) -> bool {
        matches!(
            kind,
            ResourceKind::ConstantBuffer | ResourceKind::StructuredBuffer
        )
    }

    fn object(resource: &GpuResource) -> Option<&BufferResource> {
        match resource {
            GpuResource::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }
}

impl ResourceClass for GBuffer {
    type Object = GBufferResource;
    const NAME: &'static str = "gbuffer";

    fn accepts(kind: ResourceKind) -> bool {
        kind == ResourceKind::GBuffer
    }

    fn object(resource: &GpuResource) -> Option<&GBufferResource> {
        match resource {
            GpuResource::GBuffer(gbuffer) => Some(gbuffer),
            _ => None,
        }
    }
}

impl ResourceClass for Sampler {
    type Object = SamplerId;
    const NAME: &'static str = "sampler";

    fn accepts(kind: ResourceKind) -> bool {
        kind == ResourceKind::Sampler
    }

    fn object(resource: &GpuResource) -> Option<&SamplerId> {
        match resource {
            GpuResource::Sampler(sampler) => Some(sampler),
            _ => None,
        }
    }
}

/// A typed reference to a named resource.
pub struct ResourceRef<C: ResourceClass> {
    pub(crate) slot: usize,
    name: Arc<str>,
    _class: PhantomData<fn() -> C>,
}

impl<C: ResourceClass> ResourceRef<C> {
    pub(crate) fn new(slot: usize, name: &str) -> Self {
        Self {
            slot,
            name: Arc::from(name),
            _class: PhantomData,
        }
    }

    /// The name the reference was obtained with.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C: ResourceClass> Clone for ResourceRef<C> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot,
            name: self.name.clone(),
            _class: PhantomData,
        }
    }
}

impl<C: ResourceClass> PartialEq for ResourceRef<C> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<C: ResourceClass> Eq for ResourceRef<C> {}

impl<C: ResourceClass> fmt::Debug for ResourceRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Ref({:?} @ {})", C::NAME, self.name, self.slot)
    }
}

/// A reference to a texture, depth buffer, shadow atlas or mip chain.
pub type TextureRef = ResourceRef<Texture>;
/// A reference to a constant or structured buffer.
pub type BufferRef = ResourceRef<Buffer>;
/// A reference to a G-Buffer.
pub type GBufferRef = ResourceRef<GBuffer>;
/// A reference to a sampler.
pub type SamplerRef = ResourceRef<Sampler>;
