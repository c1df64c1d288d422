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

//! Descriptions of the resources a [`super::ResourceBuilder`] can own.

use ember_core::ember_bitflags;
use ember_core::renderer::api::{BufferUsage, SamplerDescriptor, TextureFormat, TextureUsage};
use ember_core::renderer::TileSize;

/// The category of a named resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A colour render target or sampled texture.
    Texture2D,
    /// A depth (and optionally stencil) buffer.
    DepthStencil,
    /// A small uniform buffer written from the CPU.
    ConstantBuffer,
    /// A storage buffer.
    StructuredBuffer,
    /// A fixed-size depth atlas holding every shadow map.
    ShadowAtlas,
    /// A texture with a full mip chain and one view per mip.
    MipChain,
    /// Several colour targets that always share a size.
    GBuffer,
    /// A sampler.
    Sampler,
}

impl ResourceKind {
    /// A readable name, used in errors and editor panels.
    pub const fn name(&self) -> &'static str {
        match self {
            ResourceKind::Texture2D => "Texture2D",
            ResourceKind::DepthStencil => "DepthStencil",
            ResourceKind::ConstantBuffer => "ConstantBuffer",
            ResourceKind::StructuredBuffer => "StructuredBuffer",
            ResourceKind::ShadowAtlas => "ShadowAtlas",
            ResourceKind::MipChain => "MipChain",
            ResourceKind::GBuffer => "GBuffer",
            ResourceKind::Sampler => "Sampler",
        }
    }
}

ember_bitflags! {
    /// Options applied when a resource is registered.
    pub struct ResourceCreationFlags: u32 {
        /// Alias onto an existing shared resource with an identical descriptor.
        const SHARED = 1 << 0;
    }
}

/// How the pixel size of a texture is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceSize {
    /// Follows the render viewport, multiplied by `scale`.
    Viewport {
        /// Multiplier applied to both axes.
        scale: f32,
    },
    /// Never changes on resize.
    Fixed {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

impl ResourceSize {
    /// The full viewport.
    pub const VIEWPORT: Self = Self::Viewport { scale: 1.0 };

    /// A square fixed size.
    pub const fn square(size: u32) -> Self {
        Self::Fixed {
            width: size,
            height: size,
        }
    }

    /// Returns `true` if the size depends on the viewport.
    pub const fn follows_viewport(&self) -> bool {
        matches!(self, ResourceSize::Viewport { .. })
    }

    /// Pixel size for a viewport, never smaller than 1x1.
    pub fn resolve(&self, viewport: (u32, u32)) -> (u32, u32) {
        match *self {
            ResourceSize::Viewport { scale } => (
                ((viewport.0 as f32 * scale).round() as u32).max(1),
                ((viewport.1 as f32 * scale).round() as u32).max(1),
            ),
            ResourceSize::Fixed { width, height } => (width.max(1), height.max(1)),
        }
    }
}

/// How the byte size of a buffer is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSize {
    /// A constant size.
    Fixed(u64),
    /// `bytes_per_tile` for every screen tile of the viewport.
    PerTile {
        /// Tile edge.
        tile_size: TileSize,
        /// Bytes stored for each tile.
        bytes_per_tile: u64,
    },
}

impl BufferSize {
    /// Returns `true` if the size depends on the viewport.
    pub const fn follows_viewport(&self) -> bool {
        matches!(self, BufferSize::PerTile { .. })
    }

    /// Byte size for a viewport, never zero.
    pub fn resolve(&self, viewport: (u32, u32)) -> u64 {
        match *self {
            BufferSize::Fixed(size) => size.max(4),
            BufferSize::PerTile {
                tile_size,
                bytes_per_tile,
            } => {
                let tiles = tile_size.tile_count(viewport.0.max(1)) as u64
                    * tile_size.tile_count(viewport.1.max(1)) as u64;
                (tiles * bytes_per_tile).max(4)
            }
        }
    }
}

/// How many mips a texture carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MipLevels {
    /// Mip 0 only.
    #[default]
    One,
    /// Down to 1x1.
    Full,
}

/// Parameters of a texture-backed resource.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureResourceDesc {
    /// Texel format.
    pub format: TextureFormat,
    /// Pixel size rule.
    pub size: ResourceSize,
    /// Allowed usages.
    pub usage: TextureUsage,
    /// Mip count rule.
    pub mip_levels: MipLevels,
}

impl TextureResourceDesc {
    /// A viewport-sized, single-mip texture.
    pub fn viewport(format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            format,
            size: ResourceSize::VIEWPORT,
            usage,
            mip_levels: MipLevels::One,
        }
    }

    /// A fixed-size, single-mip texture.
    pub fn fixed(format: TextureFormat, width: u32, height: u32, usage: TextureUsage) -> Self {
        Self {
            format,
            size: ResourceSize::Fixed { width, height },
            usage,
            mip_levels: MipLevels::One,
        }
    }
}

/// Parameters of a buffer-backed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferResourceDesc {
    /// Byte size rule.
    pub size: BufferSize,
    /// Allowed usages.
    pub usage: BufferUsage,
}

/// Everything needed to (re)create a named resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDescriptor {
    /// `Texture2D`, `DepthStencil`, `ShadowAtlas` or `MipChain`.
    Texture {
        /// Which texture flavour.
        kind: ResourceKind,
        /// Texture parameters.
        desc: TextureResourceDesc,
    },
    /// A set of same-sized colour targets.
    GBuffer {
        /// One format per target, in attachment order.
        formats: Vec<TextureFormat>,
        /// Pixel size rule shared by all targets.
        size: ResourceSize,
        /// Usages shared by all targets.
        usage: TextureUsage,
    },
    /// `ConstantBuffer` or `StructuredBuffer`.
    Buffer {
        /// Which buffer flavour.
        kind: ResourceKind,
        /// Buffer parameters.
        desc: BufferResourceDesc,
    },
    /// A sampler.
    Sampler(SamplerDescriptor<'static>),
    /// A texture view owned elsewhere, registered with `import_texture`.
    Imported {
        /// Texel format of the view.
        format: TextureFormat,
    },
}

impl ResourceDescriptor {
    /// The resource category.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceDescriptor::Texture { kind, .. } | ResourceDescriptor::Buffer { kind, .. } => {
                *kind
            }
            ResourceDescriptor::GBuffer { .. } => ResourceKind::GBuffer,
            ResourceDescriptor::Sampler(_) => ResourceKind::Sampler,
            ResourceDescriptor::Imported { .. } => ResourceKind::Texture2D,
        }
    }

    /// Returns `true` if a resize has to recreate the resource.
    pub fn follows_viewport(&self) -> bool {
        match self {
            ResourceDescriptor::Texture { desc, .. } => desc.size.follows_viewport(),
            ResourceDescriptor::GBuffer { size, .. } => size.follows_viewport(),
            ResourceDescriptor::Buffer { desc, .. } => desc.size.follows_viewport(),
            ResourceDescriptor::Sampler(_) | ResourceDescriptor::Imported { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_size_scales_and_clamps() {
        let half = ResourceSize::Viewport { scale: 0.5 };
        assert_eq!(half.resolve((1920, 1080)), (960, 540));
        assert_eq!(half.resolve((1, 1)), (1, 1), "never collapses to zero");
        assert_eq!(ResourceSize::square(512).resolve((1920, 1080)), (512, 512));
    }

    #[test]
    fn per_tile_buffer_follows_viewport() {
        let size = BufferSize::PerTile {
            tile_size: TileSize::X16,
            bytes_per_tile: 8,
        };
        assert!(size.follows_viewport());
        assert_eq!(size.resolve((1920, 1080)), 120 * 68 * 8);
        assert!(!BufferSize::Fixed(64).follows_viewport());
    }

    #[test]
    fn descriptor_kinds() {
        let depth = ResourceDescriptor::Texture {
            kind: ResourceKind::DepthStencil,
            desc: TextureResourceDesc::viewport(
                TextureFormat::Depth32Float,
                TextureUsage::RENDER_ATTACHMENT,
            ),
        };
        assert_eq!(depth.kind(), ResourceKind::DepthStencil);
        assert!(depth.follows_viewport());
        assert_eq!(
            ResourceDescriptor::Sampler(SamplerDescriptor::LINEAR_CLAMP).kind(),
            ResourceKind::Sampler
        );
    }
}
