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

//! Texture, texture view and sampler descriptors.

use super::common::Extent3D;
use crate::ember_bitflags;
use std::borrow::Cow;

/// The memory layout of a texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single 8-bit normalized channel.
    R8Unorm,
    /// Single 16-bit float channel.
    R16Float,
    /// Single 32-bit float channel.
    R32Float,
    /// Two 16-bit float channels.
    Rg16Float,
    /// Four 8-bit normalized channels.
    Rgba8Unorm,
    /// Four 8-bit normalized channels, sRGB encoded.
    Rgba8UnormSrgb,
    /// Four 8-bit normalized channels in BGRA order.
    Bgra8Unorm,
    /// Four 8-bit normalized channels in BGRA order, sRGB encoded.
    Bgra8UnormSrgb,
    /// Packed 10-bit colour with 2-bit alpha.
    Rgb10a2Unorm,
    /// Four 16-bit float channels.
    Rgba16Float,
    /// Four 32-bit float channels.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with an 8-bit stencil.
    Depth24PlusStencil8,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float => 2,
            Self::R32Float
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Rgb10a2Unorm
            | Self::Depth32Float
            | Self::Depth24PlusStencil8 => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Returns `true` for depth and depth-stencil formats.
    pub const fn is_depth(&self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24PlusStencil8)
    }

    /// Returns `true` if the format carries a stencil aspect.
    pub const fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }
}

ember_bitflags! {
    /// Allowed usages of a texture. Bit values follow WebGPU.
    pub struct TextureUsage: u32 {
        /// Source of a copy.
        const COPY_SRC = 1 << 0;
        /// Destination of a copy or write.
        const COPY_DST = 1 << 1;
        /// Sampled in shaders.
        const TEXTURE_BINDING = 1 << 2;
        /// Bound as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// Used as a colour or depth attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// The dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// One dimensional.
    D1,
    /// Two dimensional, optionally layered.
    #[default]
    D2,
    /// Three dimensional.
    D3,
}

/// A descriptor used to create a [`TextureId`].
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size of mip 0.
    pub size: Extent3D,
    /// Number of mip levels.
    pub mip_level_count: u32,
    /// Sample count for multisampled textures.
    pub sample_count: u32,
    /// Dimensionality.
    pub dimension: TextureDimension,
    /// Texel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl<'a> TextureDescriptor<'a> {
    /// A single-mip, single-sample 2D texture.
    pub fn d2(
        label: impl Into<Cow<'a, str>>,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            label: Some(label.into()),
            size: Extent3D::d2(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage,
        }
    }

    /// Number of mips needed to reduce `width` x `height` down to one texel.
    pub fn full_mip_count(width: u32, height: u32) -> u32 {
        32 - width.max(height).max(1).leading_zeros()
    }
}

/// The dimension a texture view is interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    /// Plain 2D view.
    D2,
    /// Array of 2D layers.
    D2Array,
    /// Cube map.
    Cube,
    /// 3D view.
    D3,
}

/// The aspect of a texture a view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureAspect {
    /// Every aspect.
    #[default]
    All,
    /// Depth only.
    DepthOnly,
    /// Stencil only.
    StencilOnly,
}

/// A descriptor used to create a [`TextureViewId`].
#[derive(Debug, Clone, Default)]
pub struct TextureViewDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Format override, `None` inherits the texture format.
    pub format: Option<TextureFormat>,
    /// Dimension override.
    pub dimension: Option<TextureViewDimension>,
    /// Aspect exposed by the view.
    pub aspect: TextureAspect,
    /// First visible mip.
    pub base_mip_level: u32,
    /// Number of visible mips, `None` means all remaining.
    pub mip_level_count: Option<u32>,
    /// First visible layer.
    pub base_array_layer: u32,
    /// Number of visible layers, `None` means all remaining.
    pub array_layer_count: Option<u32>,
}

/// How texture coordinates outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Clamp to the border texel.
    ClampToEdge,
    /// Tile.
    Repeat,
    /// Tile with mirroring.
    MirrorRepeat,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    Linear,
}

/// Comparison function for depth tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less.
    Less,
    /// Passes if equal.
    Equal,
    /// Passes if less or equal.
    LessEqual,
    /// Passes if greater.
    Greater,
    /// Passes if not equal.
    NotEqual,
    /// Passes if greater or equal.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// A descriptor used to create a [`SamplerId`].
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Addressing on every axis.
    pub address_mode: AddressMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Filter between mips.
    pub mipmap_filter: FilterMode,
    /// Makes this a comparison sampler.
    pub compare: Option<CompareFunction>,
}

impl SamplerDescriptor<'static> {
    /// Bilinear, clamped.
    pub const LINEAR_CLAMP: Self = Self::preset("LinearClamp", AddressMode::ClampToEdge, FilterMode::Linear, None);
    /// Bilinear, tiled.
    pub const LINEAR_WRAP: Self = Self::preset("LinearWrap", AddressMode::Repeat, FilterMode::Linear, None);
    /// Point sampling, clamped.
    pub const POINT_CLAMP: Self = Self::preset("PointClamp", AddressMode::ClampToEdge, FilterMode::Nearest, None);
    /// Hardware PCF for shadow maps.
    pub const SHADOW_COMPARE: Self = Self::preset(
        "ShadowCompare",
        AddressMode::ClampToEdge,
        FilterMode::Linear,
        Some(CompareFunction::LessEqual),
    );

    const fn preset(
        label: &'static str,
        address_mode: AddressMode,
        filter: FilterMode,
        compare: Option<CompareFunction>,
    ) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            compare,
        }
    }
}

/// An opaque handle to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// An opaque handle to a texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewId(pub usize);

/// An opaque handle to a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mip_count() {
        assert_eq!(TextureDescriptor::full_mip_count(1, 1), 1);
        assert_eq!(TextureDescriptor::full_mip_count(1920, 1080), 11);
        assert_eq!(TextureDescriptor::full_mip_count(512, 512), 10);
        assert_eq!(TextureDescriptor::full_mip_count(0, 0), 1);
    }

    #[test]
    fn test_format_sizes() {
        assert_eq!(TextureFormat::Rgba16Float.bytes_per_pixel(), 8);
        assert_eq!(TextureFormat::Rg16Float.bytes_per_pixel(), 4);
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Depth32Float.has_stencil());
    }
}
