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

//! Light sources and their GPU representation.

use crate::math::Vec3;
use bytemuck::{Pod, Zeroable};

/// The shadow technique used by a light, derived from its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowKind {
    /// Cascaded shadow maps, for directional lights.
    Cascaded,
    /// A single perspective shadow map, for spot lights.
    Perspective,
    /// Six cube faces, for point lights.
    Omnidirectional,
}

impl ShadowKind {
    /// Short name used for draw pass labels.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cascaded => "CSM",
            Self::Perspective => "PSM",
            Self::Omnidirectional => "OSM",
        }
    }
}

/// A light infinitely far away, like the sun.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in.
    pub direction: Vec3,
    /// Linear colour.
    pub color: Vec3,
    /// Illuminance multiplier.
    pub intensity: f32,
    /// Number of shadow cascades, `0` disables shadows.
    pub cascade_count: u32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.3, -1.0, -0.2).normalize(),
            color: Vec3::ONE,
            intensity: 3.0,
            cascade_count: 4,
        }
    }
}

/// A light radiating from a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// World position.
    pub position: Vec3,
    /// Linear colour.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Influence radius.
    pub range: f32,
    /// Whether the light renders a shadow cube.
    pub casts_shadows: bool,
}

/// A cone-shaped light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    /// World position.
    pub position: Vec3,
    /// Direction the cone points in.
    pub direction: Vec3,
    /// Linear colour.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Influence radius.
    pub range: f32,
    /// Full-intensity half angle in radians.
    pub inner_angle: f32,
    /// Cutoff half angle in radians.
    pub outer_angle: f32,
    /// Whether the light renders a shadow map.
    pub casts_shadows: bool,
}

/// Any light the renderer understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// See [`DirectionalLight`].
    Directional(DirectionalLight),
    /// See [`PointLight`].
    Point(PointLight),
    /// See [`SpotLight`].
    Spot(SpotLight),
}

impl Light {
    /// The shadow technique of this light, `None` when it casts no shadow.
    pub fn shadow_kind(&self) -> Option<ShadowKind> {
        match self {
            Light::Directional(l) if l.cascade_count > 0 => Some(ShadowKind::Cascaded),
            Light::Point(l) if l.casts_shadows => Some(ShadowKind::Omnidirectional),
            Light::Spot(l) if l.casts_shadows => Some(ShadowKind::Perspective),
            _ => None,
        }
    }

    /// Number of shadow atlas tiles this light occupies.
    pub fn shadow_tile_count(&self) -> u32 {
        match (self, self.shadow_kind()) {
            (Light::Directional(l), Some(_)) => l.cascade_count,
            (_, Some(ShadowKind::Omnidirectional)) => 6,
            (_, Some(_)) => 1,
            (_, None) => 0,
        }
    }

    /// Packs the light for the lighting shaders. `shadow_index` is the first
    /// atlas tile, or `-1` without shadows.
    pub fn to_gpu(&self, shadow_index: i32) -> GpuLight {
        let mut gpu = GpuLight {
            shadow_index,
            ..GpuLight::zeroed()
        };
        match self {
            Light::Directional(l) => {
                gpu.direction = l.direction.normalize_or_zero().to_array();
                gpu.color = l.color.to_array();
                gpu.intensity = l.intensity;
                gpu.kind = GpuLight::KIND_DIRECTIONAL;
            }
            Light::Point(l) => {
                gpu.position = l.position.to_array();
                gpu.range = l.range;
                gpu.color = l.color.to_array();
                gpu.intensity = l.intensity;
                gpu.kind = GpuLight::KIND_POINT;
            }
            Light::Spot(l) => {
                gpu.position = l.position.to_array();
                gpu.range = l.range;
                gpu.direction = l.direction.normalize_or_zero().to_array();
                gpu.color = l.color.to_array();
                gpu.intensity = l.intensity;
                gpu.kind = GpuLight::KIND_SPOT;
                gpu.cos_inner = l.inner_angle.cos();
                gpu.cos_outer = l.outer_angle.cos();
            }
        }
        gpu
    }
}

/// A light as laid out in the `Lights` storage buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// World position.
    pub position: [f32; 3],
    /// Influence radius.
    pub range: f32,
    /// Normalized direction.
    pub direction: [f32; 3],
    /// One of the `KIND_*` constants.
    pub kind: u32,
    /// Linear colour.
    pub color: [f32; 3],
    /// Intensity multiplier.
    pub intensity: f32,
    /// Cosine of the inner cone angle.
    pub cos_inner: f32,
    /// Cosine of the outer cone angle.
    pub cos_outer: f32,
    /// First shadow atlas tile or `-1`.
    pub shadow_index: i32,
    /// Padding.
    pub _pad: u32,
}

impl GpuLight {
    /// Directional light tag.
    pub const KIND_DIRECTIONAL: u32 = 0;
    /// Point light tag.
    pub const KIND_POINT: u32 = 1;
    /// Spot light tag.
    pub const KIND_SPOT: u32 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(casts_shadows: bool) -> Light {
        Light::Point(PointLight {
            position: Vec3::new(1.0, 2.0, 3.0),
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            casts_shadows,
        })
    }

    #[test]
    fn test_shadow_tiles_per_light_kind() {
        assert_eq!(point(true).shadow_tile_count(), 6);
        assert_eq!(point(false).shadow_tile_count(), 0);
        let sun = Light::Directional(DirectionalLight::default());
        assert_eq!(sun.shadow_kind(), Some(ShadowKind::Cascaded));
        assert_eq!(sun.shadow_tile_count(), 4);
    }

    #[test]
    fn test_gpu_light_packing() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 64);
        let gpu = point(false).to_gpu(-1);
        assert_eq!(gpu.kind, GpuLight::KIND_POINT);
        assert_eq!(gpu.position, [1.0, 2.0, 3.0]);
        assert_eq!(gpu.shadow_index, -1);
    }
}
