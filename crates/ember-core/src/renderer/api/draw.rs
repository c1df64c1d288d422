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

//! GPU-visible records shared between the CPU side of the renderer and the
//! culling and drawing shaders. Every struct is `#[repr(C)]`, `Pod` and laid
//! out to match its WGSL counterpart.

use crate::math::{Aabb, BoundingVolume, Mat4};
use bytemuck::{Pod, Zeroable};

/// Arguments of one indexed indirect draw, as consumed by
/// `draw_indexed_indirect`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Indices per instance.
    pub index_count: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// First index in the index buffer.
    pub first_index: u32,
    /// Value added to each index.
    pub base_vertex: i32,
    /// First instance id.
    pub first_instance: u32,
}

impl DrawIndexedIndirectArgs {
    /// Byte size of one record.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Per-type draw template. The culling kernel turns one of these into one
/// [`DrawIndexedIndirectArgs`] record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct TypeData {
    /// Indices per instance.
    pub index_count_per_instance: u32,
    /// First index in the index buffer.
    pub start_index_location: u32,
    /// Value added to each index.
    pub base_vertex_location: i32,
    /// First instance id.
    pub start_instance_location: u32,
}

impl TypeData {
    /// A type drawing `index_count` indices from the start of its mesh.
    pub const fn with_index_count(index_count: u32) -> Self {
        Self {
            index_count_per_instance: index_count,
            start_index_location: 0,
            base_vertex_location: 0,
            start_instance_location: 0,
        }
    }
}

/// Bounds tag stored in [`InstanceData::bounds_kind`].
pub const BOUNDS_KIND_BOX: u32 = 0;
/// Bounds tag stored in [`InstanceData::bounds_kind`].
pub const BOUNDS_KIND_SPHERE: u32 = 1;

/// One cullable instance.
///
/// `transform` is stored transposed so the shader reads rows as columns.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct InstanceData {
    /// Transposed world transform.
    pub transform: [[f32; 4]; 4],
    /// Minimum corner of the local bounding box.
    pub bounds_min: [f32; 3],
    /// The type this instance belongs to.
    pub type_id: u32,
    /// Maximum corner of the local bounding box.
    pub bounds_max: [f32; 3],
    /// [`BOUNDS_KIND_BOX`] or [`BOUNDS_KIND_SPHERE`].
    pub bounds_kind: u32,
    /// Local bounding sphere, `xyz` centre and `w` radius.
    pub sphere: [f32; 4],
}

impl InstanceData {
    /// Packs a world transform and local bounds for type `type_id`.
    pub fn new(transform: &Mat4, bounds: &BoundingVolume, type_id: u32) -> Self {
        let aabb = bounds.aabb();
        let sphere = bounds.sphere();
        let bounds_kind = match bounds {
            BoundingVolume::Box(_) => BOUNDS_KIND_BOX,
            BoundingVolume::Sphere(_) => BOUNDS_KIND_SPHERE,
        };
        Self {
            transform: transform.transpose().to_cols_array_2d(),
            bounds_min: aabb.min.to_array(),
            type_id,
            bounds_max: aabb.max.to_array(),
            bounds_kind,
            sphere: sphere.center.extend(sphere.radius).to_array(),
        }
    }

    /// The world transform, undoing the transposition.
    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.transform).transpose()
    }

    /// The local bounding box.
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_min_max(self.bounds_min.into(), self.bounds_max.into())
    }
}

/// Parameters of the culling kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct OcclusionParams {
    /// Non-zero enables the Hi-Z occlusion test.
    pub activate_culling: u32,
    /// Number of valid instances.
    pub instance_count: u32,
    /// Number of valid types.
    pub type_count: u32,
    /// Highest mip of the depth chain.
    pub max_mip_level: u32,
    /// Size of depth-chain mip 0.
    pub rt_size: [f32; 2],
    /// `projection[0][0]`.
    pub p00: f32,
    /// `projection[1][1]`.
    pub p11: f32,
    /// Non-zero enables the frustum test.
    pub frustum_culling: u32,
    /// Padding to 16 bytes.
    pub _pad: [u32; 3],
}

/// Per-draw constants read through a dynamic uniform offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DrawConstants {
    /// First transform of the draw in the instance buffer.
    pub transform_offset: u32,
    /// Type id, used to find the compacted instance range.
    pub draw_type: u32,
    /// First bone matrix for skinned draws.
    pub bone_offset: u32,
    /// Instances in this draw.
    pub instance_count: u32,
    /// Bones per instance, zero for rigid draws.
    pub bone_count: u32,
    /// Pads the struct to a 16-byte multiple.
    pub _padding: [u32; 3],
}

/// Per-view camera constants bound as `CBCamera`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct CameraConstants {
    /// View matrix.
    pub view: [[f32; 4]; 4],
    /// Projection matrix.
    pub projection: [[f32; 4]; 4],
    /// `projection * view`.
    pub view_projection: [[f32; 4]; 4],
    /// Inverse of `view_projection`.
    pub inverse_view_projection: [[f32; 4]; 4],
    /// World position, `w` unused.
    pub position: [f32; 4],
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Render target size in pixels.
    pub viewport_size: [f32; 2],
}

/// Atmosphere constants bound as `CBWeather`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct WeatherConstants {
    /// Direction towards the sun, `w` unused.
    pub sun_direction: [f32; 4],
    /// Sun colour premultiplied by intensity.
    pub sun_color: [f32; 4],
    /// Ambient term.
    pub ambient_color: [f32; 4],
    /// Fog colour.
    pub fog_color: [f32; 4],
    /// Exponential fog density.
    pub fog_density: f32,
    /// Distance where fog starts.
    pub fog_start: f32,
    /// Seconds since start, for animated effects.
    pub time: f32,
    /// Padding.
    pub _pad: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{BoundingSphere, Vec3};

    #[test]
    fn test_record_sizes_match_shader_layouts() {
        assert_eq!(std::mem::size_of::<DrawIndexedIndirectArgs>(), 20);
        assert_eq!(std::mem::size_of::<TypeData>(), 16);
        assert_eq!(std::mem::size_of::<InstanceData>(), 112);
        assert_eq!(std::mem::size_of::<OcclusionParams>(), 48);
        assert_eq!(std::mem::size_of::<DrawConstants>(), 32);
        assert_eq!(std::mem::size_of::<CameraConstants>() % 16, 0);
        assert_eq!(std::mem::size_of::<WeatherConstants>() % 16, 0);
    }

    #[test]
    fn test_instance_data_stores_transposed_transform() {
        let transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let bounds = BoundingVolume::from(BoundingSphere::new(Vec3::ZERO, 2.0));
        let data = InstanceData::new(&transform, &bounds, 7);

        // Translation ends up in the last column of each row.
        assert_eq!(data.transform[0][3], 1.0);
        assert_eq!(data.transform[1][3], 2.0);
        assert_eq!(data.transform[2][3], 3.0);
        assert_eq!(data.world_transform(), transform);
        assert_eq!(data.type_id, 7);
        assert_eq!(data.bounds_kind, BOUNDS_KIND_SPHERE);
        assert_eq!(data.sphere, [0.0, 0.0, 0.0, 2.0]);
        assert_eq!(data.bounds_max, [2.0, 2.0, 2.0]);
    }
}
