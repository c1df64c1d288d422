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

//! CPU staging of draw types and instances for one frame.

use ember_core::ember_bitflags;
use ember_core::math::{BoundingVolume, Frustum, Mat4};
use ember_core::renderer::api::{DrawIndexedIndirectArgs, InstanceData, TypeData};

use super::CullingError;

ember_bitflags! {
    /// Visibility tests applied by the cull kernels.
    pub struct CullingFlags: u32 {
        /// Test instances against the camera frustum.
        const FRUSTUM = 1 << 0;
        /// Test instances against the Hi-Z depth chain.
        const OCCLUSION = 1 << 1;
    }
}

impl CullingFlags {
    /// Builds the flag set from renderer settings.
    pub fn from_settings(settings: &ember_core::renderer::CullingSettings) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::FRUSTUM, settings.frustum);
        flags.set(Self::OCCLUSION, settings.occlusion);
        flags
    }
}

/// Identifies one draw type: every instance of a type is drawn by the same
/// indirect draw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawTypeId(pub u32);

impl DrawTypeId {
    /// Index of the type in per-type tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Result of culling the staged instances on the CPU.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CulledSet {
    /// Visible instances, packed per type starting at the type's offset.
    /// Slots past a type's visible count are zeroed.
    pub instances: Vec<InstanceData>,
    /// One record per type, `instance_count` holding the visible count.
    pub args: Vec<DrawIndexedIndirectArgs>,
}

impl CulledSet {
    /// Number of visible instances of a type.
    pub fn visible_count(&self, draw_type: DrawTypeId) -> u32 {
        self.args
            .get(draw_type.index())
            .map_or(0, |args| args.instance_count)
    }
}

/// Collects every renderable instance of a frame, grouped by draw type.
///
/// The context is rebuilt from scene state each frame: call
/// [`CullingContext::clear`], then `append_type` followed by the type's
/// `append_instance` calls. Instances keep their append order within a type.
#[derive(Debug, Default)]
pub struct CullingContext {
    types: Vec<TypeData>,
    counts: Vec<u32>,
    instances: Vec<InstanceData>,
    world_bounds: Vec<BoundingVolume>,
    current: Option<DrawTypeId>,
}

impl CullingContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every type and instance.
    pub fn clear(&mut self) {
        self.types.clear();
        self.counts.clear();
        self.instances.clear();
        self.world_bounds.clear();
        self.current = None;
    }

    /// Registers a type drawing `index_count` indices per instance and makes
    /// it the target of subsequent `append_instance` calls.
    pub fn append_type(&mut self, index_count: u32) -> DrawTypeId {
        self.append_type_data(TypeData::with_index_count(index_count))
    }

    /// Registers a type from a full draw template.
    pub fn append_type_data(&mut self, template: TypeData) -> DrawTypeId {
        let id = DrawTypeId(self.types.len() as u32);
        self.types.push(template);
        self.counts.push(0);
        self.current = Some(id);
        id
    }

    /// Appends an instance to the most recently appended type.
    ///
    /// ## Errors
    /// * `CullingError::NoActiveType` - No type was appended yet.
    pub fn append_instance(
        &mut self,
        transform: &Mat4,
        bounds: &BoundingVolume,
    ) -> Result<(), CullingError> {
        let draw_type = self.current.ok_or(CullingError::NoActiveType)?;
        self.append_instance_to(draw_type, transform, bounds)
    }

    /// Appends an instance to an explicit type.
    ///
    /// ## Errors
    /// * `CullingError::UnknownType` - `draw_type` was never appended.
    pub fn append_instance_to(
        &mut self,
        draw_type: DrawTypeId,
        transform: &Mat4,
        bounds: &BoundingVolume,
    ) -> Result<(), CullingError> {
        let count = self
            .counts
            .get_mut(draw_type.index())
            .ok_or(CullingError::UnknownType(draw_type.0))?;
        *count += 1;
        self.instances
            .push(InstanceData::new(transform, bounds, draw_type.0));
        self.world_bounds.push(bounds.transformed(transform));
        Ok(())
    }

    /// Number of appended types.
    pub fn type_count(&self) -> u32 {
        self.types.len() as u32
    }

    /// Number of instances appended for a type, `0` for unknown types.
    pub fn instance_count(&self, draw_type: DrawTypeId) -> u32 {
        self.counts.get(draw_type.index()).copied().unwrap_or(0)
    }

    /// Number of instances across all types.
    pub fn total_instance_count(&self) -> u32 {
        self.instances.len() as u32
    }

    /// Byte offset of a type's record in the indirect args buffers.
    #[inline]
    pub fn draw_args_offset(&self, draw_type: DrawTypeId) -> u64 {
        draw_type.0 as u64 * DrawIndexedIndirectArgs::SIZE
    }

    /// Draw templates in type order.
    pub fn types(&self) -> &[TypeData] {
        &self.types
    }

    /// Instances in append order.
    pub fn instances(&self) -> &[InstanceData] {
        &self.instances
    }

    /// First slot of each type in the per-type instance buffers.
    pub fn type_offsets(&self) -> Vec<u32> {
        self.counts
            .iter()
            .scan(0u32, |offset, count| {
                let first = *offset;
                *offset += count;
                Some(first)
            })
            .collect()
    }

    /// Every instance, grouped by type in type order.
    pub fn no_cull_instances(&self) -> Vec<InstanceData> {
        let offsets = self.type_offsets();
        let mut cursor = offsets.clone();
        let mut grouped = vec![InstanceData::default(); self.instances.len()];
        for instance in &self.instances {
            let slot = &mut cursor[instance.type_id as usize];
            grouped[*slot as usize] = *instance;
            *slot += 1;
        }
        grouped
    }

    /// Draw records covering every instance of each type.
    pub fn no_cull_args(&self) -> Vec<DrawIndexedIndirectArgs> {
        self.types
            .iter()
            .zip(&self.counts)
            .map(|(template, &count)| args_for(template, count))
            .collect()
    }

    /// Draw records with zero instances, the starting point of a cull.
    pub fn empty_args(&self) -> Vec<DrawIndexedIndirectArgs> {
        self.types.iter().map(|template| args_for(template, 0)).collect()
    }

    /// Culls every instance against `frustum`.
    ///
    /// Only `CullingFlags::FRUSTUM` is evaluated here; occlusion needs the
    /// depth chain and is left to the GPU kernel, so the CPU result is a
    /// conservative superset of it.
    pub fn cull(&self, frustum: &Frustum, flags: CullingFlags) -> CulledSet {
        let offsets = self.type_offsets();
        let mut args = self.empty_args();
        let mut instances = vec![InstanceData::default(); self.instances.len()];
        for (instance, bounds) in self.instances.iter().zip(&self.world_bounds) {
            if flags.contains(CullingFlags::FRUSTUM) && !frustum.intersects(bounds) {
                continue;
            }
            let draw_type = instance.type_id as usize;
            let record = &mut args[draw_type];
            instances[(offsets[draw_type] + record.instance_count) as usize] = *instance;
            record.instance_count += 1;
        }
        CulledSet { instances, args }
    }
}

fn args_for(template: &TypeData, instance_count: u32) -> DrawIndexedIndirectArgs {
    DrawIndexedIndirectArgs {
        index_count: template.index_count_per_instance,
        instance_count,
        first_index: template.start_index_location,
        base_vertex: template.base_vertex_location,
        first_instance: template.start_instance_location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::math::{Aabb, BoundingSphere, Vec3};

    fn unit_box() -> BoundingVolume {
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)).into()
    }

    fn camera_frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        Frustum::from_view_projection(&(projection * view))
    }

    fn at(x: f32, y: f32, z: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, y, z))
    }

    #[test]
    fn test_instance_counts_follow_appends() {
        let mut context = CullingContext::new();
        let a = context.append_type(36);
        for i in 0..3 {
            context.append_instance(&at(i as f32, 0.0, 0.0), &unit_box()).unwrap();
        }
        let b = context.append_type(12);
        context.append_instance(&at(0.0, 1.0, 0.0), &unit_box()).unwrap();
        context.append_instance_to(a, &at(9.0, 0.0, 0.0), &unit_box()).unwrap();

        assert_eq!(context.instance_count(a), 4);
        assert_eq!(context.instance_count(b), 1);
        assert_eq!(context.instance_count(DrawTypeId(7)), 0);
        assert_eq!(context.total_instance_count(), 5);
        assert_eq!(context.type_offsets(), vec![0, 4]);
    }

    #[test]
    fn test_draw_args_offsets_strictly_increase() {
        let mut context = CullingContext::new();
        let ids: Vec<_> = (0..5).map(|i| context.append_type(3 * (i + 1))).collect();
        let offsets: Vec<u64> = ids.iter().map(|id| context.draw_args_offset(*id)).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(offsets[1] - offsets[0], DrawIndexedIndirectArgs::SIZE);
    }

    #[test]
    fn test_append_instance_requires_a_type() {
        let mut context = CullingContext::new();
        assert!(matches!(
            context.append_instance(&Mat4::IDENTITY, &unit_box()),
            Err(CullingError::NoActiveType)
        ));
        assert!(matches!(
            context.append_instance_to(DrawTypeId(2), &Mat4::IDENTITY, &unit_box()),
            Err(CullingError::UnknownType(2))
        ));
    }

    #[test]
    fn test_empty_type_still_has_a_record() {
        let mut context = CullingContext::new();
        let empty = context.append_type(6);
        let culled = context.cull(&camera_frustum(), CullingFlags::all());
        assert_eq!(culled.args.len(), 1);
        assert_eq!(culled.visible_count(empty), 0);
        assert_eq!(context.no_cull_args()[0].index_count, 6);
    }

    #[test]
    fn test_cull_compacts_visible_instances_per_type() {
        let mut context = CullingContext::new();
        let a = context.append_type(36);
        context.append_instance(&at(0.0, 0.0, 0.0), &unit_box()).unwrap();
        context.append_instance(&at(500.0, 0.0, 0.0), &unit_box()).unwrap();
        context.append_instance(&at(1.0, 0.0, 0.0), &unit_box()).unwrap();
        let b = context.append_type(12);
        let sphere = BoundingVolume::from(BoundingSphere::new(Vec3::ZERO, 1.0));
        context.append_instance(&at(0.0, -400.0, 0.0), &sphere).unwrap();
        context.append_instance(&at(0.0, 1.0, 0.0), &sphere).unwrap();

        let culled = context.cull(&camera_frustum(), CullingFlags::FRUSTUM);
        assert_eq!(culled.visible_count(a), 2);
        assert_eq!(culled.visible_count(b), 1);
        assert_eq!(culled.instances[0].world_transform(), at(0.0, 0.0, 0.0));
        assert_eq!(culled.instances[1].world_transform(), at(1.0, 0.0, 0.0));
        assert_eq!(culled.instances[2], InstanceData::default());
        assert_eq!(culled.instances[3].world_transform(), at(0.0, 1.0, 0.0));

        let everything = context.cull(&camera_frustum(), CullingFlags::empty());
        assert_eq!(everything.visible_count(a), 3);
    }

    #[test]
    fn test_no_cull_set_groups_by_type() {
        let mut context = CullingContext::new();
        let a = context.append_type(3);
        let b = context.append_type(3);
        context.append_instance_to(b, &at(1.0, 0.0, 0.0), &unit_box()).unwrap();
        context.append_instance_to(a, &at(2.0, 0.0, 0.0), &unit_box()).unwrap();
        context.append_instance_to(b, &at(3.0, 0.0, 0.0), &unit_box()).unwrap();

        let grouped = context.no_cull_instances();
        let types: Vec<u32> = grouped.iter().map(|i| i.type_id).collect();
        assert_eq!(types, vec![0, 1, 1]);
        assert_eq!(grouped[1].world_transform(), at(1.0, 0.0, 0.0));
        assert_eq!(grouped[2].world_transform(), at(3.0, 0.0, 0.0));
        assert_eq!(context.no_cull_args()[1].instance_count, 2);
    }

    #[test]
    fn test_flags_from_settings() {
        let settings = ember_core::renderer::CullingSettings {
            frustum: true,
            occlusion: false,
        };
        assert_eq!(CullingFlags::from_settings(&settings), CullingFlags::FRUSTUM);
    }
}
