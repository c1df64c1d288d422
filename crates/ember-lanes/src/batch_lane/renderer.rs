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

//! Batches of instances sharing a mesh and a material.

use std::num::NonZeroU64;
use std::sync::Arc;

use ember_core::math::{BoundingVolume, Frustum, Mat4};
use ember_core::renderer::api::*;
use ember_core::renderer::{
    DrawPassKind, GraphicsDevice, Material, MaterialFlags, Mesh, RenderPass, ResourceError,
    ShadowKind,
};

use super::slots::{SlotKey, Slots};
use super::BatchError;
use crate::buffer::{GrowableBuffer, MIN_UNIFORM_ALIGNMENT};
use crate::culling_lane::{CullingContext, CullingManager, DrawTypeId};

/// Identifies a batch inside one [`BatchRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub usize);

/// Identifies an instance inside a batch. Ids of removed instances never
/// resolve again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId {
    /// The owning batch.
    pub batch: BatchId,
    key: SlotKey,
}

/// One drawable occurrence of a batch's mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchInstance {
    /// A rigid instance.
    Static {
        /// World transform.
        transform: Mat4,
        /// Local bounds.
        bounds: BoundingVolume,
    },
    /// An instance deformed by a bone palette. Every skinned instance of a
    /// batch carries a palette of the same length.
    Skinned {
        /// World transform.
        transform: Mat4,
        /// Local bounds, covering every pose.
        bounds: BoundingVolume,
        /// Bone matrices.
        bones: Vec<Mat4>,
    },
}

impl BatchInstance {
    /// World transform.
    pub fn transform(&self) -> &Mat4 {
        match self {
            BatchInstance::Static { transform, .. } | BatchInstance::Skinned { transform, .. } => {
                transform
            }
        }
    }

    /// Local bounds.
    pub fn bounds(&self) -> &BoundingVolume {
        match self {
            BatchInstance::Static { bounds, .. } | BatchInstance::Skinned { bounds, .. } => bounds,
        }
    }

    /// Bone palette, empty for static instances.
    pub fn bones(&self) -> &[Mat4] {
        match self {
            BatchInstance::Static { .. } => &[],
            BatchInstance::Skinned { bones, .. } => bones,
        }
    }

    fn set_transform(&mut self, value: Mat4) {
        match self {
            BatchInstance::Static { transform, .. } | BatchInstance::Skinned { transform, .. } => {
                *transform = value
            }
        }
    }
}

/// Which instance set a draw reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawSource {
    /// Transforms packed by `update`, filtered by the CPU visibility test.
    Batched,
    /// Instances compacted by the cull kernel, drawn indirectly.
    Culled,
    /// Every instance, drawn indirectly.
    NoCull,
}

/// Layout of bind group 1 of every geometry pipeline: the instance set of
/// the draw, the per-type offsets, the bone palette and the per-draw
/// constants at a dynamic offset.
///
/// Shaders locate an instance as `instances[offsets[draw.draw_type] + instance_index]`.
pub fn instance_layout_entries() -> [BindGroupLayoutEntry; 4] {
    let stages = ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT;
    let read_only = BindingType::StorageBuffer { read_only: true };
    [
        BindGroupLayoutEntry::new(0, stages, read_only),
        BindGroupLayoutEntry::new(1, stages, read_only),
        BindGroupLayoutEntry::new(2, ShaderStageFlags::VERTEX, read_only),
        BindGroupLayoutEntry::new(
            3,
            stages,
            BindingType::UniformBuffer {
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<DrawConstants>() as u64),
            },
        ),
    ]
}

#[derive(Debug)]
struct Member {
    instance: BatchInstance,
    world_bounds: BoundingVolume,
    visible: bool,
}

impl Member {
    fn new(instance: BatchInstance) -> Self {
        let world_bounds = instance.bounds().transformed(instance.transform());
        Self {
            instance,
            world_bounds,
            visible: true,
        }
    }
}

#[derive(Debug)]
struct Batch {
    mesh: Arc<dyn Mesh>,
    material: Arc<dyn Material>,
    members: Slots<Member>,
    buffer_offset: Option<u32>,
    visible_count: u32,
    bone_offset: u32,
    palette_len: u32,
    updated: bool,
}

impl Batch {
    fn is_skinned(&self) -> bool {
        self.palette_len > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Updating,
    Committed,
}

#[derive(Debug)]
struct BindGroups {
    key: (u64, u64),
    batched: BindGroupId,
    culled: Option<BindGroupId>,
    no_cull: Option<BindGroupId>,
}

impl BindGroups {
    fn get(&self, source: DrawSource) -> Option<BindGroupId> {
        match source {
            DrawSource::Batched => Some(self.batched),
            DrawSource::Culled => self.culled,
            DrawSource::NoCull => self.no_cull,
        }
    }

    fn destroy(self, device: &dyn GraphicsDevice) {
        for id in [Some(self.batched), self.culled, self.no_cull].into_iter().flatten() {
            // Groups may outlive buffers that were already replaced.
            let _ = device.destroy_bind_group(id);
        }
    }
}

/// Draws batches of instances, either directly from CPU-culled transforms or
/// indirectly from the culling buffers.
///
/// Each frame follows `begin_update`, one `update` per batch, `end_update`.
/// A batch's [`buffer_offset`](Self::buffer_offset) and its draws are only
/// valid between that `end_update` and the next `begin_update`.
#[derive(Debug)]
pub struct BatchRenderer {
    batches: Vec<Batch>,
    phase: Phase,
    staged_instances: Vec<InstanceData>,
    staged_bones: Vec<[[f32; 4]; 4]>,
    instances: GrowableBuffer,
    offsets: GrowableBuffer,
    bones: GrowableBuffer,
    constants: GrowableBuffer,
    generation: u64,
    bind_groups: Option<BindGroups>,
}

impl Default for BatchRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRenderer {
    /// Creates a renderer without batches.
    pub fn new() -> Self {
        Self {
            batches: Vec::new(),
            phase: Phase::Idle,
            staged_instances: Vec::new(),
            staged_bones: Vec::new(),
            instances: GrowableBuffer::new("BatchInstances", BufferUsage::STORAGE),
            offsets: GrowableBuffer::new("BatchOffsets", BufferUsage::STORAGE),
            bones: GrowableBuffer::new("BatchBones", BufferUsage::STORAGE),
            constants: GrowableBuffer::new("DrawConstants", BufferUsage::UNIFORM),
            generation: 0,
            bind_groups: None,
        }
    }

    // --- Membership ---

    /// Adds a batch drawing `mesh` with `material`.
    pub fn add_batch(&mut self, mesh: Arc<dyn Mesh>, material: Arc<dyn Material>) -> BatchId {
        self.batches.push(Batch {
            mesh,
            material,
            members: Slots::default(),
            buffer_offset: None,
            visible_count: 0,
            bone_offset: 0,
            palette_len: 0,
            updated: false,
        });
        BatchId(self.batches.len() - 1)
    }

    /// Number of batches.
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Ids of every batch.
    pub fn batch_ids(&self) -> impl Iterator<Item = BatchId> {
        (0..self.batches.len()).map(BatchId)
    }

    /// Material of a batch.
    pub fn material(&self, batch: BatchId) -> Option<&Arc<dyn Material>> {
        self.batches.get(batch.0).map(|b| &b.material)
    }

    /// Mesh of a batch.
    pub fn mesh(&self, batch: BatchId) -> Option<&Arc<dyn Mesh>> {
        self.batches.get(batch.0).map(|b| &b.mesh)
    }

    /// Adds an instance to a batch. New instances are visible.
    ///
    /// The first instance of an empty batch fixes its palette length; later
    /// instances must match it, static instances counting as zero bones.
    pub fn add_instance(
        &mut self,
        batch: BatchId,
        instance: BatchInstance,
    ) -> Result<InstanceId, BatchError> {
        let entry = self
            .batches
            .get_mut(batch.0)
            .ok_or(BatchError::UnknownBatch(batch))?;
        let found = instance.bones().len() as u32;
        if entry.members.is_empty() {
            entry.palette_len = found;
        } else if found != entry.palette_len {
            return Err(BatchError::PaletteMismatch {
                batch,
                expected: entry.palette_len,
                found,
            });
        }
        let key = entry.members.insert(Member::new(instance));
        Ok(InstanceId { batch, key })
    }

    /// Removes an instance. Offsets committed this frame stay valid.
    pub fn remove_instance(&mut self, id: InstanceId) -> Option<BatchInstance> {
        self.batches
            .get_mut(id.batch.0)?
            .members
            .remove(id.key)
            .map(|member| member.instance)
    }

    /// `true` if `id` still names a live instance.
    pub fn contains_instance(&self, id: InstanceId) -> bool {
        self.batches
            .get(id.batch.0)
            .is_some_and(|b| b.members.contains(id.key))
    }

    /// Moves an instance. Returns `false` for stale ids.
    pub fn set_transform(&mut self, id: InstanceId, transform: Mat4) -> bool {
        let Some(member) = self
            .batches
            .get_mut(id.batch.0)
            .and_then(|b| b.members.get_mut(id.key))
        else {
            return false;
        };
        member.instance.set_transform(transform);
        member.world_bounds = member.instance.bounds().transformed(&transform);
        true
    }

    /// Number of live instances in a batch.
    pub fn instance_count(&self, batch: BatchId) -> usize {
        self.batches.get(batch.0).map_or(0, |b| b.members.len())
    }

    // --- Visibility ---

    /// Tests every instance of a batch against `frustum` and returns the
    /// number of visible instances.
    pub fn visibility_test(&mut self, batch: BatchId, frustum: &Frustum) -> Result<u32, BatchError> {
        let entry = self
            .batches
            .get_mut(batch.0)
            .ok_or(BatchError::UnknownBatch(batch))?;
        let mut visible = 0;
        for member in entry.members.values_mut() {
            member.visible = frustum.intersects(&member.world_bounds);
            visible += member.visible as u32;
        }
        Ok(visible)
    }

    /// Runs [`Self::visibility_test`] on every batch.
    pub fn visibility_test_all(&mut self, frustum: &Frustum) {
        for entry in &mut self.batches {
            for member in entry.members.values_mut() {
                member.visible = frustum.intersects(&member.world_bounds);
            }
        }
    }

    /// Marks every instance of a batch visible.
    pub fn set_all_visible(&mut self, batch: BatchId) {
        if let Some(entry) = self.batches.get_mut(batch.0) {
            for member in entry.members.values_mut() {
                member.visible = true;
            }
        }
    }

    // --- Update protocol ---

    /// Starts a frame: rewinds the staging cursors and invalidates every
    /// committed offset.
    pub fn begin_update(&mut self) {
        self.phase = Phase::Updating;
        self.staged_instances.clear();
        self.staged_bones.clear();
        for entry in &mut self.batches {
            entry.buffer_offset = None;
            entry.visible_count = 0;
            entry.bone_offset = 0;
            entry.updated = false;
        }
    }

    /// Appends the visible instances of a batch and returns its offset.
    pub fn update(&mut self, batch: BatchId) -> Result<u32, BatchError> {
        if self.phase != Phase::Updating {
            return Err(BatchError::PhaseViolation {
                operation: "update",
            });
        }
        let entry = self
            .batches
            .get_mut(batch.0)
            .ok_or(BatchError::UnknownBatch(batch))?;
        if entry.updated {
            return Err(BatchError::AlreadyUpdated(batch));
        }
        let offset = self.staged_instances.len() as u32;
        entry.bone_offset = self.staged_bones.len() as u32;
        for member in entry.members.values().filter(|m| m.visible) {
            self.staged_instances.push(InstanceData::new(
                member.instance.transform(),
                member.instance.bounds(),
                batch.0 as u32,
            ));
            self.staged_bones.extend(
                member
                    .instance
                    .bones()
                    .iter()
                    .map(|bone| bone.to_cols_array_2d()),
            );
        }
        entry.visible_count = self.staged_instances.len() as u32 - offset;
        entry.buffer_offset = Some(offset);
        entry.updated = true;
        Ok(offset)
    }

    /// Updates every batch not updated yet this frame.
    pub fn update_all(&mut self) -> Result<(), BatchError> {
        for index in 0..self.batches.len() {
            if !self.batches[index].updated {
                self.update(BatchId(index))?;
            }
        }
        Ok(())
    }

    /// Uploads the staged transforms, offsets, bones and per-draw constants
    /// in one go.
    pub fn end_update(&mut self, device: &dyn GraphicsDevice) -> Result<(), BatchError> {
        if self.phase != Phase::Updating {
            return Err(BatchError::PhaseViolation {
                operation: "end_update",
            });
        }
        let offsets: Vec<u32> = self
            .batches
            .iter()
            .map(|b| b.buffer_offset.unwrap_or(0))
            .collect();
        let slot = MIN_UNIFORM_ALIGNMENT as usize;
        let mut constants = vec![0u8; self.batches.len().max(1) * slot];
        for (index, entry) in self.batches.iter().enumerate() {
            let draw = DrawConstants {
                transform_offset: entry.buffer_offset.unwrap_or(0),
                draw_type: index as u32,
                bone_offset: entry.bone_offset,
                instance_count: entry.visible_count,
                bone_count: entry.palette_len,
                ..Default::default()
            };
            let start = index * slot;
            constants[start..start + std::mem::size_of::<DrawConstants>()]
                .copy_from_slice(bytemuck::bytes_of(&draw));
        }

        let mut grown = false;
        grown |= self.instances.upload(device, &self.staged_instances)?;
        grown |= self.offsets.upload(device, &offsets)?;
        grown |= self.bones.upload(device, &self.staged_bones)?;
        grown |= self.constants.upload(device, &constants)?;
        if grown {
            self.generation += 1;
        }
        self.phase = Phase::Committed;
        Ok(())
    }

    /// Bones per instance of a batch, zero for static batches.
    pub fn palette_len(&self, batch: BatchId) -> u32 {
        self.batches.get(batch.0).map_or(0, |b| b.palette_len)
    }

    /// First slot of a batch in the batched instance buffer, `None` unless
    /// the batch was updated and committed this frame.
    pub fn buffer_offset(&self, batch: BatchId) -> Option<u32> {
        if self.phase != Phase::Committed {
            return None;
        }
        self.batches.get(batch.0).and_then(|b| b.buffer_offset)
    }

    /// Visible instances committed for a batch this frame.
    pub fn visible_count(&self, batch: BatchId) -> u32 {
        self.batches.get(batch.0).map_or(0, |b| b.visible_count)
    }

    /// Registers one draw type per batch, holding every instance of the
    /// batch regardless of CPU visibility. The type of batch `i` is type `i`.
    pub fn append_draw_types(&self, context: &mut CullingContext) -> Result<(), BatchError> {
        if context.type_count() != 0 {
            return Err(BatchError::ContextNotEmpty);
        }
        for entry in &self.batches {
            let draw_type = context.append_type_data(TypeData {
                index_count_per_instance: entry.mesh.index_count(),
                start_index_location: entry.mesh.first_index(),
                base_vertex_location: entry.mesh.base_vertex(),
                start_instance_location: 0,
            });
            for member in entry.members.values() {
                context
                    .append_instance_to(
                        draw_type,
                        member.instance.transform(),
                        member.instance.bounds(),
                    )
                    .map_err(ResourceError::from)?;
            }
        }
        Ok(())
    }

    /// Builds the bind groups of every draw source over `layout`. Groups are
    /// rebuilt only when a batch or culling buffer was recreated.
    pub fn prepare_bind_groups(
        &mut self,
        device: &dyn GraphicsDevice,
        layout: BindGroupLayoutId,
        culling: &CullingManager,
    ) -> Result<(), ResourceError> {
        let key = (self.generation, culling.generation());
        if self.bind_groups.as_ref().is_some_and(|g| g.key == key) {
            return Ok(());
        }
        if let Some(old) = self.bind_groups.take() {
            old.destroy(device);
        }
        let (Some(offsets), Some(bones), Some(constants), Some(instances)) = (
            self.offsets.id(),
            self.bones.id(),
            self.constants.id(),
            self.instances.id(),
        ) else {
            return Ok(());
        };
        let create = |label: &str, instances: BufferId, offsets: BufferId| {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    BindGroupEntry::new(0, BindingResource::whole(instances)),
                    BindGroupEntry::new(1, BindingResource::whole(offsets)),
                    BindGroupEntry::new(2, BindingResource::whole(bones)),
                    BindGroupEntry::new(
                        3,
                        BindingResource::Buffer(BufferBinding {
                            buffer: constants,
                            offset: 0,
                            size: NonZeroU64::new(std::mem::size_of::<DrawConstants>() as u64),
                        }),
                    ),
                ],
            })
        };
        let batched = create("BatchedInstances", instances, offsets)?;
        let (culled, no_cull) = match culling.buffers() {
            Some(buffers) => (
                Some(create(
                    "CulledInstances",
                    buffers.culled_instances,
                    buffers.instance_offsets,
                )?),
                Some(create(
                    "NoCullInstances",
                    buffers.instances_no_cull,
                    buffers.instance_offsets,
                )?),
            ),
            None => (None, None),
        };
        self.bind_groups = Some(BindGroups {
            key,
            batched,
            culled,
            no_cull,
        });
        Ok(())
    }

    // --- Drawing ---

    /// Draws one batch. Returns `false` when the draw was skipped: mesh not
    /// ready, material declined the pass, nothing committed or nothing to draw.
    ///
    /// Skinned batches always draw from [`DrawSource::Batched`], where their
    /// bone palette lives.
    pub fn draw(
        &self,
        pass: &mut dyn RenderPass<'_>,
        batch: BatchId,
        kind: DrawPassKind,
        source: DrawSource,
        culling: &CullingManager,
    ) -> bool {
        let Some(entry) = self.batches.get(batch.0) else {
            return false;
        };
        if self.phase != Phase::Committed {
            log::trace!("Skipping batch {batch:?}: no committed update");
            return false;
        }
        if !entry.mesh.is_ready() {
            log::trace!("Skipping batch {batch:?}: mesh not ready");
            return false;
        }
        let source = if entry.is_skinned() {
            DrawSource::Batched
        } else {
            source
        };
        let Some(bind_group) = self.bind_groups.as_ref().and_then(|g| g.get(source)) else {
            log::trace!("Skipping batch {batch:?}: no bind group for {source:?}");
            return false;
        };
        let indirect = match source {
            DrawSource::Batched if entry.visible_count == 0 => return false,
            DrawSource::Batched => None,
            DrawSource::Culled | DrawSource::NoCull => {
                let (Some(buffers), Some(offset)) =
                    (culling.buffers(), culling.draw_args_offset(DrawTypeId(batch.0 as u32)))
                else {
                    log::trace!("Skipping batch {batch:?}: draw type not uploaded");
                    return false;
                };
                let args = match source {
                    DrawSource::Culled => buffers.draw_args,
                    _ => buffers.draw_args_no_cull,
                };
                Some((args, offset))
            }
        };
        if !entry.material.begin_draw(pass, kind) {
            log::trace!("Skipping batch {batch:?}: material declined {}", kind.name());
            return false;
        }
        let dynamic_offset = (batch.0 as u64 * MIN_UNIFORM_ALIGNMENT) as u32;
        pass.set_bind_group(1, &bind_group, &[dynamic_offset]);
        entry.mesh.begin_draw(pass);
        match indirect {
            Some((args, offset)) => pass.draw_indexed_indirect(&args, offset),
            None => {
                let first = entry.mesh.first_index();
                pass.draw_indexed(
                    first..first + entry.mesh.index_count(),
                    entry.mesh.base_vertex(),
                    0..entry.visible_count,
                );
            }
        }
        entry.mesh.end_draw(pass);
        entry.material.end_draw(pass, kind);
        true
    }

    fn draw_matching(
        &self,
        pass: &mut dyn RenderPass<'_>,
        kind: DrawPassKind,
        source: DrawSource,
        culling: &CullingManager,
        filter: impl Fn(MaterialFlags) -> bool,
    ) -> u32 {
        self.batch_ids()
            .filter(|id| filter(self.batches[id.0].material.flags()))
            .map(|id| self.draw(pass, id, kind, source, culling) as u32)
            .sum()
    }

    /// Draws opaque batches from the culled set into the G-Buffer.
    pub fn draw_deferred(&self, pass: &mut dyn RenderPass<'_>, culling: &CullingManager) -> u32 {
        self.draw_matching(pass, DrawPassKind::Deferred, DrawSource::Culled, culling, |f| {
            !f.contains(MaterialFlags::FORWARD)
        })
    }

    /// Draws forward batches from the CPU-culled transforms.
    pub fn draw_forward(&self, pass: &mut dyn RenderPass<'_>, culling: &CullingManager) -> u32 {
        self.draw_matching(pass, DrawPassKind::Forward, DrawSource::Batched, culling, |f| {
            f.contains(MaterialFlags::FORWARD)
        })
    }

    /// Draws opaque batches from the unculled set for depth only.
    pub fn draw_depth(&self, pass: &mut dyn RenderPass<'_>, culling: &CullingManager) -> u32 {
        self.draw_matching(pass, DrawPassKind::DepthOnly, DrawSource::NoCull, culling, |f| {
            !f.contains(MaterialFlags::FORWARD)
        })
    }

    /// Draws shadow casters from the unculled set.
    pub fn draw_shadow_map(
        &self,
        pass: &mut dyn RenderPass<'_>,
        kind: ShadowKind,
        culling: &CullingManager,
    ) -> u32 {
        self.draw_matching(pass, DrawPassKind::Shadow(kind), DrawSource::NoCull, culling, |f| {
            f.contains(MaterialFlags::CASTS_SHADOWS)
        })
    }

    /// Destroys every device object.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some(groups) = self.bind_groups.take() {
            groups.destroy(device);
        }
        self.instances.release(device);
        self.offsets.release(device);
        self.bones.release(device);
        self.constants.release(device);
        self.phase = Phase::Idle;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::math::{Aabb, Vec3};
    use ember_infra::HeadlessDevice;
    use std::borrow::Cow;

    #[derive(Debug)]
    struct TestMesh {
        index_count: u32,
        ready: bool,
    }

    impl Mesh for TestMesh {
        fn index_count(&self) -> u32 {
            self.index_count
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn begin_draw(&self, _pass: &mut dyn RenderPass<'_>) {}
    }

    #[derive(Debug)]
    struct TestMaterial {
        flags: MaterialFlags,
        accepts: bool,
    }

    impl Material for TestMaterial {
        fn flags(&self) -> MaterialFlags {
            self.flags
        }

        fn begin_draw(&self, _pass: &mut dyn RenderPass<'_>, _kind: DrawPassKind) -> bool {
            self.accepts
        }
    }

    fn mesh(index_count: u32) -> Arc<dyn Mesh> {
        Arc::new(TestMesh {
            index_count,
            ready: true,
        })
    }

    fn material(flags: MaterialFlags) -> Arc<dyn Material> {
        Arc::new(TestMaterial {
            flags,
            accepts: true,
        })
    }

    fn cube_at(x: f32) -> BatchInstance {
        BatchInstance::Static {
            transform: Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
            bounds: Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)).into(),
        }
    }

    fn frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&(projection * view))
    }

    // --- Update protocol ---

    #[test]
    fn test_offsets_are_prefix_sums_of_visible_counts() {
        let device = HeadlessDevice::new();
        let mut renderer = BatchRenderer::new();
        let batches: Vec<_> = (0..3)
            .map(|_| renderer.add_batch(mesh(36), material(MaterialFlags::empty())))
            .collect();
        for (b, count) in batches.iter().zip([3, 0, 2]) {
            for i in 0..count {
                renderer.add_instance(*b, cube_at(i as f32)).unwrap();
            }
        }
        renderer.add_instance(batches[0], cube_at(900.0)).unwrap();
        renderer.visibility_test_all(&frustum());

        renderer.begin_update();
        for b in &batches {
            renderer.update(*b).unwrap();
        }
        assert_eq!(renderer.buffer_offset(batches[0]), None, "offsets are not valid before commit");
        renderer.end_update(&device).unwrap();

        let offsets: Vec<_> = batches.iter().map(|b| renderer.buffer_offset(*b)).collect();
        assert_eq!(offsets, vec![Some(0), Some(3), Some(3)]);
        assert_eq!(renderer.visible_count(batches[0]), 3);
        assert_eq!(renderer.visible_count(batches[2]), 2);

        renderer.begin_update();
        assert_eq!(renderer.buffer_offset(batches[1]), None, "a new frame invalidates offsets");
    }

    #[test]
    fn test_update_outside_protocol_is_rejected() {
        let device = HeadlessDevice::new();
        let mut renderer = BatchRenderer::new();
        let batch = renderer.add_batch(mesh(3), material(MaterialFlags::empty()));

        assert!(matches!(
            renderer.update(batch),
            Err(BatchError::PhaseViolation { operation: "update" })
        ));
        renderer.begin_update();
        renderer.update(batch).unwrap();
        assert!(matches!(renderer.update(batch), Err(BatchError::AlreadyUpdated(_))));
        assert!(matches!(
            renderer.update(BatchId(9)),
            Err(BatchError::UnknownBatch(BatchId(9)))
        ));
        renderer.end_update(&device).unwrap();
        assert!(renderer.end_update(&device).is_err());
    }

    fn skinned_at(x: f32, lift: f32) -> BatchInstance {
        BatchInstance::Skinned {
            transform: Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
            bounds: Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(1.0)).into(),
            bones: vec![Mat4::IDENTITY, Mat4::from_translation(Vec3::new(0.0, lift, 0.0))],
        }
    }

    #[test]
    fn test_bone_palettes_follow_visible_instance_order() {
        let device = HeadlessDevice::new();
        let mut renderer = BatchRenderer::new();
        let rigid = renderer.add_batch(mesh(36), material(MaterialFlags::empty()));
        let skinned = renderer.add_batch(mesh(36), material(MaterialFlags::empty()));
        renderer.add_instance(rigid, cube_at(0.0)).unwrap();
        renderer.add_instance(skinned, skinned_at(0.0, 1.0)).unwrap();
        renderer.add_instance(skinned, skinned_at(900.0, 2.0)).unwrap();
        renderer.add_instance(skinned, skinned_at(1.0, 3.0)).unwrap();
        renderer.visibility_test_all(&frustum());

        renderer.begin_update();
        renderer.update_all().unwrap();
        renderer.end_update(&device).unwrap();

        assert_eq!(renderer.palette_len(rigid), 0);
        assert_eq!(renderer.palette_len(skinned), 2);
        let bones = device.buffer_contents(renderer.bones.id().unwrap()).unwrap();
        // Instance 1 sits outside the frustum, so its palette is skipped.
        let lifts: Vec<f32> = bones[..4 * 64]
            .chunks_exact(64)
            .map(|bone| bytemuck::pod_read_unaligned::<[[f32; 4]; 4]>(bone)[3][1])
            .collect();
        assert_eq!(lifts, vec![0.0, 1.0, 0.0, 3.0]);

        let constants = device
            .buffer_contents(renderer.constants.id().unwrap())
            .unwrap();
        let slot = MIN_UNIFORM_ALIGNMENT as usize;
        let draw: DrawConstants = bytemuck::pod_read_unaligned(
            &constants[slot..slot + std::mem::size_of::<DrawConstants>()],
        );
        assert_eq!(draw.bone_offset, 0);
        assert_eq!(draw.bone_count, 2);
        assert_eq!(draw.instance_count, 2);
    }

    #[test]
    fn test_mismatched_palettes_are_rejected() {
        let mut renderer = BatchRenderer::new();
        let batch = renderer.add_batch(mesh(36), material(MaterialFlags::empty()));
        let first = renderer.add_instance(batch, skinned_at(0.0, 1.0)).unwrap();
        assert!(matches!(
            renderer.add_instance(batch, cube_at(1.0)),
            Err(BatchError::PaletteMismatch {
                expected: 2,
                found: 0,
                ..
            })
        ));

        renderer.remove_instance(first);
        renderer.add_instance(batch, cube_at(1.0)).unwrap();
        assert_eq!(renderer.palette_len(batch), 0, "an emptied batch takes the next palette");
    }

    #[test]
    fn test_removal_keeps_other_instances() {
        let mut renderer = BatchRenderer::new();
        let batch = renderer.add_batch(mesh(3), material(MaterialFlags::empty()));
        let a = renderer.add_instance(batch, cube_at(0.0)).unwrap();
        let b = renderer.add_instance(batch, cube_at(1.0)).unwrap();

        assert_eq!(renderer.remove_instance(a), Some(cube_at(0.0)));
        assert!(!renderer.contains_instance(a));
        assert!(renderer.contains_instance(b));
        let c = renderer.add_instance(batch, cube_at(2.0)).unwrap();
        assert!(!renderer.contains_instance(a), "stale id must not alias the reused slot");
        assert!(renderer.contains_instance(c));
        assert!(!renderer.set_transform(a, Mat4::IDENTITY));
        assert_eq!(renderer.instance_count(batch), 2);
    }

    #[test]
    fn test_visibility_follows_transform_updates() {
        let mut renderer = BatchRenderer::new();
        let batch = renderer.add_batch(mesh(3), material(MaterialFlags::empty()));
        let id = renderer.add_instance(batch, cube_at(0.0)).unwrap();
        assert_eq!(renderer.visibility_test(batch, &frustum()).unwrap(), 1);

        renderer.set_transform(id, Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0)));
        assert_eq!(renderer.visibility_test(batch, &frustum()).unwrap(), 0);
        renderer.set_all_visible(batch);

        renderer.begin_update();
        renderer.update(batch).unwrap();
        assert_eq!(renderer.visible_count(batch), 1);
    }

    #[test]
    fn test_draw_types_cover_every_instance() {
        let mut renderer = BatchRenderer::new();
        let a = renderer.add_batch(mesh(36), material(MaterialFlags::empty()));
        let b = renderer.add_batch(mesh(6), material(MaterialFlags::empty()));
        renderer.add_instance(a, cube_at(0.0)).unwrap();
        renderer.add_instance(a, cube_at(999.0)).unwrap();
        renderer.add_instance(b, cube_at(1.0)).unwrap();
        renderer.visibility_test_all(&frustum());

        let mut context = CullingContext::new();
        renderer.append_draw_types(&mut context).unwrap();
        assert_eq!(context.instance_count(DrawTypeId(0)), 2);
        assert_eq!(context.instance_count(DrawTypeId(1)), 1);
        assert_eq!(context.types()[1].index_count_per_instance, 6);
        assert!(matches!(
            renderer.append_draw_types(&mut context),
            Err(BatchError::ContextNotEmpty)
        ));
    }

    // --- Drawing ---

    struct DrawFixture {
        device: HeadlessDevice,
        renderer: BatchRenderer,
        culling: CullingManager,
        target: TextureViewId,
    }

    fn draw_fixture(batches: &[(Arc<dyn Mesh>, Arc<dyn Material>, usize)]) -> DrawFixture {
        let device = HeadlessDevice::new();
        let mut renderer = BatchRenderer::new();
        for (mesh, material, count) in batches {
            let batch = renderer.add_batch(mesh.clone(), material.clone());
            for i in 0..*count {
                renderer.add_instance(batch, cube_at(i as f32)).unwrap();
            }
        }
        let mut context = CullingContext::new();
        renderer.append_draw_types(&mut context).unwrap();
        let mut culling = CullingManager::new();
        culling.upload(&device, &context).unwrap();
        renderer.begin_update();
        renderer.update_all().unwrap();
        renderer.end_update(&device).unwrap();
        let layout = device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("Instances"),
                entries: &instance_layout_entries(),
            })
            .unwrap();
        renderer.prepare_bind_groups(&device, layout, &culling).unwrap();
        let texture = device
            .create_texture(&TextureDescriptor::d2(
                Cow::Borrowed("Target"),
                8,
                8,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT,
            ))
            .unwrap();
        let target = device
            .create_texture_view(texture, &TextureViewDescriptor::default())
            .unwrap();
        DrawFixture {
            device,
            renderer,
            culling,
            target,
        }
    }

    fn record(fixture: &DrawFixture, draw: impl FnOnce(&mut dyn RenderPass<'_>) -> u32) -> u32 {
        let mut encoder = fixture.device.create_command_encoder(None);
        let issued = {
            let attachments = [RenderPassColorAttachment {
                view: fixture.target,
                resolve_target: None,
                ops: Operations::clear(Color::BLACK),
            }];
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Test"),
                color_attachments: &attachments,
                depth_stencil_attachment: None,
            });
            draw(pass.as_mut())
        };
        fixture.device.submit_command_buffer(encoder.finish());
        issued
    }

    #[test]
    fn test_forward_and_deferred_split_by_material() {
        let fixture = draw_fixture(&[
            (mesh(36), material(MaterialFlags::empty()), 2),
            (mesh(6), material(MaterialFlags::FORWARD), 3),
        ]);
        let forward = record(&fixture, |pass| {
            fixture.renderer.draw_forward(pass, &fixture.culling)
        });
        assert_eq!(forward, 1);
        let draws = fixture.device.executed_draws();
        assert_eq!(draws[0].kind, ember_infra::graphics::headless::DrawKind::Indexed);
        assert_eq!((draws[0].index_count, draws[0].instance_count), (6, 3));

        fixture.device.clear_history();
        let deferred = record(&fixture, |pass| {
            fixture.renderer.draw_deferred(pass, &fixture.culling)
        });
        assert_eq!(deferred, 1);
        let draws = fixture.device.executed_draws();
        assert!(matches!(
            draws[0].kind,
            ember_infra::graphics::headless::DrawKind::IndexedIndirect { offset: 0, .. }
        ));
        assert_eq!(draws[0].instance_count, 0, "nothing culled yet, nothing drawn");
    }

    #[test]
    fn test_depth_draws_every_instance() {
        let fixture = draw_fixture(&[(mesh(36), material(MaterialFlags::empty()), 4)]);
        record(&fixture, |pass| fixture.renderer.draw_depth(pass, &fixture.culling));
        let draws = fixture.device.executed_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].instance_count, 4);
    }

    #[test]
    fn test_unready_draws_are_skipped() {
        let unready: Arc<dyn Mesh> = Arc::new(TestMesh {
            index_count: 3,
            ready: false,
        });
        let declining: Arc<dyn Material> = Arc::new(TestMaterial {
            flags: MaterialFlags::CASTS_SHADOWS,
            accepts: false,
        });
        let fixture = draw_fixture(&[
            (unready, material(MaterialFlags::CASTS_SHADOWS), 1),
            (mesh(3), declining, 1),
            (mesh(3), material(MaterialFlags::empty()), 1),
        ]);
        let issued = record(&fixture, |pass| {
            fixture
                .renderer
                .draw_shadow_map(pass, ShadowKind::Perspective, &fixture.culling)
        });
        assert_eq!(issued, 0);
        assert!(fixture.device.executed_draws().is_empty());
    }
}
