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

//! The owner of every named GPU resource used by the frame graph.

use std::sync::Arc;

use ahash::AHashMap;
use ember_core::renderer::api::{
    BufferDescriptor, BufferUsage, SamplerDescriptor, TextureDescriptor, TextureFormat, TextureId,
    TextureUsage, TextureViewDescriptor, TextureViewId,
};
use ember_core::renderer::{GraphicsDevice, ResourceError};

use super::descriptor::{
    BufferResourceDesc, BufferSize, MipLevels, ResourceCreationFlags, ResourceDescriptor,
    ResourceKind, ResourceSize, TextureResourceDesc,
};
use super::handle::*;

#[derive(Debug)]
struct Slot {
    names: Vec<String>,
    descriptor: ResourceDescriptor,
    flags: ResourceCreationFlags,
    object: Option<GpuResource>,
}

impl Slot {
    fn is_imported(&self) -> bool {
        matches!(self.descriptor, ResourceDescriptor::Imported { .. })
    }

    fn label(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("unnamed")
    }
}

/// One named resource, as shown to editor panels.
#[derive(Debug, Clone, Copy)]
pub struct ResourceEntry<'a> {
    /// The registered name.
    pub name: &'a str,
    /// How the resource is (re)created.
    pub descriptor: &'a ResourceDescriptor,
    /// The backing objects, if allocated.
    pub object: Option<&'a GpuResource>,
    /// `true` if other names alias the same slot.
    pub aliased: bool,
}

impl ResourceEntry<'_> {
    /// Returns `true` if the resource currently has GPU objects.
    pub fn is_allocated(&self) -> bool {
        self.object.is_some()
    }
}

/// Creates, resizes and hands out named GPU resources.
///
/// Passes register what they produce during initialization and resolve what
/// they consume through typed [`ResourceRef`]s. The builder is the only owner
/// of the underlying objects: it destroys and recreates viewport-sized
/// resources on resize, while fixed-size ones survive untouched.
#[derive(Debug)]
pub struct ResourceBuilder {
    device: Arc<dyn GraphicsDevice>,
    names: AHashMap<String, usize>,
    slots: Vec<Slot>,
    viewport: (u32, u32),
    live: bool,
    resizing: bool,
    generation: u64,
}

impl ResourceBuilder {
    /// Creates an empty builder for a viewport of `width` x `height`.
    pub fn new(device: Arc<dyn GraphicsDevice>, width: u32, height: u32) -> Self {
        Self {
            device,
            names: AHashMap::new(),
            slots: Vec::new(),
            viewport: (width.max(1), height.max(1)),
            live: false,
            resizing: false,
            generation: 0,
        }
    }

    /// The device resources are created on.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The current render viewport.
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Incremented whenever an owned GPU object is recreated.
    ///
    /// Passes compare it with the value they built their bind groups for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` between `resize_begin` and `resize_end`.
    pub fn is_resizing(&self) -> bool {
        self.resizing
    }

    /// Returns `true` if a resource is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    // --- Registration ---

    /// Registers or replaces a 2D texture.
    pub fn create_texture_2d(
        &mut self,
        name: &str,
        desc: TextureResourceDesc,
        flags: ResourceCreationFlags,
    ) -> Result<TextureRef, ResourceError> {
        self.create(
            name,
            ResourceDescriptor::Texture {
                kind: ResourceKind::Texture2D,
                desc,
            },
            flags,
        )
    }

    /// Registers or replaces a depth buffer.
    pub fn create_depth_stencil_buffer(
        &mut self,
        name: &str,
        desc: TextureResourceDesc,
        flags: ResourceCreationFlags,
    ) -> Result<TextureRef, ResourceError> {
        self.create(
            name,
            ResourceDescriptor::Texture {
                kind: ResourceKind::DepthStencil,
                desc,
            },
            flags,
        )
    }

    /// Registers or replaces a square, fixed-size shadow atlas.
    pub fn create_shadow_atlas(
        &mut self,
        name: &str,
        format: TextureFormat,
        size: u32,
        flags: ResourceCreationFlags,
    ) -> Result<TextureRef, ResourceError> {
        self.create(
            name,
            ResourceDescriptor::Texture {
                kind: ResourceKind::ShadowAtlas,
                desc: TextureResourceDesc {
                    format,
                    size: ResourceSize::square(size),
                    usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
                    mip_levels: MipLevels::One,
                },
            },
            flags,
        )
    }

    /// Registers or replaces a texture with a full mip chain and per-mip views.
    pub fn create_mip_chain(
        &mut self,
        name: &str,
        format: TextureFormat,
        size: ResourceSize,
        usage: TextureUsage,
        flags: ResourceCreationFlags,
    ) -> Result<TextureRef, ResourceError> {
        self.create(
            name,
            ResourceDescriptor::Texture {
                kind: ResourceKind::MipChain,
                desc: TextureResourceDesc {
                    format,
                    size,
                    usage,
                    mip_levels: MipLevels::Full,
                },
            },
            flags,
        )
    }

    /// Registers or replaces a G-Buffer.
    pub fn create_gbuffer(
        &mut self,
        name: &str,
        formats: &[TextureFormat],
        size: ResourceSize,
        usage: TextureUsage,
        flags: ResourceCreationFlags,
    ) -> Result<GBufferRef, ResourceError> {
        self.create(
            name,
            ResourceDescriptor::GBuffer {
                formats: formats.to_vec(),
                size,
                usage,
            },
            flags,
        )
    }

    /// Registers or replaces a uniform buffer sized for `T`.
    ///
    /// With `cpu_access` the buffer accepts `write_buffer` uploads.
    pub fn create_constant_buffer<T: bytemuck::Pod>(
        &mut self,
        name: &str,
        cpu_access: bool,
        flags: ResourceCreationFlags,
    ) -> Result<BufferRef, ResourceError> {
        let size = (std::mem::size_of::<T>() as u64).next_multiple_of(16);
        let mut usage = BufferUsage::UNIFORM;
        if cpu_access {
            usage |= BufferUsage::COPY_DST;
        }
        self.create(
            name,
            ResourceDescriptor::Buffer {
                kind: ResourceKind::ConstantBuffer,
                desc: BufferResourceDesc {
                    size: BufferSize::Fixed(size),
                    usage,
                },
            },
            flags,
        )
    }

    /// Registers or replaces a storage buffer. `STORAGE` is always added.
    pub fn create_structured_buffer(
        &mut self,
        name: &str,
        size: BufferSize,
        usage: BufferUsage,
        flags: ResourceCreationFlags,
    ) -> Result<BufferRef, ResourceError> {
        self.create(
            name,
            ResourceDescriptor::Buffer {
                kind: ResourceKind::StructuredBuffer,
                desc: BufferResourceDesc {
                    size,
                    usage: usage | BufferUsage::STORAGE,
                },
            },
            flags,
        )
    }

    /// Registers or replaces a sampler. Samplers with equal descriptors are
    /// always shared.
    pub fn create_sampler(
        &mut self,
        name: &str,
        desc: SamplerDescriptor<'static>,
    ) -> Result<SamplerRef, ResourceError> {
        self.create(
            name,
            ResourceDescriptor::Sampler(desc),
            ResourceCreationFlags::SHARED,
        )
    }

    /// Registers a texture view owned by someone else, such as a swap chain
    /// back buffer. The builder never destroys imported objects, and
    /// re-importing does not bump the generation.
    pub fn import_texture(
        &mut self,
        name: &str,
        texture: Option<TextureId>,
        view: TextureViewId,
        size: (u32, u32),
        format: TextureFormat,
    ) -> Result<TextureRef, ResourceError> {
        let index = self.register(
            name,
            ResourceDescriptor::Imported { format },
            ResourceCreationFlags::empty(),
        )?;
        self.slots[index].object = Some(GpuResource::Texture(TextureResource {
            texture,
            view,
            mip_views: Vec::new(),
            width: size.0,
            height: size.1,
            format,
        }));
        Ok(ResourceRef::new(index, name))
    }

    /// Drops the object behind an imported name, keeping the registration.
    ///
    /// Used once the external owner destroys the view, so nothing resolves
    /// to a dead object.
    ///
    /// ## Errors
    /// * `ResourceError::UnknownName` - Nothing registered `name`.
    /// * `ResourceError::KindMismatch` - `name` is owned by the builder.
    pub fn clear_import(&mut self, name: &str) -> Result<(), ResourceError> {
        let index = *self
            .names
            .get(name)
            .ok_or_else(|| ResourceError::UnknownName {
                name: name.to_string(),
            })?;
        let slot = &mut self.slots[index];
        if !slot.is_imported() {
            return Err(ResourceError::KindMismatch {
                name: name.to_string(),
                expected: "imported texture",
                found: slot.descriptor.kind().name(),
            });
        }
        slot.object = None;
        Ok(())
    }

    fn create<C: ResourceClass>(
        &mut self,
        name: &str,
        descriptor: ResourceDescriptor,
        flags: ResourceCreationFlags,
    ) -> Result<ResourceRef<C>, ResourceError> {
        let index = self.register(name, descriptor, flags)?;
        if self.live && !self.resizing && self.slots[index].object.is_none() {
            self.allocate(index)?;
            self.generation += 1;
        }
        Ok(ResourceRef::new(index, name))
    }

    fn register(
        &mut self,
        name: &str,
        descriptor: ResourceDescriptor,
        flags: ResourceCreationFlags,
    ) -> Result<usize, ResourceError> {
        if let Some(&index) = self.names.get(name) {
            let slot = &self.slots[index];
            if slot.descriptor == descriptor && slot.flags == flags {
                return Ok(index);
            }
            if slot.names.len() > 1 {
                // Every alias holds a handle to this slot, so none can follow a new descriptor.
                return Err(ResourceError::AliasedReplacement {
                    name: name.to_string(),
                    aliases: slot.names.iter().filter(|n| *n != name).cloned().collect(),
                });
            }
            let was_allocated = slot.object.is_some() && !slot.is_imported();
            self.destroy_slot(index);
            let slot = &mut self.slots[index];
            slot.descriptor = descriptor;
            slot.flags = flags;
            log::debug!("ResourceBuilder: replaced '{name}'");
            if was_allocated && !self.resizing {
                self.allocate(index)?;
                self.generation += 1;
            }
            return Ok(index);
        }

        if flags.contains(ResourceCreationFlags::SHARED) {
            let existing = self.slots.iter().position(|slot| {
                slot.flags.contains(ResourceCreationFlags::SHARED) && slot.descriptor == descriptor
            });
            if let Some(index) = existing {
                log::debug!(
                    "ResourceBuilder: '{name}' aliases shared resource '{}'",
                    self.slots[index].label()
                );
                self.slots[index].names.push(name.to_string());
                self.names.insert(name.to_string(), index);
                return Ok(index);
            }
        }

        let index = self.slots.len();
        self.slots.push(Slot {
            names: vec![name.to_string()],
            descriptor,
            flags,
            object: None,
        });
        self.names.insert(name.to_string(), index);
        Ok(index)
    }

    // --- Lookup ---

    /// Looks up a resource by name.
    ///
    /// ## Errors
    /// * `ResourceError::UnknownName` - Nothing registered `name`.
    /// * `ResourceError::KindMismatch` - `name` is not a resource of class `C`.
    pub fn get<C: ResourceClass>(&self, name: &str) -> Result<ResourceRef<C>, ResourceError> {
        let index = *self
            .names
            .get(name)
            .ok_or_else(|| ResourceError::UnknownName {
                name: name.to_string(),
            })?;
        let kind = self.slots[index].descriptor.kind();
        if !C::accepts(kind) {
            return Err(ResourceError::KindMismatch {
                name: name.to_string(),
                expected: C::NAME,
                found: kind.name(),
            });
        }
        Ok(ResourceRef::new(index, name))
    }

    /// Looks up a texture by name.
    pub fn get_texture(&self, name: &str) -> Result<TextureRef, ResourceError> {
        self.get(name)
    }

    /// Looks up a buffer by name.
    pub fn get_buffer(&self, name: &str) -> Result<BufferRef, ResourceError> {
        self.get(name)
    }

    /// Looks up a G-Buffer by name.
    pub fn get_gbuffer(&self, name: &str) -> Result<GBufferRef, ResourceError> {
        self.get(name)
    }

    /// Looks up a sampler by name.
    pub fn get_sampler(&self, name: &str) -> Result<SamplerRef, ResourceError> {
        self.get(name)
    }

    /// Resolves a reference to the objects currently backing it.
    ///
    /// ## Errors
    /// * `ResourceError::ResizeInProgress` - The resource was released by `resize_begin`.
    /// * `ResourceError::NotFound` - The resource has not been allocated yet.
    pub fn resolve<C: ResourceClass>(
        &self,
        handle: &ResourceRef<C>,
    ) -> Result<&C::Object, ResourceError> {
        let slot = self
            .slots
            .get(handle.slot)
            .ok_or(ResourceError::InvalidHandle)?;
        match &slot.object {
            Some(object) => C::object(object).ok_or_else(|| ResourceError::KindMismatch {
                name: handle.name().to_string(),
                expected: C::NAME,
                found: slot.descriptor.kind().name(),
            }),
            None if self.resizing && slot.descriptor.follows_viewport() => {
                Err(ResourceError::ResizeInProgress {
                    name: handle.name().to_string(),
                })
            }
            None => Err(ResourceError::NotFound),
        }
    }

    /// Resolves a texture reference.
    pub fn texture(&self, handle: &TextureRef) -> Result<&TextureResource, ResourceError> {
        self.resolve(handle)
    }

    /// Resolves a buffer reference.
    pub fn buffer(&self, handle: &BufferRef) -> Result<&BufferResource, ResourceError> {
        self.resolve(handle)
    }

    /// Resolves a G-Buffer reference.
    pub fn gbuffer(&self, handle: &GBufferRef) -> Result<&GBufferResource, ResourceError> {
        self.resolve(handle)
    }

    /// Resolves a sampler reference.
    pub fn sampler(
        &self,
        handle: &SamplerRef,
    ) -> Result<ember_core::renderer::api::SamplerId, ResourceError> {
        self.resolve(handle).copied()
    }

    /// The descriptor a reference was created with.
    pub fn descriptor<C: ResourceClass>(&self, handle: &ResourceRef<C>) -> Option<&ResourceDescriptor> {
        self.slots.get(handle.slot).map(|slot| &slot.descriptor)
    }

    /// Every registered name, sorted, with its descriptor and state.
    pub fn entries(&self) -> Vec<ResourceEntry<'_>> {
        let mut entries: Vec<ResourceEntry<'_>> = self
            .names
            .iter()
            .map(|(name, &index)| {
                let slot = &self.slots[index];
                ResourceEntry {
                    name: name.as_str(),
                    descriptor: &slot.descriptor,
                    object: slot.object.as_ref(),
                    aliased: slot.names.len() > 1,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(b.name));
        entries
    }

    // --- Lifetime ---

    /// Allocates every registered resource that has no GPU object yet.
    ///
    /// From the first call on, newly registered resources are allocated
    /// immediately.
    pub fn create_resources(&mut self) -> Result<(), ResourceError> {
        if self.resizing {
            return Err(ResourceError::ResizeInProgress {
                name: "<all>".to_string(),
            });
        }
        let pending: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].object.is_none() && !self.slots[i].is_imported())
            .collect();
        for &index in &pending {
            self.allocate(index)?;
        }
        if !pending.is_empty() {
            self.generation += 1;
            log::debug!("ResourceBuilder: allocated {} resources", pending.len());
        }
        self.live = true;
        Ok(())
    }

    /// Releases every resource whose size follows the viewport.
    ///
    /// Rendering must not happen until `resize_end`.
    pub fn resize_begin(&mut self) {
        if self.resizing {
            log::warn!("ResourceBuilder: resize_begin called twice");
            return;
        }
        log::info!(
            "ResourceBuilder: resize begin from {}x{}",
            self.viewport.0,
            self.viewport.1
        );
        self.resizing = true;
        for index in 0..self.slots.len() {
            if self.slots[index].descriptor.follows_viewport() {
                self.destroy_slot(index);
            }
        }
    }

    /// Recreates the viewport-sized resources at `width` x `height`.
    pub fn resize_end(&mut self, width: u32, height: u32) -> Result<(), ResourceError> {
        if !self.resizing {
            log::warn!("ResourceBuilder: resize_end without resize_begin");
        }
        self.viewport = (width.max(1), height.max(1));
        if self.live {
            for index in 0..self.slots.len() {
                let slot = &self.slots[index];
                if slot.descriptor.follows_viewport() && slot.object.is_none() {
                    // Stays in the resize state on failure so a retry picks up the rest.
                    self.allocate(index)?;
                }
            }
        }
        self.resizing = false;
        self.generation += 1;
        log::info!(
            "ResourceBuilder: resize end at {}x{}",
            self.viewport.0,
            self.viewport.1
        );
        Ok(())
    }

    /// Destroys every owned object and forgets imported ones.
    ///
    /// Registrations are kept, so `create_resources` brings everything back.
    pub fn release_resources(&mut self) {
        for index in 0..self.slots.len() {
            self.destroy_slot(index);
        }
        self.live = false;
        self.generation += 1;
    }

    fn allocate(&mut self, index: usize) -> Result<(), ResourceError> {
        let slot = &self.slots[index];
        let label = slot.label().to_string();
        let object = match &slot.descriptor {
            ResourceDescriptor::Texture { desc, .. } => {
                GpuResource::Texture(self.allocate_texture(&label, desc)?)
            }
            ResourceDescriptor::GBuffer {
                formats,
                size,
                usage,
            } => {
                let (width, height) = size.resolve(self.viewport);
                let targets = formats
                    .iter()
                    .enumerate()
                    .map(|(i, format)| {
                        self.allocate_texture(
                            &format!("{label}[{i}]"),
                            &TextureResourceDesc {
                                format: *format,
                                size: *size,
                                usage: *usage,
                                mip_levels: MipLevels::One,
                            },
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                GpuResource::GBuffer(GBufferResource {
                    targets,
                    width,
                    height,
                })
            }
            ResourceDescriptor::Buffer { desc, .. } => {
                let size = desc.size.resolve(self.viewport);
                let buffer = self.device.create_buffer(&BufferDescriptor {
                    label: Some(label.clone().into()),
                    size,
                    usage: desc.usage,
                    mapped_at_creation: false,
                })?;
                GpuResource::Buffer(BufferResource { buffer, size })
            }
            ResourceDescriptor::Sampler(desc) => {
                let sampler = self.device.create_sampler(&SamplerDescriptor {
                    label: Some(label.clone().into()),
                    ..desc.clone()
                })?;
                GpuResource::Sampler(sampler)
            }
            ResourceDescriptor::Imported { .. } => return Ok(()),
        };
        log::trace!("ResourceBuilder: allocated '{label}'");
        self.slots[index].object = Some(object);
        Ok(())
    }

    fn allocate_texture(
        &self,
        label: &str,
        desc: &TextureResourceDesc,
    ) -> Result<TextureResource, ResourceError> {
        let (width, height) = desc.size.resolve(self.viewport);
        let mut descriptor =
            TextureDescriptor::d2(label.to_string(), width, height, desc.format, desc.usage);
        if desc.mip_levels == MipLevels::Full {
            descriptor.mip_level_count = TextureDescriptor::full_mip_count(width, height);
        }
        let texture = self.device.create_texture(&descriptor)?;
        let view = self.device.create_texture_view(
            texture,
            &TextureViewDescriptor {
                label: Some(format!("{label} View").into()),
                ..Default::default()
            },
        )?;
        let mip_views = match desc.mip_levels {
            MipLevels::One => Vec::new(),
            MipLevels::Full => (0..descriptor.mip_level_count)
                .map(|mip| {
                    self.device.create_texture_view(
                        texture,
                        &TextureViewDescriptor {
                            label: Some(format!("{label} Mip {mip}").into()),
                            base_mip_level: mip,
                            mip_level_count: Some(1),
                            ..Default::default()
                        },
                    )
                })
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(TextureResource {
            texture: Some(texture),
            view,
            mip_views,
            width,
            height,
            format: desc.format,
        })
    }

    fn destroy_slot(&mut self, index: usize) {
        let imported = self.slots[index].is_imported();
        let Some(object) = self.slots[index].object.take() else {
            return;
        };
        if imported {
            return;
        }
        let device = self.device.as_ref();
        let result = match object {
            GpuResource::Texture(texture) => destroy_texture(device, &texture),
            GpuResource::GBuffer(gbuffer) => gbuffer
                .targets
                .iter()
                .try_for_each(|target| destroy_texture(device, target)),
            GpuResource::Buffer(buffer) => device.destroy_buffer(buffer.buffer),
            GpuResource::Sampler(sampler) => device.destroy_sampler(sampler),
        };
        if let Err(e) = result {
            log::warn!(
                "ResourceBuilder: failed to destroy '{}': {e}",
                self.slots[index].label()
            );
        }
    }
}

fn destroy_texture(device: &dyn GraphicsDevice, texture: &TextureResource) -> Result<(), ResourceError> {
    for view in &texture.mip_views {
        device.destroy_texture_view(*view)?;
    }
    device.destroy_texture_view(texture.view)?;
    if let Some(id) = texture.texture {
        device.destroy_texture(id)?;
    }
    Ok(())
}

impl Drop for ResourceBuilder {
    fn drop(&mut self) {
        for index in 0..self.slots.len() {
            self.destroy_slot(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::graphics::headless::HeadlessDevice;

    fn builder(width: u32, height: u32) -> (HeadlessDevice, ResourceBuilder) {
        let device = HeadlessDevice::new();
        let builder = ResourceBuilder::new(Arc::new(device.clone()), width, height);
        (device, builder)
    }

    fn color_desc() -> TextureResourceDesc {
        TextureResourceDesc::viewport(
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }

    #[test]
    fn test_created_texture_round_trips_by_name() {
        let (_device, mut resources) = builder(800, 600);
        let desc = color_desc();
        resources
            .create_texture_2d("X", desc.clone(), ResourceCreationFlags::empty())
            .unwrap();
        resources.create_resources().unwrap();

        let fetched = resources.get_texture("X").unwrap();
        assert_eq!(
            resources.descriptor(&fetched),
            Some(&ResourceDescriptor::Texture {
                kind: ResourceKind::Texture2D,
                desc,
            }),
            "the descriptor must come back unchanged"
        );
        let texture = resources.texture(&fetched).unwrap();
        assert_eq!((texture.width, texture.height), (800, 600));
        assert_eq!(texture.format, TextureFormat::Rgba16Float);
    }

    #[test]
    fn test_lookup_errors() {
        let (_device, mut resources) = builder(64, 64);
        assert!(matches!(
            resources.get_texture("Missing"),
            Err(ResourceError::UnknownName { .. })
        ));

        resources
            .create_constant_buffer::<[f32; 4]>("CB", true, ResourceCreationFlags::empty())
            .unwrap();
        match resources.get_texture("CB") {
            Err(ResourceError::KindMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, "texture");
                assert_eq!(found, "ConstantBuffer");
            }
            other => panic!("expected a kind mismatch, got {other:?}"),
        }

        let cb = resources.get_buffer("CB").unwrap();
        assert!(
            matches!(resources.buffer(&cb), Err(ResourceError::NotFound)),
            "nothing is allocated before create_resources"
        );
    }

    #[test]
    fn test_shared_resources_alias() {
        let (device, mut resources) = builder(128, 128);
        let a = resources
            .create_texture_2d("A", color_desc(), ResourceCreationFlags::SHARED)
            .unwrap();
        let b = resources
            .create_texture_2d("B", color_desc(), ResourceCreationFlags::SHARED)
            .unwrap();
        let c = resources
            .create_texture_2d("C", color_desc(), ResourceCreationFlags::empty())
            .unwrap();
        resources.create_resources().unwrap();

        assert_eq!(a, b, "identical shared descriptors share a slot");
        assert_ne!(a, c);
        assert_eq!(
            resources.texture(&a).unwrap().texture,
            resources.texture(&b).unwrap().texture
        );
        assert_eq!(device.live_texture_count(), 2);
        assert!(resources.entries().iter().any(|e| e.name == "B" && e.aliased));
    }

    #[test]
    fn test_resize_keeps_fixed_and_recreates_viewport_resources() {
        let (device, mut resources) = builder(1920, 1080);
        let depth = resources
            .create_depth_stencil_buffer(
                "#DepthStencil",
                TextureResourceDesc::viewport(
                    TextureFormat::Depth32Float,
                    TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
                ),
                ResourceCreationFlags::empty(),
            )
            .unwrap();
        let atlas = resources
            .create_shadow_atlas(
                "ShadowAtlas",
                TextureFormat::Depth32Float,
                1024,
                ResourceCreationFlags::empty(),
            )
            .unwrap();
        resources.create_resources().unwrap();

        let old_depth = resources.texture(&depth).unwrap().clone();
        let old_atlas = resources.texture(&atlas).unwrap().clone();
        let generation = resources.generation();

        resources.resize_begin();
        assert!(matches!(
            resources.texture(&depth),
            Err(ResourceError::ResizeInProgress { .. })
        ));
        resources.resize_end(1920, 1080).unwrap();

        let new_depth = resources.texture(&depth).unwrap();
        assert_eq!((new_depth.width, new_depth.height), (1920, 1080));
        assert_ne!(new_depth.texture, old_depth.texture, "depth is recreated");
        assert!(device.is_texture_destroyed(old_depth.texture.unwrap()));
        assert_eq!(
            resources.texture(&atlas).unwrap(),
            &old_atlas,
            "fixed-size resources are untouched"
        );
        assert!(resources.generation() > generation);
    }

    #[test]
    fn test_replacing_a_descriptor_keeps_the_handle() {
        let (device, mut resources) = builder(256, 256);
        let handle = resources
            .create_texture_2d("T", color_desc(), ResourceCreationFlags::empty())
            .unwrap();
        resources.create_resources().unwrap();
        let old = resources.texture(&handle).unwrap().texture.unwrap();

        let mut smaller = color_desc();
        smaller.size = ResourceSize::Viewport { scale: 0.5 };
        let replaced = resources
            .create_texture_2d("T", smaller, ResourceCreationFlags::empty())
            .unwrap();

        assert_eq!(handle, replaced);
        assert!(device.is_texture_destroyed(old));
        let texture = resources.texture(&handle).unwrap();
        assert_eq!((texture.width, texture.height), (128, 128));
    }

    #[test]
    fn test_aliased_name_cannot_change_descriptor() {
        let (_device, mut resources) = builder(64, 64);
        let a = resources
            .create_texture_2d("A", color_desc(), ResourceCreationFlags::SHARED)
            .unwrap();
        let b = resources
            .create_texture_2d("B", color_desc(), ResourceCreationFlags::SHARED)
            .unwrap();
        resources.create_resources().unwrap();

        let mut smaller = color_desc();
        smaller.size = ResourceSize::Viewport { scale: 0.5 };
        match resources.create_texture_2d("B", smaller, ResourceCreationFlags::SHARED) {
            Err(ResourceError::AliasedReplacement { name, aliases }) => {
                assert_eq!(name, "B");
                assert_eq!(aliases, vec!["A".to_string()]);
            }
            other => panic!("expected an aliased replacement error, got {other:?}"),
        }

        assert_eq!(resources.get_texture("B").unwrap(), b);
        let texture = resources.texture(&b).unwrap();
        assert_eq!((texture.width, texture.height), (64, 64));
        assert_eq!(texture, resources.texture(&a).unwrap());
    }

    #[test]
    fn test_failed_resize_end_stays_resizing_until_retried() {
        let (device, mut resources) = builder(128, 128);
        let color = resources
            .create_texture_2d("Color", color_desc(), ResourceCreationFlags::empty())
            .unwrap();
        let depth = resources
            .create_depth_stencil_buffer(
                "Depth",
                TextureResourceDesc::viewport(
                    TextureFormat::Depth32Float,
                    TextureUsage::RENDER_ATTACHMENT,
                ),
                ResourceCreationFlags::empty(),
            )
            .unwrap();
        resources.create_resources().unwrap();

        resources.resize_begin();
        device.fail_texture("Depth");
        assert!(resources.resize_end(64, 64).is_err());
        assert!(resources.is_resizing());
        assert!(matches!(
            resources.texture(&depth),
            Err(ResourceError::ResizeInProgress { .. })
        ));

        device.clear_failures();
        resources.resize_end(64, 64).unwrap();
        assert!(!resources.is_resizing());
        assert_eq!(resources.texture(&depth).unwrap().width, 64);
        assert_eq!(resources.texture(&color).unwrap().width, 64);
    }

    #[test]
    fn test_mip_chain_has_a_view_per_mip() {
        let (_device, mut resources) = builder(64, 32);
        let chain = resources
            .create_mip_chain(
                "#DepthChain",
                TextureFormat::R32Float,
                ResourceSize::VIEWPORT,
                TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
                ResourceCreationFlags::empty(),
            )
            .unwrap();
        resources.create_resources().unwrap();
        assert_eq!(resources.texture(&chain).unwrap().mip_views.len(), 7);
    }

    #[test]
    fn test_imported_views_are_never_destroyed() {
        let (device, mut resources) = builder(32, 32);
        let texture = device
            .create_texture(&TextureDescriptor::d2(
                "BackBuffer",
                32,
                32,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT,
            ))
            .unwrap();
        let view = device
            .create_texture_view(texture, &TextureViewDescriptor::default())
            .unwrap();
        let output = resources
            .import_texture("Output", Some(texture), view, (32, 32), TextureFormat::Rgba8Unorm)
            .unwrap();
        let generation = resources.generation();
        resources
            .import_texture("Output", Some(texture), view, (32, 32), TextureFormat::Rgba8Unorm)
            .unwrap();
        assert_eq!(resources.generation(), generation);
        assert_eq!(resources.texture(&output).unwrap().view, view);

        resources.release_resources();
        assert!(!device.is_texture_destroyed(texture));
        assert!(!device.is_view_destroyed(view));
    }

    #[test]
    fn test_cleared_import_resolves_to_nothing() {
        let (device, mut resources) = builder(16, 16);
        let texture = device
            .create_texture(&TextureDescriptor::d2(
                "Target",
                16,
                16,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT,
            ))
            .unwrap();
        let view = device
            .create_texture_view(texture, &TextureViewDescriptor::default())
            .unwrap();
        let output = resources
            .import_texture("Output", Some(texture), view, (16, 16), TextureFormat::Rgba8Unorm)
            .unwrap();

        resources.clear_import("Output").unwrap();
        assert!(matches!(resources.texture(&output), Err(ResourceError::NotFound)));
        assert!(resources
            .entries()
            .iter()
            .any(|e| e.name == "Output" && !e.is_allocated()));
        assert!(!device.is_view_destroyed(view));

        resources
            .create_constant_buffer::<[f32; 4]>("CB", false, ResourceCreationFlags::empty())
            .unwrap();
        assert!(matches!(
            resources.clear_import("CB"),
            Err(ResourceError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_samplers_are_shared_by_descriptor() {
        let (device, mut resources) = builder(8, 8);
        let a = resources
            .create_sampler("ShadowSampler", SamplerDescriptor::SHADOW_COMPARE)
            .unwrap();
        let b = resources
            .create_sampler("PcfSampler", SamplerDescriptor::SHADOW_COMPARE)
            .unwrap();
        let c = resources
            .create_sampler("Linear", SamplerDescriptor::LINEAR_CLAMP)
            .unwrap();
        resources.create_resources().unwrap();
        assert_eq!(resources.sampler(&a).unwrap(), resources.sampler(&b).unwrap());
        assert_ne!(resources.sampler(&a).unwrap(), resources.sampler(&c).unwrap());
        resources.release_resources();
        assert!(resources.sampler(&a).is_err());
        drop(device);
    }
}
