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

//! Strategies that turn the staged instance set into compacted draw lists.

use std::borrow::Cow;
use std::fmt::Debug;
use std::num::NonZeroU64;

use ember_core::math::Frustum;
use ember_core::renderer::api::*;
use ember_core::renderer::{CommandEncoder, DeviceFeature, GraphicsDevice, ResourceError};

use super::{CullingBuffers, CullingContext, CullingFlags};
use crate::resource_lane::TextureResource;

/// Instances handled by one workgroup of the cull shader.
pub const CULL_WORKGROUP_SIZE: u32 = 256;

/// Everything a kernel needs to cull one frame.
#[derive(Debug)]
pub struct CullJob<'a> {
    /// The device owning the buffers.
    pub device: &'a dyn GraphicsDevice,
    /// The CPU staging set, already uploaded.
    pub context: &'a CullingContext,
    /// Buffers of the upload.
    pub buffers: &'a CullingBuffers,
    /// Camera frustum in world space.
    pub frustum: &'a Frustum,
    /// Tests to apply.
    pub flags: CullingFlags,
    /// The `CBCamera` uniform buffer.
    pub camera: BufferId,
    /// The Hi-Z depth pyramid.
    pub depth_chain: &'a TextureResource,
    /// Kernel parameters, already written to `buffers.params`.
    pub params: OcclusionParams,
}

/// A culling strategy.
///
/// Kernels write the visible instances into `culled_instances` and their
/// counts into `swap_args`. They must never read results back to the CPU.
pub trait CullKernel: Send + Debug {
    /// A short name used in logs.
    fn name(&self) -> &'static str;

    /// Records or performs the cull for one frame.
    fn cull(
        &mut self,
        job: &CullJob<'_>,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<(), ResourceError>;

    /// Destroys the kernel's device objects.
    fn release(&mut self, _device: &dyn GraphicsDevice) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BindGroupKey {
    buffers: CullingBuffers,
    camera: BufferId,
    depth_chain: TextureViewId,
}

/// Culls on the GPU with the `cull` compute shader.
///
/// One invocation per instance; visible instances are appended to their
/// type's range with an atomic add on the type's instance count.
#[derive(Debug)]
pub struct GpuCullKernel {
    layout: BindGroupLayoutId,
    pipeline: ComputePipelineId,
    bind_group: Option<(BindGroupKey, BindGroupId)>,
}

impl GpuCullKernel {
    /// Creates the compute pipeline from the compiled `cull` module.
    pub fn new(device: &dyn GraphicsDevice, module: ShaderModuleId) -> Result<Self, ResourceError> {
        let compute = ShaderStageFlags::COMPUTE;
        let read_only = BindingType::StorageBuffer { read_only: true };
        let read_write = BindingType::StorageBuffer { read_only: false };
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("CullLayout"),
            entries: &[
                BindGroupLayoutEntry::new(
                    0,
                    compute,
                    BindingType::UniformBuffer {
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<OcclusionParams>() as u64
                        ),
                    },
                ),
                BindGroupLayoutEntry::new(
                    1,
                    compute,
                    BindingType::UniformBuffer {
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                ),
                BindGroupLayoutEntry::new(2, compute, read_only),
                BindGroupLayoutEntry::new(3, compute, read_only),
                BindGroupLayoutEntry::new(4, compute, read_only),
                BindGroupLayoutEntry::new(5, compute, read_write),
                BindGroupLayoutEntry::new(6, compute, read_write),
                BindGroupLayoutEntry::new(
                    7,
                    compute,
                    BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                    },
                ),
            ],
        })?;
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("CullPipelineLayout"),
            bind_group_layouts: &[layout],
        })?;
        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some(Cow::Borrowed("Cull")),
            layout: pipeline_layout,
            stage: ShaderStage {
                module,
                entry_point: "cs_main",
            },
        })?;
        Ok(Self {
            layout,
            pipeline,
            bind_group: None,
        })
    }

    fn bind_group(&mut self, job: &CullJob<'_>) -> Result<BindGroupId, ResourceError> {
        let key = BindGroupKey {
            buffers: *job.buffers,
            camera: job.camera,
            depth_chain: job.depth_chain.view,
        };
        if let Some((cached, id)) = self.bind_group {
            if cached == key {
                return Ok(id);
            }
            // The buffers behind the old group may already be gone.
            let _ = job.device.destroy_bind_group(id);
        }
        let b = job.buffers;
        let id = job.device.create_bind_group(&BindGroupDescriptor {
            label: Some("CullBindGroup"),
            layout: self.layout,
            entries: &[
                BindGroupEntry::new(0, BindingResource::whole(b.params)),
                BindGroupEntry::new(1, BindingResource::whole(job.camera)),
                BindGroupEntry::new(2, BindingResource::whole(b.type_data)),
                BindGroupEntry::new(3, BindingResource::whole(b.instances)),
                BindGroupEntry::new(4, BindingResource::whole(b.instance_offsets)),
                BindGroupEntry::new(5, BindingResource::whole(b.culled_instances)),
                BindGroupEntry::new(6, BindingResource::whole(b.swap_args)),
                BindGroupEntry::new(7, BindingResource::TextureView(job.depth_chain.view)),
            ],
        })?;
        self.bind_group = Some((key, id));
        Ok(id)
    }
}

impl CullKernel for GpuCullKernel {
    fn name(&self) -> &'static str {
        "GpuCull"
    }

    fn cull(
        &mut self,
        job: &CullJob<'_>,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<(), ResourceError> {
        let instance_count = job.context.total_instance_count();
        if instance_count == 0 {
            return Ok(());
        }
        let bind_group = self.bind_group(job)?;
        let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("ObjectCull"),
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(instance_count.div_ceil(CULL_WORKGROUP_SIZE), 1, 1);
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some((_, id)) = self.bind_group.take() {
            let _ = device.destroy_bind_group(id);
        }
        if let Err(err) = device.destroy_compute_pipeline(self.pipeline) {
            log::warn!("Failed to destroy cull pipeline: {err}");
        }
    }
}

/// Culls on the CPU and uploads the compacted result.
///
/// Used when the device has no compute support. The result is computed from
/// the staging set the CPU already owns, so nothing is read back. Occlusion is
/// not evaluated, which only makes the result more conservative.
#[derive(Debug, Default)]
pub struct CpuCullKernel;

impl CullKernel for CpuCullKernel {
    fn name(&self) -> &'static str {
        "CpuCull"
    }

    fn cull(
        &mut self,
        job: &CullJob<'_>,
        _encoder: &mut dyn CommandEncoder,
    ) -> Result<(), ResourceError> {
        let culled = job.context.cull(job.frustum, job.flags);
        if !culled.instances.is_empty() {
            job.device.write_buffer(
                job.buffers.culled_instances,
                0,
                bytemuck::cast_slice(&culled.instances),
            )?;
        }
        if !culled.args.is_empty() {
            job.device
                .write_buffer(job.buffers.swap_args, 0, bytemuck::cast_slice(&culled.args))?;
        }
        log::trace!(
            "CPU cull kept {} of {} instances",
            culled.args.iter().map(|a| a.instance_count).sum::<u32>(),
            job.context.total_instance_count()
        );
        Ok(())
    }
}

/// Picks the GPU kernel when the device supports compute shaders and the
/// `cull` module is available, the CPU kernel otherwise.
pub fn select_kernel(
    device: &dyn GraphicsDevice,
    module: Option<ShaderModuleId>,
) -> Result<Box<dyn CullKernel>, ResourceError> {
    match module {
        Some(module) if device.supports_feature(DeviceFeature::ComputeShaders) => {
            Ok(Box::new(GpuCullKernel::new(device, module)?))
        }
        _ => {
            log::info!("Compute shaders unavailable, culling on the CPU");
            Ok(Box::new(CpuCullKernel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling_lane::CullingManager;
    use ember_core::math::{Aabb, BoundingVolume, Mat4, Vec3};
    use ember_infra::HeadlessDevice;

    struct Fixture {
        device: HeadlessDevice,
        context: CullingContext,
        manager: CullingManager,
        camera: BufferId,
        depth_chain: TextureResource,
    }

    fn fixture(instances: &[Vec3]) -> Fixture {
        let device = HeadlessDevice::new();
        let bounds = BoundingVolume::from(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)));
        let mut context = CullingContext::new();
        context.append_type(36);
        for position in instances {
            context
                .append_instance(&Mat4::from_translation(*position), &bounds)
                .unwrap();
        }
        let mut manager = CullingManager::new();
        manager.upload(&device, &context).unwrap();
        let camera = device
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed("CBCamera")),
                size: std::mem::size_of::<CameraConstants>() as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            })
            .unwrap();
        let texture = device
            .create_texture(&TextureDescriptor::d2(
                "DepthChain",
                64,
                64,
                TextureFormat::R32Float,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        let view = device
            .create_texture_view(texture, &TextureViewDescriptor::default())
            .unwrap();
        Fixture {
            device,
            context,
            manager,
            camera,
            depth_chain: TextureResource {
                texture: Some(texture),
                view,
                mip_views: vec![view],
                width: 64,
                height: 64,
                format: TextureFormat::R32Float,
            },
        }
    }

    fn frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&(projection * view))
    }

    fn run(fixture: &Fixture, kernel: &mut dyn CullKernel) {
        let buffers = fixture.manager.buffers().unwrap();
        let frustum = frustum();
        let job = CullJob {
            device: &fixture.device,
            context: &fixture.context,
            buffers: &buffers,
            frustum: &frustum,
            flags: CullingFlags::FRUSTUM,
            camera: fixture.camera,
            depth_chain: &fixture.depth_chain,
            params: OcclusionParams::default(),
        };
        let mut encoder = fixture.device.create_command_encoder(Some("cull test"));
        kernel.cull(&job, encoder.as_mut()).unwrap();
        fixture.manager.record_args_copy(encoder.as_mut());
        fixture.device.submit_command_buffer(encoder.finish());
    }

    fn culled_count(fixture: &Fixture) -> u32 {
        let buffers = fixture.manager.buffers().unwrap();
        let bytes = fixture.device.buffer_contents(buffers.draw_args).unwrap();
        let args: DrawIndexedIndirectArgs =
            bytemuck::pod_read_unaligned(&bytes[..DrawIndexedIndirectArgs::SIZE as usize]);
        args.instance_count
    }

    fn gpu_kernel(fixture: &Fixture) -> GpuCullKernel {
        let module = fixture
            .device
            .create_shader_module(&ShaderModuleDescriptor {
                label: Some("cull"),
                source: ShaderSource::Wgsl(Cow::Borrowed("")),
            })
            .unwrap();
        GpuCullKernel::new(&fixture.device, module).unwrap()
    }

    #[test]
    fn test_gpu_kernel_dispatches_one_group_per_256_instances() {
        let positions: Vec<Vec3> = (0..300).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let fixture = fixture(&positions);
        let mut kernel = gpu_kernel(&fixture);
        run(&fixture, &mut kernel);
        run(&fixture, &mut kernel);

        let dispatches = fixture.device.executed_dispatches();
        assert_eq!(dispatches.len(), 2);
        assert_eq!(dispatches[0].workgroups, [2, 1, 1]);
        assert_eq!(dispatches[0].pass, "ObjectCull");
    }

    #[test]
    fn test_gpu_kernel_skips_empty_frames() {
        let fixture = fixture(&[]);
        let mut kernel = gpu_kernel(&fixture);
        run(&fixture, &mut kernel);
        assert!(fixture.device.executed_dispatches().is_empty());
        assert_eq!(culled_count(&fixture), 0);
    }

    #[test]
    fn test_cpu_kernel_drops_invisible_instances() {
        let fixture = fixture(&[Vec3::ZERO, Vec3::new(0.0, 0.0, 400.0), Vec3::new(1.0, 1.0, 0.0)]);
        run(&fixture, &mut CpuCullKernel);
        assert_eq!(culled_count(&fixture), 2);
    }

    #[test]
    fn test_select_kernel_falls_back_without_compute() {
        let device = HeadlessDevice::with_compute(false);
        let kernel = select_kernel(&device, Some(ShaderModuleId(1))).unwrap();
        assert_eq!(kernel.name(), "CpuCull");
        let kernel = select_kernel(&HeadlessDevice::new(), None).unwrap();
        assert_eq!(kernel.name(), "CpuCull");
    }
}
