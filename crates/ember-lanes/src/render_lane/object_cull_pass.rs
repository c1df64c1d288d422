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

use ember_core::renderer::{GraphicsDevice, ResourceError};

use super::names;
use crate::culling_lane::{select_kernel, CullJob, CullKernel};
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::{BufferRef, TextureRef};

/// Compacts the frame's instances into `CulledInstances` and counts them into
/// the indirect draw records read by the G-Buffer pass.
///
/// Results stay on the device: nothing here waits for or reads back the
/// dispatch.
#[derive(Debug, Default)]
pub struct ObjectCullPass {
    camera: Option<BufferRef>,
    depth_chain: Option<TextureRef>,
    kernel: Option<Box<dyn CullKernel>>,
}

impl ObjectCullPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the selected kernel, `None` before `init`.
    pub fn kernel_name(&self) -> Option<&'static str> {
        self.kernel.as_ref().map(|kernel| kernel.name())
    }
}

impl RenderGraphPass for ObjectCullPass {
    fn name(&self) -> &'static str {
        "ObjectCullPass"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder
            .read(names::DEPTH_CHAIN)
            .read(names::CAMERA)
            .write(names::CULLED_INSTANCES);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        self.camera = Some(ctx.resources.get_buffer(names::CAMERA)?);
        self.depth_chain = Some(ctx.resources.get_texture(names::DEPTH_CHAIN)?);
        let kernel = select_kernel(ctx.device, ctx.shaders.get("cull").ok())?;
        log::info!("ObjectCullPass: using the {} kernel", kernel.name());
        self.kernel = Some(kernel);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let (Some(camera), Some(depth_chain), Some(kernel)) =
            (&self.camera, &self.depth_chain, self.kernel.as_mut())
        else {
            return Err(ResourceError::NotFound);
        };
        let frame = ctx.frame;
        let manager = frame.culling_manager;
        let Some(buffers) = manager.buffers() else {
            log::trace!("ObjectCullPass: nothing uploaded yet");
            return Ok(());
        };
        let camera = ctx.resources.buffer(camera)?.buffer;
        let depth_chain = ctx.resources.texture(depth_chain)?;
        let params = frame.view.occlusion_params(
            frame.culling_flags,
            manager.instance_count(),
            manager.type_count(),
            depth_chain.mip_views.len() as u32,
        );
        manager.write_params(ctx.device, &params)?;

        kernel.cull(
            &CullJob {
                device: ctx.device,
                context: frame.culling,
                buffers: &buffers,
                frustum: &frame.view.frustum,
                flags: frame.culling_flags,
                camera,
                depth_chain,
                params,
            },
            ctx.encoder,
        )?;
        manager.record_args_copy(ctx.encoder);
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some(mut kernel) = self.kernel.take() {
            kernel.release(device);
        }
    }
}
