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

//! Precomputes the split-sum BRDF lookup table used by image based lighting.

use ember_core::renderer::api::*;
use ember_core::renderer::{GraphicsDevice, ResourceError};

use super::common::{destroy_pipeline, draw_fullscreen, fullscreen_pipeline};
use super::names;
use crate::graph_lane::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
use crate::resource_lane::{ResourceCreationFlags, TextureRef, TextureResourceDesc};

/// Renders `BRDFLUT` once. The table has a fixed size, so it survives resizes
/// and is only rendered again if its texture was recreated.
#[derive(Debug, Default)]
pub struct BrdfLutPass {
    lut: Option<TextureRef>,
    pipeline: Option<RenderPipelineId>,
    rendered_view: Option<TextureViewId>,
}

impl BrdfLutPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderGraphPass for BrdfLutPass {
    fn name(&self) -> &'static str {
        "BRDFLUT"
    }

    fn build(&self, builder: &mut PassBuilder) {
        builder.write(names::BRDF_LUT);
    }

    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError> {
        let size = ctx.settings.brdf_lut_size.max(1);
        self.lut = Some(ctx.resources.create_texture_2d(
            names::BRDF_LUT,
            TextureResourceDesc::fixed(
                TextureFormat::Rg16Float,
                size,
                size,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            ),
            ResourceCreationFlags::empty(),
        )?);
        self.pipeline = Some(fullscreen_pipeline(
            ctx.device,
            "BRDFLUT",
            ctx.shaders.get("brdf_lut")?,
            "fs_main",
            &[],
            vec![TextureFormat::Rg16Float.into()],
        )?);
        self.rendered_view = None;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError> {
        let (Some(lut), Some(pipeline)) = (&self.lut, self.pipeline) else {
            return Err(ResourceError::NotFound);
        };
        let target = ctx.resources.texture(lut)?;
        if self.rendered_view == Some(target.view) {
            return Ok(());
        }
        log::debug!("BRDFLUT: rendering {}x{} table", target.width, target.height);

        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("BRDFLUT"),
            color_attachments: &[RenderPassColorAttachment {
                view: target.view,
                resolve_target: None,
                ops: Operations::clear(Color::BLACK),
            }],
            ..Default::default()
        });
        pass.set_pipeline(&pipeline);
        draw_fullscreen(pass.as_mut());
        drop(pass);

        self.rendered_view = Some(target.view);
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice) {
        destroy_pipeline(device, self.pipeline.take());
        self.rendered_view = None;
    }
}
