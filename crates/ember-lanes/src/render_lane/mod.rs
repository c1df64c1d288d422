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

//! The deferred pipeline: eleven passes wired into a [`RenderGraph`].
//!
//! Passes run in this order, each one only reading what an earlier pass or
//! the scene renderer produced:
//!
//! 1. [`BrdfLutPass`] - split-sum table, rendered once
//! 2. [`DepthPrePass`] - depth of every opaque instance
//! 3. [`PostProcessPrePass`] - ambient occlusion from depth
//! 4. [`HiZDepthPass`] - depth pyramid
//! 5. [`ObjectCullPass`] - frustum and occlusion culling into indirect args
//! 6. [`LightCullPass`] - per-tile light lists
//! 7. [`ShadowMapPass`] - shadow atlas
//! 8. [`GBufferPass`] - surface attributes of the visible instances
//! 9. [`LightDeferredPass`] - fullscreen shading into the light buffer
//! 10. [`LightForwardPass`] - transparents over the light buffer
//! 11. [`PostProcessPass`] - tone mapping into `Output`

mod brdf_lut_pass;
mod common;
mod depth_prepass;
mod gbuffer_pass;
mod hiz_pass;
mod light_cull_pass;
mod light_deferred_pass;
mod light_forward_pass;
mod lighting;
pub mod names;
mod object_cull_pass;
mod post_process_pass;
mod shadow_atlas;
mod shadow_map_pass;
pub mod shaders;
mod ssao_pass;

pub use self::brdf_lut_pass::BrdfLutPass;
pub use self::common::{standard_vertex_layout, STANDARD_VERTEX_STRIDE};
pub use self::depth_prepass::DepthPrePass;
pub use self::gbuffer_pass::{GBufferPass, GBUFFER_FORMATS};
pub use self::hiz_pass::HiZDepthPass;
pub use self::light_cull_pass::{
    build_light_grid, LightCullPass, LightGrid, LightTileParams, LIGHT_CULL_WORKGROUP_SIZE,
    MAX_LIGHTS,
};
pub use self::light_deferred_pass::{LightDeferredPass, LIGHT_BUFFER_FORMAT};
pub use self::light_forward_pass::LightForwardPass;
pub use self::object_cull_pass::ObjectCullPass;
pub use self::post_process_pass::PostProcessPass;
pub use self::shadow_atlas::{
    cascade_splits, ShadowAtlasLayout, ShadowTile, ShadowTileData, ATLAS_TILES_PER_ROW,
    MAX_SHADOW_TILES,
};
pub use self::shadow_map_pass::ShadowMapPass;
pub use self::ssao_pass::PostProcessPrePass;

use ember_core::renderer::api::{CameraConstants, TextureFormat, TextureUsage};
use ember_core::renderer::{GraphError, ResourceError, WeatherConstants};

use crate::graph_lane::{RenderGraph, RenderGraphBuilder};
use crate::resource_lane::{
    BufferRef, ResourceBuilder, ResourceCreationFlags, TextureRef, TextureResourceDesc,
};

/// Resources the scene renderer owns and uploads every frame.
#[derive(Debug, Clone)]
pub struct FrameResources {
    /// `CBCamera`.
    pub camera: BufferRef,
    /// `CBWeather`.
    pub weather: BufferRef,
    /// `#AOBuffer`.
    pub ao: TextureRef,
    /// `#DepthStencil`.
    pub depth: TextureRef,
}

/// Registers the resources the graph imports. Must run before the passes are
/// initialized, since several of them look these names up.
pub fn create_frame_resources(
    resources: &mut ResourceBuilder,
) -> Result<FrameResources, ResourceError> {
    let flags = ResourceCreationFlags::empty();
    let camera = resources.create_constant_buffer::<CameraConstants>(names::CAMERA, true, flags)?;
    let weather =
        resources.create_constant_buffer::<WeatherConstants>(names::WEATHER, true, flags)?;
    let ao = resources.create_texture_2d(
        names::AO_BUFFER,
        TextureResourceDesc::viewport(
            TextureFormat::R16Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        ),
        flags,
    )?;
    let depth = resources.create_depth_stencil_buffer(
        names::DEPTH_STENCIL,
        TextureResourceDesc::viewport(
            TextureFormat::Depth32Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        ),
        flags,
    )?;
    Ok(FrameResources {
        camera,
        weather,
        ao,
        depth,
    })
}

/// Imports the scene renderer's resources and adds the eleven passes.
pub fn add_deferred_passes(builder: &mut RenderGraphBuilder) -> Result<(), GraphError> {
    builder
        .import(names::DEPTH_STENCIL)
        .import(names::AO_BUFFER)
        .import(names::CAMERA)
        .import(names::WEATHER)
        .import(names::OUTPUT);

    builder
        .add_pass(Box::new(BrdfLutPass::new()))?
        .add_pass(Box::new(DepthPrePass::new()))?
        .add_pass(Box::new(PostProcessPrePass::new()))?
        .add_pass(Box::new(HiZDepthPass::new()))?
        .add_pass(Box::new(ObjectCullPass::new()))?
        .add_pass(Box::new(LightCullPass::new()))?
        .add_pass(Box::new(ShadowMapPass::new()))?
        .add_pass(Box::new(GBufferPass::new()))?
        .add_pass(Box::new(LightDeferredPass::new()))?
        .add_pass(Box::new(LightForwardPass::new()))?
        .add_pass(Box::new(PostProcessPass::new()))?;
    Ok(())
}

/// Builds the validated deferred graph.
pub fn build_deferred_graph() -> Result<RenderGraph, GraphError> {
    let mut builder = RenderGraphBuilder::new();
    add_deferred_passes(&mut builder)?;
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> RenderGraph {
        build_deferred_graph().expect("the deferred pipeline must wire up")
    }

    #[test]
    fn test_passes_run_in_pipeline_order() {
        let order: Vec<_> = graph().passes().collect();
        assert_eq!(
            order,
            vec![
                "BRDFLUT",
                "DepthPrePass",
                "PostProcessPrePass",
                "HiZDepthPass",
                "ObjectCullPass",
                "LightCullPass",
                "ShadowMapPass",
                "GBufferPass",
                "LightDeferredPass",
                "LightForwardPass",
                "PostProcessPass",
            ]
        );
    }

    #[test]
    fn test_hiz_reads_come_from_the_depth_prepass() {
        let graph = graph();
        let depth = graph.node("DepthPrePass").expect("depth pre-pass node");
        let hiz = graph.node("HiZDepthPass").expect("Hi-Z node");
        for read in &hiz.reads {
            assert!(
                depth.writes.contains(read),
                "Hi-Z reads {read}, which the depth pre-pass does not write"
            );
        }
        assert!(hiz.dependencies.contains(&"DepthPrePass"));
    }

    #[test]
    fn test_deferred_lighting_reads_every_gbuffer_output() {
        // Lighting reads more than the G-Buffer pass writes; only that subset is checked.
        let graph = graph();
        let gbuffer = graph.node("GBufferPass").expect("G-Buffer node");
        let lighting = graph.node("LightDeferredPass").expect("lighting node");
        for write in &gbuffer.writes {
            assert!(
                lighting.reads.contains(write),
                "deferred lighting does not read {write}"
            );
        }
        assert!(lighting.dependencies.contains(&"GBufferPass"));
        assert!(lighting.dependencies.contains(&"ShadowMapPass"));
    }

    #[test]
    fn test_every_read_has_an_upstream_writer_or_import() {
        let graph = graph();
        let mut available: Vec<String> = graph.imports().to_vec();
        for node in graph.nodes() {
            for read in &node.reads {
                assert!(
                    available.contains(read),
                    "{} reads {read} before anything provides it",
                    node.name
                );
            }
            available.extend(node.writes.iter().cloned());
        }
    }

    #[test]
    fn test_light_cull_follows_the_depth_pyramid() {
        let graph = graph();
        let light_cull = graph.node("LightCullPass").expect("light cull node");
        assert!(light_cull.dependencies.contains(&"HiZDepthPass"));
        let output_writer = graph
            .nodes()
            .iter()
            .find(|n| n.writes.iter().any(|w| w == names::OUTPUT))
            .map(|n| n.name);
        assert_eq!(output_writer, Some("PostProcessPass"));
    }
}
