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

//! Built-in WGSL shaders of the deferred pipeline.
//!
//! Shared declarations live in small snippets that are concatenated in front
//! of each shader at compile time:
//!
//! - `fullscreen.wgsl` - the fullscreen triangle vertex stage
//! - `camera.wgsl` - `CBCamera` at group 0
//! - `geometry.wgsl` - the instance set at group 1 and the standard vertex input
//! - `lighting.wgsl` - tiled lights, shadows and fog at group 3
//!
//! # Available Shaders
//!
//! - [`BRDF_LUT_WGSL`] - split-sum BRDF integration
//! - [`DEPTH_PREPASS_WGSL`] - depth-only geometry
//! - [`SSAO_WGSL`] - screen-space ambient occlusion
//! - [`HIZ_WGSL`] - depth pyramid construction
//! - [`CULL_WGSL`] - GPU instance culling
//! - [`LIGHT_CULL_WGSL`] - tiled light culling
//! - [`SHADOW_WGSL`] - shadow atlas depth
//! - [`GBUFFER_WGSL`] - G-Buffer fill
//! - [`DEFERRED_LIGHTING_WGSL`] - fullscreen deferred shading
//! - [`FORWARD_WGSL`] - forward shading of transparents
//! - [`POST_PROCESS_WGSL`] - tone mapping into the output

/// Split-sum BRDF lookup table, `(n.v, roughness) -> (scale, bias)`.
pub const BRDF_LUT_WGSL: &str = concat!(
    include_str!("fullscreen.wgsl"),
    include_str!("brdf_lut.wgsl")
);

/// Depth-only geometry for the pre-pass.
pub const DEPTH_PREPASS_WGSL: &str = concat!(
    include_str!("camera.wgsl"),
    include_str!("geometry.wgsl"),
    include_str!("depth_prepass.wgsl")
);

/// Screen-space ambient occlusion from the depth buffer.
pub const SSAO_WGSL: &str = concat!(
    include_str!("fullscreen.wgsl"),
    include_str!("camera.wgsl"),
    include_str!("ssao.wgsl")
);

/// Depth pyramid: `fs_copy` fills mip 0, `fs_reduce` every further mip.
pub const HIZ_WGSL: &str = concat!(include_str!("fullscreen.wgsl"), include_str!("hiz.wgsl"));

/// Frustum and Hi-Z occlusion culling of the staged instances.
///
/// Entry point `cs_main`, 256 invocations per workgroup.
pub const CULL_WGSL: &str = include_str!("cull.wgsl");

/// Builds the light grid, one invocation per screen tile.
pub const LIGHT_CULL_WGSL: &str = include_str!("light_cull.wgsl");

/// Depth into a shadow atlas tile.
pub const SHADOW_WGSL: &str = concat!(
    include_str!("camera.wgsl"),
    include_str!("geometry.wgsl"),
    include_str!("shadow.wgsl")
);

/// Default G-Buffer surface. Materials usually bring their own.
pub const GBUFFER_WGSL: &str = concat!(
    include_str!("camera.wgsl"),
    include_str!("geometry.wgsl"),
    include_str!("gbuffer.wgsl")
);

/// Cook-Torrance shading of the G-Buffer with tiled lights, shadows, ambient
/// occlusion and fog. `fs_solid` is the unlit editor shading.
pub const DEFERRED_LIGHTING_WGSL: &str = concat!(
    include_str!("fullscreen.wgsl"),
    include_str!("camera.wgsl"),
    include_str!("lighting.wgsl"),
    include_str!("deferred_lighting.wgsl")
);

/// Default forward surface, alpha blended over the light buffer.
pub const FORWARD_WGSL: &str = concat!(
    include_str!("camera.wgsl"),
    include_str!("geometry.wgsl"),
    include_str!("lighting.wgsl"),
    include_str!("forward.wgsl")
);

/// ACES tone mapping of the light buffer.
pub const POST_PROCESS_WGSL: &str = concat!(
    include_str!("fullscreen.wgsl"),
    include_str!("post_process.wgsl")
);

/// Every built-in shader, keyed by the name passes look it up with.
pub const BUILTIN: &[(&str, &str)] = &[
    ("brdf_lut", BRDF_LUT_WGSL),
    ("depth_prepass", DEPTH_PREPASS_WGSL),
    ("ssao", SSAO_WGSL),
    ("hiz", HIZ_WGSL),
    ("cull", CULL_WGSL),
    ("light_cull", LIGHT_CULL_WGSL),
    ("shadow", SHADOW_WGSL),
    ("gbuffer", GBUFFER_WGSL),
    ("deferred_lighting", DEFERRED_LIGHTING_WGSL),
    ("forward", FORWARD_WGSL),
    ("post_process", POST_PROCESS_WGSL),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_are_unique() {
        let mut names: Vec<_> = BUILTIN.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), BUILTIN.len(), "Duplicate built-in shader name");
    }

    #[test]
    fn test_fullscreen_shaders_have_both_stages() {
        for source in [
            BRDF_LUT_WGSL,
            SSAO_WGSL,
            HIZ_WGSL,
            DEFERRED_LIGHTING_WGSL,
            POST_PROCESS_WGSL,
        ] {
            assert!(source.contains("@vertex"), "Missing vertex stage");
            assert!(source.contains("@fragment"), "Missing fragment stage");
        }
    }

    #[test]
    fn test_geometry_shaders_share_instance_lookup() {
        for source in [DEPTH_PREPASS_WGSL, SHADOW_WGSL, GBUFFER_WGSL, FORWARD_WGSL] {
            assert!(source.contains("@vertex"));
            assert!(source.contains("fn instance_transform"));
            assert!(source.contains("model_transform(in, instance_index)"));
            assert!(source.contains("@group(1) @binding(3)"));
        }
    }

    #[test]
    fn test_skinning_walks_the_instance_palette() {
        let skin = &GBUFFER_WGSL[GBUFFER_WGSL.find("fn skin_transform").expect("skinning helper")..];
        assert!(skin.contains("draw.bone_offset + instance_index * draw.bone_count"));
        assert!(skin.contains("bones[palette + min(in.joints[i], last)]"));
        assert!(GBUFFER_WGSL.contains("@location(3) joints: vec4<u32>"));
        assert!(GBUFFER_WGSL.contains("@location(4) weights: vec4<f32>"));
    }

    #[test]
    fn test_hiz_reduce_covers_odd_source_edges() {
        let reduce = &HIZ_WGSL[HIZ_WGSL.find("fn fs_reduce").expect("reduce entry point")..];
        assert!(reduce.contains("source & vec2<i32>(1)"), "odd sizes must widen the footprint");
        assert!(reduce.contains("y < footprint.y") && reduce.contains("x < footprint.x"));
        assert!(reduce.contains("max(farthest"), "the reduce keeps the farthest depth");
    }

    #[test]
    fn test_compute_shaders_expose_cs_main() {
        for source in [CULL_WGSL, LIGHT_CULL_WGSL] {
            assert!(source.contains("@compute"));
            assert!(source.contains("fn cs_main"));
        }
    }

    #[test]
    fn test_lighting_shaders_bind_group_three() {
        assert!(DEFERRED_LIGHTING_WGSL.contains("@group(3) @binding(7)"));
        assert!(FORWARD_WGSL.contains("@group(3) @binding(7)"));
        assert!(DEFERRED_LIGHTING_WGSL.contains("fn fs_solid"));
    }
}
