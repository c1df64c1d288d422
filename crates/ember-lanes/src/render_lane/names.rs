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

//! Graph-level names of the resources exchanged between passes.
//!
//! Names starting with `#` or `CB` are registered by the scene renderer
//! before the passes are initialized and imported into the graph.

/// Depth buffer of the main view.
pub const DEPTH_STENCIL: &str = "#DepthStencil";
/// Ambient occlusion, one channel.
pub const AO_BUFFER: &str = "#AOBuffer";
/// Hi-Z pyramid built from [`DEPTH_STENCIL`].
pub const DEPTH_CHAIN: &str = "#DepthChain";
/// Camera uniform buffer.
pub const CAMERA: &str = "CBCamera";
/// Sun and fog uniform buffer.
pub const WEATHER: &str = "CBWeather";
/// Split-sum BRDF table.
pub const BRDF_LUT: &str = "BRDFLUT";
/// Compacted instance set written by the cull kernel. Backed by the culling
/// manager rather than the resource builder.
pub const CULLED_INSTANCES: &str = "CulledInstances";
/// `(offset, count)` per screen tile.
pub const LIGHT_GRID: &str = "LightGridBuffer";
/// Light indices referenced by [`LIGHT_GRID`].
pub const LIGHT_INDEX_LIST: &str = "LightIndexList";
/// Packed scene lights.
pub const LIGHTS: &str = "Lights";
/// Tile counts and limits shared by light culling and shading.
pub const LIGHT_TILES: &str = "LightTiles";
/// Depth atlas holding every shadow map.
pub const SHADOW_ATLAS: &str = "ShadowAtlas";
/// Matrix and atlas rectangle of every shadow tile.
pub const SHADOW_TILES: &str = "ShadowTiles";
/// Surface attributes: albedo, normal, material.
pub const GBUFFER: &str = "GBuffer";
/// HDR lit colour.
pub const LIGHT_BUFFER: &str = "LightBuffer";
/// The final target, imported every frame.
pub const OUTPUT: &str = "Output";
/// Bilinear clamp sampler.
pub const LINEAR_SAMPLER: &str = "LinearClamp";
/// Depth comparison sampler.
pub const SHADOW_SAMPLER: &str = "ShadowCompare";
