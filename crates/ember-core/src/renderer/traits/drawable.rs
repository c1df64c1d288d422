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

//! Black-box draw units consumed by the batch renderer.

use crate::ember_bitflags;
use crate::renderer::light::ShadowKind;
use crate::renderer::traits::RenderPass;
use std::fmt::Debug;

/// The pass a draw is issued from. Materials pick their pipeline from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawPassKind {
    /// G-Buffer fill.
    Deferred,
    /// Forward shading of transparents and decals.
    Forward,
    /// Depth only, for the pre-pass.
    DepthOnly,
    /// Depth into a shadow atlas tile.
    Shadow(ShadowKind),
}

impl DrawPassKind {
    /// The name materials key their pipelines by.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Deferred => "Deferred",
            Self::Forward => "Forward",
            Self::DepthOnly => "DepthOnly",
            Self::Shadow(kind) => kind.name(),
        }
    }
}

ember_bitflags! {
    /// Routing flags of a material.
    pub struct MaterialFlags: u32 {
        /// Drawn by the forward pass instead of the G-Buffer pass.
        const FORWARD = 1 << 0;
        /// Rendered into shadow maps.
        const CASTS_SHADOWS = 1 << 1;
    }
}

/// Geometry that can be bound for drawing.
///
/// `begin_draw` binds vertex and index buffers. The renderer binds its own
/// groups 0 and 1 before calling it.
pub trait Mesh: Send + Sync + Debug {
    /// Indices drawn per instance.
    fn index_count(&self) -> u32;

    /// First index in the bound index buffer.
    fn first_index(&self) -> u32 {
        0
    }

    /// Value added to each index.
    fn base_vertex(&self) -> i32 {
        0
    }

    /// `false` while the mesh is still streaming in. Unready meshes are skipped.
    fn is_ready(&self) -> bool {
        true
    }

    /// Binds the geometry.
    fn begin_draw(&self, pass: &mut dyn RenderPass<'_>);

    /// Undoes anything `begin_draw` set up.
    fn end_draw(&self, _pass: &mut dyn RenderPass<'_>) {}
}

/// A surface description that binds its pipeline and group 2 per pass.
pub trait Material: Send + Sync + Debug {
    /// Routing flags.
    fn flags(&self) -> MaterialFlags;

    /// Binds the pipeline for `kind`. Returns `false` if the material has no
    /// variant for that pass, in which case the draw is skipped.
    fn begin_draw(&self, pass: &mut dyn RenderPass<'_>, kind: DrawPassKind) -> bool;

    /// Undoes anything `begin_draw` set up.
    fn end_draw(&self, _pass: &mut dyn RenderPass<'_>, _kind: DrawPassKind) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_names() {
        assert_eq!(DrawPassKind::Deferred.name(), "Deferred");
        assert_eq!(DrawPassKind::DepthOnly.name(), "DepthOnly");
        assert_eq!(DrawPassKind::Shadow(ShadowKind::Omnidirectional).name(), "OSM");
    }

    #[test]
    fn test_material_flags() {
        let flags = MaterialFlags::FORWARD | MaterialFlags::CASTS_SHADOWS;
        assert!(flags.contains(MaterialFlags::FORWARD));
        assert_eq!(
            format!("{:?}", MaterialFlags::CASTS_SHADOWS),
            "MaterialFlags(CASTS_SHADOWS)"
        );
    }
}
