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

//! Read-only introspection of a running renderer.

use std::sync::{Arc, RwLock};

use ember_core::renderer::ViewportShading;
use ember_lanes::graph_lane::{GraphNode, RenderGraph};
use ember_lanes::resource_lane::{GpuResource, ResourceBuilder, ResourceKind};
use ember_telemetry::{BlockTiming, CpuProfiler};

/// One named resource, as listed by editor panels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// The registered name.
    pub name: String,
    /// The resource category.
    pub kind: ResourceKind,
    /// `true` if GPU objects currently back the name.
    pub allocated: bool,
    /// `true` if other names share the same objects.
    pub aliased: bool,
    /// Pixel size of textures and G-Buffers.
    pub size: Option<(u32, u32)>,
}

impl ResourceInfo {
    fn collect(resources: &ResourceBuilder) -> Vec<Self> {
        resources
            .entries()
            .into_iter()
            .map(|entry| ResourceInfo {
                name: entry.name.to_string(),
                kind: entry.descriptor.kind(),
                allocated: entry.is_allocated(),
                aliased: entry.aliased,
                size: match entry.object {
                    Some(GpuResource::Texture(t)) => Some((t.width, t.height)),
                    Some(GpuResource::GBuffer(g)) => Some((g.width, g.height)),
                    _ => None,
                },
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    viewport: (u32, u32),
    shading: ViewportShading,
    frame_index: u64,
    passes: Vec<GraphNode>,
    resources: Vec<ResourceInfo>,
}

/// A cloneable handle onto a renderer's state.
///
/// Editor panels receive one at construction instead of reaching for a
/// global renderer. The state is refreshed after initialization, every frame
/// and every resize, so a panel always sees the last completed state.
#[derive(Debug, Clone)]
pub struct RendererContext {
    snapshot: Arc<RwLock<Snapshot>>,
    profiler: Arc<CpuProfiler>,
}

impl RendererContext {
    pub(crate) fn new(profiler: Arc<CpuProfiler>) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Snapshot::default())),
            profiler,
        }
    }

    pub(crate) fn publish(
        &self,
        resources: &ResourceBuilder,
        graph: &RenderGraph,
        shading: ViewportShading,
        frame_index: u64,
    ) {
        let Ok(mut snapshot) = self.snapshot.write() else {
            log::warn!("RendererContext: snapshot lock poisoned, skipping update");
            return;
        };
        snapshot.viewport = resources.viewport();
        snapshot.shading = shading;
        snapshot.frame_index = frame_index;
        if snapshot.passes.len() != graph.nodes().len() {
            snapshot.passes = graph.nodes().to_vec();
        }
        snapshot.resources = ResourceInfo::collect(resources);
    }

    /// Size of the render viewport.
    pub fn viewport(&self) -> (u32, u32) {
        self.snapshot.read().map(|s| s.viewport).unwrap_or((0, 0))
    }

    /// Current editor shading mode.
    pub fn shading(&self) -> ViewportShading {
        self.snapshot.read().map(|s| s.shading).unwrap_or_default()
    }

    /// Frames rendered so far.
    pub fn frame_index(&self) -> u64 {
        self.snapshot.read().map(|s| s.frame_index).unwrap_or(0)
    }

    /// Passes in execution order with their dependencies.
    pub fn passes(&self) -> Vec<GraphNode> {
        self.snapshot
            .read()
            .map(|s| s.passes.clone())
            .unwrap_or_default()
    }

    /// Every named resource, sorted by name.
    pub fn resources(&self) -> Vec<ResourceInfo> {
        self.snapshot
            .read()
            .map(|s| s.resources.clone())
            .unwrap_or_default()
    }

    /// A single resource by name.
    pub fn resource(&self, name: &str) -> Option<ResourceInfo> {
        self.resources().into_iter().find(|r| r.name == name)
    }

    /// CPU time of every pass over the last frames.
    pub fn timings(&self) -> Vec<BlockTiming> {
        self.profiler.timings()
    }
}
