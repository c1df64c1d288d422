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

//! The contract every frame-graph pass implements.

use std::fmt::Debug;

use ember_core::renderer::{CommandEncoder, GraphicsDevice, RendererSettings, ResourceError};

use super::{FrameData, ShaderLibrary, SharedLayouts};
use crate::resource_lane::ResourceBuilder;

/// Collects the resources a pass reads and writes.
///
/// Names are graph-level identifiers. Names starting with `#` or `CB` are
/// usually imported by the scene renderer rather than written by a pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassBuilder {
    reads: Vec<String>,
    writes: Vec<String>,
}

impl PassBuilder {
    /// Declares a read of `resource`.
    pub fn read(&mut self, resource: &str) -> &mut Self {
        if !self.reads.iter().any(|r| r == resource) {
            self.reads.push(resource.to_string());
        }
        self
    }

    /// Declares a write of `resource`.
    pub fn write(&mut self, resource: &str) -> &mut Self {
        if !self.writes.iter().any(|w| w == resource) {
            self.writes.push(resource.to_string());
        }
        self
    }

    /// Declares that `resource` is loaded and then written again.
    pub fn read_write(&mut self, resource: &str) -> &mut Self {
        self.read(resource).write(resource)
    }

    /// Reads in declaration order.
    pub fn reads(&self) -> &[String] {
        &self.reads
    }

    /// Writes in declaration order.
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.reads, self.writes)
    }
}

/// What a pass may touch while creating its device objects.
pub struct PassInitContext<'a> {
    /// The device.
    pub device: &'a dyn GraphicsDevice,
    /// Named resources. Passes register their outputs here and look up their
    /// inputs, which earlier passes registered.
    pub resources: &'a mut ResourceBuilder,
    /// Compiled shader modules.
    pub shaders: &'a ShaderLibrary,
    /// Layouts shared by geometry pipelines.
    pub layouts: &'a SharedLayouts,
    /// Renderer configuration.
    pub settings: &'a RendererSettings,
}

/// What a pass may touch while recording a frame.
pub struct PassContext<'a> {
    /// The device.
    pub device: &'a dyn GraphicsDevice,
    /// Named resources, resolved lazily.
    pub resources: &'a ResourceBuilder,
    /// The frame's single command encoder.
    pub encoder: &'a mut dyn CommandEncoder,
    /// Scene state for this frame.
    pub frame: &'a FrameData<'a>,
}

/// A node of the render graph.
///
/// A pass goes through three stages:
///
/// 1. `build` once, when the graph is assembled, to declare its static
///    dependencies. This must not touch the device.
/// 2. `init` once before the first frame, and again after `release`, to
///    create pipelines and register the resources it writes.
/// 3. `execute` every frame, in the order fixed by the graph.
///
/// Resource handles obtained during `init` stay valid across resizes; GPU
/// objects resolved from them must not be kept past the current frame.
pub trait RenderGraphPass: Send + Debug {
    /// A unique name, also used as the profiler block name.
    fn name(&self) -> &'static str;

    /// Declares reads and writes.
    fn build(&self, builder: &mut PassBuilder);

    /// Creates device objects and registers written resources.
    fn init(&mut self, ctx: &mut PassInitContext<'_>) -> Result<(), ResourceError>;

    /// Records the pass into `ctx.encoder`.
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), ResourceError>;

    /// Destroys the device objects created by `init`.
    fn release(&mut self, _device: &dyn GraphicsDevice) {}
}
