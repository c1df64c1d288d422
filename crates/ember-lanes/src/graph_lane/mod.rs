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

//! The frame graph: passes declaring their resource dependencies, validated
//! and ordered once, then executed every frame into a single command stream.

mod builder;
mod frame;
mod graph;
mod layouts;
mod pass;
mod shader_library;

pub use self::builder::RenderGraphBuilder;
pub use self::frame::{FrameData, ViewData};
pub use self::graph::{GraphNode, RenderGraph};
pub use self::layouts::SharedLayouts;
pub use self::pass::{PassBuilder, PassContext, PassInitContext, RenderGraphPass};
pub use self::shader_library::ShaderLibrary;
