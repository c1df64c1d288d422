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

//! Acts as the agent for rendering: it owns the frame graph, keeps the
//! resource set sized to the output and feeds the passes every frame.
//!
//! The lanes do the work. The agent decides what runs and when:
//! - [`SceneRenderer`] wires the deferred graph, uploads per-frame state and
//!   drives resizes and screenshots.
//! - [`RendererContext`] is the read-only view handed to editor panels.
//! - [`Scene`] and its managers are how the application feeds the renderer.

mod camera;
mod context;
mod scene;
mod scene_renderer;
mod screenshot;

pub use camera::Camera;
pub use context::{RendererContext, ResourceInfo};
pub use scene::{
    FixedWeather, LightManager, RenderManager, Scene, SceneUpdate, StaticLights, WeatherManager,
};
pub use scene_renderer::{RenderTarget, SceneRenderer};
pub use screenshot::Screenshot;
