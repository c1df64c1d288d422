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

//! How the application feeds a [`SceneRenderer`](super::SceneRenderer).
//!
//! A [`Scene`] hands out three managers. The renderer calls `update` on each
//! once per frame, in the order render, light, weather, and then reads what
//! they expose.

use std::fmt::Debug;

use ember_core::renderer::{GraphicsDevice, Light, WeatherConstants};
use ember_lanes::batch_lane::BatchRenderer;

use super::camera::Camera;

/// Per-frame inputs handed to every manager.
#[derive(Debug, Clone, Copy)]
pub struct SceneUpdate<'a> {
    /// The device the renderer draws with.
    pub device: &'a dyn GraphicsDevice,
    /// The camera of this frame.
    pub camera: &'a Camera,
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// Size of the render viewport.
    pub viewport: (u32, u32),
}

/// Owns the renderable objects of a scene.
pub trait RenderManager: Send + Debug {
    /// Adds, removes and moves instances in `batches`.
    ///
    /// Batches persist across frames, so only changes need to be applied.
    fn update(&mut self, ctx: &SceneUpdate<'_>, batches: &mut BatchRenderer);
}

/// Owns the lights of a scene.
pub trait LightManager: Send + Debug {
    /// Advances the lights by one frame.
    fn update(&mut self, _ctx: &SceneUpdate<'_>) {}

    /// The lights to shade this frame.
    fn lights(&self) -> &[Light];
}

/// Owns the sun, ambient light and fog.
pub trait WeatherManager: Send + Debug {
    /// Advances the weather by one frame.
    fn update(&mut self, _ctx: &SceneUpdate<'_>) {}

    /// The `CBWeather` contents of this frame.
    fn constants(&self) -> WeatherConstants;
}

/// A scene as the renderer sees it.
pub trait Scene {
    /// The renderable objects.
    fn render_manager(&mut self) -> &mut dyn RenderManager;

    /// The lights.
    fn light_manager(&mut self) -> &mut dyn LightManager;

    /// The weather.
    fn weather_manager(&mut self) -> &mut dyn WeatherManager;
}

/// A light set that only changes when the application edits it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticLights(pub Vec<Light>);

impl LightManager for StaticLights {
    fn lights(&self) -> &[Light] {
        &self.0
    }
}

/// Weather that only changes when the application edits it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedWeather(pub WeatherConstants);

impl WeatherManager for FixedWeather {
    fn constants(&self) -> WeatherConstants {
        self.0
    }
}
