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

//! # Ember Lanes
//!
//! The hot path of the renderer. Each lane owns one concern of a frame:
//!
//! - [`resource_lane`] - named GPU resources that survive resizes
//! - [`culling_lane`] - per-type instance staging and the cull kernels
//! - [`batch_lane`] - mesh and material batching with indirect draws
//! - [`graph_lane`] - the validated, ordered pass graph and its executer
//! - [`render_lane`] - the passes of the deferred pipeline

#![warn(missing_docs)]

mod buffer;

pub mod batch_lane;
pub mod culling_lane;
pub mod graph_lane;
pub mod render_lane;
pub mod resource_lane;

pub use buffer::MIN_UNIFORM_ALIGNMENT;
