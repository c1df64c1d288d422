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

//! Math primitives used by culling and batching.
//!
//! Vectors and matrices come from `glam`; this module only adds the bounding
//! volumes and the view frustum the renderer needs on top of it.

pub mod bounds;
pub mod frustum;

pub use bounds::{Aabb, BoundingSphere, BoundingVolume};
pub use frustum::{Frustum, Plane};
pub use glam::{Mat4, Vec2, Vec3, Vec4};
