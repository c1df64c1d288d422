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

//! Visibility culling of instanced draws.
//!
//! A [`CullingContext`] collects every instance of a frame grouped by draw
//! type, a [`CullingManager`] mirrors it into device buffers and a
//! [`CullKernel`] compacts the visible instances and counts them into one
//! indirect draw record per type.

mod context;
mod error;
mod kernel;
mod manager;

pub use self::context::{CulledSet, CullingContext, CullingFlags, DrawTypeId};
pub use self::error::CullingError;
pub use self::kernel::{
    select_kernel, CpuCullKernel, CullJob, CullKernel, GpuCullKernel, CULL_WORKGROUP_SIZE,
};
pub use self::manager::{CullingBuffers, CullingManager};
