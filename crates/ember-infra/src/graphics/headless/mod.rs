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

//! A GPU-less implementation of the renderer contracts.
//!
//! Buffers keep their bytes in memory, command buffers are replayed on submit
//! (copies, clears, indirect argument resolution) and every draw and dispatch
//! is kept in an execution log that tests inspect.

mod command;
mod device;
mod swap_chain;

pub use command::{DrawKind, HeadlessCommandEncoder};
pub use device::{
    ExecutedDispatch, ExecutedDraw, HeadlessDevice, TextureContents, TextureInfo,
};
pub use swap_chain::HeadlessSwapChain;
