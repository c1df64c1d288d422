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

use crate::renderer::api::{TextureFormat, TextureViewId};
use crate::renderer::error::RenderError;
use std::fmt::Debug;

/// A back buffer acquired from a [`SwapChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainFrame {
    /// View to render into.
    pub view: TextureViewId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A presentable chain of back buffers.
pub trait SwapChain: Send + Sync + Debug {
    /// Acquires the next back buffer.
    fn acquire(&self) -> Result<SwapChainFrame, RenderError>;

    /// Presents a frame previously returned by `acquire`.
    fn present(&self, frame: SwapChainFrame) -> Result<(), RenderError>;

    /// Reconfigures the back buffers for a new size.
    fn resize(&self, width: u32, height: u32);

    /// Texel format of the back buffers.
    fn format(&self) -> TextureFormat;

    /// Enables or disables vertical sync.
    fn set_vsync(&self, enabled: bool);
}
