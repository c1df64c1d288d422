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

/// Receives named timing blocks around each render pass.
///
/// Blocks nest; `end` always closes the most recent `begin` with the same name.
pub trait FrameProfiler: Send + Sync {
    /// Called once before the first block of a frame.
    fn begin_frame(&self) {}

    /// Opens a block.
    fn begin(&self, block: &str);

    /// Closes a block.
    fn end(&self, block: &str);

    /// Called once after the last block of a frame.
    fn end_frame(&self) {}
}

/// A profiler that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProfiler;

impl FrameProfiler for NullProfiler {
    fn begin(&self, _block: &str) {}
    fn end(&self, _block: &str) {}
}
