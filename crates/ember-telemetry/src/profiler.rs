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

//! A CPU-side profiler keeping a short history of each named block.

use ember_core::renderer::FrameProfiler;
use ember_core::Stopwatch;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Samples kept per block.
pub const SAMPLE_COUNT: usize = 10;

/// The timing summary of one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTiming {
    /// Block name, usually a pass name.
    pub name: String,
    /// Most recent duration in milliseconds.
    pub last_ms: f64,
    /// Mean of the kept samples in milliseconds.
    pub average_ms: f64,
}

#[derive(Debug, Default)]
struct ProfilerState {
    open: HashMap<String, Stopwatch>,
    samples: HashMap<String, VecDeque<f64>>,
    // First-seen order, so timings list passes in execution order.
    order: Vec<String>,
    frames: u64,
}

/// Measures wall-clock time of named blocks with a ring buffer of
/// [`SAMPLE_COUNT`] samples per block.
#[derive(Debug, Default)]
pub struct CpuProfiler {
    state: Mutex<ProfilerState>,
}

impl CpuProfiler {
    /// Creates an empty profiler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `name` and closes it when the returned guard drops.
    pub fn scope<'a>(&'a self, name: &'a str) -> ScopedBlock<'a> {
        self.begin(name);
        ScopedBlock {
            profiler: self,
            name,
        }
    }

    /// Timings of every block seen so far, in first-seen order.
    pub fn timings(&self) -> Vec<BlockTiming> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        state
            .order
            .iter()
            .filter_map(|name| {
                let samples = state.samples.get(name)?;
                let last_ms = *samples.back()?;
                let average_ms = samples.iter().sum::<f64>() / samples.len() as f64;
                Some(BlockTiming {
                    name: name.clone(),
                    last_ms,
                    average_ms,
                })
            })
            .collect()
    }

    /// Timing of a single block.
    pub fn timing(&self, name: &str) -> Option<BlockTiming> {
        self.timings().into_iter().find(|t| t.name == name)
    }

    /// Number of frames closed with `end_frame`.
    pub fn frame_count(&self) -> u64 {
        self.state.lock().map(|s| s.frames).unwrap_or(0)
    }
}

impl FrameProfiler for CpuProfiler {
    fn begin(&self, block: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.open.insert(block.to_string(), Stopwatch::new());
        }
    }

    fn end(&self, block: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let Some(stopwatch) = state.open.remove(block) else {
            log::warn!("[CpuProfiler] end('{block}') without a matching begin");
            return;
        };
        let elapsed = stopwatch.elapsed_ms_f64().unwrap_or(0.0);
        if !state.samples.contains_key(block) {
            state.order.push(block.to_string());
        }
        let samples = state.samples.entry(block.to_string()).or_default();
        if samples.len() == SAMPLE_COUNT {
            samples.pop_front();
        }
        samples.push_back(elapsed);
    }

    fn end_frame(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.frames += 1;
            if !state.open.is_empty() {
                log::warn!(
                    "[CpuProfiler] {} block(s) left open at end of frame",
                    state.open.len()
                );
                state.open.clear();
            }
        }
    }
}

/// Closes a profiler block when dropped, even on early return.
pub struct ScopedBlock<'a> {
    profiler: &'a CpuProfiler,
    name: &'a str,
}

impl Drop for ScopedBlock<'_> {
    fn drop(&mut self) {
        self.profiler.end(self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_are_listed_in_first_seen_order() {
        let profiler = CpuProfiler::new();
        for name in ["DepthPrePass", "GBufferPass", "DepthPrePass"] {
            profiler.begin(name);
            profiler.end(name);
        }
        let names: Vec<_> = profiler.timings().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["DepthPrePass", "GBufferPass"]);
    }

    #[test]
    fn test_history_is_capped() {
        let profiler = CpuProfiler::new();
        for _ in 0..(SAMPLE_COUNT * 3) {
            let _block = profiler.scope("Frame");
        }
        let state = profiler.state.lock().unwrap();
        assert_eq!(state.samples["Frame"].len(), SAMPLE_COUNT);
    }

    #[test]
    fn test_unmatched_end_is_ignored() {
        let profiler = CpuProfiler::new();
        profiler.end("Nothing");
        assert!(profiler.timing("Nothing").is_none());
    }

    #[test]
    fn test_end_frame_counts_and_drops_open_blocks() {
        let profiler = CpuProfiler::new();
        profiler.begin("Leaked");
        profiler.end_frame();
        assert_eq!(profiler.frame_count(), 1);
        profiler.end("Leaked");
        assert!(profiler.timing("Leaked").is_none());
    }
}
