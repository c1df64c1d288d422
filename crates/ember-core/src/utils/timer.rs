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

//! A minimal stopwatch used by profilers and scoped timers.

use std::time::{Duration, Instant};

/// Measures wall-clock time since it was started.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Option<Instant>,
}

impl Stopwatch {
    /// Creates a stopwatch that is already running.
    pub fn new() -> Self {
        Self {
            start: Some(Instant::now()),
        }
    }

    /// Restarts the measurement from now.
    pub fn restart(&mut self) {
        self.start = Some(Instant::now());
    }

    /// Returns the elapsed duration, or `None` if the stopwatch never started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.start.map(|start| start.elapsed())
    }

    /// Returns the elapsed time in seconds.
    pub fn elapsed_secs_f64(&self) -> Option<f64> {
        self.elapsed().map(|d| d.as_secs_f64())
    }

    /// Returns the elapsed time in milliseconds.
    pub fn elapsed_ms_f64(&self) -> Option<f64> {
        self.elapsed_secs_f64().map(|secs| secs * 1000.0)
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
