// Copyright 2024 Saptak Santra
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

//! World construction options, read once at startup.

/// Behaviour switches fixed at [`World`](crate::world::World) construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcsConfig {
    /// Validate every public-call argument and fail fast on bad input.
    /// When off, stale handles and out-of-range component ids become
    /// silent no-ops; internal invariant violations still surface.
    pub debug_mode: bool,

    /// Collect per-operation latency at public boundaries. No functional
    /// effect.
    pub profiling_mode: bool,
}

impl EcsConfig {
    /// Read configuration from `MASK_ECS_DEBUG` / `MASK_ECS_PROFILING`.
    ///
    /// Unset variables fall back to `cfg!(debug_assertions)` for debug mode
    /// and `false` for profiling.
    pub fn from_env() -> Self {
        Self {
            debug_mode: env_flag("MASK_ECS_DEBUG").unwrap_or(cfg!(debug_assertions)),
            profiling_mode: env_flag("MASK_ECS_PROFILING").unwrap_or(false),
        }
    }

    pub fn with_debug(mut self, on: bool) -> Self {
        self.debug_mode = on;
        self
    }

    pub fn with_profiling(mut self, on: bool) -> Self {
        self.profiling_mode = on;
        self
    }
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            debug_mode: cfg!(debug_assertions),
            profiling_mode: false,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
