// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::Priority;
use crate::error::{EngineError, EngineResult};
use crate::field::DEFAULT_NUM_BINS;
use crate::sampler::SamplerSpec;
use crate::scheduler::SchedulerKind;

/// Simulated delay between consecutive jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Delay before the first block of a query
    pub initial_ms: u64,
    pub mean_ms: u64,
    /// Uniform jitter applied around `mean_ms`
    pub jitter_ms: u64,
}

impl LatencyConfig {
    pub const ZERO: LatencyConfig = LatencyConfig {
        initial_ms: 0,
        mean_ms: 0,
        jitter_ms: 0,
    };

    pub fn initial(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            initial_ms: 100,
            mean_ms: 50,
            jitter_ms: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sampler: SamplerSpec,
    pub scheduler: SchedulerKind,
    pub default_priority: Priority,
    pub latency: LatencyConfig,
    /// Approximate bin count for inferred quantitative fields
    pub default_num_bins: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerSpec::default(),
            scheduler: SchedulerKind::default(),
            default_priority: Priority::Lowest,
            latency: LatencyConfig::default(),
            default_num_bins: DEFAULT_NUM_BINS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        self.sampler.build()?;

        if self.default_num_bins == 0 {
            return Err(EngineError::InvalidConfig("default_num_bins must be positive".to_string()));
        }
        if self.latency.jitter_ms > self.latency.mean_ms {
            return Err(EngineError::InvalidConfig(format!(
                "latency jitter ({}ms) must not exceed the mean latency ({}ms)",
                self.latency.jitter_ms, self.latency.mean_ms
            )));
        }

        Ok(())
    }
}
