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

use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::LatencyConfig;
use crate::engine::{Engine, JobReport};

/// Drives an [`Engine`] on tokio with a simulated delay between jobs
///
/// Every scheduled continuation captures a generation number. Scheduling a new
/// continuation or pausing bumps the generation, so an older continuation that
/// wakes up later does nothing: it neither pops nor executes a job.
#[derive(Debug, Clone)]
pub struct EngineRunner {
    engine: Arc<Mutex<Engine>>,
    generation: Arc<AtomicU64>,
    latency: LatencyConfig,
}

impl EngineRunner {
    pub fn new(engine: Engine) -> Self {
        let latency = engine.config().latency;
        Self::with_latency(Arc::new(Mutex::new(engine)), latency)
    }

    pub fn with_latency(engine: Arc<Mutex<Engine>>, latency: LatencyConfig) -> Self {
        Self {
            engine,
            generation: Arc::new(AtomicU64::new(0)),
            latency,
        }
    }

    pub fn engine(&self) -> &Arc<Mutex<Engine>> {
        &self.engine
    }

    /// Waits for the next job's latency, then runs it unless superseded.
    pub async fn run_one_delayed(&self) -> Option<JobReport> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tokio::time::sleep(self.next_delay()).await;

        let mut engine = self.engine.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(generation, "Dropping stale continuation");
            return None;
        }
        engine.run_one()
    }

    /// Runs jobs back to back until none is runnable or [`EngineRunner::pause`]
    /// is called. The task resolves to the number of jobs executed.
    pub fn start(&self) -> JoinHandle<usize> {
        let runner = self.clone();
        tokio::spawn(async move {
            let mut executed = 0;
            while let Some(report) = runner.run_one_delayed().await {
                executed += 1;
                if report.completed {
                    info!(query = %report.job.query_id, "Query finished");
                }
            }
            debug!(executed, "Runner stopped");
            executed
        })
    }

    /// Invalidates the pending continuation.
    pub fn pause(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn next_delay(&self) -> Duration {
        let first_block = self.engine.lock().queue().peek().is_some_and(|job| job.index == 0);
        if first_block {
            return self.latency.initial();
        }

        let mean = self.latency.mean_ms as i64;
        let jitter = self.latency.jitter_ms as i64;
        let offset = if jitter > 0 { rand::thread_rng().gen_range(-jitter..=jitter) } else { 0 };
        Duration::from_millis((mean + offset).max(0) as u64)
    }
}
