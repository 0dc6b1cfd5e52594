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
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::ids::QueryId;
use crate::job::Job;

/// Ordering inputs shared by every scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulingContext {
    /// Ongoing queries, highest priority first
    pub order: Vec<QueryId>,
    pub paused: HashSet<QueryId>,
}

impl SchedulingContext {
    /// Position of `query` in the priority order; unknown queries rank last.
    pub fn rank(&self, query: QueryId) -> usize {
        self.order.iter().position(|&q| q == query).unwrap_or(self.order.len())
    }

    pub fn is_paused(&self, query: QueryId) -> bool {
        self.paused.contains(&query)
    }
}

/// Orders pending jobs. Implementations are pure functions of the jobs and the
/// context and must sort stably.
pub trait Scheduler: fmt::Debug + Send + Sync {
    fn schedule(&self, jobs: &mut [Job], context: &SchedulingContext);
    fn kind(&self) -> SchedulerKind;
}

/// Runs the highest priority query to completion before the next one.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOrderScheduler;

impl Scheduler for QueryOrderScheduler {
    fn schedule(&self, jobs: &mut [Job], context: &SchedulingContext) {
        jobs.sort_by_key(|job| (context.is_paused(job.query_id), context.rank(job.query_id), job.index));
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::QueryOrder
    }
}

/// Interleaves queries block by block, in priority order within each round.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinScheduler;

impl Scheduler for RoundRobinScheduler {
    fn schedule(&self, jobs: &mut [Job], context: &SchedulingContext) {
        let mut first_pending: HashMap<QueryId, usize> = HashMap::new();
        for job in jobs.iter() {
            first_pending.entry(job.query_id).and_modify(|min| *min = (*min).min(job.index)).or_insert(job.index);
        }

        jobs.sort_by_key(|job| {
            let round = job.index - first_pending.get(&job.query_id).copied().unwrap_or(job.index);
            (context.is_paused(job.query_id), round, context.rank(job.query_id))
        });
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::RoundRobin
    }
}

/// Runs jobs in creation order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoScheduler;

impl Scheduler for FifoScheduler {
    fn schedule(&self, jobs: &mut [Job], context: &SchedulingContext) {
        jobs.sort_by_key(|job| (context.is_paused(job.query_id), job.id));
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Fifo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchedulerKind {
    #[default]
    QueryOrder,
    RoundRobin,
    Fifo,
}

impl SchedulerKind {
    pub fn build(&self) -> Box<dyn Scheduler> {
        match self {
            Self::QueryOrder => Box::new(QueryOrderScheduler),
            Self::RoundRobin => Box::new(RoundRobinScheduler),
            Self::Fifo => Box::new(FifoScheduler),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryOrder => "QueryOrder",
            Self::RoundRobin => "RoundRobin",
            Self::Fifo => "Fifo",
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SchedulerKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::QueryOrder, Self::RoundRobin, Self::Fifo].into_iter().find(|kind| kind.name().eq_ignore_ascii_case(s)).ok_or_else(|| EngineError::UnknownKind {
            category: "scheduler",
            kind: s.to_string(),
        })
    }
}
