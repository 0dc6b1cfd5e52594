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

//! Progressive approximate aggregation engine
//!
//! Registers grouped aggregate queries over a row-oriented [`Dataset`], splits
//! the rows into sample blocks, schedules one job per block across all ongoing
//! queries and folds block partials into running statistics. At any point a
//! query can turn its statistics into [`ApproximatedInterval`]s that account
//! for the fraction of the data processed so far.

pub mod accumulator;
pub mod approx;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod field;
pub mod ids;
pub mod job;
pub mod predicate;
pub mod query;
pub mod queue;
pub mod runner;
pub mod sampler;
pub mod scheduler;
pub mod schema;
pub mod shape;

pub use accumulator::{AccumulatorKind, AggregateValue};
pub use approx::{ApproximatedInterval, ConfidenceInterval, approximate};
pub use config::{EngineConfig, LatencyConfig};
pub use dataset::{Dataset, Row};
pub use engine::{Engine, JobReport, Priority};
pub use error::{EngineError, EngineResult};
pub use field::{Field, FieldRef, GroupBy, GroupId, GroupKey, GroupValue};
pub use ids::{IdAllocator, JobId, QueryId};
pub use job::{Job, JobOutput};
pub use predicate::{AndPredicate, EqualPredicate, Predicate, RangePredicate};
pub use query::{Progress, Query, QueryDefinition, QueryState, QueryTemplate};
pub use queue::Queue;
pub use runner::EngineRunner;
pub use sampler::{SampleBlock, Sampler, SamplerSpec, UniformNumBlocksSampler, UniformRandomSampler};
pub use scheduler::{FifoScheduler, QueryOrderScheduler, RoundRobinScheduler, Scheduler, SchedulerKind, SchedulingContext};
pub use schema::{ColumnSchema, Schema};
pub use shape::{BoundQuery, PredicateShape, QueryShape, QueueShape};
