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

//! Orchestrates queries over one dataset: registration, job scheduling and
//! folding of block results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::EngineConfig;
use crate::dataset::Dataset;
use crate::error::{EngineError, EngineResult};
use crate::ids::{IdAllocator, QueryId};
use crate::job::Job;
use crate::predicate::AndPredicate;
use crate::query::{Progress, Query, QueryDefinition, QueryState};
use crate::queue::Queue;
use crate::sampler::Sampler;
use crate::scheduler::{Scheduler, SchedulerKind};
use crate::shape::QueueShape;

/// Where a newly requested query enters the ongoing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    Highest,
    #[default]
    Lowest,
}

impl FromStr for Priority {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "highest" => Ok(Self::Highest),
            "lowest" => Ok(Self::Lowest),
            _ => Err(EngineError::UnknownKind {
                category: "priority",
                kind: s.to_string(),
            }),
        }
    }
}

/// Outcome of executing one job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobReport {
    pub job: Job,
    pub progress: Progress,
    /// Whether this job completed its query
    pub completed: bool,
}

pub type JobDoneCallback = Box<dyn FnMut(&Query) + Send>;

pub struct Engine {
    dataset: Arc<Dataset>,
    config: EngineConfig,
    sampler: Arc<dyn Sampler>,
    queue: Queue,
    ids: IdAllocator,
    ongoing: Vec<Query>,
    completed: Vec<Query>,
    on_job_done: Option<JobDoneCallback>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("dataset", &self.dataset.name())
            .field("sampler", &self.sampler)
            .field("queue", &self.queue)
            .field("ongoing", &self.ongoing.len())
            .field("completed", &self.completed.len())
            .finish()
    }
}

impl Engine {
    pub fn new(dataset: Arc<Dataset>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let sampler = config.sampler.build()?;
        let queue = Queue::new(config.scheduler.build());

        info!(dataset = dataset.name(), rows = dataset.len(), scheduler = %config.scheduler, "Created engine");

        Ok(Self {
            dataset,
            config,
            sampler,
            queue,
            ids: IdAllocator::new(),
            ongoing: Vec::new(),
            completed: Vec::new(),
            on_job_done: None,
        })
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Validates `definition` and plans its sample blocks under a fresh id.
    pub fn create_query(&mut self, definition: QueryDefinition) -> EngineResult<Query> {
        let id = self.ids.next_query_id();
        Query::new(id, definition, self.dataset.len(), self.sampler.as_ref())
    }

    /// Registers `query` and enqueues one job per block. Queries without
    /// blocks complete immediately.
    #[instrument(skip(self, query), fields(query = %query.id()))]
    pub fn request(&mut self, query: Query, priority: Priority) -> QueryId {
        let id = query.id();

        if query.is_done() {
            info!("Query has no blocks, completed on registration");
            self.completed.push(query);
            return id;
        }

        let jobs = query.jobs(&mut self.ids);
        let paused = query.is_paused();
        debug!(jobs = jobs.len(), ?priority, "Requesting query");

        match priority {
            Priority::Highest => self.ongoing.insert(0, query),
            Priority::Lowest => self.ongoing.push(query),
        }

        self.queue.set_priority_order(self.ongoing_ids());
        if paused {
            self.queue.set_paused(id, true);
        }
        self.queue.extend(jobs);
        id
    }

    /// Creates and requests a query at the configured default priority.
    pub fn submit(&mut self, definition: QueryDefinition) -> EngineResult<QueryId> {
        let query = self.create_query(definition)?;
        Ok(self.request(query, self.config.default_priority))
    }

    pub fn pop_job(&mut self) -> Option<Job> {
        let job = self.queue.pop()?;
        if let Some(query) = self.ongoing.iter_mut().find(|q| q.id() == job.query_id) {
            query.start_block();
        }
        Some(job)
    }

    /// Runs `job` and folds its output. Returns `None` when the job's query
    /// is no longer registered.
    pub fn execute(&mut self, job: Job) -> Option<JobReport> {
        let Some(position) = self.ongoing.iter().position(|q| q.id() == job.query_id) else {
            debug!(job = %job, "Skipping job of a removed query");
            return None;
        };

        let query = &mut self.ongoing[position];
        let output = job.run(query, &self.dataset);
        query.accumulate(output);

        if let Some(callback) = self.on_job_done.as_mut() {
            callback(query);
        }

        let progress = query.progress();
        let completed = query.is_done();
        debug!(job = %job, processed = progress.processed_blocks, total = progress.total_blocks, "Executed job");

        if completed {
            let query = self.ongoing.remove(position);
            info!(query = %query.id(), desc = %query.desc(), "Query completed");
            self.completed.push(query);
            self.queue.set_priority_order(self.ongoing_ids());
        }

        Some(JobReport { job, progress, completed })
    }

    pub fn run_one(&mut self) -> Option<JobReport> {
        let job = self.pop_job()?;
        self.execute(job)
    }

    /// Runs jobs until nothing is runnable; returns the number executed.
    pub fn run_all(&mut self) -> usize {
        let mut executed = 0;
        while let Some(job) = self.pop_job() {
            if self.execute(job).is_some() {
                executed += 1;
            }
        }
        executed
    }

    /// Unregisters a query, ongoing or completed, and drops its pending jobs.
    #[instrument(skip(self))]
    pub fn remove(&mut self, id: QueryId) -> EngineResult<Query> {
        let purged = self.queue.remove_query(id);

        if let Some(position) = self.ongoing.iter().position(|q| q.id() == id) {
            let query = self.ongoing.remove(position);
            self.queue.set_priority_order(self.ongoing_ids());
            debug!(purged, "Removed ongoing query");
            return Ok(query);
        }

        match self.completed.iter().position(|q| q.id() == id) {
            Some(position) => Ok(self.completed.remove(position)),
            None => Err(EngineError::QueryNotFound(id)),
        }
    }

    pub fn pause(&mut self, id: QueryId) -> EngineResult<()> {
        self.ongoing_mut(id)?.pause();
        self.queue.set_paused(id, true);
        Ok(())
    }

    pub fn resume(&mut self, id: QueryId) -> EngineResult<()> {
        self.ongoing_mut(id)?.resume();
        self.queue.set_paused(id, false);
        Ok(())
    }

    /// Moves the listed queries to the front, in list order. Unlisted queries
    /// keep their relative order after them; unknown ids are ignored.
    pub fn reorder_ongoing_queries(&mut self, order: &[QueryId]) {
        let mut rest = std::mem::take(&mut self.ongoing);
        let mut reordered = Vec::with_capacity(rest.len());

        for id in order {
            if let Some(position) = rest.iter().position(|q| q.id() == *id) {
                reordered.push(rest.remove(position));
            }
        }
        reordered.append(&mut rest);

        self.ongoing = reordered;
        self.queue.set_priority_order(self.ongoing_ids());
    }

    /// Re-applies the scheduler, switching to `scheduler` first when given.
    pub fn reschedule(&mut self, scheduler: Option<Box<dyn Scheduler>>) {
        match scheduler {
            Some(scheduler) => self.queue.set_scheduler(scheduler),
            None => self.queue.reschedule(),
        }
    }

    pub fn scheduler_kind(&self) -> SchedulerKind {
        self.queue.scheduler_kind()
    }

    pub fn set_on_job_done(&mut self, callback: impl FnMut(&Query) + Send + 'static) {
        self.on_job_done = Some(Box::new(callback));
    }

    pub fn clear_on_job_done(&mut self) {
        self.on_job_done = None;
    }

    /// Ongoing queries, highest priority first
    pub fn ongoing(&self) -> &[Query] {
        &self.ongoing
    }

    pub fn completed(&self) -> &[Query] {
        &self.completed
    }

    pub fn query(&self, id: QueryId) -> Option<&Query> {
        self.ongoing.iter().chain(&self.completed).find(|q| q.id() == id)
    }

    pub fn select(&self, predicate: &AndPredicate, indices: Option<&[usize]>) -> Vec<usize> {
        self.dataset.select(predicate, indices)
    }

    pub fn queue_shape(&self) -> QueueShape {
        QueueShape {
            mode: self.queue.scheduler_kind().to_string(),
            queries: self.ongoing.iter().enumerate().map(|(order, q)| q.to_shape(order)).collect(),
        }
    }

    /// Replaces the ongoing queries with those of `shape`, keeping their ids.
    /// Blocks are re-planned, so restored queries start from scratch.
    #[instrument(skip(self, shape), fields(mode = %shape.mode, queries = shape.queries.len()))]
    pub fn restore_queue_shape(&mut self, shape: &QueueShape) -> EngineResult<Vec<QueryId>> {
        let scheduler = shape.scheduler_kind()?;

        let mut shapes: Vec<_> = shape.queries.iter().collect();
        shapes.sort_by_key(|q| q.order);
        let bound = shapes.into_iter().map(|q| q.bind(&self.dataset)).collect::<EngineResult<Vec<_>>>()?;

        for query in std::mem::take(&mut self.ongoing) {
            self.queue.remove_query(query.id());
        }
        self.queue.set_scheduler(scheduler.build());

        let mut restored = Vec::with_capacity(bound.len());
        for b in bound {
            self.ids.observe_query_id(b.id);
            let mut query = Query::new(b.id, b.definition, self.dataset.len(), self.sampler.as_ref())?;
            if b.state == QueryState::Paused {
                query.pause();
            }
            restored.push(self.request(query, Priority::Lowest));
        }

        info!(restored = restored.len(), "Restored queue");
        Ok(restored)
    }

    pub fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    /// Drops every query and pending job and restarts id allocation.
    pub fn reset(&mut self) {
        self.ongoing.clear();
        self.completed.clear();
        self.queue = Queue::new(self.queue.scheduler_kind().build());
        self.ids.reset();
    }

    fn ongoing_ids(&self) -> Vec<QueryId> {
        self.ongoing.iter().map(Query::id).collect()
    }

    fn ongoing_mut(&mut self, id: QueryId) -> EngineResult<&mut Query> {
        self.ongoing.iter_mut().find(|q| q.id() == id).ok_or(EngineError::QueryNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SamplerSpec;
    use serde_json::json;

    fn engine(num_blocks: usize) -> Engine {
        let rows: Vec<serde_json::Value> = (0..40)
            .map(|i| {
                let city = if i % 2 == 0 { "a" } else { "b" };
                json!({"city": city, "price": i as f64 + 0.25})
            })
            .collect();
        let rows = serde_json::Value::Array(rows);
        let dataset = Dataset::from_json("t", &rows, None, 10).unwrap();
        let config = EngineConfig {
            sampler: SamplerSpec::UniformNumBlocks { num_blocks },
            ..Default::default()
        };
        Engine::new(Arc::new(dataset), config).unwrap()
    }

    fn count_by_city(engine: &Engine) -> QueryDefinition {
        let city = engine.dataset().field("city").unwrap();
        QueryDefinition::count(vec![city])
    }

    #[test]
    fn test_request_and_run_all() {
        let mut engine = engine(4);
        let definition = count_by_city(&engine);
        let id = engine.submit(definition).unwrap();
        assert_eq!(engine.queue().len(), 4);

        assert_eq!(engine.run_all(), 4);
        assert!(engine.ongoing().is_empty());
        let query = engine.query(id).unwrap();
        assert!(query.is_done());
        assert_eq!(query.result().values().map(|v| v.count).sum::<u64>(), 40);
        assert!(engine.run_one().is_none());
    }

    #[test]
    fn test_priority_placement() {
        let mut engine = engine(2);
        let a = engine.submit(count_by_city(&engine)).unwrap();
        let query = engine.create_query(count_by_city(&engine)).unwrap();
        let b = engine.request(query, Priority::Highest);
        assert_eq!(engine.ongoing().iter().map(Query::id).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(engine.queue().peek().map(|j| j.query_id), Some(b));
    }

    #[test]
    fn test_reorder_ongoing_queries() {
        let mut engine = engine(2);
        let ids: Vec<QueryId> = (0..4).map(|_| engine.submit(count_by_city(&engine)).unwrap()).collect();
        engine.reorder_ongoing_queries(&[ids[2], QueryId(99), ids[0]]);
        let order: Vec<QueryId> = engine.ongoing().iter().map(Query::id).collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[1], ids[3]]);
        assert_eq!(engine.queue().context().order, order);
    }

    #[test]
    fn test_remove_and_missing_queries() {
        let mut engine = engine(2);
        let id = engine.submit(count_by_city(&engine)).unwrap();
        let job = engine.pop_job().unwrap();
        engine.remove(id).unwrap();
        assert!(engine.queue().is_empty());
        assert!(engine.execute(job).is_none());
        assert!(matches!(engine.remove(id), Err(EngineError::QueryNotFound(_))));
        assert!(matches!(engine.pause(id), Err(EngineError::QueryNotFound(_))));
    }

    #[test]
    fn test_queue_shape_round_trip() {
        let mut engine = engine(2);
        let a = engine.submit(count_by_city(&engine)).unwrap();
        let b = engine.submit(count_by_city(&engine)).unwrap();
        engine.pause(b).unwrap();
        engine.reschedule(Some(SchedulerKind::RoundRobin.build()));

        let shape = engine.queue_shape();
        assert_eq!(shape.mode, "RoundRobin");
        assert_eq!(shape.queries[1].state, QueryState::Paused);

        let mut other = self::engine(2);
        let restored = other.restore_queue_shape(&shape).unwrap();
        assert_eq!(restored, vec![a, b]);
        assert_eq!(other.scheduler_kind(), SchedulerKind::RoundRobin);
        assert!(other.query(b).unwrap().is_paused());
        assert!(other.submit(count_by_city(&other)).unwrap() > b);
    }

    #[test]
    fn test_reset() {
        let mut engine = engine(2);
        engine.submit(count_by_city(&engine)).unwrap();
        engine.reset();
        assert!(engine.ongoing().is_empty());
        assert!(engine.queue().is_empty());
        assert_eq!(engine.submit(count_by_city(&engine)).unwrap(), QueryId(1));
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!("Highest".parse::<Priority>().unwrap(), Priority::Highest);
        assert!(matches!("urgent".parse::<Priority>(), Err(EngineError::UnknownKind { category: "priority", .. })));
    }
}
