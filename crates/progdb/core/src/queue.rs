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

use tracing::debug;

use crate::ids::QueryId;
use crate::job::Job;
use crate::scheduler::{Scheduler, SchedulerKind, SchedulingContext};

/// Pending jobs, kept in the order chosen by the current scheduler
///
/// Every mutation other than [`Queue::pop`] re-applies the scheduler. Popping
/// takes the head as is, so round-robin rounds are not recomputed mid-round.
#[derive(Debug)]
pub struct Queue {
    jobs: Vec<Job>,
    scheduler: Box<dyn Scheduler>,
    context: SchedulingContext,
}

impl Queue {
    pub fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            jobs: Vec::new(),
            scheduler,
            context: SchedulingContext::default(),
        }
    }

    pub fn append(&mut self, job: Job) {
        self.jobs.push(job);
        self.reschedule();
    }

    pub fn extend(&mut self, jobs: impl IntoIterator<Item = Job>) {
        self.jobs.extend(jobs);
        self.reschedule();
    }

    /// Drops every pending job of `query`, returning how many were removed.
    pub fn remove_query(&mut self, query: QueryId) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| job.query_id != query);
        self.context.paused.remove(&query);
        self.context.order.retain(|&q| q != query);
        self.reschedule();
        before - self.jobs.len()
    }

    pub fn set_priority_order(&mut self, order: Vec<QueryId>) {
        self.context.order = order;
        self.reschedule();
    }

    pub fn set_paused(&mut self, query: QueryId, paused: bool) {
        if paused {
            self.context.paused.insert(query);
        } else {
            self.context.paused.remove(&query);
        }
        self.reschedule();
    }

    pub fn set_scheduler(&mut self, scheduler: Box<dyn Scheduler>) {
        debug!(from = %self.scheduler.kind(), to = %scheduler.kind(), "Switching scheduler");
        self.scheduler = scheduler;
        self.reschedule();
    }

    pub fn reschedule(&mut self) {
        self.scheduler.schedule(&mut self.jobs, &self.context);
    }

    pub fn peek(&self) -> Option<&Job> {
        self.jobs.first()
    }

    /// Takes the next runnable job; `None` when the queue is empty or the head
    /// belongs to a paused query.
    pub fn pop(&mut self) -> Option<Job> {
        let head = self.jobs.first()?;
        if self.context.is_paused(head.query_id) {
            return None;
        }
        Some(self.jobs.remove(0))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn context(&self) -> &SchedulingContext {
        &self.context
    }

    pub fn scheduler_kind(&self) -> SchedulerKind {
        self.scheduler.kind()
    }
}
