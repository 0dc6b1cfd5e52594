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
use std::fmt;

/// Identifier of a registered query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub u64);

/// Identifier of a job (one block of one query)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "J{}", self.0)
    }
}

/// Hands out query and job ids for one engine.
///
/// Ids start at 1 and increase monotonically until [`IdAllocator::reset`].
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next_query: u64,
    next_job: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next_query: 1, next_job: 1 }
    }

    pub fn next_query_id(&mut self) -> QueryId {
        let id = QueryId(self.next_query);
        self.next_query += 1;
        id
    }

    pub fn next_job_id(&mut self) -> JobId {
        let id = JobId(self.next_job);
        self.next_job += 1;
        id
    }

    /// Makes sure future query ids are greater than `id`.
    pub fn observe_query_id(&mut self, id: QueryId) {
        self.next_query = self.next_query.max(id.0 + 1);
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
