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

use std::collections::HashMap;
use std::fmt;

use crate::accumulator::AggregateValue;
use crate::dataset::Dataset;
use crate::field::GroupKey;
use crate::ids::{JobId, QueryId};
use crate::query::Query;

/// Unit of work: process one sample block of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Job {
    pub id: JobId,
    pub query_id: QueryId,
    /// Index of the sample block within the query's plan
    pub index: usize,
}

/// Per-group partials produced by running one job
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub job_id: JobId,
    pub query_id: QueryId,
    pub block_index: usize,
    /// Number of rows in the block, before filtering
    pub rows: usize,
    pub partials: HashMap<GroupKey, AggregateValue>,
}

impl Job {
    pub fn new(id: JobId, query_id: QueryId, index: usize) -> Self {
        Self { id, query_id, index }
    }

    /// Scans the job's block: filters each row, groups it and folds its target
    /// value into the group's partial. Count-only queries fold a unit per row.
    pub fn run(&self, query: &Query, dataset: &Dataset) -> JobOutput {
        let definition = query.definition();
        let kind = definition.accumulator;
        let mut partials: HashMap<GroupKey, AggregateValue> = HashMap::new();

        let row_indices = query.block(self.index).map(|b| b.row_indices.as_slice()).unwrap_or_default();

        for row in row_indices.iter().filter_map(|&i| dataset.row(i)) {
            if !definition.predicate.test(row) {
                continue;
            }

            let key = definition.group_by.group(row);
            let value = match &definition.target {
                Some(target) => target.value(row).as_f64(),
                None => Some(1.0),
            };

            let partial = partials.entry(key).or_insert_with(|| kind.init_partial_value());
            *partial = kind.reduce(*partial, value);
        }

        JobOutput {
            job_id: self.id,
            query_id: self.query_id,
            block_index: self.index,
            rows: row_indices.len(),
            partials,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}#{})", self.id, self.query_id, self.index)
    }
}
