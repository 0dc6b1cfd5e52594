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

//! Aggregate queries: definition, composition and cumulative results

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::accumulator::{AccumulatorKind, AggregateValue};
use crate::approx::{self, ApproximatedInterval};
use crate::error::{EngineError, EngineResult};
use crate::field::{FieldRef, GroupBy, GroupKey};
use crate::ids::{IdAllocator, QueryId};
use crate::job::{Job, JobOutput};
use crate::predicate::AndPredicate;
use crate::sampler::{SampleBlock, Sampler};
use crate::shape::QueryShape;

/// Maximum number of grouping fields of one query
pub const MAX_GROUPINGS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryState {
    #[default]
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub processed_blocks: usize,
    pub ongoing_blocks: usize,
    pub total_blocks: usize,
    pub processed_rows: usize,
    pub total_rows: usize,
}

impl Progress {
    pub fn done(&self) -> bool {
        self.processed_blocks >= self.total_blocks
    }

    /// Fraction of rows processed, in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total_rows == 0 {
            return 1.0;
        }
        self.processed_rows as f64 / self.total_rows as f64
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }
}

/// What a query computes, independent of its execution state
#[derive(Debug, Clone)]
pub struct QueryDefinition {
    pub accumulator: AccumulatorKind,
    pub target: Option<FieldRef>,
    pub group_by: GroupBy,
    pub predicate: AndPredicate,
}

impl QueryDefinition {
    pub fn new(accumulator: AccumulatorKind, target: Option<FieldRef>, group_by: GroupBy, predicate: AndPredicate) -> Self {
        Self {
            accumulator,
            target,
            group_by,
            predicate,
        }
    }

    /// COUNT of rows grouped by `fields`
    pub fn count(fields: Vec<FieldRef>) -> Self {
        Self::new(AccumulatorKind::Count, None, GroupBy::new(fields), AndPredicate::default())
    }

    pub fn with_predicate(mut self, predicate: AndPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        let fields = self.group_by.fields();
        if fields.len() > MAX_GROUPINGS {
            return Err(EngineError::TooManyGroupings {
                max: MAX_GROUPINGS,
                got: fields.len(),
            });
        }

        if let Some(target) = &self.target
            && !target.is_quantitative()
        {
            return Err(EngineError::InvalidTarget {
                field: target.name().to_string(),
                vl_type: target.vl_type(),
            });
        }

        if self.accumulator.requires_target() && self.target.is_none() {
            return Err(EngineError::MissingTarget(self.accumulator.to_string()));
        }

        for field in fields {
            let grouping_ok = if self.target.is_some() { field.is_categorical() } else { field.vl_type().is_groupable() };
            if !grouping_ok {
                return Err(EngineError::InvalidGrouping {
                    field: field.name().to_string(),
                    vl_type: field.vl_type(),
                });
            }
        }

        Ok(())
    }
}

impl fmt::Display for QueryDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{}({})", self.accumulator, target.name())?,
            None => write!(f, "{}(*)", self.accumulator)?,
        }

        let fields = self.group_by.fields();
        if !fields.is_empty() {
            let names: Vec<&str> = fields.iter().map(|field| field.name()).collect();
            write!(f, " group by {}", names.join(", "))?;
        }

        if !self.predicate.is_empty() {
            write!(f, " where {}", self.predicate)?;
        }

        Ok(())
    }
}

/// Query built up by adding fields one at a time
#[derive(Debug, Clone, Default)]
pub enum QueryTemplate {
    #[default]
    Empty,
    /// COUNT grouped by a binned quantitative field
    Histogram1D(FieldRef),
    /// COUNT grouped by a categorical field
    Frequency1D(FieldRef),
    Aggregate(QueryDefinition),
}

impl QueryTemplate {
    /// Adds `field` to the template; combinations with no sensible query give `Empty`.
    ///
    /// Beyond the quantitative pairings, a frequency template also accepts a
    /// second distinct categorical field and becomes a two-way COUNT table.
    pub fn combine(&self, field: &FieldRef) -> QueryTemplate {
        if field.vl_type().is_groupable() {
            match self {
                Self::Empty if field.is_quantitative() => return Self::Histogram1D(field.clone()),
                Self::Empty => return Self::Frequency1D(field.clone()),
                Self::Histogram1D(q) if field.is_categorical() => {
                    return Self::Aggregate(QueryDefinition::new(AccumulatorKind::Sum, Some(q.clone()), GroupBy::new(vec![field.clone()]), AndPredicate::default()));
                }
                Self::Frequency1D(c) if field.is_quantitative() => {
                    return Self::Aggregate(QueryDefinition::new(AccumulatorKind::Sum, Some(field.clone()), GroupBy::new(vec![c.clone()]), AndPredicate::default()));
                }
                Self::Frequency1D(c) if field.is_categorical() && c.name() != field.name() => {
                    return Self::Aggregate(QueryDefinition::count(vec![c.clone(), field.clone()]));
                }
                _ => {}
            }
        }

        Self::Empty
    }

    pub fn definition(&self) -> Option<QueryDefinition> {
        match self {
            Self::Empty => None,
            Self::Histogram1D(field) | Self::Frequency1D(field) => Some(QueryDefinition::count(vec![field.clone()])),
            Self::Aggregate(definition) => Some(definition.clone()),
        }
    }
}

/// A registered query with its sample plan and running results
#[derive(Debug)]
pub struct Query {
    id: QueryId,
    definition: QueryDefinition,
    blocks: Vec<SampleBlock>,
    result: HashMap<GroupKey, AggregateValue>,
    state: QueryState,
    progress: Progress,
}

impl Query {
    /// Validates `definition` and plans the sample blocks over `total_rows` rows.
    pub fn new(id: QueryId, definition: QueryDefinition, total_rows: usize, sampler: &dyn Sampler) -> EngineResult<Self> {
        definition.validate()?;

        let blocks = sampler.plan(total_rows);
        let progress = Progress {
            total_blocks: blocks.len(),
            total_rows,
            ..Default::default()
        };

        Ok(Self {
            id,
            definition,
            blocks,
            result: HashMap::new(),
            state: QueryState::Running,
            progress,
        })
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn blocks(&self) -> &[SampleBlock] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&SampleBlock> {
        self.blocks.get(index)
    }

    /// One job per sample block
    pub fn jobs(&self, ids: &mut IdAllocator) -> Vec<Job> {
        self.blocks.iter().map(|block| Job::new(ids.next_job_id(), self.id, block.index)).collect()
    }

    pub fn pause(&mut self) {
        self.state = QueryState::Paused;
    }

    pub fn resume(&mut self) {
        self.state = QueryState::Running;
    }

    pub fn is_paused(&self) -> bool {
        self.state == QueryState::Paused
    }

    pub fn is_done(&self) -> bool {
        self.progress.done()
    }

    pub(crate) fn start_block(&mut self) {
        self.progress.ongoing_blocks += 1;
    }

    /// Folds the partials of one processed block into the cumulative results.
    pub fn accumulate(&mut self, output: JobOutput) {
        if self.progress.done() {
            warn!(query = %self.id, block = output.block_index, "Ignoring block output for a completed query");
            return;
        }

        let kind = self.definition.accumulator;
        for (key, partial) in output.partials {
            let cumulative = self.result.entry(key).or_insert_with(|| kind.init_accumulated_value());
            *cumulative = kind.accumulate(*cumulative, partial);
        }

        self.progress.processed_blocks += 1;
        self.progress.ongoing_blocks = self.progress.ongoing_blocks.saturating_sub(1);
        self.progress.processed_rows = (self.progress.processed_rows + output.rows).min(self.progress.total_rows);
    }

    pub fn result(&self) -> &HashMap<GroupKey, AggregateValue> {
        &self.result
    }

    /// Cumulative results ordered by group ids
    pub fn result_list(&self) -> Vec<(GroupKey, AggregateValue)> {
        let mut list: Vec<(GroupKey, AggregateValue)> = self.result.iter().map(|(k, v)| (k.clone(), *v)).collect();
        list.sort_by_cached_key(|(key, _)| key.values().iter().map(|v| v.group_id).collect::<Vec<_>>());
        list
    }

    /// Estimate for the bucket `key`, using the processed row fraction.
    pub fn approximate(&self, key: &GroupKey) -> ApproximatedInterval {
        match self.result.get(key) {
            Some(value) => self.approximate_value(value),
            None => ApproximatedInterval::EMPTY,
        }
    }

    pub fn intervals(&self) -> Vec<(GroupKey, ApproximatedInterval)> {
        self.result_list().into_iter().map(|(key, value)| (key, self.approximate_value(&value))).collect()
    }

    fn approximate_value(&self, value: &AggregateValue) -> ApproximatedInterval {
        approx::approximate(
            self.definition.accumulator,
            value,
            self.progress.fraction(),
            self.progress.processed_rows as u64,
            self.progress.total_rows as u64,
        )
    }

    pub fn desc(&self) -> String {
        self.definition.to_string()
    }

    /// Wire shape of the query; `order` is its position among ongoing queries.
    pub fn to_shape(&self, order: usize) -> QueryShape {
        QueryShape {
            id: self.id,
            target: self.definition.target.as_ref().map(|t| t.name().to_string()),
            accumulator: self.definition.accumulator.name().to_string(),
            group_by: self.definition.group_by.fields().iter().map(|f| f.name().to_string()).collect(),
            predicate: (!self.definition.predicate.is_empty()).then(|| self.definition.predicate.to_shape()),
            state: self.state,
            order,
            progress: self.progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::field::Field;
    use crate::sampler::UniformNumBlocksSampler;
    use progdb_common::{DataType, Value, VlType};
    use std::sync::Arc;

    struct Fixture {
        city: FieldRef,
        sex: FieldRef,
        price: FieldRef,
        id: FieldRef,
    }

    fn fixture() -> Fixture {
        Fixture {
            city: Arc::new(Field::categorical("city", 0, DataType::String, VlType::Nominal, false)),
            sex: Arc::new(Field::categorical("sex", 1, DataType::String, VlType::Dozen, false)),
            price: Arc::new(Field::quantitative("price", 2, DataType::Real, 0.0, 100.0, 10, false)),
            id: Arc::new(Field::categorical("id", 3, DataType::String, VlType::Key, false)),
        }
    }

    #[test]
    fn test_combine() {
        let f = fixture();
        let empty = QueryTemplate::Empty;

        let histogram = empty.combine(&f.price);
        assert!(matches!(&histogram, QueryTemplate::Histogram1D(q) if q.name() == "price"));
        let sum = histogram.combine(&f.city).definition().unwrap();
        assert_eq!(sum.to_string(), "SUM(price) group by city");

        let frequency = empty.combine(&f.city);
        assert!(matches!(frequency, QueryTemplate::Frequency1D(_)));
        assert_eq!(frequency.definition().unwrap().to_string(), "COUNT(*) group by city");
        assert_eq!(frequency.combine(&f.price).definition().unwrap().to_string(), "SUM(price) group by city");
        assert_eq!(frequency.combine(&f.sex).definition().unwrap().to_string(), "COUNT(*) group by city, sex");

        assert!(matches!(frequency.combine(&f.city), QueryTemplate::Empty));
        assert!(matches!(histogram.combine(&f.price), QueryTemplate::Empty));
        assert!(matches!(empty.combine(&f.id), QueryTemplate::Empty));
        assert!(matches!(frequency.combine(&f.id), QueryTemplate::Empty));
        assert!(matches!(frequency.combine(&f.sex).combine(&f.price), QueryTemplate::Empty));
        assert!(empty.definition().is_none());
    }

    #[test]
    fn test_validation() {
        let f = fixture();
        let no_filter = AndPredicate::default;

        let bad_target = QueryDefinition::new(AccumulatorKind::Mean, Some(f.city.clone()), GroupBy::default(), no_filter());
        assert!(matches!(bad_target.validate(), Err(EngineError::InvalidTarget { .. })));

        let key_group = QueryDefinition::count(vec![f.id.clone()]);
        assert!(matches!(key_group.validate(), Err(EngineError::InvalidGrouping { .. })));

        let binned_with_target = QueryDefinition::new(AccumulatorKind::Sum, Some(f.price.clone()), GroupBy::new(vec![f.price.clone()]), no_filter());
        assert!(matches!(binned_with_target.validate(), Err(EngineError::InvalidGrouping { .. })));

        let missing = QueryDefinition::new(AccumulatorKind::Max, None, GroupBy::new(vec![f.city.clone()]), no_filter());
        assert!(matches!(missing.validate(), Err(EngineError::MissingTarget(_))));

        let too_many = QueryDefinition::count(vec![f.city.clone(), f.sex.clone(), f.price.clone()]);
        assert!(matches!(too_many.validate(), Err(EngineError::TooManyGroupings { max: 2, got: 3 })));

        assert!(QueryDefinition::count(vec![f.price.clone(), f.city.clone()]).validate().is_ok());
    }

    #[test]
    fn test_accumulate_and_approximate() {
        let f = fixture();
        let rows: Vec<Vec<Value>> = (0..10).map(|i| vec![Value::from(if i % 2 == 0 { "a" } else { "b" }), Value::from("m"), Value::Real(i as f64), Value::Null]).collect();
        let dataset = Dataset::new("t", vec![f.city.clone(), f.sex.clone(), f.price.clone(), f.id.clone()], rows);

        let definition = QueryDefinition::new(AccumulatorKind::Mean, Some(f.price.clone()), GroupBy::new(vec![f.city.clone()]), AndPredicate::default());
        let mut ids = IdAllocator::new();
        let sampler = UniformNumBlocksSampler::new(4).unwrap();
        let mut query = Query::new(ids.next_query_id(), definition, dataset.len(), &sampler).unwrap();
        assert_eq!(query.desc(), "MEAN(price) group by city");
        assert_eq!(query.progress().total_blocks, 4);

        let jobs = query.jobs(&mut ids);
        let mut last_count = 0;
        for job in &jobs {
            let output = job.run(&query, &dataset);
            query.accumulate(output);
            let count: u64 = query.result().values().map(|v| v.count).sum();
            assert!(count >= last_count);
            last_count = count;
        }

        assert!(query.is_done());
        assert_eq!(query.progress().processed_rows, 10);
        assert_eq!(last_count, 10);

        let intervals = query.intervals();
        assert_eq!(intervals.len(), 2);
        let (a_key, a) = &intervals[0];
        assert_eq!(a_key.to_string(), "city: a");
        assert_eq!(a.center, 4.0);
        assert_eq!(a.standard_error, 0.0);
        assert_eq!(query.approximate(a_key), *a);

        let extra = jobs[0].run(&query, &dataset);
        query.accumulate(extra);
        assert_eq!(query.progress().processed_blocks, 4);
    }

    #[test]
    fn test_zero_rows_is_done_immediately() {
        let f = fixture();
        let mut ids = IdAllocator::new();
        let sampler = UniformNumBlocksSampler::new(4).unwrap();
        let query = Query::new(ids.next_query_id(), QueryDefinition::count(vec![f.city]), 0, &sampler).unwrap();
        assert!(query.is_done());
        assert!(query.jobs(&mut ids).is_empty());
        assert!(query.intervals().is_empty());
    }

    #[test]
    fn test_pause_resume() {
        let f = fixture();
        let sampler = UniformNumBlocksSampler::new(1).unwrap();
        let mut query = Query::new(QueryId(1), QueryDefinition::count(vec![f.city]), 3, &sampler).unwrap();
        query.pause();
        assert_eq!(query.state(), QueryState::Paused);
        query.resume();
        assert!(!query.is_paused());
    }
}
