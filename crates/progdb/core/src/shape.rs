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

//! Serializable query and queue shapes for exchanging state with another
//! process. Kinds travel as strings and are checked when a shape is bound to
//! a dataset, so a malformed shape fails with [`EngineError::UnknownKind`].

use progdb_common::Value;
use serde::{Deserialize, Serialize};

use crate::accumulator::AccumulatorKind;
use crate::dataset::Dataset;
use crate::error::{EngineError, EngineResult};
use crate::field::GroupBy;
use crate::ids::QueryId;
use crate::predicate::{AndPredicate, EqualPredicate, Predicate, RangePredicate};
use crate::query::{Progress, QueryDefinition, QueryState};
use crate::scheduler::SchedulerKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateShape {
    /// `"equal"`, `"range"` or `"and"`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_end: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<PredicateShape>,
}

impl PredicateShape {
    fn empty(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            field: None,
            expected: None,
            start: None,
            end: None,
            include_end: None,
            predicates: Vec::new(),
        }
    }

    pub fn equal(field: &str, expected: Value) -> Self {
        Self {
            field: Some(field.to_string()),
            expected: Some(expected),
            ..Self::empty("equal")
        }
    }

    pub fn range(field: &str, start: f64, end: f64, include_end: bool) -> Self {
        Self {
            field: Some(field.to_string()),
            start: Some(start),
            end: Some(end),
            include_end: Some(include_end),
            ..Self::empty("range")
        }
    }

    pub fn and(predicates: Vec<PredicateShape>) -> Self {
        Self {
            predicates,
            ..Self::empty("and")
        }
    }

    /// Resolves field names against `dataset`; nested ANDs are flattened.
    pub fn bind(&self, dataset: &Dataset) -> EngineResult<AndPredicate> {
        let mut predicates = Vec::new();
        self.collect(dataset, &mut predicates)?;
        Ok(AndPredicate::new(predicates))
    }

    fn collect(&self, dataset: &Dataset, out: &mut Vec<Predicate>) -> EngineResult<()> {
        match self.kind.as_str() {
            "and" => {
                for child in &self.predicates {
                    child.collect(dataset, out)?;
                }
            }
            "equal" => {
                let field = dataset.field(self.require_field()?)?;
                let expected = self.expected.clone().unwrap_or_default().coerce(field.data_type())?;
                out.push(Predicate::Equal(EqualPredicate::new(field, expected)));
            }
            "range" => {
                let field = dataset.field(self.require_field()?)?;
                let (Some(start), Some(end)) = (self.start, self.end) else {
                    return Err(EngineError::InvalidConfig("range predicate requires `start` and `end`".to_string()));
                };
                out.push(Predicate::Range(RangePredicate::new(field, start, end, self.include_end.unwrap_or(false))));
            }
            other => {
                return Err(EngineError::UnknownKind {
                    category: "predicate",
                    kind: other.to_string(),
                });
            }
        }
        Ok(())
    }

    fn require_field(&self) -> EngineResult<&str> {
        self.field.as_deref().ok_or_else(|| EngineError::InvalidConfig(format!("{} predicate requires `field`", self.kind)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryShape {
    pub id: QueryId,
    #[serde(default)]
    pub target: Option<String>,
    pub accumulator: String,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub predicate: Option<PredicateShape>,
    #[serde(default)]
    pub state: QueryState,
    #[serde(default)]
    pub order: usize,
    /// Carried for display only; a receiver re-plans and rescans.
    #[serde(default)]
    pub progress: Progress,
}

/// A query definition reconstructed from its shape
#[derive(Debug, Clone)]
pub struct BoundQuery {
    pub id: QueryId,
    pub definition: QueryDefinition,
    pub state: QueryState,
}

impl QueryShape {
    pub fn bind(&self, dataset: &Dataset) -> EngineResult<BoundQuery> {
        let accumulator: AccumulatorKind = self.accumulator.parse()?;
        let target = self.target.as_deref().map(|name| dataset.field(name)).transpose()?;
        let fields = self.group_by.iter().map(|name| dataset.field(name)).collect::<EngineResult<Vec<_>>>()?;
        let predicate = match &self.predicate {
            Some(shape) => shape.bind(dataset)?,
            None => AndPredicate::default(),
        };

        let definition = QueryDefinition::new(accumulator, target, GroupBy::new(fields), predicate);
        definition.validate()?;

        Ok(BoundQuery {
            id: self.id,
            definition,
            state: self.state,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueShape {
    /// Scheduler name, e.g. `"RoundRobin"`
    pub mode: String,
    pub queries: Vec<QueryShape>,
}

impl QueueShape {
    pub fn scheduler_kind(&self) -> EngineResult<SchedulerKind> {
        self.mode.parse()
    }
}
