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

//! Row filters used for drill-down queries and dataset selection

use progdb_common::Value;
use std::fmt;

use crate::dataset::Row;
use crate::field::{FieldRef, GroupKey, GroupValue};
use crate::shape::PredicateShape;

/// Accepts rows whose value for `field` equals `expected`
#[derive(Debug, Clone)]
pub struct EqualPredicate {
    pub field: FieldRef,
    pub expected: Value,
}

impl EqualPredicate {
    pub fn new(field: FieldRef, expected: Value) -> Self {
        Self { field, expected }
    }

    pub fn test(&self, row: &Row) -> bool {
        *self.field.value(row) == self.expected
    }
}

/// Accepts rows whose numeric value lies in `[start, end)`, or `[start, end]`
/// when `include_end` is set. Nulls never pass.
#[derive(Debug, Clone)]
pub struct RangePredicate {
    pub field: FieldRef,
    pub start: f64,
    pub end: f64,
    pub include_end: bool,
}

impl RangePredicate {
    pub fn new(field: FieldRef, start: f64, end: f64, include_end: bool) -> Self {
        Self { field, start, end, include_end }
    }

    pub fn test(&self, row: &Row) -> bool {
        match self.field.value(row).as_f64() {
            Some(v) => v >= self.start && (v < self.end || (self.include_end && v == self.end)),
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Equal(EqualPredicate),
    Range(RangePredicate),
}

impl Predicate {
    pub fn field(&self) -> &FieldRef {
        match self {
            Self::Equal(p) => &p.field,
            Self::Range(p) => &p.field,
        }
    }

    pub fn test(&self, row: &Row) -> bool {
        match self {
            Self::Equal(p) => p.test(row),
            Self::Range(p) => p.test(row),
        }
    }

    pub fn and(self, other: Predicate) -> AndPredicate {
        AndPredicate::from(self).and(other)
    }

    pub fn to_shape(&self) -> PredicateShape {
        match self {
            Self::Equal(p) => PredicateShape::equal(p.field.name(), p.expected.clone()),
            Self::Range(p) => PredicateShape::range(p.field.name(), p.start, p.end, p.include_end),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal(p) => write!(f, "{} = {}", p.field.name(), p.expected),
            Self::Range(p) => {
                let close = if p.include_end { ']' } else { ')' };
                write!(f, "{} in [{}, {}{close}", p.field.name(), p.start, p.end)
            }
        }
    }
}

/// Flat conjunction of predicates; the empty conjunction accepts every row.
#[derive(Debug, Clone, Default)]
pub struct AndPredicate {
    predicates: Vec<Predicate>,
}

impl AndPredicate {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    /// Filter selecting exactly the rows that fall into the bucket `key`.
    pub fn from_key(key: &GroupKey) -> Self {
        let predicates = key
            .values()
            .iter()
            .map(|v| {
                let field = v.field.clone();
                match v.value() {
                    Some(GroupValue::Bin { low, high, last }) => Predicate::Range(RangePredicate::new(field, low, high, last)),
                    Some(GroupValue::Category(value)) => Predicate::Equal(EqualPredicate::new(field, value)),
                    Some(GroupValue::Null) | None => Predicate::Equal(EqualPredicate::new(field, Value::Null)),
                }
            })
            .collect();
        Self { predicates }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn test(&self, row: &Row) -> bool {
        self.predicates.iter().all(|p| p.test(row))
    }

    pub fn and(&self, predicate: Predicate) -> AndPredicate {
        let mut predicates = self.predicates.clone();
        predicates.push(predicate);
        Self { predicates }
    }

    /// Conjunction with another AND, flattened into a single list.
    pub fn and_all(&self, other: &AndPredicate) -> AndPredicate {
        let mut predicates = self.predicates.clone();
        predicates.extend(other.predicates.iter().cloned());
        Self { predicates }
    }

    pub fn to_shape(&self) -> PredicateShape {
        PredicateShape::and(self.predicates.iter().map(Predicate::to_shape).collect())
    }
}

impl From<Predicate> for AndPredicate {
    fn from(predicate: Predicate) -> Self {
        Self { predicates: vec![predicate] }
    }
}

impl fmt::Display for AndPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return write!(f, "true");
        }
        let parts: Vec<String> = self.predicates.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" and "))
    }
}
