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

use progdb_common::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Label rendered for the null group
pub const NULL_LABEL: &str = "(empty)";

// Absorbs rounding when a bin's low edge is re-grouped (`base + i * step`).
const BIN_EPSILON: f64 = 1e-9;

/// Dense group id of a raw value within one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl GroupId {
    /// Reserved id shared by every null value regardless of field type
    pub const NULL: GroupId = GroupId(i64::MAX);

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() { write!(f, "null") } else { write!(f, "{}", self.0) }
    }
}

/// Inverse of grouping: what a group id stands for
#[derive(Debug, Clone, PartialEq)]
pub enum GroupValue {
    Null,
    Category(Value),
    /// Half-open `[low, high)` bin; the last bin of a field also includes `high`
    Bin { low: f64, high: f64, last: bool },
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "{NULL_LABEL}"),
            Self::Category(value) => write!(f, "{value}"),
            Self::Bin { low, high, last: true } => write!(f, "[{low}, {high}]"),
            Self::Bin { low, high, last: false } => write!(f, "[{low}, {high})"),
        }
    }
}

/// Assigns each distinct raw value a dense id on first sight
#[derive(Debug, Clone, Default)]
pub struct CategoricalGrouper {
    dict: HashMap<Value, GroupId>,
    inverse: Vec<Value>,
}

impl CategoricalGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-assigns ids in the given order, e.g. for ordinal fields.
    pub fn with_ordering(values: impl IntoIterator<Item = Value>) -> Self {
        let mut grouper = Self::new();
        for value in values {
            grouper.group(&value);
        }
        grouper
    }

    pub fn group(&mut self, value: &Value) -> GroupId {
        if value.is_null() {
            return GroupId::NULL;
        }

        if let Some(id) = self.dict.get(value) {
            return *id;
        }

        let id = GroupId(self.inverse.len() as i64);
        self.dict.insert(value.clone(), id);
        self.inverse.push(value.clone());
        id
    }

    pub fn ungroup(&self, id: GroupId) -> Option<GroupValue> {
        if id.is_null() {
            return Some(GroupValue::Null);
        }

        usize::try_from(id.0).ok().and_then(|index| self.inverse.get(index)).map(|value| GroupValue::Category(value.clone()))
    }

    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        (0..self.inverse.len() as i64).map(GroupId).collect()
    }
}

/// Fixed-width binning of a quantitative field
///
/// `base`, `step` and the bin count are fixed at construction. Values outside
/// the initial range land in the first or last bin, whose outer edges widen to
/// the most extreme values seen. Interior edges never move, so an id keeps its
/// meaning, but the outer bins of earlier partial results may cover a narrower
/// range than their current labels suggest.
#[derive(Debug, Clone)]
pub struct NumericalGrouper {
    base: f64,
    step: f64,
    num_bins: i64,
    min: f64,
    max: f64,
}

impl NumericalGrouper {
    pub fn new(approx_min: f64, approx_max: f64, approx_num_bins: usize) -> Self {
        let (lo, hi) = if approx_min.is_finite() && approx_max.is_finite() {
            (approx_min.min(approx_max), approx_min.max(approx_max))
        } else {
            (0.0, 1.0)
        };

        let step = nice_step(lo, hi, approx_num_bins);
        let base = (lo / step).floor() * step;
        let mut top = (hi / step).ceil() * step;
        if top <= base {
            top = base + step;
        }
        let num_bins = (((top - base) / step).round() as i64).max(1);

        Self {
            base,
            step,
            num_bins,
            min: base,
            max: base + num_bins as f64 * step,
        }
    }

    pub fn group(&mut self, value: Option<f64>) -> GroupId {
        let Some(value) = value.filter(|v| !v.is_nan()) else {
            return GroupId::NULL;
        };

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let position = ((value - self.base) / self.step + BIN_EPSILON).floor();
        GroupId(position.clamp(0.0, (self.num_bins - 1) as f64) as i64)
    }

    pub fn ungroup(&self, id: GroupId) -> Option<GroupValue> {
        if id.is_null() {
            return Some(GroupValue::Null);
        }
        if id.0 < 0 || id.0 >= self.num_bins {
            return None;
        }

        let last = id.0 == self.num_bins - 1;
        let low = if id.0 == 0 { self.min } else { self.base + self.step * id.0 as f64 };
        let high = if last { self.max } else { self.base + self.step * (id.0 + 1) as f64 };

        Some(GroupValue::Bin { low, high, last })
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins as usize
    }

    /// Smallest and largest values seen so far (or the initial edges)
    pub fn extent(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        (0..self.num_bins).map(GroupId).collect()
    }
}

/// Picks a 1, 2 or 5 times a power of ten step close to `span / count`.
fn nice_step(min: f64, max: f64, count: usize) -> f64 {
    let span = max - min;
    if span <= 0.0 || count == 0 {
        return 1.0;
    }

    let raw = span / count as f64;
    let power = 10f64.powf(raw.log10().floor());
    let error = raw / power;

    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };

    factor * power
}

/// Grouping strategy owned by a field
#[derive(Debug, Clone)]
pub enum Grouper {
    Categorical(CategoricalGrouper),
    Numerical(NumericalGrouper),
}

impl Grouper {
    pub fn group(&mut self, value: &Value) -> GroupId {
        match self {
            Self::Categorical(grouper) => grouper.group(value),
            Self::Numerical(grouper) => grouper.group(value.as_f64()),
        }
    }

    pub fn ungroup(&self, id: GroupId) -> Option<GroupValue> {
        match self {
            Self::Categorical(grouper) => grouper.ungroup(id),
            Self::Numerical(grouper) => grouper.ungroup(id),
        }
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        match self {
            Self::Categorical(grouper) => grouper.group_ids(),
            Self::Numerical(grouper) => grouper.group_ids(),
        }
    }
}
