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

//! Per-bucket running statistics and the aggregate kinds that fold them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Sufficient statistics of one bucket
///
/// Used both for the partial of a single block and for the cumulative value a
/// query keeps per group. `count` includes null values; `null_count` counts
/// them separately so the non-null count is `count - null_count`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateValue {
    pub sum: f64,
    pub ssum: f64,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub null_count: u64,
}

impl AggregateValue {
    pub const EMPTY: AggregateValue = AggregateValue {
        sum: 0.0,
        ssum: 0.0,
        count: 0,
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        null_count: 0,
    };

    /// Number of non-null values folded in
    pub fn non_null_count(&self) -> u64 {
        self.count - self.null_count
    }
}

impl Default for AggregateValue {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulatorKind {
    Min,
    Max,
    Count,
    Sum,
    Mean,
}

impl AccumulatorKind {
    pub const ALL: [AccumulatorKind; 5] = [Self::Min, Self::Max, Self::Count, Self::Sum, Self::Mean];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Mean => "mean",
        }
    }

    /// Whether the kind aggregates a target field rather than counting rows
    pub fn requires_target(&self) -> bool {
        !matches!(self, Self::Count)
    }

    pub fn init_partial_value(&self) -> AggregateValue {
        AggregateValue::EMPTY
    }

    pub fn init_accumulated_value(&self) -> AggregateValue {
        AggregateValue::EMPTY
    }

    /// Folds one value (or a null) into a block partial.
    pub fn reduce(&self, partial: AggregateValue, value: Option<f64>) -> AggregateValue {
        let mut next = AggregateValue {
            count: partial.count + 1,
            ..partial
        };

        let Some(v) = value else {
            next.null_count += 1;
            return next;
        };

        match self {
            Self::Count => {}
            Self::Sum | Self::Mean => {
                next.sum += v;
                next.ssum += v * v;
            }
            Self::Min => next.min = next.min.min(v),
            Self::Max => next.max = next.max.max(v),
        }

        next
    }

    /// Combines a cumulative value with a partial.
    pub fn accumulate(&self, cumulative: AggregateValue, partial: AggregateValue) -> AggregateValue {
        let mut next = AggregateValue {
            count: cumulative.count + partial.count,
            null_count: cumulative.null_count + partial.null_count,
            ..cumulative
        };

        match self {
            Self::Count => {}
            Self::Sum | Self::Mean => {
                next.sum += partial.sum;
                next.ssum += partial.ssum;
            }
            Self::Min => next.min = cumulative.min.min(partial.min),
            Self::Max => next.max = cumulative.max.max(partial.max),
        }

        next
    }

    pub fn desc(&self, value: &AggregateValue) -> String {
        let n1 = value.non_null_count();
        match self {
            Self::Count => format!("count: {}", value.count),
            _ if n1 == 0 => format!("{}: (empty)", self.name()),
            Self::Sum => format!("sum: {} ({} values)", value.sum, n1),
            Self::Mean => format!("mean: {} ({} values)", value.sum / n1 as f64, n1),
            Self::Min => format!("min: {}", value.min),
            Self::Max => format!("max: {}", value.max),
        }
    }
}

impl fmt::Display for AccumulatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_uppercase())
    }
}

impl FromStr for AccumulatorKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|kind| kind.name().eq_ignore_ascii_case(s)).ok_or_else(|| EngineError::UnknownKind {
            category: "accumulator",
            kind: s.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(kind: AccumulatorKind, values: &[Option<f64>]) -> AggregateValue {
        values.iter().fold(kind.init_partial_value(), |acc, v| kind.reduce(acc, *v))
    }

    #[test]
    fn test_sum_fold() {
        let kind = AccumulatorKind::Sum;
        let a = AggregateValue {
            sum: 10.0,
            ssum: 0.0,
            count: 2,
            ..AggregateValue::EMPTY
        };
        let b = AggregateValue {
            sum: 5.0,
            ssum: 0.0,
            count: 1,
            ..AggregateValue::EMPTY
        };
        let folded = kind.accumulate(a, b);
        assert_eq!(folded.sum, 15.0);
        assert_eq!(folded.count, 3);
    }

    #[test]
    fn test_reduce_skips_nulls() {
        let mean = fold(AccumulatorKind::Mean, &[Some(1.0), None, Some(3.0)]);
        assert_eq!(mean.count, 3);
        assert_eq!(mean.null_count, 1);
        assert_eq!(mean.non_null_count(), 2);
        assert_eq!(mean.sum, 4.0);
        assert_eq!(mean.ssum, 10.0);

        let min = fold(AccumulatorKind::Min, &[Some(4.0), None, Some(-2.0)]);
        assert_eq!(min.min, -2.0);
        let max = fold(AccumulatorKind::Max, &[None, Some(4.0), Some(-2.0)]);
        assert_eq!(max.max, 4.0);
    }

    #[test]
    fn test_accumulate_is_order_independent() {
        for kind in AccumulatorKind::ALL {
            let a = fold(kind, &[Some(1.0), Some(5.0)]);
            let b = fold(kind, &[None, Some(-3.0)]);
            let c = fold(kind, &[Some(2.5)]);

            let left = kind.accumulate(kind.accumulate(kind.init_accumulated_value(), a), kind.accumulate(b, c));
            let right = kind.accumulate(kind.accumulate(c, a), b);
            assert_eq!(left, right, "{kind}");
        }
    }

    #[test]
    fn test_identity() {
        let kind = AccumulatorKind::Max;
        let a = fold(kind, &[Some(2.0)]);
        assert_eq!(kind.accumulate(kind.init_accumulated_value(), a), a);
    }

    #[test]
    fn test_empty_sentinels_survive_accumulation() {
        for kind in AccumulatorKind::ALL {
            let merged = kind.accumulate(AggregateValue::EMPTY, AggregateValue::EMPTY);
            assert_eq!(merged, AggregateValue::EMPTY, "{kind}");
            assert!(merged.min > merged.max);
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("mean".parse::<AccumulatorKind>().unwrap(), AccumulatorKind::Mean);
        assert_eq!("SUM".parse::<AccumulatorKind>().unwrap(), AccumulatorKind::Sum);
        assert!(matches!("median".parse::<AccumulatorKind>(), Err(EngineError::UnknownKind { category: "accumulator", .. })));
        assert_eq!(AccumulatorKind::Count.to_string(), "COUNT");
    }

    #[test]
    fn test_desc() {
        let kind = AccumulatorKind::Mean;
        assert_eq!(kind.desc(&fold(kind, &[Some(1.0), Some(3.0)])), "mean: 2 (2 values)");
        assert_eq!(kind.desc(&fold(kind, &[None])), "mean: (empty)");
        assert_eq!(AccumulatorKind::Count.desc(&fold(AccumulatorKind::Count, &[None, Some(1.0)])), "count: 2");
    }
}
