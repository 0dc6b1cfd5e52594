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

use crate::accumulator::{AccumulatorKind, AggregateValue};

/// z-score of a two-sided 95% confidence interval
pub const Z_95: f64 = 1.96;

/// Point estimate with a standard error
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproximatedInterval {
    pub center: f64,
    pub standard_error: f64,
    /// Number of observations the estimate is based on
    pub n: u64,
}

/// A concrete `[low, high]` range around a center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub center: f64,
    pub stdev: f64,
    pub low: f64,
    pub high: f64,
}

impl ApproximatedInterval {
    pub const EMPTY: ApproximatedInterval = ApproximatedInterval {
        center: 0.0,
        standard_error: 0.0,
        n: 0,
    };

    pub fn point(center: f64, n: u64) -> Self {
        Self {
            center,
            standard_error: 0.0,
            n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn range(&self, z: f64) -> ConfidenceInterval {
        let half = z * self.standard_error;
        ConfidenceInterval {
            center: self.center,
            stdev: self.standard_error,
            low: self.center - half,
            high: self.center + half,
        }
    }

    pub fn ci95(&self) -> ConfidenceInterval {
        self.range(Z_95)
    }

    pub fn desc(&self) -> String {
        if self.is_empty() {
            return "(empty)".to_string();
        }
        let ci = self.ci95();
        format!("{:.4} ± {:.4} [{:.4}, {:.4}] (n={})", self.center, Z_95 * self.standard_error, ci.low, ci.high, self.n)
    }
}

/// Estimates the aggregate over all `total` rows from a statistic over the
/// `n` rows processed so far, `p` being the processed fraction.
///
/// Never produces NaN or infinity; degenerate inputs yield
/// [`ApproximatedInterval::EMPTY`] or a zero-error point.
pub fn approximate(kind: AccumulatorKind, value: &AggregateValue, p: f64, n: u64, total: u64) -> ApproximatedInterval {
    if total == 0 || p <= 0.0 || !p.is_finite() {
        return ApproximatedInterval::EMPTY;
    }

    let fpc = (1.0 - n as f64 / total as f64).max(0.0).sqrt();

    if kind == AccumulatorKind::Count {
        if value.count == 0 {
            return ApproximatedInterval::EMPTY;
        }
        let center = value.count as f64 / p;
        if n <= 1 {
            return ApproximatedInterval::point(center, value.count);
        }
        let q = (value.count as f64 / n as f64).min(1.0);
        let standard_error = total as f64 * fpc * (q * (1.0 - q) / (n - 1) as f64).sqrt();
        return ApproximatedInterval {
            center,
            standard_error,
            n: value.count,
        };
    }

    let n1 = value.non_null_count();
    if n1 == 0 {
        return ApproximatedInterval::EMPTY;
    }

    match kind {
        AccumulatorKind::Min => ApproximatedInterval::point(value.min, n1),
        AccumulatorKind::Max => ApproximatedInterval::point(value.max, n1),
        AccumulatorKind::Mean | AccumulatorKind::Sum => {
            let mean = value.sum / n1 as f64;
            let stdev = sample_stdev(value, n1);
            let (center, standard_error) = if kind == AccumulatorKind::Mean {
                (mean, fpc * stdev / (n1 as f64).sqrt())
            } else {
                (value.sum / p, fpc * stdev * (n1 as f64).sqrt() / p)
            };
            ApproximatedInterval { center, standard_error, n: n1 }
        }
        AccumulatorKind::Count => ApproximatedInterval::EMPTY,
    }
}

fn sample_stdev(value: &AggregateValue, n1: u64) -> f64 {
    if n1 <= 1 {
        return 0.0;
    }
    let mean = value.sum / n1 as f64;
    let variance = (value.ssum - n1 as f64 * mean * mean) / (n1 - 1) as f64;
    variance.max(0.0).sqrt()
}
