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

//! Dataset attributes and how raw values map to groups
//!
//! A [`Field`] describes one column of a dataset and owns a [`Grouper`]:
//! quantitative fields bin their values, categorical fields dictionary-encode
//! them. Fields are shared between queries as [`FieldRef`]s, so grouping is
//! memoized across every query that touches the same column.

pub mod grouper;
pub mod key;

pub use grouper::{CategoricalGrouper, GroupId, GroupValue, Grouper, NULL_LABEL, NumericalGrouper};
pub use key::{FieldGroupedValue, GroupBy, GroupKey};

use parking_lot::Mutex;
use progdb_common::{DataType, Value, VlType};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::dataset::Row;

/// Default approximate number of bins for quantitative fields
pub const DEFAULT_NUM_BINS: usize = 40;

static NULL_VALUE: Value = Value::Null;

pub type FieldRef = Arc<Field>;

/// One attribute of a dataset
#[derive(Debug)]
pub struct Field {
    name: String,
    index: usize,
    data_type: DataType,
    vl_type: VlType,
    nullable: bool,
    grouper: Mutex<Grouper>,
}

impl Field {
    /// Creates a binned quantitative field from an estimated value range.
    pub fn quantitative(name: impl Into<String>, index: usize, data_type: DataType, min: f64, max: f64, num_bins: usize, nullable: bool) -> Self {
        Self {
            name: name.into(),
            index,
            data_type,
            vl_type: VlType::Quantitative,
            nullable,
            grouper: Mutex::new(Grouper::Numerical(NumericalGrouper::new(min, max, num_bins))),
        }
    }

    /// Creates a dictionary-encoded field. `vl_type` should be categorical or `Key`.
    pub fn categorical(name: impl Into<String>, index: usize, data_type: DataType, vl_type: VlType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            index,
            data_type,
            vl_type,
            nullable,
            grouper: Mutex::new(Grouper::Categorical(CategoricalGrouper::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the field's value within a row
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn vl_type(&self) -> VlType {
        self.vl_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_quantitative(&self) -> bool {
        self.vl_type.is_quantitative()
    }

    pub fn is_categorical(&self) -> bool {
        self.vl_type.is_categorical()
    }

    /// The field's value in `row`; missing columns read as null.
    pub fn value<'a>(&self, row: &'a Row) -> &'a Value {
        row.get(self.index).unwrap_or(&NULL_VALUE)
    }

    pub fn group(&self, value: &Value) -> GroupId {
        self.grouper.lock().group(value)
    }

    pub fn group_row(&self, row: &Row) -> GroupId {
        self.group(self.value(row))
    }

    pub fn ungroup(&self, id: GroupId) -> Option<GroupValue> {
        self.grouper.lock().ungroup(id)
    }

    pub fn ungroup_string(&self, id: GroupId) -> String {
        self.ungroup(id).map_or_else(|| format!("#{id}"), |value| value.to_string())
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.grouper.lock().group_ids()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.data_type, self.vl_type)
    }
}

/// Inferred description of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldGuess {
    pub data_type: DataType,
    pub vl_type: VlType,
    pub nullable: bool,
}

/// Infers the storage type, visualization type and nullability of a column
/// from a sample of its values.
pub fn guess(values: &[Value]) -> FieldGuess {
    let data_type = guess_data_type(values);
    let cardinality = values.iter().collect::<HashSet<_>>().len();

    let vl_type = if cardinality <= 20 {
        VlType::Dozen
    } else if data_type.is_numeric() {
        VlType::Quantitative
    } else if cardinality <= 100 {
        VlType::Nominal
    } else {
        VlType::Key
    };

    FieldGuess {
        data_type,
        vl_type,
        nullable: values.iter().any(Value::is_null),
    }
}

fn guess_data_type(values: &[Value]) -> DataType {
    let mut data_type = DataType::Integer;

    for value in values {
        let number = match value {
            Value::Null => continue,
            Value::Integer(_) => continue,
            Value::Real(v) => *v,
            Value::Text(s) => match s.trim().parse::<f64>() {
                Ok(v) => v,
                Err(_) => return DataType::String,
            },
        };

        if number.fract() != 0.0 {
            data_type = DataType::Real;
        }
    }

    data_type
}
