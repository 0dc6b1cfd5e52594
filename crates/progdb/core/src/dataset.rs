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

//! In-memory row-oriented dataset and JSON loading

use progdb_common::{DataType, Value, VlType};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::field::{self, DEFAULT_NUM_BINS, Field, FieldRef};
use crate::predicate::AndPredicate;
use crate::schema::Schema;

/// One record; values are positioned by [`Field::index`].
pub type Row = Vec<Value>;

/// Maximum number of rows inspected when inferring field types
pub const GUESS_SAMPLE_SIZE: usize = 200;

#[derive(Debug)]
pub struct Dataset {
    name: String,
    fields: Vec<FieldRef>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, fields: Vec<FieldRef>, rows: Vec<Row>) -> Self {
        Self { name: name.into(), fields, rows }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> EngineResult<FieldRef> {
        self.fields.iter().find(|f| f.name() == name).cloned().ok_or_else(|| EngineError::UnknownField(name.to_string()))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Indices of rows satisfying `predicate`, restricted to `indices` when given
    pub fn select(&self, predicate: &AndPredicate, indices: Option<&[usize]>) -> Vec<usize> {
        match indices {
            Some(indices) => indices.iter().copied().filter(|&i| self.rows.get(i).is_some_and(|row| predicate.test(row))).collect(),
            None => self.rows.iter().enumerate().filter(|(_, row)| predicate.test(row)).map(|(i, _)| i).collect(),
        }
    }

    pub fn load(path: impl AsRef<Path>, schema: Option<&Schema>, num_bins: usize) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let rows: JsonValue = serde_json::from_str(&json)?;
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("dataset");
        Self::from_json(name, &rows, schema, num_bins)
    }

    /// Builds a dataset from a JSON array of objects.
    ///
    /// Columns are ordered by first appearance. Field types are inferred from an
    /// evenly strided sample of at most [`GUESS_SAMPLE_SIZE`] rows, then
    /// overridden by `schema`. Quantitative bin ranges come from the same sample
    /// unless the schema gives them.
    pub fn from_json(name: &str, rows: &JsonValue, schema: Option<&Schema>, num_bins: usize) -> EngineResult<Self> {
        let records = rows.as_array().ok_or_else(|| EngineError::Dataset("expected a JSON array of rows".to_string()))?;

        let mut names: Vec<String> = Vec::new();
        for record in records {
            let object = record.as_object().ok_or_else(|| EngineError::Dataset(format!("expected a JSON object per row, got `{record}`")))?;
            for key in object.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }

        let mut raw_rows: Vec<Row> = Vec::with_capacity(records.len());
        for record in records {
            let mut row = Vec::with_capacity(names.len());
            for column in &names {
                row.push(match record.get(column) {
                    Some(value) => json_to_value(column, value)?,
                    None => Value::Null,
                });
            }
            raw_rows.push(row);
        }

        let stride = raw_rows.len().div_ceil(GUESS_SAMPLE_SIZE).max(1);
        let num_bins = if num_bins == 0 { DEFAULT_NUM_BINS } else { num_bins };

        let mut fields = Vec::with_capacity(names.len());
        for (index, column) in names.iter().enumerate() {
            let sample: Vec<Value> = raw_rows.iter().step_by(stride).map(|row| row[index].clone()).collect();
            let guess = field::guess(&sample);
            let overrides = schema.and_then(|s| s.column(column));

            let vl_type = match overrides.map(|c| c.parsed_vl_type()).transpose()?.flatten() {
                Some(vl_type) => vl_type,
                None => guess.vl_type,
            };
            let data_type = overrides.and_then(|c| c.data_type).unwrap_or(guess.data_type);
            let mut nullable = overrides.and_then(|c| c.nullable).unwrap_or(guess.nullable);

            if vl_type.is_quantitative() && !data_type.is_numeric() {
                return Err(EngineError::Dataset(format!("column `{column}` is quantitative but holds non-numeric values")));
            }

            let dropped = normalize_column(&mut raw_rows, index, data_type);
            if dropped > 0 {
                warn!(column = %column, %data_type, dropped, "Replaced unparseable values with null");
                nullable = true;
            }

            let field = if vl_type.is_quantitative() {
                let numbers: Vec<f64> = sample.iter().filter_map(Value::as_f64).filter(|v| v.is_finite()).collect();
                let sample_min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
                let sample_max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let (sample_min, sample_max) = if numbers.is_empty() { (0.0, 1.0) } else { (sample_min, sample_max) };

                let min = overrides.and_then(|c| c.min).unwrap_or(sample_min);
                let max = overrides.and_then(|c| c.max).unwrap_or(sample_max);
                let bins = overrides.and_then(|c| c.num_bins).unwrap_or(num_bins);
                Field::quantitative(column.clone(), index, data_type, min, max, bins, nullable)
            } else {
                Field::categorical(column.clone(), index, data_type, vl_type, nullable)
            };

            debug!(field = %field, nullable, "Inferred field");
            fields.push(Arc::new(field));
        }

        info!(dataset = name, rows = raw_rows.len(), fields = fields.len(), "Loaded dataset");
        Ok(Self::new(name, fields, raw_rows))
    }

    /// Numeric columns of the dataset suitable as aggregate targets
    pub fn quantitative_fields(&self) -> Vec<FieldRef> {
        self.fields.iter().filter(|f| f.vl_type() == VlType::Quantitative).cloned().collect()
    }
}

fn json_to_value(column: &str, value: &JsonValue) -> EngineResult<Value> {
    match value {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(b) => Ok(Value::Text(b.to_string())),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Integer(i)),
            None => n.as_f64().map(Value::Real).ok_or_else(|| EngineError::Dataset(format!("column `{column}`: unsupported number {n}"))),
        },
        JsonValue::String(s) if s.trim().is_empty() => Ok(Value::Null),
        JsonValue::String(s) => Ok(Value::Text(s.clone())),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(EngineError::Dataset(format!("column `{column}`: nested values are not supported"))),
    }
}

/// Brings a column in line with its storage type. Values that do not parse
/// as the column's type become null; returns how many were replaced.
fn normalize_column(rows: &mut [Row], index: usize, data_type: DataType) -> usize {
    let mut dropped = 0;
    for row in rows {
        let value = std::mem::take(&mut row[index]);
        row[index] = value.coerce(data_type).unwrap_or_else(|_| {
            dropped += 1;
            Value::Null
        });
    }
    dropped
}
