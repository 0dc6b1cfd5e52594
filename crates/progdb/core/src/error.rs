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

use progdb_common::{ValueError, VlType};
use thiserror::Error;

use crate::ids::QueryId;

/// Errors surfaced by the progressive aggregation engine
///
/// Configuration and deserialization errors are raised synchronously at the
/// call that caused them. Empty statistics and an exhausted queue are not
/// errors and never appear here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Field `{field}` ({vl_type}) cannot be used for grouping")]
    InvalidGrouping { field: String, vl_type: VlType },
    #[error("Field `{field}` ({vl_type}) cannot be an aggregate target, a quantitative field is required")]
    InvalidTarget { field: String, vl_type: VlType },
    #[error("{0} requires a target field")]
    MissingTarget(String),
    #[error("At most {max} grouping fields are supported, got {got}")]
    TooManyGroupings { max: usize, got: usize },
    #[error("Invalid sampler configuration: {0}")]
    InvalidSampler(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Unknown {category} kind: `{kind}`")]
    UnknownKind { category: &'static str, kind: String },
    #[error("Field not found: {0}")]
    UnknownField(String),
    #[error("Query not found: {0}")]
    QueryNotFound(QueryId),
    #[error("Dataset error: {0}")]
    Dataset(String),
    #[error("Value error: {0}")]
    Value(#[from] ValueError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
