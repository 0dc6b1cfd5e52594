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
use progdb_core::{AccumulatorKind, AndPredicate, Dataset, EngineError, EqualPredicate, GroupBy, Predicate, QueryDefinition, QueryTemplate, RangePredicate};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryArgsError {
    #[error("Filter `{0}` must look like `field=value` or `field=low..high`")]
    MalformedFilter(String),
    #[error("Range bound `{0}` is not a number")]
    InvalidBound(String),
    #[error("Fields {0:?} do not combine into a query")]
    NoQuery(Vec<String>),
    #[error("Either --accumulator or --fields is required")]
    MissingQuery,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Parses `field=value` into an equality filter and `field=low..high` into a
/// half-open range filter.
pub fn parse_filter(dataset: &Dataset, raw: &str) -> Result<Predicate, QueryArgsError> {
    let (name, rhs) = raw.split_once('=').ok_or_else(|| QueryArgsError::MalformedFilter(raw.to_string()))?;
    let field = dataset.field(name.trim())?;

    if let Some((low, high)) = rhs.split_once("..") {
        let parse = |bound: &str| bound.trim().parse::<f64>().map_err(|_| QueryArgsError::InvalidBound(bound.to_string()));
        return Ok(Predicate::Range(RangePredicate::new(field, parse(low)?, parse(high)?, false)));
    }

    let expected = Value::parse(rhs, field.data_type()).map_err(EngineError::from)?;
    Ok(Predicate::Equal(EqualPredicate::new(field, expected)))
}

/// Builds a query definition either explicitly or by combining `fields` in order.
pub fn build_definition(
    dataset: &Dataset,
    accumulator: Option<&str>,
    target: Option<&str>,
    group_by: &[String],
    fields: &[String],
    filters: &[String],
) -> Result<QueryDefinition, QueryArgsError> {
    let definition = match accumulator {
        Some(kind) => {
            let kind: AccumulatorKind = kind.parse()?;
            let target = target.map(|name| dataset.field(name)).transpose()?;
            let group_by = group_by.iter().map(|name| dataset.field(name)).collect::<Result<Vec<_>, _>>()?;
            QueryDefinition::new(kind, target, GroupBy::new(group_by), AndPredicate::default())
        }
        None if !fields.is_empty() => {
            let mut template = QueryTemplate::Empty;
            for name in fields {
                template = template.combine(&dataset.field(name)?);
            }
            template.definition().ok_or_else(|| QueryArgsError::NoQuery(fields.to_vec()))?
        }
        None => return Err(QueryArgsError::MissingQuery),
    };

    let mut predicate = AndPredicate::default();
    for raw in filters {
        predicate = predicate.and(parse_filter(dataset, raw)?);
    }

    let definition = definition.with_predicate(predicate);
    definition.validate()?;
    Ok(definition)
}
