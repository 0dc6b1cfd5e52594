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
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use crate::types::DataType;

/// Errors raised while interpreting raw values
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("Value `{value}` is not a valid {expected}")]
    TypeMismatch { value: String, expected: DataType },
    #[error("Unknown type: {0}")]
    UnknownType(String),
}

/// A single raw attribute value of a row
///
/// Reals compare and hash by bit pattern so that any value can key a
/// dictionary; `NaN` therefore equals itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Parses a raw string as the given storage type. Empty strings are null.
    pub fn parse(raw: &str, data_type: DataType) -> Result<Self, ValueError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::Null);
        }

        let mismatch = || ValueError::TypeMismatch {
            value: raw.to_string(),
            expected: data_type,
        };

        match data_type {
            DataType::String => Ok(Self::Text(raw.to_string())),
            DataType::Integer => trimmed.parse::<i64>().map(Self::Integer).map_err(|_| mismatch()),
            DataType::Real => trimmed.parse::<f64>().map(Self::Real).map_err(|_| mismatch()),
        }
    }

    /// Converts the value to the given storage type.
    ///
    /// Numeric text is parsed, integers widen to reals, whole reals narrow to
    /// integers and numbers render as text. Fractional reals in an integer
    /// column are kept as they are.
    pub fn coerce(self, data_type: DataType) -> Result<Self, ValueError> {
        match (self, data_type) {
            (Self::Text(s), DataType::Integer | DataType::Real) => Self::parse(&s, data_type),
            (Self::Integer(i), DataType::Real) => Ok(Self::Real(i as f64)),
            (Self::Real(r), DataType::Integer) if r.fract() == 0.0 => Ok(Self::Integer(r as i64)),
            (Self::Integer(i), DataType::String) => Ok(Self::Text(i.to_string())),
            (Self::Real(r), DataType::String) => Ok(Self::Text(r.to_string())),
            (value, _) => Ok(value),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric reading of the value; text is parsed, null has none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Integer(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Integer(v) => v.hash(state),
            Self::Real(v) => v.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_typed_values() {
        assert_eq!(Value::parse("42", DataType::Integer).unwrap(), Value::Integer(42));
        assert_eq!(Value::parse(" 2.5 ", DataType::Real).unwrap(), Value::Real(2.5));
        assert_eq!(Value::parse("abc", DataType::String).unwrap(), Value::Text("abc".into()));
        assert_eq!(Value::parse("", DataType::Integer).unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_type_mismatch() {
        let result = Value::parse("forty", DataType::Integer);
        assert!(matches!(result, Err(ValueError::TypeMismatch { .. })));
    }

    #[test]
    fn test_coerce_to_storage_type() {
        assert_eq!(Value::Integer(3).coerce(DataType::Real).unwrap(), Value::Real(3.0));
        assert_eq!(Value::Real(4.0).coerce(DataType::Integer).unwrap(), Value::Integer(4));
        assert_eq!(Value::Real(4.5).coerce(DataType::Integer).unwrap(), Value::Real(4.5));
        assert_eq!(Value::Integer(7).coerce(DataType::String).unwrap(), Value::Text("7".into()));
        assert_eq!(Value::Text("2.5".into()).coerce(DataType::Real).unwrap(), Value::Real(2.5));
        assert_eq!(Value::Null.coerce(DataType::Integer).unwrap(), Value::Null);
        assert!(matches!(Value::Text("n/a".into()).coerce(DataType::Integer), Err(ValueError::TypeMismatch { .. })));
    }

    #[test]
    fn test_numeric_reading() {
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Text("1.5".into()).as_f64(), Some(1.5));
        assert_eq!(Value::Text("seoul".into()).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn test_values_key_a_set() {
        let mut set = HashSet::new();
        set.insert(Value::Real(1.0));
        set.insert(Value::Real(1.0));
        set.insert(Value::Integer(1));
        set.insert(Value::Null);
        set.insert(Value::Null);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_untagged_json_shape() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 3, 2.5, "x"]"#).unwrap();
        assert_eq!(values, vec![Value::Null, Value::Integer(3), Value::Real(2.5), Value::Text("x".into())]);
    }
}
