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
use std::str::FromStr;

use crate::value::ValueError;

/// Storage type of a dataset attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    String,
    Integer,
    Real,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Real)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "String"),
            Self::Integer => write!(f, "Integer"),
            Self::Real => write!(f, "Real"),
        }
    }
}

/// Visualization-level type of a dataset attribute
///
/// Decides how a field may take part in a query: quantitative fields are
/// aggregated or binned, categorical fields (`Dozen`, `Ordinal`, `Nominal`)
/// are dictionary-encoded for grouping, and `Key` fields never group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VlType {
    Quantitative,
    /// Categorical with a small number (at most a couple dozen) of distinct values
    Dozen,
    Ordinal,
    Nominal,
    Key,
}

impl VlType {
    pub fn is_quantitative(&self) -> bool {
        matches!(self, Self::Quantitative)
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Dozen | Self::Ordinal | Self::Nominal)
    }

    pub fn is_groupable(&self) -> bool {
        !matches!(self, Self::Key)
    }
}

impl fmt::Display for VlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantitative => write!(f, "Quantitative"),
            Self::Dozen => write!(f, "Dozen"),
            Self::Ordinal => write!(f, "Ordinal"),
            Self::Nominal => write!(f, "Nominal"),
            Self::Key => write!(f, "Key"),
        }
    }
}

impl FromStr for VlType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quantitative" => Ok(Self::Quantitative),
            "dozen" => Ok(Self::Dozen),
            "ordinal" => Ok(Self::Ordinal),
            "nominal" => Ok(Self::Nominal),
            "key" => Ok(Self::Key),
            _ => Err(ValueError::UnknownType(s.to_string())),
        }
    }
}
