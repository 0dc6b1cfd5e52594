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

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{FieldRef, GroupId, GroupValue};
use crate::dataset::Row;

/// A grouping field paired with the group id of one value
#[derive(Debug, Clone)]
pub struct FieldGroupedValue {
    pub field: FieldRef,
    pub group_id: GroupId,
}

impl FieldGroupedValue {
    pub fn new(field: FieldRef, group_id: GroupId) -> Self {
        Self { field, group_id }
    }

    pub fn value(&self) -> Option<GroupValue> {
        self.field.ungroup(self.group_id)
    }

    pub fn value_string(&self) -> String {
        self.field.ungroup_string(self.group_id)
    }
}

impl PartialEq for FieldGroupedValue {
    fn eq(&self, other: &Self) -> bool {
        self.group_id == other.group_id && (Arc::ptr_eq(&self.field, &other.field) || self.field.name() == other.field.name())
    }
}

impl Eq for FieldGroupedValue {}

impl Hash for FieldGroupedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field.name().hash(state);
        self.group_id.hash(state);
    }
}

/// Identifies one bucket of a grouped aggregate: one group id per grouping field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GroupKey {
    list: Vec<FieldGroupedValue>,
}

impl GroupKey {
    pub fn new(list: Vec<FieldGroupedValue>) -> Self {
        Self { list }
    }

    pub fn values(&self) -> &[FieldGroupedValue] {
        &self.list
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn has_null(&self) -> bool {
        self.list.iter().any(|v| v.group_id.is_null())
    }

    /// Group id for the named field, if it is part of the key
    pub fn group_id(&self, field_name: &str) -> Option<GroupId> {
        self.list.iter().find(|v| v.field.name() == field_name).map(|v| v.group_id)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list.is_empty() {
            return write!(f, "(all)");
        }

        let parts: Vec<String> = self.list.iter().map(|v| format!("{}: {}", v.field.name(), v.value_string())).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Ordered list of grouping fields; quantitative fields are binned
#[derive(Debug, Clone, Default)]
pub struct GroupBy {
    fields: Vec<FieldRef>,
}

impl GroupBy {
    pub fn new(fields: Vec<FieldRef>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    pub fn group(&self, row: &Row) -> GroupKey {
        GroupKey::new(self.fields.iter().map(|field| FieldGroupedValue::new(field.clone(), field.group_row(row))).collect())
    }
}
