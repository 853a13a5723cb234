//! Resource kinds and record rows.
//!
//! # Responsibility
//! - Name the two record-bearing resource kinds and their storage tables.
//! - Carry one joined view row as a column → value map.
//!
//! # Invariants
//! - Ids are positive integers; `parse_entity_id` is the only string entry point.
//! - Typed accessors never coerce: a missing or mistyped column is `InvalidData`.

use crate::error::{EntityError, EntityResult};
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Primary key of an experiment or item row.
pub type EntityId = i64;
/// Primary key of a user.
pub type UserId = i64;
/// Primary key of a team.
pub type TeamId = i64;
/// Primary key of a team group.
pub type GroupId = i64;

/// Record-bearing resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Lab notebook entries with per-record visibility.
    Experiments,
    /// Shared team database entries, governed by team membership only.
    Items,
}

impl EntityKind {
    /// Storage table holding rows of this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::Experiments => "experiments",
            Self::Items => "items",
        }
    }

    /// Tag link table for this kind.
    pub fn tags_table(self) -> &'static str {
        match self {
            Self::Experiments => "experiments_tags",
            Self::Items => "items_tags",
        }
    }

    /// Value of `uploads.type` marking attachments of this kind.
    pub fn upload_type(self) -> &'static str {
        self.table()
    }

    /// Parses a resource type name.
    ///
    /// Accepts `experiments` and `items` (with `database` as an alias of
    /// `items`), case-insensitive. Returns `None` for anything else.
    pub fn from_type_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "experiments" | "experiment" => Some(Self::Experiments),
            "items" | "item" | "database" => Some(Self::Items),
            _ => None,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for EntityKind {
    type Err = EntityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_type_name(value).ok_or_else(|| EntityError::UnsupportedKind(value.to_string()))
    }
}

/// Validates an id coming from untrusted input.
///
/// Accepts only positive base-10 integers, surrounding whitespace ignored.
pub fn parse_entity_id(value: &str) -> EntityResult<EntityId> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(EntityError::InvalidArgument(format!(
            "id must be a positive integer, got `{trimmed}`"
        )));
    }
    let id = trimmed.parse::<EntityId>().map_err(|_| {
        EntityError::InvalidArgument(format!("id is out of range: `{trimmed}`"))
    })?;
    check_entity_id(id)
}

/// Rejects zero and negative ids.
pub fn check_entity_id(id: EntityId) -> EntityResult<EntityId> {
    if id <= 0 {
        return Err(EntityError::InvalidArgument(format!(
            "id must be a positive integer, got `{id}`"
        )));
    }
    Ok(id)
}

/// One column value of a record row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<ValueRef<'_>> for FieldValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(value) => Self::Integer(value),
            ValueRef::Real(value) => Self::Real(value),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One row of the kind-specific read view.
///
/// Columns keep their view names (`id`, `userid`, `team`, `title`,
/// `category`, `has_attachment`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful for hand-built records.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Required integer column.
    pub fn require_i64(&self, column: &str) -> EntityResult<i64> {
        match self.fields.get(column) {
            Some(FieldValue::Integer(value)) => Ok(*value),
            Some(other) => Err(EntityError::InvalidData(format!(
                "column `{column}` is not an integer: {other:?}"
            ))),
            None => Err(EntityError::InvalidData(format!(
                "column `{column}` is missing from record"
            ))),
        }
    }

    /// Optional text column; `Null` and absent both read as `None`.
    pub fn text(&self, column: &str) -> EntityResult<Option<&str>> {
        match self.fields.get(column) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Text(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(EntityError::InvalidData(format!(
                "column `{column}` is not text: {other:?}"
            ))),
        }
    }

    pub fn id(&self) -> EntityResult<EntityId> {
        self.require_i64("id")
    }

    /// Owner of the record.
    pub fn owner(&self) -> EntityResult<UserId> {
        self.require_i64("userid")
    }

    pub fn team(&self) -> EntityResult<TeamId> {
        self.require_i64("team")
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
