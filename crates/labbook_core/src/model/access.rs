//! Requester identity and entitlement value types.

use crate::model::entity::{FieldValue, GroupId, TeamId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Already-authenticated caller of a request.
///
/// Passed explicitly into every entitlement decision; nothing is read from
/// ambient session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: UserId,
    pub team: TeamId,
    pub is_admin: bool,
}

impl Requester {
    pub fn new(user_id: UserId, team: TeamId) -> Self {
        Self {
            user_id,
            team,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId, team: TeamId) -> Self {
        Self {
            user_id,
            team,
            is_admin: true,
        }
    }
}

/// Operation guarded by the entitlement gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl Display for Access {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read/write entitlement for one record. Both flags default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
}

impl Permissions {
    pub const NONE: Self = Self {
        read: false,
        write: false,
    };
    pub const READ_ONLY: Self = Self {
        read: true,
        write: false,
    };
    pub const FULL: Self = Self {
        read: true,
        write: true,
    };

    pub fn allows(self, access: Access) -> bool {
        match access {
            Access::Read => self.read,
            Access::Write => self.write,
        }
    }
}

/// Visibility class of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Organization,
    Team,
    /// Reference to a team group; stored as the group's numeric id.
    Group(GroupId),
}

impl Visibility {
    /// Parses a stored `visibility` value.
    ///
    /// A positive integer denotes a group reference. Values outside the four
    /// classes (for example `user`) yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        match trimmed {
            "public" => Some(Self::Public),
            "organization" => Some(Self::Organization),
            "team" => Some(Self::Team),
            _ => crate::model::entity::parse_entity_id(trimmed)
                .ok()
                .map(Self::Group),
        }
    }

    /// Reads a `visibility` column value as stored, text or integer.
    pub fn from_field(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(text) => Self::parse(text),
            FieldValue::Integer(group_id) if *group_id > 0 => Some(Self::Group(*group_id)),
            _ => None,
        }
    }

    /// Value as persisted in `experiments.visibility`.
    pub fn to_db(self) -> String {
        match self {
            Self::Public => "public".to_string(),
            Self::Organization => "organization".to_string(),
            Self::Team => "team".to_string(),
            Self::Group(id) => id.to_string(),
        }
    }
}
