//! Error taxonomy shared by filters, queries, entitlement checks and contexts.
//!
//! # Invariants
//! - Every error surfaces to the caller immediately; nothing is retried.
//! - `PermissionDenied` and `NotFound` carry no record content.

use crate::db::DbError;
use crate::model::access::Access;
use crate::model::entity::{EntityId, EntityKind};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EntityResult<T> = Result<T, EntityError>;

/// Coarse error class exposed to boundary layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    InvalidArgument,
    Query,
    PermissionDenied,
    NotApplicable,
    NotFound,
}

#[derive(Debug)]
pub enum EntityError {
    /// Malformed id, limit, order or filter input.
    InvalidArgument(String),
    /// Resource type name outside experiments/items reached the query path.
    UnsupportedKind(String),
    Db(DbError),
    /// A stored row does not have the shape the read path relies on.
    InvalidData(String),
    PermissionDenied {
        kind: EntityKind,
        id: Option<EntityId>,
        access: Access,
    },
    /// Lazy record materialization requested for a non-record resource type.
    NotApplicable(String),
    NotFound { kind: EntityKind, id: EntityId },
}

impl EntityError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Self::UnsupportedKind(_) | Self::Db(_) | Self::InvalidData(_) => ErrorCategory::Query,
            Self::PermissionDenied { .. } => ErrorCategory::PermissionDenied,
            Self::NotApplicable(_) => ErrorCategory::NotApplicable,
            Self::NotFound { .. } => ErrorCategory::NotFound,
        }
    }

    /// Whether a boundary layer must render this the same as "not found".
    pub fn is_hidden_at_boundary(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::PermissionDenied | ErrorCategory::NotFound
        )
    }
}

impl Display for EntityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::UnsupportedKind(kind) => write!(f, "unsupported resource type `{kind}`"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::PermissionDenied {
                kind,
                id: Some(id),
                access,
            } => write!(f, "{access} access denied on {kind} #{id}"),
            Self::PermissionDenied {
                kind,
                id: None,
                access,
            } => write!(f, "{access} access denied on {kind}"),
            Self::NotApplicable(kind) => {
                write!(f, "records cannot be materialized for `{kind}`")
            }
            Self::NotFound { kind, id } => write!(f, "{kind} #{id} not found"),
        }
    }
}

impl Error for EntityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for EntityError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for EntityError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
