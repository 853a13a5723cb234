//! Record access core for a shared multi-team lab repository.
//!
//! Composes filtered, team-scoped reads of experiments and items and decides
//! per-record read/write entitlement for a requester.

pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod permission;
pub mod query;

pub use context::EntityContext;
pub use error::{EntityError, EntityResult, ErrorCategory};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::access::{Access, Permissions, Requester, Visibility};
pub use model::entity::{
    parse_entity_id, EntityId, EntityKind, FieldValue, GroupId, Record, TeamId, UserId,
};
pub use permission::resolver::{require_or_fail, resolve};
pub use permission::team_groups::{SqliteTeamGroups, StaticTeamGroups, TeamGroupDirectory};
pub use query::composer::{
    compose, execute, execute_named, read, ComposedQuery, ReadResult, RecordStore,
    SqliteRecordStore,
};
pub use query::filter::{DateFilter, FilterField, FilterSet, OrderField, SortDirection};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
