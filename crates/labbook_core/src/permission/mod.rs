//! Per-record read/write entitlement.
//!
//! # Responsibility
//! - Decide `{read, write}` for a record and a requester (`resolver`).
//! - Answer team-group membership questions (`team_groups`).
//!
//! # Invariants
//! - Grants only accumulate; no rule revokes another rule's grant.
//! - Nothing but the owner ever gets write on an experiment.

pub mod resolver;
pub mod team_groups;
