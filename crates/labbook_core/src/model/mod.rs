//! Domain model definitions.
//!
//! # Responsibility
//! - Define resource kinds, record rows and their typed accessors.
//! - Define requester identity and entitlement value types.
//!
//! # Invariants
//! - Resource kind is a closed set; unsupported names are rejected at parse.
//! - Records are read-only projections of one view row.

pub mod access;
pub mod entity;
