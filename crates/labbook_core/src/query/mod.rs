//! Read query construction and execution.
//!
//! # Responsibility
//! - Accumulate optional structured predicates (`filter`).
//! - Compose them onto the kind-specific base join and run it (`composer`).
//!
//! # Invariants
//! - Team scoping is always applied and is never a filter slot.
//! - User-controlled values are bound as parameters, never spliced into SQL.

pub mod composer;
pub mod filter;
