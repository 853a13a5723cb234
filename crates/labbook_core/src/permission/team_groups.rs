//! Team-group membership lookups.

use crate::error::EntityResult;
use crate::model::entity::{GroupId, UserId};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

/// Team-group collaborator consulted for group-visibility records.
pub trait TeamGroupDirectory {
    fn is_member(&self, user_id: UserId, group_id: GroupId) -> EntityResult<bool>;
}

/// SQLite-backed membership lookups over `users2team_groups`.
pub struct SqliteTeamGroups<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTeamGroups<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TeamGroupDirectory for SqliteTeamGroups<'_> {
    fn is_member(&self, user_id: UserId, group_id: GroupId) -> EntityResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM users2team_groups
                WHERE userid = ?1 AND groupid = ?2
            );",
            params![user_id, group_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

/// Fixed membership table, for callers that already loaded memberships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticTeamGroups {
    memberships: BTreeSet<(UserId, GroupId)>,
}

impl StaticTeamGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, user_id: UserId, group_id: GroupId) -> Self {
        self.memberships.insert((user_id, group_id));
        self
    }
}

impl TeamGroupDirectory for StaticTeamGroups {
    fn is_member(&self, user_id: UserId, group_id: GroupId) -> EntityResult<bool> {
        Ok(self.memberships.contains(&(user_id, group_id)))
    }
}
