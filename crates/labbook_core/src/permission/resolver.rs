//! Visibility resolution for experiments and items.
//!
//! # Invariants
//! - Items: team membership alone decides, and it grants both read and write.
//! - Experiments: owner gets `{read, write}`; every other grant is read-only
//!   and grants are OR-combined.
//! - Group visibility is checked against the requester's own membership.

use crate::error::{EntityError, EntityResult};
use crate::model::access::{Access, Permissions, Requester, Visibility};
use crate::model::entity::{EntityKind, Record};
use crate::permission::team_groups::TeamGroupDirectory;
use log::info;

/// Resolves `{read, write}` for `requester` on `record`.
///
/// # Errors
/// - `InvalidData` when `userid`/`team` are missing or not integers.
/// - Propagates team-group lookup failures.
pub fn resolve<G: TeamGroupDirectory + ?Sized>(
    kind: EntityKind,
    record: &Record,
    requester: &Requester,
    groups: &G,
) -> EntityResult<Permissions> {
    match kind {
        EntityKind::Items => {
            if record.team()? == requester.team {
                Ok(Permissions::FULL)
            } else {
                Ok(Permissions::NONE)
            }
        }
        EntityKind::Experiments => resolve_experiment(record, requester, groups),
    }
}

fn resolve_experiment<G: TeamGroupDirectory + ?Sized>(
    record: &Record,
    requester: &Requester,
    groups: &G,
) -> EntityResult<Permissions> {
    if record.owner()? == requester.user_id {
        return Ok(Permissions::FULL);
    }

    let mut permissions = Permissions::default();
    if requester.is_admin {
        permissions.read = true;
        return Ok(permissions);
    }

    let visibility = record.get("visibility").and_then(Visibility::from_field);
    match visibility {
        Some(Visibility::Public | Visibility::Organization) => permissions.read = true,
        Some(Visibility::Team) => {
            if record.team()? == requester.team {
                permissions.read = true;
            }
        }
        Some(Visibility::Group(group_id)) => {
            if groups.is_member(requester.user_id, group_id)? {
                permissions.read = true;
            }
        }
        None => {}
    }

    Ok(permissions)
}

/// Fails with `PermissionDenied` unless `requester` may perform `access`.
pub fn require_or_fail<G: TeamGroupDirectory + ?Sized>(
    kind: EntityKind,
    record: &Record,
    requester: &Requester,
    groups: &G,
    access: Access,
) -> EntityResult<()> {
    if resolve(kind, record, requester, groups)?.allows(access) {
        return Ok(());
    }

    let id = record.id().ok();
    info!(
        "event=permission_denied module=permission kind={} id={} access={}",
        kind,
        id.map_or_else(|| "unknown".to_string(), |id| id.to_string()),
        access
    );
    Err(EntityError::PermissionDenied { kind, id, access })
}

#[cfg(test)]
mod tests {
    use super::{require_or_fail, resolve};
    use crate::error::{EntityError, EntityResult, ErrorCategory};
    use crate::model::access::{Access, Permissions, Requester};
    use crate::model::entity::{EntityKind, GroupId, Record, UserId};
    use crate::permission::team_groups::{StaticTeamGroups, TeamGroupDirectory};
    use std::cell::Cell;

    const VISIBILITIES: [&str; 6] = ["public", "organization", "team", "user", "3", "8"];

    fn experiment(userid: i64, team: i64, visibility: &str) -> Record {
        Record::new()
            .with("id", 40)
            .with("userid", userid)
            .with("team", team)
            .with("visibility", visibility)
    }

    fn item(userid: i64, team: i64) -> Record {
        Record::new()
            .with("id", 41)
            .with("userid", userid)
            .with("team", team)
    }

    struct CountingGroups {
        calls: Cell<usize>,
        inner: StaticTeamGroups,
    }

    impl TeamGroupDirectory for CountingGroups {
        fn is_member(&self, user_id: UserId, group_id: GroupId) -> EntityResult<bool> {
            self.calls.set(self.calls.get() + 1);
            self.inner.is_member(user_id, group_id)
        }
    }

    struct FailingGroups;

    impl TeamGroupDirectory for FailingGroups {
        fn is_member(&self, _user_id: UserId, _group_id: GroupId) -> EntityResult<bool> {
            Err(EntityError::from(rusqlite::Error::InvalidQuery))
        }
    }

    #[test]
    fn owner_always_gets_full_access_on_experiments() {
        let groups = StaticTeamGroups::new();
        for visibility in VISIBILITIES {
            for requester in [Requester::new(5, 1), Requester::admin(5, 2)] {
                let record = experiment(5, 9, visibility);
                let permissions =
                    resolve(EntityKind::Experiments, &record, &requester, &groups).unwrap();
                assert_eq!(permissions, Permissions::FULL, "visibility `{visibility}`");
            }
        }
    }

    #[test]
    fn items_depend_on_team_only() {
        let groups = StaticTeamGroups::new();
        for requester in [
            Requester::new(5, 1),
            Requester::admin(5, 1),
            Requester::new(7, 1),
        ] {
            let same_team = resolve(EntityKind::Items, &item(7, 1), &requester, &groups).unwrap();
            assert_eq!(same_team, Permissions::FULL);

            let other_team = resolve(EntityKind::Items, &item(7, 2), &requester, &groups).unwrap();
            assert_eq!(other_team, Permissions::NONE);
        }
    }

    #[test]
    fn public_and_organization_are_readable_by_anyone() {
        let groups = StaticTeamGroups::new();
        for visibility in ["public", "organization"] {
            for team in [1, 2] {
                let requester = Requester::new(5, team);
                let permissions = resolve(
                    EntityKind::Experiments,
                    &experiment(7, 1, visibility),
                    &requester,
                    &groups,
                )
                .unwrap();
                assert_eq!(permissions, Permissions::READ_ONLY);
            }
        }
    }

    #[test]
    fn team_visibility_requires_same_team() {
        let groups = StaticTeamGroups::new();
        let record = experiment(7, 1, "team");

        let same = resolve(
            EntityKind::Experiments,
            &record,
            &Requester::new(5, 1),
            &groups,
        )
        .unwrap();
        assert_eq!(same, Permissions::READ_ONLY);

        let other = resolve(
            EntityKind::Experiments,
            &record,
            &Requester::new(5, 2),
            &groups,
        )
        .unwrap();
        assert_eq!(other, Permissions::NONE);
    }

    #[test]
    fn admin_reads_but_never_writes_foreign_experiments() {
        let groups = StaticTeamGroups::new();
        let requester = Requester::admin(5, 1);
        for visibility in VISIBILITIES {
            let permissions = resolve(
                EntityKind::Experiments,
                &experiment(7, 9, visibility),
                &requester,
                &groups,
            )
            .unwrap();
            assert_eq!(permissions, Permissions::READ_ONLY, "visibility `{visibility}`");
        }
    }

    #[test]
    fn group_visibility_checks_requester_membership() {
        let counting = CountingGroups {
            calls: Cell::new(0),
            inner: StaticTeamGroups::new().with_member(5, 3).with_member(7, 8),
        };

        let member = resolve(
            EntityKind::Experiments,
            &experiment(7, 1, "3"),
            &Requester::new(5, 2),
            &counting,
        )
        .unwrap();
        assert_eq!(member, Permissions::READ_ONLY);

        // Only the owner (7) belongs to group 8; that does not open it to 5.
        let owner_only = resolve(
            EntityKind::Experiments,
            &experiment(7, 1, "8"),
            &Requester::new(5, 1),
            &counting,
        )
        .unwrap();
        assert_eq!(owner_only, Permissions::NONE);
        assert_eq!(counting.calls.get(), 2);

        let _ = resolve(
            EntityKind::Experiments,
            &experiment(7, 1, "public"),
            &Requester::new(5, 1),
            &counting,
        )
        .unwrap();
        assert_eq!(counting.calls.get(), 2);
    }

    #[test]
    fn integer_group_visibility_resolves_through_membership() {
        let groups = StaticTeamGroups::new().with_member(5, 3);
        let record = Record::new()
            .with("id", 42)
            .with("userid", 7)
            .with("team", 1)
            .with("visibility", 3);

        let member = resolve(EntityKind::Experiments, &record, &Requester::new(5, 1), &groups);
        assert_eq!(member.unwrap(), Permissions::READ_ONLY);

        let outsider = resolve(EntityKind::Experiments, &record, &Requester::new(6, 1), &groups);
        assert_eq!(outsider.unwrap(), Permissions::NONE);

        let zero_group = record.clone().with("visibility", 0);
        let denied = resolve(EntityKind::Experiments, &zero_group, &Requester::new(5, 1), &groups);
        assert_eq!(denied.unwrap(), Permissions::NONE);
    }

    #[test]
    fn unknown_visibility_grants_nothing_to_others() {
        let permissions = resolve(
            EntityKind::Experiments,
            &experiment(7, 1, "user"),
            &Requester::new(5, 1),
            &StaticTeamGroups::new(),
        )
        .unwrap();
        assert_eq!(permissions, Permissions::NONE);
    }

    #[test]
    fn membership_lookup_failure_propagates() {
        let err = resolve(
            EntityKind::Experiments,
            &experiment(7, 1, "3"),
            &Requester::new(5, 1),
            &FailingGroups,
        )
        .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Query);
    }

    #[test]
    fn malformed_record_is_rejected_instead_of_denied() {
        let record = Record::new().with("id", 1).with("team", 1);
        let err = resolve(
            EntityKind::Experiments,
            &record,
            &Requester::new(5, 1),
            &StaticTeamGroups::new(),
        )
        .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Query);
    }

    #[test]
    fn require_or_fail_gates_each_access() {
        let groups = StaticTeamGroups::new();
        let record = experiment(7, 1, "team");
        let requester = Requester::new(5, 1);

        require_or_fail(
            EntityKind::Experiments,
            &record,
            &requester,
            &groups,
            Access::Read,
        )
        .unwrap();

        let err = require_or_fail(
            EntityKind::Experiments,
            &record,
            &requester,
            &groups,
            Access::Write,
        )
        .unwrap_err();
        match err {
            EntityError::PermissionDenied { kind, id, access } => {
                assert_eq!(kind, EntityKind::Experiments);
                assert_eq!(id, Some(40));
                assert_eq!(access, Access::Write);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
