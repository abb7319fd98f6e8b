use std::time::Duration;

use chrono::{DateTime, Utc};
use rstest::rstest;

use rostersync_client::{Call, MemoryBackend, Op};
use rostersync_core::types::{
    ApprovalStatus, Branch, Credential, Email, EmailMatch, IdentityId, Profile, ProfileField,
    ProfileWrite, Role, RosterEntry, Secret,
};
use rostersync_sync::{
    pipeline, Action, Compensation, EntryStatus, IdentityAction, RunOptions, Stage,
};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn entry(email: &str) -> RosterEntry {
    RosterEntry {
        email: Email::from(email),
        display_name: "A".into(),
        credential: Credential::Password(Secret::new("s3cret")),
        branch: Branch::from("HN35"),
        role: Role::from("staff"),
    }
}

fn options() -> RunOptions {
    RunOptions {
        delay: Duration::ZERO,
        ..RunOptions::default()
    }
}

fn creating() -> RunOptions {
    RunOptions {
        create_missing: true,
        ..options()
    }
}

fn profile(key: &IdentityId, status: ApprovalStatus, role: &str, branch: &str) -> Profile {
    Profile {
        key: key.clone(),
        full_name: "Original Name".into(),
        role: Role::from(role),
        branch: Branch::from(branch),
        approval_status: status,
        approved_at: None,
        created_at: None,
        updated_at: None,
    }
}

#[test]
fn missing_identity_attempts_no_profile_operation() {
    let backend = MemoryBackend::new();
    let report = pipeline::run(&backend, &[entry("a@x.com")], &options(), now());

    assert_eq!(report.entries[0].status, EntryStatus::IdentityMissing);
    assert!(backend
        .calls()
        .iter()
        .all(|call| matches!(call, Call::ListIdentities { .. })));
}

#[test]
fn new_staff_member_is_created_with_approved_profile() {
    let backend = MemoryBackend::new();
    let report = pipeline::run(&backend, &[entry("a@x.com")], &creating(), now());

    let writes = backend.writes();
    assert_eq!(writes.len(), 2, "one create and one insert: {writes:?}");
    assert_eq!(
        writes[0],
        Call::CreateIdentity {
            email: "a@x.com".into()
        }
    );
    let Call::InsertProfile { key } = &writes[1] else {
        panic!("expected profile insert, got {:?}", writes[1]);
    };

    let row = backend.profile(key).expect("profile row");
    assert_eq!(row.branch, Branch::from("HN35"));
    assert_eq!(row.role, Role::from("staff"));
    assert_eq!(row.approval_status, ApprovalStatus::Approved);
    assert_eq!(row.approved_at, Some(now()));

    let identity = backend.identity_by_email("a@x.com").expect("identity");
    assert!(identity.email_confirmed);
    assert_eq!(identity.metadata["branch"], "HN35");

    let outcome = &report.entries[0];
    assert!(outcome.is_success());
    assert_eq!(
        outcome.status,
        EntryStatus::Reconciled {
            identity: IdentityAction::Created,
            profile: Action::Created,
        }
    );
}

#[test]
fn upsert_mode_writes_through_conflict_target() {
    let backend = MemoryBackend::new();
    let options = RunOptions {
        profile_write: ProfileWrite::Upsert,
        ..creating()
    };
    pipeline::run(&backend, &[entry("a@x.com")], &options, now());

    let writes = backend.writes();
    assert!(matches!(writes[1], Call::UpsertProfile { .. }), "{writes:?}");
}

#[test]
fn identity_without_profile_gets_one_insert() {
    let backend = MemoryBackend::new();
    let id = backend.add_identity("a@x.com", "old");

    pipeline::run(&backend, &[entry("a@x.com")], &options(), now());

    assert_eq!(backend.writes(), vec![Call::InsertProfile { key: id.clone() }]);
    assert_eq!(
        backend.profile(&id).map(|p| p.approval_status),
        Some(ApprovalStatus::Approved)
    );
}

#[rstest]
#[case::pending(ApprovalStatus::Pending, "staff", "HN35", vec![ProfileField::ApprovalStatus])]
#[case::rejected(ApprovalStatus::Rejected, "staff", "HN35", vec![ProfileField::ApprovalStatus])]
#[case::role_drift(ApprovalStatus::Approved, "manager", "HN35", vec![ProfileField::Role])]
#[case::branch_drift(ApprovalStatus::Approved, "staff", "HN01", vec![ProfileField::Branch])]
#[case::everything(
    ApprovalStatus::Pending,
    "manager",
    "HN01",
    vec![ProfileField::ApprovalStatus, ProfileField::Role, ProfileField::Branch]
)]
fn stale_profile_gets_one_update_of_drifted_fields(
    #[case] status: ApprovalStatus,
    #[case] role: &str,
    #[case] branch: &str,
    #[case] expected: Vec<ProfileField>,
) {
    let backend = MemoryBackend::new();
    let id = backend.add_identity("a@x.com", "old");
    backend.add_profile(profile(&id, status, role, branch));

    let report = pipeline::run(&backend, &[entry("a@x.com")], &options(), now());

    assert_eq!(
        backend.writes(),
        vec![Call::UpdateProfile {
            key: id.clone(),
            fields: expected.clone(),
        }]
    );
    assert_eq!(
        report.entries[0].status,
        EntryStatus::Reconciled {
            identity: IdentityAction::Existing,
            profile: Action::Updated { fields: expected },
        }
    );

    let row = backend.profile(&id).expect("row");
    assert_eq!(row.approval_status, ApprovalStatus::Approved);
    assert_eq!(row.role, Role::from("staff"));
    assert_eq!(row.branch, Branch::from("HN35"));
    assert_eq!(row.full_name, "Original Name", "unrelated fields untouched");
}

#[rstest]
#[case::status_change(ApprovalStatus::Pending, "staff", "HN35")]
#[case::role_only(ApprovalStatus::Approved, "manager", "HN35")]
#[case::branch_only(ApprovalStatus::Approved, "staff", "HN01")]
fn every_profile_update_stamps_approval(
    #[case] status: ApprovalStatus,
    #[case] role: &str,
    #[case] branch: &str,
) {
    let backend = MemoryBackend::new();
    let id = backend.add_identity("a@x.com", "old");
    backend.add_profile(profile(&id, status, role, branch));

    pipeline::run(&backend, &[entry("a@x.com")], &options(), now());
    assert_eq!(backend.profile(&id).and_then(|p| p.approved_at), Some(now()));
}

#[test]
fn unchanged_profile_keeps_its_approval_stamp() {
    let backend = MemoryBackend::new();
    let id = backend.add_identity("a@x.com", "old");
    backend.add_profile(profile(&id, ApprovalStatus::Approved, "staff", "HN35"));

    pipeline::run(&backend, &[entry("a@x.com")], &options(), now());
    assert_eq!(backend.profile(&id).and_then(|p| p.approved_at), None);
}

#[test]
fn matching_profile_issues_no_writes() {
    let backend = MemoryBackend::new();
    let id = backend.add_identity("a@x.com", "old");
    backend.add_profile(profile(&id, ApprovalStatus::Approved, "staff", "HN35"));

    let report = pipeline::run(&backend, &[entry("a@x.com")], &options(), now());

    assert!(backend.writes().is_empty());
    assert_eq!(report.summary().unchanged, 1);
}

#[test]
fn second_run_is_idempotent() {
    let backend = MemoryBackend::new();
    let roster = [entry("a@x.com"), entry("b@x.com")];
    let stale = backend.add_identity("b@x.com", "old");
    backend.add_profile(profile(&stale, ApprovalStatus::Pending, "manager", "HN01"));

    let first = pipeline::run(&backend, &roster, &creating(), now());
    assert!(!first.has_failures());
    assert!(!backend.writes().is_empty());

    backend.clear_calls();
    let second = pipeline::run(&backend, &roster, &creating(), now());
    assert!(backend.writes().is_empty(), "{:?}", backend.writes());
    assert_eq!(second.summary().unchanged, 2);
}

#[rstest]
#[case::insert(ProfileWrite::Insert, Op::InsertProfile)]
#[case::upsert(ProfileWrite::Upsert, Op::UpsertProfile)]
fn failed_profile_write_deletes_fresh_identity(#[case] write: ProfileWrite, #[case] op: Op) {
    let backend = MemoryBackend::new();
    backend.fail_on(op);
    let options = RunOptions {
        profile_write: write,
        ..creating()
    };

    let report = pipeline::run(&backend, &[entry("a@x.com")], &options, now());

    let writes = backend.writes();
    assert_eq!(writes.len(), 3, "{writes:?}");
    let Call::DeleteIdentity { id } = &writes[2] else {
        panic!("expected compensating delete, got {:?}", writes[2]);
    };
    let outcome = &report.entries[0];
    assert_eq!(outcome.identity_id.as_ref(), Some(id));
    assert!(matches!(
        &outcome.status,
        EntryStatus::Failed {
            stage: Stage::WriteProfile,
            compensation: Some(Compensation::IdentityDeleted),
            ..
        }
    ));
    assert!(backend.identities().is_empty());
}

#[test]
fn failed_compensation_is_recorded() {
    let backend = MemoryBackend::new();
    backend.fail_on(Op::InsertProfile);
    backend.fail_on(Op::DeleteIdentity);

    let report = pipeline::run(&backend, &[entry("a@x.com")], &creating(), now());

    assert!(matches!(
        &report.entries[0].status,
        EntryStatus::Failed {
            compensation: Some(Compensation::DeleteFailed { .. }),
            ..
        }
    ));
    assert_eq!(backend.identities().len(), 1, "orphan left behind");
}

#[test]
fn existing_identity_profile_failure_never_deletes() {
    let backend = MemoryBackend::new();
    backend.add_identity("a@x.com", "old");
    backend.fail_on(Op::InsertProfile);

    let report = pipeline::run(&backend, &[entry("a@x.com")], &creating(), now());

    assert!(report.has_failures());
    assert!(!backend
        .calls()
        .iter()
        .any(|call| matches!(call, Call::DeleteIdentity { .. })));
}

#[test]
fn listing_failure_fails_every_entry_but_run_continues() {
    let backend = MemoryBackend::new();
    backend.fail_on(Op::ListIdentities);

    let report = pipeline::run(
        &backend,
        &[entry("a@x.com"), entry("b@x.com")],
        &options(),
        now(),
    );

    assert_eq!(report.entries.len(), 2);
    assert!(report.entries.iter().all(|outcome| matches!(
        outcome.status,
        EntryStatus::Failed {
            stage: Stage::Resolve,
            ..
        }
    )));
}

#[test]
fn one_failing_entry_does_not_stop_the_next() {
    let backend = MemoryBackend::new();
    backend.add_identity("a@x.com", "old");
    backend.add_identity("b@x.com", "old");
    backend.fail_on(Op::SelectProfile);

    let report = pipeline::run(
        &backend,
        &[entry("a@x.com"), entry("b@x.com")],
        &options(),
        now(),
    );
    assert_eq!(report.summary().failed, 2);

    backend.clear_failures();
    let report = pipeline::run(
        &backend,
        &[entry("a@x.com"), entry("b@x.com")],
        &options(),
        now(),
    );
    assert_eq!(report.summary().created, 2);
}

#[rstest]
#[case::exact(EmailMatch::Exact, false)]
#[case::case_insensitive(EmailMatch::CaseInsensitive, true)]
fn email_match_mode_controls_resolution(#[case] mode: EmailMatch, #[case] found: bool) {
    let backend = MemoryBackend::new();
    backend.add_identity("A@X.com", "old");
    let options = RunOptions {
        email_match: mode,
        ..options()
    };

    let report = pipeline::run(&backend, &[entry("a@x.com")], &options, now());

    assert_eq!(report.entries[0].identity_id.is_some(), found);
    assert_eq!(report.entries[0].status == EntryStatus::IdentityMissing, !found);
}

#[test]
fn resolution_walks_every_page() {
    let backend = MemoryBackend::new();
    for i in 0..5 {
        backend.add_identity(&format!("filler{i}@x.com"), "pw");
    }
    let id = backend.add_identity("a@x.com", "old");
    let options = RunOptions {
        page_size: 2,
        ..options()
    };

    let report = pipeline::run(&backend, &[entry("a@x.com")], &options, now());

    assert_eq!(report.entries[0].identity_id, Some(id));
}

#[test]
fn dry_run_reports_plan_without_writing() {
    let backend = MemoryBackend::new();
    let stale = backend.add_identity("b@x.com", "old");
    backend.add_profile(profile(&stale, ApprovalStatus::Pending, "staff", "HN35"));
    let options = RunOptions {
        dry_run: true,
        reset_credentials: true,
        ..creating()
    };

    let report = pipeline::run(
        &backend,
        &[entry("a@x.com"), entry("b@x.com")],
        &options,
        now(),
    );

    assert!(backend.writes().is_empty());
    assert!(report.dry_run);
    assert_eq!(
        report.entries[0].status,
        EntryStatus::Reconciled {
            identity: IdentityAction::WouldCreate,
            profile: Action::WouldCreate,
        }
    );
    assert_eq!(
        report.entries[1].status,
        EntryStatus::Reconciled {
            identity: IdentityAction::WouldResetCredentials,
            profile: Action::WouldUpdate {
                fields: vec![ProfileField::ApprovalStatus]
            },
        }
    );
    assert_eq!(report.summary().planned, 2);
}

#[test]
fn reset_credentials_updates_existing_identity_first() {
    let backend = MemoryBackend::new();
    let id = backend.add_identity("a@x.com", "old");
    let options = RunOptions {
        reset_credentials: true,
        ..options()
    };

    let report = pipeline::run(&backend, &[entry("a@x.com")], &options, now());

    assert_eq!(
        backend.writes(),
        vec![
            Call::UpdateIdentity {
                id: id.clone(),
                password: true
            },
            Call::InsertProfile { key: id },
        ]
    );
    assert_eq!(
        report.entries[0].status,
        EntryStatus::Reconciled {
            identity: IdentityAction::CredentialsReset,
            profile: Action::Created,
        }
    );
    let identity = backend.identity_by_email("a@x.com").expect("identity");
    assert_eq!(identity.metadata["full_name"], "A");
}
