//! DB-backed tests for the touch-propagating write layer.
//!
//! Requires a PostgreSQL instance with `careline-db/schema.sql` applied and
//! `CARELINE_DB_*` pointing at it:
//!
//! ```bash
//! cargo test -p careline-db --features db-tests
//! ```

#![cfg(feature = "db-tests")]

use careline_core::{CaseRecordPatch, CaseSectionUpdate, NewContact};
use careline_db::{DbError, DbResult};
use careline_test_utils::{sample_new_case, sample_new_contact, sample_new_section};
use std::time::{SystemTime, UNIX_EPOCH};

#[path = "support/db.rs"]
mod test_db_support;
use test_db_support::test_db;

/// Fresh account id per test, so runs never interfere with each other or
/// with leftover rows from previous runs.
fn unique_account(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("AC{prefix}{nanos}")
}

#[tokio::test]
async fn case_create_leaves_update_audit_empty() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("cc");

    let case = db.create_case(&account, &sample_new_case(), "WKcreator").await?;
    assert_eq!(case.created_by, "WKcreator");
    assert_eq!(case.status, "open");
    assert!(case.updated_at.is_none());
    assert!(case.status_updated_at.is_none());
    assert!(case.previous_status.is_none());
    Ok(())
}

#[tokio::test]
async fn status_audit_moves_only_on_real_transitions() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("sa");
    let case = db.create_case(&account, &sample_new_case(), "WKcreator").await?;

    // Same-status patch: record is touched, status audit is not.
    let noop = CaseRecordPatch {
        status: Some("open".to_string()),
        ..Default::default()
    };
    let case = db
        .update_case_record(&account, case.id, &noop, "WKeditor")
        .await?
        .expect("case exists");
    assert_eq!(case.updated_by.as_deref(), Some("WKeditor"));
    assert!(case.status_updated_at.is_none());
    assert!(case.previous_status.is_none());

    // Actual transition: all three audit columns move together.
    let close = CaseRecordPatch {
        status: Some("closed".to_string()),
        ..Default::default()
    };
    let case = db
        .update_case_record(&account, case.id, &close, "WKcloser")
        .await?
        .expect("case exists");
    assert_eq!(case.status, "closed");
    assert_eq!(case.previous_status.as_deref(), Some("open"));
    assert_eq!(case.status_updated_by.as_deref(), Some("WKcloser"));
    assert!(case.status_updated_at.is_some());
    Ok(())
}

#[tokio::test]
async fn update_of_missing_case_returns_none() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("um");
    let patch = CaseRecordPatch {
        label: Some("ghost".to_string()),
        ..Default::default()
    };
    let updated = db.update_case_record(&account, 999_999, &patch, "WK1").await?;
    assert!(updated.is_none());
    Ok(())
}

#[tokio::test]
async fn section_mutations_touch_the_parent_case() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("st");
    let case = db.create_case(&account, &sample_new_case(), "WKcreator").await?;
    assert!(case.updated_at.is_none());

    let section = db
        .create_case_section(&account, case.id, &sample_new_section("s1"), "WKsection")
        .await?;
    assert_eq!(section.case_id, case.id);

    let touched = db.get_case(&account, case.id).await?.expect("case exists");
    assert_eq!(touched.updated_by.as_deref(), Some("WKsection"));
    let after_create = touched.updated_at.expect("touched");

    let update = CaseSectionUpdate {
        section_type_specific_data: Some(serde_json::json!({"note": "revised"})),
        ..Default::default()
    };
    db.update_case_section(&account, case.id, "note", "s1", &update, "WKrevise")
        .await?
        .expect("section exists");
    let touched = db.get_case(&account, case.id).await?.expect("case exists");
    assert_eq!(touched.updated_by.as_deref(), Some("WKrevise"));
    assert!(touched.updated_at.expect("touched") >= after_create);

    db.delete_case_section(&account, case.id, "note", "s1", "WKdelete")
        .await?
        .expect("section exists");
    let touched = db.get_case(&account, case.id).await?.expect("case exists");
    assert_eq!(touched.updated_by.as_deref(), Some("WKdelete"));
    Ok(())
}

#[tokio::test]
async fn section_miss_leaves_the_parent_untouched() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("sm");
    let case = db.create_case(&account, &sample_new_case(), "WKcreator").await?;

    let update = CaseSectionUpdate::default();
    let missing = db
        .update_case_section(&account, case.id, "note", "no-such", &update, "WKrevise")
        .await?;
    assert!(missing.is_none());

    let untouched = db.get_case(&account, case.id).await?.expect("case exists");
    assert!(untouched.updated_at.is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_section_key_is_already_exists_not_retry() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("sd");
    let case = db.create_case(&account, &sample_new_case(), "WKcreator").await?;

    db.create_case_section(&account, case.id, &sample_new_section("dup"), "WK1")
        .await?;
    let err = db
        .create_case_section(&account, case.id, &sample_new_section("dup"), "WK2")
        .await
        .expect_err("second insert must fail");
    assert!(matches!(err, DbError::ResourceAlreadyExists { .. }));

    // The failed transaction rolled back, so the second worker's touch never
    // committed: the parent still carries the first writer's audit stamp.
    let parent = db.get_case(&account, case.id).await?.expect("case exists");
    assert_eq!(parent.updated_by.as_deref(), Some("WK1"));
    Ok(())
}

#[tokio::test]
async fn section_against_missing_case_is_a_foreign_key_error() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("sf");
    let err = db
        .create_case_section(&account, 999_999, &sample_new_section("s1"), "WK1")
        .await
        .expect_err("no parent case");
    assert!(err.is_foreign_key_violation());
    Ok(())
}

#[tokio::test]
async fn contact_create_is_idempotent_on_task_id() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("ci");
    let new_contact = sample_new_contact("TKidem");

    let first = db.create_contact(&account, &new_contact, "WK1").await?;
    assert!(first.is_new);

    let second = db.create_contact(&account, &new_contact, "WK2").await?;
    assert!(!second.is_new);
    assert_eq!(second.record.id, first.record.id);
    assert_eq!(second.record.created_by, "WK1");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn racing_contact_creates_converge_on_one_row() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("cr");
    let new_contact = sample_new_contact("TKrace");

    let a = {
        let db = db.clone();
        let account = account.clone();
        let new_contact = new_contact.clone();
        tokio::spawn(async move { db.create_contact(&account, &new_contact, "WKa").await })
    };
    let b = {
        let db = db.clone();
        let account = account.clone();
        let new_contact = new_contact.clone();
        tokio::spawn(async move { db.create_contact(&account, &new_contact, "WKb").await })
    };

    let a = a.await.expect("task a panicked")?;
    let b = b.await.expect("task b panicked")?;
    assert_eq!(a.record.id, b.record.id);
    assert_eq!(
        u8::from(a.is_new) + u8::from(b.is_new),
        1,
        "exactly one racer inserts"
    );
    Ok(())
}

#[tokio::test]
async fn contact_create_with_case_touches_it() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("ct");
    let case = db.create_case(&account, &sample_new_case(), "WKcreator").await?;

    let new_contact = NewContact {
        case_id: Some(case.id),
        ..sample_new_contact("TKconnected")
    };
    let created = db.create_contact(&account, &new_contact, "WKcontact").await?;
    assert_eq!(created.record.case_id, Some(case.id));

    let touched = db.get_case(&account, case.id).await?.expect("case exists");
    assert_eq!(touched.updated_by.as_deref(), Some("WKcontact"));
    Ok(())
}

#[tokio::test]
async fn contact_create_against_missing_case_rolls_back() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("cm");
    let new_contact = NewContact {
        case_id: Some(999_999),
        ..sample_new_contact("TKorphaned")
    };
    let err = db
        .create_contact(&account, &new_contact, "WK1")
        .await
        .expect_err("no parent case");
    assert!(err.is_foreign_key_violation());

    // The whole transaction rolled back: no contact row either.
    let leaked = db.contact_by_task_id(&account, "TKorphaned").await?;
    assert!(leaked.is_none());
    Ok(())
}

#[tokio::test]
async fn connecting_a_contact_touches_the_new_case() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("cc2");
    let case = db.create_case(&account, &sample_new_case(), "WKcreator").await?;
    let contact = db
        .create_contact(&account, &sample_new_contact("TKmove"), "WK1")
        .await?
        .record;
    assert!(contact.case_id.is_none());

    let connected = db
        .set_contact_case(&account, contact.id, Some(case.id), "WKlinker")
        .await?
        .expect("contact exists");
    assert_eq!(connected.case_id, Some(case.id));
    let touched = db.get_case(&account, case.id).await?.expect("case exists");
    assert_eq!(touched.updated_by.as_deref(), Some("WKlinker"));

    let disconnected = db
        .set_contact_case(&account, contact.id, None, "WKremover")
        .await?
        .expect("contact exists");
    assert!(disconnected.case_id.is_none());

    // Disconnecting touches no case: the old parent keeps the audit stamp
    // from the connect.
    let old_parent = db.get_case(&account, case.id).await?.expect("case exists");
    assert_eq!(old_parent.updated_by.as_deref(), Some("WKlinker"));
    Ok(())
}

#[tokio::test]
async fn identifier_create_is_idempotent() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("id");

    let first = db.create_identifier(&account, "+254700000001", "WK1").await?;
    assert!(first.is_new);

    let second = db.create_identifier(&account, "+254700000001", "WK2").await?;
    assert!(!second.is_new);
    assert_eq!(second.record.id, first.record.id);
    assert_eq!(second.record.created_by, "WK1");

    // Same identifier under another account is a distinct row.
    let other = unique_account("id2");
    let elsewhere = db.create_identifier(&other, "+254700000001", "WK3").await?;
    assert!(elsewhere.is_new);
    Ok(())
}
