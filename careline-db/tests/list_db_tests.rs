//! DB-backed tests for list queries and the merged timeline.
//!
//! Requires a PostgreSQL instance with `careline-db/schema.sql` applied and
//! `CARELINE_DB_*` pointing at it:
//!
//! ```bash
//! cargo test -p careline-db --features db-tests
//! ```

#![cfg(feature = "db-tests")]

use careline_core::{CallerIdentity, CaseCondition, ContactCondition, NewContact};
use careline_db::{
    CaseFilters, CaseListQuery, DbResult, Pagination, Sort, TimelineRequest,
    SECTION_TYPE_WILDCARD,
};
use careline_test_utils::{sample_new_case, sample_new_contact, sample_new_section};
use chrono::{Duration, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

#[path = "support/db.rs"]
mod test_db_support;
use test_db_support::test_db;

fn unique_account(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("AC{prefix}{nanos}")
}

fn everyone() -> Vec<Vec<CaseCondition>> {
    vec![vec![CaseCondition::Everyone]]
}

/// Seed `n` cases for `account`, each with one connected contact so the
/// default orphan exclusion keeps them visible.
async fn seed_cases(
    db: &careline_db::Db,
    account: &str,
    n: usize,
    created_by: &str,
) -> DbResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let case = db.create_case(account, &sample_new_case(), created_by).await?;
        let contact = NewContact {
            case_id: Some(case.id),
            ..sample_new_contact(&format!("TK{account}-{i}"))
        };
        db.create_contact(account, &contact, created_by).await?;
        ids.push(case.id);
    }
    Ok(ids)
}

#[tokio::test]
async fn list_is_scoped_to_the_account() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("ls");
    let other = unique_account("ls2");
    seed_cases(&db, &account, 2, "WK1").await?;
    seed_cases(&db, &other, 3, "WK1").await?;

    let user = CallerIdentity::counsellor("WK1");
    let permissions = everyone();
    let filters = CaseFilters::default();
    let page = db
        .list_cases(&CaseListQuery {
            account_id: &account,
            user: &user,
            permissions: &permissions,
            filters: &filters,
            sort: Sort::default(),
            pagination: Pagination::default(),
        })
        .await?;
    assert_eq!(page.total_count, 2);
    assert!(page.rows.iter().all(|c| c.account_id == account));
    Ok(())
}

#[tokio::test]
async fn case_with_many_contacts_appears_exactly_once() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("dd");
    let case = db.create_case(&account, &sample_new_case(), "WK1").await?;
    for i in 0..3 {
        let contact = NewContact {
            case_id: Some(case.id),
            ..sample_new_contact(&format!("TK{account}-{i}"))
        };
        db.create_contact(&account, &contact, "WK1").await?;
    }

    let user = CallerIdentity::counsellor("WK1");
    let permissions = everyone();
    // A search term matching all three connected contacts: the case must
    // still come back as one row with an entity-level count.
    let filters = CaseFilters {
        search_term: Some("Jo".to_string()),
        ..Default::default()
    };
    let page = db
        .list_cases(&CaseListQuery {
            account_id: &account,
            user: &user,
            permissions: &permissions,
            filters: &filters,
            sort: Sort::default(),
            pagination: Pagination::default(),
        })
        .await?;
    assert_eq!(page.total_count, 1, "total counts entities, not join rows");
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].id, case.id);
    Ok(())
}

#[tokio::test]
async fn total_count_is_page_independent() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("tc");
    seed_cases(&db, &account, 5, "WK1").await?;

    let user = CallerIdentity::counsellor("WK1");
    let permissions = everyone();
    let filters = CaseFilters::default();
    let page = db
        .list_cases(&CaseListQuery {
            account_id: &account,
            user: &user,
            permissions: &permissions,
            filters: &filters,
            sort: Sort::default(),
            pagination: Pagination::new(Some(2), Some(2)),
        })
        .await?;
    assert_eq!(page.total_count, 5);
    assert_eq!(page.rows.len(), 2);
    Ok(())
}

#[tokio::test]
async fn creator_permission_narrows_the_list() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("cp");
    seed_cases(&db, &account, 2, "WKmine").await?;
    seed_cases(&db, &account, 3, "WKother").await?;

    let user = CallerIdentity::counsellor("WKmine");
    let permissions = vec![vec![CaseCondition::IsCreator]];
    let filters = CaseFilters::default();
    let page = db
        .list_cases(&CaseListQuery {
            account_id: &account,
            user: &user,
            permissions: &permissions,
            filters: &filters,
            sort: Sort::default(),
            pagination: Pagination::default(),
        })
        .await?;
    assert_eq!(page.total_count, 2);
    assert!(page.rows.iter().all(|c| c.created_by == "WKmine"));

    // An empty rule structure denies everything without erroring.
    let none = db
        .list_cases(&CaseListQuery {
            account_id: &account,
            user: &user,
            permissions: &[],
            filters: &filters,
            sort: Sort::default(),
            pagination: Pagination::default(),
        })
        .await?;
    assert_eq!(none.total_count, 0);
    assert!(none.rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn search_by_ids_preserves_external_rank_order() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("sr");
    let ids = seed_cases(&db, &account, 3, "WK1").await?;

    let user = CallerIdentity::counsellor("WK1");
    let ranked = vec![ids[2], ids[0], ids[1]];
    let found = db
        .search_cases_by_ids(&account, &user, &everyone(), &ranked)
        .await?;
    let found_ids: Vec<i64> = found.iter().map(|c| c.id).collect();
    assert_eq!(found_ids, ranked);

    let empty = db.search_cases_by_ids(&account, &user, &everyone(), &[]).await?;
    assert!(empty.is_empty());
    Ok(())
}

#[tokio::test]
async fn timeline_merges_sources_newest_first() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("tl");
    let case = db.create_case(&account, &sample_new_case(), "WK1").await?;

    let now = Utc::now();
    let mut old_section = sample_new_section("old");
    old_section.event_timestamp = now - Duration::hours(3);
    db.create_case_section(&account, case.id, &old_section, "WK1").await?;

    let mut new_section = sample_new_section("new");
    new_section.event_timestamp = now - Duration::hours(1);
    db.create_case_section(&account, case.id, &new_section, "WK1").await?;

    let contact = NewContact {
        case_id: Some(case.id),
        time_of_contact: now - Duration::hours(2),
        ..sample_new_contact(&format!("TK{account}"))
    };
    db.create_contact(&account, &contact, "WK1").await?;

    let user = CallerIdentity::counsellor("WK1");
    let permissions = vec![vec![ContactCondition::Everyone]];
    let page = db
        .timeline(
            &account,
            &user,
            &permissions,
            &TimelineRequest {
                case_ids: vec![case.id],
                section_types: vec![SECTION_TYPE_WILDCARD.to_string()],
                include_contacts: true,
                pagination: Pagination::default(),
            },
        )
        .await?;

    assert_eq!(page.count, 3);
    let timestamps: Vec<_> = page.activities.iter().map(|a| a.timestamp).collect();
    let mut sorted = timestamps.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(timestamps, sorted, "newest first");
    assert!(page.activities.iter().all(|a| a.case_id == case.id));
    Ok(())
}

#[tokio::test]
async fn timeline_contact_rows_respect_contact_permissions() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("tp");
    let case = db.create_case(&account, &sample_new_case(), "WK1").await?;
    db.create_case_section(&account, case.id, &sample_new_section("s1"), "WK1")
        .await?;
    let contact = NewContact {
        case_id: Some(case.id),
        ..sample_new_contact(&format!("TK{account}"))
    };
    db.create_contact(&account, &contact, "WK1").await?;

    // Deny-all contact permissions: sections still flow, contacts do not.
    let user = CallerIdentity::counsellor("WKstranger");
    let page = db
        .timeline(
            &account,
            &user,
            &[],
            &TimelineRequest {
                case_ids: vec![case.id],
                section_types: vec![SECTION_TYPE_WILDCARD.to_string()],
                include_contacts: true,
                pagination: Pagination::default(),
            },
        )
        .await?;
    assert_eq!(page.count, 1);
    assert_eq!(page.activities[0].activity.activity_type(), "case-section");
    Ok(())
}

#[tokio::test]
async fn sourceless_timeline_returns_an_empty_page() -> DbResult<()> {
    let db = test_db();
    let account = unique_account("te");
    let user = CallerIdentity::counsellor("WK1");
    let page = db
        .timeline(
            &account,
            &user,
            &[],
            &TimelineRequest {
                case_ids: vec![1],
                section_types: vec![],
                include_contacts: false,
                pagination: Pagination::default(),
            },
        )
        .await?;
    assert_eq!(page.count, 0);
    assert!(page.activities.is_empty());
    Ok(())
}
