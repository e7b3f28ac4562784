//! Timeline Merger.
//!
//! Unions case-section events and contact events for one or more cases into
//! a single time-ordered, paginated, counted stream. Contact rows are
//! filtered by the same compiled view-contact permission predicate as the
//! contact list queries.

use crate::client::Db;
use crate::error::{DbError, DbResult};
use crate::list::push_permission_clause;
use crate::paging::Pagination;
use crate::sql::{borrow_params, ParamBinder, SqlParam};
use careline_core::{
    CallerIdentity, CaseId, ContactCondition, TimelineActivity, TimelineActivityKind,
};
use serde_json::Value as JsonValue;
use tokio_postgres::Row;

/// Marker meaning "all section types" in a timeline request.
pub const SECTION_TYPE_WILDCARD: &str = "*";

/// A timeline request for one or more cases.
///
/// `section_types` containing [`SECTION_TYPE_WILDCARD`] selects every
/// section type; an empty list selects none. With contacts also excluded the
/// request has no source left - [`TimelineRequest::validate`] rejects that
/// combination for callers that want the error up front, while
/// [`Db::timeline`] fast-paths it to an empty page.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRequest {
    pub case_ids: Vec<CaseId>,
    pub section_types: Vec<String>,
    pub include_contacts: bool,
    pub pagination: Pagination,
}

impl TimelineRequest {
    fn wants_all_section_types(&self) -> bool {
        self.section_types.iter().any(|t| t == SECTION_TYPE_WILDCARD)
    }

    fn include_sections(&self) -> bool {
        !self.section_types.is_empty()
    }

    fn has_source(&self) -> bool {
        self.include_contacts || self.include_sections()
    }

    /// Reject requests with every activity source excluded.
    pub fn validate(&self) -> DbResult<()> {
        if !self.has_source() {
            return Err(DbError::InvalidSettings(
                "timeline request excludes both case sections and contacts".to_string(),
            ));
        }
        Ok(())
    }
}

/// One page of merged timeline activity.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePage {
    /// Total activity count before pagination.
    pub count: i64,
    pub activities: Vec<TimelineActivity>,
}

impl TimelinePage {
    pub fn empty() -> Self {
        Self {
            count: 0,
            activities: Vec::new(),
        }
    }
}

// ============================================================================
// SQL COMPOSITION
// ============================================================================

/// Build the merged timeline statement. At least one source must be
/// included; the caller (or [`Db::timeline`]) handles the zero-source case.
pub fn build_timeline_sql(
    account_id: &str,
    user: &CallerIdentity,
    view_contact_permissions: &[Vec<ContactCondition>],
    request: &TimelineRequest,
) -> (String, Vec<SqlParam>) {
    let mut binder = ParamBinder::new();
    let account = binder.push(SqlParam::Text(account_id.to_string()));
    let case_ids = binder.push(SqlParam::LongArray(request.case_ids.clone()));

    let mut sources = Vec::new();
    if request.include_sections() {
        let mut clauses = vec![
            format!("case_sections.account_id = {account}"),
            format!("case_sections.case_id = ANY({case_ids})"),
        ];
        if !request.wants_all_section_types() {
            let types = binder.push(SqlParam::TextArray(request.section_types.clone()));
            clauses.push(format!("case_sections.section_type = ANY({types})"));
        }
        sources.push(format!(
            "SELECT case_sections.event_timestamp AS timestamp, \
             case_sections.case_id AS case_id, \
             'case-section' AS activity_type, \
             to_jsonb(case_sections.*) AS activity \
             FROM case_sections WHERE {}",
            clauses.join(" AND "),
        ));
    }
    if request.include_contacts {
        let mut clauses = vec![
            format!("contacts.account_id = {account}"),
            format!("contacts.case_id = ANY({case_ids})"),
        ];
        push_permission_clause(view_contact_permissions, user, &mut binder, &mut clauses);
        sources.push(format!(
            "SELECT contacts.time_of_contact AS timestamp, \
             contacts.case_id AS case_id, \
             'contact' AS activity_type, \
             to_jsonb(contacts.*) AS activity \
             FROM contacts WHERE {}",
            clauses.join(" AND "),
        ));
    }

    let limit = binder.push(SqlParam::Long(request.pagination.limit()));
    let offset = binder.push(SqlParam::Long(request.pagination.offset()));

    // UNION ALL, not UNION: rows from the two sources can never collide
    // (activity_type differs), so there is nothing to deduplicate.
    let sql = format!(
        "SELECT timestamp, case_id, activity_type, activity, \
         COUNT(*) OVER () AS total_count FROM (\
         {sources}\
         ) AS activities \
         ORDER BY timestamp DESC \
         LIMIT {limit} OFFSET {offset}",
        sources = sources.join(" UNION ALL "),
    );
    (sql, binder.into_params())
}

fn activity_from_row(row: &Row) -> DbResult<TimelineActivity> {
    let activity_type: String = row.get("activity_type");
    let payload: JsonValue = row.get("activity");
    let activity = match activity_type.as_str() {
        "case-section" => TimelineActivityKind::CaseSection(
            serde_json::from_value(payload)
                .map_err(|e| DbError::InvalidInput(format!("malformed section row: {e}")))?,
        ),
        "contact" => TimelineActivityKind::Contact(
            serde_json::from_value(payload)
                .map_err(|e| DbError::InvalidInput(format!("malformed contact row: {e}")))?,
        ),
        other => {
            return Err(DbError::InvalidInput(format!(
                "unknown timeline activity type {other:?}"
            )))
        }
    };
    Ok(TimelineActivity {
        timestamp: row.get("timestamp"),
        case_id: row.get("case_id"),
        activity,
    })
}

// ============================================================================
// EXECUTION
// ============================================================================

impl Db {
    /// Merged, permission-scoped activity timeline across the requested
    /// cases, ordered by timestamp descending.
    ///
    /// With both sources excluded this returns an empty page without
    /// touching the database - that combination is a caller programming
    /// error, not a data condition, so it is logged rather than raised.
    pub async fn timeline(
        &self,
        account_id: &str,
        user: &CallerIdentity,
        view_contact_permissions: &[Vec<ContactCondition>],
        request: &TimelineRequest,
    ) -> DbResult<TimelinePage> {
        if !request.has_source() {
            tracing::warn!(
                account_id,
                case_ids = ?request.case_ids,
                "timeline requested with no activity source selected"
            );
            return Ok(TimelinePage::empty());
        }

        let (sql, params) =
            build_timeline_sql(account_id, user, view_contact_permissions, request);
        let conn = self.conn().await?;
        let rows = conn.query(&sql, &borrow_params(&params)).await?;

        let count = rows
            .first()
            .map(|row| row.get::<_, i64>("total_count"))
            .unwrap_or(0);
        let activities = rows
            .iter()
            .map(activity_from_row)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(TimelinePage { count, activities })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer() -> CallerIdentity {
        CallerIdentity::counsellor("WK-1")
    }

    fn request(section_types: &[&str], include_contacts: bool) -> TimelineRequest {
        TimelineRequest {
            case_ids: vec![11, 12],
            section_types: section_types.iter().map(|s| s.to_string()).collect(),
            include_contacts,
            pagination: Pagination::default(),
        }
    }

    #[test]
    fn both_sources_union_all_ordered_by_timestamp() {
        let user = viewer();
        let permissions = vec![vec![ContactCondition::Everyone]];
        let (sql, params) =
            build_timeline_sql("AC-test", &user, &permissions, &request(&["note"], true));
        assert!(sql.contains("UNION ALL"));
        assert!(sql.contains("FROM case_sections"));
        assert!(sql.contains("FROM contacts"));
        assert!(sql.contains("ORDER BY timestamp DESC"));
        assert!(sql.contains("COUNT(*) OVER () AS total_count"));
        assert_eq!(params[1], SqlParam::LongArray(vec![11, 12]));
    }

    #[test]
    fn wildcard_selects_every_section_type() {
        let user = viewer();
        let (sql, _) = build_timeline_sql(
            "AC-test",
            &user,
            &[vec![ContactCondition::Everyone]],
            &request(&["note", SECTION_TYPE_WILDCARD], false),
        );
        assert!(!sql.contains("section_type = ANY"));
    }

    #[test]
    fn contacts_only_request_skips_case_sections() {
        let user = viewer();
        let (sql, _) = build_timeline_sql(
            "AC-test",
            &user,
            &[vec![ContactCondition::Everyone]],
            &request(&[], true),
        );
        assert!(!sql.contains("case_sections"));
        assert!(!sql.contains("UNION ALL"));
        assert!(sql.contains("FROM contacts"));
    }

    #[test]
    fn contact_source_carries_the_permission_predicate() {
        let user = viewer();
        let permissions = vec![vec![ContactCondition::IsOwner]];
        let (sql, params) =
            build_timeline_sql("AC-test", &user, &permissions, &request(&[], true));
        assert!(sql.contains("contacts.counsellor_id = $3"));
        assert_eq!(params[2], SqlParam::Text("WK-1".to_string()));

        // Deny-all contact permissions keep the source but return no rows.
        let (sql, _) = build_timeline_sql("AC-test", &user, &[], &request(&["*"], true));
        assert!(sql.contains("1=0"));
    }

    #[test]
    fn validate_rejects_sourceless_requests() {
        let err = request(&[], false).validate().unwrap_err();
        assert!(matches!(err, DbError::InvalidSettings(_)));
        assert!(request(&["*"], false).validate().is_ok());
        assert!(request(&[], true).validate().is_ok());
    }
}
