//! Case record operations.
//!
//! The status-transition audit trail lives entirely in one UPDATE statement:
//! every CASE expression evaluates against the pre-update row, so
//! `previous_status`, `status_updated_at` and `status_updated_by` move only
//! when the incoming status genuinely differs from the stored one.

use crate::client::Db;
use crate::error::DbResult;
use crate::notify::{ChangeEvent, ChangeOperation, EntityKind};
use crate::rows::case_from_row;
use crate::write::event_payload;
use careline_core::{Case, CaseId, CaseRecordPatch, NewCase};

const INSERT_CASE_SQL: &str = "INSERT INTO cases \
     (account_id, status, helpline, label, info, definition_version, created_at, created_by) \
     VALUES ($1, $2, $3, $4, $5, $6, CURRENT_TIMESTAMP, $7) \
     RETURNING *";

const GET_CASE_SQL: &str = "SELECT cases.* FROM cases WHERE account_id = $1 AND id = $2";

// The three status-audit columns move together, and only on an actual
// status transition. COALESCE keeps omitted patch fields untouched.
const UPDATE_CASE_SQL: &str = "UPDATE cases SET \
     info = COALESCE($4, info), \
     label = COALESCE($5, label), \
     previous_status = CASE \
         WHEN $6::text IS NOT NULL AND $6::text IS DISTINCT FROM status \
         THEN status ELSE previous_status END, \
     status_updated_at = CASE \
         WHEN $6::text IS NOT NULL AND $6::text IS DISTINCT FROM status \
         THEN CURRENT_TIMESTAMP ELSE status_updated_at END, \
     status_updated_by = CASE \
         WHEN $6::text IS NOT NULL AND $6::text IS DISTINCT FROM status \
         THEN $3 ELSE status_updated_by END, \
     status = COALESCE($6, status), \
     updated_at = CURRENT_TIMESTAMP, \
     updated_by = $3 \
     WHERE account_id = $1 AND id = $2 \
     RETURNING *";

impl Db {
    /// Create a case.
    pub async fn create_case(
        &self,
        account_id: &str,
        new_case: &NewCase,
        acting_worker: &str,
    ) -> DbResult<Case> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                INSERT_CASE_SQL,
                &[
                    &account_id,
                    &new_case.status,
                    &new_case.helpline,
                    &new_case.label,
                    &new_case.info,
                    &new_case.definition_version,
                    &acting_worker,
                ],
            )
            .await?;
        let case = case_from_row(&row);

        self.publish(ChangeEvent {
            account_id: account_id.to_string(),
            entity_kind: EntityKind::Case,
            operation: ChangeOperation::Create,
            payload: event_payload(&case),
        });
        Ok(case)
    }

    /// Fetch a case by id.
    pub async fn get_case(&self, account_id: &str, case_id: CaseId) -> DbResult<Option<Case>> {
        let conn = self.conn().await?;
        let row = conn.query_opt(GET_CASE_SQL, &[&account_id, &case_id]).await?;
        Ok(row.as_ref().map(case_from_row))
    }

    /// Patch the case record (status/label/info).
    ///
    /// Returns `Ok(None)` for a missing case; mapping that to a 404 is the
    /// caller's decision.
    pub async fn update_case_record(
        &self,
        account_id: &str,
        case_id: CaseId,
        patch: &CaseRecordPatch,
        acting_worker: &str,
    ) -> DbResult<Option<Case>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                UPDATE_CASE_SQL,
                &[
                    &account_id,
                    &case_id,
                    &acting_worker,
                    &patch.info,
                    &patch.label,
                    &patch.status,
                ],
            )
            .await?;
        let updated = row.as_ref().map(case_from_row);

        if let Some(case) = &updated {
            self.publish(ChangeEvent {
                account_id: account_id.to_string(),
                entity_kind: EntityKind::Case,
                operation: ChangeOperation::Update,
                payload: event_payload(case),
            });
        }
        Ok(updated)
    }
}
