//! Case section operations.
//!
//! Every mutation here runs as one transaction that also touches the parent
//! case's audit columns. There is no partial success: if either statement
//! fails, both roll back, and a section can never be created, updated or
//! deleted without its case's `updated_at`/`updated_by` moving with it.
//!
//! A natural-key collision on insert is surfaced as `ResourceAlreadyExists`
//! with no retry. Unlike contact creation (keyed by an externally generated
//! `task_id` that two racing requests legitimately share), a duplicate
//! section key is a caller error, so the asymmetry is deliberate.

use crate::client::Db;
use crate::error::{DbError, DbResult};
use crate::notify::{ChangeEvent, ChangeOperation, EntityKind};
use crate::rows::section_from_row;
use crate::write::{event_payload, TOUCH_CASE_SQL};
use careline_core::{CaseId, CaseSection, CaseSectionUpdate, NewCaseSection};

const INSERT_SECTION_SQL: &str = "INSERT INTO case_sections \
     (account_id, case_id, section_type, section_id, event_timestamp, \
      section_type_specific_data, created_at, created_by) \
     VALUES ($1, $2, $3, $4, $5, $6, CURRENT_TIMESTAMP, $7) \
     RETURNING *";

const GET_SECTION_SQL: &str = "SELECT case_sections.* FROM case_sections \
     WHERE account_id = $1 AND case_id = $2 AND section_type = $3 AND section_id = $4";

const UPDATE_SECTION_SQL: &str = "UPDATE case_sections SET \
     event_timestamp = COALESCE($6, event_timestamp), \
     section_type_specific_data = COALESCE($7, section_type_specific_data), \
     updated_at = CURRENT_TIMESTAMP, \
     updated_by = $5 \
     WHERE account_id = $1 AND case_id = $2 AND section_type = $3 AND section_id = $4 \
     RETURNING *";

const DELETE_SECTION_SQL: &str = "DELETE FROM case_sections \
     WHERE account_id = $1 AND case_id = $2 AND section_type = $3 AND section_id = $4 \
     RETURNING *";

impl Db {
    /// Fetch one section by its natural key.
    pub async fn get_case_section(
        &self,
        account_id: &str,
        case_id: CaseId,
        section_type: &str,
        section_id: &str,
    ) -> DbResult<Option<CaseSection>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                GET_SECTION_SQL,
                &[&account_id, &case_id, &section_type, &section_id],
            )
            .await?;
        Ok(row.as_ref().map(section_from_row))
    }

    /// Create a section and touch its parent case, atomically.
    pub async fn create_case_section(
        &self,
        account_id: &str,
        case_id: CaseId,
        new_section: &NewCaseSection,
        acting_worker: &str,
    ) -> DbResult<CaseSection> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        let row = tx
            .query_one(
                INSERT_SECTION_SQL,
                &[
                    &account_id,
                    &case_id,
                    &new_section.section_type,
                    &new_section.section_id,
                    &new_section.event_timestamp,
                    &new_section.section_type_specific_data,
                    &acting_worker,
                ],
            )
            .await
            .map_err(|err| match DbError::from(err) {
                DbError::UniqueViolation { .. } => DbError::ResourceAlreadyExists {
                    entity: "case section",
                    key: format!(
                        "{case_id}/{}/{}",
                        new_section.section_type, new_section.section_id
                    ),
                },
                other => other,
            })?;
        let section = section_from_row(&row);

        let touched = tx
            .execute(TOUCH_CASE_SQL, &[&account_id, &case_id, &acting_worker])
            .await?;
        if touched == 0 {
            // Parent vanished between the FK check and the touch.
            return Err(DbError::ForeignKeyViolation { constraint: None });
        }
        tx.commit().await?;

        self.publish(ChangeEvent {
            account_id: account_id.to_string(),
            entity_kind: EntityKind::CaseSection,
            operation: ChangeOperation::Create,
            payload: event_payload(&section),
        });
        Ok(section)
    }

    /// Update a section and touch its parent case, atomically.
    ///
    /// Returns `Ok(None)` when no such section exists; nothing is touched
    /// in that case.
    pub async fn update_case_section(
        &self,
        account_id: &str,
        case_id: CaseId,
        section_type: &str,
        section_id: &str,
        update: &CaseSectionUpdate,
        acting_worker: &str,
    ) -> DbResult<Option<CaseSection>> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        let row = tx
            .query_opt(
                UPDATE_SECTION_SQL,
                &[
                    &account_id,
                    &case_id,
                    &section_type,
                    &section_id,
                    &acting_worker,
                    &update.event_timestamp,
                    &update.section_type_specific_data,
                ],
            )
            .await?;
        let Some(row) = row else {
            // Dropping the transaction rolls it back; the parent stays
            // untouched for a miss.
            return Ok(None);
        };
        let section = section_from_row(&row);

        tx.execute(TOUCH_CASE_SQL, &[&account_id, &case_id, &acting_worker])
            .await?;
        tx.commit().await?;

        self.publish(ChangeEvent {
            account_id: account_id.to_string(),
            entity_kind: EntityKind::CaseSection,
            operation: ChangeOperation::Update,
            payload: event_payload(&section),
        });
        Ok(Some(section))
    }

    /// Delete a section and touch its parent case, atomically.
    ///
    /// Returns the deleted section, or `Ok(None)` for a miss.
    pub async fn delete_case_section(
        &self,
        account_id: &str,
        case_id: CaseId,
        section_type: &str,
        section_id: &str,
        acting_worker: &str,
    ) -> DbResult<Option<CaseSection>> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        let row = tx
            .query_opt(
                DELETE_SECTION_SQL,
                &[&account_id, &case_id, &section_type, &section_id],
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let section = section_from_row(&row);

        tx.execute(TOUCH_CASE_SQL, &[&account_id, &case_id, &acting_worker])
            .await?;
        tx.commit().await?;

        self.publish(ChangeEvent {
            account_id: account_id.to_string(),
            entity_kind: EntityKind::CaseSection,
            operation: ChangeOperation::Delete,
            payload: event_payload(&section),
        });
        Ok(Some(section))
    }
}
