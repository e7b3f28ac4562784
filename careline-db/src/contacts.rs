//! Contact operations.
//!
//! Contact creation is idempotent on `task_id`: two near-simultaneous
//! creation requests for the same task must converge on one row. The insert
//! races the competing transaction's commit, so a unique-violation is
//! followed by a re-read, and if the winner has not committed yet the whole
//! create-or-fetch sequence retries (bounded).

use crate::client::Db;
use crate::error::{DbError, DbResult};
use crate::notify::{ChangeEvent, ChangeOperation, EntityKind};
use crate::rows::contact_from_row;
use crate::write::{event_payload, CreateResult, MAX_CREATE_ATTEMPTS, TOUCH_CASE_SQL};
use careline_core::{CaseId, Contact, ContactId, NewContact};

const INSERT_CONTACT_SQL: &str = "INSERT INTO contacts \
     (account_id, case_id, task_id, counsellor_id, time_of_contact, helpline, info, \
      created_at, created_by) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, CURRENT_TIMESTAMP, $8) \
     RETURNING *";

const GET_CONTACT_SQL: &str = "SELECT contacts.* FROM contacts WHERE account_id = $1 AND id = $2";

const CONTACT_BY_TASK_SQL: &str =
    "SELECT contacts.* FROM contacts WHERE account_id = $1 AND task_id = $2";

const SET_CONTACT_CASE_SQL: &str = "UPDATE contacts SET \
     case_id = $3, \
     updated_at = CURRENT_TIMESTAMP, \
     updated_by = $4 \
     WHERE account_id = $1 AND id = $2 \
     RETURNING *";

impl Db {
    /// Fetch a contact by id.
    pub async fn get_contact(
        &self,
        account_id: &str,
        contact_id: ContactId,
    ) -> DbResult<Option<Contact>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(GET_CONTACT_SQL, &[&account_id, &contact_id])
            .await?;
        Ok(row.as_ref().map(contact_from_row))
    }

    /// Fetch a contact by its account-unique task id.
    pub async fn contact_by_task_id(
        &self,
        account_id: &str,
        task_id: &str,
    ) -> DbResult<Option<Contact>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(CONTACT_BY_TASK_SQL, &[&account_id, &task_id])
            .await?;
        Ok(row.as_ref().map(contact_from_row))
    }

    /// Create a contact, idempotently when it carries a `task_id`.
    ///
    /// `is_new` tells the caller whether this call inserted the row or
    /// returned one created by a concurrent request. At most one of two
    /// racing callers observes `is_new == true`.
    pub async fn create_contact(
        &self,
        account_id: &str,
        new_contact: &NewContact,
        acting_worker: &str,
    ) -> DbResult<CreateResult<Contact>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_insert_contact(account_id, new_contact, acting_worker)
                .await
            {
                Ok(contact) => {
                    self.publish(ChangeEvent {
                        account_id: account_id.to_string(),
                        entity_kind: EntityKind::Contact,
                        operation: ChangeOperation::Create,
                        payload: event_payload(&contact),
                    });
                    return Ok(CreateResult {
                        record: contact,
                        is_new: true,
                    });
                }
                Err(err) if err.is_unique_violation() => {
                    let Some(task_id) = new_contact.task_id.as_deref() else {
                        // Not the idempotency key; nothing to converge on.
                        return Err(err);
                    };
                    if let Some(existing) = self.contact_by_task_id(account_id, task_id).await? {
                        return Ok(CreateResult {
                            record: existing,
                            is_new: false,
                        });
                    }
                    // The competing transaction has not committed yet.
                    if attempt >= MAX_CREATE_ATTEMPTS {
                        return Err(err);
                    }
                    tracing::debug!(
                        account_id,
                        task_id,
                        attempt,
                        "contact insert raced an uncommitted duplicate, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One insert attempt: contact row plus, when connected to a case, the
    /// parent touch, in a single transaction.
    async fn try_insert_contact(
        &self,
        account_id: &str,
        new_contact: &NewContact,
        acting_worker: &str,
    ) -> DbResult<Contact> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        let row = tx
            .query_one(
                INSERT_CONTACT_SQL,
                &[
                    &account_id,
                    &new_contact.case_id,
                    &new_contact.task_id,
                    &new_contact.counsellor_id,
                    &new_contact.time_of_contact,
                    &new_contact.helpline,
                    &new_contact.info,
                    &acting_worker,
                ],
            )
            .await?;
        let contact = contact_from_row(&row);

        if let Some(case_id) = new_contact.case_id {
            let touched = tx
                .execute(TOUCH_CASE_SQL, &[&account_id, &case_id, &acting_worker])
                .await?;
            if touched == 0 {
                return Err(DbError::ForeignKeyViolation { constraint: None });
            }
        }
        tx.commit().await?;
        Ok(contact)
    }

    /// Connect a contact to a case (`Some`) or disconnect it (`None`),
    /// touching the newly connected case in the same transaction.
    ///
    /// Only the new parent is touched: disconnecting leaves the formerly
    /// connected case's audit columns as they were.
    ///
    /// Returns `Ok(None)` when the contact does not exist.
    pub async fn set_contact_case(
        &self,
        account_id: &str,
        contact_id: ContactId,
        case_id: Option<CaseId>,
        acting_worker: &str,
    ) -> DbResult<Option<Contact>> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        let row = tx
            .query_opt(
                SET_CONTACT_CASE_SQL,
                &[&account_id, &contact_id, &case_id, &acting_worker],
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let contact = contact_from_row(&row);

        if let Some(case_id) = case_id {
            let touched = tx
                .execute(TOUCH_CASE_SQL, &[&account_id, &case_id, &acting_worker])
                .await?;
            if touched == 0 {
                return Err(DbError::ForeignKeyViolation { constraint: None });
            }
        }
        tx.commit().await?;

        self.publish(ChangeEvent {
            account_id: account_id.to_string(),
            entity_kind: EntityKind::Contact,
            operation: ChangeOperation::Update,
            payload: event_payload(&contact),
        });
        Ok(Some(contact))
    }
}
