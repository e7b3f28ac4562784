//! Identifier bookkeeping.
//!
//! Normalized external identifiers (phone numbers, handles) are recorded
//! once per account, with the same insert-or-fetch race tolerance as contact
//! creation: the natural key here is the normalized identifier string.

use crate::client::Db;
use crate::error::DbResult;
use crate::notify::{ChangeEvent, ChangeOperation, EntityKind};
use crate::rows::identifier_from_row;
use crate::write::{event_payload, CreateResult, MAX_CREATE_ATTEMPTS};
use careline_core::Identifier;

const INSERT_IDENTIFIER_SQL: &str = "INSERT INTO identifiers \
     (account_id, identifier, created_at, created_by) \
     VALUES ($1, $2, CURRENT_TIMESTAMP, $3) \
     RETURNING *";

const IDENTIFIER_BY_VALUE_SQL: &str =
    "SELECT identifiers.* FROM identifiers WHERE account_id = $1 AND identifier = $2";

impl Db {
    /// Fetch an identifier row by its normalized value.
    pub async fn identifier_by_value(
        &self,
        account_id: &str,
        identifier: &str,
    ) -> DbResult<Option<Identifier>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(IDENTIFIER_BY_VALUE_SQL, &[&account_id, &identifier])
            .await?;
        Ok(row.as_ref().map(identifier_from_row))
    }

    /// Record a normalized identifier, returning the existing row when it
    /// was already (or concurrently) recorded.
    pub async fn create_identifier(
        &self,
        account_id: &str,
        identifier: &str,
        acting_worker: &str,
    ) -> DbResult<CreateResult<Identifier>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let conn = self.conn().await?;
            match conn
                .query_one(
                    INSERT_IDENTIFIER_SQL,
                    &[&account_id, &identifier, &acting_worker],
                )
                .await
                .map_err(crate::error::DbError::from)
            {
                Ok(row) => {
                    let record = identifier_from_row(&row);
                    self.publish(ChangeEvent {
                        account_id: account_id.to_string(),
                        entity_kind: EntityKind::Identifier,
                        operation: ChangeOperation::Create,
                        payload: event_payload(&record),
                    });
                    return Ok(CreateResult {
                        record,
                        is_new: true,
                    });
                }
                Err(err) if err.is_unique_violation() => {
                    if let Some(existing) = self.identifier_by_value(account_id, identifier).await?
                    {
                        return Ok(CreateResult {
                            record: existing,
                            is_new: false,
                        });
                    }
                    if attempt >= MAX_CREATE_ATTEMPTS {
                        return Err(err);
                    }
                    tracing::debug!(
                        account_id,
                        identifier,
                        attempt,
                        "identifier insert raced an uncommitted duplicate, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}
