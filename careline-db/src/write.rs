//! Shared plumbing for the touch-propagating write layer.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Bound on idempotent-create retries, to avoid retry storms under
/// sustained contention. After the last attempt the original conflict error
/// surfaces unchanged.
pub const MAX_CREATE_ATTEMPTS: u32 = 3;

/// Refresh the parent case's audit columns. Unconditional UPDATE, no row
/// lock taken up front: concurrent child writers to the same case never
/// deadlock, the latest commit wins.
pub(crate) const TOUCH_CASE_SQL: &str = "UPDATE cases \
     SET updated_at = CURRENT_TIMESTAMP, updated_by = $3 \
     WHERE account_id = $1 AND id = $2";

/// Outcome of an idempotent create: the effective row, plus whether this
/// call actually inserted it or returned a pre-existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateResult<T> {
    pub record: T,
    pub is_new: bool,
}

/// Serialize an entity for a change event. Serialization of our own entity
/// types cannot realistically fail; if it ever does, the event degrades to a
/// null payload rather than poisoning the committed write.
pub(crate) fn event_payload<T: Serialize>(entity: &T) -> JsonValue {
    serde_json::to_value(entity).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to serialize change event payload");
        JsonValue::Null
    })
}
