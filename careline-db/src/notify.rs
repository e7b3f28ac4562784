//! Change notification seam.
//!
//! After a successful committed write, the write layer hands a
//! [`ChangeEvent`] to whatever notifier the composition root installed
//! (SNS/SQS publisher in production, [`NoopNotifier`] by default). Publishing
//! is fire-and-forget: a failed publish is logged and never rolls back or
//! delays the already-committed write.

use async_trait::async_trait;
use careline_core::AccountId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Entity kind discriminator for change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Case,
    Contact,
    CaseSection,
    Identifier,
}

/// Mutation discriminator for change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

/// One committed mutation, as handed to the external publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub account_id: AccountId,
    pub entity_kind: EntityKind,
    pub operation: ChangeOperation,
    /// Serialized entity state after the mutation (or the deleted key).
    pub payload: JsonValue,
}

/// External publish function for committed changes.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn publish(&self, event: ChangeEvent) -> Result<(), NotifyError>;
}

/// Publishing failure. Only ever logged by this crate; never propagated to
/// the caller of the originating write.
#[derive(Debug, thiserror::Error)]
#[error("change notification failed: {0}")]
pub struct NotifyError(pub String);

/// Default notifier that drops events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl ChangeNotifier for NoopNotifier {
    async fn publish(&self, _event: ChangeEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
