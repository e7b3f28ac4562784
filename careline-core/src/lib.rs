//! Careline Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types and their (de)serialization - no
//! database or business logic.

use chrono::{DateTime, Utc};

pub mod conditions;
pub mod entities;
pub mod error;

pub use conditions::{
    parse_condition_sets, CaseCondition, Condition, ConditionResolution, ConditionSets,
    ContactCondition, PermissionTarget, CONDITION_EVERYONE, CONDITION_IS_SUPERVISOR,
};
pub use entities::{
    Case, CaseRecordPatch, CaseSection, CaseSectionUpdate, Contact, Identifier, NewCase,
    NewCaseSection, NewContact, TimelineActivity, TimelineActivityKind,
};
pub use error::ConditionError;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Account identifier. Every entity is scoped to exactly one account.
pub type AccountId = String;

/// Case identifier, unique within an account (BIGSERIAL).
pub type CaseId = i64;

/// Contact identifier, unique within an account (BIGSERIAL).
pub type ContactId = i64;

/// Counsellor (worker) identifier, as resolved by the auth layer.
pub type WorkerId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// CALLER IDENTITY
// ============================================================================

/// The already-authenticated caller on whose behalf a query or write runs.
///
/// Authentication and rule evaluation happen outside this core; by the time
/// a `CallerIdentity` reaches the query compiler it is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Worker id of the counsellor making the request.
    pub worker_id: WorkerId,
    /// Whether the caller holds the supervisor role.
    pub is_supervisor: bool,
}

impl CallerIdentity {
    pub fn new(worker_id: impl Into<WorkerId>, is_supervisor: bool) -> Self {
        Self {
            worker_id: worker_id.into(),
            is_supervisor,
        }
    }

    /// A regular (non-supervisor) counsellor.
    pub fn counsellor(worker_id: impl Into<WorkerId>) -> Self {
        Self::new(worker_id, false)
    }

    /// A supervisor.
    pub fn supervisor(worker_id: impl Into<WorkerId>) -> Self {
        Self::new(worker_id, true)
    }
}
