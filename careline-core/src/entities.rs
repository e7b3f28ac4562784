//! Persisted entity shapes for cases, contacts and case sections.
//!
//! These mirror the Postgres tables column-for-column. Audit columns
//! (`created_*`, `updated_*`, `status_updated_*`) are always set by the
//! database layer, never by callers.

use crate::{AccountId, CaseId, ContactId, Timestamp, WorkerId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ============================================================================
// CASE
// ============================================================================

/// A case as stored in the `cases` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub account_id: AccountId,
    /// Status vocabulary is configurable per helpline ("open", "closed", ...),
    /// so this is a free string rather than an enum.
    pub status: String,
    pub helpline: Option<String>,
    pub label: Option<String>,
    /// Freeform case details; shape owned by the form definitions.
    pub info: JsonValue,
    pub definition_version: Option<String>,
    pub created_at: Timestamp,
    pub created_by: WorkerId,
    pub updated_at: Option<Timestamp>,
    pub updated_by: Option<WorkerId>,
    /// Set only when `status` actually changes value, never on other updates.
    pub status_updated_at: Option<Timestamp>,
    pub status_updated_by: Option<WorkerId>,
    pub previous_status: Option<String>,
}

/// Payload for creating a case. Audit columns are filled in by the write
/// layer from the acting worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCase {
    pub status: String,
    pub helpline: Option<String>,
    pub label: Option<String>,
    pub info: JsonValue,
    pub definition_version: Option<String>,
}

/// Patch for the case record itself (as opposed to its sections).
///
/// `None` fields are left untouched. A `status` equal to the stored value is
/// a no-op for the status audit trail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecordPatch {
    pub status: Option<String>,
    pub label: Option<String>,
    pub info: Option<JsonValue>,
}

impl CaseRecordPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.label.is_none() && self.info.is_none()
    }
}

// ============================================================================
// CONTACT
// ============================================================================

/// A contact (one recorded conversation) as stored in the `contacts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub account_id: AccountId,
    /// Owning case, if connected. Disconnecting sets this back to NULL.
    pub case_id: Option<CaseId>,
    /// External task id, unique per account. This is the idempotency key for
    /// concurrent creation requests.
    pub task_id: Option<String>,
    /// Counsellor who handled the conversation.
    pub counsellor_id: Option<WorkerId>,
    /// When the conversation happened - the timeline ordering timestamp,
    /// distinct from `created_at`.
    pub time_of_contact: Timestamp,
    pub helpline: Option<String>,
    /// Raw form data: caller name, phone numbers, categories, narrative.
    pub info: JsonValue,
    pub created_at: Timestamp,
    pub created_by: WorkerId,
    pub updated_at: Option<Timestamp>,
    pub updated_by: Option<WorkerId>,
}

/// Payload for creating a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContact {
    pub task_id: Option<String>,
    pub case_id: Option<CaseId>,
    pub counsellor_id: Option<WorkerId>,
    pub time_of_contact: Timestamp,
    pub helpline: Option<String>,
    pub info: JsonValue,
}

// ============================================================================
// CASE SECTION
// ============================================================================

/// One section record attached to a case (a note, referral, household entry,
/// ...). Identified by the composite natural key
/// `(account_id, case_id, section_type, section_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSection {
    pub account_id: AccountId,
    pub case_id: CaseId,
    pub section_type: String,
    pub section_id: String,
    /// When the recorded activity occurred, distinct from `created_at`.
    pub event_timestamp: Timestamp,
    /// Payload whose shape depends on `section_type`.
    pub section_type_specific_data: JsonValue,
    pub created_at: Timestamp,
    pub created_by: WorkerId,
    pub updated_at: Option<Timestamp>,
    pub updated_by: Option<WorkerId>,
}

/// Payload for creating a case section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCaseSection {
    pub section_type: String,
    pub section_id: String,
    pub event_timestamp: Timestamp,
    pub section_type_specific_data: JsonValue,
}

/// Patch for an existing case section. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseSectionUpdate {
    pub event_timestamp: Option<Timestamp>,
    pub section_type_specific_data: Option<JsonValue>,
}

// ============================================================================
// IDENTIFIER
// ============================================================================

/// A normalized external identifier (phone number, social handle) tracked
/// per account, created idempotently on first sighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub id: i64,
    pub account_id: AccountId,
    /// Normalized identifier string, unique per account.
    pub identifier: String,
    pub created_at: Timestamp,
    pub created_by: WorkerId,
}

// ============================================================================
// TIMELINE
// ============================================================================

/// One entry in the merged case timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineActivity {
    /// Global ordering timestamp (section `event_timestamp` or contact
    /// `time_of_contact`).
    pub timestamp: Timestamp,
    /// Originating case. Callers re-bucket multi-case results by this.
    pub case_id: CaseId,
    #[serde(flatten)]
    pub activity: TimelineActivityKind,
}

/// Discriminated union of the two timeline source types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "activity_type", content = "activity")]
pub enum TimelineActivityKind {
    #[serde(rename = "case-section")]
    CaseSection(CaseSection),
    #[serde(rename = "contact")]
    Contact(Contact),
}

impl TimelineActivityKind {
    /// Discriminator value as it appears in SQL projections and JSON.
    pub fn activity_type(&self) -> &'static str {
        match self {
            TimelineActivityKind::CaseSection(_) => "case-section",
            TimelineActivityKind::Contact(_) => "contact",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_section() -> CaseSection {
        CaseSection {
            account_id: "AC0".to_string(),
            case_id: 7,
            section_type: "note".to_string(),
            section_id: "n-1".to_string(),
            event_timestamp: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            section_type_specific_data: serde_json::json!({"note": "called back"}),
            created_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap(),
            created_by: "WK1".to_string(),
            updated_at: None,
            updated_by: None,
        }
    }

    #[test]
    fn timeline_activity_tagging() {
        let activity = TimelineActivity {
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            case_id: 7,
            activity: TimelineActivityKind::CaseSection(sample_section()),
        };
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["activity_type"], "case-section");
        assert_eq!(json["activity"]["section_type"], "note");

        let back: TimelineActivity = serde_json::from_value(json).unwrap();
        assert_eq!(back, activity);
    }

    #[test]
    fn case_record_patch_emptiness() {
        assert!(CaseRecordPatch::default().is_empty());
        let patch = CaseRecordPatch {
            status: Some("closed".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
