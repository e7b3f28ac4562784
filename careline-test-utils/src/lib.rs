//! Careline test utilities
//!
//! Centralized test infrastructure for the careline workspace:
//! - Fixture builders for entity payloads
//! - Caller identity fixtures
//! - Proptest generators for condition rule structures

pub use careline_core::{
    CallerIdentity, CaseCondition, ConditionSets, Contact, ContactCondition, NewCase,
    NewCaseSection, NewContact,
};

use careline_core::Timestamp;
use chrono::TimeZone;
use serde_json::json;

// ============================================================================
// FIXTURES
// ============================================================================

/// Account id used by default throughout the test suite.
pub fn account_id_default() -> String {
    "ACtest".to_string()
}

/// A second account, for isolation tests.
pub fn account_id_other() -> String {
    "ACother".to_string()
}

/// Non-supervisor caller fixture.
pub fn counsellor_caller() -> CallerIdentity {
    CallerIdentity::counsellor("WKcounsellor")
}

/// Supervisor caller fixture.
pub fn supervisor_caller() -> CallerIdentity {
    CallerIdentity::supervisor("WKsupervisor")
}

/// A deterministic timestamp well inside the valid range.
pub fn fixed_timestamp() -> Timestamp {
    chrono::Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
}

/// A minimal open case payload.
pub fn sample_new_case() -> NewCase {
    NewCase {
        status: "open".to_string(),
        helpline: Some("childline".to_string()),
        label: Some("test case".to_string()),
        info: json!({"summary": "test"}),
        definition_version: Some("v1".to_string()),
    }
}

/// A contact payload carrying a task id, so creation is idempotent.
pub fn sample_new_contact(task_id: &str) -> NewContact {
    NewContact {
        task_id: Some(task_id.to_string()),
        case_id: None,
        counsellor_id: Some("WKcounsellor".to_string()),
        time_of_contact: fixed_timestamp(),
        helpline: Some("childline".to_string()),
        info: json!({
            "name": {"first_name": "Jo", "last_name": "Doe"},
            "categories": {"safety": ["bullying"]}
        }),
    }
}

/// A note section payload with a distinguishing section id.
pub fn sample_new_section(section_id: &str) -> NewCaseSection {
    NewCaseSection {
        section_type: "note".to_string(),
        section_id: section_id.to_string(),
        event_timestamp: fixed_timestamp(),
        section_type_specific_data: json!({"note": "followed up by phone"}),
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for condition rule structures.

    use super::*;
    use proptest::prelude::*;

    /// Generate a single case condition, parametrized variants included.
    pub fn arb_case_condition() -> impl Strategy<Value = CaseCondition> {
        prop_oneof![
            Just(CaseCondition::Everyone),
            Just(CaseCondition::IsSupervisor),
            Just(CaseCondition::IsCreator),
            Just(CaseCondition::IsCaseOpen),
            Just(CaseCondition::IsCaseContactOwner),
            (1i32..10_000).prop_map(CaseCondition::CreatedHoursAgo),
            (1i32..1_000).prop_map(CaseCondition::CreatedDaysAgo),
        ]
    }

    /// Generate a single contact condition.
    pub fn arb_contact_condition() -> impl Strategy<Value = ContactCondition> {
        prop_oneof![
            Just(ContactCondition::Everyone),
            Just(ContactCondition::IsSupervisor),
            Just(ContactCondition::IsOwner),
            (1i32..10_000).prop_map(ContactCondition::CreatedHoursAgo),
            (1i32..1_000).prop_map(ContactCondition::CreatedDaysAgo),
        ]
    }

    /// Generate an OR-of-AND case rule structure, empty sets included.
    pub fn arb_case_condition_sets() -> impl Strategy<Value = ConditionSets<CaseCondition>> {
        prop::collection::vec(prop::collection::vec(arb_case_condition(), 0..4), 0..4)
    }

    /// Generate an OR-of-AND contact rule structure.
    pub fn arb_contact_condition_sets() -> impl Strategy<Value = ConditionSets<ContactCondition>> {
        prop::collection::vec(prop::collection::vec(arb_contact_condition(), 0..4), 0..4)
    }

    /// Generate a caller of either role.
    pub fn arb_caller() -> impl Strategy<Value = CallerIdentity> {
        ("WK[a-z]{6}", any::<bool>()).prop_map(|(worker_id, is_supervisor)| CallerIdentity {
            worker_id,
            is_supervisor,
        })
    }
}
