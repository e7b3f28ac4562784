//! Row-to-entity mapping.
//!
//! Column names here must stay in lockstep with `schema.sql` and the
//! projections in the query builders.

use careline_core::{Case, CaseSection, Contact, Identifier};
use tokio_postgres::Row;

pub(crate) fn case_from_row(row: &Row) -> Case {
    Case {
        id: row.get("id"),
        account_id: row.get("account_id"),
        status: row.get("status"),
        helpline: row.get("helpline"),
        label: row.get("label"),
        info: row.get("info"),
        definition_version: row.get("definition_version"),
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
        status_updated_at: row.get("status_updated_at"),
        status_updated_by: row.get("status_updated_by"),
        previous_status: row.get("previous_status"),
    }
}

pub(crate) fn contact_from_row(row: &Row) -> Contact {
    Contact {
        id: row.get("id"),
        account_id: row.get("account_id"),
        case_id: row.get("case_id"),
        task_id: row.get("task_id"),
        counsellor_id: row.get("counsellor_id"),
        time_of_contact: row.get("time_of_contact"),
        helpline: row.get("helpline"),
        info: row.get("info"),
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
    }
}

pub(crate) fn section_from_row(row: &Row) -> CaseSection {
    CaseSection {
        account_id: row.get("account_id"),
        case_id: row.get("case_id"),
        section_type: row.get("section_type"),
        section_id: row.get("section_id"),
        event_timestamp: row.get("event_timestamp"),
        section_type_specific_data: row.get("section_type_specific_data"),
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
    }
}

pub(crate) fn identifier_from_row(row: &Row) -> Identifier {
    Identifier {
        id: row.get("id"),
        account_id: row.get("account_id"),
        identifier: row.get("identifier"),
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
    }
}
