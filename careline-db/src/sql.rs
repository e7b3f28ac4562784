//! SQL parameter plumbing.
//!
//! Queries are assembled as text with `$n` placeholders; every dynamic value
//! is a bound parameter. Only column/identifier names coming from allow-lists
//! are ever spliced into the SQL text itself.

use careline_core::Timestamp;
use serde_json::Value as JsonValue;

// ============================================================================
// SQL PARAMETER TYPE
// ============================================================================

/// Type-erased SQL parameter, so query builders can accumulate heterogeneous
/// bound values without generics leaking everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Text value
    Text(String),
    /// Optional text value
    OptText(Option<String>),
    /// BIGINT value
    Long(i64),
    /// Optional BIGINT value
    OptLong(Option<i64>),
    /// INTEGER value
    Int(i32),
    /// Boolean value
    Bool(bool),
    /// JSONB value
    Json(JsonValue),
    /// Optional JSONB value
    OptJson(Option<JsonValue>),
    /// TIMESTAMPTZ value
    Timestamp(Timestamp),
    /// Optional TIMESTAMPTZ value
    OptTimestamp(Option<Timestamp>),
    /// TEXT[] value (for `= ANY($n)`)
    TextArray(Vec<String>),
    /// BIGINT[] value (for `= ANY($n)` and rank ordering)
    LongArray(Vec<i64>),
}

impl SqlParam {
    /// Borrow this parameter as a `ToSql` trait object for tokio_postgres.
    pub fn as_to_sql(&self) -> &(dyn tokio_postgres::types::ToSql + Sync) {
        match self {
            SqlParam::Text(v) => v,
            SqlParam::OptText(v) => v,
            SqlParam::Long(v) => v,
            SqlParam::OptLong(v) => v,
            SqlParam::Int(v) => v,
            SqlParam::Bool(v) => v,
            SqlParam::Json(v) => v,
            SqlParam::OptJson(v) => v,
            SqlParam::Timestamp(v) => v,
            SqlParam::OptTimestamp(v) => v,
            SqlParam::TextArray(v) => v,
            SqlParam::LongArray(v) => v,
        }
    }
}

/// Borrow a parameter slice in the shape `tokio_postgres` query methods take.
pub fn borrow_params(params: &[SqlParam]) -> Vec<&(dyn tokio_postgres::types::ToSql + Sync)> {
    params.iter().map(SqlParam::as_to_sql).collect()
}

// ============================================================================
// PARAMETER BINDER
// ============================================================================

/// Accumulates bound parameters while a query is composed, handing out the
/// matching `$n` placeholder for each.
///
/// Placeholder numbering follows insertion order, which keeps compilation
/// deterministic: identical inputs produce byte-identical SQL.
#[derive(Debug, Default)]
pub struct ParamBinder {
    params: Vec<SqlParam>,
}

impl ParamBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and return its `$n` placeholder.
    pub fn push(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    /// Number of parameters bound so far.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Consume the binder, yielding the parameter list in placeholder order.
    pub fn into_params(self) -> Vec<SqlParam> {
        self.params
    }
}
