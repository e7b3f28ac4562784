//! Condition compiler: turns OR-of-AND permission rule structures into SQL
//! boolean clauses.
//!
//! The compiler never raises a permission error. Insufficient permissions
//! simply compile to a stricter WHERE clause (down to the constant-false
//! `1=0`), so list queries degrade to zero rows instead of failing.

use crate::sql::{ParamBinder, SqlParam};
use careline_core::{
    CallerIdentity, CaseCondition, Condition, ConditionResolution, ContactCondition,
};

/// Constant-false predicate used for deny-all rule structures.
pub const DENY_ALL_CLAUSE: &str = "1=0";

/// Result of compiling one rule structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledPermission {
    /// No predicate needed; the caller may see every row.
    AllowAll,
    /// The caller may see no rows at all.
    DenyAll,
    /// Per-row predicate, with its parameters registered in the binder.
    Clause(String),
}

impl CompiledPermission {
    /// The WHERE-clause fragment to append, if any.
    pub fn as_clause(&self) -> Option<&str> {
        match self {
            CompiledPermission::AllowAll => None,
            CompiledPermission::DenyAll => Some(DENY_ALL_CLAUSE),
            CompiledPermission::Clause(sql) => Some(sql),
        }
    }
}

/// A condition that knows how to render itself as a SQL predicate against
/// its resource's table.
pub trait SqlCondition: Condition {
    /// Render the predicate fragment. Only called for conditions whose
    /// [`ConditionResolution`] is `Predicate`.
    fn render(&self, user: &CallerIdentity, binder: &mut ParamBinder) -> String;
}

impl SqlCondition for CaseCondition {
    fn render(&self, user: &CallerIdentity, binder: &mut ParamBinder) -> String {
        match self {
            CaseCondition::IsCreator => {
                let worker = binder.push(SqlParam::Text(user.worker_id.clone()));
                format!("cases.created_by = {worker}")
            }
            CaseCondition::IsCaseOpen => "cases.status <> 'closed'".to_string(),
            CaseCondition::IsCaseContactOwner => {
                let worker = binder.push(SqlParam::Text(user.worker_id.clone()));
                format!(
                    "EXISTS (SELECT 1 FROM contacts \
                     WHERE contacts.account_id = cases.account_id \
                     AND contacts.case_id = cases.id \
                     AND contacts.counsellor_id = {worker})"
                )
            }
            CaseCondition::CreatedHoursAgo(hours) => {
                let hours = binder.push(SqlParam::Int(*hours));
                format!("cases.created_at > CURRENT_TIMESTAMP - make_interval(hours => {hours})")
            }
            CaseCondition::CreatedDaysAgo(days) => {
                let days = binder.push(SqlParam::Int(*days));
                format!("cases.created_at > CURRENT_TIMESTAMP - make_interval(days => {days})")
            }
            // Resolved before rendering; no predicate form exists.
            CaseCondition::Everyone | CaseCondition::IsSupervisor => DENY_ALL_CLAUSE.to_string(),
        }
    }
}

impl SqlCondition for ContactCondition {
    fn render(&self, user: &CallerIdentity, binder: &mut ParamBinder) -> String {
        match self {
            ContactCondition::IsOwner => {
                let worker = binder.push(SqlParam::Text(user.worker_id.clone()));
                format!("contacts.counsellor_id = {worker}")
            }
            ContactCondition::CreatedHoursAgo(hours) => {
                let hours = binder.push(SqlParam::Int(*hours));
                format!("contacts.created_at > CURRENT_TIMESTAMP - make_interval(hours => {hours})")
            }
            ContactCondition::CreatedDaysAgo(days) => {
                let days = binder.push(SqlParam::Int(*days));
                format!("contacts.created_at > CURRENT_TIMESTAMP - make_interval(days => {days})")
            }
            ContactCondition::Everyone | ContactCondition::IsSupervisor => {
                DENY_ALL_CLAUSE.to_string()
            }
        }
    }
}

/// Compile an OR-of-AND rule structure into a single boolean clause.
///
/// Semantics:
/// - an empty structure, or one whose inner sets are all empty, denies all;
/// - `everyone` anywhere turns the whole structure into an unconditional
///   allow, before any parameter is bound;
/// - a satisfied `isSupervisor` is dropped from its AND-set (a set left with
///   nothing else is vacuously true, i.e. allow-all); an unsatisfied one
///   kills its branch without killing the query;
/// - remaining conditions render to predicates joined with `AND` per set,
///   the sets joined with `OR`.
///
/// Identical inputs always compile to byte-identical SQL: iteration follows
/// input order and placeholder numbers follow the shared binder.
pub fn compile_condition_sets<C: SqlCondition>(
    sets: &[Vec<C>],
    user: &CallerIdentity,
    binder: &mut ParamBinder,
) -> CompiledPermission {
    if sets.iter().all(|set| set.is_empty()) {
        return CompiledPermission::DenyAll;
    }

    // Short-circuit scan first, so an unconditional allow binds no params.
    for set in sets.iter().filter(|set| !set.is_empty()) {
        if set.iter().any(C::is_everyone) {
            return CompiledPermission::AllowAll;
        }
        if set
            .iter()
            .all(|c| c.resolution(user.is_supervisor) == ConditionResolution::Always)
        {
            return CompiledPermission::AllowAll;
        }
    }

    let mut branches: Vec<String> = Vec::new();
    for set in sets.iter().filter(|set| !set.is_empty()) {
        if set
            .iter()
            .any(|c| c.resolution(user.is_supervisor) == ConditionResolution::Never)
        {
            // e.g. isSupervisor for a non-supervisor: this branch contributes
            // nothing to the OR.
            continue;
        }
        let predicates: Vec<String> = set
            .iter()
            .filter(|c| c.resolution(user.is_supervisor) == ConditionResolution::Predicate)
            .map(|c| c.render(user, binder))
            .collect();
        if !predicates.is_empty() {
            branches.push(format!("({})", predicates.join(" AND ")));
        }
    }

    if branches.is_empty() {
        CompiledPermission::DenyAll
    } else {
        CompiledPermission::Clause(format!("({})", branches.join(" OR ")))
    }
}
