//! Permission condition vocabulary.
//!
//! Access rules arrive already evaluated down to a `ConditionSets` value:
//! an OR of AND-groups of named conditions. The vocabularies are closed,
//! exhaustively-matched enums per resource kind, so a condition unknown to
//! the compiler is a parse-time error rather than a silent skip at query
//! time.

use crate::error::ConditionError;
use serde_json::Value as JsonValue;

/// Reserved condition name: any AND-set containing it allows unconditionally.
pub const CONDITION_EVERYONE: &str = "everyone";

/// Reserved condition name: satisfied only when the caller is a supervisor.
/// Acts as a pass-through modifier inside mixed sets.
pub const CONDITION_IS_SUPERVISOR: &str = "isSupervisor";

/// OR-of-AND rule structure: outer `Vec` = OR, inner `Vec` = AND.
pub type ConditionSets<C> = Vec<Vec<C>>;

/// The resource kind a condition vocabulary applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionTarget {
    Case,
    Contact,
}

/// How a single condition resolves for a given caller, before any SQL is
/// generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionResolution {
    /// Always satisfied (e.g. `everyone`, `isSupervisor` for a supervisor).
    Always,
    /// Never satisfied (e.g. `isSupervisor` for a non-supervisor).
    Never,
    /// Satisfied per-row; needs a SQL predicate.
    Predicate,
}

/// Common behavior across condition vocabularies.
pub trait Condition: Sized {
    /// Resolve this condition against the caller's role.
    fn resolution(&self, is_supervisor: bool) -> ConditionResolution;

    /// Whether this is the reserved `everyone` condition. `everyone` turns
    /// its entire rule structure into an unconditional allow; a satisfied
    /// `isSupervisor` is merely dropped from its AND-set.
    fn is_everyone(&self) -> bool;

    /// Parse a condition from its JSON rule representation: either a bare
    /// name string or a single-key object carrying a parameter, e.g.
    /// `{"createdHoursAgo": 48}`.
    fn from_rule_value(value: &JsonValue) -> Result<Self, ConditionError>;
}

// ============================================================================
// CASE CONDITIONS
// ============================================================================

/// Conditions available for case-targeting rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseCondition {
    Everyone,
    IsSupervisor,
    /// The caller created the case.
    IsCreator,
    /// The case is not closed.
    IsCaseOpen,
    /// The caller owns at least one contact connected to the case.
    IsCaseContactOwner,
    /// The case was created within the last N hours.
    CreatedHoursAgo(i32),
    /// The case was created within the last N days.
    CreatedDaysAgo(i32),
}

impl Condition for CaseCondition {
    fn resolution(&self, is_supervisor: bool) -> ConditionResolution {
        match self {
            CaseCondition::Everyone => ConditionResolution::Always,
            CaseCondition::IsSupervisor if is_supervisor => ConditionResolution::Always,
            CaseCondition::IsSupervisor => ConditionResolution::Never,
            _ => ConditionResolution::Predicate,
        }
    }

    fn is_everyone(&self) -> bool {
        matches!(self, CaseCondition::Everyone)
    }

    fn from_rule_value(value: &JsonValue) -> Result<Self, ConditionError> {
        match value {
            JsonValue::String(name) => match name.as_str() {
                CONDITION_EVERYONE => Ok(CaseCondition::Everyone),
                CONDITION_IS_SUPERVISOR => Ok(CaseCondition::IsSupervisor),
                "isCreator" => Ok(CaseCondition::IsCreator),
                "isCaseOpen" => Ok(CaseCondition::IsCaseOpen),
                "isCaseContactOwner" => Ok(CaseCondition::IsCaseContactOwner),
                other => Err(ConditionError::Unknown(other.to_string())),
            },
            JsonValue::Object(_) => match parametrized(value)? {
                ("createdHoursAgo", hours) => Ok(CaseCondition::CreatedHoursAgo(hours)),
                ("createdDaysAgo", days) => Ok(CaseCondition::CreatedDaysAgo(days)),
                (other, _) => Err(ConditionError::Unknown(other.to_string())),
            },
            other => Err(ConditionError::MalformedRule(other.to_string())),
        }
    }
}

// ============================================================================
// CONTACT CONDITIONS
// ============================================================================

/// Conditions available for contact-targeting rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactCondition {
    Everyone,
    IsSupervisor,
    /// The caller is the counsellor who owns the contact.
    IsOwner,
    /// The contact was created within the last N hours.
    CreatedHoursAgo(i32),
    /// The contact was created within the last N days.
    CreatedDaysAgo(i32),
}

impl Condition for ContactCondition {
    fn resolution(&self, is_supervisor: bool) -> ConditionResolution {
        match self {
            ContactCondition::Everyone => ConditionResolution::Always,
            ContactCondition::IsSupervisor if is_supervisor => ConditionResolution::Always,
            ContactCondition::IsSupervisor => ConditionResolution::Never,
            _ => ConditionResolution::Predicate,
        }
    }

    fn is_everyone(&self) -> bool {
        matches!(self, ContactCondition::Everyone)
    }

    fn from_rule_value(value: &JsonValue) -> Result<Self, ConditionError> {
        match value {
            JsonValue::String(name) => match name.as_str() {
                CONDITION_EVERYONE => Ok(ContactCondition::Everyone),
                CONDITION_IS_SUPERVISOR => Ok(ContactCondition::IsSupervisor),
                "isOwner" => Ok(ContactCondition::IsOwner),
                other => Err(ConditionError::Unknown(other.to_string())),
            },
            JsonValue::Object(_) => match parametrized(value)? {
                ("createdHoursAgo", hours) => Ok(ContactCondition::CreatedHoursAgo(hours)),
                ("createdDaysAgo", days) => Ok(ContactCondition::CreatedDaysAgo(days)),
                (other, _) => Err(ConditionError::Unknown(other.to_string())),
            },
            other => Err(ConditionError::MalformedRule(other.to_string())),
        }
    }
}

/// Extract the single `name: integer` pair from a parametrized condition
/// object.
fn parametrized(value: &JsonValue) -> Result<(&str, i32), ConditionError> {
    let object = value
        .as_object()
        .ok_or_else(|| ConditionError::MalformedRule(value.to_string()))?;
    if object.len() != 1 {
        return Err(ConditionError::MalformedRule(value.to_string()));
    }
    // len() == 1 checked above
    let (name, raw) = object
        .iter()
        .next()
        .ok_or_else(|| ConditionError::MalformedRule(value.to_string()))?;
    let parameter = raw
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| ConditionError::InvalidParameter {
            name: name.clone(),
            value: raw.to_string(),
        })?;
    Ok((name.as_str(), parameter))
}

/// Parse a full OR-of-AND rule structure from JSON
/// (`[["everyone"], ["isCreator", {"createdHoursAgo": 24}]]`).
pub fn parse_condition_sets<C: Condition>(
    value: &JsonValue,
) -> Result<ConditionSets<C>, ConditionError> {
    let outer = value
        .as_array()
        .ok_or_else(|| ConditionError::MalformedRule(value.to_string()))?;
    outer
        .iter()
        .map(|inner| {
            let set = inner
                .as_array()
                .ok_or_else(|| ConditionError::MalformedRule(inner.to_string()))?;
            set.iter().map(C::from_rule_value).collect()
        })
        .collect()
}
