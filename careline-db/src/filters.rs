//! List-query filters.
//!
//! Every active filter contributes exactly one AND-ed clause; an absent
//! filter contributes nothing at all. No filter ever emits a vacuous `TRUE`
//! fragment, so omitting a filter is indistinguishable from matching
//! everything (filter absence neutrality).

use crate::error::{DbError, DbResult};
use crate::sql::{ParamBinder, SqlParam};
use careline_core::Timestamp;
use std::collections::BTreeMap;

// ============================================================================
// DATE RANGES
// ============================================================================

/// Whether a nullable timestamp column must (not) be populated, independent
/// of any bounds on its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistsModifier {
    MustExist,
    MustNotExist,
}

/// Half-open or closed range filter over one timestamp column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateRange {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub exists: Option<ExistsModifier>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.exists.is_none()
    }

    /// Parse caller-supplied RFC 3339 bounds. A malformed value fails the
    /// whole query; it is never silently dropped.
    pub fn parse(
        from: Option<&str>,
        to: Option<&str>,
        exists: Option<ExistsModifier>,
    ) -> DbResult<Self> {
        Ok(Self {
            from: from.map(parse_timestamp).transpose()?,
            to: to.map(parse_timestamp).transpose()?,
            exists,
        })
    }

    /// Render this range as one parenthesized clause over `column` (an
    /// allow-listed identifier chosen by the query builder, never caller
    /// input).
    fn clause(&self, column: &str, binder: &mut ParamBinder) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        if matches!(self.exists, Some(ExistsModifier::MustNotExist)) {
            // Bounds are meaningless on a column required to be NULL.
            return Some(format!("{column} IS NULL"));
        }

        let mut parts = Vec::new();
        if matches!(self.exists, Some(ExistsModifier::MustExist)) {
            parts.push(format!("{column} IS NOT NULL"));
        }
        if let Some(from) = self.from {
            let p = binder.push(SqlParam::Timestamp(from));
            parts.push(format!("{column} >= {p}"));
        }
        if let Some(to) = self.to {
            let p = binder.push(SqlParam::Timestamp(to));
            parts.push(format!("{column} <= {p}"));
        }
        Some(format!("({})", parts.join(" AND ")))
    }
}

fn parse_timestamp(raw: &str) -> DbResult<Timestamp> {
    raw.parse::<Timestamp>()
        .map_err(|e| DbError::InvalidInput(format!("malformed timestamp {raw:?}: {e}")))
}

// ============================================================================
// CATEGORY FILTER
// ============================================================================

/// One category/subcategory tag to match against a contact's recorded
/// categories (`info -> 'categories'` is an object of category -> [subcats]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFilter {
    pub category: String,
    pub subcategory: String,
}

fn categories_clause(alias: &str, filters: &[CategoryFilter], binder: &mut ParamBinder) -> String {
    let matches: Vec<String> = filters
        .iter()
        .map(|f| {
            let category = binder.push(SqlParam::Text(f.category.clone()));
            let subcategory = binder.push(SqlParam::Text(f.subcategory.clone()));
            format!("{alias}.info -> 'categories' -> {category} ? {subcategory}")
        })
        .collect();
    format!("({})", matches.join(" OR "))
}

// ============================================================================
// FREE-TEXT SEARCH
// ============================================================================

/// Name/phone search over a contact row's raw form data. Matches first or
/// last name case-insensitively; when the term contains digits, also matches
/// them against the digits of the recorded phone number.
fn contact_search_clause(alias: &str, term: &str, binder: &mut ParamBinder) -> String {
    let pattern = format!("%{}%", term.trim());
    let first = binder.push(SqlParam::Text(pattern.clone()));
    let last = binder.push(SqlParam::Text(pattern));
    let mut parts = vec![
        format!("{alias}.info #>> '{{name,first_name}}' ILIKE {first}"),
        format!("{alias}.info #>> '{{name,last_name}}' ILIKE {last}"),
    ];

    let digits: String = term.chars().filter(char::is_ascii_digit).collect();
    if !digits.is_empty() {
        let phone = binder.push(SqlParam::Text(format!("%{digits}%")));
        parts.push(format!(
            "regexp_replace(COALESCE({alias}.info ->> 'phone_number', ''), '[^0-9]', '', 'g') \
             LIKE {phone}"
        ));
    }
    format!("({})", parts.join(" OR "))
}

fn info_values_clauses(
    alias: &str,
    info: &BTreeMap<String, Vec<String>>,
    binder: &mut ParamBinder,
    clauses: &mut Vec<String>,
) {
    for (key, values) in info {
        if values.is_empty() {
            continue;
        }
        let key_param = binder.push(SqlParam::Text(key.clone()));
        let values_param = binder.push(SqlParam::TextArray(values.clone()));
        clauses.push(format!("{alias}.info ->> {key_param} = ANY({values_param})"));
    }
}

// ============================================================================
// CASE FILTERS
// ============================================================================

/// Filters for case list/search queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseFilters {
    /// Only cases whose status is in this set.
    pub statuses: Vec<String>,
    /// Exclude cases whose status is in this set.
    pub exclude_statuses: Vec<String>,
    /// Only cases created by one of these counsellors.
    pub counsellors: Vec<String>,
    pub helplines: Vec<String>,
    pub created_at: Option<DateRange>,
    pub updated_at: Option<DateRange>,
    /// Category tags matched against the case's connected contacts.
    pub categories: Vec<CategoryFilter>,
    /// Arbitrary key -> accepted-values matches against the `info` blob.
    pub info: BTreeMap<String, Vec<String>>,
    /// Free-text name/phone search across connected contacts.
    pub search_term: Option<String>,
    /// Include cases with no connected contacts. Off by default.
    pub include_orphans: bool,
}

impl CaseFilters {
    pub(crate) fn push_clauses(&self, binder: &mut ParamBinder, clauses: &mut Vec<String>) {
        if !self.statuses.is_empty() {
            let p = binder.push(SqlParam::TextArray(self.statuses.clone()));
            clauses.push(format!("cases.status = ANY({p})"));
        }
        if !self.exclude_statuses.is_empty() {
            let p = binder.push(SqlParam::TextArray(self.exclude_statuses.clone()));
            clauses.push(format!("NOT (cases.status = ANY({p}))"));
        }
        if !self.counsellors.is_empty() {
            let p = binder.push(SqlParam::TextArray(self.counsellors.clone()));
            clauses.push(format!("cases.created_by = ANY({p})"));
        }
        if !self.helplines.is_empty() {
            let p = binder.push(SqlParam::TextArray(self.helplines.clone()));
            clauses.push(format!("cases.helpline = ANY({p})"));
        }
        if let Some(range) = &self.created_at {
            if let Some(clause) = range.clause("cases.created_at", binder) {
                clauses.push(clause);
            }
        }
        if let Some(range) = &self.updated_at {
            if let Some(clause) = range.clause("cases.updated_at", binder) {
                clauses.push(clause);
            }
        }
        if !self.categories.is_empty() {
            let inner = categories_clause("fc", &self.categories, binder);
            clauses.push(related_contact_exists("fc", &inner));
        }
        info_values_clauses("cases", &self.info, binder, clauses);
        if let Some(term) = self.search_term.as_deref().filter(|t| !t.trim().is_empty()) {
            let inner = contact_search_clause("sc", term, binder);
            clauses.push(related_contact_exists("sc", &inner));
        }
        if !self.include_orphans {
            clauses.push(
                "EXISTS (SELECT 1 FROM contacts oc \
                 WHERE oc.account_id = cases.account_id AND oc.case_id = cases.id)"
                    .to_string(),
            );
        }
    }
}

/// EXISTS subquery over a case's connected contacts, with an extra predicate
/// on the aliased contact row.
fn related_contact_exists(alias: &str, predicate: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM contacts {alias} \
         WHERE {alias}.account_id = cases.account_id \
         AND {alias}.case_id = cases.id \
         AND {predicate})"
    )
}

// ============================================================================
// CONTACT FILTERS
// ============================================================================

/// Filters for contact list/search queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactFilters {
    /// Only contacts owned by one of these counsellors.
    pub counsellors: Vec<String>,
    pub helplines: Vec<String>,
    pub time_of_contact: Option<DateRange>,
    pub created_at: Option<DateRange>,
    pub updated_at: Option<DateRange>,
    pub categories: Vec<CategoryFilter>,
    pub info: BTreeMap<String, Vec<String>>,
    pub search_term: Option<String>,
    /// Include contacts not connected to any case. Off by default.
    pub include_orphans: bool,
}

impl ContactFilters {
    pub(crate) fn push_clauses(&self, binder: &mut ParamBinder, clauses: &mut Vec<String>) {
        if !self.counsellors.is_empty() {
            let p = binder.push(SqlParam::TextArray(self.counsellors.clone()));
            clauses.push(format!("contacts.counsellor_id = ANY({p})"));
        }
        if !self.helplines.is_empty() {
            let p = binder.push(SqlParam::TextArray(self.helplines.clone()));
            clauses.push(format!("contacts.helpline = ANY({p})"));
        }
        if let Some(range) = &self.time_of_contact {
            if let Some(clause) = range.clause("contacts.time_of_contact", binder) {
                clauses.push(clause);
            }
        }
        if let Some(range) = &self.created_at {
            if let Some(clause) = range.clause("contacts.created_at", binder) {
                clauses.push(clause);
            }
        }
        if let Some(range) = &self.updated_at {
            if let Some(clause) = range.clause("contacts.updated_at", binder) {
                clauses.push(clause);
            }
        }
        if !self.categories.is_empty() {
            clauses.push(categories_clause("contacts", &self.categories, binder));
        }
        info_values_clauses("contacts", &self.info, binder, clauses);
        if let Some(term) = self.search_term.as_deref().filter(|t| !t.trim().is_empty()) {
            clauses.push(contact_search_clause("contacts", term, binder));
        }
        if !self.include_orphans {
            clauses.push(
                "EXISTS (SELECT 1 FROM cases pc \
                 WHERE pc.account_id = contacts.account_id AND pc.id = contacts.case_id)"
                    .to_string(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_case(filters: &CaseFilters) -> (Vec<String>, Vec<SqlParam>) {
        let mut binder = ParamBinder::new();
        let mut clauses = Vec::new();
        filters.push_clauses(&mut binder, &mut clauses);
        (clauses, binder.into_params())
    }

    #[test]
    fn absent_filters_contribute_nothing_but_orphan_exclusion() {
        let (clauses, params) = render_case(&CaseFilters::default());
        assert_eq!(clauses.len(), 1);
        assert!(clauses[0].contains("EXISTS (SELECT 1 FROM contacts oc"));
        assert!(params.is_empty());

        let all_inclusive = CaseFilters {
            include_orphans: true,
            ..Default::default()
        };
        let (clauses, params) = render_case(&all_inclusive);
        assert!(clauses.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn status_sets_bind_arrays() {
        let filters = CaseFilters {
            statuses: vec!["open".to_string()],
            exclude_statuses: vec!["closed".to_string()],
            include_orphans: true,
            ..Default::default()
        };
        let (clauses, params) = render_case(&filters);
        assert_eq!(
            clauses,
            vec![
                "cases.status = ANY($1)".to_string(),
                "NOT (cases.status = ANY($2))".to_string(),
            ]
        );
        assert_eq!(params[0], SqlParam::TextArray(vec!["open".to_string()]));
    }

    #[test]
    fn malformed_date_fails_the_whole_filter() {
        let err = DateRange::parse(Some("not-a-date"), None, None).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput(_)));
    }

    #[test]
    fn must_not_exist_overrides_bounds() {
        let range = DateRange {
            from: Some("2024-01-01T00:00:00Z".parse().unwrap()),
            to: None,
            exists: Some(ExistsModifier::MustNotExist),
        };
        let mut binder = ParamBinder::new();
        let clause = range.clause("cases.updated_at", &mut binder).unwrap();
        assert_eq!(clause, "cases.updated_at IS NULL");
        assert!(binder.is_empty());
    }

    #[test]
    fn date_range_bounds_are_parameterized() {
        let range = DateRange::parse(
            Some("2024-01-01T00:00:00Z"),
            Some("2024-02-01T00:00:00Z"),
            Some(ExistsModifier::MustExist),
        )
        .unwrap();
        let mut binder = ParamBinder::new();
        let clause = range.clause("cases.created_at", &mut binder).unwrap();
        assert_eq!(
            clause,
            "(cases.created_at IS NOT NULL AND cases.created_at >= $1 AND cases.created_at <= $2)"
        );
        assert_eq!(binder.len(), 2);
    }

    #[test]
    fn search_term_without_digits_skips_the_phone_clause() {
        let mut binder = ParamBinder::new();
        let clause = contact_search_clause("contacts", "Mari", &mut binder);
        assert!(!clause.contains("phone_number"));
        assert_eq!(binder.len(), 2);

        let mut binder = ParamBinder::new();
        let clause = contact_search_clause("contacts", "555 0101", &mut binder);
        assert!(clause.contains("phone_number"));
        assert!(clause.contains("LIKE $3"));
    }

    #[test]
    fn contact_orphan_exclusion_checks_parent_case() {
        let mut binder = ParamBinder::new();
        let mut clauses = Vec::new();
        ContactFilters::default().push_clauses(&mut binder, &mut clauses);
        assert_eq!(clauses.len(), 1);
        assert!(clauses[0].contains("pc.id = contacts.case_id"));
    }
}
