//! List Query Builder.
//!
//! Composes, in a fixed order, the account predicate, the compiled
//! permission clause, the filter clauses, orphan exclusion, dedup, the
//! window-function total count, allow-listed ordering and pagination into a
//! single paginated + counted statement. One round trip yields both the page
//! and its total, computed from the same snapshot.

use crate::client::Db;
use crate::error::DbResult;
use crate::filters::{CaseFilters, ContactFilters};
use crate::paging::{CaseSortColumn, ContactSortColumn, Pagination, Sort};
use crate::permissions::{compile_condition_sets, CompiledPermission, SqlCondition};
use crate::rows::{case_from_row, contact_from_row};
use crate::sql::{borrow_params, ParamBinder, SqlParam};
use careline_core::{
    CallerIdentity, Case, CaseCondition, CaseId, Contact, ContactCondition, ContactId,
};
use tokio_postgres::Row;

/// One page of results plus the pagination-independent total.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Total row count before LIMIT/OFFSET, identical for every page of the
    /// same query.
    pub total_count: i64,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            total_count: 0,
            rows: Vec::new(),
        }
    }
}

// ============================================================================
// QUERY INPUTS
// ============================================================================

/// All inputs for one case list query.
#[derive(Debug, Clone)]
pub struct CaseListQuery<'a> {
    pub account_id: &'a str,
    pub user: &'a CallerIdentity,
    /// Resolved view-case rule structure (OR of AND-sets).
    pub permissions: &'a [Vec<CaseCondition>],
    pub filters: &'a CaseFilters,
    pub sort: Sort<CaseSortColumn>,
    pub pagination: Pagination,
}

/// All inputs for one contact list query.
#[derive(Debug, Clone)]
pub struct ContactListQuery<'a> {
    pub account_id: &'a str,
    pub user: &'a CallerIdentity,
    /// Resolved view-contact rule structure.
    pub permissions: &'a [Vec<ContactCondition>],
    pub filters: &'a ContactFilters,
    pub sort: Sort<ContactSortColumn>,
    pub pagination: Pagination,
}

// ============================================================================
// SQL COMPOSITION
// ============================================================================

/// Append the compiled permission clause to the WHERE conjunction.
/// Allow-all appends nothing; deny-all appends the constant-false predicate.
pub(crate) fn push_permission_clause<C: SqlCondition>(
    permissions: &[Vec<C>],
    user: &CallerIdentity,
    binder: &mut ParamBinder,
    clauses: &mut Vec<String>,
) {
    match compile_condition_sets(permissions, user, binder) {
        CompiledPermission::AllowAll => {}
        compiled => {
            if let Some(clause) = compiled.as_clause() {
                clauses.push(clause.to_string());
            }
        }
    }
}

fn paginated_list_sql(
    table: &str,
    clauses: &[String],
    order_by: &str,
    pagination: Pagination,
    binder: &mut ParamBinder,
) -> String {
    let limit = binder.push(SqlParam::Long(pagination.limit()));
    let offset = binder.push(SqlParam::Long(pagination.offset()));
    // DISTINCT ON in the inner select guarantees one row per entity even
    // when filter subqueries fan out; the window count therefore counts
    // entities, not join rows.
    format!(
        "SELECT *, COUNT(*) OVER () AS total_count FROM (\
         SELECT DISTINCT ON ({table}.account_id, {table}.id) {table}.* \
         FROM {table} \
         WHERE {conditions} \
         ORDER BY {table}.account_id, {table}.id\
         ) AS {table} \
         ORDER BY {order_by} \
         LIMIT {limit} OFFSET {offset}",
        conditions = clauses.join(" AND "),
    )
}

/// Build the paginated + counted case list statement.
pub fn build_case_list_sql(query: &CaseListQuery<'_>) -> (String, Vec<SqlParam>) {
    let mut binder = ParamBinder::new();
    let account = binder.push(SqlParam::Text(query.account_id.to_string()));
    let mut clauses = vec![format!("cases.account_id = {account}")];

    push_permission_clause(query.permissions, query.user, &mut binder, &mut clauses);
    query.filters.push_clauses(&mut binder, &mut clauses);

    let sql = paginated_list_sql(
        "cases",
        &clauses,
        &query.sort.order_by(),
        query.pagination,
        &mut binder,
    );
    (sql, binder.into_params())
}

/// Build the paginated + counted contact list statement.
pub fn build_contact_list_sql(query: &ContactListQuery<'_>) -> (String, Vec<SqlParam>) {
    let mut binder = ParamBinder::new();
    let account = binder.push(SqlParam::Text(query.account_id.to_string()));
    let mut clauses = vec![format!("contacts.account_id = {account}")];

    push_permission_clause(query.permissions, query.user, &mut binder, &mut clauses);
    query.filters.push_clauses(&mut binder, &mut clauses);

    let sql = paginated_list_sql(
        "contacts",
        &clauses,
        &query.sort.order_by(),
        query.pagination,
        &mut binder,
    );
    (sql, binder.into_params())
}

/// Build the statement re-fetching externally ranked ids in rank order,
/// under the same permission predicate as the list queries.
fn build_search_by_ids_sql<C: SqlCondition>(
    table: &str,
    account_id: &str,
    user: &CallerIdentity,
    permissions: &[Vec<C>],
    ids: &[i64],
) -> (String, Vec<SqlParam>) {
    let mut binder = ParamBinder::new();
    let account = binder.push(SqlParam::Text(account_id.to_string()));
    let ranked = binder.push(SqlParam::LongArray(ids.to_vec()));
    let mut clauses = vec![
        format!("{table}.account_id = {account}"),
        format!("{table}.id = ANY({ranked})"),
    ];
    push_permission_clause(permissions, user, &mut binder, &mut clauses);

    let sql = format!(
        "SELECT {table}.* FROM {table} \
         WHERE {conditions} \
         ORDER BY array_position({ranked}, {table}.id)",
        conditions = clauses.join(" AND "),
    );
    (sql, binder.into_params())
}

pub fn build_case_search_by_ids_sql(
    account_id: &str,
    user: &CallerIdentity,
    permissions: &[Vec<CaseCondition>],
    ids: &[CaseId],
) -> (String, Vec<SqlParam>) {
    build_search_by_ids_sql("cases", account_id, user, permissions, ids)
}

pub fn build_contact_search_by_ids_sql(
    account_id: &str,
    user: &CallerIdentity,
    permissions: &[Vec<ContactCondition>],
    ids: &[ContactId],
) -> (String, Vec<SqlParam>) {
    build_search_by_ids_sql("contacts", account_id, user, permissions, ids)
}

// ============================================================================
// EXECUTION
// ============================================================================

fn page_from_rows<T>(rows: &[Row], map: impl Fn(&Row) -> T) -> Page<T> {
    let total_count = rows
        .first()
        .map(|row| row.get::<_, i64>("total_count"))
        .unwrap_or(0);
    Page {
        total_count,
        rows: rows.iter().map(map).collect(),
    }
}

impl Db {
    /// List cases under the caller's permission clause, filters, sort and
    /// pagination.
    pub async fn list_cases(&self, query: &CaseListQuery<'_>) -> DbResult<Page<Case>> {
        let (sql, params) = build_case_list_sql(query);
        let conn = self.conn().await?;
        let rows = conn.query(&sql, &borrow_params(&params)).await?;
        Ok(page_from_rows(&rows, case_from_row))
    }

    /// List contacts under the caller's permission clause, filters, sort and
    /// pagination.
    pub async fn list_contacts(&self, query: &ContactListQuery<'_>) -> DbResult<Page<Contact>> {
        let (sql, params) = build_contact_list_sql(query);
        let conn = self.conn().await?;
        let rows = conn.query(&sql, &borrow_params(&params)).await?;
        Ok(page_from_rows(&rows, contact_from_row))
    }

    /// Re-fetch cases for an externally ranked id list (full-text search
    /// lives outside this core), preserving the external rank order.
    pub async fn search_cases_by_ids(
        &self,
        account_id: &str,
        user: &CallerIdentity,
        permissions: &[Vec<CaseCondition>],
        ids: &[CaseId],
    ) -> DbResult<Vec<Case>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let (sql, params) = build_case_search_by_ids_sql(account_id, user, permissions, ids);
        let conn = self.conn().await?;
        let rows = conn.query(&sql, &borrow_params(&params)).await?;
        Ok(rows.iter().map(case_from_row).collect())
    }

    /// Re-fetch contacts for an externally ranked id list, preserving the
    /// external rank order.
    pub async fn search_contacts_by_ids(
        &self,
        account_id: &str,
        user: &CallerIdentity,
        permissions: &[Vec<ContactCondition>],
        ids: &[ContactId],
    ) -> DbResult<Vec<Contact>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let (sql, params) = build_contact_search_by_ids_sql(account_id, user, permissions, ids);
        let conn = self.conn().await?;
        let rows = conn.query(&sql, &borrow_params(&params)).await?;
        Ok(rows.iter().map(contact_from_row).collect())
    }
}
