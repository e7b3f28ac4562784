//! Postgres persistence layer for careline.
//!
//! Everything that talks to the database lives here: the permission
//! condition compiler, the list/search query builders, the cross-entity
//! timeline, and the touch-propagating write layer for cases, contacts,
//! case sections and identifiers.
//!
//! The crate builds SQL deterministically (same inputs, same text, same
//! placeholder numbering) so that generated queries are testable as plain
//! strings without a live database. Integration tests that do need Postgres
//! are gated behind the `db-tests` cargo feature.

pub mod client;
pub mod config;
pub mod error;
pub mod filters;
pub mod list;
pub mod notify;
pub mod paging;
pub mod permissions;
pub mod sql;
pub mod timeline;

mod cases;
mod contacts;
mod identifiers;
mod rows;
mod sections;
mod write;

pub use client::Db;
pub use config::DbConfig;
pub use error::{DbError, DbResult};
pub use filters::{CaseFilters, CategoryFilter, ContactFilters, DateRange, ExistsModifier};
pub use list::{CaseListQuery, ContactListQuery, Page};
pub use notify::{ChangeEvent, ChangeNotifier, ChangeOperation, EntityKind, NoopNotifier, NotifyError};
pub use paging::{
    CaseSortColumn, ContactSortColumn, Pagination, Sort, SortDirection, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT,
};
pub use permissions::{compile_condition_sets, CompiledPermission, SqlCondition};
pub use sql::{ParamBinder, SqlParam};
pub use timeline::{TimelinePage, TimelineRequest, SECTION_TYPE_WILDCARD};
pub use write::{CreateResult, MAX_CREATE_ATTEMPTS};
