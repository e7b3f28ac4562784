//! Sorting and pagination for list queries.
//!
//! Sort columns are closed enums: a caller-supplied column name that is not
//! on the allow-list is ignored (the query falls back to the default order),
//! never spliced into SQL. Limits are clamped, offsets floored at zero.

/// Maximum page size. Requests above this are clamped, not rejected.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Page size used when the caller supplies none (or a non-numeric value).
pub const DEFAULT_LIST_LIMIT: i64 = MAX_LIST_LIMIT;

// ============================================================================
// SORT
// ============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Parse a caller-supplied direction; anything unrecognized falls back
    /// to descending.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }
}

/// A sortable column backed by an allow-listed SQL identifier.
pub trait SortColumn: Sized + Copy {
    /// Default column used when the caller specifies none.
    fn default_column() -> Self;

    /// The allow-listed SQL identifier for this column.
    fn as_sql(self) -> &'static str;

    /// Parse a caller-supplied column name; `None` for unknown columns
    /// (ignored, not an error).
    fn parse(raw: &str) -> Option<Self>;
}

/// Sortable columns for case lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSortColumn {
    Id,
    CreatedAt,
    UpdatedAt,
    Status,
    Label,
}

impl SortColumn for CaseSortColumn {
    fn default_column() -> Self {
        CaseSortColumn::Id
    }

    fn as_sql(self) -> &'static str {
        match self {
            CaseSortColumn::Id => "id",
            CaseSortColumn::CreatedAt => "created_at",
            CaseSortColumn::UpdatedAt => "updated_at",
            CaseSortColumn::Status => "status",
            CaseSortColumn::Label => "label",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(CaseSortColumn::Id),
            "created_at" => Some(CaseSortColumn::CreatedAt),
            "updated_at" => Some(CaseSortColumn::UpdatedAt),
            "status" => Some(CaseSortColumn::Status),
            "label" => Some(CaseSortColumn::Label),
            _ => None,
        }
    }
}

/// Sortable columns for contact lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactSortColumn {
    Id,
    TimeOfContact,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn for ContactSortColumn {
    fn default_column() -> Self {
        ContactSortColumn::TimeOfContact
    }

    fn as_sql(self) -> &'static str {
        match self {
            ContactSortColumn::Id => "id",
            ContactSortColumn::TimeOfContact => "time_of_contact",
            ContactSortColumn::CreatedAt => "created_at",
            ContactSortColumn::UpdatedAt => "updated_at",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(ContactSortColumn::Id),
            "time_of_contact" => Some(ContactSortColumn::TimeOfContact),
            "created_at" => Some(ContactSortColumn::CreatedAt),
            "updated_at" => Some(ContactSortColumn::UpdatedAt),
            _ => None,
        }
    }
}

/// Caller-specified ordering for one list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<C: SortColumn> {
    pub column: C,
    pub direction: SortDirection,
}

impl<C: SortColumn> Default for Sort<C> {
    fn default() -> Self {
        Self {
            column: C::default_column(),
            direction: SortDirection::Desc,
        }
    }
}

impl<C: SortColumn> Sort<C> {
    /// Build a `Sort` from raw query-string values. Unknown columns are
    /// ignored and the default ordering applies.
    pub fn from_query(column: Option<&str>, direction: Option<&str>) -> Self {
        let column = column.and_then(C::parse).unwrap_or_else(C::default_column);
        let direction = direction.map(SortDirection::parse).unwrap_or_default();
        Self { column, direction }
    }

    /// Render the ORDER BY expression, always appending the fixed `id DESC`
    /// tie-breaker so pagination stays stable across pages.
    pub fn order_by(&self) -> String {
        let column = self.column.as_sql();
        if column == "id" {
            format!("{} {}", column, self.direction.as_sql())
        } else {
            format!("{} {}, id DESC", column, self.direction.as_sql())
        }
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

/// Validated LIMIT/OFFSET pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    limit: i64,
    offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Clamp caller-supplied values into the valid range.
    ///
    /// A negative numeric limit clamps to 0 (an intentional zero-row page),
    /// while an absent limit falls back to the default; only
    /// [`Pagination::from_query`] maps non-numeric input to absent.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(0, MAX_LIST_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }

    /// Parse raw query-string values; non-numeric input falls back to the
    /// defaults rather than erroring.
    pub fn from_query(limit: Option<&str>, offset: Option<&str>) -> Self {
        Self::new(
            limit.and_then(|s| s.parse().ok()),
            offset.and_then(|s| s.parse().ok()),
        )
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}
