//! Shelf listing: search, sort, pagination and status filtering for one
//! owner's books.

use crate::db::{BookRecord, Database};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Hard ceiling on page size.
pub const MAX_LIMIT: i64 = 50;
/// Page size used when the client does not ask for one.
pub const DEFAULT_LIMIT: i64 = 20;

/// Sortable record fields. Unrecognized input falls back to `CreatedAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Upload time (default).
    CreatedAt,
    /// Last modification time.
    UpdatedAt,
    /// Title, case-insensitive.
    Title,
    /// Author, case-insensitive.
    Author,
}

impl SortField {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("createdAt") => SortField::CreatedAt,
            Some("updatedAt") => SortField::UpdatedAt,
            Some("title") => SortField::Title,
            Some("author") => SortField::Author,
            _ => SortField::CreatedAt,
        }
    }

    /// Column name in the books table.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title",
            SortField::Author => "author",
        }
    }

    /// Whether the field compares as text (and needs NOCASE collation).
    pub fn is_text(&self) -> bool {
        matches!(self, SortField::Title | SortField::Author)
    }
}

/// Sort direction. Unrecognized input falls back to `Desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Desc,
        }
    }

    /// SQL keyword for this direction.
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Reading state derived from a record's progress fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingStatus {
    /// Never opened, or no progress recorded.
    Unread,
    /// Started but not finished.
    Reading,
    /// Fully read.
    Completed,
}

/// Classify a record: unread when the percentage is zero or the position
/// was never set, completed at one hundred percent, reading otherwise.
pub fn reading_status(book: &BookRecord) -> ReadingStatus {
    if book.percentage <= 0.0 || book.cfi.is_none() {
        ReadingStatus::Unread
    } else if book.percentage >= 100.0 {
        ReadingStatus::Completed
    } else {
        ReadingStatus::Reading
    }
}

/// Completion-status filter. Unrecognized input falls back to `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// No filtering.
    All,
    /// Only unread records.
    Unread,
    /// Only records in progress.
    Reading,
    /// Only completed records.
    Completed,
}

impl StatusFilter {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("unread") => StatusFilter::Unread,
            Some("reading") => StatusFilter::Reading,
            Some("completed") => StatusFilter::Completed,
            _ => StatusFilter::All,
        }
    }

    /// Whether a record passes this filter.
    pub fn matches(&self, book: &BookRecord) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Unread => reading_status(book) == ReadingStatus::Unread,
            StatusFilter::Reading => reading_status(book) == ReadingStatus::Reading,
            StatusFilter::Completed => reading_status(book) == ReadingStatus::Completed,
        }
    }
}

/// Raw query parameters as they arrive on `GET /books`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListParams {
    /// Requested page, 1-based.
    pub page: Option<i64>,
    /// Requested page size.
    pub limit: Option<i64>,
    /// Sort field name.
    pub sort: Option<String>,
    /// Sort direction.
    pub order: Option<String>,
    /// Free-text search over title and author.
    pub search: Option<String>,
    /// Completion-status filter.
    pub status: Option<String>,
}

/// Fully resolved listing query after clamping and fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// Page, clamped to >= 1.
    pub page: i64,
    /// Page size, clamped to [1, MAX_LIMIT].
    pub limit: i64,
    /// Resolved sort field.
    pub sort: SortField,
    /// Resolved sort direction.
    pub order: SortOrder,
    /// Trimmed search term; `None` means no filter.
    pub search: Option<String>,
    /// Resolved status filter.
    pub status: StatusFilter,
}

impl ListParams {
    /// Resolve raw parameters into a query, applying defaults, clamps and
    /// silent fallbacks for unrecognized sort/order/status values.
    pub fn resolve(&self) -> ListQuery {
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        ListQuery {
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            sort: SortField::parse(self.sort.as_deref()),
            order: SortOrder::parse(self.order.as_deref()),
            search,
            status: StatusFilter::parse(self.status.as_deref()),
        }
    }
}

/// Resolved sort reported back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct SortInfo {
    /// Field actually used.
    pub by: SortField,
    /// Direction actually used.
    pub order: SortOrder,
}

/// Pagination metadata for one listing response.
///
/// Counts reflect the owner + search predicate only; the status filter
/// runs after pagination and does not change them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Page served.
    pub page: i64,
    /// Page size used.
    pub limit: i64,
    /// Matching records before the status filter.
    pub total: i64,
    /// Total pages at this limit.
    pub total_pages: i64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_prev: bool,
    /// Sort actually applied.
    pub sort: SortInfo,
}

/// One page of an owner's shelf.
#[derive(Debug, Clone)]
pub struct BookPage {
    /// Records on this page, after the status filter.
    pub books: Vec<BookRecord>,
    /// Pagination metadata.
    pub info: PageInfo,
}

/// Run the listing query for one owner.
///
/// The page is fetched with a sorted skip/limit query; when a status
/// filter is active it is applied to the fetched page in memory, so a
/// filtered page may hold fewer than `limit` records while `total` and
/// `total_pages` still count every search match.
pub fn list_books(db: &Database, owner_id: &str, params: &ListParams) -> Result<BookPage> {
    let query = params.resolve();

    let total = db.count_owner_books(owner_id, query.search.as_deref())?;
    let offset = (query.page - 1) * query.limit;

    let fetched = db.list_owner_books(
        owner_id,
        query.search.as_deref(),
        query.sort,
        query.order,
        query.limit,
        offset,
    )?;

    let books: Vec<BookRecord> = match query.status {
        StatusFilter::All => fetched,
        filter => fetched.into_iter().filter(|b| filter.matches(b)).collect(),
    };

    let info = PageInfo {
        page: query.page,
        limit: query.limit,
        total,
        total_pages: if total == 0 {
            0
        } else {
            (total + query.limit - 1) / query.limit
        },
        has_next: query.page * query.limit < total,
        has_prev: query.page > 1,
        sort: SortInfo {
            by: query.sort,
            order: query.order,
        },
    };

    Ok(BookPage { books, info })
}

/// Escape LIKE metacharacters in a user-supplied search term.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
