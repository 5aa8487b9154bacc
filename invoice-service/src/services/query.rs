//! SELECT construction for invoice listings.
//!
//! Filters, sort keys and pagination are closed sets; anything the listing
//! does not recognise is dropped before it gets near the SQL text.

use crate::models::Column;
use crate::services::statement::{SqlParam, Statement};

pub const DEFAULT_PER_PAGE: i64 = 100;
pub const MAX_PER_PAGE: i64 = 400;

/// Exact-match filters. Predicates are emitted month, year, document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub document: Option<String>,
}

impl InvoiceFilter {
    pub fn is_empty(&self) -> bool {
        self.month.is_none() && self.year.is_none() && self.document.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Year,
    Month,
    Document,
}

impl SortKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "year" => Some(SortKey::Year),
            "month" => Some(SortKey::Month),
            "document" => Some(SortKey::Document),
            _ => None,
        }
    }

    pub fn column(&self) -> Column {
        match self {
            SortKey::Year => Column::ReferenceYear,
            SortKey::Month => Column::ReferenceMonth,
            SortKey::Document => Column::Document,
        }
    }

    /// Parse `order` values in request order, skipping unknown keys and
    /// repeats of a key already seen.
    pub fn parse_list<I, S>(raw: I) -> Vec<SortKey>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys = Vec::new();
        for key in raw.into_iter().filter_map(|s| SortKey::parse(s.as_ref())) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

/// Page-number pagination. `limit` is always within `1..=MAX_PER_PAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    limit: i64,
    page: i64,
}

impl Pagination {
    /// Out-of-range limits fall back to [`DEFAULT_PER_PAGE`]; negative pages
    /// fall back to the first page.
    pub fn new(limit: i64, page: i64) -> Self {
        let limit = if (1..=MAX_PER_PAGE).contains(&limit) {
            limit
        } else {
            DEFAULT_PER_PAGE
        };
        Self {
            limit,
            page: page.max(0),
        }
    }

    /// Build from raw `per_page` / `page` query values. Unparseable values
    /// are treated like out-of-range ones.
    pub fn from_raw(per_page: Option<&str>, page: Option<&str>) -> Self {
        let limit = per_page
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_PER_PAGE);
        let page = page.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
        Self::new(limit, page)
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    /// Row offset of the first row on this page.
    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE, 0)
    }
}

/// Everything a listing needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceQuery {
    pub filter: InvoiceFilter,
    pub order_by: Vec<SortKey>,
    pub pagination: Pagination,
}

/// Build the listing SELECT. Placeholders run left to right: filters, then
/// limit, then offset.
pub fn build_select(query: &InvoiceQuery) -> Statement {
    let mut stmt = Statement::new("");
    let mut sql = String::from("SELECT * FROM invoice");

    let filter = &query.filter;
    let mut predicates = Vec::new();
    if let Some(month) = filter.month {
        let p = stmt.bind(SqlParam::Int(month));
        predicates.push(format!("{} = {}", Column::ReferenceMonth.as_str(), p));
    }
    if let Some(year) = filter.year {
        let p = stmt.bind(SqlParam::Int(year));
        predicates.push(format!("{} = {}", Column::ReferenceYear.as_str(), p));
    }
    if let Some(document) = &filter.document {
        let p = stmt.bind(SqlParam::Text(document.clone()));
        predicates.push(format!("{} = {}", Column::Document.as_str(), p));
    }
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    if !query.order_by.is_empty() {
        let columns: Vec<&str> = query.order_by.iter().map(|k| k.column().as_str()).collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&columns.join(", "));
    }

    let limit = stmt.bind(SqlParam::BigInt(query.pagination.limit()));
    let offset = stmt.bind(SqlParam::BigInt(query.pagination.offset()));
    sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

    stmt.sql = sql;
    stmt
}
