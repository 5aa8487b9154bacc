//! Request and response shapes for the invoice endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::{Validate, ValidationError};

use crate::models::{InvoiceKey, NewInvoice};
use crate::services::{InvoiceFilter, InvoiceQuery, Pagination, SortKey};

// ============================================================================
// Create
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CreateInvoiceRequest {
    #[validate(length(equal = 14, message = "Document must be exactly 14 characters"))]
    pub document: String,

    #[validate(length(max = 256, message = "Description must be at most 256 characters"))]
    pub description: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    #[validate(custom(function = "not_in_future"))]
    pub created_at: NaiveDate,
}

fn not_in_future(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date > chrono::Local::now().date_naive() {
        let mut err = ValidationError::new("future_date");
        err.message = Some("CreatedAt must not be in the future".into());
        return Err(err);
    }
    Ok(())
}

impl From<CreateInvoiceRequest> for NewInvoice {
    fn from(req: CreateInvoiceRequest) -> Self {
        Self {
            document: req.document,
            description: req.description,
            amount: req.amount,
            created_at: req.created_at,
        }
    }
}

/// Body returned by update and delete.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationResult {
    pub result: String,
}

impl OperationResult {
    pub fn success() -> Self {
        Self {
            result: "success".to_string(),
        }
    }
}

// ============================================================================
// Path segments
// ============================================================================

fn not_found(segment: &str, value: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No route for {} '{}'", segment, value))
}

/// Years 1950 through 2099, four digits.
pub fn parse_year(raw: &str) -> Result<i32, AppError> {
    let valid = raw.len() == 4
        && raw.bytes().all(|b| b.is_ascii_digit())
        && ((raw.starts_with("19") && raw.as_bytes()[2] >= b'5') || raw.starts_with("20"));
    if !valid {
        return Err(not_found("year", raw));
    }
    raw.parse().map_err(|_| not_found("year", raw))
}

/// Months 1 through 12, no leading zero.
pub fn parse_month(raw: &str) -> Result<i32, AppError> {
    let valid = match raw.as_bytes() {
        [d] => (b'1'..=b'9').contains(d),
        [b'1', d] => (b'0'..=b'2').contains(d),
        _ => false,
    };
    if !valid {
        return Err(not_found("month", raw));
    }
    raw.parse().map_err(|_| not_found("month", raw))
}

/// Exactly 14 ASCII letters or digits.
pub fn parse_document(raw: &str) -> Result<String, AppError> {
    if raw.len() != 14 || !raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(not_found("document", raw));
    }
    Ok(raw.to_string())
}

/// Validate the full `/:year/:month/:document` path.
pub fn parse_key(year: &str, month: &str, document: &str) -> Result<InvoiceKey, AppError> {
    Ok(InvoiceKey::new(
        parse_year(year)?,
        parse_month(month)?,
        parse_document(document)?,
    ))
}

// ============================================================================
// Listing query string
// ============================================================================

/// Turn path filters and the raw query string into a listing query.
///
/// `per_page` and `page` use their first occurrence; `order` may repeat.
pub fn list_query(filter: InvoiceFilter, raw_query: Option<&str>) -> Result<InvoiceQuery, AppError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw_query.unwrap_or(""))
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid query string: {}", e)))?;

    let first = |name: &str| {
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let pagination = Pagination::from_raw(first("per_page"), first("page"));
    let order_by = SortKey::parse_list(
        pairs
            .iter()
            .filter(|(key, _)| key == "order")
            .map(|(_, value)| value.as_str()),
    );

    Ok(InvoiceQuery {
        filter,
        order_by,
        pagination,
    })
}
