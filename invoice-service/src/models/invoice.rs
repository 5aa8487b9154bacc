//! Invoice model for invoice-service.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// A date string whose reference period could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("'{0}' is not a YYYY-MM-DD date")]
    Malformed(String),
}

/// Reference year and month of an invoice, always taken from its `CreatedAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferencePeriod {
    pub year: i32,
    pub month: i32,
}

impl ReferencePeriod {
    /// Read the period from a `YYYY-MM-DD` string: characters 1-4 are the
    /// year, characters 6-7 the month.
    pub fn parse(date: &str) -> Result<Self, PeriodError> {
        let malformed = || PeriodError::Malformed(date.to_string());

        let digits = |range: std::ops::Range<usize>| -> Result<i32, PeriodError> {
            let part = date.get(range).ok_or_else(malformed)?;
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            part.parse().map_err(|_| malformed())
        };

        Ok(Self {
            year: digits(0..4)?,
            month: digits(5..7)?,
        })
    }
}

impl From<NaiveDate> for ReferencePeriod {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month() as i32,
        }
    }
}

/// Physical columns of the `invoice` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    ReferenceMonth,
    ReferenceYear,
    Document,
    Description,
    Amount,
    IsActive,
    CreatedAt,
    DeactiveAt,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::ReferenceMonth => "ReferenceMonth",
            Column::ReferenceYear => "ReferenceYear",
            Column::Document => "Document",
            Column::Description => "Description",
            Column::Amount => "Amount",
            Column::IsActive => "IsActive",
            Column::CreatedAt => "CreatedAt",
            Column::DeactiveAt => "DeactiveAt",
        }
    }
}

/// Identity of an invoice row: the (year, month, document) triple used by
/// updates and deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceKey {
    pub year: i32,
    pub month: i32,
    pub document: String,
}

impl InvoiceKey {
    pub fn new(year: i32, month: i32, document: impl Into<String>) -> Self {
        Self {
            year,
            month,
            document: document.into(),
        }
    }
}

/// One row of the `invoice` table.
///
/// Postgres folds the unquoted column names to lowercase, hence the explicit
/// row renames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "PascalCase")]
pub struct Invoice {
    #[sqlx(rename = "referencemonth")]
    pub reference_month: i32,
    #[sqlx(rename = "referenceyear")]
    pub reference_year: i32,
    #[sqlx(rename = "document")]
    pub document: String,
    #[sqlx(rename = "description")]
    pub description: String,
    #[sqlx(rename = "amount")]
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[sqlx(rename = "createdat")]
    pub created_at: NaiveDate,
    #[sqlx(rename = "isactive")]
    pub is_active: bool,
    #[sqlx(rename = "deactiveat")]
    pub deactive_at: Option<NaiveDate>,
}

/// Input for creating an invoice. Already validated by the caller.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub document: String,
    pub description: String,
    pub amount: Decimal,
    pub created_at: NaiveDate,
}

impl Invoice {
    /// Build a fresh, active invoice with its reference period derived from
    /// `created_at`.
    pub fn new(input: NewInvoice) -> Self {
        let period = ReferencePeriod::from(input.created_at);
        Self {
            reference_month: period.month,
            reference_year: period.year,
            document: input.document,
            description: input.description,
            amount: input.amount,
            created_at: input.created_at,
            is_active: true,
            deactive_at: None,
        }
    }

    pub fn key(&self) -> InvoiceKey {
        InvoiceKey::new(self.reference_year, self.reference_month, self.document.clone())
    }
}
