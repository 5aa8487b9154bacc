//! UPDATE construction for sparse invoice changes and soft deletes.
//!
//! Only the fields present in a change set are written. `CreatedAt` expands
//! into three assignments so the reference period never drifts from it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::mem::discriminant;
use thiserror::Error;

use crate::models::{Column, InvoiceKey, PeriodError, ReferencePeriod};
use crate::services::statement::{SqlParam, Statement};
use service_core::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("No updatable fields supplied")]
    EmptySet,

    #[error("Field '{field}' must be {expected}")]
    InvalidValue {
        field: &'static str,
        expected: &'static str,
    },

    #[error(transparent)]
    Period(#[from] PeriodError),
}

impl From<UpdateError> for AppError {
    fn from(err: UpdateError) -> Self {
        AppError::BadRequest(anyhow::Error::new(err))
    }
}

/// A single settable invoice field with its new value.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateField {
    Document(String),
    Description(String),
    Amount(Decimal),
    CreatedAt(NaiveDate),
}

impl UpdateField {
    pub fn name(&self) -> &'static str {
        match self {
            UpdateField::Document(_) => "document",
            UpdateField::Description(_) => "description",
            UpdateField::Amount(_) => "amount",
            UpdateField::CreatedAt(_) => "createdat",
        }
    }

    /// Interpret one entry of an update body. Field names are matched
    /// case-insensitively; unknown names yield `Ok(None)`.
    pub fn from_json(name: &str, value: &Value) -> Result<Option<Self>, UpdateError> {
        let field = match name.to_ascii_lowercase().as_str() {
            "document" => UpdateField::Document(expect_str(value, "document")?.to_string()),
            "description" => {
                UpdateField::Description(expect_str(value, "description")?.to_string())
            }
            "amount" => {
                let invalid = UpdateError::InvalidValue {
                    field: "amount",
                    expected: "a number",
                };
                if !value.is_number() {
                    return Err(invalid);
                }
                UpdateField::Amount(serde_json::from_value(value.clone()).map_err(|_| invalid)?)
            }
            "createdat" => {
                let raw = expect_str(value, "createdat")?;
                ReferencePeriod::parse(raw)?;
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    UpdateError::InvalidValue {
                        field: "createdat",
                        expected: "a YYYY-MM-DD date",
                    }
                })?;
                UpdateField::CreatedAt(date)
            }
            _ => return Ok(None),
        };
        Ok(Some(field))
    }
}

fn expect_str<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, UpdateError> {
    value.as_str().ok_or(UpdateError::InvalidValue {
        field,
        expected: "a string",
    })
}

/// Columns written by one field, in assignment order.
pub fn expand_field(field: &UpdateField) -> Vec<(Column, SqlParam)> {
    match field {
        UpdateField::Document(v) => vec![(Column::Document, SqlParam::Text(v.clone()))],
        UpdateField::Description(v) => vec![(Column::Description, SqlParam::Text(v.clone()))],
        UpdateField::Amount(v) => vec![(Column::Amount, SqlParam::Decimal(*v))],
        UpdateField::CreatedAt(date) => {
            let period = ReferencePeriod::from(*date);
            vec![
                (Column::ReferenceMonth, SqlParam::Int(period.month)),
                (Column::ReferenceYear, SqlParam::Int(period.year)),
                (Column::CreatedAt, SqlParam::Date(*date)),
            ]
        }
    }
}

/// Ordered set of field changes. A field given twice keeps its first
/// position and its last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceChanges {
    fields: Vec<UpdateField>,
}

impl InvoiceChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: UpdateField) {
        match self
            .fields
            .iter_mut()
            .find(|existing| discriminant(&**existing) == discriminant(&field))
        {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn with(mut self, field: UpdateField) -> Self {
        self.push(field);
        self
    }

    /// Collect the recognised fields of a JSON object in body order.
    pub fn from_json(body: &Map<String, Value>) -> Result<Self, UpdateError> {
        let mut changes = Self::new();
        for (name, value) in body {
            if let Some(field) = UpdateField::from_json(name, value)? {
                changes.push(field);
            }
        }
        Ok(changes)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[UpdateField] {
        &self.fields
    }
}

fn push_identity(stmt: &mut Statement, sql: &mut String, key: &InvoiceKey) {
    let month = stmt.bind(SqlParam::Int(key.month));
    let year = stmt.bind(SqlParam::Int(key.year));
    let document = stmt.bind(SqlParam::Text(key.document.clone()));
    sql.push_str(&format!(
        " WHERE {} = {} AND {} = {} AND {} = {}",
        Column::ReferenceMonth.as_str(),
        month,
        Column::ReferenceYear.as_str(),
        year,
        Column::Document.as_str(),
        document
    ));
}

/// Build the sparse UPDATE for `key`. The WHERE clause always uses the key
/// as given, even when the change set rewrites `Document`.
pub fn build_update(changes: &InvoiceChanges, key: &InvoiceKey) -> Result<Statement, UpdateError> {
    if changes.is_empty() {
        return Err(UpdateError::EmptySet);
    }

    let mut stmt = Statement::new("");
    let mut assignments = Vec::new();
    for (column, param) in changes.fields().iter().flat_map(expand_field) {
        let p = stmt.bind(param);
        assignments.push(format!("{} = {}", column.as_str(), p));
    }

    let mut sql = format!("UPDATE invoice SET {}", assignments.join(", "));
    push_identity(&mut stmt, &mut sql, key);

    stmt.sql = sql;
    Ok(stmt)
}

/// Build the soft delete for `key`: deactivate and stamp the date.
pub fn build_soft_delete(key: &InvoiceKey, deactivated_on: NaiveDate) -> Statement {
    let mut stmt = Statement::new("");
    let date = stmt.bind(SqlParam::Date(deactivated_on));
    let mut sql = format!(
        "UPDATE invoice SET {} = FALSE, {} = {}",
        Column::IsActive.as_str(),
        Column::DeactiveAt.as_str(),
        date
    );
    push_identity(&mut stmt, &mut sql, key);

    stmt.sql = sql;
    stmt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn created_at_expands_into_period_columns() {
        let changes = InvoiceChanges::from_json(&body(json!({"CreatedAt": "2016-05-01"}))).unwrap();
        let key = InvoiceKey::new(2015, 9, "43210987654321");

        let stmt = build_update(&changes, &key).unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE invoice SET ReferenceMonth = $1, ReferenceYear = $2, CreatedAt = $3 \
             WHERE ReferenceMonth = $4 AND ReferenceYear = $5 AND Document = $6"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlParam::Int(5),
                SqlParam::Int(2016),
                SqlParam::Date(date(2016, 5, 1)),
                SqlParam::Int(9),
                SqlParam::Int(2015),
                SqlParam::Text("43210987654321".to_string()),
            ]
        );
    }

    #[test]
    fn expand_field_is_one_column_for_plain_fields() {
        assert_eq!(
            expand_field(&UpdateField::Description("x".into())),
            vec![(Column::Description, SqlParam::Text("x".into()))]
        );
        assert_eq!(expand_field(&UpdateField::CreatedAt(date(2020, 12, 3))).len(), 3);
    }

    #[test]
    fn field_names_are_case_insensitive_and_unknowns_ignored() {
        let changes = InvoiceChanges::from_json(&body(json!({
            "DESCRIPTION": "Renamed",
            "IsActive": false,
            "ReferenceYear": 1999,
            "aMoUnT": 42.5
        })))
        .unwrap();

        assert_eq!(
            changes.fields(),
            &[
                UpdateField::Description("Renamed".to_string()),
                UpdateField::Amount(Decimal::from_str("42.5").unwrap()),
            ]
        );
    }

    #[test]
    fn placeholders_skip_ignored_keys() {
        let changes = InvoiceChanges::from_json(&body(json!({
            "bogus": 1,
            "Document": "NEWDOCUMENT001",
            "Amount": 10
        })))
        .unwrap();
        let stmt = build_update(&changes, &InvoiceKey::new(2017, 6, "OLDDOCUMENT001")).unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE invoice SET Document = $1, Amount = $2 \
             WHERE ReferenceMonth = $3 AND ReferenceYear = $4 AND Document = $5"
        );
        assert_eq!(stmt.params[0], SqlParam::Text("NEWDOCUMENT001".to_string()));
        assert_eq!(stmt.params[4], SqlParam::Text("OLDDOCUMENT001".to_string()));
    }

    #[test]
    fn repeated_field_keeps_first_slot_and_last_value() {
        let changes = InvoiceChanges::new()
            .with(UpdateField::Description("first".into()))
            .with(UpdateField::Document("ABCDEFGHIJKLMN".into()))
            .with(UpdateField::Description("second".into()));

        assert_eq!(
            changes.fields(),
            &[
                UpdateField::Description("second".into()),
                UpdateField::Document("ABCDEFGHIJKLMN".into()),
            ]
        );
    }

    #[test]
    fn empty_change_set_is_rejected() {
        let key = InvoiceKey::new(2017, 6, "12345678901234");
        assert_eq!(
            build_update(&InvoiceChanges::new(), &key),
            Err(UpdateError::EmptySet)
        );

        let only_unknown = InvoiceChanges::from_json(&body(json!({"IsActive": true}))).unwrap();
        assert_eq!(build_update(&only_unknown, &key), Err(UpdateError::EmptySet));
    }

    #[test]
    fn wrong_value_types_are_rejected() {
        assert!(UpdateField::from_json("amount", &json!("12")).is_err());
        assert!(UpdateField::from_json("document", &json!(12)).is_err());
        assert!(UpdateField::from_json("createdat", &json!("2016/05/01")).is_err());
        assert!(UpdateField::from_json("createdat", &json!("2016-02-30")).is_err());
        assert_eq!(UpdateField::from_json("isactive", &json!("x")), Ok(None));
    }

    #[test]
    fn soft_delete_targets_identity() {
        let stmt = build_soft_delete(&InvoiceKey::new(2018, 2, "ZZZZZZZZZZZZZZ"), date(2024, 1, 15));

        assert_eq!(
            stmt.sql,
            "UPDATE invoice SET IsActive = FALSE, DeactiveAt = $1 \
             WHERE ReferenceMonth = $2 AND ReferenceYear = $3 AND Document = $4"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlParam::Date(date(2024, 1, 15)),
                SqlParam::Int(2),
                SqlParam::Int(2018),
                SqlParam::Text("ZZZZZZZZZZZZZZ".to_string()),
            ]
        );
    }
}
