//! SQL text plus its positional parameters.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgArguments;
use sqlx::Arguments;

/// A value bound to a numbered placeholder (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i32),
    BigInt(i64),
    Text(String),
    Decimal(Decimal),
    Date(NaiveDate),
    Bool(bool),
}

/// A statement ready to run: `params[i]` binds placeholder `$i+1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Push a parameter and return its placeholder.
    pub fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    /// Convert the parameters into sqlx arguments, preserving order.
    pub fn arguments(&self) -> Result<PgArguments, sqlx::error::BoxDynError> {
        let mut args = PgArguments::default();
        for param in &self.params {
            match param {
                SqlParam::Int(v) => args.add(*v)?,
                SqlParam::BigInt(v) => args.add(*v)?,
                SqlParam::Text(v) => args.add(v.clone())?,
                SqlParam::Decimal(v) => args.add(*v)?,
                SqlParam::Date(v) => args.add(*v)?,
                SqlParam::Bool(v) => args.add(*v)?,
            }
        }
        Ok(args)
    }
}
