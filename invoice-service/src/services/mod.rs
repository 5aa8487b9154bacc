//! Services module for invoice-service.

pub mod database;
pub mod metrics;
pub mod query;
pub mod statement;
pub mod update;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
pub use query::{build_select, InvoiceFilter, InvoiceQuery, Pagination, SortKey};
pub use statement::{SqlParam, Statement};
pub use update::{
    build_soft_delete, build_update, expand_field, InvoiceChanges, UpdateError, UpdateField,
};
