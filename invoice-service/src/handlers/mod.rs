//! HTTP handlers for invoice-service.

pub mod health;
pub mod invoices;

pub use health::*;
pub use invoices::*;
