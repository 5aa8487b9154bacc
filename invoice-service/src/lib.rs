//! Invoice registry service: create, list, sparse update and soft delete of
//! invoices stored in PostgreSQL.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::AppState;
