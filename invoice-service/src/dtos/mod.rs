pub mod invoices;

pub use invoices::*;
