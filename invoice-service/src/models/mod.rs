//! Domain models for invoice-service.

mod invoice;

pub use invoice::{Column, Invoice, InvoiceKey, NewInvoice, PeriodError, ReferencePeriod};
