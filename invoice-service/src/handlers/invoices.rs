//! Invoice handlers.
//!
//! Path segments are validated here; a segment outside its allowed shape is
//! reported as a missing route. Bodies are decoded as JSON whatever their
//! `Content-Type`.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    list_query, parse_document, parse_key, parse_month, parse_year, CreateInvoiceRequest,
    OperationResult,
};
use crate::models::{Invoice, NewInvoice};
use crate::services::{InvoiceChanges, InvoiceFilter};
use crate::startup::AppState;

fn payload<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        AppError::BadRequest(anyhow::anyhow!("Invalid request payload"))
    })
}

/// Create an invoice.
///
/// POST /invoice
pub async fn create_invoice(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let req: CreateInvoiceRequest = payload(&body)?;
    req.validate()?;

    let invoice = state.db.create_invoice(&NewInvoice::from(req)).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn list(
    state: &AppState,
    filter: InvoiceFilter,
    raw_query: Option<String>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let query = list_query(filter, raw_query.as_deref())?;
    let invoices = state.db.list_invoices(&query).await?;
    Ok(Json(invoices))
}

/// GET /invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<Invoice>>, AppError> {
    list(&state, InvoiceFilter::default(), raw_query).await
}

/// GET /invoices/:year
pub async fn list_invoices_by_year(
    State(state): State<AppState>,
    Path(year): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let filter = InvoiceFilter {
        year: Some(parse_year(&year)?),
        ..Default::default()
    };
    list(&state, filter, raw_query).await
}

/// GET /invoices/:year/:month
pub async fn list_invoices_by_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let filter = InvoiceFilter {
        year: Some(parse_year(&year)?),
        month: Some(parse_month(&month)?),
        document: None,
    };
    list(&state, filter, raw_query).await
}

/// GET /invoices/:year/:month/:document
pub async fn list_invoices_by_document(
    State(state): State<AppState>,
    Path((year, month, document)): Path<(String, String, String)>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let filter = InvoiceFilter {
        year: Some(parse_year(&year)?),
        month: Some(parse_month(&month)?),
        document: Some(parse_document(&document)?),
    };
    list(&state, filter, raw_query).await
}

/// Apply a sparse update. Unknown body keys are ignored; a body with no
/// recognised keys is rejected.
///
/// PUT /invoices/:year/:month/:document
pub async fn update_invoice(
    State(state): State<AppState>,
    Path((year, month, document)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<OperationResult>, AppError> {
    let key = parse_key(&year, &month, &document)?;
    let fields: Map<String, Value> = payload(&body)?;
    let changes = InvoiceChanges::from_json(&fields)?;

    state.db.update_invoice(&key, &changes).await?;
    Ok(Json(OperationResult::success()))
}

/// Soft delete.
///
/// DELETE /invoices/:year/:month/:document
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path((year, month, document)): Path<(String, String, String)>,
) -> Result<Json<OperationResult>, AppError> {
    let key = parse_key(&year, &month, &document)?;

    state.db.soft_delete_invoice(&key).await?;
    Ok(Json(OperationResult::success()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_decodes_json_objects() {
        let fields: Map<String, Value> = payload(br#"{"Description": "x"}"#).unwrap();
        assert_eq!(fields["Description"], "x");
    }

    #[test]
    fn payload_rejects_non_objects_and_garbage() {
        let bodies: [&[u8]; 3] = [b"[]", b"{not json", b""];
        for body in bodies {
            let err = payload::<Map<String, Value>>(body).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
    }
}
