//! Application startup and lifecycle management.

use crate::config::InvoiceConfig;
use crate::handlers::{
    create_invoice, delete_invoice, health_check, list_invoices, list_invoices_by_document,
    list_invoices_by_month, list_invoices_by_year, metrics_handler, readiness_check,
    update_invoice,
};
use crate::services::{init_metrics, Database};
use axum::{
    body::Body,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    http_request_span, request_id_middleware, require_bearer_token, JwtValidator,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: InvoiceConfig,
    pub db: Arc<Database>,
}

/// Build the HTTP router. Invoice routes require a bearer token; health,
/// readiness and metrics do not.
pub fn build_router(state: AppState) -> Router {
    let validator = JwtValidator::new(&state.config.auth);

    let invoice_routes = Router::new()
        .route("/invoice", post(create_invoice))
        .route("/invoices", get(list_invoices))
        .route("/invoices/:year", get(list_invoices_by_year))
        .route("/invoices/:year/:month", get(list_invoices_by_month))
        .route(
            "/invoices/:year/:month/:document",
            get(list_invoices_by_document)
                .put(update_invoice)
                .delete(delete_invoice),
        )
        .route_layer(middleware::from_fn_with_state(
            validator,
            require_bearer_token,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .merge(invoice_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(http_request_span::<Body>)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: InvoiceConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: InvoiceConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: InvoiceConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Invoice service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState {
                config,
                db: Arc::new(db),
            },
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "invoice-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
