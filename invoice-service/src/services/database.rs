//! Database service for invoice-service.
//!
//! The only component that talks to Postgres. Statements come from
//! [`crate::services::query`] and [`crate::services::update`]; this module
//! runs them, maps rows and errors, and records timings.

use crate::models::{Invoice, InvoiceKey, NewInvoice};
use crate::services::metrics::{record_operation, DB_QUERY_DURATION, ROWS_AFFECTED_TOTAL};
use crate::services::query::{build_select, InvoiceQuery};
use crate::services::statement::Statement;
use crate::services::update::{build_soft_delete, build_update, InvoiceChanges};
use service_core::error::AppError;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

fn bind_arguments(stmt: &Statement) -> Result<PgArguments, AppError> {
    stmt.arguments()
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to bind parameters: {}", e)))
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoice-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Insert a new, active invoice. The reference period is derived from
    /// `created_at`; the input is trusted to be valid.
    #[instrument(skip(self, input), fields(document = %input.document, created_at = %input.created_at))]
    pub async fn create_invoice(&self, input: &NewInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let invoice = Invoice::new(input.clone());
        let result = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoice (
                ReferenceMonth, ReferenceYear, Document, Description, Amount,
                IsActive, CreatedAt, DeactiveAt
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(invoice.reference_month)
        .bind(invoice.reference_year)
        .bind(&invoice.document)
        .bind(&invoice.description)
        .bind(invoice.amount)
        .bind(invoice.is_active)
        .bind(invoice.created_at)
        .bind(invoice.deactive_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)));

        timer.observe_duration();
        record_operation("create", &result);

        let invoice = result?;
        info!(
            reference_year = invoice.reference_year,
            reference_month = invoice.reference_month,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// List invoices matching `query`, in the order storage returns them.
    #[instrument(skip(self, query), fields(page = query.pagination.page(), per_page = query.pagination.limit()))]
    pub async fn list_invoices(&self, query: &InvoiceQuery) -> Result<Vec<Invoice>, AppError> {
        let stmt = build_select(query);
        let args = bind_arguments(&stmt)?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let result = sqlx::query_as_with::<_, Invoice, _>(&stmt.sql, args)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)));

        timer.observe_duration();
        record_operation("list", &result);

        result
    }

    /// Apply a sparse change set to the invoice identified by `key`.
    ///
    /// Returns the number of rows changed. Zero is not an error: a missing
    /// invoice and a no-op update look the same to the caller. An empty change
    /// set is rejected before any statement is sent.
    #[instrument(skip(self, changes), fields(year = key.year, month = key.month, document = %key.document))]
    pub async fn update_invoice(
        &self,
        key: &InvoiceKey,
        changes: &InvoiceChanges,
    ) -> Result<u64, AppError> {
        let stmt = match build_update(changes, key) {
            Ok(stmt) => stmt,
            Err(e) => {
                let result: Result<u64, AppError> = Err(e.into());
                record_operation("update", &result);
                return result;
            }
        };
        self.execute("update", stmt).await
    }

    /// Mark the invoice identified by `key` inactive as of today.
    ///
    /// Same not-found semantics as [`Database::update_invoice`].
    #[instrument(skip(self), fields(year = key.year, month = key.month, document = %key.document))]
    pub async fn soft_delete_invoice(&self, key: &InvoiceKey) -> Result<u64, AppError> {
        let today = chrono::Local::now().date_naive();
        self.execute("delete", build_soft_delete(key, today)).await
    }

    async fn execute(&self, operation: &'static str, stmt: Statement) -> Result<u64, AppError> {
        let args = bind_arguments(&stmt)?;

        let label = format!("{}_invoice", operation);
        let timer = DB_QUERY_DURATION
            .with_label_values(&[label.as_str()])
            .start_timer();

        let result = sqlx::query_with(&stmt.sql, args)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected())
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to {} invoice: {}", operation, e))
            });

        timer.observe_duration();
        record_operation(operation, &result);

        let rows = result?;
        ROWS_AFFECTED_TOTAL
            .with_label_values(&[operation])
            .inc_by(rows as f64);
        info!(rows_affected = rows, "Invoice {} applied", operation);

        Ok(rows)
    }
}
