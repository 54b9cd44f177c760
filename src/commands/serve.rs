//! Serve command - Starts the HTTP server.

use std::sync::Arc;

use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;

use crate::api::{create_router, AppState};
use crate::cli::ServeArgs;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, Database};
use crate::jobs::{EmailJob, Mailer};
use crate::services::Services;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: Config) -> AppResult<()> {
    tracing::info!("Starting server...");

    // Initialize database and run migrations
    let db = Arc::new(Database::connect(&config).await);
    tracing::info!("Database connected");

    // Find-or-create the reserved System clinic before anything projects.
    let system_clinic_id = db.ensure_system_clinic().await?;
    tracing::info!(clinic_id = %system_clinic_id, "System clinic resolved");

    // Initialize Redis cache (rate limiting)
    let cache = Arc::new(Cache::connect(&config).await);
    tracing::info!("Redis cache connected");

    // Email job storage; the server degrades to logging when unavailable.
    let mailer = match build_mailer(&config).await {
        Ok(mailer) => mailer,
        Err(e) => {
            tracing::warn!(error = %e, "Email job storage unavailable, emails will be logged");
            Mailer::disabled()
        }
    };

    // Build the full service graph from the explicit configuration.
    let services = Services::from_connection(
        db.get_connection(),
        config.clone(),
        system_clinic_id,
        mailer,
    );
    let app_state = AppState::from_services(&services, cache, db);

    let app = create_router(app_state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Set up the apalis Postgres storage the mailer enqueues into.
async fn build_mailer(config: &Config) -> AppResult<Mailer> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect job storage: {}", e)))?;

    PostgresStorage::setup(&pool)
        .await
        .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

    let storage: PostgresStorage<EmailJob> = PostgresStorage::new(pool);
    Ok(Mailer::new(storage))
}
