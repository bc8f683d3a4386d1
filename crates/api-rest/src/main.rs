//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the REST server
//! (with OpenAPI/Swagger UI). The workspace's main `apr-run` binary is the
//! deployment entry point.

use api_rest::{router, AppState};
use apr_store::FileStore;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the APR REST API server.
///
/// # Environment Variables
/// - `APR_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `APR_DATA_DIR`: Directory for record storage (default: "apr_data")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the data directory cannot be created or opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("APR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir = std::env::var("APR_DATA_DIR").unwrap_or_else(|_| "apr_data".into());

    tracing::info!("-- Starting APR REST API on {addr}");

    std::fs::create_dir_all(Path::new(&data_dir))?;
    let store = Arc::new(FileStore::open(&data_dir)?);

    let app = router(AppState::new(store));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
