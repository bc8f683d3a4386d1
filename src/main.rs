use api_rest::{router, AppState};
use apr_store::FileStore;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the APR application.
///
/// Opens the on-disk record store and serves the REST API (with
/// OpenAPI/Swagger documentation) on the configured address.
///
/// # Environment Variables
/// - `APR_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `APR_DATA_DIR`: Directory for record storage (default: "apr_data")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("apr=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("APR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir = std::env::var("APR_DATA_DIR").unwrap_or_else(|_| "apr_data".into());

    tracing::info!("++ Starting APR REST on {rest_addr}");
    tracing::info!("++ Record store at {data_dir}");

    std::fs::create_dir_all(Path::new(&data_dir))?;
    let store = Arc::new(FileStore::open(&data_dir)?);

    let app = router(AppState::new(store));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
