pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod harness;
pub mod logic;
pub mod model;
pub mod suites;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use client::{
    AssetClient, AuditClient, CatalogClient, CustomMetadataClient, HttpCatalog, InMemoryCatalog,
    LineageClient, SearchClient, SharedClient,
};
pub use error::{CatalogError, CatalogResult, HarnessError};
pub use harness::{RetryPolicy, Suite, SuiteReport};

// Export all model types
pub use model::*;

/// Serve the REST binding for `catalog` on an already bound listener
pub async fn serve_catalog(
    listener: tokio::net::TcpListener,
    catalog: std::sync::Arc<InMemoryCatalog>,
) -> anyhow::Result<()> {
    let app = crate::api::routes::create_router().with_state(catalog);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the in-memory catalog server described by the loaded configuration
pub async fn run_server() -> anyhow::Result<()> {
    use std::sync::Arc;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("hyper", log::LevelFilter::Warn)
        .parse_default_env()
        .try_init();

    let config = crate::config::HarnessConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    let catalog = Arc::new(InMemoryCatalog::with_index_lag(config.server.index_lag));

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Mock catalog running on http://{}", bind_address);
    log::info!(
        "Search results trail writes by {} searches",
        config.server.index_lag
    );

    serve_catalog(listener, catalog).await
}
