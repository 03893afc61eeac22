use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use visibility::backend::document::MemoryStore;
use visibility::config::VisibilityConfig;
use visibility::http::{AppState, router};
use visibility::{ListingService, registry::AttributeLookup};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "visibility=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match VisibilityConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let registry = match config.build_registry() {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!("Failed to build attribute registry: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: listen_port={}, partition_attribute={}, custom_attributes={}, max_page_size={}, list_timeout_ms={}",
        config.listen_port,
        registry.partition_attribute().name,
        config.custom_attributes.len(),
        config.max_page_size,
        config.list_timeout.as_millis()
    );

    let service = ListingService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(registry),
        config.listing_options(),
    );
    let state = AppState {
        service: Arc::new(service),
        default_page_size: config.default_page_size,
    };

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.listen_port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}
