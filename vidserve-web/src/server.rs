//! HTTP server for Vidserve
//!
//! Builds the axum router over an explicit configuration value and runs
//! it until Ctrl-C. Each request is served by its own task with its own
//! file handle; the only shared state is the read-only category registry.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use vidserve_core::{MediaService, RecordService, VidserveConfig, VidserveError};

use crate::handlers::{
    add_housing_measurement, add_shaft_measurement, add_user_entry, debug_paths,
    delete_shaft_measurements, delete_user_entries, list_shaft_measurements, list_user_entries,
    list_videos, root, should_calibrate, stream_video, update_shaft_measurement,
    update_user_entry,
};

/// Shared, read-only application state.
#[derive(Clone)]
pub struct AppState {
    /// Resolver and streaming engine
    pub media: MediaService,
    /// User entry and measurement records
    pub records: RecordService,
    /// Base assets directory, reported by `/debug/paths`
    pub assets_dir: Arc<PathBuf>,
}

impl AppState {
    /// Creates state from configuration.
    pub fn new(config: &VidserveConfig) -> Self {
        Self {
            media: MediaService::new(config),
            records: RecordService::new(&config.records),
            assets_dir: Arc::new(
                std::path::absolute(&config.media.assets_dir)
                    .unwrap_or_else(|_| config.media.assets_dir.clone()),
            ),
        }
    }
}

/// Builds the application router.
pub fn build_router(config: &VidserveConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/debug/paths", get(debug_paths))
        .route("/video/list/{category}", get(list_videos))
        .route("/video/{category}/{filename}", get(stream_video))
        .route(
            "/user_entry",
            get(list_user_entries)
                .post(add_user_entry)
                .put(update_user_entry)
                .delete(delete_user_entries),
        )
        .route("/user_entry/should_calibrate", get(should_calibrate))
        .route(
            "/shaft_measurement",
            get(list_shaft_measurements)
                .post(add_shaft_measurement)
                .put(update_shaft_measurement)
                .delete(delete_shaft_measurements),
        )
        .route("/housing_measurement", post(add_housing_measurement))
        .route("/clear_measured_shafts", delete(delete_shaft_measurements))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState::new(config))
}

/// Serves the router on an already bound listener until `shutdown` resolves.
///
/// # Errors
///
/// - `VidserveError::Io` - Accept loop failed
pub async fn serve_on<F>(
    listener: TcpListener,
    config: &VidserveConfig,
    shutdown: F,
) -> Result<(), VidserveError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(config);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Validates configuration, binds the configured address and serves until Ctrl-C.
///
/// # Errors
///
/// - `VidserveError::Configuration` - Invalid configuration or bind address
/// - `VidserveError::Io` - Address could not be bound or the server failed
pub async fn run_server(config: VidserveConfig) -> Result<(), VidserveError> {
    config.validate()?;
    let address = config.server.bind_address()?;

    for category in &config.media.categories {
        if !tokio::fs::try_exists(&category.root).await.unwrap_or(false) {
            warn!(
                "Directory for category {} does not exist: {}",
                category.name,
                category.root.display()
            );
        }
    }

    let listener = TcpListener::bind(address).await?;
    info!("Vidserve media server running on http://{}", listener.local_addr()?);

    serve_on(listener, &config, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
