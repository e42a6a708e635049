//! HTTP surface for docdesk: per-tool upload/status/download/log endpoints,
//! a health probe and the embedded browser client.

pub mod error;
pub mod frontend;
pub mod routes;
pub mod telemetry;

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use docdesk::{ConfigError, DocdeskError, Service};

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

impl AppState {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] DocdeskError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Full application router with middleware applied.
pub fn router(state: AppState) -> Router {
    let server = &state.service.config().server;
    let cors = cors_layer(&server.cors_origins);
    let body_limit = DefaultBodyLimit::max(server.max_request_bytes);

    Router::new()
        .merge(frontend::routes())
        .nest("/api", routes::api_routes())
        .fallback(routes::not_found)
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect::<Vec<_>>(),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Serves until `shutdown` resolves, then stops the worker pool.
pub async fn serve<F>(listener: TcpListener, service: Arc<Service>, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(AppState::new(Arc::clone(&service)));

    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("HTTP server stopped, shutting down workers");
    if let Err(e) = tokio::task::spawn_blocking(move || service.shutdown()).await {
        tracing::error!("Worker shutdown task failed: {}", e);
    }
    Ok(())
}
