//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve on a listener until shutdown

use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::cache::DatasetCache;
use crate::config::Settings;
use crate::datasets::ConfigStore;
use crate::http::handlers;
use crate::http::request::{request_span, UuidRequestId};
use crate::lifecycle::Services;
use crate::loaders::LoaderRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<LoaderRegistry>,
    pub store: Arc<ConfigStore>,
    pub cache: Arc<DatasetCache>,
}

impl From<&Services> for AppState {
    fn from(services: &Services) -> Self {
        Self {
            settings: services.settings.clone(),
            registry: services.registry.clone(),
            store: services.store.clone(),
            cache: services.cache.clone(),
        }
    }
}

/// HTTP server exposing datasets to the explorer UI.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(services: &Services) -> Self {
        let timeout = Duration::from_secs(services.settings.server.request_timeout_secs);
        Self {
            router: Self::build_router(AppState::from(services), timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/datasets", get(handlers::list_datasets))
            .route("/datasets/{name}", get(handlers::get_dataset))
            .route("/params", get(handlers::get_params))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(timeout))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
