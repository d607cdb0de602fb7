//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::probe::{HttpProber, Prober};
use crate::scheduler::Scheduler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
pub struct AppState<P = HttpProber> {
    pub config: ServerConfig,
    pub scheduler: Arc<Scheduler<P>>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

/// JSON API server for upwatch.
pub struct Server<P = HttpProber> {
    state: AppState<P>,
}

impl<P: Prober> Server<P> {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, scheduler: Arc<Scheduler<P>>) -> Self {
        Self {
            state: AppState { config, scheduler },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            .route("/health", get(handlers::handle_health))
            .route("/api/summary", get(handlers::handle_summary::<P>))
            .route("/api/results", get(handlers::handle_results::<P>))
            .route("/api/history", post(handlers::handle_history::<P>))
            .route(
                "/api/targets",
                get(handlers::handle_get_targets::<P>)
                    .post(handlers::handle_add_target::<P>)
                    .delete(handlers::handle_remove_target::<P>),
            )
            .route("/api/check", post(handlers::handle_check_now::<P>))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
