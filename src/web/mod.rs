//! Web layer module
//!
//! HTTP interface of the avatar service. Handlers stay thin: they parse the
//! request, call [`AvatarService`] and map its errors through
//! [`responses::WebError`].
//!
//! Routes:
//! - `GET /` upload form and recently uploaded avatars
//! - `POST /upload` multipart upload (`email`, `avatar`)
//! - `GET /avatar/{fingerprint or email}` thumbnail or redirect
//! - `GET /gravatar.php` legacy redirect
//! - `GET /health`

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::{
    avatars::AvatarService,
    config::Config,
    errors::{AppError, AppResult},
};

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::WebError;

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: Config, avatar_service: Arc<AvatarService>) -> AppResult<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .map_err(|e| AppError::configuration(format!("Invalid listen address: {e}")))?;

        let app = Self::create_router(AppState {
            config,
            avatar_service,
        })?;

        Ok(Self { app, addr })
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState) -> AppResult<Router> {
        let body_limit = state
            .config
            .web
            .max_request_bytes()
            .map_err(|e| AppError::configuration(e.to_string()))?;

        let router = Router::new()
            .route("/", get(handlers::index::index))
            .route("/upload", post(handlers::avatars::upload_avatar))
            .route("/avatar/{segment}", get(handlers::avatars::serve_avatar))
            .route("/gravatar.php", get(handlers::avatars::legacy_gravatar))
            .route("/health", get(handlers::health::health_check))
            .fallback(|| async { WebError::NotFound })
            // Middleware (applied in reverse order)
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(CorsLayer::permissive())
            .layer(axum::middleware::from_fn(
                middleware::request_logging_middleware,
            ))
            .with_state(state);

        Ok(router)
    }

    /// Start the web server and run until SIGINT/SIGTERM
    pub async fn serve(self) -> AppResult<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("Listening on http://{}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub avatar_service: Arc<AvatarService>,
}
