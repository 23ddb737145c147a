//! Health check handler

use axum::{extract::State, response::IntoResponse};
use tracing::warn;

use crate::web::{AppState, responses::HealthResponse};

/// Reports healthy while the avatar store's base directory is reachable
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let base_dir = state.avatar_service.storage().base_dir();
    match tokio::fs::metadata(base_dir).await {
        Ok(metadata) if metadata.is_dir() => HealthResponse::healthy(),
        Ok(_) => {
            warn!("Avatar path {} is not a directory", base_dir.display());
            HealthResponse::unhealthy()
        }
        Err(e) => {
            warn!("Avatar path {} is unavailable: {}", base_dir.display(), e);
            HealthResponse::unhealthy()
        }
    }
}
