//! HTTP response types and error mapping
//!
//! Engine errors become plain-text responses. Rejected uploads and invalid
//! sizes answer 401, unknown paths 404, and storage or codec failures a
//! generic 500 that is logged but never echoed to the client.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, warn};

use crate::errors::{AvatarError, AvatarResult};
use crate::models::ResolvedThumbnail;

/// Errors a handler can return
#[derive(Debug)]
pub enum WebError {
    Avatar(AvatarError),
    /// Upload form missing a field or not parseable as multipart
    UploadRejected(String),
    BadRequest(String),
    NotFound,
}

impl From<AvatarError> for WebError {
    fn from(error: AvatarError) -> Self {
        Self::Avatar(error)
    }
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Avatar(error) => avatar_status(error),
            Self::UploadRejected(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

fn avatar_status(error: &AvatarError) -> StatusCode {
    match error {
        AvatarError::InvalidAddress { .. }
        | AvatarError::InvalidSize { .. }
        | AvatarError::PayloadTooLarge { .. }
        | AvatarError::UnsupportedFormat { .. } => StatusCode::UNAUTHORIZED,
        AvatarError::InvalidFingerprint { .. } | AvatarError::NotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        AvatarError::StorageIo { .. }
        | AvatarError::Encode { .. }
        | AvatarError::TaskFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Avatar(AvatarError::InvalidSize { size }) => {
                warn!("Rejected thumbnail size {}", size);
                "Size invalid".to_string()
            }
            Self::Avatar(error) if error.is_rejection() => {
                warn!("Rejected request: {}", error);
                error.to_string()
            }
            Self::Avatar(error) if status == StatusCode::NOT_FOUND => {
                warn!("Not found: {}", error);
                "Not Found".to_string()
            }
            Self::Avatar(error) => {
                error!("Avatar request failed: {}", error);
                "Internal Server Error".to_string()
            }
            Self::UploadRejected(message) | Self::BadRequest(message) => {
                warn!("Rejected request: {}", message);
                message
            }
            Self::NotFound => "Not Found".to_string(),
        };

        (status, body).into_response()
    }
}

/// Health endpoint payload
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            status: "unhealthy".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status = if self.status == "healthy" {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

/// Serve a thumbnail inline with its content type and cache lifetime
pub async fn serve_thumbnail(
    thumbnail: &ResolvedThumbnail,
    max_age: Duration,
) -> AvatarResult<Response> {
    let bytes = tokio::fs::read(&thumbnail.path)
        .await
        .map_err(|e| AvatarError::storage(&thumbnail.path, e))?;

    let headers = [
        (header::CONTENT_TYPE, thumbnail.format.mime_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "inline; filename=\"{}.{}\"",
                thumbnail.key,
                thumbnail.format.extension()
            ),
        ),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", max_age.as_secs()),
        ),
    ];

    Ok((StatusCode::OK, headers, bytes).into_response())
}
