//! HTTP middleware

use axum::{
    extract::Request,
    http::{Method, Uri},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

/// Request logging middleware
///
/// Every request runs inside an `http_request` span carrying a generated
/// request id, so engine logs (cache hits, renders, uploads) can be tied back
/// to the request that caused them. Avatar fetches fill in `avatar` and
/// `size`. Image responses are logged at debug level since avatar pages fetch
/// many of them; everything else at info.
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "http_request",
        method = %method,
        path = %uri.path(),
        request_id = %request_id,
        avatar = tracing::field::Empty,
        size = tracing::field::Empty,
    );

    async move {
        let start = Instant::now();
        let response = next.run(request).await;
        let status = response.status();
        let duration_ms = start.elapsed().as_millis();

        let is_image = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| content_type.starts_with("image/"));

        if status.is_client_error() || status.is_server_error() {
            warn!(status = status.as_u16(), duration_ms, query = ?uri.query(), "Request failed");
        } else if is_image {
            debug!(status = status.as_u16(), duration_ms, "Served image");
        } else {
            info!(status = status.as_u16(), duration_ms, "Request completed");
        }

        response
    }
    .instrument(span)
    .await
}
