//! Avatar upload, fetch and redirect handlers

use axum::{
    extract::{Multipart, Path, Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info};

use crate::avatars::fingerprint;
use crate::models::ThumbnailRequest;
use crate::web::{
    AppState,
    extractors::{AvatarPath, SizeParams, parse_avatar_path},
    responses::{WebError, serve_thumbnail},
};

/// `POST /upload` with multipart fields `email` and `avatar`
pub async fn upload_avatar(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, WebError> {
    let mut email = None;
    let mut avatar = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::UploadRejected(format!("Malformed upload: {e}")))?
    {
        match field.name() {
            Some("email") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| WebError::UploadRejected(format!("Unreadable email: {e}")))?;
                email = Some(text);
            }
            Some("avatar") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| WebError::UploadRejected(format!("Unreadable avatar: {e}")))?;
                avatar = Some(bytes);
            }
            other => debug!("Ignoring upload field {:?}", other),
        }
    }

    let email = email.ok_or_else(|| WebError::UploadRejected("Missing email".to_string()))?;
    let avatar = avatar.ok_or_else(|| WebError::UploadRejected("Missing avatar".to_string()))?;

    let stored = state.avatar_service.upload(&email, &avatar).await?;
    info!(
        "Accepted avatar upload for {} ({} bytes)",
        stored.fingerprint,
        avatar.len()
    );

    Ok(Redirect::to("/"))
}

/// `GET /avatar/{segment}`
///
/// A fingerprint (optionally with an image extension) serves the thumbnail;
/// an email address redirects to its fingerprint URL.
pub async fn serve_avatar(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(params): Query<SizeParams>,
    RawQuery(query): RawQuery,
) -> Result<Response, WebError> {
    match parse_avatar_path(&segment) {
        Some(AvatarPath::Fingerprint {
            fingerprint,
            format,
        }) => {
            let size = params.requested_size(state.config.avatars.default_size)?;
            let span = tracing::Span::current();
            span.record("avatar", fingerprint.as_str());
            span.record("size", size);
            let request = ThumbnailRequest::new(size, format)?;
            let thumbnail = state.avatar_service.fetch(&fingerprint, &request).await?;
            Ok(serve_thumbnail(&thumbnail, state.config.avatars.cache_max_age()).await?)
        }
        Some(AvatarPath::Email { address, suffix }) => {
            let fingerprint = fingerprint::resolve(&address).map_err(|_| WebError::NotFound)?;
            let location = with_query(
                format!("/avatar/{}{}", fingerprint, suffix.unwrap_or_default()),
                query.as_deref(),
            );
            Ok(Redirect::temporary(&location).into_response())
        }
        None => Err(WebError::NotFound),
    }
}

/// `GET /gravatar.php?gravatar_id=<md5>&...`
pub async fn legacy_gravatar(
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Redirect, WebError> {
    let mut gravatar_id = None;
    let mut remaining = url::form_urlencoded::Serializer::new(String::new());
    let mut has_remaining = false;

    for (name, value) in &params {
        if name == "gravatar_id" && gravatar_id.is_none() {
            gravatar_id = Some(value.to_lowercase());
        } else {
            remaining.append_pair(name, value);
            has_remaining = true;
        }
    }

    let gravatar_id = gravatar_id
        .filter(|id| fingerprint::is_hex_digest(id))
        .ok_or_else(|| WebError::BadRequest("Invalid gravatar ID".to_string()))?;

    let rest = remaining.finish();
    let location = with_query(
        format!("/avatar/{gravatar_id}"),
        has_remaining.then_some(rest.as_str()),
    );
    Ok(Redirect::temporary(&location))
}

fn with_query(path: String, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path,
    }
}
