//! Home page handler
//!
//! Renders the embedded upload page with the most recently uploaded avatars.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::{assets::StaticAssets, web::AppState, web::responses::WebError};

const RECENT_AVATARS_MARKER: &str = "{{recent_avatars}}";

/// Serve the index page from embedded static assets
pub async fn index(State(state): State<AppState>) -> Result<Response, WebError> {
    let Some(file) = StaticAssets::get_asset("static/index.html") else {
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h1>500 Internal Server Error</h1><p>Home page not found</p>".to_string()),
        )
            .into_response());
    };

    let recent = state
        .avatar_service
        .recent(state.config.avatars.recent_limit)
        .await?;

    let items: String = recent
        .map(|fingerprint| {
            format!("<li><img src=\"/avatar/{fingerprint}\" alt=\"{fingerprint}\"></li>\n")
        })
        .collect();

    let template = String::from_utf8_lossy(&file.data);
    Ok(Html(template.replace(RECENT_AVATARS_MARKER, &items)).into_response())
}
