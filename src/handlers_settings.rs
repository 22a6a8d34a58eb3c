//! Handlers for the administrative settings surface.
//!
//! ## Endpoints
//!
//! - `GET    /api/sources`    — List source URLs
//! - `POST   /api/sources`    — Add a source URL
//! - `DELETE /api/sources`    — Remove a source URL
//! - `GET    /api/channels`   — List destination channels
//! - `POST   /api/channels`   — Add a destination channel
//! - `DELETE /api/channels`   — Remove a destination channel
//! - `GET    /api/templates`  — List message templates
//! - `PUT    /api/templates`  — Replace one template entry

use crate::{
    db::AppState,
    error::RelayError,
    models::{ChannelEntry, SourceEntry, TemplateUpdate},
};
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// Keys the template editor may write: one per scheme plus the fallback.
const TEMPLATE_KEYS: [&str; 5] = ["vless", "vmess", "trojan", "shadowsocks", "default"];

// ── Sources ───────────────────────────────────────────────────────────────────

/// `GET /api/sources` — List the URLs scanned on every cycle.
pub async fn list_sources(State(state): State<Arc<AppState>>) -> Result<Json<Value>, RelayError> {
    let sources = state.settings.source_links().await?;
    Ok(Json(json!({ "sources": sources })))
}

/// `POST /api/sources` — Add a source URL.
pub async fn add_source(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<SourceEntry>,
) -> Result<(StatusCode, Json<Value>), RelayError> {
    if !entry.url.starts_with("http://") && !entry.url.starts_with("https://") {
        return Err(RelayError::Validation(format!(
            "source must be an http(s) URL, got: {}",
            entry.url
        )));
    }
    let sources = state.settings.add_source(&entry.url).await?;
    tracing::info!("source added: {}", entry.url);
    Ok((StatusCode::CREATED, Json(json!({ "sources": sources }))))
}

/// `DELETE /api/sources` — Remove a source URL.
pub async fn remove_source(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<SourceEntry>,
) -> Result<Json<Value>, RelayError> {
    let sources = state.settings.remove_source(&entry.url).await?;
    tracing::info!("source removed: {}", entry.url);
    Ok(Json(json!({ "sources": sources })))
}

// ── Channels ──────────────────────────────────────────────────────────────────

/// `GET /api/channels` — List the channels every new link is relayed to.
pub async fn list_channels(State(state): State<Arc<AppState>>) -> Result<Json<Value>, RelayError> {
    let channels = state.settings.channel_ids().await?;
    Ok(Json(json!({ "channels": channels })))
}

/// `POST /api/channels` — Add a destination channel.
pub async fn add_channel(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<ChannelEntry>,
) -> Result<(StatusCode, Json<Value>), RelayError> {
    let channels = state.settings.add_channel(&entry.channel_id).await?;
    tracing::info!("channel added: {}", entry.channel_id);
    Ok((StatusCode::CREATED, Json(json!({ "channels": channels }))))
}

/// `DELETE /api/channels` — Remove a destination channel.
pub async fn remove_channel(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<ChannelEntry>,
) -> Result<Json<Value>, RelayError> {
    let channels = state.settings.remove_channel(&entry.channel_id).await?;
    tracing::info!("channel removed: {}", entry.channel_id);
    Ok(Json(json!({ "channels": channels })))
}

// ── Templates ─────────────────────────────────────────────────────────────────

/// `GET /api/templates` — The full scheme-to-template map.
pub async fn list_templates(State(state): State<Arc<AppState>>) -> Result<Json<Value>, RelayError> {
    let templates = state.settings.templates().await?;
    Ok(Json(json!({ "templates": templates })))
}

/// `PUT /api/templates` — Replace one entry.
///
/// The template body is not validated: the editor may reference placeholders
/// that do not exist, and rendering leaves those verbatim.
pub async fn update_template(
    State(state): State<Arc<AppState>>,
    Json(update): Json<TemplateUpdate>,
) -> Result<Json<Value>, RelayError> {
    if !TEMPLATE_KEYS.contains(&update.scheme.as_str()) {
        return Err(RelayError::Validation(format!(
            "template key must be one of: {}",
            TEMPLATE_KEYS.join(", ")
        )));
    }
    let templates = state
        .settings
        .set_template(&update.scheme, &update.template)
        .await?;
    tracing::info!("template updated for {}", update.scheme);
    Ok(Json(json!({ "templates": templates })))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::handlers::api_router;
    use crate::test_utils::{test_state, RecordingNotifier, StaticFetcher};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn server() -> TestServer {
        let (state, _docs) = test_state(
            StaticFetcher::default(),
            Arc::new(RecordingNotifier::default()),
        );
        TestServer::new(api_router(Arc::new(state))).unwrap()
    }

    #[tokio::test]
    async fn source_lifecycle_over_http() {
        let server = server();

        let response = server
            .post("/api/sources")
            .json(&json!({ "url": "https://example.com/sub.html" }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        // Duplicates conflict.
        let response = server
            .post("/api/sources")
            .json(&json!({ "url": "https://example.com/sub.html" }))
            .await;
        response.assert_status(axum::http::StatusCode::CONFLICT);

        let body: Value = server.get("/api/sources").await.json();
        assert_eq!(body["sources"].as_array().unwrap().len(), 2);

        let response = server
            .delete("/api/sources")
            .json(&json!({ "url": "https://example.com/sub.html" }))
            .await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn non_http_source_is_rejected() {
        let server = server();
        let response = server
            .post("/api/sources")
            .json(&json!({ "url": "ftp://example.com/sub" }))
            .await;
        response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn template_updates_are_limited_to_known_keys() {
        let server = server();

        let response = server
            .put("/api/templates")
            .json(&json!({ "scheme": "vless", "template": "custom {type} {rating}" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["templates"]["vless"], "custom {type} {rating}");

        let response = server
            .put("/api/templates")
            .json(&json!({ "scheme": "carrier-pigeon", "template": "x" }))
            .await;
        response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn removing_an_unknown_channel_is_not_found() {
        let server = server();
        let response = server
            .delete("/api/channels")
            .json(&json!({ "channel_id": "@ghost" }))
            .await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
    }
}
