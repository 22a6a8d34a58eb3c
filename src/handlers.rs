//! Axum route handlers for the pipeline surface, and the API router.
//!
//! ## Endpoints
//!
//! - `GET  /health`       — Health check
//! - `GET  /api/stats`    — Service counters
//! - `GET  /api/configs`  — Recently relayed links (limit/offset)
//! - `POST /api/cycle`    — Run a fetch/verify/relay cycle now
//! - `POST /api/probe`    — Probe a single share link
//!
//! Administrative settings and moderation endpoints live in
//! `handlers_settings` and `handlers_moderation`.

use crate::{
    db::AppState,
    error::RelayError,
    handlers_moderation, handlers_settings,
    models::{CycleOutcome, ProbeRequest, ProbeResult, PublishedQuery, SubmissionStatus},
    probe,
};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// All routes. Middleware layers are added by the caller.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/configs", get(list_configs))
        .route("/api/cycle", post(run_cycle))
        .route("/api/probe", post(probe_config))
        .route(
            "/api/sources",
            get(handlers_settings::list_sources)
                .post(handlers_settings::add_source)
                .delete(handlers_settings::remove_source),
        )
        .route(
            "/api/channels",
            get(handlers_settings::list_channels)
                .post(handlers_settings::add_channel)
                .delete(handlers_settings::remove_channel),
        )
        .route(
            "/api/templates",
            get(handlers_settings::list_templates).put(handlers_settings::update_template),
        )
        .route(
            "/api/submissions",
            get(handlers_moderation::list_submissions).post(handlers_moderation::submit),
        )
        .route(
            "/api/submissions/:id/approve",
            post(handlers_moderation::approve),
        )
        .route(
            "/api/submissions/:id/reject",
            post(handlers_moderation::reject),
        )
        .route(
            "/api/submitters/:id/prompt",
            post(handlers_moderation::prompt_submitter),
        )
        .route(
            "/api/submitters/:id/state",
            get(handlers_moderation::submitter_state),
        )
        .with_state(state)
}

// ── Health ────────────────────────────────────────────────────────────────────

/// `GET /health` — Health check
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "config-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Stats ─────────────────────────────────────────────────────────────────────

/// `GET /api/stats` — Counters over both stores.
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>, RelayError> {
    let total_configs = state.docs.count_published().await?;
    let active_configs = state.docs.count_active().await?;
    let sources = state.settings.source_links().await?;
    let channels = state.settings.channel_ids().await?;
    let cache = state.settings.fingerprint_cache().await?;
    let pending = state
        .docs
        .count_submissions(SubmissionStatus::Pending)
        .await?;

    Ok(Json(json!({
        "total_configs": total_configs,
        "active_configs": active_configs,
        "source_links": sources.len(),
        "channels": channels.len(),
        "cache_size": cache.len(),
        "pending_submissions": pending,
    })))
}

// ── Published links ───────────────────────────────────────────────────────────

/// `GET /api/configs` — Most recently relayed links.
pub async fn list_configs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PublishedQuery>,
) -> Result<Json<Value>, RelayError> {
    let limit = q.limit.unwrap_or(50).min(200);
    let offset = q.offset.unwrap_or(0);
    let configs = state.docs.recent_published(limit, offset).await?;
    let total = state.docs.count_published().await?;

    Ok(Json(json!({
        "count": configs.len(),
        "total": total,
        "offset": offset,
        "configs": configs,
    })))
}

// ── Cycle ─────────────────────────────────────────────────────────────────────

/// `POST /api/cycle` — Run one fetch/verify/relay cycle and report counts.
pub async fn run_cycle(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CycleOutcome>, RelayError> {
    let outcome = state.distributor.run_cycle().await?;
    Ok(Json(outcome))
}

// ── Probe ─────────────────────────────────────────────────────────────────────

/// `POST /api/probe` — Reachability-test one share link without publishing it.
pub async fn probe_config(Json(req): Json<ProbeRequest>) -> Json<ProbeResult> {
    Json(probe::probe(&req.config).await)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
