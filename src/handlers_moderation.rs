//! Handlers for the submission and review surface.
//!
//! ## Endpoints
//!
//! - `POST /api/submissions`              — Submit free text; every share link in it is queued
//! - `GET  /api/submissions`              — List submissions by status
//! - `POST /api/submissions/:id/approve`  — Probe, relay and approve
//! - `POST /api/submissions/:id/reject`   — Reject without side effects
//! - `POST /api/submitters/:id/prompt`    — Put a submitter into config-entry mode
//! - `GET  /api/submitters/:id/state`     — Read a submitter's interaction state

use crate::{
    db::AppState,
    error::RelayError,
    models::{SubmissionQuery, SubmissionStatus, SubmitRequest},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

// ── Submit ────────────────────────────────────────────────────────────────────

/// `POST /api/submissions` — Queue every share link found in the text.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Value>), RelayError> {
    let submissions = state
        .moderation
        .submit(&req.text, &req.submitted_by, &req.username)
        .await?;

    if submissions.is_empty() {
        return Err(RelayError::Validation(
            "no supported share link found (vless://, vmess://, trojan://, ss://)".into(),
        ));
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "submitted": submissions.len(),
            "submissions": submissions,
        })),
    ))
}

// ── List ──────────────────────────────────────────────────────────────────────

/// `GET /api/submissions` — List submissions, `pending` by default.
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SubmissionQuery>,
) -> Result<Json<Value>, RelayError> {
    let status = match q.status.as_deref() {
        None => SubmissionStatus::Pending,
        Some(raw) => SubmissionStatus::parse(raw).ok_or_else(|| {
            RelayError::Validation(format!(
                "status must be pending, approved or rejected, got: {raw}"
            ))
        })?,
    };
    let limit = q.limit.unwrap_or(50).min(200);
    let submissions = state.docs.submissions_by_status(status, limit).await?;

    Ok(Json(json!({
        "count": submissions.len(),
        "submissions": submissions,
    })))
}

// ── Review ────────────────────────────────────────────────────────────────────

/// `POST /api/submissions/:id/approve` — Probe, relay to every channel,
/// mark approved. Unreachable links are published with their probe result.
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, RelayError> {
    let (submission, probe) = state.moderation.approve(id).await?;
    Ok(Json(json!({
        "submission": submission,
        "probe": probe,
    })))
}

/// `POST /api/submissions/:id/reject` — Mark rejected; nothing is relayed.
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, RelayError> {
    let submission = state.moderation.reject(id).await?;
    Ok(Json(json!({ "submission": submission })))
}

// ── Submitter interaction state ───────────────────────────────────────────────

/// `POST /api/submitters/:id/prompt` — The next text from this submitter is
/// to be treated as a share-link submission.
pub async fn prompt_submitter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    state.settings.set_awaiting(&id).await?;
    Ok(Json(json!({ "submitter": id, "awaiting": true })))
}

/// `GET /api/submitters/:id/state` — Whether the submitter is in config-entry mode.
pub async fn submitter_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let awaiting = state.settings.is_awaiting(&id).await?;
    Ok(Json(json!({ "submitter": id, "awaiting": awaiting })))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::handlers::api_router;
    use crate::test_utils::{test_state, RecordingNotifier, StaticFetcher};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn server_with_notifier() -> (TestServer, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let (state, _docs) = test_state(StaticFetcher::default(), notifier.clone());
        (TestServer::new(api_router(Arc::new(state))).unwrap(), notifier)
    }

    #[tokio::test]
    async fn submit_review_round_trip_over_http() {
        let (server, notifier) = server_with_notifier();
        server
            .post("/api/channels")
            .json(&json!({ "channel_id": "@relay" }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let response = server
            .post("/api/submissions")
            .json(&json!({
                "text": "please publish vless://user-x and trojan://malformed",
                "submitted_by": "1001",
                "username": "alice",
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["submitted"], 2);
        let first_id = body["submissions"][0]["id"].as_str().unwrap().to_string();
        let second_id = body["submissions"][1]["id"].as_str().unwrap().to_string();

        let response = server
            .post(&format!("/api/submissions/{first_id}/approve"))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["submission"]["status"], "approved");
        assert_eq!(body["probe"]["status"], "error");
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);

        // Approving again conflicts.
        let response = server
            .post(&format!("/api/submissions/{first_id}/approve"))
            .await;
        response.assert_status(axum::http::StatusCode::CONFLICT);

        let response = server
            .post(&format!("/api/submissions/{second_id}/reject"))
            .await;
        response.assert_status_ok();

        let body: Value = server.get("/api/submissions?status=pending").await.json();
        assert_eq!(body["count"], 0);
        let body: Value = server.get("/api/submissions?status=approved").await.json();
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn submit_without_links_is_unprocessable() {
        let (server, _notifier) = server_with_notifier();
        let response = server
            .post("/api/submissions")
            .json(&json!({ "text": "hello there" }))
            .await;
        response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_status_filter_is_unprocessable() {
        let (server, _notifier) = server_with_notifier();
        let response = server.get("/api/submissions?status=archived").await;
        response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn prompt_then_submit_clears_interaction_state() {
        let (server, _notifier) = server_with_notifier();

        server.post("/api/submitters/1001/prompt").await.assert_status_ok();
        let body: Value = server.get("/api/submitters/1001/state").await.json();
        assert_eq!(body["awaiting"], true);

        server
            .post("/api/submissions")
            .json(&json!({ "text": "ss://Yg@h:8388", "submitted_by": "1001" }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let body: Value = server.get("/api/submitters/1001/state").await.json();
        assert_eq!(body["awaiting"], false);
    }
}
