//! Review workflow for user-proposed share links.
//!
//! A submission starts `pending` and moves exactly once, to `approved` or
//! `rejected`. Approval reuses the distributor's publish tail, so a link
//! approved twice (or already discovered by a cycle) still yields a single
//! published row per fingerprint.

use crate::distribute::Distributor;
use crate::error::RelayError;
use crate::extract;
use crate::models::{ProbeResult, Submission, SubmissionStatus};
use crate::probe;
use crate::settings::Settings;
use crate::store::DocumentStore;
use std::sync::Arc;
use uuid::Uuid;

pub struct Moderation {
    settings: Arc<Settings>,
    docs: Arc<dyn DocumentStore>,
    distributor: Arc<Distributor>,
}

impl Moderation {
    pub fn new(
        settings: Arc<Settings>,
        docs: Arc<dyn DocumentStore>,
        distributor: Arc<Distributor>,
    ) -> Self {
        Self { settings, docs, distributor }
    }

    /// Extract share links from free text and queue each as a pending
    /// submission. There is no dedup against the fingerprint cache here:
    /// duplicates queue independently and review is expected to catch them.
    pub async fn submit(
        &self,
        text: &str,
        submitted_by: &str,
        username: &str,
    ) -> Result<Vec<Submission>, RelayError> {
        let links = extract::extract(text);
        let mut submissions = Vec::with_capacity(links.len());
        for link in links {
            let submission = Submission::new(link, submitted_by, username);
            self.docs.insert_submission(&submission).await?;
            submissions.push(submission);
        }

        // Consuming the text ends the submitter's config-entry mode.
        self.settings.clear_awaiting(submitted_by).await?;

        if !submissions.is_empty() {
            tracing::info!(
                count = submissions.len(),
                submitter = submitted_by,
                "queued submissions for review"
            );
        }
        Ok(submissions)
    }

    /// Approve a pending submission: probe it, relay it to every channel,
    /// then mark it approved. An unreachable endpoint is recorded, not a
    /// gate; publication proceeds with the failing probe result.
    pub async fn approve(&self, id: Uuid) -> Result<(Submission, ProbeResult), RelayError> {
        let submission = self
            .docs
            .submission(id)
            .await?
            .ok_or_else(|| RelayError::NotFound(format!("submission {id} not found")))?;
        if submission.status != SubmissionStatus::Pending {
            return Err(RelayError::AlreadyReviewed(id.to_string()));
        }

        let channels = self.settings.channel_ids().await?;
        if channels.is_empty() {
            return Err(RelayError::Configuration(
                "no destination channels configured".into(),
            ));
        }

        let result = probe::probe(&submission.config).await;
        self.distributor
            .publish(&submission.config, &result, &channels)
            .await?;

        if !self
            .docs
            .transition_submission(id, SubmissionStatus::Approved)
            .await?
        {
            // Lost a race with another reviewer. The publish above was an
            // upsert by fingerprint, so nothing was duplicated.
            return Err(RelayError::AlreadyReviewed(id.to_string()));
        }

        tracing::info!(%id, status = ?result.status, "submission approved and relayed");
        Ok((
            Submission { status: SubmissionStatus::Approved, ..submission },
            result,
        ))
    }

    /// Reject a pending submission. No probe, no publish, no notification.
    pub async fn reject(&self, id: Uuid) -> Result<Submission, RelayError> {
        let submission = self
            .docs
            .submission(id)
            .await?
            .ok_or_else(|| RelayError::NotFound(format!("submission {id} not found")))?;
        if submission.status != SubmissionStatus::Pending {
            return Err(RelayError::AlreadyReviewed(id.to_string()));
        }

        if !self
            .docs
            .transition_submission(id, SubmissionStatus::Rejected)
            .await?
        {
            return Err(RelayError::AlreadyReviewed(id.to_string()));
        }

        tracing::info!(%id, "submission rejected");
        Ok(Submission { status: SubmissionStatus::Rejected, ..submission })
    }
}
