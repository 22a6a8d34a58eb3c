//! In-memory doubles for the storage and transport interfaces, shared by the
//! unit tests across modules.

use crate::db::AppState;
use crate::distribute::Distributor;
use crate::error::RelayError;
use crate::fetch::SourceFetcher;
use crate::models::{ProbeStatus, PublishedConfig, Submission, SubmissionStatus};
use crate::moderation::Moderation;
use crate::notify::Notifier;
use crate::settings::Settings;
use crate::store::{DocumentStore, KvStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ── Named-value store ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryKv {
    map: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, RelayError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RelayError> {
        self.map.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RelayError> {
        self.map.lock().unwrap().remove(key);
        Ok(())
    }
}

// ── Document store ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryDocs {
    pub published: Mutex<HashMap<String, PublishedConfig>>,
    pub submissions: Mutex<Vec<Submission>>,
}

#[async_trait]
impl DocumentStore for MemoryDocs {
    async fn upsert_published(&self, doc: &PublishedConfig) -> Result<(), RelayError> {
        self.published
            .lock()
            .unwrap()
            .insert(doc.fingerprint.clone(), doc.clone());
        Ok(())
    }

    async fn recent_published(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PublishedConfig>, RelayError> {
        let mut docs: Vec<PublishedConfig> =
            self.published.lock().unwrap().values().cloned().collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_published(&self) -> Result<i64, RelayError> {
        Ok(self.published.lock().unwrap().len() as i64)
    }

    async fn count_active(&self) -> Result<i64, RelayError> {
        Ok(self
            .published
            .lock()
            .unwrap()
            .values()
            .filter(|doc| doc.probe.status == ProbeStatus::Active)
            .count() as i64)
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), RelayError> {
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(())
    }

    async fn submission(&self, id: Uuid) -> Result<Option<Submission>, RelayError> {
        Ok(self
            .submissions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn submissions_by_status(
        &self,
        status: SubmissionStatus,
        limit: i64,
    ) -> Result<Vec<Submission>, RelayError> {
        let mut subs: Vec<Submission> = self
            .submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.status == status)
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        subs.truncate(limit.max(0) as usize);
        Ok(subs)
    }

    async fn count_submissions(&self, status: SubmissionStatus) -> Result<i64, RelayError> {
        Ok(self
            .submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.status == status)
            .count() as i64)
    }

    async fn transition_submission(
        &self,
        id: Uuid,
        to: SubmissionStatus,
    ) -> Result<bool, RelayError> {
        let mut subs = self.submissions.lock().unwrap();
        match subs
            .iter_mut()
            .find(|s| s.id == id && s.status == SubmissionStatus::Pending)
        {
            Some(sub) => {
                sub.status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ── Transports ────────────────────────────────────────────────────────────────

/// Serves canned page bodies by URL; any other URL fails like a dead source.
#[derive(Default)]
pub struct StaticFetcher {
    pub pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn with_page(url: &str, body: &str) -> Self {
        let mut pages = HashMap::new();
        pages.insert(url.to_string(), body.to_string());
        Self { pages }
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, RelayError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| RelayError::Internal(anyhow::anyhow!("no route to {url}")))
    }
}

/// Records every delivery; optionally refuses one destination.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    fail_for: Option<String>,
}

impl RecordingNotifier {
    pub fn failing_for(destination: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: Some(destination.to_string()),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        destination: &str,
        text: &str,
        _markup: Option<Value>,
    ) -> Result<(), RelayError> {
        if self.fail_for.as_deref() == Some(destination) {
            return Err(RelayError::Internal(anyhow::anyhow!(
                "delivery refused by {destination}"
            )));
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), text.to_string()));
        Ok(())
    }
}

// ── Assembled state ───────────────────────────────────────────────────────────

/// Full application state over in-memory stores, with zero notify pacing.
pub fn test_state(
    fetcher: StaticFetcher,
    notifier: Arc<RecordingNotifier>,
) -> (AppState, Arc<MemoryDocs>) {
    build_state(fetcher, notifier, None)
}

pub fn test_state_with_admin(
    fetcher: StaticFetcher,
    notifier: Arc<RecordingNotifier>,
    admin_chat: &str,
) -> (AppState, Arc<MemoryDocs>) {
    build_state(fetcher, notifier, Some(admin_chat.to_string()))
}

fn build_state(
    fetcher: StaticFetcher,
    notifier: Arc<RecordingNotifier>,
    admin_chat: Option<String>,
) -> (AppState, Arc<MemoryDocs>) {
    let docs = Arc::new(MemoryDocs::default());
    let settings = Arc::new(Settings::new(Arc::new(MemoryKv::default())));
    let distributor = Arc::new(
        Distributor::new(
            settings.clone(),
            docs.clone(),
            Arc::new(fetcher),
            notifier,
            admin_chat,
        )
        .with_notify_pace(Duration::ZERO),
    );
    let moderation = Moderation::new(settings.clone(), docs.clone(), distributor.clone());
    let state = AppState { settings, docs: docs.clone(), distributor, moderation };
    (state, docs)
}
