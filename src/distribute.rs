//! The fetch/verify/relay cycle.
//!
//! A cycle walks the configured sources in order, extracts share links,
//! filters them through the fingerprint cache, probes the survivors, and
//! relays up to [`PUBLISH_BATCH_CAP`] of them to every configured channel.
//! Links beyond the cap are dropped, not queued: they resurface on a later
//! cycle if the source still carries them and the cache has not evicted
//! their fingerprint. Only one cycle runs at a time.

use crate::error::RelayError;
use crate::extract;
use crate::fetch::SourceFetcher;
use crate::fingerprint;
use crate::format;
use crate::models::{CycleOutcome, ProbeResult, PublishedConfig, Scheme};
use crate::notify::{self, Notifier};
use crate::probe;
use crate::settings::Settings;
use crate::store::DocumentStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Per-cycle publish cap. Overflow is reported through
/// [`CycleOutcome::total_checked`] but never carried over.
pub const PUBLISH_BATCH_CAP: usize = 20;

/// Minimum delay between successive channel notifications.
pub const NOTIFY_PACE: Duration = Duration::from_secs(1);

pub struct Distributor {
    settings: Arc<Settings>,
    docs: Arc<dyn DocumentStore>,
    fetcher: Arc<dyn SourceFetcher>,
    notifier: Arc<dyn Notifier>,
    admin_chat: Option<String>,
    notify_pace: Duration,
    /// Two concurrent cycles could double-publish a fingerprint or corrupt
    /// the cache truncation; this serialises them.
    cycle_lock: Mutex<()>,
}

impl Distributor {
    pub fn new(
        settings: Arc<Settings>,
        docs: Arc<dyn DocumentStore>,
        fetcher: Arc<dyn SourceFetcher>,
        notifier: Arc<dyn Notifier>,
        admin_chat: Option<String>,
    ) -> Self {
        Self {
            settings,
            docs,
            fetcher,
            notifier,
            admin_chat,
            notify_pace: NOTIFY_PACE,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Override the inter-notification delay. Tests pass zero.
    pub fn with_notify_pace(mut self, pace: Duration) -> Self {
        self.notify_pace = pace;
        self
    }

    /// Run one fetch/verify/relay cycle.
    ///
    /// Per-source and per-channel failures are logged and skipped; a failure
    /// to persist the cache or a published link aborts the cycle, since the
    /// returned counts would otherwise disagree with reality.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, RelayError> {
        let _cycle = self.cycle_lock.lock().await;

        let sources = self.settings.source_links().await?;
        if sources.is_empty() {
            return Err(RelayError::Configuration("no source links configured".into()));
        }
        let channels = self.settings.channel_ids().await?;
        if channels.is_empty() {
            return Err(RelayError::Configuration(
                "no destination channels configured".into(),
            ));
        }

        let mut cache = self.settings.fingerprint_cache().await?;
        let mut fresh: Vec<String> = Vec::new();

        for url in &sources {
            let text = match self.fetcher.fetch(url).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("fetch failed for {url}: {e}");
                    continue;
                }
            };
            for link in extract::extract(&text) {
                if fingerprint::admit(&mut cache, fingerprint::fingerprint(&link)) {
                    fresh.push(link);
                }
            }
        }

        let total_checked = fresh.len();
        fingerprint::truncate(&mut cache);
        self.settings.store_fingerprint_cache(&cache).await?;

        let batch: Vec<String> = fresh.into_iter().take(PUBLISH_BATCH_CAP).collect();
        let probes = probe_batch(&batch).await;

        let mut new_count = 0;
        for (link, result) in batch.iter().zip(&probes) {
            self.publish(link, result, &channels).await?;
            new_count += 1;
        }

        if new_count > 0 {
            if let Some(admin) = &self.admin_chat {
                let summary = format!(
                    "✅ {new_count} new configs distributed to {} channel(s).",
                    channels.len()
                );
                if let Err(e) = self.notifier.notify(admin, &summary, None).await {
                    tracing::warn!("admin summary notification failed: {e}");
                }
            }
        }

        tracing::info!(new_count, total_checked, "cycle complete");
        Ok(CycleOutcome { new_count, total_checked })
    }

    /// Publish one verified link: render, upsert by fingerprint, then notify
    /// every channel with pacing. Shared by the cycle tail and approvals.
    pub(crate) async fn publish(
        &self,
        config: &str,
        result: &ProbeResult,
        channels: &[String],
    ) -> Result<(), RelayError> {
        let fp = fingerprint::fingerprint(config);
        let templates = self.settings.templates().await?;
        let rendered = format::render(config, result, &templates);
        let text = format!("{rendered}\n\n`{config}`");
        let markup = notify::share_keyboard(config, &fp);

        let endpoint = extract::parse_endpoint(config);
        let doc = PublishedConfig {
            fingerprint: fp,
            config: config.to_string(),
            scheme: Scheme::classify(config),
            probe: result.clone(),
            host: endpoint.as_ref().map(|ep| ep.host.clone()),
            port: endpoint.as_ref().map(|ep| ep.port),
            created_at: Utc::now(),
        };
        self.docs.upsert_published(&doc).await?;

        for channel in channels {
            if let Err(e) = self
                .notifier
                .notify(channel, &text, Some(markup.clone()))
                .await
            {
                tracing::warn!("notify failed for channel {channel}: {e}");
            }
            tokio::time::sleep(self.notify_pace).await;
        }
        Ok(())
    }
}

/// Probe a batch concurrently; results come back in batch order. Probing has
/// no ordering dependency, only the publish step after it does.
async fn probe_batch(batch: &[String]) -> Vec<ProbeResult> {
    let mut tasks = JoinSet::new();
    for (idx, link) in batch.iter().enumerate() {
        let link = link.clone();
        tasks.spawn(async move { (idx, probe::probe(&link).await) });
    }

    let mut results = vec![ProbeResult::failure("probe task failed"); batch.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, result)) => results[idx] = result,
            Err(e) => tracing::error!("probe task panicked: {e}"),
        }
    }
    results
}
