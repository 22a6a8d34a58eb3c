//! Mutable service settings kept in the named-value store.
//!
//! Source list, channel list, template map, the fingerprint cache and
//! per-submitter interaction state all live here as single JSON values.
//! Reads fall back to defaults when a key is absent; writes go through a
//! read-modify-write guard so administrative updates never interleave.

use crate::error::RelayError;
use crate::fingerprint;
use crate::models::TemplateMap;
use crate::store::KvStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

const SOURCES_KEY: &str = "source_links";
const CHANNELS_KEY: &str = "channel_ids";
const TEMPLATES_KEY: &str = "message_templates";
const CACHE_KEY: &str = "configs_cache";

/// Interaction-state value meaning "the next text from this submitter is a
/// share-link submission".
const AWAITING_CONFIG: &str = "awaiting_config";

const DEFAULT_SOURCES: &[&str] =
    &["https://raw.githubusercontent.com/arshiacomplus/v2rayExtractor/refs/heads/main/mix/sub.html"];

pub struct Settings {
    kv: Arc<dyn KvStore>,
    /// Serialises read-modify-write updates to the lists above.
    write_lock: Mutex<()>,
}

impl Settings {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv, write_lock: Mutex::new(()) }
    }

    /// Seed absent keys with their defaults. Reads default lazily anyway;
    /// seeding just makes the values visible to list endpoints from the start.
    pub async fn ensure_defaults(&self) -> Result<(), RelayError> {
        let _guard = self.write_lock.lock().await;
        if self.kv.get(SOURCES_KEY).await?.is_none() {
            self.write(SOURCES_KEY, &default_sources()).await?;
        }
        if self.kv.get(CHANNELS_KEY).await?.is_none() {
            self.write(CHANNELS_KEY, &Vec::<String>::new()).await?;
        }
        if self.kv.get(TEMPLATES_KEY).await?.is_none() {
            self.write(TEMPLATES_KEY, &default_templates()).await?;
        }
        if self.kv.get(CACHE_KEY).await?.is_none() {
            self.write(CACHE_KEY, &Vec::<String>::new()).await?;
        }
        Ok(())
    }

    // ── Sources ───────────────────────────────────────────────────────────────

    pub async fn source_links(&self) -> Result<Vec<String>, RelayError> {
        self.read_or(SOURCES_KEY, default_sources).await
    }

    pub async fn add_source(&self, url: &str) -> Result<Vec<String>, RelayError> {
        let _guard = self.write_lock.lock().await;
        let mut links: Vec<String> = self.read_or(SOURCES_KEY, default_sources).await?;
        if links.iter().any(|l| l == url) {
            return Err(RelayError::Duplicate(format!("source already listed: {url}")));
        }
        links.push(url.to_string());
        self.write(SOURCES_KEY, &links).await?;
        Ok(links)
    }

    pub async fn remove_source(&self, url: &str) -> Result<Vec<String>, RelayError> {
        let _guard = self.write_lock.lock().await;
        let mut links: Vec<String> = self.read_or(SOURCES_KEY, default_sources).await?;
        let before = links.len();
        links.retain(|l| l != url);
        if links.len() == before {
            return Err(RelayError::NotFound(format!("source not listed: {url}")));
        }
        self.write(SOURCES_KEY, &links).await?;
        Ok(links)
    }

    // ── Channels ──────────────────────────────────────────────────────────────

    pub async fn channel_ids(&self) -> Result<Vec<String>, RelayError> {
        self.read_or(CHANNELS_KEY, Vec::new).await
    }

    pub async fn add_channel(&self, channel_id: &str) -> Result<Vec<String>, RelayError> {
        let _guard = self.write_lock.lock().await;
        let mut channels: Vec<String> = self.read_or(CHANNELS_KEY, Vec::new).await?;
        if channels.iter().any(|c| c == channel_id) {
            return Err(RelayError::Duplicate(format!(
                "channel already listed: {channel_id}"
            )));
        }
        channels.push(channel_id.to_string());
        self.write(CHANNELS_KEY, &channels).await?;
        Ok(channels)
    }

    pub async fn remove_channel(&self, channel_id: &str) -> Result<Vec<String>, RelayError> {
        let _guard = self.write_lock.lock().await;
        let mut channels: Vec<String> = self.read_or(CHANNELS_KEY, Vec::new).await?;
        let before = channels.len();
        channels.retain(|c| c != channel_id);
        if channels.len() == before {
            return Err(RelayError::NotFound(format!("channel not listed: {channel_id}")));
        }
        self.write(CHANNELS_KEY, &channels).await?;
        Ok(channels)
    }

    // ── Templates ─────────────────────────────────────────────────────────────

    pub async fn templates(&self) -> Result<TemplateMap, RelayError> {
        self.read_or(TEMPLATES_KEY, default_templates).await
    }

    /// Replace one template entry. The template body is free-form text; the
    /// external editor may reference placeholders that do not exist.
    pub async fn set_template(&self, scheme: &str, template: &str) -> Result<TemplateMap, RelayError> {
        let _guard = self.write_lock.lock().await;
        let mut templates: TemplateMap = self.read_or(TEMPLATES_KEY, default_templates).await?;
        templates.insert(scheme.to_string(), template.to_string());
        self.write(TEMPLATES_KEY, &templates).await?;
        Ok(templates)
    }

    // ── Fingerprint cache ─────────────────────────────────────────────────────

    pub async fn fingerprint_cache(&self) -> Result<Vec<String>, RelayError> {
        self.read_or(CACHE_KEY, Vec::new).await
    }

    /// Persist the cache after a cycle has truncated it.
    pub async fn store_fingerprint_cache(&self, cache: &[String]) -> Result<(), RelayError> {
        debug_assert!(cache.len() <= fingerprint::CACHE_CAP);
        self.write(CACHE_KEY, &cache).await
    }

    // ── Per-submitter interaction state ───────────────────────────────────────

    pub async fn set_awaiting(&self, submitter: &str) -> Result<(), RelayError> {
        self.kv
            .set(&submitter_state_key(submitter), AWAITING_CONFIG)
            .await
    }

    pub async fn is_awaiting(&self, submitter: &str) -> Result<bool, RelayError> {
        let state = self.kv.get(&submitter_state_key(submitter)).await?;
        Ok(state.as_deref() == Some(AWAITING_CONFIG))
    }

    pub async fn clear_awaiting(&self, submitter: &str) -> Result<(), RelayError> {
        self.kv.delete(&submitter_state_key(submitter)).await
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    async fn read_or<T, F>(&self, key: &str, default: F) -> Result<T, RelayError>
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.kv.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(default()),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), RelayError> {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw).await
    }
}

fn submitter_state_key(submitter: &str) -> String {
    format!("submitter_state_{submitter}")
}

fn default_sources() -> Vec<String> {
    DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
}

fn default_templates() -> TemplateMap {
    let mut templates = TemplateMap::new();
    templates.insert(
        "vless".into(),
        "VLESS Config\nType: {type}\nServer: {server}\nStatus: {status}".into(),
    );
    templates.insert(
        "vmess".into(),
        "VMess Config\nType: {type}\nServer: {server}\nStatus: {status}".into(),
    );
    templates.insert(
        "trojan".into(),
        "Trojan Config\nType: {type}\nServer: {server}\nStatus: {status}".into(),
    );
    templates.insert(
        "shadowsocks".into(),
        "Shadowsocks Config\nType: {type}\nServer: {server}\nStatus: {status}".into(),
    );
    templates.insert(
        "default".into(),
        "VPN Config\nType: {type}\nServer: {server}\nStatus: {status}".into(),
    );
    templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryKv;

    fn settings() -> Settings {
        Settings::new(Arc::new(MemoryKv::default()))
    }

    #[tokio::test]
    async fn sources_default_until_modified() {
        let s = settings();
        let links = s.source_links().await.unwrap();
        assert_eq!(links, default_sources());

        let links = s.add_source("https://example.com/sub.html").await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(s.add_source("https://example.com/sub.html").await.is_err());

        let links = s.remove_source("https://example.com/sub.html").await.unwrap();
        assert_eq!(links, default_sources());
        assert!(s.remove_source("https://nope.example").await.is_err());
    }

    #[tokio::test]
    async fn channels_start_empty() {
        let s = settings();
        assert!(s.channel_ids().await.unwrap().is_empty());
        s.add_channel("@relay").await.unwrap();
        assert_eq!(s.channel_ids().await.unwrap(), vec!["@relay".to_string()]);
    }

    #[tokio::test]
    async fn template_update_overrides_one_entry() {
        let s = settings();
        let templates = s.set_template("vless", "custom {type}").await.unwrap();
        assert_eq!(templates.get("vless").unwrap(), "custom {type}");
        // Other defaults untouched.
        assert!(templates.get("trojan").unwrap().contains("{server}"));
    }

    #[tokio::test]
    async fn fingerprint_cache_round_trips() {
        let s = settings();
        assert!(s.fingerprint_cache().await.unwrap().is_empty());
        s.store_fingerprint_cache(&["fp1".to_string(), "fp2".to_string()])
            .await
            .unwrap();
        assert_eq!(s.fingerprint_cache().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn awaiting_state_sets_and_clears() {
        let s = settings();
        assert!(!s.is_awaiting("42").await.unwrap());
        s.set_awaiting("42").await.unwrap();
        assert!(s.is_awaiting("42").await.unwrap());
        s.clear_awaiting("42").await.unwrap();
        assert!(!s.is_awaiting("42").await.unwrap());
    }

    #[tokio::test]
    async fn ensure_defaults_seeds_missing_keys() {
        let s = settings();
        s.ensure_defaults().await.unwrap();
        assert_eq!(s.source_links().await.unwrap(), default_sources());
        assert_eq!(s.templates().await.unwrap().len(), 5);
    }
}
