//! Application state: store connections and the assembled pipeline.

use crate::distribute::Distributor;
use crate::fetch::{HttpFetcher, SourceFetcher};
use crate::moderation::Moderation;
use crate::notify::{Notifier, TelegramNotifier};
use crate::settings::Settings;
use crate::store::{DocumentStore, KvStore, PgStore, RedisKv};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state injected into every Axum handler.
pub struct AppState {
    pub settings: Arc<Settings>,
    pub docs: Arc<dyn DocumentStore>,
    pub distributor: Arc<Distributor>,
    pub moderation: Moderation,
}

impl AppState {
    /// Connect to PostgreSQL (documents) and Redis (settings and cache),
    /// run migrations, and assemble the pipeline around the production
    /// transports.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Config Relay connected to database, migrations applied");

        let redis_url = std::env::var("REDIS_URL").map_err(|_| {
            anyhow::anyhow!("REDIS_URL must be set (settings and the fingerprint cache live in Redis)")
        })?;
        let kv: Arc<dyn KvStore> = Arc::new(RedisKv::connect(&redis_url).await?);
        tracing::info!("settings store connected: {redis_url}");

        let bot_token = std::env::var("BOT_TOKEN").map_err(|_| {
            anyhow::anyhow!("BOT_TOKEN must be set (channel delivery uses the Telegram Bot API)")
        })?;
        let admin_chat = std::env::var("ADMIN_CHAT_ID").ok();
        if admin_chat.is_none() {
            tracing::warn!("ADMIN_CHAT_ID not set; cycle summaries are disabled");
        }

        let fetcher: Arc<dyn SourceFetcher> = Arc::new(HttpFetcher::new()?);
        let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(&bot_token)?);

        Ok(Self::assemble(
            kv,
            Arc::new(PgStore::new(pool)),
            fetcher,
            notifier,
            admin_chat,
        ))
    }

    /// Wire the pipeline from already-constructed collaborators.
    pub fn assemble(
        kv: Arc<dyn KvStore>,
        docs: Arc<dyn DocumentStore>,
        fetcher: Arc<dyn SourceFetcher>,
        notifier: Arc<dyn Notifier>,
        admin_chat: Option<String>,
    ) -> Self {
        let settings = Arc::new(Settings::new(kv));
        let distributor = Arc::new(Distributor::new(
            settings.clone(),
            docs.clone(),
            fetcher,
            notifier,
            admin_chat,
        ));
        let moderation = Moderation::new(settings.clone(), docs.clone(), distributor.clone());
        Self { settings, docs, distributor, moderation }
    }
}
