//! Storage interfaces and their production implementations.
//!
//! The pipeline only sees two narrow traits: a named-value store for mutable
//! settings and the fingerprint cache, and a document store for published
//! links and submissions. Production wiring backs them with Redis and
//! PostgreSQL; tests back them with in-memory maps (`test_utils`).

use crate::error::RelayError;
use crate::models::{ProbeResult, PublishedConfig, Scheme, Submission, SubmissionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sqlx::PgPool;
use uuid::Uuid;

// ── Interfaces ────────────────────────────────────────────────────────────────

/// Named-value store. Values are JSON strings; keys have no schema.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RelayError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), RelayError>;
    async fn delete(&self, key: &str) -> Result<(), RelayError>;
}

/// Document store for published links (keyed by fingerprint) and submissions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace the row for this fingerprint. The store never holds
    /// more than one published link per fingerprint.
    async fn upsert_published(&self, doc: &PublishedConfig) -> Result<(), RelayError>;

    async fn recent_published(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PublishedConfig>, RelayError>;

    async fn count_published(&self) -> Result<i64, RelayError>;

    /// Published links whose most recent probe came back `active`.
    async fn count_active(&self) -> Result<i64, RelayError>;

    async fn insert_submission(&self, submission: &Submission) -> Result<(), RelayError>;

    async fn submission(&self, id: Uuid) -> Result<Option<Submission>, RelayError>;

    async fn submissions_by_status(
        &self,
        status: SubmissionStatus,
        limit: i64,
    ) -> Result<Vec<Submission>, RelayError>;

    async fn count_submissions(&self, status: SubmissionStatus) -> Result<i64, RelayError>;

    /// Move a submission out of `pending`. Returns `false` when the
    /// submission was not pending, so a review can only happen once.
    async fn transition_submission(
        &self,
        id: Uuid,
        to: SubmissionStatus,
    ) -> Result<bool, RelayError>;
}

// ── Redis-backed named-value store ────────────────────────────────────────────

/// Redis connection manager multiplexes a single async connection across all
/// callers; each operation clones the handle.
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub async fn connect(url: &str) -> Result<Self, RelayError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, RelayError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RelayError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RelayError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

// ── PostgreSQL-backed document store ──────────────────────────────────────────

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PublishedRow {
    fingerprint: String,
    config: String,
    scheme: String,
    probe: sqlx::types::Json<ProbeResult>,
    host: Option<String>,
    port: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<PublishedRow> for PublishedConfig {
    fn from(r: PublishedRow) -> Self {
        Self {
            fingerprint: r.fingerprint,
            config: r.config,
            scheme: Scheme::parse(&r.scheme),
            probe: r.probe.0,
            host: r.host,
            port: r.port.and_then(|p| u16::try_from(p).ok()),
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    config: String,
    scheme: String,
    submitted_by: String,
    username: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<SubmissionRow> for Submission {
    fn from(r: SubmissionRow) -> Self {
        Self {
            id: r.id,
            config: r.config,
            scheme: Scheme::parse(&r.scheme),
            submitted_by: r.submitted_by,
            username: r.username,
            status: SubmissionStatus::parse(&r.status).unwrap_or(SubmissionStatus::Pending),
            created_at: r.created_at,
        }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn upsert_published(&self, doc: &PublishedConfig) -> Result<(), RelayError> {
        sqlx::query(
            "INSERT INTO published_configs (fingerprint, config, scheme, probe, host, port, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (fingerprint) DO UPDATE
             SET config = EXCLUDED.config,
                 scheme = EXCLUDED.scheme,
                 probe = EXCLUDED.probe,
                 host = EXCLUDED.host,
                 port = EXCLUDED.port,
                 created_at = EXCLUDED.created_at",
        )
        .bind(&doc.fingerprint)
        .bind(&doc.config)
        .bind(doc.scheme.as_str())
        .bind(sqlx::types::Json(&doc.probe))
        .bind(&doc.host)
        .bind(doc.port.map(i32::from))
        .bind(doc.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_published(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PublishedConfig>, RelayError> {
        let rows = sqlx::query_as::<_, PublishedRow>(
            "SELECT fingerprint, config, scheme, probe, host, port, created_at
             FROM published_configs
             ORDER BY created_at DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_published(&self) -> Result<i64, RelayError> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM published_configs")
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn count_active(&self) -> Result<i64, RelayError> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM published_configs WHERE probe->>'status' = 'active'",
        )
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), RelayError> {
        sqlx::query(
            "INSERT INTO submissions (id, config, scheme, submitted_by, username, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(submission.id)
        .bind(&submission.config)
        .bind(submission.scheme.as_str())
        .bind(&submission.submitted_by)
        .bind(&submission.username)
        .bind(submission.status.as_str())
        .bind(submission.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn submission(&self, id: Uuid) -> Result<Option<Submission>, RelayError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            "SELECT id, config, scheme, submitted_by, username, status, created_at
             FROM submissions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn submissions_by_status(
        &self,
        status: SubmissionStatus,
        limit: i64,
    ) -> Result<Vec<Submission>, RelayError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            "SELECT id, config, scheme, submitted_by, username, status, created_at
             FROM submissions
             WHERE status = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_submissions(&self, status: SubmissionStatus) -> Result<i64, RelayError> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM submissions WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn transition_submission(
        &self,
        id: Uuid,
        to: SubmissionStatus,
    ) -> Result<bool, RelayError> {
        let result = sqlx::query(
            "UPDATE submissions SET status = $1 WHERE id = $2 AND status = 'pending'",
        )
        .bind(to.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
