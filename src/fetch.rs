//! Source fetch capability: plain HTTP GET with redirects and a bounded
//! timeout. One failing source never aborts a cycle; callers log and move on.

use crate::error::RelayError;
use async_trait::async_trait;
use std::time::Duration;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, RelayError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, RelayError> {
        let response = self.client.get(url).send().await?;
        Ok(response.text().await?)
    }
}
