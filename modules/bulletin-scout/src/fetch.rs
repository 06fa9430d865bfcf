// HTTP access for the scraping stage.
//
// BulletinFetcher is the seam: HttpFetcher in production, MockFetcher in tests.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Parish sites reject obvious bots.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[async_trait]
pub trait BulletinFetcher: Send + Sync {
    /// Whether the URL serves something (HEAD returns 200 after redirects).
    async fn probe(&self, url: &str) -> Result<bool>;

    /// GET a page as text.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// GET a document as raw bytes.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl HttpFetcher {
    /// `timeout` applies to full downloads; probes get a third of it, at
    /// least five seconds.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to build bulletin HTTP client")?;
        let probe_timeout = (timeout / 3).max(Duration::from_secs(5));
        Ok(Self {
            client,
            probe_timeout,
        })
    }
}

#[async_trait]
impl BulletinFetcher for HttpFetcher {
    async fn probe(&self, url: &str) -> Result<bool> {
        let resp = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .with_context(|| format!("HEAD {url} failed"))?;
        debug!(url, status = %resp.status(), "Probed");
        Ok(resp.status() == reqwest::StatusCode::OK)
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        if !resp.status().is_success() {
            bail!("GET {url} returned HTTP {}", resp.status());
        }
        resp.text()
            .await
            .with_context(|| format!("Failed to read body of {url}"))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        if !resp.status().is_success() {
            bail!("GET {url} returned HTTP {}", resp.status());
        }
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {url}"))?;
        Ok(bytes.to_vec())
    }
}
