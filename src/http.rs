use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::page::Page;

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Shared HTTP client used for page loads and the secondary fetches that
/// deferred media fields perform. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    retries: u32,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { client, retries: config.fetch_retries })
    }

    pub async fn get_text(&self, url: &Url) -> Result<String> {
        self.with_retry(url, |resp| async move {
            resp.text().await.context("failed to read response body")
        })
        .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        self.with_retry(url, |resp| async move {
            resp.json::<T>().await.context("failed to decode JSON body")
        })
        .await
    }

    /// The page carries the URL it was finally served from, after redirects.
    pub async fn load_page(&self, url: &Url) -> Result<Page> {
        self.with_retry(url, |resp| async move {
            let served_from = resp.url().clone();
            let html = resp.text().await.context("failed to read response body")?;
            Ok(Page::new(served_from, html))
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, url: &Url, read: F) -> Result<T>
    where
        F: Fn(reqwest::Response) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match self.get_once(url, &read).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(%url, attempt, error = %e, "fetch failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e.context(format!("GET {url}"))),
            }
        }
    }

    async fn get_once<T, F, Fut>(&self, url: &Url, read: &F) -> Result<T>
    where
        F: Fn(reqwest::Response) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        debug!(%url, "GET");
        let resp = self.client.get(url.clone()).send().await.context("HTTP request failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status}");
        }
        read(resp).await
    }
}
