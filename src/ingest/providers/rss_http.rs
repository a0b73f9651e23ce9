// src/ingest/providers/rss_http.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ingest::types::{FeedFetcher, FeedSource, FetchError};

/// Fetches feed documents over HTTP, optionally through a CORS-bypass relay
/// (`proxy` is a prefix; the target URL is percent-encoded and appended).
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    proxy: Option<String>,
}

impl HttpFeedFetcher {
    pub fn new(proxy: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("situation-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self::with_client(client, proxy))
    }

    pub fn with_client(client: reqwest::Client, proxy: Option<String>) -> Self {
        Self {
            client,
            proxy: proxy.filter(|p| !p.trim().is_empty()),
        }
    }

    pub fn request_url(&self, url: &str) -> String {
        match &self.proxy {
            Some(prefix) => format!("{prefix}{}", urlencoding::encode(url)),
            None => url.to_string(),
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch_document(&self, source: &FeedSource) -> Result<String, FetchError> {
        let url = self.request_url(&source.url);
        tracing::debug!(target: "ingest", source = %source.name, url = %url, "fetching feed");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        resp.text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
