// src/config/app.rs
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::types::Language;

/// Process configuration, read from the environment (after `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub default_language: Language,
    /// Relay prefix for feed requests, e.g. `https://corsproxy.io/?url=`.
    pub rss_proxy_url: Option<String>,
    pub pacing: Duration,
    pub fetch_timeout: Duration,
    pub feed_sources_path: PathBuf,
    pub translation_config_path: PathBuf,
    pub translation_cache_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            default_language: Language::En,
            rss_proxy_url: None,
            pacing: Duration::from_millis(500),
            fetch_timeout: Duration::from_secs(10),
            feed_sources_path: PathBuf::from("config/feed_sources.json"),
            translation_config_path: PathBuf::from("config/translation.json"),
            translation_cache_path: PathBuf::from("config/translation_cache.json"),
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(d.bind_addr),
            default_language: match var("DEFAULT_LANGUAGE") {
                Some(v) => v.parse().context("DEFAULT_LANGUAGE")?,
                None => d.default_language,
            },
            rss_proxy_url: var("RSS_PROXY_URL"),
            pacing: match var("PACING_MS") {
                Some(v) => Duration::from_millis(v.trim().parse().context("PACING_MS")?),
                None => d.pacing,
            },
            fetch_timeout: match var("FETCH_TIMEOUT_SECS") {
                Some(v) => Duration::from_secs(v.trim().parse().context("FETCH_TIMEOUT_SECS")?),
                None => d.fetch_timeout,
            },
            feed_sources_path: var("FEED_SOURCES_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.feed_sources_path),
            translation_config_path: var("TRANSLATION_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.translation_config_path),
            translation_cache_path: var("TRANSLATION_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.translation_cache_path),
        })
    }
}
