// src/ingest/types.rs
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed topic buckets used to group sources and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Politics,
    Tech,
    Finance,
    Gov,
    Ai,
    Intel,
}

impl Category {
    /// Iteration order used by the cross-category orchestrator.
    pub const ALL: [Category; 6] = [
        Category::Politics,
        Category::Tech,
        Category::Finance,
        Category::Gov,
        Category::Ai,
        Category::Intel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Tech => "tech",
            Category::Finance => "finance",
            Category::Gov => "gov",
            Category::Ai => "ai",
            Category::Intel => "intel",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| anyhow::anyhow!("unknown category: {s}"))
    }
}

/// Active UI language. English reads from the JSON news backend, Chinese
/// from the RSS pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "zh" => Ok(Language::Zh),
            other => Err(anyhow::anyhow!("unsupported language: {other}")),
        }
    }
}

/// One retrievable feed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

pub type FeedSourceMap = BTreeMap<Category, Vec<FeedSource>>;

/// Normalized unit of output, serialized in the shape the dashboard consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub pub_date: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub source: String,
    pub category: Category,
    pub is_alert: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Why a single source contributed nothing.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("reading body: {0}")]
    Body(String),
    #[error("document is not a feed")]
    NotAFeed,
}

impl FetchError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::Body(_) => "body",
            FetchError::NotAFeed => "not_a_feed",
        }
    }
}

/// Per-source result, folded by the aggregator.
#[derive(Debug)]
pub enum SourceOutcome {
    Ok(Vec<NewsItem>),
    Failed(FetchError),
}

/// A source that failed during one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub url: String,
    pub reason: String,
}

/// Retrieves raw feed documents. Implemented over HTTP in production and
/// with canned bodies in tests.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch_document(&self, source: &FeedSource) -> Result<String, FetchError>;
    fn name(&self) -> &'static str;
}

/// JSON news API serving already-structured records for one category.
#[async_trait::async_trait]
pub trait NewsBackend: Send + Sync {
    async fn fetch_category(&self, category: Category) -> anyhow::Result<Vec<NewsItem>>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Politics".parse::<Category>().unwrap(), Category::Politics);
        assert_eq!(" ai ".parse::<Category>().unwrap(), Category::Ai);
        assert!("sports".parse::<Category>().is_err());
    }

    #[test]
    fn news_item_serializes_camel_case_and_skips_absent_fields() {
        let item = NewsItem {
            id: "rss-tech-X-0-1".into(),
            title: "t".into(),
            link: "https://x.test/a".into(),
            description: None,
            pub_date: String::new(),
            timestamp: 1,
            source: "X".into(),
            category: Category::Tech,
            is_alert: false,
            alert_keyword: None,
            region: None,
            topics: vec![],
        };
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["pubDate"], "");
        assert_eq!(v["isAlert"], false);
        assert_eq!(v["category"], "tech");
        assert!(v.get("alertKeyword").is_none());
        assert!(v.get("description").is_none());
    }
}
