// src/ingest/providers/gdelt.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;

use crate::ingest::types::{Category, NewsBackend, NewsItem};
use crate::ingest::MAX_ITEMS_PER_CATEGORY;
use crate::tagger::KeywordTagger;

const GDELT_DOC_API: &str = "https://api.gdeltproject.org/api/v2/doc/doc";

#[derive(Debug, Deserialize)]
struct ArtList {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    /// e.g. `20240115T120000Z`
    #[serde(default)]
    seendate: String,
    #[serde(default)]
    domain: String,
}

fn category_query(category: Category) -> &'static str {
    match category {
        Category::Politics => "(politics OR government OR election OR congress)",
        Category::Tech => "(technology OR software OR startup OR \"silicon valley\")",
        Category::Finance => "(finance OR \"stock market\" OR economy OR banking)",
        Category::Gov => "(\"federal government\" OR \"white house\" OR congress OR regulation)",
        Category::Ai => "(\"artificial intelligence\" OR \"machine learning\" OR AI OR ChatGPT)",
        Category::Intel => "(intelligence OR security OR military OR defense)",
    }
}

fn parse_seendate(s: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|n| n.and_utc().timestamp_millis())
}

/// GDELT DOC 2.0 article-list client, the English-language backend.
pub struct GdeltBackend {
    client: reqwest::Client,
    base_url: String,
    tagger: Arc<KeywordTagger>,
}

impl GdeltBackend {
    pub fn new(tagger: Arc<KeywordTagger>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("situation-monitor/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building gdelt http client")?;
        Ok(Self {
            client,
            base_url: GDELT_DOC_API.to_string(),
            tagger,
        })
    }

    /// Point at another endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn to_items(&self, category: Category, body: ArtList, now_ms: i64) -> Vec<NewsItem> {
        let mut out: Vec<NewsItem> = Vec::new();
        for a in body.articles {
            let title = a.title.trim().to_string();
            let link = a.url.trim().to_string();
            if title.is_empty() || link.is_empty() {
                continue;
            }
            let timestamp = parse_seendate(&a.seendate).unwrap_or(now_ms);
            let tags = self.tagger.classify(&title);
            out.push(NewsItem {
                id: format!("gdelt-{}-{}-{}", category, out.len(), timestamp),
                title,
                link,
                description: None,
                pub_date: a.seendate,
                timestamp,
                source: if a.domain.is_empty() {
                    "GDELT".to_string()
                } else {
                    a.domain
                },
                category,
                is_alert: tags.alert.is_alert,
                alert_keyword: tags.alert.keyword,
                region: tags.region,
                topics: tags.topics,
            });
        }
        let (items, _) = crate::ingest::merge_sort_dedup(out, MAX_ITEMS_PER_CATEGORY);
        items
    }
}

#[async_trait]
impl NewsBackend for GdeltBackend {
    async fn fetch_category(&self, category: Category) -> Result<Vec<NewsItem>> {
        let query = format!("{} sourcelang:english", category_query(category));
        let max = MAX_ITEMS_PER_CATEGORY.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("query", query.as_str()),
                ("mode", "artlist"),
                ("maxrecords", max.as_str()),
                ("format", "json"),
                ("sort", "datedesc"),
                ("timespan", "7d"),
            ])
            .send()
            .await
            .context("gdelt http get()")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("gdelt HTTP {}", status.as_u16());
        }

        // GDELT answers some query errors with a plain-text body and 200.
        let text = resp.text().await.context("gdelt http .text()")?;
        let body: ArtList = serde_json::from_str(&text).context("parsing gdelt artlist json")?;
        Ok(self.to_items(category, body, Utc::now().timestamp_millis()))
    }

    fn name(&self) -> &'static str {
        "gdelt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artlist_maps_to_items() {
        let backend = GdeltBackend::new(Arc::new(KeywordTagger::default()), Duration::from_secs(1)).unwrap();
        let body: ArtList = serde_json::from_str(
            r#"{"articles":[
                {"url":"https://a.test/1","title":"Missile strike near border","seendate":"20231114T221320Z","domain":"a.test"},
                {"url":"","title":"no link","seendate":"20231114T221320Z","domain":"b.test"},
                {"url":"https://c.test/3","title":"Later","seendate":"bogus","domain":""}
            ]}"#,
        )
        .unwrap();
        let items = backend.to_items(Category::Intel, body, 1_800_000_000_000);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Later");
        assert_eq!(items[0].source, "GDELT");
        assert_eq!(items[1].timestamp, 1_700_000_000_000);
        assert!(items[1].is_alert);
        assert_eq!(items[1].source, "a.test");
    }

    #[test]
    fn empty_body_is_tolerated() {
        let body: ArtList = serde_json::from_str("{}").unwrap();
        assert!(body.articles.is_empty());
    }
}
