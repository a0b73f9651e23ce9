//! # News Service
//!
//! Top-level entry point that dispatches on language:
//! - `en` reads from the JSON news backend (one endpoint, all categories
//!   fetched together).
//! - `zh` runs the RSS pipeline, one category at a time with a pacing delay
//!   between categories.
//!
//! Language and feed sources are passed in explicitly through
//! [`NewsContext`]; whatever holds the UI-facing state builds that context.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;

use crate::ingest::feeds::default_feeds;
use crate::ingest::types::{
    Category, FeedFetcher, FeedSource, FeedSourceMap, Language, NewsBackend, NewsItem,
};
use crate::ingest::{aggregate_category, CategoryReport};
use crate::tagger::KeywordTagger;

pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

pub type CategoryMap = BTreeMap<Category, Vec<NewsItem>>;

/// Ambient state the caller resolves before asking for news.
#[derive(Debug, Clone, Copy)]
pub struct NewsContext<'a> {
    /// Current UI language, used when the request does not name one.
    pub language: Language,
    /// Active feed sources for the RSS path.
    pub sources: &'a FeedSourceMap,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NewsRequest {
    pub category: Option<Category>,
    pub language: Option<Language>,
}

/// Either one category's items or every category's items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NewsResult {
    Category(Vec<NewsItem>),
    All(CategoryMap),
}

pub struct NewsService {
    fetcher: Arc<dyn FeedFetcher>,
    backend: Arc<dyn NewsBackend>,
    tagger: Arc<KeywordTagger>,
    pacing: Duration,
}

impl NewsService {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        backend: Arc<dyn NewsBackend>,
        tagger: Arc<KeywordTagger>,
    ) -> Self {
        Self {
            fetcher,
            backend,
            tagger,
            pacing: DEFAULT_PACING,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Main entry point. A caller-supplied language wins over the context's.
    pub async fn fetch_news(&self, req: NewsRequest, ctx: &NewsContext<'_>) -> NewsResult {
        let lang = req.language.unwrap_or(ctx.language);
        match req.category {
            Some(category) => {
                NewsResult::Category(self.fetch_category_news(category, lang, ctx.sources).await)
            }
            None => NewsResult::All(self.fetch_all_news(lang, ctx.sources).await),
        }
    }

    pub async fn fetch_category_news(
        &self,
        category: Category,
        lang: Language,
        sources: &FeedSourceMap,
    ) -> Vec<NewsItem> {
        tracing::info!(%category, %lang, "fetching category news");
        match lang {
            Language::Zh => {
                self.rss_category(category, sources.get(&category).map(Vec::as_slice))
                    .await
                    .items
            }
            Language::En => self.backend_category(category).await,
        }
    }

    /// Every category is present in the result, empty when it failed.
    pub async fn fetch_all_news(&self, lang: Language, sources: &FeedSourceMap) -> CategoryMap {
        tracing::info!(%lang, "fetching all news");
        match lang {
            Language::Zh => self
                .fetch_all_rss(sources)
                .await
                .into_iter()
                .map(|(c, report)| (c, report.items))
                .collect(),
            Language::En => self.fetch_all_backend().await,
        }
    }

    /// RSS path over all categories, sequential with pacing. Keeps the
    /// per-category failure reports.
    pub async fn fetch_all_rss(
        &self,
        sources: &FeedSourceMap,
    ) -> BTreeMap<Category, CategoryReport> {
        let defaults = default_feeds(Language::Zh);
        let mut out = BTreeMap::new();
        for (i, category) in Category::ALL.into_iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            let list = sources
                .get(&category)
                .or_else(|| defaults.get(&category))
                .map(Vec::as_slice);
            out.insert(category, self.rss_category(category, list).await);
        }
        out
    }

    async fn rss_category(
        &self,
        category: Category,
        sources: Option<&[FeedSource]>,
    ) -> CategoryReport {
        aggregate_category(self.fetcher.as_ref(), &self.tagger, category, sources).await
    }

    async fn backend_category(&self, category: Category) -> Vec<NewsItem> {
        match self.backend.fetch_category(category).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    %category,
                    error = ?e,
                    "news backend failed"
                );
                counter_backend_failure(self.backend.name());
                Vec::new()
            }
        }
    }

    async fn fetch_all_backend(&self) -> CategoryMap {
        let results = join_all(
            Category::ALL
                .into_iter()
                .map(|c| self.backend_category(c)),
        )
        .await;
        Category::ALL.into_iter().zip(results).collect()
    }
}

fn counter_backend_failure(backend: &'static str) {
    metrics::counter!("news_backend_failures_total", "backend" => backend).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::FetchError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedFetcher {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FeedFetcher for CannedFetcher {
        async fn fetch_document(&self, source: &FeedSource) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(source.url.clone());
            Ok(format!(
                "<rss><channel><item><title>{0}</title><link>{1}</link></item></channel></rss>",
                source.name, source.url
            ))
        }
        fn name(&self) -> &'static str {
            "canned"
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl NewsBackend for FailingBackend {
        async fn fetch_category(&self, _category: Category) -> anyhow::Result<Vec<NewsItem>> {
            anyhow::bail!("down")
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn service(fetcher: Arc<CannedFetcher>) -> NewsService {
        NewsService::new(
            fetcher,
            Arc::new(FailingBackend),
            Arc::new(KeywordTagger::default()),
        )
        .with_pacing(Duration::ZERO)
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_full_empty_map() {
        let fetcher = Arc::new(CannedFetcher {
            calls: Mutex::new(vec![]),
        });
        let svc = service(fetcher.clone());
        let sources = FeedSourceMap::new();
        let ctx = NewsContext {
            language: Language::En,
            sources: &sources,
        };
        let NewsResult::All(map) = svc.fetch_news(NewsRequest::default(), &ctx).await else {
            panic!("expected full map");
        };
        assert_eq!(map.len(), Category::ALL.len());
        assert!(map.values().all(Vec::is_empty));
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_language_overrides_context() {
        let fetcher = Arc::new(CannedFetcher {
            calls: Mutex::new(vec![]),
        });
        let svc = service(fetcher.clone());
        let mut sources = FeedSourceMap::new();
        sources.insert(
            Category::Tech,
            vec![FeedSource::new("Only", "https://only.test/rss")],
        );
        let ctx = NewsContext {
            language: Language::En,
            sources: &sources,
        };
        let req = NewsRequest {
            category: Some(Category::Tech),
            language: Some(Language::Zh),
        };
        let NewsResult::Category(items) = svc.fetch_news(req, &ctx).await else {
            panic!("expected one category");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "Only");
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["https://only.test/rss".to_string()]);
    }
}
