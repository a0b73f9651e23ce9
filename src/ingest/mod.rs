// src/ingest/mod.rs
pub mod decode;
pub mod feeds;
pub mod providers;
pub mod types;

use crate::ingest::types::{
    Category, FeedFetcher, FeedSource, Language, NewsItem, SourceFailure, SourceOutcome,
};
use crate::tagger::KeywordTagger;
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashSet;

/// Post-merge cap per category.
pub const MAX_ITEMS_PER_CATEGORY: usize = 20;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Items decoded from feed documents.");
        describe_counter!(
            "ingest_kept_total",
            "Items kept after merge, dedup and truncation."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Items removed because their link was already seen."
        );
        describe_counter!(
            "ingest_source_failures_total",
            "Sources that contributed nothing, by reason."
        );
        describe_counter!(
            "news_backend_failures_total",
            "JSON news backend requests that failed."
        );
        describe_counter!(
            "translation_cache_hits_total",
            "Headline translations served from cache."
        );
        describe_counter!(
            "translation_failures_total",
            "Headline translations that fell back to the original."
        );
        describe_histogram!("ingest_parse_ms", "Feed decode time in milliseconds.");
        describe_gauge!(
            "ingest_category_pacing_ms",
            "Delay between categories on the RSS path."
        );
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when a category aggregation last finished."
        );
    });
}

/// Fetch and decode one source. Every failure is converted into
/// `SourceOutcome::Failed`; nothing escapes this boundary.
pub async fn fetch_source(
    fetcher: &dyn FeedFetcher,
    tagger: &KeywordTagger,
    source: &FeedSource,
    category: Category,
) -> SourceOutcome {
    let decoded = match fetcher.fetch_document(source).await {
        Ok(body) => decode::decode_feed(&body, &source.name, category, tagger),
        Err(e) => Err(e),
    };
    match decoded {
        Ok(items) => SourceOutcome::Ok(items),
        Err(e) => {
            let fetcher_name = fetcher.name();
            tracing::warn!(
                target: "ingest",
                fetcher = fetcher_name,
                source = %source.name,
                url = %source.url,
                %category,
                error = %e,
                "feed source failed"
            );
            counter!(
                "ingest_source_failures_total",
                "reason" => e.kind(),
                "fetcher" => fetcher_name
            )
            .increment(1);
            SourceOutcome::Failed(e)
        }
    }
}

/// Sort by timestamp descending (stable), drop repeated links keeping the
/// first, truncate to `limit`. Returns the kept items and the number of
/// duplicates removed.
pub fn merge_sort_dedup(mut items: Vec<NewsItem>, limit: usize) -> (Vec<NewsItem>, usize) {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut seen: HashSet<String> = HashSet::new();
    let mut dedup_out = 0usize;
    let mut unique = Vec::with_capacity(items.len().min(limit));
    for item in items {
        if !seen.insert(item.link.clone()) {
            dedup_out += 1;
            continue;
        }
        unique.push(item);
    }
    unique.truncate(limit);
    (unique, dedup_out)
}

/// Result of one category aggregation: the merged items plus the sources
/// that failed and why.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub items: Vec<NewsItem>,
    pub failures: Vec<SourceFailure>,
}

/// Fetch every source of a category concurrently, then merge, dedup, sort
/// and cap. Never fails; with no sources or all sources failing the item
/// list is empty. `None` uses the default Chinese feed table.
pub async fn aggregate_category(
    fetcher: &dyn FeedFetcher,
    tagger: &KeywordTagger,
    category: Category,
    sources: Option<&[FeedSource]>,
) -> CategoryReport {
    ensure_metrics_described();

    let defaults;
    let sources = match sources {
        Some(s) => s,
        None => {
            defaults = feeds::default_feeds(Language::Zh);
            defaults.get(&category).map(Vec::as_slice).unwrap_or(&[])
        }
    };

    if sources.is_empty() {
        tracing::warn!(target: "ingest", %category, "no feeds configured");
        return CategoryReport {
            category,
            items: Vec::new(),
            failures: Vec::new(),
        };
    }

    let outcomes = join_all(
        sources
            .iter()
            .map(|s| fetch_source(fetcher, tagger, s, category)),
    )
    .await;

    let mut raw = Vec::new();
    let mut failures = Vec::new();
    for (source, outcome) in sources.iter().zip(outcomes) {
        match outcome {
            SourceOutcome::Ok(mut items) => raw.append(&mut items),
            SourceOutcome::Failed(e) => failures.push(SourceFailure {
                source: source.name.clone(),
                url: source.url.clone(),
                reason: e.to_string(),
            }),
        }
    }

    let (items, dedup_cnt) = merge_sort_dedup(raw, MAX_ITEMS_PER_CATEGORY);

    counter!("ingest_kept_total").increment(items.len() as u64);
    counter!("ingest_dedup_total").increment(dedup_cnt as u64);
    gauge!("ingest_pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

    tracing::info!(
        target: "ingest",
        %category,
        sources = sources.len(),
        failed = failures.len(),
        kept = items.len(),
        dedup = dedup_cnt,
        "category aggregated"
    );

    CategoryReport {
        category,
        items,
        failures,
    }
}

/// Convenience wrapper returning only the items.
pub async fn fetch_rss_news_for_category(
    fetcher: &dyn FeedFetcher,
    tagger: &KeywordTagger,
    category: Category,
    sources: Option<&[FeedSource]>,
) -> Vec<NewsItem> {
    aggregate_category(fetcher, tagger, category, sources)
        .await
        .items
}
