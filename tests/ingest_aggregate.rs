// tests/ingest_aggregate.rs
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::{http::StatusCode, routing::get, Router};
use situation_monitor::ingest::{aggregate_category, fetch_rss_news_for_category};
use situation_monitor::ingest::providers::rss_http::HttpFeedFetcher;
use situation_monitor::ingest::types::{Category, FeedFetcher, FeedSource, FetchError};
use situation_monitor::ingest::MAX_ITEMS_PER_CATEGORY;
use situation_monitor::tagger::KeywordTagger;

const TWO_ITEMS: &str = include_str!("fixtures/two_items.xml");
const NOT_A_FEED: &str = include_str!("fixtures/not_a_feed.html");

/// Serves one good feed, one HTML page and one 500 on an ephemeral port.
async fn spawn_feed_server() -> String {
    let app = Router::new()
        .route("/feed.xml", get(|| async { TWO_ITEMS }))
        .route("/page.html", get(|| async { NOT_A_FEED }))
        .route(
            "/broken.xml",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn failing_sources_do_not_affect_healthy_ones() {
    let base = spawn_feed_server().await;
    let fetcher = HttpFeedFetcher::new(None, Duration::from_secs(5)).unwrap();
    let sources = vec![
        FeedSource::new("Broken", format!("{base}/broken.xml")),
        FeedSource::new("Wire", format!("{base}/feed.xml")),
        FeedSource::new("Page", format!("{base}/page.html")),
    ];

    let report = aggregate_category(
        &fetcher,
        &KeywordTagger::default(),
        Category::Politics,
        Some(sources.as_slice()),
    )
    .await;

    assert_eq!(report.items.len(), 2);
    assert!(report.items.iter().all(|i| i.source == "Wire"));
    // Newest first.
    assert_eq!(report.items[0].link, "https://wire.example/border");

    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].source, "Broken");
    assert_eq!(report.failures[0].reason, "HTTP 500");
    assert_eq!(report.failures[1].source, "Page");
    assert_eq!(report.failures[1].reason, "document is not a feed");
}

/// Serves canned bodies keyed by url.
struct CannedFetcher {
    bodies: HashMap<String, String>,
}

#[async_trait]
impl FeedFetcher for CannedFetcher {
    async fn fetch_document(&self, source: &FeedSource) -> Result<String, FetchError> {
        self.bodies
            .get(&source.url)
            .cloned()
            .ok_or_else(|| FetchError::Transport("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

fn feed(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, date)| {
            format!("<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate></item>")
        })
        .collect();
    format!("<rss><channel>{body}</channel></rss>")
}

#[tokio::test]
async fn shared_links_collapse_to_the_newest_copy() {
    let mut bodies = HashMap::new();
    bodies.insert(
        "a".to_string(),
        feed(&[
            ("Shared early", "https://x.test/shared", "2024-01-01T00:00:00Z"),
            ("Only in A", "https://x.test/a", "2024-01-02T00:00:00Z"),
        ]),
    );
    bodies.insert(
        "b".to_string(),
        feed(&[("Shared late", "https://x.test/shared", "2024-01-03T00:00:00Z")]),
    );
    let fetcher = CannedFetcher { bodies };
    let sources = vec![FeedSource::new("A", "a"), FeedSource::new("B", "b")];

    let report = aggregate_category(
        &fetcher,
        &KeywordTagger::default(),
        Category::Finance,
        Some(sources.as_slice()),
    )
    .await;

    let titles: Vec<&str> = report.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Shared late", "Only in A"]);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn many_sources_are_capped_per_category() {
    let mut bodies = HashMap::new();
    let mut sources = Vec::new();
    for s in 0..4 {
        let items: Vec<(String, String, String)> = (0..10)
            .map(|i| {
                (
                    format!("s{s} n{i}"),
                    format!("https://x.test/{s}/{i}"),
                    format!("2024-02-{:02}T{:02}:00:00Z", s + 1, i),
                )
            })
            .collect();
        let refs: Vec<(&str, &str, &str)> = items
            .iter()
            .map(|(a, b, c)| (a.as_str(), b.as_str(), c.as_str()))
            .collect();
        bodies.insert(format!("src{s}"), feed(&refs));
        sources.push(FeedSource::new(format!("S{s}"), format!("src{s}")));
    }
    sources.push(FeedSource::new("Down", "unreachable"));
    let fetcher = CannedFetcher { bodies };

    let report = aggregate_category(
        &fetcher,
        &KeywordTagger::default(),
        Category::Tech,
        Some(sources.as_slice()),
    )
    .await;

    assert_eq!(report.items.len(), MAX_ITEMS_PER_CATEGORY);
    assert!(report
        .items
        .windows(2)
        .all(|w| w[0].timestamp >= w[1].timestamp));
    // The two newest sources fill the cap.
    assert!(report
        .items
        .iter()
        .all(|i| i.source == "S3" || i.source == "S2"));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].reason, "transport error: connection refused");
}

#[tokio::test]
async fn empty_source_list_yields_empty_report() {
    let fetcher = CannedFetcher {
        bodies: HashMap::new(),
    };
    let report = aggregate_category(
        &fetcher,
        &KeywordTagger::default(),
        Category::Gov,
        Some(&[][..]),
    )
    .await;
    assert!(report.items.is_empty());
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn item_only_wrapper_matches_report_items() {
    let mut bodies = HashMap::new();
    bodies.insert(
        "a".to_string(),
        feed(&[("Solo", "https://x.test/solo", "2024-01-01T00:00:00Z")]),
    );
    let fetcher = CannedFetcher { bodies };
    let sources = vec![FeedSource::new("A", "a"), FeedSource::new("Gone", "b")];

    let items = fetch_rss_news_for_category(
        &fetcher,
        &KeywordTagger::default(),
        Category::Ai,
        Some(sources.as_slice()),
    )
    .await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "rss-ai-A-0-1704067200000");
}

/// Answers every source after a fixed delay.
struct SlowFetcher {
    delay: Duration,
}

#[async_trait]
impl FeedFetcher for SlowFetcher {
    async fn fetch_document(&self, source: &FeedSource) -> Result<String, FetchError> {
        tokio::time::sleep(self.delay).await;
        Ok(feed(&[(source.name.as_str(), source.url.as_str(), "2024-01-01T00:00:00Z")]))
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test(start_paused = true)]
async fn sources_of_a_category_are_fetched_concurrently() {
    let fetcher = SlowFetcher {
        delay: Duration::from_secs(1),
    };
    let sources: Vec<FeedSource> = (0..3)
        .map(|i| FeedSource::new(format!("S{i}"), format!("https://slow.test/{i}")))
        .collect();

    let start = tokio::time::Instant::now();
    let report = aggregate_category(
        &fetcher,
        &KeywordTagger::default(),
        Category::Politics,
        Some(sources.as_slice()),
    )
    .await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(1), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
    assert_eq!(report.items.len(), 3);
    let mut names: Vec<&str> = report.items.iter().map(|i| i.source.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["S0", "S1", "S2"]);
}
