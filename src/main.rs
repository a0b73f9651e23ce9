//! Situation Monitor news service: binary entrypoint.
//! Boots the Axum HTTP server, wiring the ingest pipeline, shared UI state
//! and the Prometheus endpoint.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use situation_monitor::api::{self, AppState, UiState};
use situation_monitor::config::{AppConfig, TranslationConfig};
use situation_monitor::ingest::feeds::FeedSourceState;
use situation_monitor::ingest::providers::{gdelt::GdeltBackend, rss_http::HttpFeedFetcher};
use situation_monitor::metrics::Metrics;
use situation_monitor::news::NewsService;
use situation_monitor::tagger::KeywordTagger;
use situation_monitor::translate::TranslationService;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("situation_monitor=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env()?;
    let tagger = Arc::new(KeywordTagger::load_default().context("loading keyword table")?);

    let fetcher = Arc::new(HttpFeedFetcher::new(
        cfg.rss_proxy_url.clone(),
        cfg.fetch_timeout,
    )?);
    let backend = Arc::new(GdeltBackend::new(tagger.clone(), cfg.fetch_timeout)?);
    let news = Arc::new(NewsService::new(fetcher, backend, tagger).with_pacing(cfg.pacing));

    let translation = TranslationConfig::load_or_default(&cfg.translation_config_path);
    let translator = Arc::new(TranslationService::new(
        translation,
        Some(cfg.translation_cache_path.clone()),
    )?);

    let feeds = FeedSourceState::load(&cfg.feed_sources_path, cfg.default_language);
    let ui = UiState {
        language: cfg.default_language,
        feeds,
    };
    let state = AppState::new(news, translator, ui, Some(cfg.feed_sources_path.clone()));

    let metrics = Metrics::init(cfg.pacing.as_millis() as u64)?;
    let app = api::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, language = %cfg.default_language, "situation monitor listening");

    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
