use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::ingest::feeds::{recommended_feeds, FeedSourceState};
use crate::ingest::types::{Category, FeedSource, FeedSourceMap, Language};
use crate::news::{NewsContext, NewsRequest, NewsResult, NewsService};
use crate::translate::{check_ollama_status, OllamaStatus, TranslationService};

/// What the dashboard currently shows: language and active feed sources.
#[derive(Debug, Clone)]
pub struct UiState {
    pub language: Language,
    pub feeds: FeedSourceState,
}

#[derive(Clone)]
pub struct AppState {
    news: Arc<NewsService>,
    translator: Arc<TranslationService>,
    ui: Arc<RwLock<UiState>>,
    feed_sources_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        news: Arc<NewsService>,
        translator: Arc<TranslationService>,
        ui: UiState,
        feed_sources_path: Option<PathBuf>,
    ) -> Self {
        Self {
            news,
            translator,
            ui: Arc::new(RwLock::new(ui)),
            feed_sources_path,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, UiState> {
        self.ui.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UiState> {
        self.ui.write().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, feeds: &FeedSourceState) {
        if let Some(path) = &self.feed_sources_path {
            if let Err(e) = feeds.save(path) {
                tracing::warn!(error = ?e, "failed to save feed sources");
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/news", get(get_news))
        .route("/api/feeds", get(get_feeds))
        .route("/api/feeds/reset", post(reset_feeds))
        .route("/api/feeds/recommended", get(get_recommended))
        .route(
            "/api/feeds/recommended/{category}/available",
            get(get_available_recommended),
        )
        .route("/api/feeds/{category}", post(add_feed).delete(remove_feed))
        .route("/api/feeds/{category}/reset", post(reset_category))
        .route("/api/feeds/{category}/recommended", post(add_recommended))
        .route("/api/language", get(get_language).put(put_language))
        .route("/api/translate", post(translate_batch))
        .route("/api/translate/status", get(translate_status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiError = (StatusCode, String);

fn bad_request(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn parse_category(raw: &str) -> Result<Category, ApiError> {
    raw.parse().map_err(bad_request)
}

#[derive(Debug, Deserialize)]
struct NewsQuery {
    category: Option<String>,
    lang: Option<String>,
}

async fn get_news(
    State(state): State<AppState>,
    Query(q): Query<NewsQuery>,
) -> Result<Json<NewsResult>, ApiError> {
    let req = NewsRequest {
        category: q.category.as_deref().map(parse_category).transpose()?,
        language: q
            .lang
            .as_deref()
            .map(str::parse::<Language>)
            .transpose()
            .map_err(bad_request)?,
    };

    // Snapshot so the lock is not held across the fetch.
    let (language, sources) = {
        let ui = state.read();
        (ui.language, ui.feeds.sources.clone())
    };
    let ctx = NewsContext {
        language,
        sources: &sources,
    };
    Ok(Json(state.news.fetch_news(req, &ctx).await))
}

async fn get_feeds(State(state): State<AppState>) -> Json<FeedSourceState> {
    Json(state.read().feeds.clone())
}

#[derive(Debug, Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

impl LangQuery {
    /// Explicit `?lang=` or the current UI language.
    fn resolve(&self, state: &AppState) -> Result<Language, ApiError> {
        match self.lang.as_deref() {
            Some(raw) => raw.parse().map_err(bad_request),
            None => Ok(state.read().language),
        }
    }
}

/// Built-in catalogue for a language (current UI language by default).
async fn get_recommended(
    State(state): State<AppState>,
    Query(q): Query<LangQuery>,
) -> Result<Json<FeedSourceMap>, ApiError> {
    Ok(Json(recommended_feeds(q.resolve(&state)?)))
}

async fn get_available_recommended(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(q): Query<LangQuery>,
) -> Result<Json<Vec<FeedSource>>, ApiError> {
    let category = parse_category(&category)?;
    let lang = q.resolve(&state)?;
    let available = state.read().feeds.available_recommended(category, lang);
    Ok(Json(available))
}

#[derive(Debug, Deserialize)]
struct RecommendedBody {
    name: String,
}

async fn add_recommended(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(q): Query<LangQuery>,
    Json(body): Json<RecommendedBody>,
) -> Result<(StatusCode, Json<FeedSourceState>), ApiError> {
    let category = parse_category(&category)?;
    let lang = q.resolve(&state)?;
    let (added, feeds) = {
        let mut ui = state.write();
        let added = ui.feeds.add_recommended(category, body.name.trim(), lang);
        (added, ui.feeds.clone())
    };
    match added {
        None => Err((
            StatusCode::NOT_FOUND,
            "not in the recommended catalogue".to_string(),
        )),
        Some(false) => Err((
            StatusCode::CONFLICT,
            "feed source already exists".to_string(),
        )),
        Some(true) => {
            state.persist(&feeds);
            Ok((StatusCode::CREATED, Json(feeds)))
        }
    }
}

async fn reset_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(q): Query<LangQuery>,
) -> Result<Json<FeedSourceState>, ApiError> {
    let category = parse_category(&category)?;
    let lang = q.resolve(&state)?;
    let feeds = {
        let mut ui = state.write();
        ui.feeds.reset_category(category, lang);
        ui.feeds.clone()
    };
    state.persist(&feeds);
    Ok(Json(feeds))
}

async fn add_feed(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(source): Json<FeedSource>,
) -> Result<(StatusCode, Json<FeedSourceState>), ApiError> {
    let category = parse_category(&category)?;
    let source = FeedSource::new(source.name.trim(), source.url.trim());
    if source.name.is_empty() || source.url.is_empty() {
        return Err(bad_request("name and url are required"));
    }

    let (added, feeds) = {
        let mut ui = state.write();
        let added = ui.feeds.add_source(category, source);
        (added, ui.feeds.clone())
    };
    if !added {
        return Err((
            StatusCode::CONFLICT,
            "feed source already exists".to_string(),
        ));
    }
    state.persist(&feeds);
    Ok((StatusCode::CREATED, Json(feeds)))
}

#[derive(Debug, Deserialize)]
struct RemoveQuery {
    url: String,
}

async fn remove_feed(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(q): Query<RemoveQuery>,
) -> Result<StatusCode, ApiError> {
    let category = parse_category(&category)?;
    let (removed, feeds) = {
        let mut ui = state.write();
        let removed = ui.feeds.remove_source(category, &q.url);
        (removed, ui.feeds.clone())
    };
    if !removed {
        return Err((StatusCode::NOT_FOUND, "no such feed source".to_string()));
    }
    state.persist(&feeds);
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_feeds(State(state): State<AppState>) -> Json<FeedSourceState> {
    let feeds = {
        let mut ui = state.write();
        ui.feeds.reset_to_defaults();
        ui.feeds.clone()
    };
    state.persist(&feeds);
    Json(feeds)
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguageBody {
    language: String,
}

async fn get_language(State(state): State<AppState>) -> Json<LanguageBody> {
    Json(LanguageBody {
        language: state.read().language.to_string(),
    })
}

async fn put_language(
    State(state): State<AppState>,
    Json(body): Json<LanguageBody>,
) -> Result<Json<LanguageBody>, ApiError> {
    let lang: Language = body.language.parse().map_err(bad_request)?;
    let feeds = {
        let mut ui = state.write();
        ui.language = lang;
        ui.feeds.set_language(lang);
        ui.feeds.clone()
    };
    state.persist(&feeds);
    tracing::info!(%lang, "language changed");
    Ok(Json(LanguageBody {
        language: lang.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct TranslateReq {
    texts: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TranslateResp {
    translations: Vec<String>,
}

async fn translate_batch(
    State(state): State<AppState>,
    Json(body): Json<TranslateReq>,
) -> Json<TranslateResp> {
    Json(TranslateResp {
        translations: state.translator.translate_batch(&body.texts).await,
    })
}

async fn translate_status(State(state): State<AppState>) -> Json<OllamaStatus> {
    let url = state.translator.config().ollama_url.clone();
    Json(check_ollama_status(&url).await)
}
