//! # Headline Translation
//!
//! Optional translation of headlines through a local LLM (Ollama) or a
//! LibreTranslate instance, with a JSON-persisted cache.
//!
//! - Cache key is `"{text}::{lang}"`; entries expire after 30 days.
//! - Saving prunes the cache to the 500 most recent entries once it grows
//!   past 1000.
//! - Any provider failure returns the original text.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::config::{TranslationConfig, TranslationProvider};

pub const CACHE_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1000;
const CACHE_PRUNE_ABOVE: usize = 1000;
const CACHE_KEEP: usize = 500;
const BATCH_SIZE: usize = 3;
const BATCH_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub translated: String,
    /// Epoch ms when stored.
    pub timestamp: i64,
    pub target_lang: String,
}

#[derive(Debug, Default, Clone)]
pub struct TranslationCache {
    entries: HashMap<String, CacheEntry>,
}

fn cache_key(text: &str, lang: &str) -> String {
    format!("{text}::{lang}")
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl TranslationCache {
    /// Load from disk, dropping expired entries. Missing or invalid files
    /// yield an empty cache.
    pub fn load(path: &Path, now: i64) -> Self {
        let Ok(s) = fs::read_to_string(path) else {
            return Self::default();
        };
        let entries: HashMap<String, CacheEntry> = match serde_json::from_str(&s) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "invalid translation cache");
                return Self::default();
            }
        };
        Self {
            entries: entries
                .into_iter()
                .filter(|(_, v)| now - v.timestamp < CACHE_TTL_MS)
                .collect(),
        }
    }

    pub fn get(&self, text: &str, lang: &str, now: i64) -> Option<&str> {
        self.entries
            .get(&cache_key(text, lang))
            .filter(|e| e.target_lang == lang && now - e.timestamp < CACHE_TTL_MS)
            .map(|e| e.translated.as_str())
    }

    pub fn insert(&mut self, text: &str, translated: &str, lang: &str, now: i64) {
        self.entries.insert(
            cache_key(text, lang),
            CacheEntry {
                translated: translated.to_string(),
                timestamp: now,
                target_lang: lang.to_string(),
            },
        );
    }

    /// Keep only the most recent entries once the cache is oversized.
    pub fn prune(&mut self) {
        if self.entries.len() <= CACHE_PRUNE_ABOVE {
            return;
        }
        let mut all: Vec<_> = self.entries.drain().collect();
        all.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));
        all.truncate(CACHE_KEEP);
        self.entries = all.into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }
}

async fn write_cache(path: &Path, body: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

/// One translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(30))
        .build()
        .context("building translation http client")
}

fn language_name(code: &str) -> &str {
    match code {
        "zh" => "中文",
        "en" => "English",
        other => other,
    }
}

pub struct OllamaTranslator {
    http: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaTranslator {
    pub fn new(url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Options {
            temperature: f32,
            num_predict: u32,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            prompt: String,
            stream: bool,
            options: Options,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            response: Option<String>,
        }

        let prompt = format!(
            "Translate the following news headline to {}. Only return the translation, no explanation:\n\n{}",
            language_name(target_lang),
            text
        );
        let req = Req {
            model: &self.model,
            prompt,
            stream: false,
            options: Options {
                temperature: 0.3,
                num_predict: 200,
            },
        };

        let resp = self
            .http
            .post(format!("{}/api/generate", self.url))
            .json(&req)
            .send()
            .await
            .context("ollama generate")?;
        if !resp.status().is_success() {
            bail!("Ollama error: HTTP {}", resp.status().as_u16());
        }
        let body: Resp = resp.json().await.context("ollama response json")?;
        Ok(body
            .response
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| text.to_string()))
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

pub struct LibreTranslator {
    http: reqwest::Client,
    url: String,
    source_lang: String,
}

impl LibreTranslator {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            url: url.trim_end_matches('/').to_string(),
            source_lang: "en".to_string(),
        })
    }
}

#[async_trait]
impl Translator for LibreTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default, rename = "translatedText")]
            translated_text: Option<String>,
        }

        let resp = self
            .http
            .post(format!("{}/translate", self.url))
            .json(&serde_json::json!({
                "q": text,
                "source": self.source_lang,
                "target": target_lang,
                "format": "text",
            }))
            .send()
            .await
            .context("libretranslate translate")?;
        if !resp.status().is_success() {
            bail!("LibreTranslate error: HTTP {}", resp.status().as_u16());
        }
        let body: Resp = resp.json().await.context("libretranslate response json")?;
        Ok(body
            .translated_text
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| text.to_string()))
    }

    fn name(&self) -> &'static str {
        "libretranslate"
    }
}

/// Result of probing a local Ollama instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OllamaStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn check_ollama_status(url: &str) -> OllamaStatus {
    #[derive(Deserialize)]
    struct Tags {
        #[serde(default)]
        models: Vec<Model>,
    }
    #[derive(Deserialize)]
    struct Model {
        name: String,
    }

    let unavailable = |error: String| OllamaStatus {
        available: false,
        models: None,
        error: Some(error),
    };

    let client = match http_client() {
        Ok(c) => c,
        Err(e) => return unavailable(format!("{e:#}")),
    };
    let resp = match client
        .get(format!("{}/api/tags", url.trim_end_matches('/')))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => return unavailable(e.to_string()),
    };
    if !resp.status().is_success() {
        return unavailable(format!("HTTP {}", resp.status().as_u16()));
    }
    match resp.json::<Tags>().await {
        Ok(tags) => OllamaStatus {
            available: true,
            models: Some(tags.models.into_iter().map(|m| m.name).collect()),
            error: None,
        },
        Err(e) => unavailable(e.to_string()),
    }
}

fn build_translator(config: &TranslationConfig) -> Result<Option<Arc<dyn Translator>>> {
    let translator: Arc<dyn Translator> = match config.provider {
        TranslationProvider::Ollama => Arc::new(OllamaTranslator::new(
            &config.ollama_url,
            &config.ollama_model,
        )?),
        TranslationProvider::Libretranslate => {
            Arc::new(LibreTranslator::new(&config.libretranslate_url)?)
        }
        TranslationProvider::None => return Ok(None),
    };
    Ok(Some(translator))
}

pub struct TranslationService {
    config: TranslationConfig,
    translator: Option<Arc<dyn Translator>>,
    cache: Mutex<TranslationCache>,
    cache_path: Option<PathBuf>,
    /// Serializes cache writes so the file always holds the newest snapshot.
    save_lock: tokio::sync::Mutex<()>,
}

impl TranslationService {
    /// Build from config; the cache is loaded from `cache_path` when given.
    pub fn new(config: TranslationConfig, cache_path: Option<PathBuf>) -> Result<Self> {
        let translator = build_translator(&config)?;
        Ok(Self::with_translator(config, translator, cache_path))
    }

    pub fn with_translator(
        config: TranslationConfig,
        translator: Option<Arc<dyn Translator>>,
        cache_path: Option<PathBuf>,
    ) -> Self {
        let cache = cache_path
            .as_deref()
            .map(|p| TranslationCache::load(p, now_ms()))
            .unwrap_or_default();
        Self {
            config,
            translator,
            cache: Mutex::new(cache),
            cache_path,
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn cached(&self, text: &str) -> Option<String> {
        let cache = self.cache.lock().ok()?;
        let hit = cache
            .get(text, &self.config.target_language, now_ms())
            .map(str::to_string);
        hit
    }

    async fn store(&self, text: &str, translated: &str) {
        {
            let Ok(mut cache) = self.cache.lock() else {
                return;
            };
            cache.insert(text, translated, &self.config.target_language, now_ms());
            cache.prune();
        }
        let Some(path) = &self.cache_path else {
            return;
        };

        let _guard = self.save_lock.lock().await;
        let body = match self.cache.lock() {
            Ok(cache) => cache.to_json(),
            Err(_) => return,
        };
        let saved = match body {
            Ok(body) => write_cache(path, &body).await,
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            tracing::warn!(error = ?e, "failed to save translation cache");
        }
    }

    fn passthrough(&self) -> bool {
        !self.config.enabled || self.config.target_language == "en"
    }

    pub async fn translate(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }
        if let Some(hit) = self.cached(text) {
            counter!("translation_cache_hits_total").increment(1);
            return hit;
        }
        if self.passthrough() {
            return text.to_string();
        }
        let Some(translator) = &self.translator else {
            return text.to_string();
        };

        match translator
            .translate(text, &self.config.target_language)
            .await
        {
            Ok(translated) => {
                self.store(text, &translated).await;
                translated
            }
            Err(e) => {
                tracing::warn!(provider = translator.name(), error = ?e, "translation failed");
                counter!("translation_failures_total").increment(1);
                text.to_string()
            }
        }
    }

    /// Translate in small concurrent groups with a short pause between
    /// groups. Output order matches input order.
    pub async fn translate_batch(&self, texts: &[String]) -> Vec<String> {
        if self.passthrough() {
            return texts.to_vec();
        }
        let mut out = Vec::with_capacity(texts.len());
        for (i, chunk) in texts.chunks(BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }
            out.extend(join_all(chunk.iter().map(|t| self.translate(t))).await);
        }
        out
    }
}
