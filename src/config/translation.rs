// src/config/translation.rs
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    Ollama,
    Libretranslate,
    None,
}

fn default_provider() -> TranslationProvider {
    TranslationProvider::Ollama
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "qwen2.5:3b".to_string()
}
fn default_libretranslate_url() -> String {
    "https://libretranslate.de".to_string()
}
fn default_target_language() -> String {
    "zh".to_string()
}

/// Headline translation settings. Every field has a default, so a partial
/// file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationConfig {
    #[serde(default = "default_provider")]
    pub provider: TranslationProvider,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    #[serde(default = "default_libretranslate_url")]
    pub libretranslate_url: String,
    #[serde(default)]
    pub enabled: bool,
    /// "zh" | "en" | any code the provider understands.
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
            libretranslate_url: default_libretranslate_url(),
            enabled: false,
            target_language: default_target_language(),
        }
    }
}

impl TranslationConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: TranslationConfig = serde_json::from_str(&data)?;

        // Normalize
        cfg.target_language = cfg.target_language.trim().to_lowercase();
        if cfg.target_language.is_empty() {
            cfg.target_language = default_target_language();
        }
        cfg.ollama_url = cfg.ollama_url.trim_end_matches('/').to_string();
        cfg.libretranslate_url = cfg.libretranslate_url.trim_end_matches('/').to_string();

        Ok(cfg)
    }

    /// Missing or invalid files fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(error = %e, path = %path.display(), "invalid translation config, using defaults");
                }
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("translation.json");
        fs::write(
            &p,
            r#"{"enabled":true,"provider":"libretranslate","targetLanguage":" ZH ","ollamaUrl":"http://gpu:11434/"}"#,
        )
        .unwrap();
        let cfg = TranslationConfig::load_from_file(&p).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.provider, TranslationProvider::Libretranslate);
        assert_eq!(cfg.target_language, "zh");
        assert_eq!(cfg.ollama_url, "http://gpu:11434");
        assert_eq!(cfg.ollama_model, "qwen2.5:3b");
    }

    #[test]
    fn missing_or_broken_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            TranslationConfig::load_or_default(dir.path().join("nope.json")),
            TranslationConfig::default()
        );
        let p = dir.path().join("bad.json");
        fs::write(&p, "{not json").unwrap();
        assert_eq!(TranslationConfig::load_or_default(&p), TranslationConfig::default());
    }
}
