//! # Keyword Tagger
//!
//! Classifies item text into an alert flag, a coarse region and a list of
//! topic tags. The classification data is a plain table that can be loaded
//! from TOML or JSON; the tagger itself only does case-insensitive substring
//! matching against it.
//!
//! Lookup order:
//! 1) `$KEYWORDS_PATH`
//! 2) `config/keywords.toml`
//! 3) `config/keywords.json`
//! 4) built-in `default_table()`

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "KEYWORDS_PATH";

/// Named group of keywords (a region or a topic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Classification table. Order matters: the first alert keyword and the
/// first region that match win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTable {
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub regions: Vec<KeywordGroup>,
    #[serde(default)]
    pub topics: Vec<KeywordGroup>,
}

/// Result of the alert check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlertMatch {
    pub is_alert: bool,
    pub keyword: Option<String>,
}

/// Everything the tagger derives from one text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tags {
    pub alert: AlertMatch,
    pub region: Option<String>,
    pub topics: Vec<String>,
}

/// Lowercased copy of a `KeywordTable`, ready for matching.
#[derive(Debug, Clone)]
pub struct KeywordTagger {
    alerts: Vec<(String, String)>,
    regions: Vec<(String, Vec<String>)>,
    topics: Vec<(String, Vec<String>)>,
}

impl Default for KeywordTagger {
    fn default() -> Self {
        Self::new(default_table())
    }
}

impl KeywordTagger {
    pub fn new(table: KeywordTable) -> Self {
        let lower_group = |g: KeywordGroup| {
            let kws = g
                .keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            (g.name, kws)
        };
        Self {
            alerts: table
                .alerts
                .into_iter()
                .filter(|k| !k.trim().is_empty())
                .map(|k| (k.trim().to_lowercase(), k))
                .collect(),
            regions: table.regions.into_iter().map(lower_group).collect(),
            topics: table.topics.into_iter().map(lower_group).collect(),
        }
    }

    /// Load using env var + fallbacks (see module docs).
    pub fn load_default() -> Result<Self> {
        Ok(Self::new(load_table_default()?))
    }

    pub fn contains_alert_keyword(&self, text: &str) -> AlertMatch {
        let hay = text.to_lowercase();
        self.alerts
            .iter()
            .find(|(needle, _)| hay.contains(needle.as_str()))
            .map(|(_, original)| AlertMatch {
                is_alert: true,
                keyword: Some(original.clone()),
            })
            .unwrap_or_default()
    }

    pub fn detect_region(&self, text: &str) -> Option<String> {
        let hay = text.to_lowercase();
        self.regions
            .iter()
            .find(|(_, kws)| kws.iter().any(|k| hay.contains(k.as_str())))
            .map(|(name, _)| name.clone())
    }

    pub fn detect_topics(&self, text: &str) -> Vec<String> {
        let hay = text.to_lowercase();
        self.topics
            .iter()
            .filter(|(_, kws)| kws.iter().any(|k| hay.contains(k.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn classify(&self, text: &str) -> Tags {
        Tags {
            alert: self.contains_alert_keyword(text),
            region: self.detect_region(text),
            topics: self.detect_topics(text),
        }
    }
}

/// Load the table from an explicit path. Supports TOML or JSON.
pub fn load_table_from(path: &Path) -> Result<KeywordTable> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading keyword table from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_table(&content, &ext)
}

pub fn load_table_default() -> Result<KeywordTable> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_table_from(&pb);
        }
        return Err(anyhow!("{ENV_PATH} points to non-existent path"));
    }
    for candidate in ["config/keywords.toml", "config/keywords.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_table_from(&p);
        }
    }
    Ok(default_table())
}

fn parse_table(s: &str, hint_ext: &str) -> Result<KeywordTable> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing keyword table json");
    }
    match toml::from_str(s) {
        Ok(t) => Ok(t),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported keyword table format: {toml_err}")),
    }
}

fn group(name: &str, keywords: &[&str]) -> KeywordGroup {
    KeywordGroup {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

/// Built-in table covering the dashboard's geopolitical focus.
pub fn default_table() -> KeywordTable {
    let alerts = [
        "war",
        "invasion",
        "military",
        "nuclear",
        "sanctions",
        "missile",
        "attack",
        "troops",
        "conflict",
        "strike",
        "bomb",
        "casualties",
        "ceasefire",
        "treaty",
        "nato",
        "coup",
        "martial law",
        "emergency",
        "assassination",
        "terrorist",
        "hostage",
        "evacuation",
    ];

    KeywordTable {
        alerts: alerts.iter().map(|s| s.to_string()).collect(),
        regions: vec![
            group(
                "EUROPE",
                &["nato", "eu ", "european", "ukraine", "russia", "germany", "france", "uk ", "britain", "poland"],
            ),
            group(
                "MENA",
                &["iran", "israel", "saudi", "syria", "iraq", "gaza", "lebanon", "yemen", "houthi", "middle east"],
            ),
            group(
                "APAC",
                &["china", "taiwan", "japan", "korea", "indo-pacific", "south china sea", "asean", "philippines"],
            ),
            group(
                "AMERICAS",
                &["us ", "america", "canada", "mexico", "brazil", "venezuela", "latin"],
            ),
            group(
                "AFRICA",
                &["africa", "sahel", "niger", "sudan", "ethiopia", "somalia"],
            ),
        ],
        topics: vec![
            group("CYBER", &["cyber", "hack", "ransomware", "malware", "breach", "apt", "vulnerability"]),
            group("NUCLEAR", &["nuclear", "icbm", "warhead", "enrichment", "uranium", "plutonium"]),
            group("CONFLICT", &["war", "military", "troops", "invasion", "strike", "missile", "combat", "offensive"]),
            group("INTEL", &["intelligence", "espionage", "spy", "cia", "mi6", "mossad"]),
            group("DEFENSE", &["pentagon", "dod", "defense", "military", "army", "navy", "air force"]),
            group("DIPLO", &["diplomat", "embassy", "summit", "sanctions", "bilateral", "treaty"]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    fn invasion_only() -> KeywordTagger {
        KeywordTagger::new(KeywordTable {
            alerts: vec!["invasion".into()],
            regions: vec![],
            topics: vec![],
        })
    }

    #[test]
    fn alert_keyword_is_reported() {
        let t = invasion_only();
        let m = t.contains_alert_keyword("Border invasion reported");
        assert!(m.is_alert);
        assert_eq!(m.keyword.as_deref(), Some("invasion"));
    }

    #[test]
    fn no_match_yields_no_alert() {
        let t = invasion_only();
        let m = t.contains_alert_keyword("Quarterly earnings beat estimates");
        assert_eq!(m, AlertMatch::default());
    }

    #[test]
    fn region_and_topics_are_case_insensitive() {
        let t = KeywordTagger::default();
        let tags = t.classify("TAIWAN strait drills as Cyber units stand by");
        assert_eq!(tags.region.as_deref(), Some("APAC"));
        assert!(tags.topics.contains(&"CYBER".to_string()));
    }

    #[test]
    fn toml_and_json_tables_parse() {
        let toml = r#"
alerts = ["coup"]
[[regions]]
name = "AFRICA"
keywords = ["sahel"]
"#;
        let t = parse_table(toml, "toml").unwrap();
        assert_eq!(t.alerts, vec!["coup".to_string()]);
        assert_eq!(t.regions[0].name, "AFRICA");
        assert!(t.topics.is_empty());

        let json = r#"{"alerts":["strike"],"topics":[{"name":"X","keywords":["y"]}]}"#;
        let j = parse_table(json, "json").unwrap();
        assert_eq!(j.topics[0].keywords, vec!["y".to_string()]);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_builtin() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        assert_eq!(load_table_default().unwrap(), default_table());

        let p = tmp.path().join("kw.json");
        fs::write(&p, r#"{"alerts":["x"]}"#).unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        assert_eq!(load_table_default().unwrap().alerts, vec!["x".to_string()]);

        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_table_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
