// src/ingest/feeds.rs
//! Built-in feed tables and the user-editable source set.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::ingest::types::{Category, FeedSource, FeedSourceMap, Language};

type Table = &'static [(&'static str, &'static str)];

const EN_POLITICS: Table = &[
    ("BBC World", "https://feeds.bbci.co.uk/news/world/rss.xml"),
    ("NPR News", "https://feeds.npr.org/1001/rss.xml"),
    ("Guardian World", "https://www.theguardian.com/world/rss"),
    ("NYT World", "https://rss.nytimes.com/services/xml/rss/nyt/World.xml"),
    ("Politico", "https://www.politico.com/rss/politics.xml"),
    ("The Hill", "https://thehill.com/homenews/feed/"),
    ("PBS NewsHour", "https://www.pbs.org/newshour/feeds/rss/politics"),
    ("Axios", "https://api.axios.com/feed/politics/"),
];
const EN_TECH: Table = &[
    ("Hacker News", "https://hnrss.org/frontpage"),
    ("Ars Technica", "https://feeds.arstechnica.com/arstechnica/technology-lab"),
    ("The Verge", "https://www.theverge.com/rss/index.xml"),
    ("MIT Tech Review", "https://www.technologyreview.com/feed/"),
    ("ArXiv AI", "https://rss.arxiv.org/rss/cs.AI"),
    ("OpenAI Blog", "https://openai.com/news/rss.xml"),
    ("TechCrunch", "https://techcrunch.com/feed/"),
    ("WIRED", "https://www.wired.com/feed/rss"),
];
const EN_FINANCE: Table = &[
    ("CNBC", "https://www.cnbc.com/id/100003114/device/rss/rss.html"),
    ("MarketWatch", "https://feeds.marketwatch.com/marketwatch/topstories"),
    ("Yahoo Finance", "https://finance.yahoo.com/news/rssindex"),
    ("BBC Business", "https://feeds.bbci.co.uk/news/business/rss.xml"),
    ("FT", "https://www.ft.com/rss/home"),
    ("Bloomberg", "https://feeds.bloomberg.com/markets/news.rss"),
    ("WSJ", "https://feeds.a.dj.com/rss/RSSMarketsMain.xml"),
];
const EN_GOV: Table = &[
    ("White House", "https://www.whitehouse.gov/news/feed/"),
    ("Federal Reserve", "https://www.federalreserve.gov/feeds/press_all.xml"),
    ("SEC Announcements", "https://www.sec.gov/news/pressreleases.rss"),
    (
        "DoD News",
        "https://www.defense.gov/DesktopModules/ArticleCS/RSS.ashx?max=10&ContentType=1&Site=945",
    ),
    ("GAO", "https://www.gao.gov/rss/reports.xml"),
    ("US Courts", "https://www.uscourts.gov/rss/news.xml"),
];
const EN_AI: Table = &[
    ("OpenAI Blog", "https://openai.com/news/rss.xml"),
    ("ArXiv AI", "https://rss.arxiv.org/rss/cs.AI"),
    ("MIT AI", "https://www.technologyreview.com/topic/artificial-intelligence/feed/"),
    ("Hugging Face", "https://huggingface.co/blog/feed.xml"),
    ("ArXiv ML", "https://rss.arxiv.org/rss/cs.LG"),
];
const EN_INTEL: Table = &[
    ("CSIS", "https://www.csis.org/analysis/feed"),
    ("Brookings", "https://www.brookings.edu/feed/"),
    ("CFR", "https://www.cfr.org/rss.xml"),
    ("Atlantic Council", "https://www.atlanticcouncil.org/feed/"),
    ("Defense One", "https://www.defenseone.com/rss/all/"),
    ("War on the Rocks", "https://warontherocks.com/feed/"),
    ("The Diplomat", "https://thediplomat.com/feed/"),
    ("Breaking Defense", "https://breakingdefense.com/feed/"),
];

const ZH_POLITICS: Table = &[
    (
        "路透",
        "https://www.reutersagency.com/feed/?best-topics=politicalgeneral&post_type=reuters-best",
    ),
    ("法广中文", "https://www.rfi.fr/cn/rss.xml"),
    ("美国之音", "https://www.voanews.com/rss/?language=zh-CN"),
    ("德国之声", "https://www.dw.com/zh/rss.xml"),
    ("ABC中文", "https://www.abc.net.au/news/chinese/rss.xml"),
    ("BBC国际", "https://feeds.bbci.co.uk/news/world/rss.xml"),
];
const ZH_TECH: Table = &[
    ("Solidot", "https://www.solidot.org/feed/"),
    ("TechCrunch", "https://techcrunch.com/feed/"),
    ("The Verge", "https://www.theverge.com/rss/index.xml"),
    ("Ars Technica", "https://feeds.arstechnica.com/arstechnica/index"),
    ("Wired", "https://www.wired.com/feed/rss"),
    ("TechRadar", "https://www.techradar.com/rss"),
    ("The Register", "https://www.theregister.com/headlines.rss"),
    ("MIT科技评论", "https://www.technologyreview.com/feed/"),
];
const ZH_FINANCE: Table = &[
    (
        "路透",
        "https://www.reutersagency.com/feed/?taxonomy=markets&post_type=reuters-best",
    ),
    ("CNBC", "https://www.cnbc.com/id/100003114/device/rss/rss.html"),
    ("MarketWatch", "https://feeds.content.dowjones.io/public/rss/mw_topstories"),
    ("Investing.com", "https://www.investing.com/rss/news.rss"),
    ("Yahoo财经", "https://finance.yahoo.com/news/rssindex"),
    ("Economist", "https://www.economist.com/finance-and-economics/rss.xml"),
];
const ZH_GOV: Table = &[
    ("香港政府", "https://www.info.gov.hk/gia/rss.xml"),
    ("澳门政府", "https://www.gcs.gov.mo/rss.xml"),
    ("白宫", "https://www.whitehouse.gov/news/feed/"),
    ("美联储", "https://www.federalreserve.gov/feeds/press_all.xml"),
    ("联合国", "https://news.un.org/feed/subscribe/zh/news/all/rss.xml"),
    ("世界银行", "https://www.worldbank.org/en/news/rss.xml"),
];
const ZH_AI: Table = &[
    ("MIT AI", "https://www.technologyreview.com/topic/artificial-intelligence/feed/"),
    ("Google AI", "https://ai.googleblog.com/feeds/posts/default"),
    ("Anthropic", "https://www.anthropic.com/blog/rss.xml"),
    ("OpenAI", "https://openai.com/news/rss.xml"),
    ("ArXiv AI", "https://rss.arxiv.org/rss/cs.AI"),
    ("Hugging Face", "https://huggingface.co/blog/feed.xml"),
];
const ZH_INTEL: Table = &[
    ("法广中文", "https://www.rfi.fr/cn/rss.xml"),
    ("美国之音", "https://www.voanews.com/rss/?language=zh-CN"),
    ("德国之声", "https://www.dw.com/zh/rss.xml"),
    ("The Diplomat", "https://thediplomat.com/feed/"),
    ("Foreign Policy", "https://foreignpolicy.com/feed/"),
    ("Defense One", "https://www.defenseone.com/rss/all/"),
];

fn table_for(lang: Language, category: Category) -> Table {
    match (lang, category) {
        (Language::En, Category::Politics) => EN_POLITICS,
        (Language::En, Category::Tech) => EN_TECH,
        (Language::En, Category::Finance) => EN_FINANCE,
        (Language::En, Category::Gov) => EN_GOV,
        (Language::En, Category::Ai) => EN_AI,
        (Language::En, Category::Intel) => EN_INTEL,
        (Language::Zh, Category::Politics) => ZH_POLITICS,
        (Language::Zh, Category::Tech) => ZH_TECH,
        (Language::Zh, Category::Finance) => ZH_FINANCE,
        (Language::Zh, Category::Gov) => ZH_GOV,
        (Language::Zh, Category::Ai) => ZH_AI,
        (Language::Zh, Category::Intel) => ZH_INTEL,
    }
}

/// How many recommended entries the default set takes per category.
fn default_take(lang: Language, category: Category) -> usize {
    match (lang, category) {
        (Language::En, Category::Tech) => 6,
        (Language::En, Category::Finance) => 5,
        (Language::En, Category::Ai | Category::Intel) => 2,
        (Language::En, _) => 4,
        (Language::Zh, Category::Tech) => 6,
        (Language::Zh, Category::Finance) => 5,
        (Language::Zh, _) => 4,
    }
}

fn build(lang: Language, take: impl Fn(Category) -> usize) -> FeedSourceMap {
    Category::ALL
        .into_iter()
        .map(|c| {
            let list = table_for(lang, c)
                .iter()
                .take(take(c))
                .map(|(name, url)| FeedSource::new(*name, *url))
                .collect();
            (c, list)
        })
        .collect()
}

/// Full recommended table for a language.
pub fn recommended_feeds(lang: Language) -> FeedSourceMap {
    build(lang, |_| usize::MAX)
}

/// Default active sources for a language. Every category key is present.
pub fn default_feeds(lang: Language) -> FeedSourceMap {
    build(lang, |c| default_take(lang, c))
}

/// User-editable feed sources, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSourceState {
    pub sources: FeedSourceMap,
    pub is_customized: bool,
    pub language: Language,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredState {
    #[serde(default)]
    sources: FeedSourceMap,
    is_customized: Option<bool>,
    language: Option<Language>,
}

impl FeedSourceState {
    pub fn defaults(lang: Language) -> Self {
        Self {
            sources: default_feeds(lang),
            is_customized: false,
            language: lang,
        }
    }

    /// Load from `path`. A stored state for another language that was never
    /// customized is replaced by this language's defaults; otherwise the
    /// stored lists are merged over the defaults so every category exists.
    /// Unreadable or invalid files yield defaults.
    pub fn load(path: &Path, lang: Language) -> Self {
        let stored = match fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<StoredState>(&s) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "invalid feed sources file");
                    return Self::defaults(lang);
                }
            },
            Err(_) => return Self::defaults(lang),
        };

        let is_customized = stored.is_customized.unwrap_or(true);
        if stored.language.is_some_and(|l| l != lang) && !is_customized {
            return Self::defaults(lang);
        }

        let mut sources = default_feeds(lang);
        sources.extend(stored.sources);
        Self {
            sources,
            is_customized,
            language: lang,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let body = serde_json::to_string_pretty(self)?;
        fs::write(path, body).with_context(|| format!("writing {}", path.display()))
    }

    pub fn sources_for(&self, category: Category) -> &[FeedSource] {
        self.sources
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns false when a source with the same url or name already exists
    /// in the category.
    pub fn add_source(&mut self, category: Category, source: FeedSource) -> bool {
        let list = self.sources.entry(category).or_default();
        if list
            .iter()
            .any(|s| s.url == source.url || s.name == source.name)
        {
            tracing::warn!(name = %source.name, %category, "feed source already exists");
            return false;
        }
        list.push(source);
        self.is_customized = true;
        true
    }

    pub fn remove_source(&mut self, category: Category, url: &str) -> bool {
        let Some(list) = self.sources.get_mut(&category) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.url != url);
        let removed = list.len() != before;
        if removed {
            self.is_customized = true;
        }
        removed
    }

    /// Replace one category with `lang`'s defaults. Counts as a customization.
    pub fn reset_category(&mut self, category: Category, lang: Language) {
        let defaults = default_feeds(lang)
            .remove(&category)
            .unwrap_or_default();
        self.sources.insert(category, defaults);
        self.is_customized = true;
    }

    /// Catalogue entries for `category` whose url is not configured yet.
    pub fn available_recommended(&self, category: Category, lang: Language) -> Vec<FeedSource> {
        let current = self.sources_for(category);
        recommended_feeds(lang)
            .remove(&category)
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !current.iter().any(|c| c.url == s.url))
            .collect()
    }

    /// Add a catalogue entry by name. `None` when the name is not in the
    /// catalogue, otherwise the result of `add_source`.
    pub fn add_recommended(
        &mut self,
        category: Category,
        name: &str,
        lang: Language,
    ) -> Option<bool> {
        let source = recommended_feeds(lang)
            .remove(&category)?
            .into_iter()
            .find(|s| s.name == name)?;
        Some(self.add_source(category, source))
    }

    pub fn reset_to_defaults(&mut self) {
        *self = Self::defaults(self.language);
    }

    pub fn set_language(&mut self, lang: Language) {
        if !self.is_customized {
            self.sources = default_feeds(lang);
        }
        self.language = lang;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_category() {
        for lang in [Language::En, Language::Zh] {
            let d = default_feeds(lang);
            assert_eq!(d.len(), Category::ALL.len());
            assert!(d.values().all(|v| !v.is_empty()));
        }
        let zh = default_feeds(Language::Zh);
        assert_eq!(zh[&Category::Tech].len(), 6);
        assert_eq!(zh[&Category::Finance].len(), 5);
        assert_eq!(zh[&Category::Politics].len(), 4);
    }

    #[test]
    fn recommended_is_superset_of_defaults() {
        let rec = recommended_feeds(Language::En);
        for (cat, list) in default_feeds(Language::En) {
            assert!(list.iter().all(|s| rec[&cat].contains(s)));
        }
    }

    #[test]
    fn add_rejects_duplicate_name_or_url() {
        let mut st = FeedSourceState::defaults(Language::En);
        let first = st.sources_for(Category::Tech)[0].clone();
        assert!(!st.add_source(Category::Tech, FeedSource::new("Other", first.url.clone())));
        assert!(!st.add_source(Category::Tech, FeedSource::new(first.name.clone(), "https://x.test")));
        assert!(!st.is_customized);
        assert!(st.add_source(Category::Tech, FeedSource::new("New", "https://new.test/rss")));
        assert!(st.is_customized);
    }

    #[test]
    fn language_switch_respects_customization() {
        let mut st = FeedSourceState::defaults(Language::En);
        st.set_language(Language::Zh);
        assert_eq!(st.sources, default_feeds(Language::Zh));

        st.add_source(Category::Ai, FeedSource::new("Mine", "https://mine.test/rss"));
        let custom = st.sources.clone();
        st.set_language(Language::En);
        assert_eq!(st.sources, custom);
        assert_eq!(st.language, Language::En);

        st.reset_to_defaults();
        assert_eq!(st.sources, default_feeds(Language::En));
        assert!(!st.is_customized);
    }

    #[test]
    fn reset_category_touches_only_that_category() {
        let mut st = FeedSourceState::defaults(Language::En);
        st.add_source(Category::Ai, FeedSource::new("Mine", "https://mine.test/rss"));
        st.add_source(Category::Gov, FeedSource::new("Gov Mine", "https://gov.test/rss"));

        st.reset_category(Category::Ai, Language::Zh);
        assert_eq!(st.sources[&Category::Ai], default_feeds(Language::Zh)[&Category::Ai]);
        assert!(st.sources_for(Category::Gov).iter().any(|s| s.name == "Gov Mine"));
        assert!(st.is_customized);
    }

    #[test]
    fn available_recommended_excludes_configured_urls() {
        let mut st = FeedSourceState::defaults(Language::En);
        let available = st.available_recommended(Category::Tech, Language::En);
        let rec = recommended_feeds(Language::En);
        assert_eq!(
            available.len() + st.sources_for(Category::Tech).len(),
            rec[&Category::Tech].len()
        );
        assert!(available
            .iter()
            .all(|a| !st.sources_for(Category::Tech).iter().any(|s| s.url == a.url)));

        let name = available[0].name.clone();
        assert_eq!(st.add_recommended(Category::Tech, &name, Language::En), Some(true));
        assert_eq!(st.add_recommended(Category::Tech, &name, Language::En), Some(false));
        assert_eq!(st.add_recommended(Category::Tech, "No Such Feed", Language::En), None);
        assert_eq!(
            st.available_recommended(Category::Tech, Language::En).len(),
            available.len() - 1
        );
        assert!(st.is_customized);
    }

    #[test]
    fn load_merges_stored_lists_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("feeds.json");
        fs::write(
            &p,
            r#"{"sources":{"ai":[{"name":"Mine","url":"https://mine.test/rss"}]},"isCustomized":true,"language":"en"}"#,
        )
        .unwrap();
        let st = FeedSourceState::load(&p, Language::Zh);
        assert_eq!(st.sources_for(Category::Ai).len(), 1);
        assert_eq!(st.sources_for(Category::Tech), default_feeds(Language::Zh)[&Category::Tech].as_slice());
        assert_eq!(st.language, Language::Zh);
    }

    #[test]
    fn load_uncustomized_other_language_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("feeds.json");
        fs::write(&p, r#"{"sources":{},"isCustomized":false,"language":"en"}"#).unwrap();
        assert_eq!(FeedSourceState::load(&p, Language::Zh), FeedSourceState::defaults(Language::Zh));
        assert_eq!(
            FeedSourceState::load(&dir.path().join("missing.json"), Language::En),
            FeedSourceState::defaults(Language::En)
        );
    }

    #[test]
    fn save_then_load_preserves_customization() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nested").join("feeds.json");
        let mut st = FeedSourceState::defaults(Language::Zh);
        let first = st.sources_for(Category::Gov)[0].url.clone();
        assert!(st.remove_source(Category::Gov, &first));
        st.save(&p).unwrap();
        assert_eq!(FeedSourceState::load(&p, Language::Zh), st);
    }
}
