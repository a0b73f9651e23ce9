// src/ingest/decode.rs
//! Feed document → `NewsItem`s.
//!
//! Streaming pass over quick-xml events. Partial or sloppy documents yield
//! the complete `<item>` blocks that precede the first unreadable fragment.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::types::{Category, FetchError, NewsItem};
use crate::tagger::KeywordTagger;

/// Pre-merge cap per document.
pub const MAX_ITEMS_PER_FEED: usize = 10;

const ENTITIES: [(&str, &str); 9] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    ("&hellip;", "..."),
    ("&mdash;", "\u{2014}"),
    ("&ndash;", "\u{2013}"),
];

/// Decode the fixed entity table in one left-to-right pass. Unknown
/// entities (including numeric references) are left untouched.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ENTITIES.iter().find(|(ent, _)| tail.starts_with(ent)) {
            Some((ent, rep)) => {
                out.push_str(rep);
                rest = &tail[ent.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Cheap shape check performed before scanning.
pub fn looks_like_feed(body: &str) -> bool {
    body.contains("<rss") || body.contains("<feed") || body.contains("<channel")
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f %z"];

// `%.f` also accepts a missing fraction.
const NAIVE_FORMATS: [&str; 9] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%b %d, %Y %H:%M",
    "%B %d, %Y %H:%M",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 4] = ["%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%Y/%m/%d"];

fn parse_general(s: &str) -> Option<i64> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return i64::try_from(dt.unix_timestamp_nanos() / 1_000_000).ok();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = chrono::DateTime::parse_from_str(s, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    // Zone-less forms are read as UTC.
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
        }
    }
    None
}

fn parse_embedded_ymd(s: &str) -> Option<i64> {
    static RE_YMD: OnceCell<Regex> = OnceCell::new();
    let re = RE_YMD.get_or_init(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());
    let caps = re.captures(s)?;
    let y: i32 = caps[1].parse().ok()?;
    let m: u32 = caps[2].parse().ok()?;
    let d: u32 = caps[3].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(y, m, d)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// Best-effort date → epoch ms. Falls back to `now_ms`, so the result is
/// always usable.
pub fn parse_date(s: &str, now_ms: i64) -> i64 {
    let s = s.trim();
    if s.is_empty() {
        return now_ms;
    }
    parse_general(s)
        .or_else(|| parse_embedded_ymd(s))
        .unwrap_or(now_ms)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
    DcDate,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.as_slice() {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"pubdate" => Some(Field::PubDate),
            b"dc:date" => Some(Field::DcDate),
            _ => None,
        }
    }
}

/// Raw fields captured from one `<item>` block.
#[derive(Debug, Default)]
struct RawItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    pub_date: Option<String>,
    dc_date: Option<String>,
}

impl RawItem {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::PubDate => &mut self.pub_date,
            Field::DcDate => &mut self.dc_date,
        }
    }
}

fn find_ascii_ci(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    hay.windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

fn is_item_tag(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(b"item")
}

/// Scan every complete `<item>` block in document order. Never fails: a
/// reader error ends the scan and keeps what was already collected.
fn scan_items(xml: &str) -> Vec<RawItem> {
    let mut reader = Reader::from_str(xml);
    {
        let cfg = reader.config_mut();
        cfg.check_end_names = false;
        cfg.allow_unmatched_ends = true;
    }

    let mut items = Vec::new();
    let mut current: Option<RawItem> = None;
    let mut field: Option<Field> = None;
    let mut field_end: Vec<u8> = Vec::new();
    let mut buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                if is_item_tag(name.as_ref()) {
                    current = Some(RawItem::default());
                    field = None;
                } else if current.is_some() && field.is_none() {
                    field = Field::from_tag(name.as_ref());
                    field_end = [&b"</"[..], name.as_ref()].concat();
                    buf.clear();
                } else if let (Some(f), Some(item)) = (field, current.as_mut()) {
                    // A bare `<` in text makes the reader treat the rest,
                    // closing tag included, as one start tag.
                    let raw: &[u8] = &e;
                    if let Some(pos) = find_ascii_ci(raw, &field_end) {
                        buf.push('<');
                        buf.push_str(&String::from_utf8_lossy(&raw[..pos]));
                        let slot = item.slot(f);
                        if slot.is_none() {
                            *slot = Some(buf.trim().to_string());
                        }
                        field = None;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if field.is_some() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::CData(c)) => {
                if field.is_some() {
                    buf.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if is_item_tag(name.as_ref()) {
                    if let Some(done) = current.take() {
                        items.push(done);
                    }
                    field = None;
                } else if let (Some(f), Some(item)) = (field, current.as_mut()) {
                    if Field::from_tag(name.as_ref()) == Some(f) {
                        let slot = item.slot(f);
                        if slot.is_none() {
                            *slot = Some(buf.trim().to_string());
                        }
                        field = None;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(target: "ingest", error = %e, "feed scan stopped early");
                break;
            }
            _ => {}
        }
    }

    items
}

/// Turn a feed body into at most `MAX_ITEMS_PER_FEED` items, in document
/// order. Items without a title or link are dropped.
pub fn parse_items(
    xml: &str,
    source: &str,
    category: Category,
    tagger: &KeywordTagger,
    now_ms: i64,
) -> Vec<NewsItem> {
    let t0 = std::time::Instant::now();
    let mut out = Vec::new();

    for raw in scan_items(xml) {
        if out.len() >= MAX_ITEMS_PER_FEED {
            break;
        }
        let title = raw
            .title
            .as_deref()
            .map(decode_entities)
            .unwrap_or_default();
        let link = raw.link.unwrap_or_default();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        let description = raw
            .description
            .as_deref()
            .map(decode_entities)
            .filter(|d| !d.is_empty());
        let pub_date = raw
            .pub_date
            .filter(|d| !d.is_empty())
            .or(raw.dc_date)
            .unwrap_or_default();
        let timestamp = parse_date(&pub_date, now_ms);

        let text = format!("{} {}", title, description.as_deref().unwrap_or_default());
        let tags = tagger.classify(&text);

        out.push(NewsItem {
            id: format!("rss-{}-{}-{}-{}", category, source, out.len(), timestamp),
            title,
            link,
            description,
            pub_date,
            timestamp,
            source: source.to_string(),
            category,
            is_alert: tags.alert.is_alert,
            alert_keyword: tags.alert.keyword,
            region: tags.region,
            topics: tags.topics,
        });
    }

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("ingest_events_total").increment(out.len() as u64);
    out
}

/// Shape-check then scan. A body that is not feed-shaped is reported as
/// `FetchError::NotAFeed` so the caller can record why the source was empty.
pub fn decode_feed(
    body: &str,
    source: &str,
    category: Category,
    tagger: &KeywordTagger,
) -> Result<Vec<NewsItem>, FetchError> {
    if !looks_like_feed(body) {
        return Err(FetchError::NotAFeed);
    }
    Ok(parse_items(
        body,
        source,
        category,
        tagger,
        Utc::now().timestamp_millis(),
    ))
}
