// src/lib.rs
// Public library surface for the server binary and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod news;
pub mod tagger;
pub mod translate;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::ingest::types::{Category, FeedSource, Language, NewsItem};
pub use crate::news::{NewsContext, NewsRequest, NewsResult, NewsService};
