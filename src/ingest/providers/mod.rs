pub mod gdelt;
pub mod rss_http;
