pub mod app;
pub mod translation;

pub use app::AppConfig;
pub use translation::{TranslationConfig, TranslationProvider};
