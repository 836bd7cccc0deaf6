//! Catalog Crawler: ingestion of competitive-programming catalog metadata
//!
//! This crate crawls problem, tag, class, contest and source-hierarchy data from
//! the solved.ac catalog API and upserts it into a SQLite store that a separate
//! search UI reads from.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to save {entity} {id}")]
    Unsaved { entity: &'static str, id: i64 },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised by the remote catalog client
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every attempt failed; `status` is the last HTTP status seen, if any
    #[error("Gave up on {url} after {attempts} attempts (last status: {status:?}): {message}")]
    Exhausted {
        url: String,
        attempts: u32,
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed JSON from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Invalid request URL: {0}")]
    Url(#[from] ::url::ParseError),
}

impl FetchError {
    /// True when the final failed attempt was answered with HTTP 429
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Exhausted { status: Some(429), .. })
    }
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::CatalogClient;
pub use config::Config;
pub use crawler::{run_crawl, CrawlStats, CrawlTarget, ProblemCrawler, SourceCrawler};
pub use storage::{SqliteStorage, Storage};
