use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the catalog crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub database: DatabaseConfig,
}

/// Remote catalog API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the catalog API, without a trailing slash
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Total number of requests issued for one logical fetch
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff unit; attempt `n` waits `base-delay-ms * 2^n`
    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Politeness and batching knobs shared by both crawlers
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Pause after each non-empty page and between source groups
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Pause between class/level units of a full problem crawl
    #[serde(rename = "unit-delay-ms", default = "default_unit_delay_ms")]
    pub unit_delay_ms: u64,

    /// Cool-down after a page fetch failure ends a unit early
    #[serde(rename = "failure-cooldown-ms", default = "default_failure_cooldown_ms")]
    pub failure_cooldown_ms: u64,

    /// Number of tags written per sub-batch inside one problem transaction
    #[serde(rename = "tag-batch-size", default = "default_tag_batch_size")]
    pub tag_batch_size: usize,

    /// Pause between tag sub-batches
    #[serde(rename = "tag-batch-delay-ms", default = "default_tag_batch_delay_ms")]
    pub tag_batch_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: default_page_delay_ms(),
            unit_delay_ms: default_unit_delay_ms(),
            failure_cooldown_ms: default_failure_cooldown_ms(),
            tag_batch_size: default_tag_batch_size(),
            tag_batch_delay_ms: default_tag_batch_delay_ms(),
        }
    }
}

impl CrawlerConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn unit_delay(&self) -> Duration {
        Duration::from_millis(self.unit_delay_ms)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.failure_cooldown_ms)
    }

    pub fn tag_batch_delay(&self) -> Duration {
        Duration::from_millis(self.tag_batch_delay_ms)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,

    /// Upper bound on a single unit-of-work transaction
    #[serde(rename = "transaction-timeout-ms", default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }
}

fn default_base_url() -> String {
    "https://solved.ac/api/v3".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_unit_delay_ms() -> u64 {
    1000
}

fn default_failure_cooldown_ms() -> u64 {
    5000
}

fn default_tag_batch_size() -> usize {
    5
}

fn default_tag_batch_delay_ms() -> u64 {
    100
}

fn default_transaction_timeout_ms() -> u64 {
    30_000
}
