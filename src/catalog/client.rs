//! HTTP client for the remote catalog API
//!
//! This module handles all HTTP requests to the catalog, including:
//! - Building the HTTP client with an identifying user agent
//! - Exponential backoff on rate limiting (HTTP 429), other non-2xx
//!   responses, and network errors
//! - Decoding JSON bodies into typed responses

use crate::catalog::types::{ApiProblem, ContestDetail, ContestGroupDetail, SearchPage};
use crate::config::{ApiConfig, UserAgentConfig};
use crate::FetchError;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use catalog_crawler::catalog::build_http_client;
/// use catalog_crawler::config::{ApiConfig, UserAgentConfig};
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "CatalogCrawler".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&ApiConfig::default(), &user_agent).unwrap();
/// ```
pub fn build_http_client(
    api: &ApiConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(api.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Delay before retrying after failed attempt `attempt` (zero-based)
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Why a single attempt did not produce a body
enum AttemptFailure {
    Status(StatusCode),
    Network(reqwest::Error),
}

/// Client for the solved.ac catalog
///
/// Every typed endpoint goes through [`CatalogClient::fetch_with_retry`] with the
/// configured retry budget.
pub struct CatalogClient {
    http: Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl CatalogClient {
    pub fn new(api: &ApiConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_http_client(api, user_agent)?,
            base_url: api.base_url.clone(),
            max_retries: api.max_retries,
            base_delay: api.base_delay(),
        })
    }

    /// Fetches `url` and decodes the JSON body as `T`
    ///
    /// At most `max_retries` requests are issued. After failed attempt `n` the
    /// client sleeps `base_delay * 2^n`. Rate-limited responses (429) take the
    /// same backoff path as other failures but are logged separately. A body
    /// that is not valid JSON for `T` fails immediately with
    /// [`FetchError::Decode`].
    pub async fn fetch_with_retry<T: DeserializeOwned>(
        &self,
        url: &Url,
        max_retries: u32,
    ) -> Result<T, FetchError> {
        let attempts = max_retries.max(1);
        let mut last_status = None;
        let mut last_message = String::new();

        for attempt in 0..attempts {
            match self.attempt(url).await {
                Ok(body) => {
                    return serde_json::from_str(&body).map_err(|source| FetchError::Decode {
                        url: url.to_string(),
                        source,
                    });
                }
                Err(AttemptFailure::Status(status)) => {
                    last_status = Some(status.as_u16());
                    last_message = format!("HTTP {}", status);
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        tracing::warn!(
                            "Rate limited on {} (attempt {}/{})",
                            url,
                            attempt + 1,
                            attempts
                        );
                    } else {
                        tracing::warn!(
                            "{} returned {} (attempt {}/{})",
                            url,
                            status,
                            attempt + 1,
                            attempts
                        );
                    }
                }
                Err(AttemptFailure::Network(e)) => {
                    last_status = None;
                    last_message = if e.is_timeout() {
                        "Request timeout".to_string()
                    } else if e.is_connect() {
                        "Connection refused".to_string()
                    } else {
                        e.to_string()
                    };
                    tracing::warn!(
                        "Request to {} failed: {} (attempt {}/{})",
                        url,
                        last_message,
                        attempt + 1,
                        attempts
                    );
                }
            }

            if attempt + 1 < attempts {
                let wait = backoff_delay(self.base_delay, attempt);
                tracing::debug!("Backing off {:?} before retrying {}", wait, url);
                tokio::time::sleep(wait).await;
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            status: last_status,
            message: last_message,
        })
    }

    async fn attempt(&self, url: &Url) -> Result<String, AttemptFailure> {
        tracing::trace!("GET {}", url);
        let response = self
            .http
            .get(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(AttemptFailure::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::Status(status));
        }

        response.text().await.map_err(AttemptFailure::Network)
    }

    /// Builds `<base-url><path>?<query>`
    pub fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// `GET /search/problem`, sorted by id ascending
    pub async fn search_problems(&self, query: &str, page: u32) -> Result<SearchPage, FetchError> {
        let url = self.endpoint(
            "/search/problem",
            &[
                ("query", query.to_string()),
                ("page", page.to_string()),
                ("sort", "id".to_string()),
                ("direction", "asc".to_string()),
            ],
        )?;
        self.fetch_with_retry(&url, self.max_retries).await
    }

    /// `GET /problem/show`
    pub async fn problem(&self, problem_id: i64) -> Result<ApiProblem, FetchError> {
        let url = self.endpoint("/problem/show", &[("problemId", problem_id.to_string())])?;
        self.fetch_with_retry(&url, self.max_retries).await
    }

    /// `GET /problem/contest/group`
    pub async fn contest_group(&self, group_id: i64) -> Result<ContestGroupDetail, FetchError> {
        let url = self.endpoint(
            "/problem/contest/group",
            &[("contestGroupId", group_id.to_string())],
        )?;
        self.fetch_with_retry(&url, self.max_retries).await
    }

    /// `GET /problem/contest`
    pub async fn contest(&self, contest_id: i64) -> Result<ContestDetail, FetchError> {
        let url = self.endpoint("/problem/contest", &[("contestId", contest_id.to_string())])?;
        self.fetch_with_retry(&url, self.max_retries).await
    }
}
