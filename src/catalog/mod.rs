//! Remote catalog client
//!
//! This module is the only place that talks to the external catalog API:
//! - `client`: HTTP fetching with retry and exponential backoff
//! - `types`: typed JSON payloads for the endpoints the crawlers use

mod client;
mod types;

pub use client::{backoff_delay, build_http_client, CatalogClient};
pub use types::{
    ApiContest, ApiDisplayName, ApiProblem, ApiProblemRef, ApiTag, ApiTitle, ContestDetail,
    ContestGroup, ContestGroupDetail, SearchPage,
};

/// Id of the synthetic root of the contest-group tree; never persisted
pub const ROOT_GROUP_ID: i64 = 0;
