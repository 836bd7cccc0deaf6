//! Crawler module for catalog ingestion
//!
//! This module contains the crawl logic, including:
//! - Paginated problem crawling by class and difficulty level
//! - Depth-first traversal of the source/contest tree
//! - Politeness delays between pages, units and tag sub-batches
//! - Run bookkeeping around each trigger

mod problems;
mod sources;
pub mod throttle;

pub use problems::{BatchOutcome, ProblemCrawler, ProblemFilter, CLASS_LEVELS, DIFFICULTY_LEVELS};
pub use sources::SourceCrawler;

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::storage::{open_storage, RunStatus, SqliteStorage, Storage};
use crate::Result;
use std::fmt;
use std::path::Path;

/// Counters collected while crawling
///
/// A successful crawl can still have skipped work; these make it visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_fetched: u64,
    pub problems_saved: u64,
    pub problems_failed: u64,
    /// Class/level units that stopped on a fetch failure
    pub units_aborted: u64,
    pub groups_saved: u64,
    pub groups_failed: u64,
    pub contests_saved: u64,
    pub contests_failed: u64,
    pub contest_problems_failed: u64,
    pub parent_links_deferred: u64,
}

impl CrawlStats {
    pub fn merge(&mut self, other: &CrawlStats) {
        self.pages_fetched += other.pages_fetched;
        self.problems_saved += other.problems_saved;
        self.problems_failed += other.problems_failed;
        self.units_aborted += other.units_aborted;
        self.groups_saved += other.groups_saved;
        self.groups_failed += other.groups_failed;
        self.contests_saved += other.contests_saved;
        self.contests_failed += other.contests_failed;
        self.contest_problems_failed += other.contest_problems_failed;
        self.parent_links_deferred += other.parent_links_deferred;
    }

    /// Total records or units that were skipped
    pub fn failures(&self) -> u64 {
        self.problems_failed
            + self.units_aborted
            + self.groups_failed
            + self.contests_failed
            + self.contest_problems_failed
    }
}

impl fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} problems saved ({} failed), {} units aborted, \
             {} groups saved ({} failed, {} parent links deferred), \
             {} contests saved ({} failed, {} contest problems failed)",
            self.pages_fetched,
            self.problems_saved,
            self.problems_failed,
            self.units_aborted,
            self.groups_saved,
            self.groups_failed,
            self.parent_links_deferred,
            self.contests_saved,
            self.contests_failed,
            self.contest_problems_failed
        )
    }
}

/// What a single trigger invocation crawls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlTarget {
    /// Every class, then every level
    Problems,
    /// The whole source tree
    Sources,
    /// Sources, then problems
    Everything,
    Problem(i64),
    Source(i64),
    Contest(i64),
}

impl CrawlTarget {
    /// Run kind as recorded in the run ledger
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Problems => "problems",
            Self::Sources => "sources",
            Self::Everything => "all",
            Self::Problem(_) => "problem",
            Self::Source(_) => "source",
            Self::Contest(_) => "contest",
        }
    }

    pub fn target_id(&self) -> Option<i64> {
        match self {
            Self::Problem(id) | Self::Source(id) | Self::Contest(id) => Some(*id),
            Self::Problems | Self::Sources | Self::Everything => None,
        }
    }
}

/// Runs one crawl against the configured database and records it as a run
///
/// # Example
///
/// ```no_run
/// use catalog_crawler::config::load_config_with_hash;
/// use catalog_crawler::crawler::{run_crawl, CrawlTarget};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("crawler.toml"))?;
/// let stats = run_crawl(&config, &hash, CrawlTarget::Problems).await?;
/// println!("{}", stats);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: &Config, config_hash: &str, target: CrawlTarget) -> Result<CrawlStats> {
    let mut storage = open_storage(Path::new(&config.database.path))?;
    let client = CatalogClient::new(&config.api, &config.user_agent)?;

    let run_id = storage.create_run(target.kind(), target.target_id(), config_hash)?;
    tracing::info!("Starting {} run {}", target.kind(), run_id);

    let result = execute(&client, &mut storage, config, target).await;

    let (status, message) = match &result {
        Ok(_) => (RunStatus::Completed, None),
        Err(e) => (RunStatus::Failed, Some(e.to_string())),
    };
    if let Err(e) = storage.finish_run(run_id, status, message.as_deref()) {
        tracing::warn!("Failed to record end of run {}: {}", run_id, e);
    }

    match &result {
        Ok(stats) => tracing::info!("Run {} completed: {}", run_id, stats),
        Err(e) => tracing::error!("Run {} failed: {}", run_id, e),
    }
    result
}

async fn execute(
    client: &CatalogClient,
    storage: &mut SqliteStorage,
    config: &Config,
    target: CrawlTarget,
) -> Result<CrawlStats> {
    let mut stats = CrawlStats::default();

    match target {
        CrawlTarget::Problems => {
            let mut crawler = ProblemCrawler::new(client, storage, config);
            crawler.crawl_all().await;
            stats.merge(crawler.stats());
        }
        CrawlTarget::Sources => {
            let mut crawler = SourceCrawler::new(client, storage, config);
            crawler.crawl_all().await?;
            stats.merge(crawler.stats());
        }
        CrawlTarget::Everything => {
            let mut sources = SourceCrawler::new(client, storage, config);
            sources.crawl_all().await?;
            stats.merge(&sources.into_stats());

            let mut problems = ProblemCrawler::new(client, storage, config);
            problems.crawl_all().await;
            stats.merge(problems.stats());
        }
        CrawlTarget::Problem(id) => {
            let mut crawler = ProblemCrawler::new(client, storage, config);
            crawler.crawl_single_problem(id).await?;
            stats.merge(crawler.stats());
        }
        CrawlTarget::Source(id) => {
            let mut crawler = SourceCrawler::new(client, storage, config);
            crawler.crawl_single_source(id).await?;
            stats.merge(crawler.stats());
        }
        CrawlTarget::Contest(id) => {
            let mut crawler = SourceCrawler::new(client, storage, config);
            crawler.crawl_contest(id).await?;
            stats.merge(crawler.stats());
        }
    }

    Ok(stats)
}
