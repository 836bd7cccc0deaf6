//! Problem crawler
//!
//! Pages through the catalog's problem search, once per class (1-10) and once
//! per difficulty level (0-30), and upserts each problem with its tags and
//! class memberships. Every problem is written in its own transaction.

use crate::catalog::{ApiProblem, ApiTag, CatalogClient};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::throttle::{pause, sub_batches};
use crate::crawler::CrawlStats;
use crate::storage::{Gateway, ProblemRecord, SqliteStorage, StorageResult, TagRecord};
use crate::{CrawlerError, Result};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Curated classes, crawled first
pub const CLASS_LEVELS: RangeInclusive<i64> = 1..=10;

/// Difficulty levels; 0 is unrated
pub const DIFFICULTY_LEVELS: RangeInclusive<i64> = 0..=30;

impl From<&ApiProblem> for ProblemRecord {
    fn from(problem: &ApiProblem) -> Self {
        Self {
            id: problem.problem_id,
            title_ko: problem.title_ko.clone(),
            title_en: problem.title_en().map(str::to_string),
            level: problem.level,
            accepted_user_count: problem.accepted_user_count,
            average_tries: problem.average_tries_or_zero(),
        }
    }
}

impl From<&ApiTag> for TagRecord {
    fn from(tag: &ApiTag) -> Self {
        Self {
            key: tag.key.clone(),
            name_ko: tag.name_ko().to_string(),
            name_en: tag.name_en().map(str::to_string),
            is_meta: tag.is_meta,
        }
    }
}

/// One unit of a full problem crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemFilter {
    Level(i64),
    Class(i64),
}

impl ProblemFilter {
    /// The catalog search query for this filter
    pub fn query(&self) -> String {
        match self {
            Self::Level(level) => format!("*{}", level),
            Self::Class(class_level) => format!("c/{}", class_level),
        }
    }

    fn class_level(&self) -> Option<i64> {
        match self {
            Self::Class(class_level) => Some(*class_level),
            Self::Level(_) => None,
        }
    }
}

impl fmt::Display for ProblemFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(level) => write!(f, "level {}", level),
            Self::Class(class_level) => write!(f, "class {}", class_level),
        }
    }
}

/// Result of processing one batch of problems
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub saved: u64,
    pub failed: u64,
}

/// Crawls problems, tags and classes into storage
pub struct ProblemCrawler<'a> {
    client: &'a CatalogClient,
    storage: &'a mut SqliteStorage,
    settings: &'a CrawlerConfig,
    tx_timeout: Duration,
    stats: CrawlStats,
}

impl<'a> ProblemCrawler<'a> {
    pub fn new(client: &'a CatalogClient, storage: &'a mut SqliteStorage, config: &'a Config) -> Self {
        Self {
            client,
            storage,
            settings: &config.crawler,
            tx_timeout: config.database.transaction_timeout(),
            stats: CrawlStats::default(),
        }
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn into_stats(self) -> CrawlStats {
        self.stats
    }

    /// Crawls every class (ascending), then every level (ascending)
    ///
    /// A unit whose pagination fails ends early; the run moves on to the next
    /// unit.
    pub async fn crawl_all(&mut self) {
        tracing::info!("Starting problem crawl");

        for class_level in CLASS_LEVELS {
            self.crawl_problems_by_class(class_level).await;
            pause(self.settings.unit_delay()).await;
        }

        for level in DIFFICULTY_LEVELS {
            self.crawl_problems_by_level(level).await;
            pause(self.settings.unit_delay()).await;
        }

        tracing::info!("Problem crawl finished: {}", self.stats);
    }

    pub async fn crawl_problems_by_level(&mut self, level: i64) {
        self.crawl_filter(ProblemFilter::Level(level)).await
    }

    pub async fn crawl_problems_by_class(&mut self, class_level: i64) {
        self.crawl_filter(ProblemFilter::Class(class_level)).await
    }

    /// Pages through one filter until an empty page or a fetch failure
    async fn crawl_filter(&mut self, filter: ProblemFilter) {
        tracing::info!("Crawling {}", filter);
        let query = filter.query();
        let mut page: u32 = 1;

        loop {
            let items = match self.client.search_problems(&query, page).await {
                Ok(result) => result.items,
                Err(e) => {
                    tracing::error!("Stopping {} at page {}: {}", filter, page, e);
                    self.stats.units_aborted += 1;
                    pause(self.settings.failure_cooldown()).await;
                    return;
                }
            };

            if items.is_empty() {
                tracing::debug!("{} exhausted after {} page(s)", filter, page - 1);
                return;
            }

            self.stats.pages_fetched += 1;
            let outcome = self.process_problem_batch(&items, filter.class_level()).await;
            tracing::info!(
                "{} page {}: {} saved, {} failed",
                filter,
                page,
                outcome.saved,
                outcome.failed
            );

            page += 1;
            pause(self.settings.page_delay()).await;
        }
    }

    /// Upserts each problem in its own transaction
    ///
    /// A failing problem is logged and followed by one page delay; the rest of
    /// the batch still runs.
    pub async fn process_problem_batch(
        &mut self,
        problems: &[ApiProblem],
        class_level: Option<i64>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for problem in problems {
            match self.save_problem(problem, class_level).await {
                Ok(()) => {
                    outcome.saved += 1;
                    self.stats.problems_saved += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to save problem {}: {}", problem.problem_id, e);
                    outcome.failed += 1;
                    self.stats.problems_failed += 1;
                    pause(self.settings.page_delay()).await;
                }
            }
        }

        outcome
    }

    async fn save_problem(&mut self, problem: &ApiProblem, class_level: Option<i64>) -> StorageResult<()> {
        let record = ProblemRecord::from(problem);
        let tags: Vec<TagRecord> = problem.tags.iter().map(TagRecord::from).collect();

        let tx = self.storage.begin(self.tx_timeout)?;
        tx.upsert_problem(&record)?;

        let mut batches = sub_batches(&tags, self.settings.tag_batch_size).peekable();
        while let Some(batch) = batches.next() {
            for tag in batch {
                let tag_id = tx.upsert_tag(tag)?;
                tx.link_problem_tag(record.id, tag_id)?;
            }
            if batches.peek().is_some() {
                pause(self.settings.tag_batch_delay()).await;
                tx.check_deadline()?;
            }
        }

        if let Some(class_id) = class_level {
            tx.upsert_class(class_id)?;
            tx.link_problem_class(record.id, class_id)?;
        }

        tx.commit()?;
        tracing::trace!("Saved problem {} ({} tags)", record.id, tags.len());
        Ok(())
    }

    /// Fetches one problem and stores it without class memberships
    pub async fn crawl_single_problem(&mut self, problem_id: i64) -> Result<()> {
        let problem = self.client.problem(problem_id).await?;

        let outcome = self.process_problem_batch(&[problem], None).await;
        if outcome.saved == 0 {
            return Err(CrawlerError::Unsaved {
                entity: "problem",
                id: problem_id,
            });
        }

        tracing::info!("Refreshed problem {}", problem_id);
        Ok(())
    }
}
