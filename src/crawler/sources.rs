//! Source crawler
//!
//! Walks the contest-group tree from the synthetic root, persisting every group
//! as a source, every child contest, and a minimal row for each problem a
//! contest references.
//!
//! The walk is depth-first over an explicit work stack. A child group is
//! written eagerly (without a parent) right before it is descended into, so its
//! own children can link to it. Parent links whose target row does not exist yet
//! are skipped and filled in by a later pass.

use crate::catalog::{ApiProblemRef, CatalogClient, ContestGroup, ROOT_GROUP_ID};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::throttle::pause;
use crate::crawler::CrawlStats;
use crate::storage::{
    ContestRecord, Gateway, ProblemStub, SourceRecord, SqliteStorage, StorageResult,
};
use crate::Result;
use std::collections::HashSet;
use std::time::Duration;

impl From<&ContestGroup> for SourceRecord {
    fn from(group: &ContestGroup) -> Self {
        Self {
            id: group.contest_group_id,
            source_name: group.contest_group_name.clone(),
            full_name: group.contest_group_full_name.clone(),
            tag: group.contest_group_tag_name.clone(),
            problem_count: group.contest_group_problem_count,
            available_problem_count: group.contest_group_available_problem_count,
            open_problem_count: group.contest_group_open_problem_count,
            parent_id: group.parent_id(),
        }
    }
}

impl From<&ApiProblemRef> for ProblemStub {
    fn from(problem: &ApiProblemRef) -> Self {
        Self {
            id: problem.problem_id,
            title_ko: problem.title_ko.clone(),
            level: problem.level,
            accepted_user_count: problem.accepted_user_count,
            average_tries: problem.average_tries,
        }
    }
}

/// A group waiting on the work stack
struct PendingGroup {
    id: i64,
    parent_id: Option<i64>,
    /// Listing data to write before descending
    eager: Option<ContestGroup>,
}

/// Crawls sources, contests and contest problems into storage
pub struct SourceCrawler<'a> {
    client: &'a CatalogClient,
    storage: &'a mut SqliteStorage,
    settings: &'a CrawlerConfig,
    tx_timeout: Duration,
    visited_groups: HashSet<i64>,
    visited_contests: HashSet<i64>,
    stats: CrawlStats,
}

impl<'a> SourceCrawler<'a> {
    pub fn new(client: &'a CatalogClient, storage: &'a mut SqliteStorage, config: &'a Config) -> Self {
        Self {
            client,
            storage,
            settings: &config.crawler,
            tx_timeout: config.database.transaction_timeout(),
            visited_groups: HashSet::new(),
            visited_contests: HashSet::new(),
            stats: CrawlStats::default(),
        }
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn into_stats(self) -> CrawlStats {
        self.stats
    }

    /// Crawls the whole tree starting at the synthetic root
    pub async fn crawl_all(&mut self) -> Result<()> {
        tracing::info!("Starting source crawl");
        self.crawl_source_group(ROOT_GROUP_ID, None).await?;
        tracing::info!(
            "Source crawl finished: {} groups, {} contests visited ({})",
            self.visited_groups.len(),
            self.visited_contests.len(),
            self.stats
        );
        Ok(())
    }

    /// Crawls `group_id` and everything below it
    ///
    /// Only a failure to fetch `group_id` itself is returned; failures below it
    /// are logged and the affected node is skipped.
    pub async fn crawl_source_group(&mut self, group_id: i64, parent_id: Option<i64>) -> Result<()> {
        let mut stack = vec![PendingGroup {
            id: group_id,
            parent_id,
            eager: None,
        }];
        let mut first = true;

        while let Some(pending) = stack.pop() {
            if !self.visited_groups.insert(pending.id) {
                tracing::debug!("Group {} already visited", pending.id);
                continue;
            }

            if let Some(listing) = &pending.eager {
                if let Err(e) = self.save_group(listing, None) {
                    tracing::warn!("Failed to pre-create group {}: {}", listing.contest_group_id, e);
                }
                pause(self.settings.page_delay()).await;
            }

            let detail = match self.client.contest_group(pending.id).await {
                Ok(detail) => detail,
                Err(e) if first => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("Skipping group {}: {}", pending.id, e);
                    self.stats.groups_failed += 1;
                    continue;
                }
            };
            first = false;

            if pending.id != ROOT_GROUP_ID {
                match self.save_group(&detail.contest_group, pending.parent_id) {
                    Ok(_) => self.stats.groups_saved += 1,
                    Err(e) => {
                        tracing::warn!("Failed to save group {}: {}", pending.id, e);
                        self.stats.groups_failed += 1;
                    }
                }
            }

            for contest in &detail.child_contests {
                if !self.visited_contests.insert(contest.contest_id) {
                    continue;
                }
                if let Err(e) = self.crawl_contest(contest.contest_id).await {
                    tracing::warn!("Skipping contest {}: {}", contest.contest_id, e);
                    self.stats.contests_failed += 1;
                }
            }

            let child_parent = (pending.id != ROOT_GROUP_ID).then_some(pending.id);
            for child in detail.child_groups.into_iter().rev() {
                stack.push(PendingGroup {
                    id: child.contest_group_id,
                    parent_id: child_parent,
                    eager: Some(child),
                });
            }
        }

        Ok(())
    }

    /// Writes a group's fields, then links it to `parent_id` if that row exists
    ///
    /// Returns whether the parent link was written. A missing parent is not an
    /// error; the link is made on a later pass once the parent is stored.
    pub fn save_group(&mut self, group: &ContestGroup, parent_id: Option<i64>) -> StorageResult<bool> {
        let record = SourceRecord::from(group);
        self.storage
            .with_transaction(self.tx_timeout, |tx| tx.upsert_source(&record))?;

        let Some(parent_id) = parent_id.filter(|parent| *parent != record.id) else {
            return Ok(false);
        };

        let linked = self.storage.with_transaction(self.tx_timeout, |tx| {
            if !tx.source_exists(parent_id)? {
                return Ok(false);
            }
            tx.set_source_parent(record.id, parent_id)?;
            Ok(true)
        })?;

        if !linked {
            tracing::debug!(
                "Parent {} of group {} not stored yet, link deferred",
                parent_id,
                record.id
            );
            self.stats.parent_links_deferred += 1;
        }
        Ok(linked)
    }

    /// Stores one contest and a stub row for each problem it references
    ///
    /// The contest belongs to the group the catalog reports for it (0 when
    /// absent). A problem that fails to save is logged and skipped.
    pub async fn crawl_contest(&mut self, contest_id: i64) -> Result<()> {
        let detail = self.client.contest(contest_id).await?;
        let source_id = detail.contest.contest_group_id.unwrap_or(ROOT_GROUP_ID);
        let record = ContestRecord {
            id: detail.contest.contest_id,
            name: detail.contest.contest_name.clone(),
            source_id,
        };

        self.storage
            .with_transaction(self.tx_timeout, |tx| tx.upsert_contest(&record))?;
        self.stats.contests_saved += 1;

        for problem in &detail.problems {
            let stub = ProblemStub::from(problem);
            let saved = self.storage.with_transaction(self.tx_timeout, |tx| {
                tx.upsert_problem_stub(&stub)?;
                tx.link_problem_contest(stub.id, record.id)?;
                if source_id != ROOT_GROUP_ID && tx.source_exists(source_id)? {
                    tx.link_problem_source(stub.id, source_id)?;
                }
                Ok(())
            });

            if let Err(e) = saved {
                tracing::warn!(
                    "Failed to save problem {} of contest {}: {}",
                    stub.id,
                    record.id,
                    e
                );
                self.stats.contest_problems_failed += 1;
            }
        }

        tracing::debug!(
            "Saved contest {} with {} problems",
            record.id,
            detail.problems.len()
        );
        Ok(())
    }

    /// Refreshes one group and its direct contests without descending
    pub async fn crawl_single_source(&mut self, source_id: i64) -> Result<()> {
        let detail = self.client.contest_group(source_id).await?;
        let group = &detail.contest_group;
        self.save_group(group, group.parent_id())?;
        self.stats.groups_saved += 1;
        self.visited_groups.insert(source_id);

        for contest in &detail.child_contests {
            if !self.visited_contests.insert(contest.contest_id) {
                continue;
            }
            if let Err(e) = self.crawl_contest(contest.contest_id).await {
                tracing::warn!("Skipping contest {}: {}", contest.contest_id, e);
                self.stats.contests_failed += 1;
            }
        }

        tracing::info!(
            "Refreshed source {} ({} contests)",
            source_id,
            detail.child_contests.len()
        );
        Ok(())
    }
}
