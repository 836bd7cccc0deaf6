//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! catalog statistics from the storage layer.

use crate::storage::{CatalogTable, RunRecord, Storage, StorageResult};
use chrono::{DateTime, Utc};

/// Catalog statistics summary
#[derive(Debug, Clone)]
pub struct CatalogStatistics {
    /// Row count of every catalog table, in `CatalogTable::ALL` order
    pub table_counts: Vec<(CatalogTable, u64)>,

    /// Sources without a parent link (top-level groups plus deferred links)
    pub root_sources: u64,

    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

impl CatalogStatistics {
    pub fn count(&self, table: CatalogTable) -> u64 {
        self.table_counts
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CatalogStatistics> {
    let mut table_counts = Vec::with_capacity(CatalogTable::ALL.len());
    for table in CatalogTable::ALL {
        table_counts.push((table, storage.count_rows(table)?));
    }

    Ok(CatalogStatistics {
        table_counts,
        root_sources: storage.count_root_sources()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Seconds between a run's start and finish, when both timestamps parse
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run.started_at.parse::<DateTime<Utc>>().ok()?;
    let finished = run.finished_at.as_ref()?.parse::<DateTime<Utc>>().ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Rows by table:");
    for (table, count) in &stats.table_counts {
        println!("  {:<18} {}", table.table_name(), count);
    }
    println!();

    let sources = stats.count(CatalogTable::Sources);
    println!(
        "Sources without parent: {} / {}",
        stats.root_sources, sources
    );
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest run:");
            println!("  Id: {}", run.id);
            match run.target {
                Some(target) => println!("  Kind: {} {}", run.kind, target),
                None => println!("  Kind: {}", run.kind),
            }
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(seconds) = run_duration_seconds(run) {
                println!("  Duration: {}s", seconds);
            }
            if let Some(message) = &run.error_message {
                println!("  Error: {}", message);
            }
        }
        None => println!("No crawl runs recorded"),
    }
}
