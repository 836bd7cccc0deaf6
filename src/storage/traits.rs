//! Storage traits and error types
//!
//! `Gateway` is the write side: natural-key upserts that run inside one
//! unit-of-work transaction. `Storage` is the read side used by statistics,
//! run bookkeeping and tests.

use crate::storage::{
    CatalogTable, ContestRecord, ProblemRecord, ProblemStub, RunRecord, RunStatus, SourceRecord,
    TagRecord,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Transaction exceeded {timeout_ms}ms (took {elapsed_ms}ms), rolled back")]
    TransactionTimeout { elapsed_ms: u128, timeout_ms: u128 },

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Upsert operations keyed on the catalog's natural ids
///
/// Join rows require both referenced rows to exist when the call is made.
pub trait Gateway {
    /// Creates or fully overwrites a problem row
    fn upsert_problem(&self, problem: &ProblemRecord) -> StorageResult<()>;

    /// Ensures a problem row exists; only the fields present on `stub` are
    /// written to an existing row
    fn upsert_problem_stub(&self, stub: &ProblemStub) -> StorageResult<()>;

    /// Creates or refreshes a tag by key and returns its row id
    fn upsert_tag(&self, tag: &TagRecord) -> StorageResult<i64>;

    fn link_problem_tag(&self, problem_id: i64, tag_id: i64) -> StorageResult<()>;

    /// Creates class `class_id` named "Class N" if absent
    fn upsert_class(&self, class_id: i64) -> StorageResult<()>;

    fn link_problem_class(&self, problem_id: i64, class_id: i64) -> StorageResult<()>;

    /// Creates or refreshes a source's own fields
    ///
    /// `source.parent_id` is ignored; the parent link is only ever written by
    /// [`Gateway::set_source_parent`], so a refresh never clears it.
    fn upsert_source(&self, source: &SourceRecord) -> StorageResult<()>;

    fn source_exists(&self, source_id: i64) -> StorageResult<bool>;

    fn set_source_parent(&self, source_id: i64, parent_id: i64) -> StorageResult<()>;

    fn upsert_contest(&self, contest: &ContestRecord) -> StorageResult<()>;

    fn link_problem_contest(&self, problem_id: i64, contest_id: i64) -> StorageResult<()>;

    fn link_problem_source(&self, problem_id: i64, source_id: i64) -> StorageResult<()>;
}

/// Read access and run bookkeeping
pub trait Storage {
    // ===== Run Management =====

    /// Opens a run in the `running` state and returns its id
    fn create_run(&mut self, kind: &str, target: Option<i64>, config_hash: &str)
        -> StorageResult<i64>;

    /// Closes a run with a final status and optional error message
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Catalog Reads =====

    fn get_problem(&self, problem_id: i64) -> StorageResult<Option<ProblemRecord>>;

    fn get_tag(&self, key: &str) -> StorageResult<Option<TagRecord>>;

    /// Tag keys attached to a problem, sorted
    fn get_problem_tags(&self, problem_id: i64) -> StorageResult<Vec<String>>;

    fn get_problem_classes(&self, problem_id: i64) -> StorageResult<Vec<i64>>;

    fn get_source(&self, source_id: i64) -> StorageResult<Option<SourceRecord>>;

    fn get_contest(&self, contest_id: i64) -> StorageResult<Option<ContestRecord>>;

    /// Problem ids linked to a contest, ascending
    fn get_contest_problems(&self, contest_id: i64) -> StorageResult<Vec<i64>>;

    fn get_problem_sources(&self, problem_id: i64) -> StorageResult<Vec<i64>>;

    // ===== Statistics =====

    fn count_rows(&self, table: CatalogTable) -> StorageResult<u64>;

    /// Sources still waiting for a parent link
    fn count_root_sources(&self) -> StorageResult<u64>;
}
