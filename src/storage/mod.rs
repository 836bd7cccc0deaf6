//! Storage module for persisting catalog data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Timeout-bounded unit-of-work transactions
//! - Natural-key upserts for problems, tags, classes, sources and contests
//! - Crawl run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{CatalogTx, SqliteStorage};
pub use traits::{Gateway, Storage, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A problem as stored in `problems`
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemRecord {
    pub id: i64,
    pub title_ko: String,
    pub title_en: Option<String>,
    pub level: i64,
    pub accepted_user_count: i64,
    pub average_tries: f64,
}

/// Minimal problem row written so a contest can reference it
#[derive(Debug, Clone, Default)]
pub struct ProblemStub {
    pub id: i64,
    pub title_ko: Option<String>,
    pub level: Option<i64>,
    pub accepted_user_count: Option<i64>,
    pub average_tries: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub key: String,
    pub name_ko: String,
    pub name_en: Option<String>,
    pub is_meta: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: i64,
    pub source_name: String,
    pub full_name: String,
    pub tag: Option<String>,
    pub problem_count: i64,
    pub available_problem_count: i64,
    pub open_problem_count: i64,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestRecord {
    pub id: i64,
    pub name: String,
    pub source_id: i64,
}

/// Tables reported by the statistics output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogTable {
    Problems,
    Tags,
    ProblemTags,
    Classes,
    ProblemClasses,
    Sources,
    Contests,
    ProblemContests,
    ProblemSources,
}

impl CatalogTable {
    pub const ALL: [CatalogTable; 9] = [
        Self::Problems,
        Self::Tags,
        Self::ProblemTags,
        Self::Classes,
        Self::ProblemClasses,
        Self::Sources,
        Self::Contests,
        Self::ProblemContests,
        Self::ProblemSources,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Problems => "problems",
            Self::Tags => "tags",
            Self::ProblemTags => "problem_tags",
            Self::Classes => "classes",
            Self::ProblemClasses => "problem_classes",
            Self::Sources => "sources",
            Self::Contests => "contests",
            Self::ProblemContests => "problem_contests",
            Self::ProblemSources => "problem_sources",
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub kind: String,
    pub target: Option<i64>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub error_message: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
        assert_eq!(RunStatus::from_db_string("failed"), Some(RunStatus::Failed));
    }

    #[test]
    fn test_table_names_are_distinct() {
        let mut names: Vec<_> = CatalogTable::ALL.iter().map(|t| t.table_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), CatalogTable::ALL.len());
    }
}
