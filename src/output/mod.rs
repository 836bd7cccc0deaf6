//! Output module for reporting on the catalog database
//!
//! This module handles:
//! - Counting rows across catalog tables
//! - Summarizing the latest crawl run

pub mod stats;

pub use stats::{load_statistics, print_statistics, run_duration_seconds, CatalogStatistics};
