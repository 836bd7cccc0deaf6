//! SQLite storage implementation
//!
//! This module provides the SQLite implementation of the `Gateway` and `Storage`
//! traits, plus the timeout-bounded transaction wrapper the crawlers write through.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Gateway, Storage, StorageError, StorageResult};
use crate::storage::{
    CatalogTable, ContestRecord, ProblemRecord, ProblemStub, RunRecord, RunStatus, SourceRecord,
    TagRecord,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::time::{Duration, Instant};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and ensures the schema exists
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Starts a unit-of-work transaction bounded by `timeout`
    ///
    /// `timeout` is also used as the SQLite busy timeout, so waiting on a
    /// locked database counts against the same budget.
    pub fn begin(&mut self, timeout: Duration) -> StorageResult<CatalogTx<'_>> {
        self.conn.busy_timeout(timeout)?;
        let tx = self.conn.transaction()?;
        Ok(CatalogTx {
            tx,
            started: Instant::now(),
            timeout,
        })
    }

    /// Runs `f` inside one transaction and commits it
    ///
    /// Any error from `f` rolls the whole unit back.
    pub fn with_transaction<T, F>(&mut self, timeout: Duration, f: F) -> StorageResult<T>
    where
        F: FnOnce(&CatalogTx<'_>) -> StorageResult<T>,
    {
        let tx = self.begin(timeout)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// An open unit-of-work transaction
///
/// Dropping it without calling [`CatalogTx::commit`] rolls back.
pub struct CatalogTx<'c> {
    tx: Transaction<'c>,
    started: Instant,
    timeout: Duration,
}

impl CatalogTx<'_> {
    /// Fails once the transaction has been open longer than its timeout
    pub fn check_deadline(&self) -> StorageResult<()> {
        let elapsed = self.started.elapsed();
        if elapsed > self.timeout {
            return Err(StorageError::TransactionTimeout {
                elapsed_ms: elapsed.as_millis(),
                timeout_ms: self.timeout.as_millis(),
            });
        }
        Ok(())
    }

    /// Commits, unless the deadline has passed (then rolls back)
    pub fn commit(self) -> StorageResult<()> {
        self.check_deadline()?;
        self.tx.commit()?;
        Ok(())
    }
}

impl Gateway for CatalogTx<'_> {
    fn upsert_problem(&self, problem: &ProblemRecord) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO problems (id, title_ko, title_en, level, accepted_user_count, average_tries)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                title_ko = excluded.title_ko,
                title_en = excluded.title_en,
                level = excluded.level,
                accepted_user_count = excluded.accepted_user_count,
                average_tries = excluded.average_tries",
            params![
                problem.id,
                problem.title_ko,
                problem.title_en,
                problem.level,
                problem.accepted_user_count,
                problem.average_tries
            ],
        )?;
        Ok(())
    }

    fn upsert_problem_stub(&self, stub: &ProblemStub) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO problems (id, title_ko, title_en, level, accepted_user_count, average_tries)
             VALUES (?1, COALESCE(?2, ''), NULL, COALESCE(?3, 0), COALESCE(?4, 0), COALESCE(?5, 0))
             ON CONFLICT(id) DO UPDATE SET
                title_ko = COALESCE(?2, title_ko),
                level = COALESCE(?3, level),
                accepted_user_count = COALESCE(?4, accepted_user_count),
                average_tries = COALESCE(?5, average_tries)",
            params![
                stub.id,
                stub.title_ko,
                stub.level,
                stub.accepted_user_count,
                stub.average_tries
            ],
        )?;
        Ok(())
    }

    fn upsert_tag(&self, tag: &TagRecord) -> StorageResult<i64> {
        let id = self.tx.query_row(
            "INSERT INTO tags (key, name_ko, name_en, is_meta) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                name_ko = excluded.name_ko,
                name_en = excluded.name_en,
                is_meta = excluded.is_meta
             RETURNING id",
            params![tag.key, tag.name_ko, tag.name_en, tag.is_meta],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn link_problem_tag(&self, problem_id: i64, tag_id: i64) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO problem_tags (problem_id, tag_id) VALUES (?1, ?2)
             ON CONFLICT(problem_id, tag_id) DO NOTHING",
            params![problem_id, tag_id],
        )?;
        Ok(())
    }

    fn upsert_class(&self, class_id: i64) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO classes (id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
            params![class_id, format!("Class {}", class_id)],
        )?;
        Ok(())
    }

    fn link_problem_class(&self, problem_id: i64, class_id: i64) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO problem_classes (problem_id, class_id) VALUES (?1, ?2)
             ON CONFLICT(problem_id, class_id) DO NOTHING",
            params![problem_id, class_id],
        )?;
        Ok(())
    }

    fn upsert_source(&self, source: &SourceRecord) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO sources (id, source_name, full_name, tag, problem_count,
                available_problem_count, open_problem_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                source_name = excluded.source_name,
                full_name = excluded.full_name,
                tag = excluded.tag,
                problem_count = excluded.problem_count,
                available_problem_count = excluded.available_problem_count,
                open_problem_count = excluded.open_problem_count",
            params![
                source.id,
                source.source_name,
                source.full_name,
                source.tag,
                source.problem_count,
                source.available_problem_count,
                source.open_problem_count
            ],
        )?;
        Ok(())
    }

    fn source_exists(&self, source_id: i64) -> StorageResult<bool> {
        let found: Option<i64> = self
            .tx
            .query_row(
                "SELECT id FROM sources WHERE id = ?1",
                params![source_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn set_source_parent(&self, source_id: i64, parent_id: i64) -> StorageResult<()> {
        self.tx.execute(
            "UPDATE sources SET parent_id = ?2 WHERE id = ?1",
            params![source_id, parent_id],
        )?;
        Ok(())
    }

    fn upsert_contest(&self, contest: &ContestRecord) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO contests (id, name, source_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                source_id = excluded.source_id",
            params![contest.id, contest.name, contest.source_id],
        )?;
        Ok(())
    }

    fn link_problem_contest(&self, problem_id: i64, contest_id: i64) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO problem_contests (problem_id, contest_id) VALUES (?1, ?2)
             ON CONFLICT(problem_id, contest_id) DO NOTHING",
            params![problem_id, contest_id],
        )?;
        Ok(())
    }

    fn link_problem_source(&self, problem_id: i64, source_id: i64) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO problem_sources (problem_id, source_id) VALUES (?1, ?2)
             ON CONFLICT(problem_id, source_id) DO NOTHING",
            params![problem_id, source_id],
        )?;
        Ok(())
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        kind: row.get(1)?,
        target: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(RunStatus::Failed),
        error_message: row.get(7)?,
    })
}

const RUN_COLUMNS: &str =
    "id, kind, target, started_at, finished_at, config_hash, status, error_message";

impl SqliteStorage {
    fn id_list(&self, sql: &str, id: i64) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        kind: &str,
        target: Option<i64>,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (kind, target, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kind,
                target,
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, error_message = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, error_message, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Catalog Reads =====

    fn get_problem(&self, problem_id: i64) -> StorageResult<Option<ProblemRecord>> {
        let problem = self
            .conn
            .query_row(
                "SELECT id, title_ko, title_en, level, accepted_user_count, average_tries
                 FROM problems WHERE id = ?1",
                params![problem_id],
                |row| {
                    Ok(ProblemRecord {
                        id: row.get(0)?,
                        title_ko: row.get(1)?,
                        title_en: row.get(2)?,
                        level: row.get(3)?,
                        accepted_user_count: row.get(4)?,
                        average_tries: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(problem)
    }

    fn get_tag(&self, key: &str) -> StorageResult<Option<TagRecord>> {
        let tag = self
            .conn
            .query_row(
                "SELECT key, name_ko, name_en, is_meta FROM tags WHERE key = ?1",
                params![key],
                |row| {
                    Ok(TagRecord {
                        key: row.get(0)?,
                        name_ko: row.get(1)?,
                        name_en: row.get(2)?,
                        is_meta: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(tag)
    }

    fn get_problem_tags(&self, problem_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.key FROM problem_tags pt JOIN tags t ON t.id = pt.tag_id
             WHERE pt.problem_id = ?1 ORDER BY t.key",
        )?;
        let keys = stmt
            .query_map(params![problem_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn get_problem_classes(&self, problem_id: i64) -> StorageResult<Vec<i64>> {
        self.id_list(
            "SELECT class_id FROM problem_classes WHERE problem_id = ?1 ORDER BY class_id",
            problem_id,
        )
    }

    fn get_source(&self, source_id: i64) -> StorageResult<Option<SourceRecord>> {
        let source = self
            .conn
            .query_row(
                "SELECT id, source_name, full_name, tag, problem_count, available_problem_count,
                        open_problem_count, parent_id
                 FROM sources WHERE id = ?1",
                params![source_id],
                |row| {
                    Ok(SourceRecord {
                        id: row.get(0)?,
                        source_name: row.get(1)?,
                        full_name: row.get(2)?,
                        tag: row.get(3)?,
                        problem_count: row.get(4)?,
                        available_problem_count: row.get(5)?,
                        open_problem_count: row.get(6)?,
                        parent_id: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(source)
    }

    fn get_contest(&self, contest_id: i64) -> StorageResult<Option<ContestRecord>> {
        let contest = self
            .conn
            .query_row(
                "SELECT id, name, source_id FROM contests WHERE id = ?1",
                params![contest_id],
                |row| {
                    Ok(ContestRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        source_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(contest)
    }

    fn get_contest_problems(&self, contest_id: i64) -> StorageResult<Vec<i64>> {
        self.id_list(
            "SELECT problem_id FROM problem_contests WHERE contest_id = ?1 ORDER BY problem_id",
            contest_id,
        )
    }

    fn get_problem_sources(&self, problem_id: i64) -> StorageResult<Vec<i64>> {
        self.id_list(
            "SELECT source_id FROM problem_sources WHERE problem_id = ?1 ORDER BY source_id",
            problem_id,
        )
    }

    // ===== Statistics =====

    fn count_rows(&self, table: CatalogTable) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.table_name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_root_sources(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sources WHERE parent_id IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
