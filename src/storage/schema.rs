//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the catalog database.
//! Entity ids are the catalog's own ids; only `tags` and `runs` carry local
//! surrogate keys.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Problems, overwritten on every observation
CREATE TABLE IF NOT EXISTS problems (
    id INTEGER PRIMARY KEY,
    title_ko TEXT NOT NULL,
    title_en TEXT,
    level INTEGER NOT NULL DEFAULT 0,
    accepted_user_count INTEGER NOT NULL DEFAULT 0,
    average_tries REAL NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_problems_level ON problems(level);

-- Algorithm tags, natural key is `key`
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    name_ko TEXT NOT NULL,
    name_en TEXT,
    is_meta INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS problem_tags (
    problem_id INTEGER NOT NULL REFERENCES problems(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (problem_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_problem_tags_tag ON problem_tags(tag_id);

-- Curated classes 1-10
CREATE TABLE IF NOT EXISTS classes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS problem_classes (
    problem_id INTEGER NOT NULL REFERENCES problems(id),
    class_id INTEGER NOT NULL REFERENCES classes(id),
    PRIMARY KEY (problem_id, class_id)
);

-- Contest-group hierarchy; parent_id stays NULL until the parent row exists
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY,
    source_name TEXT NOT NULL,
    full_name TEXT NOT NULL,
    tag TEXT,
    problem_count INTEGER NOT NULL DEFAULT 0,
    available_problem_count INTEGER NOT NULL DEFAULT 0,
    open_problem_count INTEGER NOT NULL DEFAULT 0,
    parent_id INTEGER REFERENCES sources(id)
);

CREATE INDEX IF NOT EXISTS idx_sources_parent ON sources(parent_id);

-- source_id is the group the catalog reports; it may not be persisted yet
CREATE TABLE IF NOT EXISTS contests (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    source_id INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_contests_source ON contests(source_id);

CREATE TABLE IF NOT EXISTS problem_contests (
    problem_id INTEGER NOT NULL REFERENCES problems(id),
    contest_id INTEGER NOT NULL REFERENCES contests(id),
    PRIMARY KEY (problem_id, contest_id)
);

CREATE TABLE IF NOT EXISTS problem_sources (
    problem_id INTEGER NOT NULL REFERENCES problems(id),
    source_id INTEGER NOT NULL REFERENCES sources(id),
    PRIMARY KEY (problem_id, source_id)
);

-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    target INTEGER,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    error_message TEXT
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
