//! Database operations: schema, pooled connections, repository CRUD, batched ingestion writes,
//! and the reads the analytics engine runs against the event log.

mod batches;
mod connection;
mod queries;
mod repositories;
mod users;

pub use connection::{PooledConn, Store};
pub use queries::{ChurnRow, OwnershipRow, RepositoryCounts};

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Snapshot upsert: refresh language, line count and timestamp on conflict.
pub(crate) const UPSERT_FILE_SQL: &str = r#"
INSERT INTO files (repository_id, path, language, lines, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?5)
ON CONFLICT(repository_id, path) DO UPDATE SET
    language = excluded.language,
    lines = excluded.lines,
    updated_at = excluded.updated_at
"#;

/// Commit upsert: only mutable metadata is refreshed.
pub(crate) const UPSERT_COMMIT_SQL: &str = r#"
INSERT INTO commits (repository_id, hash, author_email, author_name, message, committed_at, created_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(repository_id, hash) DO UPDATE SET
    author_email = excluded.author_email,
    author_name = excluded.author_name,
    message = excluded.message,
    committed_at = excluded.committed_at
"#;

/// Change events are append-only.
pub(crate) const INSERT_COMMIT_FILE_SQL: &str = r#"
INSERT INTO commit_files (repository_id, commit_hash, file_path, additions, deletions)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(commit_hash, file_path) DO NOTHING
"#;

/// Contributor merge: first/last seen widen, name follows the newest sighting.
pub(crate) const UPSERT_CONTRIBUTOR_SQL: &str = r#"
INSERT INTO contributors (repository_id, email, name, first_commit_at, last_commit_at)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(repository_id, email) DO UPDATE SET
    name = CASE WHEN excluded.last_commit_at >= contributors.last_commit_at
                THEN excluded.name ELSE contributors.name END,
    first_commit_at = MIN(contributors.first_commit_at, excluded.first_commit_at),
    last_commit_at = MAX(contributors.last_commit_at, excluded.last_commit_at)
"#;

/// Schema for repositories, identities, the four ingestion tables, and the durable job list.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    name TEXT NOT NULL,
    description TEXT,
    url TEXT NOT NULL UNIQUE,
    is_private INTEGER NOT NULL DEFAULT 0,
    provider TEXT NOT NULL,
    local_path TEXT,
    default_branch TEXT NOT NULL DEFAULT 'main',
    status TEXT NOT NULL,
    last_pushed_at INTEGER,
    last_indexed_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_identities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    provider TEXT NOT NULL,
    provider_user_id TEXT NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    token_expiry INTEGER,
    created_at INTEGER NOT NULL,
    UNIQUE(user_id, provider)
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL,
    path TEXT NOT NULL,
    language TEXT NOT NULL,
    lines INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(repository_id, path)
);

CREATE TABLE IF NOT EXISTS commits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL,
    hash TEXT NOT NULL,
    author_email TEXT NOT NULL,
    author_name TEXT NOT NULL,
    message TEXT NOT NULL,
    committed_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE(repository_id, hash)
);
CREATE INDEX IF NOT EXISTS idx_commits_repo_time ON commits(repository_id, committed_at);

CREATE TABLE IF NOT EXISTS commit_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL,
    commit_hash TEXT NOT NULL,
    file_path TEXT NOT NULL,
    additions INTEGER NOT NULL,
    deletions INTEGER NOT NULL,
    UNIQUE(commit_hash, file_path)
);
CREATE INDEX IF NOT EXISTS idx_commit_files_repo_path ON commit_files(repository_id, file_path);

CREATE TABLE IF NOT EXISTS contributors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL,
    email TEXT NOT NULL,
    name TEXT NOT NULL,
    first_commit_at INTEGER NOT NULL,
    last_commit_at INTEGER NOT NULL,
    UNIQUE(repository_id, email)
);

CREATE TABLE IF NOT EXISTS job_queue (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_job_queue_queue_seq ON job_queue(queue, seq);
"#;

/// Current time as Unix seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
