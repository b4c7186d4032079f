//! Read side: aggregates over the event log for analytics, plus listings used by reports and tests.

use rusqlite::params;
use serde::Serialize;

use crate::error::Result;
use crate::types::{CommitFileRecord, CommitRecord, ContributorRecord, FileRecord};

use super::Store;

/// Cumulative added lines of one author on one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipRow {
    pub path: String,
    pub email: String,
    pub additions: i64,
}

/// Per-path change totals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChurnRow {
    pub path: String,
    pub commit_count: i64,
    pub lines_changed: i64,
    pub last_modified: i64,
}

/// Row counts of the ingestion tables for one repository.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryCounts {
    pub files: usize,
    pub commits: usize,
    pub commit_files: usize,
    pub contributors: usize,
}

impl Store {
    /// Additions per (path, author). With `active_since`, only authors whose last commit is at or after it.
    pub fn ownership_rows(&self, repo_id: i64, active_since: Option<i64>) -> Result<Vec<OwnershipRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT cf.file_path, c.author_email, SUM(cf.additions)
            FROM commit_files cf
            JOIN commits c ON c.repository_id = cf.repository_id AND c.hash = cf.commit_hash
            WHERE cf.repository_id = ?1
              AND (?2 IS NULL OR c.author_email IN (
                    SELECT email FROM contributors
                    WHERE repository_id = ?1 AND last_commit_at >= ?2))
            GROUP BY cf.file_path, c.author_email
            "#,
        )?;
        let rows = stmt.query_map(params![repo_id, active_since], |row| {
            Ok(OwnershipRow {
                path: row.get(0)?,
                email: row.get(1)?,
                additions: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Commit count, lines changed and last touch per path, optionally since a timestamp.
    pub fn churn_rows(&self, repo_id: i64, since: Option<i64>) -> Result<Vec<ChurnRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT cf.file_path,
                   COUNT(DISTINCT cf.commit_hash),
                   SUM(cf.additions + cf.deletions),
                   MAX(c.committed_at)
            FROM commit_files cf
            JOIN commits c ON c.repository_id = cf.repository_id AND c.hash = cf.commit_hash
            WHERE cf.repository_id = ?1
              AND (?2 IS NULL OR c.committed_at >= ?2)
            GROUP BY cf.file_path
            "#,
        )?;
        let rows = stmt.query_map(params![repo_id, since], |row| {
            Ok(ChurnRow {
                path: row.get(0)?,
                commit_count: row.get(1)?,
                lines_changed: row.get(2)?,
                last_modified: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Commits per UTC calendar day (`YYYY-MM-DD`) at or after `since`.
    pub fn daily_commit_counts(&self, repo_id: i64, since: i64) -> Result<Vec<(String, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT date(committed_at, 'unixepoch'), COUNT(*) FROM commits \
             WHERE repository_id = ?1 AND committed_at >= ?2 GROUP BY 1 ORDER BY 1",
        )?;
        let rows = stmt.query_map(params![repo_id, since], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn repository_counts(&self, repo_id: i64) -> Result<RepositoryCounts> {
        let conn = self.conn()?;
        let count = |table: &str| -> rusqlite::Result<usize> {
            conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE repository_id = ?1"),
                [repo_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n.max(0) as usize)
        };
        Ok(RepositoryCounts {
            files: count("files")?,
            commits: count("commits")?,
            commit_files: count("commit_files")?,
            contributors: count("contributors")?,
        })
    }

    /// HEAD snapshot ordered by path.
    pub fn list_files(&self, repo_id: i64) -> Result<Vec<FileRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT path, language, lines FROM files WHERE repository_id = ?1 ORDER BY path",
        )?;
        let rows = stmt.query_map([repo_id], |row| {
            Ok(FileRecord {
                path: row.get(0)?,
                language: row.get(1)?,
                lines: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Commits ordered by hash (content order, independent of surrogate ids).
    pub fn list_commits(&self, repo_id: i64) -> Result<Vec<CommitRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT hash, author_email, author_name, message, committed_at FROM commits \
             WHERE repository_id = ?1 ORDER BY hash",
        )?;
        let rows = stmt.query_map([repo_id], |row| {
            Ok(CommitRecord {
                hash: row.get(0)?,
                author_email: row.get(1)?,
                author_name: row.get(2)?,
                message: row.get(3)?,
                committed_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_commit_files(&self, repo_id: i64) -> Result<Vec<CommitFileRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT commit_hash, file_path, additions, deletions FROM commit_files \
             WHERE repository_id = ?1 ORDER BY commit_hash, file_path",
        )?;
        let rows = stmt.query_map([repo_id], |row| {
            Ok(CommitFileRecord {
                commit_hash: row.get(0)?,
                file_path: row.get(1)?,
                additions: row.get(2)?,
                deletions: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_contributors(&self, repo_id: i64) -> Result<Vec<ContributorRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT email, name, first_commit_at, last_commit_at FROM contributors \
             WHERE repository_id = ?1 ORDER BY email",
        )?;
        let rows = stmt.query_map([repo_id], |row| {
            Ok(ContributorRecord {
                email: row.get(0)?,
                name: row.get(1)?,
                first_commit_at: row.get(2)?,
                last_commit_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
