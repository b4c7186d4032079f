//! Batched ingestion writes. Each flush is its own transaction: a failure rolls back only
//! that batch; earlier batches stay committed.

use rusqlite::{Connection, Statement, params};

use crate::error::Result;
use crate::types::{CommitFileRecord, CommitRecord, ContributorRecord, FileRecord};

use super::{
    INSERT_COMMIT_FILE_SQL, Store, UPSERT_COMMIT_SQL, UPSERT_CONTRIBUTOR_SQL, UPSERT_FILE_SQL,
    unix_now,
};

/// Execute `sql` once per item of `batch` inside a single transaction. Returns batch length.
fn flush_batch<T>(
    conn: &mut Connection,
    sql: &str,
    batch: &[T],
    mut bind: impl FnMut(&mut Statement<'_>, &T) -> rusqlite::Result<usize>,
) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut stmt = tx.prepare_cached(sql)?;
    for item in batch {
        bind(&mut stmt, item)?;
    }
    drop(stmt);
    tx.commit()?;
    Ok(batch.len())
}

impl Store {
    /// Drop the HEAD snapshot of `repo_id`. Returns rows removed.
    pub fn clear_files(&self, repo_id: i64) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM files WHERE repository_id = ?1", [repo_id])?)
    }

    /// Drop commits, change events and contributors of `repo_id` in one transaction.
    pub fn clear_history(&self, repo_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for table in ["commit_files", "commits", "contributors"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE repository_id = ?1"),
                [repo_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_files(&self, repo_id: i64, batch: &[FileRecord]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let now = unix_now();
        let mut conn = self.conn()?;
        flush_batch(&mut conn, UPSERT_FILE_SQL, batch, |stmt, f| {
            stmt.execute(params![repo_id, f.path, f.language, f.lines, now])
        })
    }

    /// Upsert commits and insert their change events in the same transaction.
    pub fn write_commits(
        &self,
        repo_id: i64,
        commits: &[CommitRecord],
        events: &[CommitFileRecord],
    ) -> Result<usize> {
        if commits.is_empty() && events.is_empty() {
            return Ok(0);
        }
        let now = unix_now();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_COMMIT_SQL)?;
            for c in commits {
                stmt.execute(params![
                    repo_id,
                    c.hash,
                    c.author_email,
                    c.author_name,
                    c.message,
                    c.committed_at,
                    now
                ])?;
            }
            let mut stmt = tx.prepare_cached(INSERT_COMMIT_FILE_SQL)?;
            for e in events {
                stmt.execute(params![
                    repo_id,
                    e.commit_hash,
                    e.file_path,
                    e.additions,
                    e.deletions
                ])?;
            }
        }
        tx.commit()?;
        Ok(commits.len())
    }

    pub fn upsert_contributors(&self, repo_id: i64, batch: &[ContributorRecord]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        flush_batch(&mut conn, UPSERT_CONTRIBUTOR_SQL, batch, |stmt, c| {
            stmt.execute(params![
                repo_id,
                c.email,
                c.name,
                c.first_commit_at,
                c.last_commit_at
            ])
        })
    }
}
