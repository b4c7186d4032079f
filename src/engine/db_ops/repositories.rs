//! Repository records: create, lookup, list, status transitions, delete.

use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

use crate::error::{Error, Result};
use crate::types::{NewRepository, RepoStatus, Repository};

use super::{Store, unix_now};

const REPO_COLUMNS: &str = "id, user_id, name, description, url, is_private, provider, local_path, \
     default_branch, status, last_pushed_at, last_indexed_at, created_at, updated_at";

fn repo_from_row(row: &Row<'_>) -> rusqlite::Result<Repository> {
    let status: String = row.get(9)?;
    let status = status
        .parse::<RepoStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;
    Ok(Repository {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        url: row.get(4)?,
        is_private: row.get(5)?,
        provider: row.get(6)?,
        local_path: row.get(7)?,
        default_branch: row.get(8)?,
        status,
        last_pushed_at: row.get(10)?,
        last_indexed_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

impl Store {
    pub fn create_repository(&self, new: &NewRepository) -> Result<Repository> {
        let id = {
            let conn = self.conn()?;
            let now = unix_now();
            conn.execute(
                "INSERT INTO repositories (user_id, name, description, url, is_private, provider, \
                 default_branch, status, last_pushed_at, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    new.user_id,
                    new.name,
                    new.description,
                    new.url,
                    new.is_private,
                    new.provider,
                    new.default_branch,
                    new.status.as_str(),
                    new.last_pushed_at,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_repository(id)
    }

    /// Fetch one repository; [`Error::NotFound`] if the id is unknown.
    pub fn get_repository(&self, id: i64) -> Result<Repository> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {REPO_COLUMNS} FROM repositories WHERE id = ?1"),
            [id],
            repo_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("repository {id}")))
    }

    pub fn get_repository_by_url(&self, url: &str) -> Result<Option<Repository>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {REPO_COLUMNS} FROM repositories WHERE url = ?1"),
                [url],
                repo_from_row,
            )
            .optional()?)
    }

    /// Page through repositories in id order.
    pub fn list_repositories(&self, limit: usize, offset: usize) -> Result<Vec<Repository>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPO_COLUMNS} FROM repositories ORDER BY id LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], repo_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update_repository_status(&self, id: i64, status: RepoStatus) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE repositories SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), unix_now(), id],
        )?;
        if n == 0 {
            return Err(Error::NotFound(format!("repository {id}")));
        }
        Ok(())
    }

    /// Terminal success: `completed` with the index time and resolved mirror path.
    pub fn mark_repository_indexed(&self, id: i64, local_path: &str, indexed_at: i64) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE repositories SET status = ?1, last_indexed_at = ?2, local_path = ?3, \
             updated_at = ?4 WHERE id = ?5",
            params![
                RepoStatus::Completed.as_str(),
                indexed_at,
                local_path,
                unix_now(),
                id
            ],
        )?;
        if n == 0 {
            return Err(Error::NotFound(format!("repository {id}")));
        }
        Ok(())
    }

    /// Remove a repository and every row ingested for it. Returns false if it did not exist.
    pub fn delete_repository(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for table in ["commit_files", "commits", "contributors", "files"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE repository_id = ?1"),
                [id],
            )?;
        }
        let n = tx.execute("DELETE FROM repositories WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(n > 0)
    }
}
