//! Open the store: r2d2 pool over SQLite with WAL and a busy timeout on every connection.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::utils::config::PoolConsts;
use crate::utils::settings::DatabaseSettings;

use super::{SCHEMA, WAL_PRAGMAS};

pub type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

#[derive(Debug)]
struct ConnectionCustomizer {
    busy_timeout: Duration,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch(WAL_PRAGMAS)?;
        Ok(())
    }
}

/// Handle to the database. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create the database at `settings.path` and ensure the schema.
    pub fn open(settings: &DatabaseSettings) -> Result<Self> {
        let path = settings.path.as_path();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(settings.pool_size)
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(PoolConsts::CONNECTION_TIMEOUT_SECS))
            .connection_customizer(Box::new(ConnectionCustomizer {
                busy_timeout: settings.busy_timeout,
            }))
            .build(manager)?;
        let store = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        store.apply_schema()?;
        log::debug!(
            "opened {} (pool size {})",
            path.display(),
            settings.pool_size
        );
        Ok(store)
    }

    /// Shorthand for [`Store::open`] with default pool settings.
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(&DatabaseSettings {
            path: path.to_path_buf(),
            pool_size: PoolConsts::MAX_SIZE,
            busy_timeout: Duration::from_secs(PoolConsts::BUSY_TIMEOUT_SECS),
        })
    }

    /// In-memory store with the same schema. Each SQLite `:memory:` connection is its own
    /// database, so the pool holds exactly one connection that is never recycled.
    pub fn open_in_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(Duration::from_secs(PoolConsts::CONNECTION_TIMEOUT_SECS))
            .build(SqliteConnectionManager::memory())?;
        let store = Self { pool, path: None };
        store.apply_schema()?;
        Ok(store)
    }

    fn apply_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Borrow a pooled connection. Release it before calling another `Store` method.
    pub fn conn(&self) -> Result<PooledConn> {
        Ok(self.pool.get()?)
    }

    /// Database file, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
