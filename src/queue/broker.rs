//! Brokers: FIFO lists of serialized jobs with an atomic pop.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use std::time::{Duration, Instant};

use crate::engine::db_ops::{Store, unix_now};
use crate::error::Result;
use crate::utils::config::QueueConsts;

/// Shared job list. `pop` hands each value to exactly one caller.
pub trait JobBroker: Send + Sync {
    /// Append to the tail.
    fn push(&self, raw: &str) -> Result<()>;

    /// Take the head, waiting up to `timeout`. `Ok(None)` on timeout.
    fn pop(&self, timeout: Duration) -> Result<Option<String>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-process broker over an unbounded crossbeam channel. Single node; contents are lost on exit.
pub struct ChannelBroker {
    tx: Sender<String>,
    rx: Receiver<String>,
}

impl ChannelBroker {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }
}

impl Default for ChannelBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobBroker for ChannelBroker {
    fn push(&self, raw: &str) -> Result<()> {
        // We hold a receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(raw.to_string());
        Ok(())
    }

    fn pop(&self, timeout: Duration) -> Result<Option<String>> {
        match self.rx.recv_timeout(timeout) {
            Ok(raw) => Ok(Some(raw)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn len(&self) -> Result<usize> {
        Ok(self.rx.len())
    }
}

/// Durable broker: the `job_queue` table of the main database, keyed by queue name.
///
/// Pop removes the head row inside an `IMMEDIATE` transaction, so concurrent workers in
/// this or another process never receive the same job.
pub struct SqliteBroker {
    store: Store,
    queue: String,
    poll_interval: Duration,
}

impl SqliteBroker {
    pub fn new(store: Store, queue: impl Into<String>) -> Self {
        Self {
            store,
            queue: queue.into(),
            poll_interval: Duration::from_millis(QueueConsts::SQLITE_POLL_MS),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn try_pop(&self) -> Result<Option<String>> {
        let mut conn = self.store.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let head: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, payload FROM job_queue WHERE queue = ?1 ORDER BY seq LIMIT 1",
                [&self.queue],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((seq, payload)) = head else {
            return Ok(None);
        };
        tx.execute("DELETE FROM job_queue WHERE seq = ?1", [seq])?;
        tx.commit()?;
        Ok(Some(payload))
    }
}

impl JobBroker for SqliteBroker {
    fn push(&self, raw: &str) -> Result<()> {
        let conn = self.store.conn()?;
        conn.execute(
            "INSERT INTO job_queue (queue, payload, enqueued_at) VALUES (?1, ?2, ?3)",
            params![self.queue, raw, unix_now()],
        )?;
        Ok(())
    }

    fn pop(&self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(raw) = self.try_pop()? {
                return Ok(Some(raw));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn len(&self) -> Result<usize> {
        let conn = self.store.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM job_queue WHERE queue = ?1",
            [&self.queue],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as usize)
    }
}
