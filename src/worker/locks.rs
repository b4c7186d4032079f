//! Per-repository single-flight guard: at most one job mutates a repository at a time.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Default)]
pub struct RepoLocks {
    held: Mutex<HashSet<i64>>,
    released: Condvar,
}

/// Held while a job works on one repository; releases on drop.
pub struct RepoLockGuard<'a> {
    locks: &'a RepoLocks,
    repo_id: i64,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until `repo_id` is free, then take it.
    pub fn lock(&self, repo_id: i64) -> RepoLockGuard<'_> {
        let mut held = self.held();
        while held.contains(&repo_id) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|e| e.into_inner());
        }
        held.insert(repo_id);
        RepoLockGuard {
            locks: self,
            repo_id,
        }
    }

    /// Take `repo_id` only if nobody holds it.
    pub fn try_lock(&self, repo_id: i64) -> Option<RepoLockGuard<'_>> {
        let mut held = self.held();
        if !held.insert(repo_id) {
            return None;
        }
        Some(RepoLockGuard {
            locks: self,
            repo_id,
        })
    }

    pub fn is_locked(&self, repo_id: i64) -> bool {
        self.held().contains(&repo_id)
    }
}

impl Drop for RepoLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.held().remove(&self.repo_id);
        self.locks.released.notify_all();
    }
}
