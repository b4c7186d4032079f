//! Ingestion orchestrator: fetch, snapshot, history, then the terminal status transition.

use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::engine::db_ops::{Store, unix_now};
use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::{fetch, history, snapshot};
use crate::types::{IngestSummary, RepoStatus, Repository};

/// Runs ingestion for one repository at a time; share it between workers by reference.
#[derive(Clone)]
pub struct Orchestrator {
    store: Store,
    storage_path: PathBuf,
}

impl Orchestrator {
    pub fn new(store: Store, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            storage_path: storage_path.into(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Bare mirror location of a repository: `<storage_path>/<id>`.
    pub fn mirror_path(&self, repo_id: i64) -> PathBuf {
        self.storage_path.join(repo_id.to_string())
    }

    /// Pipeline only: fetch the mirror, rebuild the snapshot, rebuild the history.
    /// No status changes; see [`Orchestrator::run`].
    pub fn ingest(&self, repo: &Repository, cancel: &CancelToken) -> Result<IngestSummary> {
        let start = Instant::now();
        let local = self.mirror_path(repo.id);
        let token = self.access_token(repo)?;

        cancel.check()?;
        let git = fetch::open_or_clone(&repo.url, &local, token.as_deref())?;
        let files = snapshot::rebuild_snapshot(&self.store, repo.id, &git, cancel)?;
        let hist = history::ingest_history(&self.store, repo.id, &git, cancel)?;

        Ok(IngestSummary {
            commits: hist.commits,
            contributors: hist.contributors,
            files,
            duration: start.elapsed(),
        })
    }

    /// Full state machine: `indexing`, then `completed` with index time and mirror path,
    /// or `failed` on any error (lookup failures included). The error is returned after the transition.
    pub fn run(&self, repo_id: i64, cancel: &CancelToken) -> Result<IngestSummary> {
        self.store
            .update_repository_status(repo_id, RepoStatus::Indexing)?;

        let outcome = self
            .store
            .get_repository(repo_id)
            .and_then(|repo| self.ingest(&repo, cancel))
            .and_then(|summary| {
                let local = self.mirror_path(repo_id);
                self.store
                    .mark_repository_indexed(repo_id, &local.to_string_lossy(), unix_now())?;
                Ok(summary)
            });

        match outcome {
            Ok(summary) => {
                info!(
                    "repository {} indexed: {} commits, {} contributors, {} files in {:?}",
                    repo_id, summary.commits, summary.contributors, summary.files, summary.duration
                );
                Ok(summary)
            }
            Err(e) => {
                error!("repository {} failed: {}", repo_id, e);
                if let Err(status_err) = self
                    .store
                    .update_repository_status(repo_id, RepoStatus::Failed)
                {
                    error!(
                        "repository {}: could not record failure: {}",
                        repo_id, status_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Stored token of the repository owner for its provider, if any.
    fn access_token(&self, repo: &Repository) -> Result<Option<String>> {
        let Some(user_id) = repo.user_id else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_credential(user_id, &repo.provider)?
            .map(|c| c.access_token))
    }
}
