//! Job dispatcher: routes jobs by type and owns the repository status transitions.

use log::{info, warn};
use std::sync::Arc;

use crate::engine::db_ops::Store;
use crate::error::{Error, Result};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::orchestrator::Orchestrator;
use crate::queue::consumer::HandleJob;
use crate::queue::job::{Job, JobType};
use crate::types::{NewRepository, RepoStatus};
use crate::worker::locks::RepoLocks;
use crate::worker::providers::ProviderRegistry;

/// Counts from one discover job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiscoverOutcome {
    pub created: usize,
    pub skipped: usize,
    /// Inserts that failed; the rest of the listing is still processed.
    pub failed: usize,
}

pub struct JobHandler {
    orchestrator: Orchestrator,
    providers: Arc<ProviderRegistry>,
    locks: RepoLocks,
}

impl JobHandler {
    pub fn new(orchestrator: Orchestrator, providers: Arc<ProviderRegistry>) -> Self {
        Self {
            orchestrator,
            providers,
            locks: RepoLocks::new(),
        }
    }

    fn store(&self) -> &Store {
        self.orchestrator.store()
    }

    pub fn locks(&self) -> &RepoLocks {
        &self.locks
    }

    /// index and update: pull the mirror and rebuild everything under the repository lock.
    fn handle_ingest(&self, job: &Job, cancel: &CancelToken) -> Result<()> {
        let repo_id = job.require_repository()?;
        let _guard = self.locks.lock(repo_id);
        self.orchestrator.run(repo_id, cancel)?;
        Ok(())
    }

    /// Best-effort mirror removal, then every row of the repository.
    fn handle_delete(&self, job: &Job) -> Result<()> {
        let repo_id = job.require_repository()?;
        let _guard = self.locks.lock(repo_id);
        let mirror = self.orchestrator.mirror_path(repo_id);
        if mirror.exists()
            && let Err(e) = std::fs::remove_dir_all(&mirror)
        {
            warn!("repository {}: could not remove {}: {}", repo_id, mirror.display(), e);
        }
        if self.store().delete_repository(repo_id)? {
            info!("deleted repository {}", repo_id);
        } else {
            info!("repository {} already gone", repo_id);
        }
        Ok(())
    }

    /// List the user's repositories on the provider and create records for unknown URLs only.
    pub fn handle_discover(&self, job: &Job) -> Result<DiscoverOutcome> {
        let user_id = job.payload_i64("user_id")?;
        let provider_name = job.payload_str("provider")?;
        info!(
            "discovering repositories for user {} on {}",
            user_id, provider_name
        );

        let credential = self
            .store()
            .find_credential(user_id, provider_name)?
            .ok_or_else(|| {
                Error::Validation(format!(
                    "no {provider_name} credential for user {user_id}"
                ))
            })?;
        let provider = self.providers.get(provider_name)?;
        let remotes = provider.fetch_repositories(&credential)?;

        let mut outcome = DiscoverOutcome::default();
        for remote in remotes {
            if self.store().get_repository_by_url(&remote.url)?.is_some() {
                outcome.skipped += 1;
                continue;
            }
            let url = remote.url.clone();
            let created = self.store().create_repository(&NewRepository {
                user_id: Some(user_id),
                name: remote.full_name,
                description: remote.description,
                url: remote.url,
                is_private: remote.is_private,
                provider: provider_name.to_string(),
                default_branch: remote.default_branch,
                status: RepoStatus::Discovered,
                last_pushed_at: remote.pushed_at,
            });
            match created {
                Ok(_) => outcome.created += 1,
                Err(e) => {
                    warn!("user {}: could not create discovered {}: {}", user_id, url, e);
                    outcome.failed += 1;
                }
            }
        }
        info!(
            "discovery for user {}: {} new, {} already known, {} failed",
            user_id, outcome.created, outcome.skipped, outcome.failed
        );
        Ok(outcome)
    }
}

impl HandleJob for JobHandler {
    fn handle(&self, job: &Job, cancel: &CancelToken) -> Result<()> {
        match job.kind {
            JobType::Index | JobType::Update => self.handle_ingest(job, cancel),
            JobType::Delete => self.handle_delete(job),
            JobType::Discover => self.handle_discover(job).map(|_| ()),
        }
    }
}
