//! Domain entities shared by the store, the ingestion pipeline, and the analytics engine.
//!
//! Timestamps are Unix seconds (UTC), the same representation as the SQLite columns.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Lifecycle of a repository record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoStatus {
    /// Created by a discover job; never ingested.
    Discovered,
    Queued,
    Indexing,
    Completed,
    Failed,
}

impl RepoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoStatus::Discovered => "discovered",
            RepoStatus::Queued => "queued",
            RepoStatus::Indexing => "indexing",
            RepoStatus::Completed => "completed",
            RepoStatus::Failed => "failed",
        }
    }

    /// `completed` and `failed` end a run; a new job is needed to move on.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RepoStatus::Completed | RepoStatus::Failed)
    }
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovered" => Ok(RepoStatus::Discovered),
            // Older rows used "pending" for the queued state.
            "queued" | "pending" => Ok(RepoStatus::Queued),
            "indexing" => Ok(RepoStatus::Indexing),
            "completed" => Ok(RepoStatus::Completed),
            "failed" => Ok(RepoStatus::Failed),
            other => Err(Error::Validation(format!("unknown repository status: {other}"))),
        }
    }
}

/// A stored repository record.
#[derive(Clone, Debug, Serialize)]
pub struct Repository {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    /// Canonical remote URL; unique across the store.
    pub url: String,
    pub is_private: bool,
    pub provider: String,
    /// Resolved mirror path, set after the first completed ingestion.
    pub local_path: Option<String>,
    pub default_branch: String,
    pub status: RepoStatus,
    pub last_pushed_at: Option<i64>,
    pub last_indexed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields accepted by [`Store::create_repository`](crate::engine::db_ops::Store::create_repository).
#[derive(Clone, Debug)]
pub struct NewRepository {
    pub user_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub is_private: bool,
    pub provider: String,
    pub default_branch: String,
    pub status: RepoStatus,
    pub last_pushed_at: Option<i64>,
}

impl NewRepository {
    /// A queued repository for `url`, named after its last path segment.
    pub fn from_url(url: &str, provider: &str) -> Self {
        let name = url
            .trim_end_matches('/')
            .trim_end_matches(".git")
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .to_string();
        Self {
            user_id: None,
            name,
            description: None,
            url: url.to_string(),
            is_private: false,
            provider: provider.to_string(),
            default_branch: "main".to_string(),
            status: RepoStatus::Queued,
            last_pushed_at: None,
        }
    }
}

/// One entry of the HEAD snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub language: String,
    pub lines: i64,
}

/// One commit of the history walk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub hash: String,
    pub author_email: String,
    pub author_name: String,
    pub message: String,
    pub committed_at: i64,
}

/// Atomic change event: one path touched by one commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitFileRecord {
    pub commit_hash: String,
    pub file_path: String,
    pub additions: i64,
    pub deletions: i64,
}

/// Per-author aggregate; first/last seen only ever widen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContributorRecord {
    pub email: String,
    pub name: String,
    pub first_commit_at: i64,
    pub last_commit_at: i64,
}

impl ContributorRecord {
    /// Fold another sighting of the same author into this record.
    pub fn merge(&mut self, name: &str, at: i64) {
        if at >= self.last_commit_at {
            self.last_commit_at = at;
            self.name = name.to_string();
        }
        self.first_commit_at = self.first_commit_at.min(at);
    }
}

/// Result of one ingestion run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub commits: usize,
    pub contributors: usize,
    pub files: usize,
    pub duration: Duration,
}

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub created_at: i64,
}

/// Stored provider token for a user. Used by discovery and for cloning private mirrors.
#[derive(Clone, Debug)]
pub struct Credential {
    pub user_id: i64,
    pub provider: String,
    pub provider_user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<i64>,
}

/// A repository as listed by a hosting provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRepository {
    pub url: String,
    pub name: String,
    /// `owner/name`; stored as the repository name so equal names under different owners stay apart.
    pub full_name: String,
    pub description: Option<String>,
    pub default_branch: String,
    pub is_private: bool,
    pub pushed_at: Option<i64>,
}
