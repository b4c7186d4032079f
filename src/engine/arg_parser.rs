use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::queue::JobType;

/// Git repository ingestion and code-ownership analytics.
#[derive(Clone, Parser)]
#[command(name = "gitpulse")]
#[command(about = "Mirror git repositories, ingest their history, and report bus factor, churn and activity.")]
pub struct Cli {
    /// Settings file. Default: gitpulse.toml in the working directory, if present.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Database path (overrides settings and GITPULSE_DATABASE_PATH).
    #[arg(long, short = 'd', global = true)]
    pub db: Option<PathBuf>,

    /// Verbose output.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Run the worker pool until Ctrl+C.
    Worker {
        /// Number of worker threads.
        #[arg(long, short = 'n')]
        concurrency: Option<usize>,
        /// Directory holding the bare mirrors.
        #[arg(long, short = 's')]
        storage: Option<PathBuf>,
    },

    /// Register a repository by URL.
    Add {
        url: String,
        /// Also enqueue an index job.
        #[arg(long, short = 'i')]
        index: bool,
    },

    /// Enqueue a job for a repository.
    Enqueue {
        #[arg(value_enum)]
        kind: EnqueueKind,
        repository_id: i64,
    },

    /// Enqueue discovery of a user's repositories on a provider.
    Discover {
        user_id: i64,
        #[arg(long, short = 'p', default_value = "github")]
        provider: String,
    },

    /// Ingest one repository in the foreground, bypassing the queue.
    Ingest {
        repository_id: i64,
        /// Directory holding the bare mirrors.
        #[arg(long, short = 's')]
        storage: Option<PathBuf>,
    },

    /// Print bus factor, churn and activity as JSON.
    Report {
        repository_id: i64,
        /// Activity window in days.
        #[arg(long)]
        days: Option<u32>,
        /// Number of churn entries.
        #[arg(long, short = 'l')]
        limit: Option<usize>,
        /// Bus-factor ownership threshold in (0, 1].
        #[arg(long, short = 't')]
        threshold: Option<f64>,
        /// Only count contributors active in the last N days.
        #[arg(long)]
        active_days: Option<u32>,
        /// Disable path exclusions for ownership.
        #[arg(long)]
        no_exclude: bool,
    },

    /// List repositories.
    List {
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show the number of queued jobs.
    Queue,
}

/// Repository-scoped job kinds accepted by `enqueue`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EnqueueKind {
    Index,
    Update,
    Delete,
}

impl From<EnqueueKind> for JobType {
    fn from(k: EnqueueKind) -> Self {
        match k {
            EnqueueKind::Index => JobType::Index,
            EnqueueKind::Update => JobType::Update,
            EnqueueKind::Delete => JobType::Delete,
        }
    }
}
