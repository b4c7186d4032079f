//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    db_filename: String,
    settings_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                db_filename: format!("{pkg}.db"),
                settings_filename: format!("{pkg}.toml"),
                env_prefix: format!("{}_", pkg.to_uppercase()),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    pub fn db_filename(&self) -> &str {
        &self.db_filename
    }

    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }

    /// Prefix for environment overrides, e.g. `GITPULSE_`.
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }
}

// ---- Database ----

/// Batch sizes for transactional flushes (balance transaction size vs round-trips).
pub struct BatchConsts;

impl BatchConsts {
    /// HEAD snapshot rows per transaction.
    pub const FILES: usize = 1000;
    /// Commits per transaction (their change events ride along).
    pub const COMMITS: usize = 100;
    /// Contributor aggregates held before a forced flush.
    pub const CONTRIBUTORS: usize = 1000;
}

/// Connection pool defaults.
pub struct PoolConsts;

impl PoolConsts {
    pub const MAX_SIZE: u32 = 25;
    /// Busy timeout applied to every pooled connection (seconds).
    pub const BUSY_TIMEOUT_SECS: u64 = 30;
    /// Wait for a free pooled connection (seconds).
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

// ---- Snapshot line scan ----

/// Line-scanner buffer bounds.
pub struct ScanConsts;

impl ScanConsts {
    /// Initial read buffer (bytes). 64 KiB.
    pub const INITIAL_BUFFER: usize = 64 * 1024;
    /// Longest line accepted (bytes). 1 MiB; longer fails that file's scan.
    pub const MAX_LINE: usize = 1024 * 1024;
}

/// Language label for paths without an extension.
pub const PLAIN_TEXT_LANGUAGE: &str = "Plain Text";

// ---- Queue / workers ----

pub struct QueueConsts;

impl QueueConsts {
    pub const DEFAULT_QUEUE_NAME: &'static str = "git_index_jobs";
    /// Blocking pop timeout before a worker re-polls (seconds).
    pub const POP_TIMEOUT_SECS: u64 = 5;
    /// Poll interval of the SQLite broker while waiting for a job (ms).
    pub const SQLITE_POLL_MS: u64 = 100;
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_CONCURRENCY: usize = 5;
}

/// Default mirror location for bare clones.
pub const DEFAULT_STORAGE_PATH: &str = "/var/lib/git-analytics/repos";

// ---- Analytics ----

pub struct AnalyticsConsts;

impl AnalyticsConsts {
    /// Ownership share the bus-factor set must reach.
    pub const BUS_FACTOR_THRESHOLD: f64 = 0.5;
    /// Weight of commit frequency in the churn score.
    pub const CHURN_FREQUENCY_WEIGHT: f64 = 0.7;
    /// Weight of (log) line volume in the churn score.
    pub const CHURN_VOLUME_WEIGHT: f64 = 0.3;
    /// Fraction of the maximum above which a file counts as frequent / massive.
    pub const CHURN_HIGH_RATIO: f64 = 0.6;
    pub const ACTIVITY_DAYS: u32 = 365;
    pub const CHURN_LIMIT: usize = 10;
}

/// Default path exclusions for ownership analysis (lockfiles, generated code, vendored
/// and build output, editor dirs, docs and config). `*` matches across `/`.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Gemfile.lock",
    "Pipfile.lock",
    "poetry.lock",
    "go.sum",
    "*.pb.go",
    "*.gen.go",
    "*.generated.*",
    "*.min.js",
    "*.min.css",
    "*.bundle.js",
    "vendor/*",
    "node_modules/*",
    ".git/*",
    "dist/*",
    "build/*",
    "out/*",
    "bin/*",
    ".vscode/*",
    ".idea/*",
    "*.md",
    "*.json",
    "*.yaml",
    "*.yml",
    "*.toml",
];

/// Extensions always excluded from ownership analysis.
pub const DEFAULT_EXCLUDE_EXTENSIONS: &[&str] = &["lock", "sum", "map"];
