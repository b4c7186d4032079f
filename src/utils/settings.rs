//! Runtime settings: defaults, then `gitpulse.toml`, then `.env` / `GITPULSE_*` environment.
//! CLI flags are applied last by the binary.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::config::{
    AnalyticsConsts, DEFAULT_EXCLUDE_EXTENSIONS, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_STORAGE_PATH,
    PackagePaths, PoolConsts, QueueConsts,
};

/// Which broker backs the job queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Durable `job_queue` table in the main database; shared across processes.
    Sqlite,
    /// In-process channel; single node, lost on exit.
    Memory,
}

impl std::str::FromStr for QueueBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(QueueBackend::Sqlite),
            "memory" => Ok(QueueBackend::Memory),
            other => anyhow::bail!("unknown queue backend: {other}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub pool_size: u32,
    pub busy_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct QueueSettings {
    pub backend: QueueBackend,
    pub name: String,
    pub pop_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub concurrency: usize,
    /// Root under which each repository gets a bare mirror named by its id.
    pub storage_path: PathBuf,
    /// Per-job deadline; the pipeline cancels cooperatively when it passes.
    pub job_timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct AnalyticsSettings {
    pub bus_factor_threshold: f64,
    /// Only count contributors whose last commit falls in this many days.
    pub active_days: Option<u32>,
    pub activity_days: u32,
    pub churn_limit: usize,
    pub exclude: Vec<String>,
    pub exclude_extensions: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub queue: QueueSettings,
    pub worker: WorkerSettings,
    pub analytics: AnalyticsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings {
                path: PathBuf::from(PackagePaths::get().db_filename()),
                pool_size: PoolConsts::MAX_SIZE,
                busy_timeout: Duration::from_secs(PoolConsts::BUSY_TIMEOUT_SECS),
            },
            queue: QueueSettings {
                backend: QueueBackend::Sqlite,
                name: QueueConsts::DEFAULT_QUEUE_NAME.to_string(),
                pop_timeout: Duration::from_secs(QueueConsts::POP_TIMEOUT_SECS),
            },
            worker: WorkerSettings {
                concurrency: QueueConsts::DEFAULT_CONCURRENCY,
                storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
                job_timeout: None,
            },
            analytics: AnalyticsSettings {
                bus_factor_threshold: AnalyticsConsts::BUS_FACTOR_THRESHOLD,
                active_days: None,
                activity_days: AnalyticsConsts::ACTIVITY_DAYS,
                churn_limit: AnalyticsConsts::CHURN_LIMIT,
                exclude: DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect(),
                exclude_extensions: DEFAULT_EXCLUDE_EXTENSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
        }
    }
}

// ---- File layer ----

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsToml {
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    queue: QueueSection,
    #[serde(default)]
    worker: WorkerSection,
    #[serde(default)]
    analytics: AnalyticsSection,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    path: Option<PathBuf>,
    pool_size: Option<u32>,
    busy_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QueueSection {
    backend: Option<QueueBackend>,
    name: Option<String>,
    pop_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkerSection {
    concurrency: Option<usize>,
    storage_path: Option<PathBuf>,
    job_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsSection {
    bus_factor_threshold: Option<f64>,
    active_days: Option<u32>,
    activity_days: Option<u32>,
    churn_limit: Option<usize>,
    exclude: Option<Vec<String>>,
    exclude_extensions: Option<Vec<String>>,
}

/// Overwrite a settings field from the file when present.
macro_rules! apply_file_opt {
    ($section:expr, $target:expr, $field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $target.$field = v;
        }
    };
    ($section:expr, $target:expr, $field:ident => $target_field:ident, $map:expr) => {
        if let Some(v) = $section.$field.clone() {
            $target.$target_field = $map(v);
        }
    };
}

impl Settings {
    /// Defaults, then the settings file, then `.env` and the process environment.
    ///
    /// An explicit `path` must exist; otherwise `gitpulse.toml` in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = PathBuf::from(PackagePaths::get().settings_filename());
                if default.is_file() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        if let Ok(env_file) = dotenvy::dotenv() {
            log::debug!("loaded {}", env_file.display());
        }
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read settings {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("parse settings {}", path.display()))
    }

    /// Defaults overlaid with the sections present in `s`.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: SettingsToml = toml::from_str(s)?;
        let mut settings = Self::default();
        settings.apply_file(&file);
        Ok(settings)
    }

    fn apply_file(&mut self, file: &SettingsToml) {
        let secs = Duration::from_secs;

        let db = &file.database;
        apply_file_opt!(db, self.database, path);
        apply_file_opt!(db, self.database, pool_size);
        apply_file_opt!(db, self.database, busy_timeout_secs => busy_timeout, secs);

        let q = &file.queue;
        apply_file_opt!(q, self.queue, backend);
        apply_file_opt!(q, self.queue, name);
        apply_file_opt!(q, self.queue, pop_timeout_secs => pop_timeout, secs);

        let w = &file.worker;
        apply_file_opt!(w, self.worker, concurrency);
        apply_file_opt!(w, self.worker, storage_path);
        apply_file_opt!(w, self.worker, job_timeout_secs => job_timeout, |v| Some(secs(v)));

        let a = &file.analytics;
        apply_file_opt!(a, self.analytics, bus_factor_threshold);
        apply_file_opt!(a, self.analytics, active_days => active_days, Some);
        apply_file_opt!(a, self.analytics, activity_days);
        apply_file_opt!(a, self.analytics, churn_limit);
        apply_file_opt!(a, self.analytics, exclude);
        apply_file_opt!(a, self.analytics, exclude_extensions);
    }

    /// Apply `GITPULSE_*` overrides read through `lookup` (the process env in [`Settings::load`]).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = PackagePaths::get().env_prefix();
        let get = |name: &str| lookup(&format!("{prefix}{name}"));

        if let Some(v) = get("DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = get("POOL_SIZE") {
            self.database.pool_size = v.parse().context("GITPULSE_POOL_SIZE")?;
        }
        if let Some(v) = get("QUEUE_BACKEND") {
            self.queue.backend = v.parse()?;
        }
        if let Some(v) = get("QUEUE_NAME") {
            self.queue.name = v;
        }
        if let Some(v) = get("WORKER_CONCURRENCY") {
            self.worker.concurrency = v.parse().context("GITPULSE_WORKER_CONCURRENCY")?;
        }
        if let Some(v) = get("STORAGE_PATH") {
            self.worker.storage_path = PathBuf::from(v);
        }
        if let Some(v) = get("JOB_TIMEOUT_SECS") {
            let secs: u64 = v.parse().context("GITPULSE_JOB_TIMEOUT_SECS")?;
            self.worker.job_timeout = Some(Duration::from_secs(secs));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.database.pool_size > 0, "pool_size must be > 0");
        anyhow::ensure!(self.worker.concurrency > 0, "worker concurrency must be > 0");
        let t = self.analytics.bus_factor_threshold;
        anyhow::ensure!(
            t > 0.0 && t <= 1.0,
            "bus_factor_threshold must be in (0, 1], got {t}"
        );
        Ok(())
    }
}
