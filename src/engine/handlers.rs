//! Command handlers for the `gitpulse` binary.

use anyhow::{Context, Result};
use log::{info, warn};

use crate::analytics::{self, ExclusionConfig};
use crate::engine::arg_parser::{Cli, Commands};
use crate::engine::runtime::Runtime;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::fetch::detect_provider;
use crate::queue::{Job, JobType};
use crate::types::NewRepository;
use crate::utils::settings::{QueueBackend, Settings};
use crate::utils::setup_logging;

/// Parse settings, apply global CLI overrides, and dispatch the subcommand.
pub fn handle_run(cli: &Cli) -> Result<()> {
    setup_logging(cli.verbose);
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(ref db) = cli.db {
        settings.database.path = db.clone();
    }
    match &cli.command {
        Commands::Worker {
            concurrency,
            storage,
        } => {
            if let Some(n) = concurrency {
                settings.worker.concurrency = *n;
            }
            if let Some(s) = storage {
                settings.worker.storage_path = s.clone();
            }
            settings.validate()?;
            handle_worker(&Runtime::new(settings)?)
        }
        Commands::Add { url, index } => handle_add(&runtime(settings)?, url, *index),
        Commands::Enqueue {
            kind,
            repository_id,
        } => handle_enqueue(&runtime(settings)?, (*kind).into(), *repository_id),
        Commands::Discover { user_id, provider } => {
            let rt = runtime(settings)?;
            let id = rt.publisher().publish_discover_job(*user_id, provider)?;
            println!("{id}");
            Ok(())
        }
        Commands::Ingest {
            repository_id,
            storage,
        } => {
            if let Some(s) = storage {
                settings.worker.storage_path = s.clone();
            }
            handle_ingest(&Runtime::new(settings)?, *repository_id)
        }
        Commands::Report {
            repository_id,
            days,
            limit,
            threshold,
            active_days,
            no_exclude,
        } => {
            let a = &mut settings.analytics;
            if let Some(d) = days {
                a.activity_days = *d;
            }
            if let Some(l) = limit {
                a.churn_limit = *l;
            }
            if let Some(t) = threshold {
                a.bus_factor_threshold = *t;
            }
            if active_days.is_some() {
                a.active_days = *active_days;
            }
            if *no_exclude {
                let none = ExclusionConfig::none();
                a.exclude = none.patterns;
                a.exclude_extensions = none.extensions;
            }
            settings.validate()?;
            handle_report(&Runtime::new(settings)?, *repository_id)
        }
        Commands::List { limit, offset } => {
            let rt = Runtime::new(settings)?;
            let repos = rt.store().list_repositories(*limit, *offset)?;
            println!("{}", serde_json::to_string_pretty(&repos)?);
            Ok(())
        }
        Commands::Queue => {
            let rt = runtime(settings)?;
            println!("{}", rt.publisher().queue_length()?);
            Ok(())
        }
    }
}

/// Runtime for commands that enqueue; an in-memory queue would vanish with this process.
fn runtime(settings: Settings) -> Result<Runtime> {
    if settings.queue.backend == QueueBackend::Memory {
        warn!("queue backend is 'memory': jobs enqueued here are not visible to other processes");
    }
    Ok(Runtime::new(settings)?)
}

fn handle_worker(rt: &Runtime) -> Result<()> {
    let shutdown = CancelToken::new();
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handler.cancel();
    })
    .context("set Ctrl+C handler")?;

    info!(
        "worker: {} threads, mirrors in {}",
        rt.settings().worker.concurrency,
        rt.settings().worker.storage_path.display()
    );
    let consumer = rt.start_consumer(shutdown)?;
    consumer.join();
    Ok(())
}

fn handle_add(rt: &Runtime, url: &str, index: bool) -> Result<()> {
    let provider = detect_provider(url)?;
    if let Some(existing) = rt.store().get_repository_by_url(url)? {
        println!("{}", existing.id);
        return Ok(());
    }
    let repo = rt
        .store()
        .create_repository(&NewRepository::from_url(url, provider.as_str()))?;
    if index {
        rt.publisher().publish_index_job(repo.id)?;
    }
    println!("{}", repo.id);
    Ok(())
}

fn handle_enqueue(rt: &Runtime, kind: JobType, repository_id: i64) -> Result<()> {
    // Fail early on unknown ids; the worker would only log and drop the job.
    rt.store()
        .get_repository(repository_id)
        .with_context(|| format!("enqueue {kind}"))?;
    let job = Job::new(kind, Some(repository_id), Default::default());
    let id = rt.publisher().publish(&job)?;
    println!("{id}");
    Ok(())
}

fn handle_ingest(rt: &Runtime, repository_id: i64) -> Result<()> {
    let cancel = CancelToken::new();
    let cancel_handler = cancel.clone();
    ctrlc::set_handler(move || {
        cancel_handler.cancel();
    })
    .context("set Ctrl+C handler")?;
    let cancel = match rt.settings().worker.job_timeout {
        Some(t) => cancel.with_timeout(t),
        None => cancel,
    };
    let summary = rt.orchestrator().run(repository_id, &cancel)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn handle_report(rt: &Runtime, repository_id: i64) -> Result<()> {
    let report = analytics::build_report(rt.store(), repository_id, &rt.settings().analytics)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
