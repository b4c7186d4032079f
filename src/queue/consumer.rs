//! Consumer pool: N worker threads popping from one broker and dispatching synchronously.
//! No retry, backoff or dead-letter: a failed job is logged and dropped.

use log::{error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::pipeline::cancel::CancelToken;
use crate::queue::broker::JobBroker;
use crate::queue::job::Job;

/// Pause after a broker error before polling again.
const BROKER_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Processes one job. Implemented by the worker's dispatcher.
pub trait HandleJob: Send + Sync {
    fn handle(&self, job: &Job, cancel: &CancelToken) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct ConsumerOptions {
    pub concurrency: usize,
    pub pop_timeout: Duration,
    /// Deadline handed to each job's cancel token.
    pub job_timeout: Option<Duration>,
}

pub struct Consumer {
    shutdown: CancelToken,
    handles: Vec<JoinHandle<()>>,
}

impl Consumer {
    /// Spawn `opts.concurrency` workers. They run until [`Consumer::stop`] or the shutdown token fires.
    pub fn start(
        broker: Arc<dyn JobBroker>,
        handler: Arc<dyn HandleJob>,
        opts: ConsumerOptions,
        shutdown: CancelToken,
    ) -> Result<Self> {
        if opts.concurrency < 1 {
            return Err(Error::Validation(
                "concurrency must be at least 1".to_string(),
            ));
        }
        info!("starting consumer with {} workers", opts.concurrency);
        let mut handles = Vec::with_capacity(opts.concurrency);
        for id in 0..opts.concurrency {
            let broker = Arc::clone(&broker);
            let handler = Arc::clone(&handler);
            let shutdown = shutdown.clone();
            let opts = opts.clone();
            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker_loop(id, broker.as_ref(), handler.as_ref(), &shutdown, &opts))?;
            handles.push(handle);
        }
        Ok(Self { shutdown, handles })
    }

    pub fn shutdown_token(&self) -> CancelToken {
        self.shutdown.clone()
    }

    /// Signal shutdown (in-flight jobs see it at their next cancel check) and join the workers.
    pub fn stop(self) {
        self.shutdown.cancel();
        self.join();
    }

    /// Wait for the workers to exit. Returns once the shutdown token has fired and jobs finished.
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        info!("consumer stopped");
    }
}

fn worker_loop(
    id: usize,
    broker: &dyn JobBroker,
    handler: &dyn HandleJob,
    shutdown: &CancelToken,
    opts: &ConsumerOptions,
) {
    info!("worker {} started", id);
    while !shutdown.is_cancelled() {
        let raw = match broker.pop(opts.pop_timeout) {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(e) => {
                error!("worker {}: broker pop failed: {}", id, e);
                thread::sleep(BROKER_ERROR_BACKOFF.min(opts.pop_timeout));
                continue;
            }
        };
        let job = match Job::from_json(&raw) {
            Ok(job) => job,
            Err(e) => {
                warn!("worker {}: dropping malformed job: {}", id, e);
                continue;
            }
        };
        let cancel = match opts.job_timeout {
            Some(timeout) => shutdown.with_timeout(timeout),
            None => shutdown.clone(),
        };
        info!(
            "worker {}: processing {} job {} (repository {:?})",
            id, job.kind, job.id, job.repository_id
        );
        match handler.handle(&job, &cancel) {
            Ok(()) => info!("worker {}: job {} done", id, job.id),
            Err(e) => error!("worker {}: job {} failed, dropping: {}", id, job.id, e),
        }
    }
    info!("worker {} stopped", id);
}
