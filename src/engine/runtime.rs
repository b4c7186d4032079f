//! Wiring from [`Settings`]: store, broker, providers, and the pieces built on them.

use std::sync::Arc;

use crate::engine::db_ops::Store;
use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::orchestrator::Orchestrator;
use crate::queue::{ChannelBroker, Consumer, ConsumerOptions, JobBroker, Publisher, SqliteBroker};
use crate::utils::settings::{QueueBackend, Settings};
use crate::worker::{JobHandler, ProviderRegistry};

pub struct Runtime {
    settings: Settings,
    store: Store,
    broker: Arc<dyn JobBroker>,
    providers: Arc<ProviderRegistry>,
}

impl Runtime {
    /// Open the database and the configured broker; register the built-in providers.
    pub fn new(settings: Settings) -> Result<Self> {
        let store = Store::open(&settings.database)?;
        let broker: Arc<dyn JobBroker> = match settings.queue.backend {
            QueueBackend::Sqlite => Arc::new(SqliteBroker::new(store.clone(), &settings.queue.name)),
            QueueBackend::Memory => Arc::new(ChannelBroker::new()),
        };
        Ok(Self::with_parts(
            settings,
            store,
            broker,
            Arc::new(ProviderRegistry::with_defaults()),
        ))
    }

    /// Assemble from existing parts (embedding, tests).
    pub fn with_parts(
        settings: Settings,
        store: Store,
        broker: Arc<dyn JobBroker>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            settings,
            store,
            broker,
            providers,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(Arc::clone(&self.broker))
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.store.clone(), &self.settings.worker.storage_path)
    }

    pub fn handler(&self) -> JobHandler {
        JobHandler::new(self.orchestrator(), Arc::clone(&self.providers))
    }

    /// Start the worker pool; it runs until `shutdown` fires.
    pub fn start_consumer(&self, shutdown: CancelToken) -> Result<Consumer> {
        Consumer::start(
            Arc::clone(&self.broker),
            Arc::new(self.handler()),
            ConsumerOptions {
                concurrency: self.settings.worker.concurrency,
                pop_timeout: self.settings.queue.pop_timeout,
                job_timeout: self.settings.worker.job_timeout,
            },
            shutdown,
        )
    }
}
