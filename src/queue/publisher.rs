//! Producer side: build typed jobs and append them to the broker.

use log::debug;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::queue::broker::JobBroker;
use crate::queue::job::{Job, JobType};

#[derive(Clone)]
pub struct Publisher {
    broker: Arc<dyn JobBroker>,
}

impl Publisher {
    pub fn new(broker: Arc<dyn JobBroker>) -> Self {
        Self { broker }
    }

    /// Serialize and append `job`. Returns its id.
    pub fn publish(&self, job: &Job) -> Result<Uuid> {
        self.broker.push(&job.to_json()?)?;
        debug!(
            "published {} job {} (repository {:?})",
            job.kind, job.id, job.repository_id
        );
        Ok(job.id)
    }

    pub fn publish_index_job(&self, repository_id: i64) -> Result<Uuid> {
        self.publish(&Job::new(JobType::Index, Some(repository_id), Map::new()))
    }

    pub fn publish_update_job(&self, repository_id: i64) -> Result<Uuid> {
        self.publish(&Job::new(JobType::Update, Some(repository_id), Map::new()))
    }

    pub fn publish_delete_job(&self, repository_id: i64) -> Result<Uuid> {
        self.publish(&Job::new(JobType::Delete, Some(repository_id), Map::new()))
    }

    /// Ask a worker to list `user_id`'s repositories on `provider` and register unknown ones.
    pub fn publish_discover_job(&self, user_id: i64, provider: &str) -> Result<Uuid> {
        let mut payload = Map::new();
        payload.insert("user_id".into(), Value::from(user_id));
        payload.insert("provider".into(), Value::from(provider));
        self.publish(&Job::new(JobType::Discover, None, payload))
    }

    pub fn queue_length(&self) -> Result<usize> {
        self.broker.len()
    }
}
