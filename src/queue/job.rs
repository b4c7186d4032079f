//! Job wire format: JSON objects pushed onto the queue list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::utils::config::QueueConsts;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Index,
    Update,
    Delete,
    Discover,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Index => "index",
            JobType::Update => "update",
            JobType::Delete => "delete",
            JobType::Discover => "discover",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Absent for `discover`, which targets a user instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: JobType,
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    QueueConsts::DEFAULT_MAX_RETRIES
}

impl Job {
    pub fn new(kind: JobType, repository_id: Option<i64>, payload: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            repository_id,
            kind,
            payload,
            created_at: Utc::now(),
            retries: 0,
            max_retries: QueueConsts::DEFAULT_MAX_RETRIES,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Validation(format!("encode job: {e}")))
    }

    /// Decode a queue value; malformed input is a validation error.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Validation(format!("decode job: {e}")))
    }

    /// Target repository of index/update/delete jobs.
    pub fn require_repository(&self) -> Result<i64> {
        self.repository_id
            .ok_or_else(|| Error::Validation(format!("{} job {} has no repository_id", self.kind, self.id)))
    }

    /// String field of the payload.
    pub fn payload_str(&self, key: &str) -> Result<&str> {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation(format!("{} job {}: payload.{key} missing", self.kind, self.id)))
    }

    /// Integer field of the payload; numeric strings are accepted.
    pub fn payload_i64(&self, key: &str) -> Result<i64> {
        let value = match self.payload.get(key) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        value.ok_or_else(|| Error::Validation(format!("{} job {}: payload.{key} missing", self.kind, self.id)))
    }
}
