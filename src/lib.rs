//! Gitpulse: mirror git repositories, ingest their history, and compute code-ownership analytics.
//!
//! The pieces compose as: [`queue::Publisher`] pushes [`queue::Job`]s onto a [`queue::JobBroker`];
//! a [`queue::Consumer`] pool hands them to [`worker::JobHandler`], which runs the
//! [`pipeline::Orchestrator`] (fetch, snapshot, history) against the [`engine::Store`].
//! [`analytics`] reads the persisted log back out.

pub mod analytics;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod types;
pub mod utils;
pub mod worker;

/// Re-export types for API
pub use types::*;

pub use engine::{Runtime, Store};
pub use error::{Error, Result};
pub use pipeline::{CancelToken, Orchestrator};
pub use utils::Settings;
