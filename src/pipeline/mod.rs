//! Ingestion pipeline: remote fetch, HEAD snapshot, history walk, orchestration.

pub mod cancel;
pub mod fetch;
pub mod history;
pub mod orchestrator;
pub mod snapshot;

pub use cancel::CancelToken;
pub use fetch::{Provider, detect_provider, open_or_clone};
pub use history::{
    CommitChanges, HistoryOutcome, HistoryWalker, ingest_history, ingest_history_with_progress,
};
pub use orchestrator::Orchestrator;
pub use snapshot::{count_lines, language_for, rebuild_snapshot, walk_head};
