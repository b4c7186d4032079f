//! Job handling: dispatch by type, per-repository locking, provider discovery.

pub mod handler;
pub mod locks;
pub mod providers;

pub use handler::{DiscoverOutcome, JobHandler};
pub use locks::{RepoLockGuard, RepoLocks};
pub use providers::{GitHubProvider, ProviderRegistry, RepositoryProvider};
