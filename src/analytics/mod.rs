//! Analytics engine: bus factor, churn and commit activity, computed on demand from the
//! persisted commit and change-event log.

pub mod activity;
pub mod bus_factor;
pub mod churn;
pub mod exclusions;

pub use activity::{ActivityDay, activity_level, commit_activity, commit_activity_as_of};
pub use bus_factor::{
    BusFactorOptions, BusFactorReport, ContributorOwnership, RiskLevel, bus_factor,
    compute_bus_factor, file_owners,
};
pub use churn::{ChurnCategory, ChurnOptions, FileChurn, high_churn_files, rank_churn};
pub use exclusions::{ExclusionConfig, ExclusionSet};

use serde::Serialize;

use crate::engine::db_ops::{RepositoryCounts, Store};
use crate::error::Result;
use crate::types::Repository;
use crate::utils::settings::AnalyticsSettings;

/// Everything the CLI prints for one repository.
#[derive(Clone, Debug, Serialize)]
pub struct RepositoryReport {
    pub repository: Repository,
    pub counts: RepositoryCounts,
    pub bus_factor: BusFactorReport,
    pub churn: Vec<FileChurn>,
    pub activity: Vec<ActivityDay>,
}

pub fn build_report(store: &Store, repo_id: i64, settings: &AnalyticsSettings) -> Result<RepositoryReport> {
    let repository = store.get_repository(repo_id)?;
    let exclusions = ExclusionConfig::from_settings(settings).build()?;
    let bus = bus_factor(
        store,
        repo_id,
        &BusFactorOptions {
            threshold: settings.bus_factor_threshold,
            active_days: settings.active_days,
        },
        &exclusions,
    )?;
    let churn = high_churn_files(
        store,
        repo_id,
        &ChurnOptions {
            limit: Some(settings.churn_limit),
            days: None,
        },
    )?;
    let activity = commit_activity(store, repo_id, Some(settings.activity_days))?;
    Ok(RepositoryReport {
        counts: store.repository_counts(repo_id)?,
        repository,
        bus_factor: bus,
        churn,
        activity,
    })
}
