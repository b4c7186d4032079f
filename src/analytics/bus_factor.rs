//! Bus factor: the fewest contributors whose owned files reach a share of all owned files.
//!
//! A file's owner is the author with the strictly largest cumulative additions to it; ties go
//! to the lexicographically smallest email. Files nobody added lines to have no owner.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::analytics::exclusions::ExclusionSet;
use crate::engine::db_ops::{OwnershipRow, Store, unix_now};
use crate::error::Result;
use crate::utils::config::AnalyticsConsts;

const SECS_PER_DAY: i64 = 86_400;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    /// No owned files.
    Unknown,
}

impl RiskLevel {
    pub fn from_bus_factor(bus_factor: usize) -> Self {
        match bus_factor {
            0 => RiskLevel::Unknown,
            1 => RiskLevel::High,
            2 | 3 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
            RiskLevel::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContributorOwnership {
    pub email: String,
    pub name: String,
    pub files_owned: usize,
    pub ownership_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BusFactorReport {
    pub bus_factor: usize,
    pub threshold: f64,
    pub total_files: usize,
    /// Every owner, most files first (ties by email).
    pub top_contributors: Vec<ContributorOwnership>,
    pub risk_level: RiskLevel,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BusFactorOptions {
    /// Share in (0, 1]; 0.5 means half of the owned files.
    pub threshold: f64,
    /// Only authors whose last commit falls within this many days.
    pub active_days: Option<u32>,
}

impl Default for BusFactorOptions {
    fn default() -> Self {
        Self {
            threshold: AnalyticsConsts::BUS_FACTOR_THRESHOLD,
            active_days: None,
        }
    }
}

/// Owner per path (path -> email), skipping excluded paths and zero-addition entries.
pub fn file_owners(rows: &[OwnershipRow], exclusions: &ExclusionSet) -> BTreeMap<String, String> {
    let mut best: BTreeMap<&str, (&str, i64)> = BTreeMap::new();
    for row in rows {
        if row.additions <= 0 || exclusions.is_excluded(&row.path) {
            continue;
        }
        best.entry(row.path.as_str())
            .and_modify(|(email, additions)| {
                if row.additions > *additions
                    || (row.additions == *additions && row.email.as_str() < *email)
                {
                    *email = row.email.as_str();
                    *additions = row.additions;
                }
            })
            .or_insert((row.email.as_str(), row.additions));
    }
    best.into_iter()
        .map(|(path, (email, _))| (path.to_string(), email.to_string()))
        .collect()
}

/// Rank owners and count how many are needed to reach `threshold` of the owned files.
pub fn compute_bus_factor(
    owners: &BTreeMap<String, String>,
    names: &HashMap<String, String>,
    threshold: f64,
) -> BusFactorReport {
    let total_files = owners.len();
    if total_files == 0 {
        return BusFactorReport {
            bus_factor: 0,
            threshold,
            total_files: 0,
            top_contributors: Vec::new(),
            risk_level: RiskLevel::Unknown,
        };
    }

    let mut owned: HashMap<&str, usize> = HashMap::new();
    for email in owners.values() {
        *owned.entry(email.as_str()).or_default() += 1;
    }
    let mut ranking: Vec<ContributorOwnership> = owned
        .into_iter()
        .map(|(email, files_owned)| ContributorOwnership {
            email: email.to_string(),
            name: names.get(email).cloned().unwrap_or_default(),
            files_owned,
            ownership_pct: files_owned as f64 * 100.0 / total_files as f64,
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.files_owned
            .cmp(&a.files_owned)
            .then_with(|| a.email.cmp(&b.email))
    });

    // Compare file counts rather than summed percentages to avoid float drift.
    let target = threshold * total_files as f64;
    let mut bus_factor = 0;
    let mut cumulative = 0_usize;
    for c in &ranking {
        bus_factor += 1;
        cumulative += c.files_owned;
        if cumulative as f64 >= target {
            break;
        }
    }

    BusFactorReport {
        bus_factor,
        threshold,
        total_files,
        top_contributors: ranking,
        risk_level: RiskLevel::from_bus_factor(bus_factor),
    }
}

/// Bus factor of a stored repository.
pub fn bus_factor(
    store: &Store,
    repo_id: i64,
    opts: &BusFactorOptions,
    exclusions: &ExclusionSet,
) -> Result<BusFactorReport> {
    let active_since = opts
        .active_days
        .map(|days| unix_now() - i64::from(days) * SECS_PER_DAY);
    let rows = store.ownership_rows(repo_id, active_since)?;
    let owners = file_owners(&rows, exclusions);
    let names: HashMap<String, String> = store
        .list_contributors(repo_id)?
        .into_iter()
        .map(|c| (c.email, c.name))
        .collect();
    Ok(compute_bus_factor(&owners, &names, opts.threshold))
}
