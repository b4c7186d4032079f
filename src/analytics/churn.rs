//! Churn: per-file change frequency and volume, scored against the busiest file.

use serde::Serialize;

use crate::engine::db_ops::{ChurnRow, Store, unix_now};
use crate::error::Result;
use crate::utils::config::AnalyticsConsts;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChurnCategory {
    /// Both frequently and heavily changed.
    Hotspot,
    Frequent,
    Massive,
    Stable,
}

impl ChurnCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChurnCategory::Hotspot => "hotspot",
            ChurnCategory::Frequent => "frequent",
            ChurnCategory::Massive => "massive",
            ChurnCategory::Stable => "stable",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileChurn {
    pub file_path: String,
    pub commit_count: i64,
    pub lines_changed: i64,
    /// 0..=100, one decimal.
    pub churn_score: f64,
    pub category: ChurnCategory,
    pub last_modified: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChurnOptions {
    /// Keep only the top K files.
    pub limit: Option<usize>,
    /// Only count commits from the last N days.
    pub days: Option<u32>,
}

/// `0.7 * commits/max_commits + 0.3 * ln(1+lines)/ln(1+max_lines)`, scaled to 0..=100 and
/// rounded to one decimal. 0 when either maximum is 0.
pub fn churn_score(commits: i64, lines: i64, max_commits: i64, max_lines: i64) -> f64 {
    if max_commits <= 0 || max_lines <= 0 {
        return 0.0;
    }
    let norm_commits = commits as f64 / max_commits as f64;
    let norm_lines = (lines as f64).ln_1p() / (max_lines as f64).ln_1p();
    let score = norm_commits * AnalyticsConsts::CHURN_FREQUENCY_WEIGHT
        + norm_lines * AnalyticsConsts::CHURN_VOLUME_WEIGHT;
    (score * 1000.0).round() / 10.0
}

pub fn categorize(commits: i64, lines: i64, max_commits: i64, max_lines: i64) -> ChurnCategory {
    if max_commits <= 0 {
        return ChurnCategory::Stable;
    }
    let high_freq = commits as f64 >= max_commits as f64 * AnalyticsConsts::CHURN_HIGH_RATIO;
    let high_volume = lines as f64 >= max_lines as f64 * AnalyticsConsts::CHURN_HIGH_RATIO;
    match (high_freq, high_volume) {
        (true, true) => ChurnCategory::Hotspot,
        (true, false) => ChurnCategory::Frequent,
        (false, true) => ChurnCategory::Massive,
        (false, false) => ChurnCategory::Stable,
    }
}

/// Score and order rows: commit_count desc, lines_changed desc, path asc.
/// Maxima come from all rows, before the `limit` cut.
pub fn rank_churn(rows: Vec<ChurnRow>, limit: Option<usize>) -> Vec<FileChurn> {
    let max_commits = rows.iter().map(|r| r.commit_count).max().unwrap_or(0);
    let max_lines = rows.iter().map(|r| r.lines_changed).max().unwrap_or(0);

    let mut ranked: Vec<FileChurn> = rows
        .into_iter()
        .map(|r| FileChurn {
            churn_score: churn_score(r.commit_count, r.lines_changed, max_commits, max_lines),
            category: categorize(r.commit_count, r.lines_changed, max_commits, max_lines),
            file_path: r.path,
            commit_count: r.commit_count,
            lines_changed: r.lines_changed,
            last_modified: r.last_modified,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.commit_count
            .cmp(&a.commit_count)
            .then_with(|| b.lines_changed.cmp(&a.lines_changed))
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    if let Some(k) = limit {
        ranked.truncate(k);
    }
    ranked
}

/// Highest-churn files of a stored repository.
pub fn high_churn_files(store: &Store, repo_id: i64, opts: &ChurnOptions) -> Result<Vec<FileChurn>> {
    let since = opts
        .days
        .filter(|d| *d > 0)
        .map(|d| unix_now() - i64::from(d) * 86_400);
    let rows = store.churn_rows(repo_id, since)?;
    Ok(rank_churn(rows, opts.limit))
}
