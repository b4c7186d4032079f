//! Daily commit activity over a trailing window, zero-filled.

use chrono::{Days, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::engine::db_ops::Store;
use crate::error::{Error, Result};
use crate::utils::config::AnalyticsConsts;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivityDay {
    pub date: NaiveDate,
    pub count: i64,
    /// 0 = none, 1 = 1-2, 2 = 3-5, 3 = 6-10, 4 = more.
    pub level: u8,
}

pub fn activity_level(count: i64) -> u8 {
    match count {
        i64::MIN..=0 => 0,
        1..=2 => 1,
        3..=5 => 2,
        6..=10 => 3,
        _ => 4,
    }
}

/// Exactly `days` entries ending at `today` inclusive, oldest first.
pub fn fill_activity(counts: &HashMap<NaiveDate, i64>, today: NaiveDate, days: u32) -> Vec<ActivityDay> {
    let start = window_start(today, days);
    start
        .iter_days()
        .take(days as usize)
        .map(|date| {
            let count = counts.get(&date).copied().unwrap_or(0);
            ActivityDay {
                date,
                count,
                level: activity_level(count),
            }
        })
        .collect()
}

fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// Activity ending today (UTC). `days` of `None` or 0 means one year.
pub fn commit_activity(store: &Store, repo_id: i64, days: Option<u32>) -> Result<Vec<ActivityDay>> {
    commit_activity_as_of(store, repo_id, days, Utc::now().date_naive())
}

/// [`commit_activity`] with an explicit end date.
pub fn commit_activity_as_of(
    store: &Store,
    repo_id: i64,
    days: Option<u32>,
    today: NaiveDate,
) -> Result<Vec<ActivityDay>> {
    let days = days.filter(|d| *d > 0).unwrap_or(AnalyticsConsts::ACTIVITY_DAYS);
    let start = window_start(today, days);
    let since = start.and_time(NaiveTime::MIN).and_utc().timestamp();

    let mut counts = HashMap::new();
    for (date, count) in store.daily_commit_counts(repo_id, since)? {
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| Error::Validation(format!("stored commit date '{date}': {e}")))?;
        counts.insert(date, count);
    }
    Ok(fill_activity(&counts, today, days))
}
