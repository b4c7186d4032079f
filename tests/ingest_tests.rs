//! Ingestion against real git repositories served over `file://`: mirror, snapshot,
//! history, status transitions, reruns and the analytics computed from the result.

mod common;

use chrono::NaiveDate;
use common::{BASE_TS, DAY, GitFixture, five_and_one, long_history};
use gitpulse::analytics::{
    BusFactorOptions, ChurnCategory, ChurnOptions, ExclusionSet, RiskLevel, bus_factor,
    commit_activity_as_of, high_churn_files,
};
use gitpulse::pipeline::{HistoryWalker, ingest_history_with_progress, walk_head};
use gitpulse::{CancelToken, Error, NewRepository, Orchestrator, RepoStatus, Store};
use tempfile::TempDir;

struct Env {
    store: Store,
    orchestrator: Orchestrator,
    _mirrors: TempDir,
}

fn env() -> Env {
    let mirrors = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    let orchestrator = Orchestrator::new(store.clone(), mirrors.path());
    Env {
        store,
        orchestrator,
        _mirrors: mirrors,
    }
}

fn register(store: &Store, url: &str) -> i64 {
    store
        .create_repository(&NewRepository::from_url(url, "local"))
        .unwrap()
        .id
}

#[test]
fn test_ingest_five_and_one() {
    let fx = five_and_one();
    let env = env();
    let id = register(&env.store, &fx.url());

    let summary = env.orchestrator.run(id, &CancelToken::new()).unwrap();
    assert_eq!(summary.commits, 5);
    assert_eq!(summary.contributors, 2);
    assert_eq!(summary.files, 2);

    let repo = env.store.get_repository(id).unwrap();
    assert_eq!(repo.status, RepoStatus::Completed);
    assert!(repo.last_indexed_at.is_some());
    let mirror = env.orchestrator.mirror_path(id);
    assert_eq!(repo.local_path.as_deref(), mirror.to_str());
    assert!(mirror.join("HEAD").exists());

    let files = env.store.list_files(id).unwrap();
    assert_eq!(files[0].path, "a.txt");
    assert_eq!(files[0].lines, 6);
    assert_eq!(files[0].language, "txt");
    assert_eq!(files[1].lines, 1);

    let contributors = env.store.list_contributors(id).unwrap();
    assert_eq!(contributors[0].email, "alice@example.com");
    assert_eq!(contributors[0].first_commit_at, BASE_TS);
    assert_eq!(contributors[0].last_commit_at, BASE_TS);
    assert_eq!(contributors[1].email, "bob@example.com");
    assert_eq!(contributors[1].name, "bob");
    assert_eq!(contributors[1].first_commit_at, BASE_TS + DAY);
    assert_eq!(contributors[1].last_commit_at, BASE_TS + 4 * DAY);
}

#[test]
fn test_churn_matches_change_events() {
    let fx = five_and_one();
    let env = env();
    let id = register(&env.store, &fx.url());
    env.orchestrator.run(id, &CancelToken::new()).unwrap();

    let churn = high_churn_files(&env.store, id, &ChurnOptions::default()).unwrap();
    assert_eq!(churn.len(), 2);
    assert_eq!(churn[0].file_path, "a.txt");
    assert_eq!(churn[0].commit_count, 5);
    assert_eq!(churn[0].churn_score, 100.0);
    assert_eq!(churn[0].category, ChurnCategory::Hotspot);
    assert_eq!(churn[0].last_modified, BASE_TS + 4 * DAY);
    assert_eq!(churn[1].file_path, "b.txt");
    assert_eq!(churn[1].commit_count, 1);

    let events = env.store.list_commit_files(id).unwrap();
    for file in &churn {
        let expected: i64 = events
            .iter()
            .filter(|e| e.file_path == file.file_path)
            .map(|e| e.additions + e.deletions)
            .sum();
        assert_eq!(file.lines_changed, expected);
    }
    // Grows one line per commit after the first: 1 + 2 + 1 + 1 + 1.
    assert_eq!(churn[0].lines_changed, 6);
}

#[test]
fn test_bus_factor_and_activity_after_ingest() {
    let fx = five_and_one();
    let env = env();
    let id = register(&env.store, &fx.url());
    env.orchestrator.run(id, &CancelToken::new()).unwrap();

    let report = bus_factor(
        &env.store,
        id,
        &BusFactorOptions::default(),
        &ExclusionSet::empty(),
    )
    .unwrap();
    // a.txt -> bob (5 added lines), b.txt -> alice; one owner covers half.
    assert_eq!(report.total_files, 2);
    assert_eq!(report.bus_factor, 1);
    assert_eq!(report.risk_level, RiskLevel::High);
    assert_eq!(report.top_contributors[0].email, "alice@example.com");
    assert_eq!(report.top_contributors[1].email, "bob@example.com");

    let today = NaiveDate::from_ymd_opt(2023, 11, 18).unwrap();
    let activity = commit_activity_as_of(&env.store, id, Some(7), today).unwrap();
    assert_eq!(activity.len(), 7);
    assert_eq!(activity.iter().map(|d| d.count).sum::<i64>(), 5);
    assert_eq!(activity[0].count, 0);
    assert_eq!(activity[6].date, today);
    assert_eq!(activity[6].count, 1);
}

#[test]
fn test_reingest_is_idempotent() {
    let fx = five_and_one();
    let env = env();
    let id = register(&env.store, &fx.url());

    env.orchestrator.run(id, &CancelToken::new()).unwrap();
    let counts = env.store.repository_counts(id).unwrap();
    let events = env.store.list_commit_files(id).unwrap();
    let commits = env.store.list_commits(id).unwrap();

    // Second run fetches into the existing mirror.
    env.orchestrator.run(id, &CancelToken::new()).unwrap();
    assert_eq!(env.store.repository_counts(id).unwrap(), counts);
    assert_eq!(env.store.list_commit_files(id).unwrap(), events);
    assert_eq!(env.store.list_commits(id).unwrap(), commits);
}

#[test]
fn test_update_picks_up_new_commits() {
    let fx = five_and_one();
    let env = env();
    let id = register(&env.store, &fx.url());
    env.orchestrator.run(id, &CancelToken::new()).unwrap();

    fx.commit(
        "carol@example.com",
        BASE_TS + 10 * DAY,
        &[("src/lib.rs", "fn a() {}\nfn b() {}\n")],
        &["b.txt"],
    );
    let summary = env.orchestrator.run(id, &CancelToken::new()).unwrap();
    assert_eq!(summary.commits, 6);
    assert_eq!(summary.contributors, 3);

    let paths: Vec<String> = env
        .store
        .list_files(id)
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec!["a.txt".to_string(), "src/lib.rs".to_string()]);

    // The deletion is an event on the old path.
    let deleted: Vec<_> = env
        .store
        .list_commit_files(id)
        .unwrap()
        .into_iter()
        .filter(|e| e.file_path == "b.txt" && e.deletions == 1)
        .collect();
    assert_eq!(deleted.len(), 1);
}

#[test]
fn test_cancelled_run_fails_then_rerun_recovers() {
    let fx = five_and_one();
    let env = env();
    let id = register(&env.store, &fx.url());
    env.orchestrator.run(id, &CancelToken::new()).unwrap();
    let clean = env.store.repository_counts(id).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = env.orchestrator.run(id, &cancel).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(env.store.get_repository(id).unwrap().status, RepoStatus::Failed);

    env.orchestrator.run(id, &CancelToken::new()).unwrap();
    assert_eq!(env.store.get_repository(id).unwrap().status, RepoStatus::Completed);
    assert_eq!(env.store.repository_counts(id).unwrap(), clean);
}

#[test]
fn test_cancel_mid_walk_then_rerun_matches_clean_run() {
    let fx = long_history(250);
    let env = env();
    let id = register(&env.store, &fx.url());
    env.orchestrator.run(id, &CancelToken::new()).unwrap();
    let clean_commits = env.store.list_commits(id).unwrap();
    let clean_events = env.store.list_commit_files(id).unwrap();
    let clean_counts = env.store.repository_counts(id).unwrap();
    assert_eq!(clean_commits.len(), 250);
    assert_eq!(clean_counts.contributors, 2);

    // Stop right after the first batch is committed.
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let err = ingest_history_with_progress(&env.store, id, &fx.repo, &cancel, |done| {
        if done >= 100 {
            trigger.cancel();
        }
    })
    .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    let partial = env.store.repository_counts(id).unwrap();
    assert_eq!(partial.commits, 100);
    assert!(partial.commit_files < clean_counts.commit_files);

    env.orchestrator.run(id, &CancelToken::new()).unwrap();
    assert_eq!(env.store.list_commits(id).unwrap(), clean_commits);
    assert_eq!(env.store.list_commit_files(id).unwrap(), clean_events);
    assert_eq!(env.store.repository_counts(id).unwrap(), clean_counts);
}

#[test]
fn test_failed_completion_write_marks_repository_failed() {
    let fx = five_and_one();
    let env = env();
    let id = register(&env.store, &fx.url());
    env.store
        .conn()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_completed BEFORE UPDATE ON repositories \
             WHEN NEW.status = 'completed' BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .unwrap();

    let err = env.orchestrator.run(id, &CancelToken::new()).unwrap_err();
    assert!(err.is_persistence());
    assert_eq!(env.store.get_repository(id).unwrap().status, RepoStatus::Failed);

    env.store
        .conn()
        .unwrap()
        .execute_batch("DROP TRIGGER reject_completed;")
        .unwrap();
    env.orchestrator.run(id, &CancelToken::new()).unwrap();
    assert_eq!(env.store.get_repository(id).unwrap().status, RepoStatus::Completed);
}

#[test]
fn test_history_walker_stops_on_cancel() {
    let fx = five_and_one();
    let cancel = CancelToken::new();
    let mut walker = HistoryWalker::new(&fx.repo, &cancel).unwrap();

    let first = walker.next().unwrap().unwrap();
    // Newest first.
    assert_eq!(first.commit.committed_at, BASE_TS + 4 * DAY);
    assert_eq!(first.files.len(), 1);
    assert_eq!(first.files[0].additions, 1);

    cancel.cancel();
    assert!(matches!(walker.next(), Some(Err(Error::Cancelled))));
    assert!(walker.next().is_none());
}

#[test]
fn test_history_walker_full_order() {
    let fx = five_and_one();
    let walker = HistoryWalker::new(&fx.repo, &CancelToken::new()).unwrap();
    let times: Vec<i64> = walker.map(|c| c.unwrap().commit.committed_at).collect();
    assert_eq!(
        times,
        (0..5).rev().map(|i| BASE_TS + i * DAY).collect::<Vec<_>>()
    );
}

#[test]
fn test_root_commit_diffs_against_empty_tree() {
    let fx = GitFixture::new();
    fx.commit(
        "solo@example.com",
        BASE_TS,
        &[("one.rs", "a\nb\nc\n"), ("dir/two.md", "x\n")],
        &[],
    );
    let changes: Vec<_> = HistoryWalker::new(&fx.repo, &CancelToken::new())
        .unwrap()
        .map(|c| c.unwrap())
        .collect();
    assert_eq!(changes.len(), 1);
    let files = &changes[0].files;
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].file_path, "dir/two.md");
    assert_eq!((files[0].additions, files[0].deletions), (1, 0));
    assert_eq!(files[1].file_path, "one.rs");
    assert_eq!((files[1].additions, files[1].deletions), (3, 0));
}

#[test]
fn test_empty_repository_walks_nothing() {
    let fx = GitFixture::new();
    let cancel = CancelToken::new();
    let count = walk_head(&fx.repo, &cancel, |_| Ok(())).unwrap();
    assert_eq!(count, 0);
    assert_eq!(HistoryWalker::new(&fx.repo, &cancel).unwrap().count(), 0);
}

#[test]
fn test_snapshot_skips_symlinks_and_counts_nested() {
    let fx = GitFixture::new();
    std::fs::create_dir_all(fx.path().join("deep/er")).unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink("one.rs", fx.path().join("link.rs")).unwrap();
    fx.commit(
        "solo@example.com",
        BASE_TS,
        &[("one.rs", "a\n"), ("deep/er/two.go", "x\ny")],
        &[],
    );

    let mut seen = Vec::new();
    let count = walk_head(&fx.repo, &CancelToken::new(), |f| {
        seen.push((f.path, f.language, f.lines));
        Ok(())
    })
    .unwrap();
    seen.sort();
    assert_eq!(count, 2);
    assert_eq!(
        seen,
        vec![
            ("deep/er/two.go".to_string(), "go".to_string(), 2),
            ("one.rs".to_string(), "rs".to_string(), 1),
        ]
    );
}

#[test]
fn test_missing_remote_marks_failed() {
    let env = env();
    let missing = tempfile::tempdir().unwrap();
    let url = format!("file://{}/does-not-exist", missing.path().display());
    let id = register(&env.store, &url);

    let err = env.orchestrator.run(id, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
    assert_eq!(env.store.get_repository(id).unwrap().status, RepoStatus::Failed);
}

#[test]
fn test_unsupported_url_marks_failed() {
    let env = env();
    let id = register(&env.store, "https://example.com/acme/repo.git");
    let err = env.orchestrator.run(id, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedProvider(_)));
    assert_eq!(env.store.get_repository(id).unwrap().status, RepoStatus::Failed);
}

#[test]
fn test_run_unknown_repository() {
    let env = env();
    assert!(matches!(
        env.orchestrator.run(99, &CancelToken::new()),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_broken_mirror_is_recloned() {
    let fx = five_and_one();
    let env = env();
    let id = register(&env.store, &fx.url());
    let mirror = env.orchestrator.mirror_path(id);
    std::fs::create_dir_all(&mirror).unwrap();
    std::fs::write(mirror.join("junk"), "not a repository").unwrap();

    let summary = env.orchestrator.run(id, &CancelToken::new()).unwrap();
    assert_eq!(summary.commits, 5);
    assert!(!mirror.join("junk").exists());
}
