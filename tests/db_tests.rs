//! DB tests: repository records, batched ingestion writes, and the analytics reads.

use gitpulse::engine::Store;
use gitpulse::{
    CommitFileRecord, CommitRecord, ContributorRecord, Credential, Error, FileRecord,
    NewRepository, RepoStatus,
};

fn new_repo(store: &Store, url: &str) -> i64 {
    store
        .create_repository(&NewRepository::from_url(url, "github"))
        .unwrap()
        .id
}

fn commit(hash: &str, email: &str, at: i64) -> CommitRecord {
    CommitRecord {
        hash: hash.to_string(),
        author_email: email.to_string(),
        author_name: email.split('@').next().unwrap().to_string(),
        message: format!("commit {hash}"),
        committed_at: at,
    }
}

fn event(hash: &str, path: &str, additions: i64, deletions: i64) -> CommitFileRecord {
    CommitFileRecord {
        commit_hash: hash.to_string(),
        file_path: path.to_string(),
        additions,
        deletions,
    }
}

#[test]
fn test_create_and_get_repository() {
    let store = Store::open_in_memory().unwrap();
    let repo = store
        .create_repository(&NewRepository::from_url(
            "https://github.com/acme/widgets.git",
            "github",
        ))
        .unwrap();
    assert_eq!(repo.name, "widgets");
    assert_eq!(repo.status, RepoStatus::Queued);
    assert_eq!(repo.default_branch, "main");
    assert!(repo.local_path.is_none());
    assert!(repo.last_indexed_at.is_none());

    let by_id = store.get_repository(repo.id).unwrap();
    assert_eq!(by_id.url, repo.url);
    let by_url = store
        .get_repository_by_url("https://github.com/acme/widgets.git")
        .unwrap()
        .unwrap();
    assert_eq!(by_url.id, repo.id);
    assert!(
        store
            .get_repository_by_url("https://github.com/acme/other")
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_get_missing_repository_is_not_found() {
    let store = Store::open_in_memory().unwrap();
    assert!(matches!(store.get_repository(42), Err(Error::NotFound(_))));
    assert!(matches!(
        store.update_repository_status(42, RepoStatus::Indexing),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_duplicate_url_is_persistence_error() {
    let store = Store::open_in_memory().unwrap();
    new_repo(&store, "https://github.com/acme/a");
    let err = store
        .create_repository(&NewRepository::from_url("https://github.com/acme/a", "github"))
        .unwrap_err();
    assert!(err.is_persistence());
}

#[test]
fn test_list_repositories_pages_in_id_order() {
    let store = Store::open_in_memory().unwrap();
    let ids: Vec<i64> = (0..5)
        .map(|i| new_repo(&store, &format!("https://github.com/acme/r{i}")))
        .collect();
    let page = store.list_repositories(2, 1).unwrap();
    assert_eq!(
        page.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![ids[1], ids[2]]
    );
    assert_eq!(store.list_repositories(50, 0).unwrap().len(), 5);
}

#[test]
fn test_status_transitions_and_mark_indexed() {
    let store = Store::open_in_memory().unwrap();
    let id = new_repo(&store, "https://github.com/acme/a");
    store
        .update_repository_status(id, RepoStatus::Indexing)
        .unwrap();
    assert_eq!(store.get_repository(id).unwrap().status, RepoStatus::Indexing);

    store
        .mark_repository_indexed(id, "/srv/mirrors/1", 1_700_000_000)
        .unwrap();
    let repo = store.get_repository(id).unwrap();
    assert_eq!(repo.status, RepoStatus::Completed);
    assert!(repo.status.is_terminal());
    assert_eq!(repo.last_indexed_at, Some(1_700_000_000));
    assert_eq!(repo.local_path.as_deref(), Some("/srv/mirrors/1"));
}

#[test]
fn test_upsert_files_refreshes_existing_paths() {
    let store = Store::open_in_memory().unwrap();
    let id = new_repo(&store, "https://github.com/acme/a");
    let file = |path: &str, lines: i64| FileRecord {
        path: path.to_string(),
        language: "rs".to_string(),
        lines,
    };
    store
        .upsert_files(id, &[file("src/lib.rs", 10), file("src/main.rs", 3)])
        .unwrap();
    store.upsert_files(id, &[file("src/lib.rs", 12)]).unwrap();

    let files = store.list_files(id).unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0], file("src/lib.rs", 12));

    assert_eq!(store.clear_files(id).unwrap(), 2);
    assert!(store.list_files(id).unwrap().is_empty());
}

#[test]
fn test_commit_file_conflict_is_ignored() {
    let store = Store::open_in_memory().unwrap();
    let id = new_repo(&store, "https://github.com/acme/a");
    store
        .write_commits(
            id,
            &[commit("c1", "a@x.io", 100)],
            &[event("c1", "f.rs", 3, 0)],
        )
        .unwrap();
    // Same (commit, path) again with different numbers: first write wins.
    store
        .write_commits(
            id,
            &[commit("c1", "a@x.io", 100)],
            &[event("c1", "f.rs", 9, 9)],
        )
        .unwrap();

    let counts = store.repository_counts(id).unwrap();
    assert_eq!(counts.commits, 1);
    assert_eq!(counts.commit_files, 1);
    assert_eq!(store.list_commit_files(id).unwrap()[0], event("c1", "f.rs", 3, 0));
}

#[test]
fn test_contributor_merge_widens_range() {
    let store = Store::open_in_memory().unwrap();
    let id = new_repo(&store, "https://github.com/acme/a");
    let rec = |name: &str, first: i64, last: i64| ContributorRecord {
        email: "dev@x.io".to_string(),
        name: name.to_string(),
        first_commit_at: first,
        last_commit_at: last,
    };
    store.upsert_contributors(id, &[rec("Old", 200, 300)]).unwrap();
    store.upsert_contributors(id, &[rec("New", 100, 400)]).unwrap();
    // Older sighting: range stays, name stays with the newest.
    store.upsert_contributors(id, &[rec("Older", 250, 260)]).unwrap();

    let contributors = store.list_contributors(id).unwrap();
    assert_eq!(contributors, vec![rec("New", 100, 400)]);
}

#[test]
fn test_clear_history_only_touches_one_repository() {
    let store = Store::open_in_memory().unwrap();
    let a = new_repo(&store, "https://github.com/acme/a");
    let b = new_repo(&store, "https://github.com/acme/b");
    store
        .write_commits(a, &[commit("a1", "x@x.io", 1)], &[event("a1", "f", 1, 0)])
        .unwrap();
    store
        .write_commits(b, &[commit("b1", "x@x.io", 1)], &[event("b1", "f", 1, 0)])
        .unwrap();

    store.clear_history(a).unwrap();
    assert_eq!(store.repository_counts(a).unwrap().commits, 0);
    assert_eq!(store.repository_counts(a).unwrap().commit_files, 0);
    assert_eq!(store.repository_counts(b).unwrap().commits, 1);
}

#[test]
fn test_delete_repository_removes_all_rows() {
    let store = Store::open_in_memory().unwrap();
    let id = new_repo(&store, "https://github.com/acme/a");
    store
        .upsert_files(
            id,
            &[FileRecord {
                path: "f".to_string(),
                language: "Plain Text".to_string(),
                lines: 1,
            }],
        )
        .unwrap();
    store
        .write_commits(id, &[commit("c1", "x@x.io", 1)], &[event("c1", "f", 1, 0)])
        .unwrap();

    assert!(store.delete_repository(id).unwrap());
    assert!(matches!(store.get_repository(id), Err(Error::NotFound(_))));
    let counts = store.repository_counts(id).unwrap();
    assert_eq!(counts.files + counts.commits + counts.commit_files, 0);
    assert!(!store.delete_repository(id).unwrap());
}

#[test]
fn test_ownership_and_churn_rows() {
    let store = Store::open_in_memory().unwrap();
    let id = new_repo(&store, "https://github.com/acme/a");
    store
        .write_commits(
            id,
            &[
                commit("c1", "alice@x.io", 1_000),
                commit("c2", "bob@x.io", 2_000),
                commit("c3", "alice@x.io", 3_000),
            ],
            &[
                event("c1", "a.rs", 10, 0),
                event("c2", "a.rs", 4, 2),
                event("c3", "a.rs", 1, 1),
                event("c3", "b.rs", 7, 0),
            ],
        )
        .unwrap();

    let mut owners = store.ownership_rows(id, None).unwrap();
    owners.sort_by(|x, y| (&x.path, &x.email).cmp(&(&y.path, &y.email)));
    let flat: Vec<(&str, &str, i64)> = owners
        .iter()
        .map(|r| (r.path.as_str(), r.email.as_str(), r.additions))
        .collect();
    assert_eq!(
        flat,
        vec![
            ("a.rs", "alice@x.io", 11),
            ("a.rs", "bob@x.io", 4),
            ("b.rs", "alice@x.io", 7),
        ]
    );

    let mut churn = store.churn_rows(id, None).unwrap();
    churn.sort_by(|x, y| x.path.cmp(&y.path));
    assert_eq!(churn[0].commit_count, 3);
    assert_eq!(churn[0].lines_changed, 18);
    assert_eq!(churn[0].last_modified, 3_000);

    let recent = store.churn_rows(id, Some(2_500)).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|r| r.commit_count == 1));
}

#[test]
fn test_ownership_rows_active_filter() {
    let store = Store::open_in_memory().unwrap();
    let id = new_repo(&store, "https://github.com/acme/a");
    store
        .write_commits(
            id,
            &[commit("c1", "old@x.io", 100), commit("c2", "new@x.io", 5_000)],
            &[event("c1", "a", 5, 0), event("c2", "b", 5, 0)],
        )
        .unwrap();
    store
        .upsert_contributors(
            id,
            &[
                ContributorRecord {
                    email: "old@x.io".to_string(),
                    name: "old".to_string(),
                    first_commit_at: 100,
                    last_commit_at: 100,
                },
                ContributorRecord {
                    email: "new@x.io".to_string(),
                    name: "new".to_string(),
                    first_commit_at: 5_000,
                    last_commit_at: 5_000,
                },
            ],
        )
        .unwrap();

    let active = store.ownership_rows(id, Some(1_000)).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].email, "new@x.io");
}

#[test]
fn test_daily_commit_counts_group_by_utc_day() {
    let store = Store::open_in_memory().unwrap();
    let id = new_repo(&store, "https://github.com/acme/a");
    // 2023-11-14 22:13:20, 2023-11-14 23:59:59, 2023-11-15 00:00:00 UTC.
    store
        .write_commits(
            id,
            &[
                commit("c1", "a@x.io", 1_700_000_000),
                commit("c2", "a@x.io", 1_700_006_399),
                commit("c3", "a@x.io", 1_700_006_400),
            ],
            &[],
        )
        .unwrap();
    let days = store.daily_commit_counts(id, 0).unwrap();
    assert_eq!(
        days,
        vec![
            ("2023-11-14".to_string(), 2),
            ("2023-11-15".to_string(), 1)
        ]
    );
}

#[test]
fn test_users_and_credentials() {
    let store = Store::open_in_memory().unwrap();
    let user = store.create_user("dev@x.io", Some("Dev")).unwrap();
    assert_eq!(store.get_user(user.id).unwrap().email, "dev@x.io");
    assert!(store.find_credential(user.id, "github").unwrap().is_none());

    let mut cred = Credential {
        user_id: user.id,
        provider: "github".to_string(),
        provider_user_id: "1234".to_string(),
        access_token: "first".to_string(),
        refresh_token: None,
        token_expiry: None,
    };
    store.save_credential(&cred).unwrap();
    cred.access_token = "second".to_string();
    store.save_credential(&cred).unwrap();

    let found = store.find_credential(user.id, "github").unwrap().unwrap();
    assert_eq!(found.access_token, "second");
    assert_eq!(found.provider_user_id, "1234");
}

#[test]
fn test_file_store_reopens_with_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("gitpulse.db");
    let id = {
        let store = Store::open_path(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        new_repo(&store, "https://github.com/acme/a")
    };
    let store = Store::open_path(&path).unwrap();
    assert_eq!(store.get_repository(id).unwrap().name, "a");
}
