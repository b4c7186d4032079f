//! Shared fixtures: throwaway git repositories built with git2, served over `file://`.

#![allow(dead_code)]

use git2::{Commit, IndexAddOption, Oid, Repository, Signature, Time};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// 2023-11-14 22:13:20 UTC.
pub const BASE_TS: i64 = 1_700_000_000;
pub const DAY: i64 = 86_400;

pub struct GitFixture {
    pub dir: TempDir,
    pub repo: Repository,
}

impl GitFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.dir.path().display())
    }

    /// Write `files`, remove `removed`, and commit everything as `email` at `at`.
    pub fn commit(
        &self,
        email: &str,
        at: i64,
        files: &[(&str, &str)],
        removed: &[&str],
    ) -> Oid {
        for (path, content) in files {
            let full = self.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&full, content).unwrap();
        }
        for path in removed {
            fs::remove_file(self.path().join(path)).unwrap();
        }
        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let name = email.split('@').next().unwrap();
        let sig = Signature::new(name, email, &Time::new(at, 0)).unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(
                Some("HEAD"),
                &sig,
                &sig,
                &format!("change at {at}"),
                &tree,
                &parents,
            )
            .unwrap()
    }
}

/// `a.txt` touched by five commits (alice creates it, bob grows it four times), `b.txt` by one.
pub fn five_and_one() -> GitFixture {
    let fx = GitFixture::new();
    fx.commit(
        "alice@example.com",
        BASE_TS,
        &[("a.txt", "1\n"), ("b.txt", "x\n")],
        &[],
    );
    let mut content = String::from("1\n2\n");
    for i in 1..=4 {
        content.push_str(&format!("{}\n", i + 2));
        fx.commit("bob@example.com", BASE_TS + i * DAY, &[("a.txt", content.as_str())], &[]);
    }
    fx
}

/// `n` commits a minute apart, alternating between two authors and rotating over five files.
pub fn long_history(n: i64) -> GitFixture {
    let fx = GitFixture::new();
    for i in 0..n {
        let email = if i % 2 == 0 {
            "alice@example.com"
        } else {
            "bob@example.com"
        };
        let path = format!("f{}.txt", i % 5);
        let content = format!("{i}\n");
        fx.commit(email, BASE_TS + i * 60, &[(path.as_str(), content.as_str())], &[]);
    }
    fx
}
