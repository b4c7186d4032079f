//! History walker: stream commits from HEAD (newest first) with their per-file line changes,
//! and persist them in bounded batches.

use git2::{Commit, Delta, Diff, Oid, Patch, Repository, Revwalk, Sort};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};

use crate::engine::db_ops::Store;
use crate::error::{Result, walk_err};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::snapshot::head_tree;
use crate::types::{CommitFileRecord, CommitRecord, ContributorRecord};
use crate::utils::config::BatchConsts;

/// One commit and the paths it touched relative to its first parent.
#[derive(Clone, Debug)]
pub struct CommitChanges {
    pub commit: CommitRecord,
    pub files: Vec<CommitFileRecord>,
}

/// Lazy iterator over the history reachable from HEAD, in commit-time-descending order.
///
/// Checks the cancel token before each commit; once cancelled (or after a walk error) it
/// yields that error and then ends.
pub struct HistoryWalker<'repo> {
    repo: &'repo Repository,
    revwalk: Option<Revwalk<'repo>>,
    cancel: CancelToken,
}

impl<'repo> HistoryWalker<'repo> {
    pub fn new(repo: &'repo Repository, cancel: &CancelToken) -> Result<Self> {
        let revwalk = if head_tree(repo)?.is_some() {
            let mut walk = repo.revwalk().map_err(walk_err("start revwalk"))?;
            walk.set_sorting(Sort::TIME)
                .map_err(walk_err("set revwalk order"))?;
            walk.push_head().map_err(walk_err("push HEAD"))?;
            Some(walk)
        } else {
            None
        };
        Ok(Self {
            repo,
            revwalk,
            cancel: cancel.clone(),
        })
    }

    fn load(&self, oid: Oid) -> Result<CommitChanges> {
        let commit = self.repo.find_commit(oid).map_err(walk_err("read commit"))?;
        let hash = oid.to_string();
        let author = commit.author();
        let record = CommitRecord {
            hash: hash.clone(),
            author_email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
            author_name: String::from_utf8_lossy(author.name_bytes()).into_owned(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            committed_at: author.when().seconds(),
        };
        let files = match diff_against_parent(self.repo, &commit, &hash) {
            Ok(files) => files,
            Err(e) => {
                warn!(
                    "{}: diff failed, recording no file changes: {}",
                    &hash[..hash.len().min(12)],
                    e.message()
                );
                Vec::new()
            }
        };
        Ok(CommitChanges {
            commit: record,
            files,
        })
    }
}

impl Iterator for HistoryWalker<'_> {
    type Item = Result<CommitChanges>;

    fn next(&mut self) -> Option<Self::Item> {
        self.revwalk.as_ref()?;
        if let Err(e) = self.cancel.check() {
            self.revwalk = None;
            return Some(Err(e));
        }
        let next = self.revwalk.as_mut()?.next()?;
        let item = next
            .map_err(walk_err("walk history"))
            .and_then(|oid| self.load(oid));
        if item.is_err() {
            self.revwalk = None;
        }
        Some(item)
    }
}

/// Per-path additions/deletions of `commit` against its first parent (root: the empty tree).
/// Binary deltas count as 0/0; deletions are reported under the old path.
fn diff_against_parent(
    repo: &Repository,
    commit: &Commit<'_>,
    hash: &str,
) -> std::result::Result<Vec<CommitFileRecord>, git2::Error> {
    let tree = commit.tree()?;
    let parent_tree = if commit.parent_count() > 0 {
        Some(commit.parent(0)?.tree()?)
    } else {
        None
    };
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    let per_path = line_stats_by_path(&diff)?;
    Ok(per_path
        .into_iter()
        .map(|(file_path, (additions, deletions))| CommitFileRecord {
            commit_hash: hash.to_string(),
            file_path,
            additions,
            deletions,
        })
        .collect())
}

fn line_stats_by_path(diff: &Diff<'_>) -> std::result::Result<BTreeMap<String, (i64, i64)>, git2::Error> {
    let mut per_path: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };
        let file = if delta.status() == Delta::Deleted {
            delta.old_file()
        } else {
            delta.new_file()
        };
        let Some(path) = file.path() else {
            continue;
        };
        let path = path.to_string_lossy().into_owned();
        let (adds, dels) = match Patch::from_diff(diff, idx)? {
            Some(patch) => {
                let (_context, adds, dels) = patch.line_stats()?;
                (adds as i64, dels as i64)
            }
            None => (0, 0),
        };
        let slot = per_path.entry(path).or_insert((0, 0));
        slot.0 += adds;
        slot.1 += dels;
    }
    Ok(per_path)
}

/// Totals of one history phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistoryOutcome {
    pub commits: usize,
    pub contributors: usize,
}

/// Run-scoped buffers, flushed together every [`BatchConsts::COMMITS`] commits.
#[derive(Default)]
struct HistoryBatch {
    commits: Vec<CommitRecord>,
    events: Vec<CommitFileRecord>,
    contributors: HashMap<String, ContributorRecord>,
}

impl HistoryBatch {
    fn push(&mut self, changes: CommitChanges) {
        let c = &changes.commit;
        self.contributors
            .entry(c.author_email.clone())
            .and_modify(|rec| rec.merge(&c.author_name, c.committed_at))
            .or_insert_with(|| ContributorRecord {
                email: c.author_email.clone(),
                name: c.author_name.clone(),
                first_commit_at: c.committed_at,
                last_commit_at: c.committed_at,
            });
        self.commits.push(changes.commit);
        self.events.extend(changes.files);
    }

    /// Write commits with their events, then merge the contributors; leaves the batch empty.
    fn flush(&mut self, store: &Store, repo_id: i64) -> Result<usize> {
        let written = store.write_commits(repo_id, &self.commits, &self.events)?;
        let contributors: Vec<ContributorRecord> =
            self.contributors.drain().map(|(_, rec)| rec).collect();
        for chunk in contributors.chunks(BatchConsts::CONTRIBUTORS) {
            store.upsert_contributors(repo_id, chunk)?;
        }
        self.commits.clear();
        self.events.clear();
        Ok(written)
    }
}

/// Replace the stored history of `repo_id`: clear commits, events and contributors, then
/// stream the walk into batched transactions.
pub fn ingest_history(
    store: &Store,
    repo_id: i64,
    repo: &Repository,
    cancel: &CancelToken,
) -> Result<HistoryOutcome> {
    ingest_history_with_progress(store, repo_id, repo, cancel, |_| {})
}

/// [`ingest_history`], calling `on_batch` with the running commit count after each committed batch.
pub fn ingest_history_with_progress(
    store: &Store,
    repo_id: i64,
    repo: &Repository,
    cancel: &CancelToken,
    mut on_batch: impl FnMut(usize),
) -> Result<HistoryOutcome> {
    info!("walking history for repository {}", repo_id);
    store.clear_history(repo_id)?;

    let mut batch = HistoryBatch::default();
    let mut processed = 0_usize;
    for item in HistoryWalker::new(repo, cancel)? {
        batch.push(item?);
        processed += 1;
        if batch.commits.len() >= BatchConsts::COMMITS {
            batch.flush(store, repo_id)?;
            debug!("processed {} commits...", processed);
            on_batch(processed);
        }
    }
    if !batch.commits.is_empty() {
        batch.flush(store, repo_id)?;
        on_batch(processed);
    }

    let contributors = store.repository_counts(repo_id)?.contributors;
    info!(
        "finished history for repository {}: {} commits, {} contributors",
        repo_id, processed, contributors
    );
    Ok(HistoryOutcome {
        commits: processed,
        contributors,
    })
}
