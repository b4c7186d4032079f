//! Snapshot builder: inventory of regular files at HEAD with language and line counts.

use git2::{ErrorCode, ObjectType, Oid, Repository, Tree};
use log::{debug, info, warn};
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::engine::db_ops::Store;
use crate::error::{Result, walk_err};
use crate::pipeline::cancel::CancelToken;
use crate::types::FileRecord;
use crate::utils::config::{BatchConsts, PLAIN_TEXT_LANGUAGE, ScanConsts};

/// Git mode of symbolic links; they are blobs but not regular files.
const SYMLINK_MODE: i32 = 0o120000;

/// Lowercase text after the last `.` of the file name, or `Plain Text`.
///
/// Dotfiles count as extensions (`.gitignore` is `gitignore`); directory names never do.
pub fn language_for(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| PLAIN_TEXT_LANGUAGE.to_string())
}

/// Count lines with a bounded buffer. A final unterminated line counts.
///
/// Fails with `InvalidData` when a single line reaches [`ScanConsts::MAX_LINE`] bytes,
/// since the terminator has to fit in the same buffer.
pub fn count_lines<R: Read>(reader: R) -> io::Result<i64> {
    let mut reader = BufReader::with_capacity(ScanConsts::INITIAL_BUFFER, reader);
    let mut lines = 0_i64;
    let mut current = 0_usize;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        let len = buf.len();
        let mut start = 0;
        while let Some(pos) = buf[start..].iter().position(|&b| b == b'\n') {
            current += pos;
            if current >= ScanConsts::MAX_LINE {
                return Err(line_too_long());
            }
            lines += 1;
            current = 0;
            start += pos + 1;
        }
        current += len - start;
        if current >= ScanConsts::MAX_LINE {
            return Err(line_too_long());
        }
        reader.consume(len);
    }
    if current > 0 {
        lines += 1;
    }
    Ok(lines)
}

fn line_too_long() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "line exceeds scanner limit")
}

/// Line count of one blob; 0 when it cannot be read or scanned.
fn blob_lines(repo: &Repository, id: Oid, path: &str) -> i64 {
    let blob = match repo.find_blob(id) {
        Ok(b) => b,
        Err(e) => {
            warn!("{}: read blob: {}", path, e.message());
            return 0;
        }
    };
    count_lines(blob.content()).unwrap_or_else(|e| {
        debug!("{}: line scan failed: {}", path, e);
        0
    })
}

/// HEAD tree, or `None` for a repository without commits.
pub(crate) fn head_tree(repo: &Repository) -> Result<Option<Tree<'_>>> {
    if repo.is_empty().map_err(walk_err("inspect HEAD"))? {
        return Ok(None);
    }
    let head = match repo.head() {
        Ok(h) => h,
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(None);
        }
        Err(e) => return Err(walk_err("resolve HEAD")(e)),
    };
    let tree = head.peel_to_tree().map_err(walk_err("peel HEAD to tree"))?;
    Ok(Some(tree))
}

/// Walk the HEAD tree depth-first, calling `on_file` for every regular file.
/// Symlinks and submodules are skipped. Returns the number of files reported.
pub fn walk_head<F>(repo: &Repository, cancel: &CancelToken, mut on_file: F) -> Result<usize>
where
    F: FnMut(FileRecord) -> Result<()>,
{
    let Some(root) = head_tree(repo)? else {
        return Ok(0);
    };
    let mut stack: Vec<(String, Tree<'_>)> = vec![(String::new(), root)];
    let mut count = 0_usize;
    while let Some((prefix, tree)) = stack.pop() {
        for entry in tree.iter() {
            cancel.check()?;
            let Some(name) = entry.name() else {
                warn!("skipping non-UTF-8 path under '{}'", prefix);
                continue;
            };
            let path = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}/{name}")
            };
            match entry.kind() {
                Some(ObjectType::Tree) => {
                    let sub = repo.find_tree(entry.id()).map_err(walk_err("read tree"))?;
                    stack.push((path, sub));
                }
                Some(ObjectType::Blob) if entry.filemode() != SYMLINK_MODE => {
                    let lines = blob_lines(repo, entry.id(), &path);
                    on_file(FileRecord {
                        language: language_for(&path),
                        path,
                        lines,
                    })?;
                    count += 1;
                }
                _ => debug!("skipping non-regular entry {}", path),
            }
        }
    }
    Ok(count)
}

/// Replace the stored snapshot of `repo_id` with the current HEAD tree.
/// Clears first, then inserts in batches of [`BatchConsts::FILES`].
pub fn rebuild_snapshot(
    store: &Store,
    repo_id: i64,
    repo: &Repository,
    cancel: &CancelToken,
) -> Result<usize> {
    info!("snapshotting file inventory for repository {}", repo_id);
    store.clear_files(repo_id)?;

    let mut batch = Vec::with_capacity(BatchConsts::FILES);
    let mut written = 0_usize;
    let count = walk_head(repo, cancel, |file| {
        batch.push(file);
        if batch.len() >= BatchConsts::FILES {
            written += store.upsert_files(repo_id, &batch)?;
            batch.clear();
        }
        Ok(())
    })?;
    if !batch.is_empty() {
        written += store.upsert_files(repo_id, &batch)?;
    }
    debug!("snapshot: {} of {} files persisted", written, count);
    info!("persisted {} files for repository {}", count, repo_id);
    Ok(count)
}
