//! Remote fetcher: keep a bare mirror of a remote up to date.

use git2::build::RepoBuilder;
use git2::{Cred, FetchOptions, RemoteCallbacks, Repository};
use log::{debug, info, warn};
use std::path::Path;

use crate::error::{Error, Result, fetch_err};

/// Refresh every branch; forced so rewritten remote history replaces ours.
const MIRROR_REFSPEC: &str = "+refs/heads/*:refs/heads/*";

/// Hosts a mirror may be cloned from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    GitHub,
    Bitbucket,
    GitLab,
    /// `file://` remotes: local mirrors and fixtures.
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Bitbucket => "bitbucket",
            Provider::GitLab => "gitlab",
            Provider::Local => "local",
        }
    }
}

/// Classify `url`; [`Error::UnsupportedProvider`] for anything else.
pub fn detect_provider(url: &str) -> Result<Provider> {
    let url = url.trim();
    if url.starts_with("https://github.com/") {
        Ok(Provider::GitHub)
    } else if url.starts_with("https://bitbucket.org/") {
        Ok(Provider::Bitbucket)
    } else if url.starts_with("https://gitlab.com/") {
        Ok(Provider::GitLab)
    } else if url.starts_with("file://") {
        Ok(Provider::Local)
    } else {
        Err(Error::UnsupportedProvider(url.to_string()))
    }
}

fn fetch_options(token: Option<&str>) -> FetchOptions<'_> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(token) = token {
        callbacks.credentials(move |_url, _username, _allowed| {
            Cred::userpass_plaintext("x-access-token", token)
        });
    }
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(callbacks);
    opts
}

/// Open the mirror at `local_path` and fetch, or bare-clone `url` into it when absent.
///
/// An up-to-date mirror is not an error. A directory that is not a git repository is
/// replaced by a fresh clone.
pub fn open_or_clone(url: &str, local_path: &Path, token: Option<&str>) -> Result<Repository> {
    detect_provider(url)?;

    if local_path.exists() {
        match Repository::open_bare(local_path) {
            Ok(repo) => {
                fetch_existing(&repo, url, token)?;
                return Ok(repo);
            }
            Err(e) => {
                warn!(
                    "{} is not a usable mirror ({}); re-cloning",
                    local_path.display(),
                    e.message()
                );
                std::fs::remove_dir_all(local_path)?;
            }
        }
    }

    if let Some(parent) = local_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!("cloning {} into {}", url, local_path.display());
    let mut builder = RepoBuilder::new();
    builder.bare(true).fetch_options(fetch_options(token));
    builder.clone(url, local_path).map_err(fetch_err(url))
}

fn fetch_existing(repo: &Repository, url: &str, token: Option<&str>) -> Result<()> {
    let mut remote = repo.find_remote("origin").map_err(fetch_err(url))?;
    debug!("fetching {} into existing mirror", url);
    remote
        .fetch(&[MIRROR_REFSPEC], Some(&mut fetch_options(token)), None)
        .map_err(fetch_err(url))?;
    Ok(())
}
