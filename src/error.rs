//! Error taxonomy for the library. The binary wraps these in `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported provider for url: {0}")]
    UnsupportedProvider(String),

    /// Network or auth failure while cloning/fetching. Fatal for the job; never retried here.
    #[error("fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: git2::Error,
    },

    /// Corrupt history or tree; aborts the current phase.
    #[error("walk ({context}): {source}")]
    Walk {
        context: String,
        #[source]
        source: git2::Error,
    },

    /// Constraint violation or lost connection; aborts the current batch.
    #[error("persistence: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for storage-side failures (SQLite or pool).
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_) | Error::Pool(_))
    }
}

/// `map_err` adapter tagging a git2 failure as a walk error.
pub(crate) fn walk_err(context: &str) -> impl FnOnce(git2::Error) -> Error + '_ {
    move |source| Error::Walk {
        context: context.to_string(),
        source,
    }
}

/// `map_err` adapter tagging a git2 failure as a fetch error.
pub(crate) fn fetch_err(url: &str) -> impl FnOnce(git2::Error) -> Error + '_ {
    move |source| Error::Fetch {
        url: url.to_string(),
        source,
    }
}
