use thiserror::Error;

/// Failures fetching or decoding the upstream odds feed.
///
/// Any of these skips the update phase of the current cycle; the next cycle
/// tries again from scratch.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Connection refused, DNS failure, reset mid-body, ...
    #[error("feed request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// Upstream answered with anything other than 200.
    #[error("feed returned HTTP {0}")]
    Status(u16),

    /// The request did not complete within the configured timeout and was aborted.
    #[error("feed request timed out")]
    Timeout,

    /// Body was not JSON, or not the expected shape.
    #[error("malformed feed payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout
        } else if err.is_decode() {
            FeedError::Malformed(err.to_string())
        } else {
            FeedError::Http(err)
        }
    }
}

/// Failures reading from or writing to the runner store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An update addressed a runner id that does not exist.
    #[error("runner {0} not found")]
    NotFound(i64),

    /// A previous holder of the connection panicked.
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Why a polling cycle stopped before reaching the write phase.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// The runner cache could not be loaded and has never held data.
    #[error("runner cache unavailable: {0}")]
    CacheUnavailable(#[source] StoreError),
}
