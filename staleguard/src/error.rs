use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to fetch latest commit for branch '{branch}': {reason:#}")]
    RemoteFetch {
        branch: String,
        reason: anyhow::Error,
    },

    #[error("cache has no entry for today ({today}); the cache must be updated before resolving")]
    CachePrecondition { today: NaiveDate },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(
        "lookback for {target} resolved to {resolved}, {gap_days} days newer than allowed ({max_gap_days})"
    )]
    StaleCache {
        target: NaiveDate,
        resolved: NaiveDate,
        gap_days: i64,
        max_gap_days: u32,
    },
}

/// Problems with the policy or the run settings derived from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("policy file not found: {}", .0.display())]
    PolicyNotFound(PathBuf),

    #[error("failed to read policy {}: {source}", path.display())]
    PolicyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed policy {}: {source}", path.display())]
    PolicyMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected owner/name in repository locator: {0}")]
    InvalidRepository(String),

    #[error("policy '{0}' tracks no branches")]
    NoBranches(String),

    #[error("retention window of {retain_days} days is shorter than the freshness threshold ({freshness_days} days)")]
    RetentionTooShort { retain_days: u32, freshness_days: i64 },
}

/// Failures reading or writing the cache and advisory documents.
///
/// A missing document is never reported here; loaders fall back to an empty
/// or freshly initialized value instead.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
