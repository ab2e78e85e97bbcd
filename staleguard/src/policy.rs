use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{ConfigError, Result};

/// Freshness policy for a single tracked repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub id: String,
    pub repository: String,
    /// Signed so that a negative threshold reaches the resolver and is
    /// rejected there instead of failing deserialization.
    pub freshness_days: i64,
    pub policy_link: String,
    pub description: String,
    pub branches: Vec<String>,
}

impl Policy {
    /// Checks that the policy can drive a run: the repository decomposes into
    /// owner/name and at least one branch is tracked.
    pub fn validate(&self) -> Result<RepoLocator> {
        let locator: RepoLocator = self.repository.parse()?;
        if self.branches.is_empty() {
            return Err(ConfigError::NoBranches(self.id.clone()).into());
        }
        Ok(locator)
    }
}

/// Owner/name pair taken from the last two path segments of a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocator {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepoLocator {
    type Err = ConfigError;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = raw.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let mut segments = trimmed.rsplit('/');
        match (segments.next(), segments.next()) {
            (Some(name), Some(owner)) if !name.is_empty() && !owner.is_empty() => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ConfigError::InvalidRepository(raw.to_string())),
        }
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Reads the policy document. Unlike the cache and advisory, a missing policy
/// is fatal.
#[instrument]
pub fn load_policy(path: &Path) -> Result<Policy> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::PolicyNotFound(path.to_path_buf()).into());
        }
        Err(source) => {
            return Err(ConfigError::PolicyRead {
                path: path.to_path_buf(),
                source,
            }
            .into());
        }
    };

    let policy: Policy = serde_json::from_str(&data).map_err(|source| ConfigError::PolicyMalformed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(id = %policy.id, branches = policy.branches.len(), "policy loaded");
    Ok(policy)
}
