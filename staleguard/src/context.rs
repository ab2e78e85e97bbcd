use chrono::{DateTime, NaiveDate, Utc};

use crate::advisory::Advisory;
use crate::cache::{CommitCache, CommitSet};
use crate::lookback::ResolutionKind;
use crate::policy::{Policy, RepoLocator};

/// State threaded through the pipeline for a single run.
#[derive(Debug)]
pub struct RunContext {
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
    pub policy: Policy,
    pub repo: RepoLocator,
    pub cache: CommitCache,
    pub advisory: Advisory,
    // Stage outputs
    pub todays_commits: Option<CommitSet>,
    pub lookback: Option<LookbackOutcome>,
    pub pruned: Vec<NaiveDate>,
}

/// Owned record of how the lookback date was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookbackOutcome {
    pub target: Option<NaiveDate>,
    pub resolved: NaiveDate,
    pub kind: ResolutionKind,
    pub commits: CommitSet,
}

impl RunContext {
    pub fn new(
        policy: Policy,
        repo: RepoLocator,
        cache: CommitCache,
        advisory: Advisory,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            today: now.date_naive(),
            now,
            policy,
            repo,
            cache,
            advisory,
            todays_commits: None,
            lookback: None,
            pruned: vec![],
        }
    }
}
