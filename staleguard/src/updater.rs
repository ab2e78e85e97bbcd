use chrono::NaiveDate;
use futures::future::try_join_all;
use tracing::{debug, info, instrument};

use crate::cache::{CommitCache, CommitSet};
use crate::error::{Error, Result};
use crate::github::CommitSource;
use crate::policy::RepoLocator;

/// Poll the tip commit of every branch and record the distinct commits under
/// `today`, replacing any entry already written for that day.
///
/// All branches are fetched before the cache is touched; if any fetch fails
/// the cache is left exactly as it was.
#[instrument(skip(source, cache), fields(repo = %repo, branches = branches.len()))]
pub async fn update_cache(
    source: &dyn CommitSource,
    repo: &RepoLocator,
    branches: &[String],
    cache: &mut CommitCache,
    today: NaiveDate,
) -> Result<CommitSet> {
    let fetches = branches.iter().map(|branch| async move {
        let sha = source
            .latest_commit(repo, branch)
            .await
            .map_err(|reason| Error::RemoteFetch {
                branch: branch.clone(),
                reason,
            })?;
        debug!(branch = %branch, sha = %sha, "fetched branch tip");
        Ok::<_, Error>(sha)
    });
    let tips = try_join_all(fetches).await?;

    let commits: CommitSet = tips.into_iter().collect();
    if commits.len() < branches.len() {
        debug!(
            branches = branches.len(),
            distinct = commits.len(),
            "branches share tip commits"
        );
    }

    let replaced = cache.record(today, commits.clone());
    info!(date = %today, commits = commits.len(), replaced = replaced.is_some(), "cache updated");
    Ok(commits)
}
