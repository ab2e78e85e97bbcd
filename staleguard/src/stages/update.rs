use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::cache::Retention;
use crate::context::RunContext;
use crate::error::{ConfigError, Result};
use crate::github::CommitSource;
use crate::updater::update_cache;

use super::Stage;

/// Records today's branch tips in the cache, then applies retention.
///
/// The retention window is applied as given; callers validate it against
/// the policy with [`check_retention`] before building the pipeline.
pub struct CacheUpdateStage {
    source: Arc<dyn CommitSource>,
    retention: Retention,
}

impl CacheUpdateStage {
    pub fn new(source: Arc<dyn CommitSource>) -> Self {
        Self {
            source,
            retention: Retention::KeepAll,
        }
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }
}

/// The retention window has to cover the lookback date or the resolver
/// would never see it.
pub fn check_retention(retention: Retention, freshness_days: i64) -> Result<()> {
    if let Retention::Days(retain_days) = retention {
        if i64::from(retain_days) < freshness_days {
            return Err(ConfigError::RetentionTooShort {
                retain_days,
                freshness_days,
            }
            .into());
        }
    }
    Ok(())
}

#[async_trait]
impl Stage for CacheUpdateStage {
    #[instrument(skip(self, ctx), fields(repo = %ctx.repo, today = %ctx.today))]
    async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let commits = update_cache(
            self.source.as_ref(),
            &ctx.repo,
            &ctx.policy.branches,
            &mut ctx.cache,
            ctx.today,
        )
        .await?;
        ctx.todays_commits = Some(commits);

        ctx.pruned = ctx.cache.prune(self.retention, ctx.today);
        if !ctx.pruned.is_empty() {
            warn!(count = ctx.pruned.len(), oldest = %ctx.pruned[0], "pruned cache entries outside retention window");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CacheUpdate"
    }
}
