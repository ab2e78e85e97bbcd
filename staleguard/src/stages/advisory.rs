use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::advisory::DEFAULT_SCHEMA_VERSION;
use crate::context::{LookbackOutcome, RunContext};
use crate::error::{Error, Result};
use crate::lookback;

use super::Stage;

/// Resolves the lookback commits and rewrites the advisory from them.
pub struct AdvisoryStage {
    schema_version: String,
    max_gap_days: Option<u32>,
}

impl AdvisoryStage {
    pub fn new() -> Self {
        Self {
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            max_gap_days: None,
        }
    }

    pub fn schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = version.into();
        self
    }

    /// Fail instead of silently using an entry more than `days` newer than
    /// the lookback date.
    pub fn max_gap_days(mut self, days: Option<u32>) -> Self {
        self.max_gap_days = days;
        self
    }
}

impl Default for AdvisoryStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for AdvisoryStage {
    #[instrument(skip(self, ctx), fields(id = %ctx.policy.id, days = ctx.policy.freshness_days))]
    async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let resolution = lookback::resolve(&ctx.cache, ctx.policy.freshness_days, ctx.today)?;

        if let Some(max_gap_days) = self.max_gap_days {
            let gap_days = resolution.gap_days();
            if gap_days > i64::from(max_gap_days) {
                return Err(Error::StaleCache {
                    target: resolution.target.unwrap_or(NaiveDate::MIN),
                    resolved: resolution.resolved,
                    gap_days,
                    max_gap_days,
                });
            }
        }

        ctx.advisory
            .update(&ctx.policy, resolution.commits, &self.schema_version, ctx.now);
        info!(
            resolved = %resolution.resolved,
            kind = %resolution.kind,
            fixed = resolution.commits.len(),
            "advisory updated"
        );

        ctx.lookback = Some(LookbackOutcome {
            target: resolution.target,
            resolved: resolution.resolved,
            kind: resolution.kind,
            commits: resolution.commits.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Advisory"
    }
}
