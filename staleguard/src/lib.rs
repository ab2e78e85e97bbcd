pub mod advisory;
pub mod cache;
pub mod context;
pub mod error;
pub mod github;
pub mod lookback;
pub mod output;
pub mod pipeline;
pub mod policy;
pub mod stages;
pub mod store;
pub mod updater;

pub use error::{ConfigError, Error, PersistenceError, Result};

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use advisory::{DEFAULT_SCHEMA_VERSION, load_advisory, save_advisory};
use cache::{Retention, load_cache, save_cache};
use context::RunContext;
use github::CommitSource;
use output::{LookbackSummary, RunReport};
use pipeline::{Pipeline, PipelineBuilder};
use policy::load_policy;
use stages::update::check_retention;
use stages::{AdvisoryStage, CacheUpdateStage};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub policy_path: PathBuf,
    pub cache_path: PathBuf,
    pub advisory_path: PathBuf,
    pub schema_version: String,
    pub retention: Retention,
    pub max_gap_days: Option<u32>,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from("policies/policy.json"),
            cache_path: PathBuf::from("cache/cache.json"),
            advisory_path: PathBuf::from("advisories/advisory.json"),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            retention: Retention::KeepAll,
            max_gap_days: None,
            dry_run: false,
        }
    }
}

/// Drives one run: load documents, run the pipeline, persist the results.
pub struct Runner {
    source: Arc<dyn CommitSource>,
    options: RunOptions,
}

impl Runner {
    pub fn new(source: Arc<dyn CommitSource>, options: RunOptions) -> Self {
        Self { source, options }
    }

    fn pipeline(&self) -> Pipeline {
        PipelineBuilder::new()
            .stage(CacheUpdateStage::new(self.source.clone()).with_retention(self.options.retention))
            .stage(
                AdvisoryStage::new()
                    .schema_version(self.options.schema_version.clone())
                    .max_gap_days(self.options.max_gap_days),
            )
            .build()
    }

    /// Nothing is written unless every stage succeeds. The advisory is
    /// persisted before the cache.
    ///
    /// The retention window is checked here, before the cache is read or any
    /// branch is fetched.
    #[instrument(skip(self), fields(policy = %self.options.policy_path.display()))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let policy = load_policy(&self.options.policy_path)?;
        let repo = policy.validate()?;
        check_retention(self.options.retention, policy.freshness_days)?;

        let cache = load_cache(&self.options.cache_path)?;
        let advisory = load_advisory(&self.options.advisory_path, now)?;

        let mut ctx = RunContext::new(policy, repo, cache, advisory, now);
        self.pipeline().run(&mut ctx).await?;
        let report = self.report(&ctx);

        if self.options.dry_run {
            info!("dry run, skipping writes");
        } else {
            save_advisory(&self.options.advisory_path, &ctx.advisory)?;
            save_cache(&self.options.cache_path, &ctx.cache)?;
            info!(
                advisory = %self.options.advisory_path.display(),
                cache = %self.options.cache_path.display(),
                "documents written"
            );
        }

        Ok(report)
    }

    fn report(&self, ctx: &RunContext) -> RunReport {
        RunReport {
            policy_id: ctx.policy.id.clone(),
            repository: ctx.policy.repository.clone(),
            today: ctx.today,
            todays_commits: ctx
                .todays_commits
                .as_ref()
                .map(|c| c.iter().map(str::to_string).collect())
                .unwrap_or_default(),
            lookback: ctx.lookback.as_ref().map(LookbackSummary::from),
            pruned_dates: ctx.pruned.clone(),
            cache_path: self.options.cache_path.clone(),
            advisory_path: self.options.advisory_path.clone(),
            persisted: !self.options.dry_run,
        }
    }
}
