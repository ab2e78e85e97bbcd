use std::path::{Path, PathBuf};

use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};

/// Build a daily OSV advisory from the freshness of a repository's branches
#[derive(Parser)]
#[command(name = "staleguard", version)]
pub struct Cli {
    /// Base directory that relative document paths are resolved against
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// Policy document
    #[arg(long, env = "STALEGUARD_POLICY", default_value = "policies/policy.json")]
    pub policy: PathBuf,

    /// Commit cache document
    #[arg(long, env = "STALEGUARD_CACHE", default_value = "cache/cache.json")]
    pub cache: PathBuf,

    /// Advisory document
    #[arg(long, env = "STALEGUARD_ADVISORY", default_value = "advisories/advisory.json")]
    pub advisory: PathBuf,

    /// GitHub token for API access
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "STALEGUARD_API_BASE_URL", default_value = staleguard::github::GITHUB_API_BASE)]
    pub api_base_url: String,

    /// OSV schema version written into the advisory
    #[arg(long, default_value = staleguard::advisory::DEFAULT_SCHEMA_VERSION)]
    pub schema_version: String,

    /// Drop cache dates older than this many days (default: keep everything)
    #[arg(long)]
    pub retain_days: Option<u32>,

    /// Fail when the lookback falls back more than this many days past its target
    #[arg(long)]
    pub max_gap_days: Option<u32>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Compute the advisory but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Output the run summary and logs as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,
}

impl Cli {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }
}
