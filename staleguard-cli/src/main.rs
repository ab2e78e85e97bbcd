mod cli;

use std::io::{IsTerminal, Write};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{SubsecRound, Utc};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use staleguard::cache::Retention;
use staleguard::github::GitHubClient;
use staleguard::output::{RunReport, formatter};
use staleguard::{RunOptions, Runner};

use cli::Cli;

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::builder()
        .with_default_directive(cli.verbose.tracing_level_filter().into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal());

    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: &Cli) -> anyhow::Result<RunReport> {
    let client = GitHubClient::builder()
        .token(cli.github_token.clone().filter(|t| !t.is_empty()))
        .api_base(cli.api_base_url.trim_end_matches('/'))
        .timeout(Duration::from_secs(cli.timeout_secs))
        .build()?;
    if !client.has_token() {
        info!("no GitHub token provided; API requests are unauthenticated");
    }

    let options = RunOptions {
        policy_path: cli.resolve(&cli.policy),
        cache_path: cli.resolve(&cli.cache),
        advisory_path: cli.resolve(&cli.advisory),
        schema_version: cli.schema_version.clone(),
        retention: cli.retain_days.map_or(Retention::KeepAll, Retention::Days),
        max_gap_days: cli.max_gap_days,
        dry_run: cli.dry_run,
    };

    let now = Utc::now().trunc_subsecs(0);
    let report = Runner::new(Arc::new(client), options)
        .run(now)
        .await
        .context("advisory run failed")?;
    Ok(report)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli).await {
        Ok(report) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = formatter(cli.json).write_report(&report, &mut stdout) {
                error!(error = %e, "failed to write run summary");
                process::exit(1);
            }
            let _ = stdout.flush();
        }
        Err(e) => {
            error!("run failed: {e:#}");
            process::exit(1);
        }
    }
}
