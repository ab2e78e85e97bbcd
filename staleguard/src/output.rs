use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::context::LookbackOutcome;
use crate::lookback::ResolutionKind;

/// What a run did, for display on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub policy_id: String,
    pub repository: String,
    pub today: NaiveDate,
    pub todays_commits: Vec<String>,
    /// Absent only when the pipeline had no advisory stage.
    #[serde(flatten)]
    pub lookback: Option<LookbackSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pruned_dates: Vec<NaiveDate>,
    pub cache_path: PathBuf,
    pub advisory_path: PathBuf,
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookbackSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback_target: Option<NaiveDate>,
    pub resolved_date: NaiveDate,
    pub resolution: ResolutionKind,
    pub fixed_commits: Vec<String>,
}

impl From<&LookbackOutcome> for LookbackSummary {
    fn from(outcome: &LookbackOutcome) -> Self {
        Self {
            lookback_target: outcome.target,
            resolved_date: outcome.resolved,
            resolution: outcome.kind,
            fixed_commits: outcome.commits.iter().map(str::to_string).collect(),
        }
    }
}

pub trait OutputFormatter {
    fn write_report(&self, report: &RunReport, writer: &mut dyn std::io::Write) -> std::io::Result<()>;
}

pub struct TextOutput;

impl OutputFormatter for TextOutput {
    fn write_report(&self, report: &RunReport, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        writeln!(writer, "{} ({})", report.policy_id, report.repository)?;
        writeln!(writer, "  today: {} [{}]", report.today, report.todays_commits.join(", "))?;

        match &report.lookback {
            Some(lookback) => write_lookback(lookback, writer)?,
            None => writeln!(writer, "  lookback: not resolved")?,
        }

        if !report.pruned_dates.is_empty() {
            let dates: Vec<String> = report.pruned_dates.iter().map(|d| d.to_string()).collect();
            writeln!(writer, "  pruned: {}", dates.join(", "))?;
        }

        if report.persisted {
            writeln!(writer, "  advisory: {}", report.advisory_path.display())?;
            writeln!(writer, "  cache: {}", report.cache_path.display())?;
        } else {
            writeln!(writer, "  dry run: nothing written")?;
        }
        Ok(())
    }
}

fn write_lookback(lookback: &LookbackSummary, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
    match lookback.lookback_target {
        Some(target) => writeln!(
            writer,
            "  lookback: {target} -> {} ({})",
            lookback.resolved_date, lookback.resolution
        )?,
        None => writeln!(
            writer,
            "  lookback: {} ({})",
            lookback.resolved_date, lookback.resolution
        )?,
    }

    if lookback.fixed_commits.is_empty() {
        writeln!(writer, "  fixed: none")?;
    } else {
        for sha in &lookback.fixed_commits {
            writeln!(writer, "  fixed: {sha}")?;
        }
    }
    Ok(())
}

pub struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn write_report(&self, report: &RunReport, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, report)?;
        writeln!(writer)?;
        Ok(())
    }
}

pub fn formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput)
    } else {
        Box::new(TextOutput)
    }
}
