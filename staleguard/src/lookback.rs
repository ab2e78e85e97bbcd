//! Resolution of "what was fresh `d` days ago" against the commit cache.
//!
//! The cache can have gaps when scheduled runs are missed. An exact hit on
//! the lookback date wins; otherwise the closest recorded date inside the
//! freshness window that is newer than the target is used, and today's entry
//! is the last resort. Only a missing entry for today is an error, since the
//! cache update always writes it earlier in the same run.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CommitCache, CommitSet};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionKind {
    /// The lookback date itself had an entry.
    Exact,
    /// A newer date inside the freshness window was used.
    Fallback,
    /// Nothing inside the window was recorded; today's entry was used.
    Today,
}

impl fmt::Display for ResolutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionKind::Exact => write!(f, "exact"),
            ResolutionKind::Fallback => write!(f, "fallback"),
            ResolutionKind::Today => write!(f, "today"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// The lookback date, `today - d`. `None` when it falls before the
    /// earliest representable calendar date.
    pub target: Option<NaiveDate>,
    pub resolved: NaiveDate,
    pub kind: ResolutionKind,
    pub commits: &'a CommitSet,
}

impl Resolution<'_> {
    /// Days between the lookback target and the date actually used.
    pub fn gap_days(&self) -> i64 {
        self.target
            .map(|target| (self.resolved - target).num_days())
            .unwrap_or(i64::MAX)
    }
}

/// Find the commit set considered acceptable `days` days before `today`.
pub fn resolve(cache: &CommitCache, days: i64, today: NaiveDate) -> Result<Resolution<'_>> {
    let Some(todays) = cache.get(today) else {
        return Err(Error::CachePrecondition { today });
    };
    if days < 0 {
        return Err(Error::InvalidArgument(format!(
            "lookback must be a non-negative number of days, got {days}"
        )));
    }

    let target = days_before(today, days);
    if let Some((date, commits)) = target.and_then(|t| cache.get(t).map(|c| (t, c))) {
        debug!(resolved = %date, days, "lookback resolved exactly");
        return Ok(Resolution {
            target,
            resolved: date,
            kind: ResolutionKind::Exact,
            commits,
        });
    }

    // Closest recorded date after the target, excluding today which is
    // handled by the final fallback.
    let window_start = match target {
        Some(t) => t.succ_opt(),
        None => Some(NaiveDate::MIN),
    };
    if let Some((date, commits)) = window_start.and_then(|start| cache.first_between(start, today)) {
        warn!(target = ?target, resolved = %date, "no cache entry for lookback date, using closest newer entry");
        return Ok(Resolution {
            target,
            resolved: date,
            kind: ResolutionKind::Fallback,
            commits,
        });
    }

    if days > 0 {
        warn!(target = ?target, resolved = %today, "no cache entry inside freshness window, using today's entry");
    }
    Ok(Resolution {
        target,
        resolved: today,
        kind: ResolutionKind::Today,
        commits: todays,
    })
}

fn days_before(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    today.checked_sub_days(Days::new(days.unsigned_abs()))
}
