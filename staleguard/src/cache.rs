use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::Result;
use crate::store;

/// Deduplicated commit identifiers, kept in first-seen order so the
/// serialized cache is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CommitSet(Vec<String>);

impl CommitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `sha` unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, sha: impl Into<String>) -> bool {
        let sha = sha.into();
        if self.0.contains(&sha) {
            return false;
        }
        self.0.push(sha);
        true
    }

    pub fn contains(&self, sha: &str) -> bool {
        self.0.iter().any(|s| s == sha)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for CommitSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for sha in iter {
            set.insert(sha);
        }
        set
    }
}

impl From<Vec<String>> for CommitSet {
    fn from(shas: Vec<String>) -> Self {
        shas.into_iter().collect()
    }
}

impl From<CommitSet> for Vec<String> {
    fn from(set: CommitSet) -> Self {
        set.0
    }
}

impl<'a> IntoIterator for &'a CommitSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Date-keyed history of the tip commits observed across all tracked branches.
///
/// Serializes as a JSON object of `YYYY-MM-DD` keys in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitCache {
    entries: BTreeMap<NaiveDate, CommitSet>,
}

impl CommitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&CommitSet> {
        self.entries.get(&date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.entries.contains_key(&date)
    }

    /// Records `commits` for `date`, replacing any earlier entry for that day.
    pub fn record(&mut self, date: NaiveDate, commits: CommitSet) -> Option<CommitSet> {
        self.entries.insert(date, commits)
    }

    /// Earliest entry dated in `[start, end)`.
    pub fn first_between(&self, start: NaiveDate, end: NaiveDate) -> Option<(NaiveDate, &CommitSet)> {
        if start >= end {
            return None;
        }
        self.entries
            .range(start..end)
            .next()
            .map(|(date, commits)| (*date, commits))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.keys().copied()
    }

    /// Drops every entry the retention policy no longer covers and returns
    /// the pruned dates in ascending order.
    pub fn prune(&mut self, retention: Retention, today: NaiveDate) -> Vec<NaiveDate> {
        let Some(cutoff) = retention.cutoff(today) else {
            return Vec::new();
        };
        let kept = self.entries.split_off(&cutoff);
        let pruned = std::mem::replace(&mut self.entries, kept);
        pruned.into_keys().collect()
    }
}

/// How much cache history to keep after each write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Retention {
    #[default]
    KeepAll,
    /// Keep `today` and the `n` days before it.
    Days(u32),
}

impl Retention {
    /// Earliest date that survives pruning, or `None` when nothing is pruned.
    pub fn cutoff(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Retention::KeepAll => None,
            Retention::Days(n) => today.checked_sub_days(Days::new(u64::from(n))),
        }
    }
}

#[instrument]
pub fn load_cache(path: &Path) -> Result<CommitCache> {
    let cache = store::read_document::<CommitCache>(path)?.unwrap_or_default();
    info!(dates = cache.len(), "cache loaded");
    Ok(cache)
}

pub fn save_cache(path: &Path, cache: &CommitCache) -> Result<()> {
    store::write_document(path, cache)
}
