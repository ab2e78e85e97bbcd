use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cache::CommitSet;
use crate::error::Result;
use crate::policy::Policy;
use crate::store;

/// `introduced` value meaning "from the beginning of history".
pub const ORIGIN_SENTINEL: &str = "0";

pub const DEFAULT_SCHEMA_VERSION: &str = "1.6.0";

/// OSV advisory document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, with = "rfc3339")]
    pub modified: Option<DateTime<FixedOffset>>,
    /// Kept with the offset it was first written in.
    #[serde(default, with = "rfc3339")]
    pub published: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub affected: Vec<Affected>,
}

/// RFC 3339 timestamps that keep their offset and write UTC as `Z`.
mod rfc3339 {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
        Option::<DateTime<FixedOffset>>::deserialize(deserializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affected {
    pub ranges: Vec<Range>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    #[serde(rename = "type")]
    pub range_type: RangeType,
    pub repo: String,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RangeType {
    Git,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Introduced(String),
    Fixed(String),
}

impl Advisory {
    /// A new advisory, published at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            published: Some(now.fixed_offset()),
            ..Default::default()
        }
    }

    /// Rewrite the advisory from the policy and the commits resolved for the
    /// lookback date. `published` is only filled in when it was never set.
    pub fn update(
        &mut self,
        policy: &Policy,
        commits: &CommitSet,
        schema_version: &str,
        now: DateTime<Utc>,
    ) {
        self.schema_version = schema_version.to_string();
        self.id = policy.id.clone();
        self.modified = Some(now.fixed_offset());
        self.published.get_or_insert(now.fixed_offset());
        self.summary = policy.policy_link.clone();
        self.details = policy.description.clone();
        self.affected = vec![affected_for(policy, commits)];
    }
}

/// Build the affected entry: a single git range from the origin sentinel to
/// each resolved commit.
pub fn affected_for(policy: &Policy, commits: &CommitSet) -> Affected {
    let events = std::iter::once(Event::Introduced(ORIGIN_SENTINEL.to_string()))
        .chain(commits.iter().map(|sha| Event::Fixed(sha.to_string())))
        .collect();

    Affected {
        ranges: vec![Range {
            range_type: RangeType::Git,
            repo: policy.repository.clone(),
            events,
        }],
    }
}

/// Load the advisory, or start a new one published at `now` if none exists.
#[instrument(skip(now))]
pub fn load_advisory(path: &Path, now: DateTime<Utc>) -> Result<Advisory> {
    match store::read_document::<Advisory>(path)? {
        Some(advisory) => {
            debug!(id = %advisory.id, "advisory loaded");
            Ok(advisory)
        }
        None => {
            debug!("no advisory yet, starting a new one");
            Ok(Advisory::new(now))
        }
    }
}

pub fn save_advisory(path: &Path, advisory: &Advisory) -> Result<()> {
    store::write_document(path, advisory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 5, hour, 0, 0).unwrap()
    }

    fn stamp(hour: u32) -> Option<DateTime<FixedOffset>> {
        Some(at(hour).fixed_offset())
    }

    fn policy() -> Policy {
        Policy {
            id: "policyID".to_string(),
            repository: "owner/repo".to_string(),
            freshness_days: 1,
            policy_link: "policyLink".to_string(),
            description: "policyDescription".to_string(),
            branches: vec!["main".to_string()],
        }
    }

    fn commits(shas: &[&str]) -> CommitSet {
        shas.iter().copied().collect()
    }

    #[test]
    fn affected_range_starts_at_origin() {
        let affected = affected_for(&policy(), &commits(&["shaX"]));
        assert_eq!(
            affected,
            Affected {
                ranges: vec![Range {
                    range_type: RangeType::Git,
                    repo: "owner/repo".to_string(),
                    events: vec![
                        Event::Introduced("0".to_string()),
                        Event::Fixed("shaX".to_string()),
                    ],
                }],
            }
        );
    }

    #[test]
    fn affected_range_has_one_fixed_event_per_commit() {
        let affected = affected_for(&policy(), &commits(&["a", "b", "c"]));
        let events = &affected.ranges[0].events;
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], Event::Introduced(ORIGIN_SENTINEL.to_string()));
        assert_eq!(events[3], Event::Fixed("c".to_string()));
    }

    #[test]
    fn empty_commit_set_yields_sentinel_only() {
        let affected = affected_for(&policy(), &CommitSet::new());
        assert_eq!(
            affected.ranges[0].events,
            vec![Event::Introduced("0".to_string())]
        );
    }

    #[test]
    fn events_serialize_as_osv_objects() {
        let affected = affected_for(&policy(), &commits(&["shaX"]));
        let value = serde_json::to_value(&affected).unwrap();
        assert_eq!(
            value,
            json!({
                "ranges": [{
                    "type": "GIT",
                    "repo": "owner/repo",
                    "events": [{"introduced": "0"}, {"fixed": "shaX"}]
                }]
            })
        );
    }

    #[test]
    fn update_sets_every_field() {
        let mut advisory = Advisory {
            schema_version: "1.0".to_string(),
            ..Default::default()
        };
        advisory.update(&policy(), &commits(&["mockSHA2"]), "1.6.0", at(10));

        assert_eq!(
            advisory,
            Advisory {
                schema_version: "1.6.0".to_string(),
                id: "policyID".to_string(),
                modified: stamp(10),
                published: stamp(10),
                summary: "policyLink".to_string(),
                details: "policyDescription".to_string(),
                affected: vec![affected_for(&policy(), &commits(&["mockSHA2"]))],
            }
        );
    }

    #[test]
    fn update_keeps_published_and_moves_modified() {
        let mut advisory = Advisory::new(at(1));
        advisory.update(&policy(), &commits(&["a"]), DEFAULT_SCHEMA_VERSION, at(2));
        advisory.update(&policy(), &commits(&["b"]), DEFAULT_SCHEMA_VERSION, at(3));

        assert_eq!(advisory.published, stamp(1));
        assert_eq!(advisory.modified, stamp(3));
        assert_eq!(advisory.affected.len(), 1);
        assert_eq!(
            advisory.affected[0].ranges[0].events[1],
            Event::Fixed("b".to_string())
        );
    }

    #[test]
    fn serialized_field_order_matches_osv_layout() {
        let mut advisory = Advisory::new(at(10));
        advisory.update(&policy(), &commits(&["shaX"]), "1.6.0", at(10));

        let json = serde_json::to_string(&advisory).unwrap();
        let keys = [
            "schema_version",
            "\"id\"",
            "modified",
            "published",
            "summary",
            "details",
            "affected",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
        assert!(json.contains("\"published\":\"2024-12-05T10:00:00Z\""), "{json}");
    }

    #[test]
    fn advisory_round_trips_through_json() {
        let mut advisory = Advisory::new(at(8));
        advisory.update(&policy(), &commits(&["a", "b"]), "1.6.0", at(9));

        let json = serde_json::to_string_pretty(&advisory).unwrap();
        let back: Advisory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, advisory);
    }

    #[test]
    fn accepts_timestamps_with_offsets() {
        let advisory: Advisory = serde_json::from_str(
            r#"{"id": "V8", "published": "2024-12-05T11:00:00+01:00"}"#,
        )
        .unwrap();
        assert_eq!(advisory.published, stamp(10));
        assert!(advisory.modified.is_none());
    }

    #[test]
    fn published_offset_survives_rewrite() {
        let mut advisory: Advisory = serde_json::from_str(
            r#"{"id": "V8", "published": "2024-12-05T08:30:00-08:00"}"#,
        )
        .unwrap();
        advisory.update(&policy(), &commits(&["shaX"]), "1.6.0", at(20));

        let value = serde_json::to_value(&advisory).unwrap();
        assert_eq!(value["published"], "2024-12-05T08:30:00-08:00");
        assert_eq!(value["modified"], "2024-12-05T20:00:00Z");
    }

    #[test]
    fn missing_timestamps_serialize_as_null() {
        let value = serde_json::to_value(Advisory::default()).unwrap();
        assert!(value["published"].is_null());
        assert!(value["modified"].is_null());
    }

    #[test]
    fn load_missing_advisory_is_published_now() {
        let dir = tempfile::tempdir().unwrap();
        let advisory = load_advisory(&dir.path().join("advisory.json"), at(7)).unwrap();
        assert_eq!(advisory.published, stamp(7));
        assert!(advisory.id.is_empty());
    }

    #[test]
    fn load_existing_advisory_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("advisory.json");
        std::fs::write(&path, r#"{"schema_version": "1.0", "id": "advisoryID"}"#).unwrap();

        let advisory = load_advisory(&path, at(7)).unwrap();
        assert_eq!(
            advisory,
            Advisory {
                schema_version: "1.0".to_string(),
                id: "advisoryID".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn save_then_load_preserves_advisory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("advisories/advisory.json");
        let mut advisory = Advisory::new(at(6));
        advisory.update(&policy(), &commits(&["shaX"]), "1.6.0", at(6));

        save_advisory(&path, &advisory).unwrap();
        let back = load_advisory(&path, at(23)).unwrap();
        assert_eq!(back, advisory);
    }
}
