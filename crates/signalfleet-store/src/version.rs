use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

const FORMAT: &str = "%Y%m%d-%H%M%S-%6f";

/// Time-derived model version id, e.g. `20260117-093012-000451`.
///
/// Ids are fixed-width UTC timestamps with microsecond precision, so their
/// lexicographic order is their chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(at.format(FORMAT).to_string())
    }

    /// The smallest id at or after `now` that is strictly greater than `latest`.
    #[must_use]
    pub fn next(now: DateTime<Utc>, latest: Option<&Self>) -> Self {
        let candidate = Self::from_timestamp(now);
        match latest.and_then(Self::timestamp) {
            Some(latest_at) if Self::from_timestamp(latest_at) >= candidate => {
                Self::from_timestamp(latest_at + TimeDelta::microseconds(1))
            }
            _ => candidate,
        }
    }

    /// The timestamp encoded in the id, if it follows the id format.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let (head, micros) = self.0.rsplit_once('-')?;
        if micros.len() != 6 || !micros.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let micros = micros.parse::<i64>().ok()?;
        let at = NaiveDateTime::parse_from_str(head, "%Y%m%d-%H%M%S").ok()?;
        Some(at.and_utc() + TimeDelta::microseconds(micros))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which version of a family to use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VersionSelector {
    /// The version named by the family's LATEST pointer.
    #[default]
    Latest,
    Version(VersionId),
}

impl VersionSelector {
    /// Parses `latest` or an explicit version id.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == "latest" {
            Self::Latest
        } else {
            Self::Version(VersionId::new(s))
        }
    }
}
