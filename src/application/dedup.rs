use crate::domain::transit::Transit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// How the reconciler recognises transits it has already handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    /// Skip a transit whose id equals the last processed id.
    #[default]
    ByLastId,
    /// Skip a transit whose `occurred_at` is at or before the newest time seen.
    ByWatermarkTime,
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-id" | "by-last-id" | "id" => Ok(Self::ByLastId),
            "watermark-time" | "by-watermark-time" | "time" => Ok(Self::ByWatermarkTime),
            other => Err(format!(
                "unknown dedup policy '{}', expected 'last-id' or 'watermark-time'",
                other
            )),
        }
    }
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByLastId => f.write_str("last-id"),
            Self::ByWatermarkTime => f.write_str("watermark-time"),
        }
    }
}

/// In-process record of the most recently processed transit.
///
/// Owned by exactly one reconciler and never persisted, so a restart may
/// reprocess the latest transit once. Besides the policy's own bound it keeps
/// the ids of the last batch that produced work: a transit seen there is
/// never processed again, whatever its timestamp.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Watermark {
    policy: DedupPolicy,
    last_id: Option<String>,
    last_time: Option<DateTime<Utc>>,
    recent: HashSet<String>,
}

impl Watermark {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    pub fn last_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.last_time
    }

    /// Lower bound handed to the feed. Only the time policy narrows the query.
    pub fn since(&self) -> Option<DateTime<Utc>> {
        match self.policy {
            DedupPolicy::ByLastId => None,
            DedupPolicy::ByWatermarkTime => self.last_time,
        }
    }

    /// Whether the transit still needs processing.
    ///
    /// A transit without a readable timestamp is never excluded by the
    /// time bound, only by its id.
    pub fn admits(&self, transit: &Transit) -> bool {
        if self.recent.contains(&transit.id) {
            return false;
        }
        match self.policy {
            DedupPolicy::ByLastId => self.last_id.as_deref() != Some(transit.id.as_str()),
            DedupPolicy::ByWatermarkTime => match (transit.occurred_at, self.last_time) {
                (Some(at), Some(watermark)) => at > watermark,
                _ => true,
            },
        }
    }

    /// Splits a newest-first batch into `(fresh, already_seen)`, both still
    /// newest first.
    ///
    /// Under the id policy everything from the last processed id onwards is
    /// considered seen, since the feed lists newer transits before it.
    pub fn split_fresh(&self, batch: Vec<Transit>) -> (Vec<Transit>, Vec<Transit>) {
        let cut = match self.policy {
            DedupPolicy::ByLastId => batch
                .iter()
                .position(|t| self.last_id.as_deref() == Some(t.id.as_str()))
                .unwrap_or(batch.len()),
            DedupPolicy::ByWatermarkTime => batch.len(),
        };

        let mut head = batch;
        let older = head.split_off(cut);
        let (fresh, mut seen): (Vec<_>, Vec<_>) = head.into_iter().partition(|t| self.admits(t));
        seen.extend(older);
        (fresh, seen)
    }

    /// Moves the watermark past `processed`, given newest first as the feed
    /// returned it. `batch_ids` are the ids of the whole fetched batch.
    /// Untimed transits count as `now` for the time bound.
    pub fn advance<I>(&mut self, processed: &[Transit], batch_ids: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = String>,
    {
        let Some(newest) = processed.first() else {
            return;
        };

        self.last_id = Some(newest.id.clone());

        let batch_max = processed
            .iter()
            .map(|t| t.occurred_at.unwrap_or(now))
            .max();
        self.last_time = match (self.last_time, batch_max) {
            (Some(current), Some(candidate)) => Some(current.max(candidate)),
            (current, candidate) => candidate.or(current),
        };

        self.recent = batch_ids.into_iter().collect();
        self.recent.extend(processed.iter().map(|t| t.id.clone()));
    }
}

/// Turns a newest-first feed batch into processing order: oldest first,
/// untimed transits last in the order the feed produced them.
pub fn processing_order(transits: &mut [Transit]) {
    transits.reverse();
    transits.sort_by_key(|t| (t.occurred_at.is_none(), t.occurred_at));
}
