// src/store/latest.rs
//! Latest value per (metric_key, entity), recomputed from the full snapshot log.
//!
//! - Log order is the iteration order; within a snapshot, recorded order.
//! - A later instant replaces an earlier one; equal instants keep the first seen.
//! - Unparsable `fetched_at` values may insert but never replace.
//! - Observations without key, entity or numeric value are skipped.
//! - Series are keyed by the `(metric_key, entity)` pair; the joined
//!   `metric_key::entity` string exists only in the serialized output.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::log::{LoggedObservation, LoggedSnapshot, SnapshotLog};

pub const KEY_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatestEntry {
    pub metric_key: String,
    pub entity: String,
    pub value: f64,
    pub unit: String,
    pub evidence: String,
    /// `fetched_at` of the snapshot this value came from, verbatim.
    pub timestamp: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
}

/// Output key for one series.
pub fn composite_key(metric_key: &str, entity: &str) -> String {
    format!("{metric_key}{KEY_SEPARATOR}{entity}")
}

fn parse_instant(ts: Option<&str>) -> Option<DateTime<FixedOffset>> {
    ts.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Projection {
    entries: BTreeMap<(String, String), LatestEntry>,
}

impl Projection {
    /// Fold one snapshot into the projection.
    pub fn apply(&mut self, snapshot: &LoggedSnapshot) {
        let fetched = parse_instant(snapshot.fetched_at.as_deref());
        for obs in snapshot.observations() {
            let Some(candidate) = entry_from(snapshot, obs) else {
                tracing::debug!(source = ?snapshot.source, "observation missing key, entity or value; skipped");
                continue;
            };
            let key = (candidate.metric_key.clone(), candidate.entity.clone());
            match self.entries.get(&key) {
                None => {
                    self.entries.insert(key, candidate);
                }
                Some(current) => {
                    let Some(new_ts) = fetched else { continue };
                    let replace = match parse_instant(current.timestamp.as_deref()) {
                        Some(cur_ts) => new_ts > cur_ts,
                        None => true,
                    };
                    if replace {
                        self.entries.insert(key, candidate);
                    }
                }
            }
        }
    }

    pub fn get(&self, metric_key: &str, entity: &str) -> Option<&LatestEntry> {
        self.entries
            .get(&(metric_key.to_string(), entity.to_string()))
    }

    pub fn entries(&self) -> &BTreeMap<(String, String), LatestEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty JSON keyed by `metric_key::entity`. Two pairs that join to the
    /// same string keep the first in pair order and log the other.
    pub fn to_json(&self) -> Result<String> {
        let mut out: BTreeMap<String, &LatestEntry> = BTreeMap::new();
        for ((metric_key, entity), entry) in &self.entries {
            let key = composite_key(metric_key, entity);
            if out.contains_key(&key) {
                tracing::warn!(%key, metric_key = %metric_key, entity = %entity, "series key collides in output, dropped");
                continue;
            }
            out.insert(key, entry);
        }
        serde_json::to_string_pretty(&out).context("serializing latest projection")
    }

    /// Overwrite `path` with the serialized projection.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        super::write_atomic(path, json.as_bytes())
            .with_context(|| format!("writing latest projection to {}", path.display()))
    }
}

fn entry_from(snapshot: &LoggedSnapshot, obs: &LoggedObservation) -> Option<LatestEntry> {
    Some(LatestEntry {
        metric_key: obs.metric_key.clone()?,
        entity: obs.entity.clone()?,
        value: obs.value_f64()?,
        unit: obs.unit.clone().unwrap_or_default(),
        evidence: obs.evidence.clone().unwrap_or_default(),
        timestamp: snapshot.fetched_at.clone(),
        source: snapshot.source.clone(),
        url: snapshot.url.clone(),
    })
}

/// Full scan of `log` into a fresh projection.
pub fn rebuild(log: &SnapshotLog) -> Result<Projection> {
    let mut projection = Projection::default();
    for snapshot in log.scan()? {
        projection.apply(&snapshot);
    }
    Ok(projection)
}
