// src/ingest/types.rs
use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::store::latest::KEY_SEPARATOR;

/// One extracted (metric, entity, value) fact from a single document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricObservation {
    pub metric_key: String, // e.g. "metr_time_horizon_p50_minutes"
    pub value: f64,
    pub unit: String,   // "minutes" | "percent" | "usd_per_task" | ...
    pub entity: String, // model, dataset or system the value applies to
    pub evidence: String,
}

impl MetricObservation {
    /// Reject extractor output that must not enter the log.
    pub fn validate(&self) -> Result<()> {
        if self.metric_key.trim().is_empty() {
            bail!("empty metric_key");
        }
        if self.metric_key.contains(KEY_SEPARATOR) {
            bail!("metric_key {:?} contains {KEY_SEPARATOR:?}", self.metric_key);
        }
        if self.entity.trim().is_empty() {
            bail!("empty entity for {}", self.metric_key);
        }
        if self.unit.trim().is_empty() {
            bail!("empty unit for {}", self.metric_key);
        }
        if !self.value.is_finite() {
            bail!("non-finite value for {}", self.metric_key);
        }
        match self.unit.as_str() {
            "percent" if !(0.0..=100.0).contains(&self.value) => {
                bail!("percent out of range: {}", self.value)
            }
            u if (u == "minutes" || u.starts_with("usd")) && self.value < 0.0 => {
                bail!("negative {u}: {}", self.value)
            }
            _ => Ok(()),
        }
    }
}

/// Immutable record of one successful, content-changed fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub fetched_at: String, // RFC 3339
    pub source: String,
    pub url: String,
    pub content_hash: String,
    pub metrics: Vec<MetricObservation>,
}

/// Static definition of a tracked page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    /// Registry tag of the extractor, e.g. "metr".
    pub extractor: String,
}

/// Conditional request tokens remembered from a previous response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn not_modified() -> Self {
        Self {
            status: 304,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }

    /// Validators the server sent with this response.
    pub fn validators(&self) -> Validators {
        Validators {
            etag: self.header("etag").map(str::to_string),
            last_modified: self.header("last-modified").map(str::to_string),
        }
    }
}

/// Fetch capability. `Err` means the transport failed after all retries;
/// HTTP error statuses are returned as `Ok` responses.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, validators: &Validators) -> Result<FetchResponse>;
}

/// Everything an extractor may look at for one fetched document.
pub struct ExtractContext<'a> {
    pub body: &'a str,
    pub url: &'a str,
    pub source_name: &'a str,
    /// For secondary fetches (e.g. following a link to the full document).
    pub fetcher: &'a dyn Fetcher,
}

#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, cx: &ExtractContext<'_>) -> Result<Vec<MetricObservation>>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(unit: &str, value: f64) -> MetricObservation {
        MetricObservation {
            metric_key: "k".into(),
            value,
            unit: unit.into(),
            entity: "e".into(),
            evidence: String::new(),
        }
    }

    #[test]
    fn validate_checks_ranges_per_unit() {
        assert!(obs("percent", 42.5).validate().is_ok());
        assert!(obs("percent", 120.0).validate().is_err());
        assert!(obs("minutes", -1.0).validate().is_err());
        assert!(obs("usd_per_task", -0.5).validate().is_err());
        assert!(obs("score", -3.0).validate().is_ok());
        assert!(obs("minutes", f64::NAN).validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_identity() {
        let mut o = obs("minutes", 10.0);
        o.entity = "  ".into();
        assert!(o.validate().is_err());
    }

    #[test]
    fn validate_rejects_separator_in_metric_key() {
        let mut o = obs("minutes", 10.0);
        o.metric_key = "a::b".into();
        assert!(o.validate().is_err());
        // Entities may contain it; the key prefix stays unambiguous.
        let mut o = obs("minutes", 10.0);
        o.entity = "org::model".into();
        assert!(o.validate().is_ok());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let r = FetchResponse::ok("x")
            .with_header("ETag", "\"abc\"")
            .with_header("Last-Modified", "Wed, 01 Jan 2025 00:00:00 GMT");
        let v = r.validators();
        assert_eq!(v.etag.as_deref(), Some("\"abc\""));
        assert_eq!(
            v.last_modified.as_deref(),
            Some("Wed, 01 Jan 2025 00:00:00 GMT")
        );
    }
}
