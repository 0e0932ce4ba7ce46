// src/ingest/mod.rs
pub mod fetcher;
pub mod providers;
pub mod text;
pub mod types;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;

use crate::ingest::providers::ExtractorRegistry;
use crate::ingest::types::{ExtractContext, Fetcher, MetricObservation, Snapshot, SourceConfig};
use crate::store::{rebuild, SnapshotLog, SourceEntry, ValidatorCache};

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tracker_fetch_total", "Source fetches by outcome.");
        describe_counter!(
            "tracker_snapshots_appended_total",
            "Snapshots appended to the history log."
        );
        describe_counter!(
            "tracker_observations_rejected_total",
            "Extracted observations rejected by validation."
        );
        describe_counter!(
            "tracker_extract_errors_total",
            "Extractor failures."
        );
        describe_histogram!("tracker_extract_ms", "Extraction time in milliseconds.");
        describe_gauge!(
            "tracker_projection_entries",
            "Series in the latest projection after rebuild."
        );
        describe_gauge!("tracker_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// No extractor registered under the source's tag.
    UnknownExtractor(String),
    /// Transport failure after retries.
    FetchFailed(String),
    /// Non-2xx, non-304 status.
    HttpStatus(u16),
    NotModified,
    /// Body hash matches the last recorded one.
    Unchanged,
    ExtractFailed(String),
    AppendFailed(String),
    Recorded { metrics: usize, rejected: usize },
}

impl SourceOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnknownExtractor(_) => "unknown_extractor",
            Self::FetchFailed(_) => "fetch_failed",
            Self::HttpStatus(_) => "http_status",
            Self::NotModified => "not_modified",
            Self::Unchanged => "unchanged",
            Self::ExtractFailed(_) => "extract_failed",
            Self::AppendFailed(_) => "append_failed",
            Self::Recorded { .. } => "recorded",
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownExtractor(tag) => write!(f, "no extractor registered for {tag:?}"),
            Self::FetchFailed(e) => write!(f, "failed fetch: {e}"),
            Self::HttpStatus(s) => write!(f, "failed fetch: status {s}"),
            Self::NotModified => f.write_str("not modified"),
            Self::Unchanged => f.write_str("content hash unchanged, skipping extraction"),
            Self::ExtractFailed(e) => write!(f, "extractor error: {e}"),
            Self::AppendFailed(e) => write!(f, "could not append snapshot: {e}"),
            Self::Recorded { metrics, rejected: 0 } => {
                write!(f, "recorded snapshot with {metrics} metrics")
            }
            Self::Recorded { metrics, rejected } => write!(
                f,
                "recorded snapshot with {metrics} metrics ({rejected} rejected)"
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub name: String,
    pub url: String,
    pub outcome: SourceOutcome,
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.outcome)
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    pub projection_entries: usize,
}

impl RunReport {
    pub fn recorded(&self) -> usize {
        self.sources
            .iter()
            .filter(|r| r.outcome.is_recorded())
            .count()
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Drives fetch → change detection → extraction → append → cache update for
/// each source, then rebuilds the latest projection.
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    registry: ExtractorRegistry,
    cache: ValidatorCache,
    log: SnapshotLog,
    latest_path: PathBuf,
    clock: Clock,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        registry: ExtractorRegistry,
        cache: ValidatorCache,
        log: SnapshotLog,
        latest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            registry,
            cache,
            log,
            latest_path: latest_path.into(),
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn cache(&self) -> &ValidatorCache {
        &self.cache
    }

    pub fn log(&self) -> &SnapshotLog {
        &self.log
    }

    fn now(&self) -> String {
        (self.clock)().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Process every source in order, persist the cache, rebuild the projection.
    /// Per-source failures end up in the report; only failing to write the
    /// cache or projection is an error.
    pub async fn run(&mut self, sources: &[SourceConfig]) -> Result<RunReport> {
        ensure_metrics_described();

        let mut reports = Vec::with_capacity(sources.len());
        for src in sources {
            let outcome = self.process_source(src).await;
            match &outcome {
                SourceOutcome::Recorded { .. }
                | SourceOutcome::NotModified
                | SourceOutcome::Unchanged => {
                    tracing::info!(source = %src.name, outcome = outcome.label(), "{outcome}");
                }
                _ => {
                    tracing::warn!(source = %src.name, url = %src.url, outcome = outcome.label(), "{outcome}");
                }
            }
            counter!("tracker_fetch_total", "outcome" => outcome.label()).increment(1);
            reports.push(SourceReport {
                name: src.name.clone(),
                url: src.url.clone(),
                outcome,
            });
        }

        // Attempt both outputs before reporting either failure.
        let cache_res = self.cache.persist();
        let projection_entries = self.rebuild_latest();
        cache_res?;
        let projection_entries = projection_entries?;

        gauge!("tracker_last_run_ts").set((self.clock)().timestamp().max(0) as f64);
        Ok(RunReport {
            sources: reports,
            projection_entries,
        })
    }

    /// Rebuild the projection from the whole log and overwrite the output file.
    pub fn rebuild_latest(&self) -> Result<usize> {
        ensure_metrics_described();
        let projection = rebuild(&self.log)?;
        projection.write(&self.latest_path)?;
        gauge!("tracker_projection_entries").set(projection.len() as f64);
        tracing::info!(entries = projection.len(), path = %self.latest_path.display(), "rebuilt latest projection");
        Ok(projection.len())
    }

    async fn process_source(&mut self, src: &SourceConfig) -> SourceOutcome {
        let Some(extractor) = self.registry.get(&src.extractor) else {
            return SourceOutcome::UnknownExtractor(src.extractor.clone());
        };

        let mut entry = self.cache.get(&src.url).cloned().unwrap_or_default();
        let resp = match self.fetcher.fetch(&src.url, &entry.validators()).await {
            Ok(r) => r,
            Err(e) => return SourceOutcome::FetchFailed(format!("{e:#}")),
        };

        if resp.is_not_modified() {
            entry.last_fetched = Some(self.now());
            self.cache.put(src.url.clone(), entry);
            return SourceOutcome::NotModified;
        }
        if !resp.is_success() {
            return SourceOutcome::HttpStatus(resp.status);
        }

        let hash = text::content_hash(&resp.body);
        let validators = resp.validators();
        if entry.content_hash.as_deref() == Some(hash.as_str()) {
            let now = self.now();
            self.cache.put(
                src.url.clone(),
                SourceEntry {
                    etag: validators.etag,
                    last_modified: validators.last_modified,
                    content_hash: Some(hash),
                    last_fetched: Some(now),
                },
            );
            return SourceOutcome::Unchanged;
        }

        let t0 = std::time::Instant::now();
        let cx = ExtractContext {
            body: &resp.body,
            url: &src.url,
            source_name: &src.name,
            fetcher: self.fetcher.as_ref(),
        };
        let extracted = extractor.extract(&cx).await;
        histogram!("tracker_extract_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        let raw = match extracted {
            Ok(v) => v,
            Err(e) => {
                counter!("tracker_extract_errors_total").increment(1);
                // Cache untouched: the same content is retried next run.
                return SourceOutcome::ExtractFailed(format!("{e:#}"));
            }
        };

        let (metrics, rejected) = validate_observations(&src.name, raw);
        let fetched_at = self.now();
        let snapshot = Snapshot {
            fetched_at: fetched_at.clone(),
            source: src.name.clone(),
            url: src.url.clone(),
            content_hash: hash.clone(),
            metrics,
        };
        if let Err(e) = self.log.append(&snapshot) {
            return SourceOutcome::AppendFailed(format!("{e:#}"));
        }
        counter!("tracker_snapshots_appended_total").increment(1);

        self.cache.put(
            src.url.clone(),
            SourceEntry {
                etag: validators.etag,
                last_modified: validators.last_modified,
                content_hash: Some(hash),
                last_fetched: Some(fetched_at),
            },
        );
        SourceOutcome::Recorded {
            metrics: snapshot.metrics.len(),
            rejected,
        }
    }
}

/// Keep observations that pass validation; returns (kept, rejected_count).
pub fn validate_observations(
    source: &str,
    raw: Vec<MetricObservation>,
) -> (Vec<MetricObservation>, usize) {
    let mut rejected = 0usize;
    let mut kept = Vec::with_capacity(raw.len());
    for obs in raw {
        match obs.validate() {
            Ok(()) => kept.push(obs),
            Err(e) => {
                rejected += 1;
                tracing::warn!(source, metric = %obs.metric_key, error = %e, "observation rejected");
            }
        }
    }
    if rejected > 0 {
        counter!("tracker_observations_rejected_total").increment(rejected as u64);
    }
    (kept, rejected)
}
