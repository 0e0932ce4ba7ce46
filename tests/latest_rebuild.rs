// tests/latest_rebuild.rs
use eval_tracker::ingest::types::{MetricObservation, Snapshot};
use eval_tracker::store::{rebuild, SnapshotLog};
use std::fs;

fn obs(key: &str, entity: &str, value: f64) -> MetricObservation {
    MetricObservation {
        metric_key: key.into(),
        value,
        unit: "percent".into(),
        entity: entity.into(),
        evidence: format!("{key} {entity} {value}"),
    }
}

fn snap(ts: &str, metrics: Vec<MetricObservation>) -> Snapshot {
    Snapshot {
        fetched_at: ts.into(),
        source: "Source".into(),
        url: "https://source.test/".into(),
        content_hash: format!("h-{ts}"),
        metrics,
    }
}

fn temp_log() -> (tempfile::TempDir, SnapshotLog) {
    let dir = tempfile::tempdir().unwrap();
    let log = SnapshotLog::new(dir.path().join("metrics.jsonl"));
    (dir, log)
}

#[test]
fn newer_snapshot_wins() {
    let (_dir, log) = temp_log();
    log.append(&snap("2025-01-01T00:00:00Z", vec![obs("m", "x", 10.0)]))
        .unwrap();
    log.append(&snap("2025-02-01T00:00:00Z", vec![obs("m", "x", 20.0)]))
        .unwrap();

    let p = rebuild(&log).unwrap();
    assert_eq!(p.len(), 1);
    let e = p.get("m", "x").unwrap();
    assert_eq!(e.value, 20.0);
    assert_eq!(e.timestamp.as_deref(), Some("2025-02-01T00:00:00Z"));
    assert_eq!(e.source.as_deref(), Some("Source"));
    assert_eq!(e.url.as_deref(), Some("https://source.test/"));
}

#[test]
fn empty_log_gives_empty_projection() {
    let (_dir, log) = temp_log();
    let p = rebuild(&log).unwrap();
    assert!(p.is_empty());
    assert_eq!(p.to_json().unwrap().trim(), "{}");
}

#[test]
fn snapshot_without_metrics_gives_empty_projection() {
    let (_dir, log) = temp_log();
    log.append(&snap("2025-01-01T00:00:00Z", vec![])).unwrap();
    assert!(rebuild(&log).unwrap().is_empty());
}

#[test]
fn rebuild_is_idempotent_byte_for_byte() {
    let (dir, log) = temp_log();
    log.append(&snap(
        "2025-01-01T00:00:00Z",
        vec![obs("b", "y", 1.5), obs("a", "x", 2.0), obs("a", "z", 3.0)],
    ))
    .unwrap();
    log.append(&snap("2025-03-01T00:00:00Z", vec![obs("a", "x", 4.0)]))
        .unwrap();

    let out = dir.path().join("latest.json");
    rebuild(&log).unwrap().write(&out).unwrap();
    let first = fs::read(&out).unwrap();
    rebuild(&log).unwrap().write(&out).unwrap();
    let second = fs::read(&out).unwrap();
    assert_eq!(first, second);

    let v: serde_json::Value = serde_json::from_slice(&first).unwrap();
    let keys: Vec<_> = v.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["a::x", "a::z", "b::y"]);
    assert_eq!(v["a::x"]["value"], 4.0);
}

#[test]
fn timestamp_is_max_fetched_at_per_series() {
    let (_dir, log) = temp_log();
    // Append order deliberately differs from chronological order.
    let stamps = [
        "2025-03-01T00:00:00Z",
        "2025-01-01T00:00:00Z",
        "2025-05-01T00:00:00Z",
        "2025-02-01T00:00:00Z",
    ];
    for (i, ts) in stamps.iter().enumerate() {
        let mut metrics = vec![obs("m", "x", i as f64)];
        if i % 2 == 0 {
            metrics.push(obs("m", "even", i as f64));
        }
        log.append(&snap(ts, metrics)).unwrap();
    }

    let p = rebuild(&log).unwrap();
    assert_eq!(
        p.get("m", "x").unwrap().timestamp.as_deref(),
        Some("2025-05-01T00:00:00Z")
    );
    assert_eq!(p.get("m", "x").unwrap().value, 2.0);
    assert_eq!(
        p.get("m", "even").unwrap().timestamp.as_deref(),
        Some("2025-05-01T00:00:00Z")
    );
}

#[test]
fn older_snapshot_appended_later_does_not_regress() {
    let (_dir, log) = temp_log();
    log.append(&snap("2025-06-01T00:00:00Z", vec![obs("m", "x", 60.0)]))
        .unwrap();
    let before = rebuild(&log).unwrap();

    log.append(&snap("2025-01-01T00:00:00Z", vec![obs("m", "x", 1.0)]))
        .unwrap();
    let after = rebuild(&log).unwrap();

    assert_eq!(before.get("m", "x"), after.get("m", "x"));
}

#[test]
fn corrupt_timestamp_cannot_replace_valid_entry() {
    let (_dir, log) = temp_log();
    log.append(&snap("2025-06-01T00:00:00Z", vec![obs("m", "x", 60.0)]))
        .unwrap();
    log.append(&snap("yesterday-ish", vec![obs("m", "x", 99.0), obs("n", "x", 5.0)]))
        .unwrap();

    let p = rebuild(&log).unwrap();
    assert_eq!(p.get("m", "x").unwrap().value, 60.0);
    // A series seen only with a bad timestamp is still inserted.
    assert_eq!(p.get("n", "x").unwrap().value, 5.0);
}

#[test]
fn observations_without_identity_are_discarded() {
    let (dir, _) = temp_log();
    let path = dir.path().join("hand.jsonl");
    fs::write(
        &path,
        concat!(
            r#"{"fetched_at":"2025-01-01T00:00:00Z","source":"s","url":"u","content_hash":"h","metrics":["#,
            r#"{"metric_key":null,"entity":"x","value":1,"unit":"percent","evidence":""},"#,
            r#"{"metric_key":"m","value":2,"unit":"percent","evidence":""},"#,
            r#"{"metric_key":"m","entity":"x","value":3,"unit":"percent","evidence":""}]}"#,
            "\n",
            "garbage line\n",
        ),
    )
    .unwrap();

    let p = rebuild(&SnapshotLog::new(&path)).unwrap();
    assert_eq!(p.len(), 1);
    assert_eq!(p.get("m", "x").unwrap().value, 3.0);
}
