// tests/store_cache.rs
use eval_tracker::store::{SourceEntry, ValidatorCache};
use std::fs;

#[test]
fn persisted_cache_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("cache.json");

    let mut cache = ValidatorCache::load(&path);
    cache.put(
        "https://a.test/report",
        SourceEntry {
            etag: Some("\"abc\"".into()),
            last_modified: Some("Wed, 01 Jan 2025 00:00:00 GMT".into()),
            content_hash: Some("deadbeef".into()),
            last_fetched: Some("2025-01-01T00:00:00Z".into()),
        },
    );
    cache.persist().expect("persist creates parent dirs");

    let reloaded = ValidatorCache::load(&path);
    assert_eq!(reloaded.len(), 1);
    let e = reloaded.get("https://a.test/report").unwrap();
    assert_eq!(e.content_hash.as_deref(), Some("deadbeef"));
    assert_eq!(e.etag.as_deref(), Some("\"abc\""));
}

#[test]
fn malformed_cache_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    fs::write(&path, "{ this is not json").unwrap();

    let cache = ValidatorCache::load(&path);
    assert!(cache.is_empty());

    // Still writable afterwards; the broken file is replaced.
    cache.persist().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
}

#[test]
fn missing_cache_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ValidatorCache::load(dir.path().join("nope.json"));
    assert!(cache.is_empty());
}

#[test]
fn entries_with_missing_fields_still_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    fs::write(
        &path,
        r#"{"https://a.test/": {"last_fetched": "2025-01-01T00:00:00Z"}}"#,
    )
    .unwrap();

    let cache = ValidatorCache::load(&path);
    let e = cache.get("https://a.test/").unwrap();
    assert!(e.etag.is_none());
    assert!(e.content_hash.is_none());
}
