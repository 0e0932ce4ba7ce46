// src/store/cache.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::types::Validators;

/// Last-seen validators and content hash for one source URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub last_fetched: Option<String>,
}

impl SourceEntry {
    pub fn validators(&self) -> Validators {
        Validators {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
        }
    }
}

/// URL-keyed validator cache, loaded and persisted wholesale.
#[derive(Debug)]
pub struct ValidatorCache {
    path: PathBuf,
    entries: BTreeMap<String, SourceEntry>,
}

impl ValidatorCache {
    /// Load from `path`. A missing, unreadable or malformed file yields an empty
    /// cache, which only costs a full re-fetch.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str(&s) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cache file invalid, starting fresh");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache file unreadable, starting fresh");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn get(&self, url: &str) -> Option<&SourceEntry> {
        self.entries.get(url)
    }

    pub fn put(&mut self, url: impl Into<String>, entry: SourceEntry) {
        self.entries.insert(url.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole mapping (temp file + rename).
    pub fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries).context("serializing cache")?;
        super::write_atomic(&self.path, json.as_bytes())
            .with_context(|| format!("writing cache to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_put_roundtrip_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = ValidatorCache::load(dir.path().join("cache.json"));
        assert!(c.is_empty());
        c.put(
            "https://a.test/",
            SourceEntry {
                etag: Some("\"v1\"".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            c.get("https://a.test/").unwrap().validators().etag.as_deref(),
            Some("\"v1\"")
        );
        assert!(c.get("https://b.test/").is_none());
    }
}
