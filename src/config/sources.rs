// src/config/sources.rs
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::SourceConfig;

const ENV_PATH: &str = "TRACKER_SOURCES_PATH";

/// Built-in source list used when no config file is present.
pub fn default_sources() -> Vec<SourceConfig> {
    [
        (
            "METR GPT-5 report",
            "https://evaluations.metr.org/gpt-5-report/",
            "metr",
        ),
        (
            "METR GPT-5.1-Codex-Max report",
            "https://evaluations.metr.org/gpt-5-1-codex-max-report/",
            "metr",
        ),
        ("GDPval arXiv", "https://arxiv.org/abs/2510.04374", "gdpval"),
        (
            "ARC Prize results and analysis",
            "https://arcprize.org/blog/arc-prize-2025-results-analysis",
            "arcagi2",
        ),
    ]
    .into_iter()
    .map(|(name, url, extractor)| SourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        extractor: extractor.to_string(),
    })
    .collect()
}

/// Load sources from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let raw = parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing sources in {}", path.display()))?;
    clean_sources(raw)
}

/// Resolve the source list:
/// 1) $TRACKER_SOURCES_PATH (must exist)
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in defaults
pub fn load_sources_default() -> Result<Vec<SourceConfig>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(default_sources())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceConfig>> {
    // A known extension is authoritative so its parser's error reaches the user.
    match hint_ext {
        "toml" => return parse_toml(s).context("invalid TOML sources"),
        "json" => return parse_json(s).context("invalid JSON sources"),
        _ => {}
    }
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<SourceConfig>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<SourceConfig>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<SourceConfig>> {
    Ok(serde_json::from_str(s)?)
}

/// Trim fields, reject incomplete entries, keep the first entry per URL.
fn clean_sources(items: Vec<SourceConfig>) -> Result<Vec<SourceConfig>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for (i, it) in items.into_iter().enumerate() {
        let src = SourceConfig {
            name: it.name.trim().to_string(),
            url: it.url.trim().to_string(),
            extractor: it.extractor.trim().to_ascii_lowercase(),
        };
        if src.name.is_empty() {
            bail!("source #{} has an empty name", i + 1);
        }
        if src.extractor.is_empty() {
            bail!("source {:?} has an empty extractor", src.name);
        }
        reqwest::Url::parse(&src.url)
            .with_context(|| format!("source {:?} has an invalid url", src.name))?;
        if !seen.insert(src.url.clone()) {
            tracing::warn!(source = %src.name, url = %src.url, "duplicate source url ignored");
            continue;
        }
        out.push(src);
    }
    Ok(out)
}
