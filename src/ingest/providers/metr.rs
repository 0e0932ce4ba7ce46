// src/ingest/providers/metr.rs
//! METR evaluation reports: 50% / 80% time horizons and their 95% CIs.
//!
//! Reports phrase these as e.g. "50% time horizon of 2h 17min (95% CI: 65 min – 4 hr 25 min)".
//! Point estimates and intervals are looked up independently per label, so a
//! page with only one of them still yields something.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::text::{evidence, html_title, html_to_text, parse_duration_minutes};
use crate::ingest::types::{ExtractContext, Extractor, MetricObservation};

const DUR: &str = r"\d+(?:\.\d+)?\s*(?:(?:hours|hour|hrs|hr|h)\s*(?:\d+(?:\.\d+)?\s*)?)?(?:minutes|minute|mins|min|m)?";
const SEP: &str = r"\s*(?:-|–|—|to)\s*";

const POINT_TEMPLATES: [&str; 2] = [
    r"(?i){label}[^\d]{0,60}(?P<dur>{dur})",
    r"(?i)(?P<dur>{dur})\s*(?:time horizon|horizon)[^\d]{0,40}{label}",
];
const CI_TEMPLATES: [&str; 2] = [
    r"(?i){label}.{0,120}?(?:95% CI|CI 95%)[^\d]{0,20}(?P<low>{dur}){sep}(?P<high>{dur})",
    r"(?i)(?:95% CI|CI 95%)[^\d]{0,20}(?P<low>{dur}){sep}(?P<high>{dur})\)?[^\d]{0,60}{label}",
];

struct LabelPatterns {
    key_base: &'static str,
    points: Vec<Regex>,
    cis: Vec<Regex>,
}

fn compile(template: &str, label: &str) -> Regex {
    let pattern = template
        .replace("{label}", &regex::escape(label))
        .replace("{dur}", DUR)
        .replace("{sep}", SEP);
    Regex::new(&pattern).unwrap()
}

static PATTERNS: Lazy<Vec<LabelPatterns>> = Lazy::new(|| {
    [("50%", "p50"), ("80%", "p80")]
        .into_iter()
        .map(|(label, key_base)| LabelPatterns {
            key_base,
            points: POINT_TEMPLATES.iter().map(|t| compile(t, label)).collect(),
            cis: CI_TEMPLATES.iter().map(|t| compile(t, label)).collect(),
        })
        .collect()
});

pub struct MetrExtractor;

struct Point {
    minutes: f64,
    at: usize,
}

struct Interval {
    low: f64,
    high: f64,
    at: usize,
}

fn find_point(text: &str, patterns: &[Regex]) -> Option<Point> {
    patterns.iter().find_map(|re| {
        re.captures_iter(text).find_map(|c| {
            Some(Point {
                minutes: parse_duration_minutes(c.name("dur")?.as_str())?,
                at: c.get(0)?.start(),
            })
        })
    })
}

fn find_interval(text: &str, patterns: &[Regex]) -> Option<Interval> {
    patterns.iter().find_map(|re| {
        let c = re.captures(text)?;
        Some(Interval {
            low: parse_duration_minutes(c.name("low")?.as_str())?,
            high: parse_duration_minutes(c.name("high")?.as_str())?,
            at: c.get(0)?.start(),
        })
    })
}

impl MetrExtractor {
    pub fn parse(html: &str, source_name: &str) -> Vec<MetricObservation> {
        let text = html_to_text(html);
        let entity = html_title(html).unwrap_or_else(|| source_name.to_string());

        let obs = |key: String, value: f64, at: usize| MetricObservation {
            metric_key: key,
            value,
            unit: "minutes".to_string(),
            entity: entity.clone(),
            evidence: evidence(&text, at),
        };

        let mut out = Vec::new();
        for lp in PATTERNS.iter() {
            let base = lp.key_base;
            if let Some(p) = find_point(&text, &lp.points) {
                out.push(obs(
                    format!("metr_time_horizon_{base}_minutes"),
                    p.minutes,
                    p.at,
                ));
            }
            if let Some(ci) = find_interval(&text, &lp.cis) {
                out.push(obs(
                    format!("metr_time_horizon_{base}_ci_low_minutes"),
                    ci.low,
                    ci.at,
                ));
                out.push(obs(
                    format!("metr_time_horizon_{base}_ci_high_minutes"),
                    ci.high,
                    ci.at,
                ));
            }
        }
        out
    }
}

#[async_trait]
impl Extractor for MetrExtractor {
    async fn extract(&self, cx: &ExtractContext<'_>) -> Result<Vec<MetricObservation>> {
        Ok(Self::parse(cx.body, cx.source_name))
    }

    fn name(&self) -> &'static str {
        "metr"
    }
}
