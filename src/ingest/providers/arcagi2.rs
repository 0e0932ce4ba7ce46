// src/ingest/providers/arcagi2.rs
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::text::{evidence, html_to_text};
use crate::ingest::types::{ExtractContext, Extractor, MetricObservation};

static RE_PERCENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ARC-AGI-2\s+private\s+dataset[^\d]{0,50}?(?P<value>\d+(?:\.\d+)?)%").unwrap()
});
static RE_COST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\$\s*(?P<value>\d+(?:\.\d+)?)\s*/\s*task").unwrap());

const ENTITY: &str = "ARC-AGI-2";

/// ARC Prize results page: private-set SOTA score and its cost per task.
pub struct ArcAgi2Extractor;

impl ArcAgi2Extractor {
    pub fn parse(html: &str) -> Vec<MetricObservation> {
        let text = html_to_text(html);
        let mut out = Vec::new();

        let found = [
            (&*RE_PERCENT, "arc_agi_2_private_sota_percent", "percent"),
            (&*RE_COST, "arc_agi_2_private_sota_cost_per_task_usd", "usd_per_task"),
        ];
        for (re, key, unit) in found {
            let Some(caps) = re.captures(&text) else { continue };
            let Ok(value) = caps["value"].parse::<f64>() else { continue };
            let at = caps.get(0).map_or(0, |m| m.start());
            out.push(MetricObservation {
                metric_key: key.to_string(),
                value,
                unit: unit.to_string(),
                entity: ENTITY.to_string(),
                evidence: evidence(&text, at),
            });
        }
        out
    }
}

#[async_trait]
impl Extractor for ArcAgi2Extractor {
    async fn extract(&self, cx: &ExtractContext<'_>) -> Result<Vec<MetricObservation>> {
        Ok(Self::parse(cx.body))
    }

    fn name(&self) -> &'static str {
        "arcagi2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_score_and_cost() {
        let html = "<p>The top score on the ARC-AGI-2 private dataset was <b>24.03%</b>, \
                    at a cost of $0.20/task.</p>";
        let v = ArcAgi2Extractor::parse(html);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].metric_key, "arc_agi_2_private_sota_percent");
        assert_eq!(v[0].value, 24.03);
        assert_eq!(v[1].unit, "usd_per_task");
        assert_eq!(v[1].value, 0.20);
        assert!(v[0].evidence.contains("private dataset"));
    }

    #[test]
    fn nothing_matches_on_unrelated_page() {
        assert!(ArcAgi2Extractor::parse("<p>Welcome</p>").is_empty());
    }
}
