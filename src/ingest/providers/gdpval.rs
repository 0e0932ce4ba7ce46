// src/ingest/providers/gdpval.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

use crate::ingest::text::{evidence, html_to_text};
use crate::ingest::types::{ExtractContext, Extractor, MetricObservation, Validators};

static RE_ARXIV_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/abs/(?P<id>\d{4}\.\d{4,5})").unwrap());
static RE_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap());
static RE_TABLE2: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Table\s*2[^:]*:.*?win rate").unwrap());
static RE_MODEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?P<model>gpt-4o|o4-mini|o3|gpt-5)\s+(?P<value>\d+(?:\.\d+)?)%").unwrap()
});

const DEFAULT_ARXIV_ID: &str = "2510.04374";

/// GDPval paper on arXiv. The abstract page is only a pointer: the win rates
/// live in Table 2 of the full HTML rendering, which is fetched separately.
pub struct GdpvalExtractor;

impl GdpvalExtractor {
    /// Path of the newest `/html/<id>vN` rendering linked from the abstract page.
    pub fn latest_html_path(abs_html: &str, arxiv_id: &str) -> String {
        let re = Regex::new(&format!(r"/html/{}v(\d+)", regex::escape(arxiv_id)));
        let best = re.ok().and_then(|re| {
            RE_HREF
                .captures_iter(abs_html)
                .filter_map(|c| {
                    let href = c.get(1)?.as_str();
                    let version: u32 = re.captures(href)?.get(1)?.as_str().parse().ok()?;
                    Some((version, href.to_string()))
                })
                .max_by_key(|(v, _)| *v)
        });
        match best {
            Some((_, href)) => href,
            None => format!("/html/{arxiv_id}v1"),
        }
    }

    /// Win rates from the full paper text.
    pub fn parse_paper(html: &str) -> Vec<MetricObservation> {
        let text = html_to_text(html);

        let region = match RE_TABLE2.find(&text) {
            Some(m) => {
                let mut start = m.start().saturating_sub(100);
                while !text.is_char_boundary(start) {
                    start -= 1;
                }
                let mut end = (m.end() + 2000).min(text.len());
                while !text.is_char_boundary(end) {
                    end += 1;
                }
                &text[start..end]
            }
            None => text.as_str(),
        };

        RE_MODEL
            .captures_iter(region)
            .filter_map(|c| {
                let value: f64 = c["value"].parse().ok()?;
                Some(MetricObservation {
                    metric_key: "gdpval_table2_win_rate_percent".to_string(),
                    value,
                    unit: "percent".to_string(),
                    entity: c["model"].to_ascii_lowercase(),
                    evidence: evidence(region, c.get(0)?.start()),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Extractor for GdpvalExtractor {
    async fn extract(&self, cx: &ExtractContext<'_>) -> Result<Vec<MetricObservation>> {
        let arxiv_id = RE_ARXIV_ID
            .captures(cx.url)
            .and_then(|c| c.name("id"))
            .map_or(DEFAULT_ARXIV_ID, |m| m.as_str());

        let base = Url::parse(cx.url).with_context(|| format!("bad source url {}", cx.url))?;
        let path = Self::latest_html_path(cx.body, arxiv_id);
        let html_url = base
            .join(&path)
            .with_context(|| format!("resolving {path} against {}", cx.url))?;

        let resp = cx
            .fetcher
            .fetch(html_url.as_str(), &Validators::default())
            .await
            .with_context(|| format!("fetching full text {html_url}"))?;
        if !resp.is_success() {
            bail!("full text {html_url} returned status {}", resp.status);
        }
        Ok(Self::parse_paper(&resp.body))
    }

    fn name(&self) -> &'static str {
        "gdpval"
    }
}
