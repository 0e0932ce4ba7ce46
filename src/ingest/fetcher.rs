// src/ingest/fetcher.rs
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::Client;

use crate::config::tracker::FetchSettings;
use crate::ingest::types::{FetchResponse, Fetcher, Validators};

/// Conditional GET over reqwest with bounded retries on transport errors.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u8,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout.min(settings.timeout))
            .timeout(settings.timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            max_retries: settings.max_retries,
            backoff: Duration::from_millis(500),
        })
    }

    /// Base delay between attempts; doubles after each failure.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn attempt(&self, url: &str, validators: &Validators) -> reqwest::Result<FetchResponse> {
        let mut req = self.client.get(url);
        if let Some(etag) = validators.etag.as_deref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(lm) = validators.last_modified.as_deref() {
            req = req.header(IF_MODIFIED_SINCE, lm);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let headers: HashMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_ascii_lowercase(), v.to_str().ok()?.to_string())))
            .collect();
        let body = resp.text().await?;
        Ok(FetchResponse {
            status,
            body,
            headers,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, validators: &Validators) -> Result<FetchResponse> {
        let attempts = u32::from(self.max_retries) + 1;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.attempt(url, validators).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt < attempts {
                        tracing::debug!(url, attempt, error = %e, "fetch attempt failed, retrying");
                        tokio::time::sleep(self.backoff * (1u32 << (attempt - 1).min(16))).await;
                        continue;
                    }
                    tracing::warn!(url, attempts, error = %e, "fetch failed");
                    return Err(anyhow!("fetch failed after {attempts} attempts for {url}: {e}"));
                }
            }
        }
    }
}
