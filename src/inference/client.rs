//! HTTP client for the remote scorer

use super::{InferenceRequest, InferenceScore, Scorer};
use crate::error::{Result, ScanError};
use crate::telemetry::{record_latency, LatencyMetric};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Inference endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Endpoint URL; required (config file or `INFERENCE_URL`)
    #[serde(default)]
    pub url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Single-shot JSON client; errors are never retried
pub struct InferenceClient {
    url: String,
    client: Client,
}

impl InferenceClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Scorer for InferenceClient {
    async fn score(&self, request: &InferenceRequest) -> Result<Vec<InferenceScore>> {
        let started = Instant::now();
        tracing::debug!(url = %self.url, rows = request.len(), "Calling inference endpoint");

        let response = self.client.post(&self.url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::InferenceStatus { status, body });
        }

        let scores: Vec<InferenceScore> = response.json().await?;
        record_latency(LatencyMetric::Inference, started.elapsed());

        Ok(scores)
    }
}
