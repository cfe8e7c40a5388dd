//! HTTP adapter for the external insights service.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{sanitize_summary, Classification, Classifier, ClassifyInput, Summarizer, SummaryInput};
use crate::model::Summary;

#[derive(Serialize)]
struct ItemsRequest<'a, T> {
    items: &'a [T],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    results: Vec<Classification>,
}

/// Client for `POST /classify` and `POST /summarize`.
#[derive(Clone)]
pub struct InsightsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl InsightsClient {
    #[must_use]
    pub fn new(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn post(&self, endpoint: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}/{}", self.base_url, endpoint));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl Classifier for InsightsClient {
    async fn classify(&self, items: &[ClassifyInput]) -> Result<Vec<Classification>> {
        let response = self
            .post("classify")
            .json(&ItemsRequest { items })
            .send()
            .await
            .context("Failed to send classify request")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Classifier returned status {}", status);
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .context("Failed to decode classify response")?;
        debug!(requested = items.len(), returned = body.results.len(), "Classified batch");
        Ok(body.results)
    }
}

#[async_trait]
impl Summarizer for InsightsClient {
    async fn summarize(&self, items: &[SummaryInput]) -> Result<Summary> {
        let response = self
            .post("summarize")
            .json(&ItemsRequest { items })
            .send()
            .await
            .context("Failed to send summarize request")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Summarizer returned status {}", status);
        }

        let summary: Summary = response
            .json()
            .await
            .context("Failed to decode summarize response")?;
        Ok(sanitize_summary(summary))
    }
}
