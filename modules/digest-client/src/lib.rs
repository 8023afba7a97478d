//! HTTP client for the digest backend.
//!
//! Thin request/response layer: no retries, no caching. Network failures and
//! non-2xx statuses surface as `DigestError::Transport`; a body that does not
//! match the expected shape surfaces as `DigestError::Decode`. Retry policy,
//! if any, belongs to the caller.

use std::collections::HashMap;

use tracing::debug;

use digest_common::{
    DigestError, EntityKey, NewsArticle, NewsRequest, SearchMode, StageLogRequest,
    StageLogResponse, SummarizeRequest, SummarizeResponse,
};

pub struct DigestClient {
    http: reqwest::Client,
    base_url: String,
}

impl DigestClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the selection universe, optionally filtered by a search string.
    pub async fn companies(&self, search: &str) -> Result<Vec<String>, DigestError> {
        let url = format!("{}/companies", self.base_url);
        debug!(search, "Fetching companies");

        let response = self
            .http
            .get(&url)
            .query(&[("search", search)])
            .send()
            .await
            .map_err(transport)?;
        decode_json(response).await
    }

    /// One batched news fetch covering the entire key set.
    pub async fn news(
        &self,
        companies: &[EntityKey],
    ) -> Result<HashMap<EntityKey, Vec<NewsArticle>>, DigestError> {
        let url = format!("{}/news", self.base_url);
        debug!(companies = companies.len(), "Fetching news batch");

        let body = NewsRequest {
            companies: companies.to_vec(),
        };
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        decode_json(response).await
    }

    /// Derive a model summary for one company from its fetched articles.
    pub async fn summarize(
        &self,
        company: &str,
        articles: &[NewsArticle],
    ) -> Result<SummarizeResponse, DigestError> {
        let url = format!("{}/summarize", self.base_url);
        debug!(company, articles = articles.len(), "Requesting summary");

        let body = SummarizeRequest {
            company: company.to_string(),
            articles: articles.to_vec(),
        };
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        decode_json(response).await
    }

    /// Fetch the console log for one pipeline stage. The search mode flag is
    /// passed through to the server unchanged.
    pub async fn stage_log(
        &self,
        build: &str,
        stage: &str,
        mode: SearchMode,
    ) -> Result<StageLogResponse, DigestError> {
        let url = format!("{}/pipeline/log/{build}/{stage}", self.base_url);
        debug!(build, stage, ?mode, "Fetching stage log");

        let body = StageLogRequest { run_search: mode };
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        decode_json(response).await
    }
}

fn transport(e: reqwest::Error) -> DigestError {
    DigestError::Transport(e.to_string())
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DigestError> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(DigestError::Transport(format!(
            "Digest API error ({status}): {error_text}"
        )));
    }
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| DigestError::Decode(e.to_string()))
}
