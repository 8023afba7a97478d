// Trait abstractions for the pipeline's network dependencies.
//
// NewsApi covers the two-phase aggregation calls: one batched primary fetch
// plus one derivation call per company. StageLogApi covers the on-demand
// stage-log fetch. Both are implemented for the concrete DigestClient.
//
// These enable deterministic testing with MockNewsApi and MockStageLogApi:
// no network, no backend. `cargo test` in seconds.

use std::collections::HashMap;

use async_trait::async_trait;

use digest_client::DigestClient;
use digest_common::{
    DigestError, EntityKey, NewsArticle, SearchMode, StageLogResponse, SummarizeResponse,
};

#[async_trait]
pub trait NewsApi: Send + Sync {
    /// One batched news fetch covering the entire selection.
    async fn news(
        &self,
        companies: &[EntityKey],
    ) -> Result<HashMap<EntityKey, Vec<NewsArticle>>, DigestError>;

    /// Derive a model summary for one company from its articles.
    async fn summarize(
        &self,
        company: &str,
        articles: &[NewsArticle],
    ) -> Result<SummarizeResponse, DigestError>;
}

#[async_trait]
pub trait StageLogApi: Send + Sync {
    /// Fetch the console log for one pipeline stage, passing the search mode
    /// flag through unchanged.
    async fn stage_log(
        &self,
        build: &str,
        stage: &str,
        mode: SearchMode,
    ) -> Result<StageLogResponse, DigestError>;
}

#[async_trait]
impl NewsApi for DigestClient {
    async fn news(
        &self,
        companies: &[EntityKey],
    ) -> Result<HashMap<EntityKey, Vec<NewsArticle>>, DigestError> {
        self.news(companies).await
    }

    async fn summarize(
        &self,
        company: &str,
        articles: &[NewsArticle],
    ) -> Result<SummarizeResponse, DigestError> {
        self.summarize(company, articles).await
    }
}

#[async_trait]
impl StageLogApi for DigestClient {
    async fn stage_log(
        &self,
        build: &str,
        stage: &str,
        mode: SearchMode,
    ) -> Result<StageLogResponse, DigestError> {
        self.stage_log(build, stage, mode).await
    }
}
