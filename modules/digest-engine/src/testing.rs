// Test mocks for the digest pipeline.
//
// Two mocks matching the two trait boundaries:
// - MockNewsApi (NewsApi) — scripted batch news responses plus keyed
//   summarize responses. Summaries are keyed by (company, first article
//   title) so overlapping cycles resolve deterministically; "*" matches any
//   article set. An optional Notify gate holds a summarize call open until
//   the test releases it, for ordering-race tests.
// - MockStageLogApi (StageLogApi) — keyed (build, stage) → response, with a
//   call recorder so tests can assert the search mode passes through
//   unchanged.
//
// Plus helpers for constructing articles and article maps.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use digest_common::{
    DigestError, EntityKey, NewsArticle, SearchMode, StageLogResponse, SummarizeResponse,
};

use crate::traits::{NewsApi, StageLogApi};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An article with a fixed timestamp and source, titled `title`.
pub fn article(title: &str) -> NewsArticle {
    NewsArticle {
        title: title.to_string(),
        description: format!("{title} (wire description)"),
        url: format!("https://news.example.com/{}", title.replace(' ', "-").to_lowercase()),
        published_at: Utc.with_ymd_and_hms(2024, 7, 4, 10, 0, 0).unwrap(),
        source_name: "Newswire".to_string(),
    }
}

/// Build a company → articles map from (company, titles) pairs.
pub fn news_map(entries: &[(&str, &[&str])]) -> HashMap<EntityKey, Vec<NewsArticle>> {
    entries
        .iter()
        .map(|(company, titles)| {
            (
                company.to_string(),
                titles.iter().map(|t| article(t)).collect(),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// MockNewsApi
// ---------------------------------------------------------------------------

enum ScriptedNews {
    Ok(HashMap<EntityKey, Vec<NewsArticle>>),
    Err(String),
}

struct ScriptedSummary {
    result: Result<SummarizeResponse, String>,
    gate: Option<Arc<Notify>>,
}

/// Scripted news API. Batch news calls consume scripts in registration
/// order; summarize calls resolve by key. Unregistered calls return `Err`.
pub struct MockNewsApi {
    news: Mutex<VecDeque<ScriptedNews>>,
    summaries: HashMap<(String, String), ScriptedSummary>,
}

impl MockNewsApi {
    pub fn new() -> Self {
        Self {
            news: Mutex::new(VecDeque::new()),
            summaries: HashMap::new(),
        }
    }

    /// Script the next batch news response.
    pub fn on_news(self, map: HashMap<EntityKey, Vec<NewsArticle>>) -> Self {
        self.news
            .lock()
            .unwrap()
            .push_back(ScriptedNews::Ok(map));
        self
    }

    /// Script the next batch news call to fail.
    pub fn on_news_error(self, message: &str) -> Self {
        self.news
            .lock()
            .unwrap()
            .push_back(ScriptedNews::Err(message.to_string()));
        self
    }

    /// Register a summarize response for a company, matching any article set.
    pub fn on_summary(self, company: &str, raw_summary: &str) -> Self {
        self.on_summary_for(company, "*", raw_summary)
    }

    /// Register a summarize response keyed by the first article's title —
    /// use distinct titles per cycle to script overlapping cycles.
    pub fn on_summary_for(mut self, company: &str, first_title: &str, raw_summary: &str) -> Self {
        self.summaries.insert(
            (company.to_string(), first_title.to_string()),
            ScriptedSummary {
                result: Ok(SummarizeResponse {
                    summary: raw_summary.to_string(),
                    key_points: Vec::new(),
                    sentiment: None,
                }),
                gate: None,
            },
        );
        self
    }

    /// Register a full summarize response for a company.
    pub fn on_summary_response(mut self, company: &str, resp: SummarizeResponse) -> Self {
        self.summaries.insert(
            (company.to_string(), "*".to_string()),
            ScriptedSummary {
                result: Ok(resp),
                gate: None,
            },
        );
        self
    }

    /// Register a failing summarize call for a company.
    pub fn on_summary_error(mut self, company: &str) -> Self {
        self.summaries.insert(
            (company.to_string(), "*".to_string()),
            ScriptedSummary {
                result: Err(format!("MockNewsApi: scripted summarize failure for {company}")),
                gate: None,
            },
        );
        self
    }

    /// Hold the keyed summarize call open until `gate` is notified.
    pub fn gated(mut self, company: &str, first_title: &str, gate: Arc<Notify>) -> Self {
        let entry = self
            .summaries
            .get_mut(&(company.to_string(), first_title.to_string()))
            .expect("register the summary before gating it");
        entry.gate = Some(gate);
        self
    }
}

#[async_trait]
impl NewsApi for MockNewsApi {
    async fn news(
        &self,
        companies: &[EntityKey],
    ) -> Result<HashMap<EntityKey, Vec<NewsArticle>>, DigestError> {
        let script = self.news.lock().unwrap().pop_front();
        match script {
            Some(ScriptedNews::Ok(map)) => Ok(map),
            Some(ScriptedNews::Err(message)) => Err(DigestError::Transport(message)),
            None => Err(DigestError::Transport(format!(
                "MockNewsApi: no news scripted for {companies:?}"
            ))),
        }
    }

    async fn summarize(
        &self,
        company: &str,
        articles: &[NewsArticle],
    ) -> Result<SummarizeResponse, DigestError> {
        let first_title = articles.first().map(|a| a.title.as_str()).unwrap_or("");
        let entry = self
            .summaries
            .get(&(company.to_string(), first_title.to_string()))
            .or_else(|| self.summaries.get(&(company.to_string(), "*".to_string())))
            .ok_or_else(|| {
                DigestError::Transport(format!(
                    "MockNewsApi: no summary registered for {company}"
                ))
            })?;

        if let Some(gate) = &entry.gate {
            gate.notified().await;
        }
        match &entry.result {
            Ok(resp) => Ok(resp.clone()),
            Err(message) => Err(DigestError::Transport(message.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// MockStageLogApi
// ---------------------------------------------------------------------------

struct ScriptedLog {
    result: Result<StageLogResponse, String>,
    gate: Option<Arc<Notify>>,
}

/// Keyed (build, stage) → stage-log response, recording every call so tests
/// can assert the search mode flag passed through unchanged.
pub struct MockStageLogApi {
    logs: HashMap<(String, String), ScriptedLog>,
    calls: Mutex<Vec<(String, String, SearchMode)>>,
}

impl MockStageLogApi {
    pub fn new() -> Self {
        Self {
            logs: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_log(mut self, build: &str, stage: &str, resp: StageLogResponse) -> Self {
        self.logs.insert(
            (build.to_string(), stage.to_string()),
            ScriptedLog {
                result: Ok(resp),
                gate: None,
            },
        );
        self
    }

    pub fn on_log_error(mut self, build: &str, stage: &str, message: &str) -> Self {
        self.logs.insert(
            (build.to_string(), stage.to_string()),
            ScriptedLog {
                result: Err(message.to_string()),
                gate: None,
            },
        );
        self
    }

    /// Hold the keyed log call open until `gate` is notified.
    pub fn gated(mut self, build: &str, stage: &str, gate: Arc<Notify>) -> Self {
        let entry = self
            .logs
            .get_mut(&(build.to_string(), stage.to_string()))
            .expect("register the log before gating it");
        entry.gate = Some(gate);
        self
    }

    /// Every (build, stage, mode) triple received, in call order.
    pub fn calls(&self) -> Vec<(String, String, SearchMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageLogApi for MockStageLogApi {
    async fn stage_log(
        &self,
        build: &str,
        stage: &str,
        mode: SearchMode,
    ) -> Result<StageLogResponse, DigestError> {
        self.calls
            .lock()
            .unwrap()
            .push((build.to_string(), stage.to_string(), mode));

        let entry = self
            .logs
            .get(&(build.to_string(), stage.to_string()))
            .ok_or_else(|| {
                DigestError::Transport(format!(
                    "MockStageLogApi: no log registered for {build}/{stage}"
                ))
            })?;

        if let Some(gate) = &entry.gate {
            gate.notified().await;
        }
        match &entry.result {
            Ok(resp) => Ok(resp.clone()),
            Err(message) => Err(DigestError::Transport(message.clone())),
        }
    }
}
