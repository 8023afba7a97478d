//! Selection-driven aggregation controller.
//!
//! Owns the selected-company set and the keyed read model. Each selection
//! change starts a new fetch cycle: one batched news fetch, then one
//! concurrent summarize request per company with a non-empty article list.
//! Cycles are tagged with a generation counter; results arriving for a
//! superseded generation are discarded, never merged. In-flight requests are
//! not aborted at the transport level — the fetches are idempotent reads, so
//! discarding stale responses on arrival is enough.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use digest_common::{Digest, EntityKey, NewsArticle, Sentiment};

use crate::normalizer;
use crate::traits::NewsApi;

/// Upper bound on a single summarize request. A stalled derivation would
/// otherwise leave its company's loading flag set forever.
pub const DEFAULT_DERIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Normalized summary for one company, plus wire extras carried through.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanySummary {
    pub digest: Digest,
    pub key_points: Vec<String>,
}

/// Read model exposed to the display layer. All maps are keyed by company;
/// entries for companies outside the current selection are pruned on every
/// selection change.
#[derive(Debug, Clone, Default)]
pub struct DigestState {
    /// Articles per company, replaced wholesale when a cycle's news fetch
    /// resolves. Never partially merged.
    pub news: HashMap<EntityKey, Vec<NewsArticle>>,

    /// Settled summaries. Absent means not yet derived, not derived at all,
    /// or failed (see `summary_failed`).
    pub summaries: HashMap<EntityKey, CompanySummary>,

    /// True from the moment a summarize request is issued until it settles.
    /// Independent across companies.
    pub loading: HashMap<EntityKey, bool>,

    /// Companies whose summarize request failed or timed out this cycle.
    /// Their news entries stay intact; the display layer shows an explicit
    /// "no summary available" state.
    pub summary_failed: HashSet<EntityKey>,

    /// Set when the batched news fetch itself failed — the whole cycle is
    /// suppressed and one error banner is shown.
    pub news_error: Option<String>,
}

struct Inner {
    state: DigestState,
    generation: u64,
}

pub struct DigestController {
    api: Arc<dyn NewsApi>,
    inner: Arc<Mutex<Inner>>,
    derive_timeout: Duration,
}

impl DigestController {
    pub fn new(api: Arc<dyn NewsApi>) -> Self {
        Self {
            api,
            inner: Arc::new(Mutex::new(Inner {
                state: DigestState::default(),
                generation: 0,
            })),
            derive_timeout: DEFAULT_DERIVE_TIMEOUT,
        }
    }

    pub fn with_derive_timeout(mut self, timeout: Duration) -> Self {
        self.derive_timeout = timeout;
        self
    }

    /// Snapshot of the current read model.
    pub fn state(&self) -> DigestState {
        lock(&self.inner).state.clone()
    }

    /// Replace the selection and start a new fetch cycle.
    ///
    /// Synchronously: bumps the generation (invalidating all in-flight
    /// results), prunes deselected companies from every map, and clears stale
    /// summaries. An empty selection clears everything and issues no network
    /// calls. The returned handle settles when the whole cycle has — callers
    /// that only render snapshots may drop it.
    pub fn set_selection(&self, companies: Vec<EntityKey>) -> JoinHandle<()> {
        let generation = {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            if companies.is_empty() {
                inner.state = DigestState::default();
            } else {
                let selected: HashSet<&EntityKey> = companies.iter().collect();
                inner.state.news.retain(|k, _| selected.contains(k));
                inner.state.loading.retain(|k, _| selected.contains(k));
                inner.state.summaries.clear();
                inner.state.summary_failed.clear();
                inner.state.news_error = None;
            }
            inner.generation
        };

        if companies.is_empty() {
            return tokio::spawn(async {});
        }

        info!(companies = companies.len(), generation, "Starting digest cycle");
        let api = self.api.clone();
        let inner = self.inner.clone();
        let derive_timeout = self.derive_timeout;
        tokio::spawn(run_cycle(api, inner, companies, generation, derive_timeout))
    }
}

/// One full fetch cycle: batched news fetch, then per-company summarize
/// fan-out. Settles when every summarize task has.
async fn run_cycle(
    api: Arc<dyn NewsApi>,
    inner: Arc<Mutex<Inner>>,
    companies: Vec<EntityKey>,
    generation: u64,
    derive_timeout: Duration,
) {
    let news = match api.news(&companies).await {
        Ok(news) => news,
        Err(e) => {
            // The dependent summarize phase cannot proceed without articles:
            // clear the whole cycle and surface one pipeline-level error.
            warn!(error = %e, generation, "News fetch failed");
            let mut guard = lock(&inner);
            if guard.generation == generation {
                guard.state = DigestState::default();
                guard.state.news_error = Some(e.to_string());
            }
            return;
        }
    };

    // Store articles for every selected company (missing entries become
    // empty), mark companies with articles as loading, all under one lock.
    let to_derive: Vec<(EntityKey, Vec<NewsArticle>)> = {
        let mut guard = lock(&inner);
        if guard.generation != generation {
            debug!(generation, "Discarding stale news result");
            return;
        }
        guard.state.news.clear();
        let mut to_derive = Vec::new();
        for company in &companies {
            let articles = news.get(company).cloned().unwrap_or_default();
            guard.state.news.insert(company.clone(), articles.clone());
            if articles.is_empty() {
                guard.state.loading.insert(company.clone(), false);
            } else {
                guard.state.loading.insert(company.clone(), true);
                to_derive.push((company.clone(), articles));
            }
        }
        to_derive
    };

    let tasks: Vec<JoinHandle<()>> = to_derive
        .into_iter()
        .map(|(company, articles)| {
            let api = api.clone();
            let inner = inner.clone();
            tokio::spawn(async move {
                derive_one(api, inner, company, articles, generation, derive_timeout).await;
            })
        })
        .collect();

    join_all(tasks).await;
    debug!(generation, "Digest cycle settled");
}

/// Summarize one company and fold the outcome into the read model. Failures
/// are entity-local: siblings are untouched and the cycle continues.
async fn derive_one(
    api: Arc<dyn NewsApi>,
    inner: Arc<Mutex<Inner>>,
    company: EntityKey,
    articles: Vec<NewsArticle>,
    generation: u64,
    derive_timeout: Duration,
) {
    let result = tokio::time::timeout(derive_timeout, api.summarize(&company, &articles)).await;

    let mut guard = lock(&inner);
    if guard.generation != generation {
        debug!(company = company.as_str(), generation, "Discarding stale summary");
        return;
    }

    match result {
        Ok(Ok(resp)) => {
            let mut digest = normalizer::normalize(&resp.summary);
            // The wire-level sentiment field backs up a summary text that
            // carried no recoverable sentiment of its own.
            if digest.sentiment == Sentiment::Unknown {
                if let Some(outer) = &resp.sentiment {
                    digest.sentiment = Sentiment::parse(outer);
                }
            }
            guard.state.summaries.insert(
                company.clone(),
                CompanySummary {
                    digest,
                    key_points: resp.key_points,
                },
            );
        }
        Ok(Err(e)) => {
            warn!(company = company.as_str(), error = %e, "Summarize failed");
            guard.state.summary_failed.insert(company.clone());
        }
        Err(_) => {
            warn!(
                company = company.as_str(),
                timeout_secs = derive_timeout.as_secs(),
                "Summarize timed out"
            );
            guard.state.summary_failed.insert(company.clone());
        }
    }
    guard.state.loading.insert(company, false);
}

fn lock(inner: &Arc<Mutex<Inner>>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}
