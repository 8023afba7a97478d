//! On-demand stage-log viewer.
//!
//! A single, user-triggered instance of the same two-phase shape as the
//! controller: one request per user action, with a tri-state outcome. The
//! server decides whether to return log content, an error, or a redirect to
//! the upstream CI system for downstream jobs; the client only selects the
//! branch. A request sequence counter gives last-write-wins semantics by
//! invocation, so an older in-flight request can never clobber a newer
//! result.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use digest_common::{SearchMode, StageLogResponse};

use crate::normalizer;
use crate::traits::StageLogApi;

/// Settled outcome of one log fetch. Exactly one branch is rendered,
/// selected by inspecting the response's `error`, then redirect, then
/// content fields, in that order.
#[derive(Debug, Clone, PartialEq)]
pub enum StageLogView {
    Error {
        message: String,
    },
    /// The stage triggered a downstream job; the full log lives upstream.
    ExternalRedirect {
        url: String,
    },
    Content {
        log: String,
        /// Model summary of the failure, already unwrapped from its
        /// string-or-object wire shape.
        summary: Option<String>,
        /// Ticket links related to the failure, displayed as-is.
        related_links: Vec<String>,
    },
}

/// Per-invocation state machine: `Idle → Requesting → Settled`, terminal on
/// settlement. A new invocation always restarts from scratch, abandoning any
/// in-flight request's effect on display.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewerState {
    #[default]
    Idle,
    Requesting,
    Settled(StageLogView),
}

struct Inner {
    state: ViewerState,
    seq: u64,
}

pub struct LogViewer {
    api: Arc<dyn StageLogApi>,
    inner: Arc<Mutex<Inner>>,
}

impl LogViewer {
    pub fn new(api: Arc<dyn StageLogApi>) -> Self {
        Self {
            api,
            inner: Arc::new(Mutex::new(Inner {
                state: ViewerState::Idle,
                seq: 0,
            })),
        }
    }

    pub fn state(&self) -> ViewerState {
        lock(&self.inner).state.clone()
    }

    /// Fetch the log for one pipeline stage. Synchronously resets all
    /// downstream state (content, summary, links) and moves to `Requesting`;
    /// the search mode flag passes through to the server unchanged.
    pub fn open(&self, build: &str, stage: &str, mode: SearchMode) -> JoinHandle<()> {
        let seq = {
            let mut inner = lock(&self.inner);
            inner.seq += 1;
            inner.state = ViewerState::Requesting;
            inner.seq
        };

        debug!(build, stage, ?mode, seq, "Fetching stage log");
        let api = self.api.clone();
        let inner = self.inner.clone();
        let build = build.to_string();
        let stage = stage.to_string();
        tokio::spawn(async move {
            let view = match api.stage_log(&build, &stage, mode).await {
                Ok(resp) => select_branch(resp),
                Err(e) => {
                    warn!(build = build.as_str(), stage = stage.as_str(), error = %e, "Stage log fetch failed");
                    StageLogView::Error {
                        message: e.to_string(),
                    }
                }
            };

            let mut guard = lock(&inner);
            if guard.seq != seq {
                debug!(seq, "Discarding superseded stage log result");
                return;
            }
            guard.state = ViewerState::Settled(view);
        })
    }

    /// Dismiss the viewer, dropping any settled content. An in-flight
    /// request's result is discarded on arrival.
    pub fn close(&self) {
        let mut inner = lock(&self.inner);
        inner.seq += 1;
        inner.state = ViewerState::Idle;
    }
}

/// Pick the rendered branch: explicit error first, then downstream redirect,
/// then content. A top-level summary with no log text still renders the
/// content branch, with empty log.
fn select_branch(resp: StageLogResponse) -> StageLogView {
    if let Some(message) = resp.error {
        return StageLogView::Error { message };
    }
    if let Some(url) = resp.downstream_console_url {
        return StageLogView::ExternalRedirect { url };
    }
    let summary = resp.summary.as_ref().and_then(normalizer::summary_field_text);
    StageLogView::Content {
        log: resp.log.unwrap_or_default(),
        summary,
        related_links: resp.document_ids.unwrap_or_default(),
    }
}

fn lock(inner: &Arc<Mutex<Inner>>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}
