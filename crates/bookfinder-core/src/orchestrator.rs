//! Issues searches for the current query string and applies their results.
//!
//! Only the most recently issued request may update the view. Changing the
//! query cancels the request in flight; its task notices the cancellation and
//! reports back, and any event carrying an older generation number is
//! dropped on arrival. Results are applied on the task that owns the
//! [`ResultFetcher`], so the view is never observed half-updated.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::{FetchError, SearchBackend};
use crate::query::QueryParams;
use crate::record::{PaginationMeta, ResultItem, SearchResponse, key_records};
use crate::selection::SelectionTracker;

/// The one message shown for any failed search.
pub const SEARCH_FAILED: &str = "search failed, please try again later";

/// How a request task finished.
#[derive(Debug)]
pub enum FetchOutcome {
    Loaded(SearchResponse),
    Failed(FetchError),
    /// The request was superseded or the fetcher shut down.
    Cancelled,
}

/// Sent from a request task back to its [`ResultFetcher`].
#[derive(Debug)]
pub struct FetchEvent {
    pub generation: u64,
    pub query: String,
    pub outcome: FetchOutcome,
}

/// Effect of applying one [`FetchEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchUpdate {
    /// New records and paging info are in the view.
    Applied,
    /// The request failed; the previous records are still shown.
    Failed(String),
    /// Stale or cancelled; nothing changed.
    Discarded,
}

/// What the results screen shows.
#[derive(Debug, Default)]
pub struct ResultsView {
    items: Vec<ResultItem>,
    meta: PaginationMeta,
    selection: SelectionTracker,
    error: Option<String>,
    loading: bool,
}

impl ResultsView {
    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    pub fn meta(&self) -> PaginationMeta {
        self.meta
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionTracker {
        &mut self.selection
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Swap in a new result set. Selection and filename counters start over.
    fn replace(&mut self, response: SearchResponse) {
        self.items = key_records(response.books);
        self.meta = response.meta;
        self.selection.replace_items(&self.items);
        self.error = None;
        self.loading = false;
    }
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

/// Owns the results view and the request currently in flight.
pub struct ResultFetcher {
    backend: Arc<dyn SearchBackend>,
    root: CancellationToken,
    tx: mpsc::UnboundedSender<FetchEvent>,
    rx: mpsc::UnboundedReceiver<FetchEvent>,
    generation: u64,
    in_flight: Option<InFlight>,
    query: String,
    view: ResultsView,
}

impl ResultFetcher {
    /// Cancelling `cancel` tears down every request this fetcher issues.
    pub fn new(backend: Arc<dyn SearchBackend>, cancel: &CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            root: cancel.child_token(),
            tx,
            rx,
            generation: 0,
            in_flight: None,
            query: String::new(),
            view: ResultsView::default(),
        }
    }

    pub fn view(&self) -> &ResultsView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ResultsView {
        &mut self.view
    }

    /// The query string the view currently tracks.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn params(&self) -> QueryParams {
        QueryParams::parse(&self.query)
    }

    /// Generation number of the most recently issued request.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Track a new query string.
    ///
    /// An unchanged string does nothing. Otherwise the request in flight is
    /// cancelled and, unless the new string is empty, a new one is issued.
    /// After [`shutdown`](Self::shutdown) the tracked query no longer changes.
    /// Must be called from within a Tokio runtime.
    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query == self.query || self.root.is_cancelled() {
            return;
        }
        self.query = query;
        self.issue();
    }

    /// Re-issue the current query, e.g. after a failure.
    pub fn refresh(&mut self) {
        self.issue();
    }

    fn issue(&mut self) {
        if let Some(prev) = self.in_flight.take() {
            tracing::debug!(generation = prev.generation, "cancelling superseded search");
            prev.cancel.cancel();
        }
        self.view.loading = false;

        if self.query.is_empty() {
            tracing::debug!("empty query, staying idle");
            return;
        }
        if self.root.is_cancelled() {
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        let cancel = self.root.child_token();
        self.in_flight = Some(InFlight {
            generation,
            cancel: cancel.clone(),
        });
        self.view.loading = true;
        self.view.error = None;

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let query = self.query.clone();
        tracing::debug!(generation, query = %query, "issuing search");

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => FetchOutcome::Cancelled,
                result = backend.search(&query) => match result {
                    Ok(response) => FetchOutcome::Loaded(response),
                    Err(e) => FetchOutcome::Failed(e),
                },
            };
            // Receiver gone means the fetcher was dropped; nothing to report to.
            let _ = tx.send(FetchEvent {
                generation,
                query,
                outcome,
            });
        });
    }

    /// Apply one event from a request task.
    pub fn apply(&mut self, event: FetchEvent) -> FetchUpdate {
        let current = self.in_flight.as_ref().map(|f| f.generation);
        if current != Some(event.generation) {
            tracing::debug!(
                generation = event.generation,
                current = ?current,
                "discarding stale search result"
            );
            return FetchUpdate::Discarded;
        }
        self.in_flight = None;

        match event.outcome {
            FetchOutcome::Loaded(response) => {
                tracing::info!(
                    query = %event.query,
                    records = response.books.len(),
                    total_records = response.meta.total_records,
                    "search results applied"
                );
                self.view.replace(response);
                FetchUpdate::Applied
            }
            FetchOutcome::Failed(e) => {
                tracing::warn!(query = %event.query, error = %e, "search failed");
                self.view.loading = false;
                self.view.error = Some(SEARCH_FAILED.to_string());
                FetchUpdate::Failed(SEARCH_FAILED.to_string())
            }
            FetchOutcome::Cancelled => {
                self.view.loading = false;
                FetchUpdate::Discarded
            }
        }
    }

    /// Wait until the current request is applied or fails.
    ///
    /// Returns `None` when nothing is in flight, including after a shutdown
    /// cancelled the pending request.
    pub async fn next_update(&mut self) -> Option<FetchUpdate> {
        while self.in_flight.is_some() {
            let event = self.rx.recv().await?;
            match self.apply(event) {
                FetchUpdate::Discarded => continue,
                update => return Some(update),
            }
        }
        None
    }

    /// Cancel everything this fetcher issued. Later queries are not sent.
    pub fn shutdown(&mut self) {
        self.root.cancel();
    }
}

impl Drop for ResultFetcher {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
