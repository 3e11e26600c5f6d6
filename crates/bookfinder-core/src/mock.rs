//! Mock search backend for testing.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{FetchError, SearchBackend};
use crate::record::{PaginationMeta, ResultRecord, SearchResponse};

/// A configurable mock response for [`MockSearch`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Simulate a successful page of results.
    Page(SearchResponse),
    /// Simulate a non-2xx status.
    Status(u16),
    /// Simulate a body that does not decode.
    Garbage(String),
}

impl MockResponse {
    /// A page whose records are titled after `titles`, with ids `0..n`.
    pub fn titles(source: &str, titles: &[&str], total_pages: u32) -> Self {
        let books = titles
            .iter()
            .enumerate()
            .map(|(i, t)| ResultRecord {
                id: Some(i.to_string()),
                source: Some(source.to_string()),
                title: Some(t.to_string()),
                second_pass_code: Some(format!("{t}.pdf")),
                ..Default::default()
            })
            .collect();
        MockResponse::Page(SearchResponse {
            books,
            meta: PaginationMeta {
                total_pages,
                total_records: titles.len() as u64,
                search_time_ms: 12.0,
            },
        })
    }
}

/// A hand-rolled mock implementing [`SearchBackend`] for tests.
///
/// Responses and latency are configured per query string, with a fallback
/// for anything unregistered. Every call is counted.
pub struct MockSearch {
    routes: Mutex<HashMap<String, (MockResponse, Option<Duration>)>>,
    fallback: MockResponse,
    call_count: AtomicUsize,
}

impl MockSearch {
    /// Create a mock that returns `fallback` for every query.
    pub fn new(fallback: MockResponse) -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            fallback,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Answer `query` with `response` after `delay`.
    pub fn route(self, query: &str, response: MockResponse, delay: Option<Duration>) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(query.to_string(), (response, delay));
        self
    }

    /// How many times `search()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn lookup(&self, query: &str) -> (MockResponse, Option<Duration>) {
        let routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes
            .get(query)
            .cloned()
            .unwrap_or_else(|| (self.fallback.clone(), None))
    }
}

impl SearchBackend for MockSearch {
    fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResponse, FetchError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let (response, delay) = self.lookup(query);

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match response {
                MockResponse::Page(page) => Ok(page),
                MockResponse::Status(code) => Err(FetchError::Status(code)),
                MockResponse::Garbage(body) => Err(FetchError::Decode(body)),
            }
        })
    }
}
