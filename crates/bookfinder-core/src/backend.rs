use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::record::SearchResponse;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {0}")]
    Status(u16),
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Trait for the search service the result fetcher talks to.
///
/// Implementors run one search for an already-encoded query string
/// (without the leading `?`). The HTTP implementation is
/// [`CatalogClient`](crate::client::CatalogClient).
pub trait SearchBackend: Send + Sync {
    fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResponse, FetchError>> + Send + 'a>>;
}
