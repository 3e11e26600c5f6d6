//! HTTP client for the catalog backend.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::backend::{FetchError, SearchBackend};
use crate::record::{ResultRecord, SearchResponse};
use crate::settings::{AvailableDbs, RawSettings, Settings, SettingsUpdate};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:10223";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Thin wrapper over `reqwest` for the `/api/v1` endpoints.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bookfinder/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn available_dbs(&self) -> Result<Vec<String>, FetchError> {
        let dbs: AvailableDbs = self.get_json(&self.url("/api/v1/available-dbs")).await?;
        Ok(dbs.names())
    }

    pub async fn settings(&self) -> Result<Settings, FetchError> {
        let raw: RawSettings = self.get_json(&self.url("/api/v1/settings")).await?;
        Ok(raw.into())
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<Settings, FetchError> {
        let resp = self
            .http
            .post(self.url("/api/v1/settings"))
            .json(update)
            .send()
            .await?;
        let raw: RawSettings = decode(resp).await?;
        Ok(raw.into())
    }

    /// `GET /api/v1/search?{query}` with `query` passed through verbatim.
    pub async fn search_raw(&self, query: &str) -> Result<SearchResponse, FetchError> {
        self.get_json(&format!("{}?{}", self.url("/api/v1/search"), query))
            .await
    }

    /// Cover image URL, only for records that advertise one.
    pub fn cover_url(&self, record: &ResultRecord) -> Option<String> {
        if !record.has_cover {
            return None;
        }
        self.record_url("/api/v1/cover", record)
    }

    /// Download URL, only for records that can be downloaded.
    pub fn download_url(&self, record: &ResultRecord) -> Option<String> {
        if !record.can_download {
            return None;
        }
        self.record_url("/api/v1/download", record)
    }

    fn record_url(&self, path: &str, record: &ResultRecord) -> Option<String> {
        let (source, id) = record.stable_id()?;
        Some(format!(
            "{}?source={}&id={}",
            self.url(path),
            urlencoding::encode(source),
            urlencoding::encode(id)
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        tracing::debug!(url, "GET");
        let resp = self.http.get(url).send().await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, FetchError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let body = resp.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
}

impl SearchBackend for CatalogClient {
    fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResponse, FetchError>> + Send + 'a>> {
        Box::pin(self.search_raw(query))
    }
}
