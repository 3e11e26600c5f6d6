use std::time::Duration;

use thiserror::Error;

pub mod backend;
pub mod client;
pub mod conditions;
pub mod config_file;
pub mod filename;
pub mod mock;
pub mod orchestrator;
pub mod pagination;
pub mod query;
pub mod record;
pub mod selection;
pub mod settings;

// Re-export for convenience
pub use backend::{FetchError, SearchBackend};
pub use client::CatalogClient;
pub use conditions::{
    BasicSearch, ConditionAction, ConditionChange, ConditionError, ConditionsState, Logic,
    Rejection, SearchCondition, SearchField, SubmitError, reduce,
};
pub use filename::FilenameCounterTable;
pub use orchestrator::{FetchUpdate, ResultFetcher, ResultsView};
pub use pagination::{PageControls, Pagination, PaginationError};
pub use query::QueryParams;
pub use record::{PaginationMeta, ResultItem, ResultRecord, SearchResponse};
pub use selection::{Clipboard, ClipboardError, SelectionError, SelectionTracker};
pub use settings::{DatabaseSelection, Settings, SettingsUpdate};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Data sources to search; empty means every available source.
    pub databases: Vec<String>,
    pub default_field: Option<SearchField>,
    pub fuzzy: bool,
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: client::DEFAULT_BASE_URL.to_string(),
            timeout_secs: client::DEFAULT_TIMEOUT_SECS,
            databases: vec![],
            default_field: None,
            fuzzy: true,
            color: true,
        }
    }
}

impl Config {
    /// Fill defaults with whatever the config file sets.
    pub fn from_file(file: &config_file::ConfigFile) -> Result<Self, CoreError> {
        let defaults = Config::default();
        let default_field = file
            .default_field()
            .map(|f| {
                f.parse::<SearchField>()
                    .map_err(|e| CoreError::Config(e.to_string()))
            })
            .transpose()?;
        Ok(Self {
            base_url: file.base_url().map(str::to_string).unwrap_or(defaults.base_url),
            timeout_secs: file.timeout_secs().unwrap_or(defaults.timeout_secs),
            databases: file.databases().map(<[String]>::to_vec).unwrap_or_default(),
            default_field,
            fuzzy: file.fuzzy().unwrap_or(defaults.fuzzy),
            color: file.color().unwrap_or(defaults.color),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
