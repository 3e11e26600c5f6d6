//! Search settings and data-source selection.
//!
//! Both are plain values handed to the components that need them; nothing
//! here is global.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conditions::SearchField;

/// Normalized view of `GET /api/v1/settings`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    /// Only present when the server sent a positive number.
    pub page_size: Option<u32>,
    /// Only present when the server sent a known, non-blank field name.
    pub default_search_field: Option<SearchField>,
    pub datasources: Option<Vec<Value>>,
}

/// Settings payload as it appears on the wire, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSettings {
    pub page_size: Option<Value>,
    pub default_search_field: Option<Value>,
    pub datasources: Option<Vec<Value>>,
}

impl From<RawSettings> for Settings {
    fn from(raw: RawSettings) -> Self {
        let page_size = raw.page_size.and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        });
        let page_size = page_size
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok());

        let default_search_field = match raw.default_search_field {
            Some(Value::String(s)) if !s.trim().is_empty() => s.parse().ok(),
            _ => None,
        };

        Self {
            page_size,
            default_search_field,
            datasources: raw.datasources,
        }
    }
}

impl Settings {
    /// Overlay the fields present in `newer` on top of `self`.
    pub fn merge(&self, newer: Settings) -> Settings {
        Settings {
            page_size: newer.page_size.or(self.page_size),
            default_search_field: newer.default_search_field.or(self.default_search_field),
            datasources: newer.datasources.or_else(|| self.datasources.clone()),
        }
    }
}

/// Body of `POST /api/v1/settings`. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_search_field: Option<SearchField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasources: Option<Vec<Value>>,
}

/// `GET /api/v1/available-dbs`. Non-string entries are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AvailableDbs {
    pub available_dbs: Vec<Value>,
}

impl AvailableDbs {
    pub fn names(self) -> Vec<String> {
        self.available_dbs
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

/// Which data sources a search runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseSelection {
    available: Vec<String>,
    selected: Vec<String>,
}

impl DatabaseSelection {
    /// Start with every available source selected.
    pub fn new(available: Vec<String>) -> Self {
        Self {
            selected: available.clone(),
            available,
        }
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn toggle(&mut self, name: &str) {
        if let Some(pos) = self.selected.iter().position(|s| s == name) {
            self.selected.remove(pos);
        } else if self.available.iter().any(|s| s == name) {
            self.selected.push(name.to_string());
        }
    }

    /// Replace the selection. Names that are not available are dropped.
    pub fn set_selected<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref();
            if self.available.iter().any(|s| s == name) && !selected.iter().any(|s| s == name) {
                selected.push(name.to_string());
            }
        }
        self.selected = selected;
    }
}
