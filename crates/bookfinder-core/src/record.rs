//! Search response payloads and the keyed records built from them.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

/// A catalog record as returned by the search endpoint.
///
/// Every field is optional on the wire; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    /// Single-author form used by some sources instead of `authors`.
    pub author: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub publisher: Option<String>,
    pub publish_date: Option<String>,
    pub page_count: Option<i64>,
    pub isbn: Option<String>,
    pub ss_code: Option<String>,
    pub dxid: Option<String>,
    pub second_pass_code: Option<String>,
    pub size: Option<String>,
    pub file_type: Option<String>,
    pub source: Option<String>,
    pub has_cover: bool,
    pub can_download: bool,
}

impl ResultRecord {
    pub fn display_title(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => "untitled",
        }
    }

    /// Non-blank authors joined with `", "`, falling back to `author`.
    pub fn display_authors(&self) -> String {
        let joined = self
            .authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if !joined.is_empty() {
            return joined;
        }
        self.author
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    /// The exportable second-pass code, if present and non-blank.
    pub fn export_code(&self) -> Option<&str> {
        self.second_pass_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// `(source, id)` when both are present.
    pub fn stable_id(&self) -> Option<(&str, &str)> {
        match (self.source.as_deref(), self.id.as_deref()) {
            (Some(source), Some(id)) if !source.is_empty() && !id.is_empty() => Some((source, id)),
            _ => None,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Paging information that accompanies each result page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total_pages: u32,
    pub total_records: u64,
    pub search_time_ms: f64,
}

impl PaginationMeta {
    /// Search time in seconds with two decimals, e.g. `"0.35"`.
    pub fn search_seconds(&self) -> String {
        format!("{:.2}", self.search_time_ms / 1000.0)
    }
}

/// Body of `GET /api/v1/search`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub books: Vec<ResultRecord>,
    #[serde(flatten)]
    pub meta: PaginationMeta,
}

/// A record together with the key the selection tracker uses for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    pub key: String,
    pub record: ResultRecord,
}

/// Key every record of one result page.
///
/// Records with a source and id are keyed `"{source}-{id}"`. Others, and any
/// record whose stable key already appeared on the page, get an index-based
/// key built from the second-pass code or title. A fallback key that is
/// already taken gets a `-n` suffix, so every key on a page is distinct.
pub fn key_records(records: Vec<ResultRecord>) -> Vec<ResultItem> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let stable = record
                .stable_id()
                .map(|(source, id)| format!("{source}-{id}"))
                .filter(|k| !seen.contains(k));
            let key = stable.unwrap_or_else(|| {
                let base = record
                    .export_code()
                    .or(record.title.as_deref().filter(|t| !t.is_empty()))
                    .unwrap_or("book");
                let fallback = format!("{base}-{index}");
                let mut key = fallback.clone();
                let mut n = 1;
                while seen.contains(&key) {
                    n += 1;
                    key = format!("{fallback}-{n}");
                }
                key
            });
            seen.insert(key.clone());
            ResultItem { key, record }
        })
        .collect()
}

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Render a byte count string as a human-readable size.
///
/// Strings that are not plain non-negative decimals are returned unchanged.
pub fn format_file_size(raw: &str) -> String {
    let trimmed = raw.trim();
    let plain_number = !trimmed.is_empty()
        && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
        && trimmed.matches('.').count() <= 1
        && !trimmed.ends_with('.');
    let Some(bytes) = plain_number.then(|| trimmed.parse::<f64>().ok()).flatten() else {
        return raw.to_string();
    };
    if bytes <= 0.0 {
        return "0 Byte".to_string();
    }
    let exponent = (bytes.ln() / 1024f64.ln()).floor().max(0.0) as usize;
    let index = exponent.min(SIZE_UNITS.len() - 1);
    let value = bytes / 1024f64.powi(index as i32);
    format!("{value:.2} {}", SIZE_UNITS[index])
}
