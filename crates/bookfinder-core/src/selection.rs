//! Row selection over one result page and clipboard export of second-pass codes.

use std::collections::HashMap;
use std::io::Write;

use base64::Engine;
use thiserror::Error;

use crate::filename::FilenameCounterTable;
use crate::record::ResultItem;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard is not available")]
    Unavailable,
    #[error("clipboard write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Destination for exported text.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// Writes text as an OSC 52 clipboard sequence to `out`, for terminals
/// that honour it.
pub struct Osc52Clipboard<W: Write> {
    out: W,
}

impl Osc52Clipboard<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Clipboard for Osc52Clipboard<W> {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
        self.out
            .write_all(format!("\x1b]52;c;{}\x07", encoded).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps the last written text in memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    pub contents: Option<String>,
    /// When set, every write fails with [`ClipboardError::Unavailable`].
    pub unavailable: bool,
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.unavailable {
            return Err(ClipboardError::Unavailable);
        }
        self.contents = Some(text.to_string());
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("select at least one entry")]
    NothingSelected,
    #[error("copy failed: {0}")]
    Clipboard(#[from] ClipboardError),
}

/// What a successful batch export wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub names: Vec<String>,
    pub text: String,
}

/// Checked rows of the current result page.
///
/// Selection and the filename table belong to one result set: both are
/// reset by [`replace_items`](Self::replace_items) and never carried over.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    /// Visible keys in display order.
    keys: Vec<String>,
    codes: HashMap<String, Option<String>>,
    /// Checked keys in the order they were checked.
    selected: Vec<String>,
    filenames: FilenameCounterTable,
}

impl SelectionTracker {
    pub fn new(items: &[ResultItem]) -> Self {
        let mut tracker = Self::default();
        tracker.replace_items(items);
        tracker
    }

    /// Swap in a new result set, clearing the selection and filename table.
    pub fn replace_items(&mut self, items: &[ResultItem]) {
        self.keys = items.iter().map(|i| i.key.clone()).collect();
        self.codes = items
            .iter()
            .map(|i| (i.key.clone(), i.record.export_code().map(str::to_string)))
            .collect();
        self.selected.clear();
        self.filenames.reset();
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.iter().any(|k| k == key)
    }

    /// Flip one row. Keys that are not on the current page are ignored.
    pub fn toggle(&mut self, key: &str) {
        if let Some(pos) = self.selected.iter().position(|k| k == key) {
            self.selected.remove(pos);
        } else if self.codes.contains_key(key) {
            self.selected.push(key.to_string());
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.keys.clone();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn selected_keys(&self) -> &[String] {
        &self.selected
    }

    pub fn visible_keys(&self) -> &[String] {
        &self.keys
    }

    /// Copy the deduplicated codes of every checked row, one per line.
    ///
    /// Names are minted on a copy of the filename table, which replaces the
    /// live one only once the clipboard write succeeds.
    pub fn export_selected(
        &mut self,
        clipboard: &mut dyn Clipboard,
    ) -> Result<ExportOutcome, SelectionError> {
        let mut filenames = self.filenames.clone();
        let mut names = Vec::new();
        for key in &self.selected {
            if let Some(Some(code)) = self.codes.get(key) {
                names.push(filenames.ensure_unique(code));
            }
        }
        if names.is_empty() {
            return Err(SelectionError::NothingSelected);
        }

        let text = names.join("\n");
        clipboard.write_text(&text)?;
        self.filenames = filenames;
        tracing::debug!(count = names.len(), "exported selected codes");
        Ok(ExportOutcome { names, text })
    }

    /// Copy one row's code. Returns `Ok(None)` without touching the clipboard
    /// when the row is unknown or has no code.
    pub fn export_one(
        &mut self,
        key: &str,
        clipboard: &mut dyn Clipboard,
    ) -> Result<Option<String>, SelectionError> {
        let Some(Some(code)) = self.codes.get(key) else {
            return Ok(None);
        };
        let mut filenames = self.filenames.clone();
        let name = filenames.ensure_unique(code);
        clipboard.write_text(&name)?;
        self.filenames = filenames;
        Ok(Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ResultRecord, key_records};

    fn items(codes: &[Option<&str>]) -> Vec<ResultItem> {
        let records = codes
            .iter()
            .enumerate()
            .map(|(i, code)| ResultRecord {
                id: Some(i.to_string()),
                source: Some("main".into()),
                second_pass_code: code.map(str::to_string),
                ..Default::default()
            })
            .collect();
        key_records(records)
    }

    #[test]
    fn toggle_and_query() {
        let mut tracker = SelectionTracker::new(&items(&[Some("a.pdf"), Some("b.pdf")]));
        assert!(!tracker.is_selected("main-0"));
        tracker.toggle("main-0");
        assert!(tracker.is_selected("main-0"));
        tracker.toggle("main-0");
        assert!(!tracker.is_selected("main-0"));
    }

    #[test]
    fn toggle_ignores_unknown_keys() {
        let mut tracker = SelectionTracker::new(&items(&[Some("a.pdf")]));
        tracker.toggle("elsewhere-9");
        assert!(tracker.selected_keys().is_empty());
    }

    #[test]
    fn select_all_covers_visible_rows_only() {
        let mut tracker = SelectionTracker::new(&items(&[Some("a"), None, Some("c")]));
        tracker.select_all();
        assert_eq!(tracker.selected_keys(), ["main-0", "main-1", "main-2"]);
        tracker.deselect_all();
        assert!(tracker.selected_keys().is_empty());
    }

    #[test]
    fn export_selected_dedups_in_selection_order() {
        let mut tracker =
            SelectionTracker::new(&items(&[Some("x.pdf"), Some("y.pdf"), Some("x.pdf"), None]));
        tracker.toggle("main-2");
        tracker.toggle("main-3");
        tracker.toggle("main-0");
        tracker.toggle("main-1");
        let mut clip = MemoryClipboard::default();
        let outcome = tracker.export_selected(&mut clip).unwrap();
        assert_eq!(outcome.names, ["x.pdf", "x(2).pdf", "y.pdf"]);
        assert_eq!(clip.contents.as_deref(), Some("x.pdf\nx(2).pdf\ny.pdf"));
    }

    #[test]
    fn export_with_empty_selection_fails() {
        let mut tracker = SelectionTracker::new(&items(&[Some("x.pdf"), None]));
        let mut clip = MemoryClipboard::default();
        assert!(matches!(
            tracker.export_selected(&mut clip),
            Err(SelectionError::NothingSelected)
        ));
        tracker.toggle("main-1");
        assert!(matches!(
            tracker.export_selected(&mut clip),
            Err(SelectionError::NothingSelected)
        ));
        assert!(clip.contents.is_none());
    }

    #[test]
    fn clipboard_failure_is_reported() {
        let mut tracker = SelectionTracker::new(&items(&[Some("x.pdf")]));
        tracker.select_all();
        let mut clip = MemoryClipboard {
            unavailable: true,
            ..Default::default()
        };
        let err = tracker.export_selected(&mut clip).unwrap_err();
        assert!(matches!(err, SelectionError::Clipboard(ClipboardError::Unavailable)));
    }

    #[test]
    fn failed_write_does_not_consume_names() {
        let mut tracker = SelectionTracker::new(&items(&[Some("x.pdf")]));
        tracker.select_all();
        let mut broken = MemoryClipboard {
            unavailable: true,
            ..Default::default()
        };
        assert!(tracker.export_selected(&mut broken).is_err());
        assert!(tracker.export_one("main-0", &mut broken).is_err());

        let mut clip = MemoryClipboard::default();
        let outcome = tracker.export_selected(&mut clip).unwrap();
        assert_eq!(outcome.text, "x.pdf");
        assert_eq!(
            tracker.export_one("main-0", &mut clip).unwrap().as_deref(),
            Some("x(2).pdf")
        );
    }

    #[test]
    fn single_and_batch_exports_share_one_table() {
        let mut tracker = SelectionTracker::new(&items(&[Some("x.pdf")]));
        let mut clip = MemoryClipboard::default();
        assert_eq!(
            tracker.export_one("main-0", &mut clip).unwrap().as_deref(),
            Some("x.pdf")
        );
        assert_eq!(
            tracker.export_one("main-0", &mut clip).unwrap().as_deref(),
            Some("x(2).pdf")
        );
        tracker.select_all();
        let outcome = tracker.export_selected(&mut clip).unwrap();
        assert_eq!(outcome.text, "x(3).pdf");
    }

    #[test]
    fn export_one_without_code_is_silent() {
        let mut tracker = SelectionTracker::new(&items(&[None]));
        let mut clip = MemoryClipboard::default();
        assert_eq!(tracker.export_one("main-0", &mut clip).unwrap(), None);
        assert_eq!(tracker.export_one("nope", &mut clip).unwrap(), None);
        assert!(clip.contents.is_none());
    }

    #[test]
    fn replacing_items_drops_stale_state() {
        let mut tracker = SelectionTracker::new(&items(&[Some("x.pdf"), Some("y.pdf")]));
        tracker.select_all();
        let mut clip = MemoryClipboard::default();
        tracker.export_selected(&mut clip).unwrap();

        let fresh = key_records(vec![ResultRecord {
            id: Some("0".into()),
            source: Some("other".into()),
            second_pass_code: Some("x.pdf".into()),
            ..Default::default()
        }]);
        tracker.replace_items(&fresh);
        assert!(!tracker.is_selected("main-0"));
        assert!(!tracker.is_selected("main-1"));
        tracker.toggle("main-0");
        assert!(tracker.selected_keys().is_empty());

        tracker.toggle("other-0");
        let outcome = tracker.export_selected(&mut clip).unwrap();
        assert_eq!(outcome.text, "x.pdf");
    }

    #[test]
    fn osc52_writes_base64_payload() {
        let mut clip = Osc52Clipboard::new(Vec::new());
        clip.write_text("hi").unwrap();
        assert_eq!(clip.into_inner(), b"\x1b]52;c;aGk=\x07");
    }
}
