use std::io::Write;

use bookfinder_core::client::CatalogClient;
use bookfinder_core::record::format_file_size;
use bookfinder_core::selection::ExportOutcome;
use bookfinder_core::{
    DatabaseSelection, Pagination, PaginationMeta, ResultItem, Settings, SubmitError,
};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the available data sources, marking the selected ones.
pub fn print_databases(
    w: &mut dyn Write,
    selection: &DatabaseSelection,
    color: ColorMode,
) -> std::io::Result<()> {
    if selection.available().is_empty() {
        writeln!(w, "No data sources available")?;
        return Ok(());
    }
    for name in selection.available() {
        let selected = selection.selected().iter().any(|s| s == name);
        let mark = if selected { "[x]" } else { "[ ]" };
        if color.enabled() && selected {
            writeln!(w, "{} {}", mark.green(), name)?;
        } else {
            writeln!(w, "{} {}", mark, name)?;
        }
    }
    Ok(())
}

pub fn print_settings(
    w: &mut dyn Write,
    settings: &Settings,
    color: ColorMode,
) -> std::io::Result<()> {
    let page_size = settings
        .page_size
        .map(|n| n.to_string())
        .unwrap_or_else(|| "(server default)".to_string());
    let field = settings
        .default_search_field
        .map(|f| f.to_string())
        .unwrap_or_else(|| "(server default)".to_string());
    let sources = settings.datasources.as_ref().map_or(0, Vec::len);

    if color.enabled() {
        writeln!(w, "{} {}", "Page size:".bold(), page_size)?;
        writeln!(w, "{} {}", "Default search field:".bold(), field)?;
        writeln!(w, "{} {}", "Configured data sources:".bold(), sources)?;
    } else {
        writeln!(w, "Page size: {}", page_size)?;
        writeln!(w, "Default search field: {}", field)?;
        writeln!(w, "Configured data sources: {}", sources)?;
    }
    Ok(())
}

/// Print the submission failure and each offending row (1-based).
pub fn print_submit_error(
    w: &mut dyn Write,
    err: &SubmitError,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", err.message.red())?;
    } else {
        writeln!(w, "{}", err.message)?;
    }
    for (index, row_err) in &err.rows {
        writeln!(w, "  condition {}: {}", index + 1, row_err)?;
    }
    Ok(())
}

pub fn print_error(w: &mut dyn Write, msg: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "ERROR:".red(), msg)?;
    } else {
        writeln!(w, "ERROR: {}", msg)?;
    }
    Ok(())
}

/// Print the result summary line, e.g. `42 records, 5 pages (0.35 s)`.
pub fn print_meta(w: &mut dyn Write, meta: &PaginationMeta, color: ColorMode) -> std::io::Result<()> {
    let line = format!(
        "{} records, {} pages ({} s)",
        meta.total_records,
        meta.total_pages,
        meta.search_seconds()
    );
    if color.enabled() {
        writeln!(w, "{}", line.dimmed())?;
    } else {
        writeln!(w, "{}", line)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print one page of records.
pub fn print_results(
    w: &mut dyn Write,
    items: &[ResultItem],
    client: &CatalogClient,
    color: ColorMode,
) -> std::io::Result<()> {
    if items.is_empty() {
        writeln!(w, "No records found")?;
        return Ok(());
    }

    for item in items {
        let record = &item.record;
        let title = truncate(record.display_title(), 100);
        if color.enabled() {
            writeln!(w, "{} {}", format!("[{}]", item.key).dimmed(), title.bold())?;
        } else {
            writeln!(w, "[{}] {}", item.key, title)?;
        }

        let authors = record.display_authors();
        if !authors.is_empty() {
            writeln!(w, "    {}", truncate(&authors, 100))?;
        }

        let imprint: Vec<&str> = [record.publisher.as_deref(), record.publish_date.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !imprint.is_empty() {
            writeln!(w, "    {}", imprint.join(", "))?;
        }

        let mut details = Vec::new();
        if let Some(isbn) = record.isbn.as_deref().filter(|s| !s.is_empty()) {
            details.push(format!("ISBN {}", isbn));
        }
        if let Some(pages) = record.page_count.filter(|n| *n > 0) {
            details.push(format!("{} pages", pages));
        }
        if let Some(size) = record.size.as_deref().filter(|s| !s.is_empty()) {
            details.push(format_file_size(size));
        }
        if let Some(kind) = record.file_type.as_deref().filter(|s| !s.is_empty()) {
            details.push(kind.to_uppercase());
        }
        if !details.is_empty() {
            writeln!(w, "    {}", details.join(" | "))?;
        }

        match record.export_code() {
            Some(code) if color.enabled() => writeln!(w, "    code: {}", code.cyan())?,
            Some(code) => writeln!(w, "    code: {}", code)?,
            None => {}
        }

        for url in [client.cover_url(record), client.download_url(record)]
            .into_iter()
            .flatten()
        {
            if color.enabled() {
                writeln!(w, "    {}", url.dimmed())?;
            } else {
                writeln!(w, "    {}", url)?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Print the pagination bar. Nothing is printed for a single page.
///
/// The current page is bracketed; inert first/last controls are dimmed.
pub fn print_pagination(
    w: &mut dyn Write,
    pagination: &Pagination,
    color: ColorMode,
) -> std::io::Result<()> {
    let Some(controls) = pagination.controls() else {
        return Ok(());
    };

    let mut parts = Vec::with_capacity(controls.pages.len() + 2);
    let first = "<<".to_string();
    let last = ">>".to_string();
    parts.push(if color.enabled() && controls.first.disabled {
        first.dimmed().to_string()
    } else {
        first
    });
    for link in &controls.pages {
        let label = if link.active {
            format!("[{}]", link.page)
        } else {
            link.page.to_string()
        };
        parts.push(if color.enabled() && link.active {
            label.bold().to_string()
        } else {
            label
        });
    }
    parts.push(if color.enabled() && controls.last.disabled {
        last.dimmed().to_string()
    } else {
        last
    });

    writeln!(
        w,
        "{}    page {} of {}",
        parts.join(" "),
        pagination.current_page(),
        pagination.total_pages()
    )?;
    Ok(())
}

/// Report what was exported. With `echo`, the exported text itself is
/// printed instead of a count.
pub fn print_export(
    w: &mut dyn Write,
    outcome: &ExportOutcome,
    echo: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    if echo {
        writeln!(w, "{}", outcome.text)?;
        return Ok(());
    }
    let msg = format!("Copied {} code(s) to the clipboard", outcome.names.len());
    if color.enabled() {
        writeln!(w, "{}", msg.green())?;
    } else {
        writeln!(w, "{}", msg)?;
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookfinder_core::QueryParams;

    fn render(pagination: &Pagination) -> String {
        let mut buf = Vec::new();
        print_pagination(&mut buf, pagination, ColorMode(false)).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn pagination_bar_marks_current_page() {
        let params = QueryParams::parse("queries=x&page=5");
        let bar = render(&Pagination::new(&params, 10));
        assert_eq!(bar, "<< 3 4 [5] 6 7 >>    page 5 of 10\n");
    }

    #[test]
    fn single_page_prints_nothing() {
        let params = QueryParams::parse("queries=x");
        assert_eq!(render(&Pagination::new(&params, 1)), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("短い題名です", 3), "短い題...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn submit_error_lists_rows_one_based() {
        let err = SubmitError {
            rows: vec![(1, bookfinder_core::ConditionError::IsbnNotNumeric)],
            message: bookfinder_core::conditions::MSG_FIX_CONDITIONS,
        };
        let mut buf = Vec::new();
        print_submit_error(&mut buf, &err, ColorMode(false)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("condition 2: ISBN must contain digits only"));
    }
}
