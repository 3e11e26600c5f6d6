//! Page navigation derived from the `page` query parameter.
//!
//! Navigation only ever rewrites `page`; every other parameter, including
//! repeated ones, is carried over untouched.

use thiserror::Error;

use crate::query::{self, QueryParams};

/// Number of page links on each side of the current page.
const WINDOW_RADIUS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("enter a valid page number")]
    NotANumber(String),
    #[error("enter a page number between 1 and {total_pages}")]
    OutOfRange { page: i64, total_pages: u32 },
}

/// One clickable page control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLink {
    pub page: u32,
    /// The control points at the current page (first/last) and is inert.
    pub disabled: bool,
    /// The control is the current page in the numbered window.
    pub active: bool,
}

/// Everything needed to render the pagination bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageControls {
    pub first: PageLink,
    pub pages: Vec<PageLink>,
    pub last: PageLink,
}

#[derive(Debug, Clone)]
pub struct Pagination {
    params: QueryParams,
    current_page: u32,
    total_pages: u32,
}

impl Pagination {
    pub fn new(params: &QueryParams, total_pages: u32) -> Self {
        Self {
            current_page: current_page(params),
            params: params.clone(),
            total_pages,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Up to five pages centred on the current one, clipped to `1..=total`.
    pub fn window(&self) -> Vec<u32> {
        let low = self.current_page.saturating_sub(WINDOW_RADIUS).max(1);
        let high = self
            .current_page
            .saturating_add(WINDOW_RADIUS)
            .min(self.total_pages);
        (low..=high).collect()
    }

    /// `None` when there is at most one page and no controls are shown.
    pub fn controls(&self) -> Option<PageControls> {
        if self.total_pages <= 1 {
            return None;
        }
        let current = self.current_page;
        Some(PageControls {
            first: PageLink {
                page: 1,
                disabled: current == 1,
                active: false,
            },
            pages: self
                .window()
                .into_iter()
                .map(|page| PageLink {
                    page,
                    disabled: false,
                    active: page == current,
                })
                .collect(),
            last: PageLink {
                page: self.total_pages,
                disabled: current == self.total_pages,
                active: false,
            },
        })
    }

    /// Parameters pointing at `page`, with everything else preserved.
    pub fn go_to(&self, page: u32) -> QueryParams {
        let mut next = self.params.clone();
        next.set(query::PAGE, page.to_string());
        next
    }

    /// Validate free-form page input and build the parameters for it.
    pub fn jump_to(&self, input: &str) -> Result<QueryParams, PaginationError> {
        let page: i64 = input
            .trim()
            .parse()
            .map_err(|_| PaginationError::NotANumber(input.to_string()))?;
        if page < 1 || page > i64::from(self.total_pages) {
            return Err(PaginationError::OutOfRange {
                page,
                total_pages: self.total_pages,
            });
        }
        Ok(self.go_to(page as u32))
    }
}

/// Current page from the `page` parameter.
///
/// Like a lenient integer read, only the leading digits count, so `3abc` is
/// page 3. Missing, non-numeric or < 1 is 1.
pub fn current_page(params: &QueryParams) -> u32 {
    params
        .get(query::PAGE)
        .and_then(leading_integer)
        .filter(|p| *p >= 1)
        .map(|p| u32::try_from(p).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

fn leading_integer(raw: &str) -> Option<i64> {
    let text = raw.trim_start();
    let sign_len = usize::from(text.starts_with(['+', '-']));
    let digits = text[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    let number = &text[..sign_len + digits];
    // Overlong digit runs saturate instead of falling back to page 1.
    Some(number.parse().unwrap_or(if number.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }))
}
