//! Search conditions for the basic and advanced search forms.
//!
//! The advanced form is an ordered list of one to six conditions driven by a
//! pure transition function: [`reduce`] takes the current state and a
//! [`ConditionAction`] and returns the next state, or a [`Rejection`] when
//! the action is not allowed. Submission validates the rows and serializes
//! them into [`QueryParams`].

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::{self, QueryParams};

/// Maximum number of conditions in the advanced form.
pub const MAX_CONDITIONS: usize = 6;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());

/// Catalog field a condition searches in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    #[default]
    Title,
    Author,
    Publisher,
    Publishdate,
    Isbn,
    Tags,
    Sscode,
    Dxid,
    Identifier,
}

impl SearchField {
    pub const ALL: [SearchField; 9] = [
        SearchField::Title,
        SearchField::Author,
        SearchField::Publisher,
        SearchField::Publishdate,
        SearchField::Isbn,
        SearchField::Tags,
        SearchField::Sscode,
        SearchField::Dxid,
        SearchField::Identifier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Author => "author",
            SearchField::Publisher => "publisher",
            SearchField::Publishdate => "publishdate",
            SearchField::Isbn => "isbn",
            SearchField::Tags => "tags",
            SearchField::Sscode => "sscode",
            SearchField::Dxid => "dxid",
            SearchField::Identifier => "identifier",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown search field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for SearchField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SearchField::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Boolean joiner between a condition and the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field/query/logic/fuzzy tuple. `logic` is ignored at position 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCondition {
    pub field: SearchField,
    pub query: String,
    pub logic: Logic,
    pub fuzzy: bool,
}

impl SearchCondition {
    /// The condition the form starts with.
    pub fn initial() -> Self {
        Self {
            field: SearchField::Title,
            query: String::new(),
            logic: Logic::And,
            fuzzy: true,
        }
    }

    /// A condition appended with the "add" button.
    pub fn added() -> Self {
        Self {
            fuzzy: false,
            ..Self::initial()
        }
    }

    pub fn new(field: SearchField, query: impl Into<String>) -> Self {
        Self {
            field,
            query: query.into(),
            ..Self::initial()
        }
    }
}

/// Why a single condition failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("enter a keyword")]
    Blank,
    #[error("ISBN must contain digits only")]
    IsbnNotNumeric,
    #[error("date must look like YYYY-MM-DD")]
    InvalidDate,
}

/// Validate one condition's query text against its field.
pub fn validate_condition(condition: &SearchCondition) -> Result<(), ConditionError> {
    let text = condition.query.trim();
    if text.is_empty() {
        return Err(ConditionError::Blank);
    }
    match condition.field {
        SearchField::Isbn if !text.chars().all(|c| c.is_ascii_digit()) => {
            Err(ConditionError::IsbnNotNumeric)
        }
        SearchField::Publishdate if !DATE_RE.is_match(text) => Err(ConditionError::InvalidDate),
        _ => Ok(()),
    }
}

/// A condition plus its per-row form state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionRow {
    pub condition: SearchCondition,
    /// Set after the row first loses focus; touched rows validate eagerly.
    pub touched: bool,
    pub error: Option<ConditionError>,
}

impl ConditionRow {
    fn new(condition: SearchCondition) -> Self {
        Self {
            condition,
            touched: false,
            error: None,
        }
    }

    fn revalidate(&mut self) {
        if self.touched {
            self.error = validate_condition(&self.condition).err();
        }
    }
}

/// A single attribute change for [`ConditionAction::Update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionChange {
    Field(SearchField),
    Query(String),
    Logic(Logic),
    Fuzzy(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionAction {
    Add,
    Remove(usize),
    Update {
        index: usize,
        change: ConditionChange,
    },
    /// A default field arrived from settings.
    SetFirstField(SearchField),
    /// The row at `index` lost focus.
    Blur(usize),
}

/// An action that was refused; the state is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("at most 6 search conditions are allowed")]
    TooManyConditions,
    #[error("the first condition cannot be removed")]
    CannotRemoveFirst,
    #[error("no condition at position {0}")]
    NoSuchCondition(usize),
}

/// Submission failure: the failing rows and one aggregate message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SubmitError {
    pub rows: Vec<(usize, ConditionError)>,
    pub message: &'static str,
}

pub const MSG_ENTER_CONDITION: &str = "enter at least one search condition";
pub const MSG_FIX_CONDITIONS: &str = "fix the highlighted conditions";

impl SubmitError {
    fn from_rows(rows: Vec<(usize, ConditionError)>) -> Self {
        let message = if rows.iter().all(|(_, e)| *e == ConditionError::Blank) {
            MSG_ENTER_CONDITION
        } else {
            MSG_FIX_CONDITIONS
        };
        Self { rows, message }
    }
}

/// State of the advanced search form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionsState {
    rows: Vec<ConditionRow>,
}

impl Default for ConditionsState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionsState {
    pub fn new() -> Self {
        Self {
            rows: vec![ConditionRow::new(SearchCondition::initial())],
        }
    }

    /// Build a state from existing conditions (e.g. command-line input).
    ///
    /// Conditions past [`MAX_CONDITIONS`] are refused. An empty list yields
    /// the initial single-condition state.
    pub fn from_conditions(conditions: Vec<SearchCondition>) -> Result<Self, Rejection> {
        if conditions.len() > MAX_CONDITIONS {
            return Err(Rejection::TooManyConditions);
        }
        if conditions.is_empty() {
            return Ok(Self::new());
        }
        Ok(Self {
            rows: conditions.into_iter().map(ConditionRow::new).collect(),
        })
    }

    pub fn rows(&self) -> &[ConditionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = &SearchCondition> {
        self.rows.iter().map(|r| &r.condition)
    }

    /// Validate every row and serialize the query parameters.
    ///
    /// The first row must be valid. Later rows with blank text are dropped
    /// and emit nothing, including their logic; any other invalid row fails
    /// the whole submission.
    pub fn submit(&self, db_names: &[String]) -> Result<QueryParams, SubmitError> {
        let mut failures = Vec::new();
        let mut kept = Vec::new();

        for (index, row) in self.rows.iter().enumerate() {
            match validate_condition(&row.condition) {
                Ok(()) => kept.push((index, &row.condition)),
                Err(ConditionError::Blank) if index > 0 => {}
                Err(e) => failures.push((index, e)),
            }
        }

        if kept.is_empty() && failures.is_empty() {
            failures.push((0, ConditionError::Blank));
        }
        if !failures.is_empty() {
            return Err(SubmitError::from_rows(failures));
        }

        let mut params = QueryParams::new();
        for db in db_names {
            params.append(query::DB_NAMES, db.as_str());
        }
        for (position, (_, condition)) in kept.into_iter().enumerate() {
            if position > 0 {
                params.append(query::LOGICS, condition.logic.as_str());
            }
            params.append(query::FIELDS, condition.field.as_str());
            params.append(query::QUERIES, condition.query.trim());
            params.append(query::FUZZIES, if condition.fuzzy { "true" } else { "false" });
        }
        Ok(params)
    }

    /// Mark every row touched and record its validation error, as the form
    /// does when a submission fails.
    pub fn touch_all(&self) -> Self {
        let mut next = self.clone();
        for row in &mut next.rows {
            row.touched = true;
            row.revalidate();
        }
        next
    }
}

/// Apply `action` to `state`, returning the next state.
pub fn reduce(state: &ConditionsState, action: ConditionAction) -> Result<ConditionsState, Rejection> {
    let mut next = state.clone();
    match action {
        ConditionAction::Add => {
            if next.rows.len() >= MAX_CONDITIONS {
                return Err(Rejection::TooManyConditions);
            }
            next.rows.push(ConditionRow::new(SearchCondition::added()));
        }
        ConditionAction::Remove(index) => {
            if index == 0 {
                return Err(Rejection::CannotRemoveFirst);
            }
            if index >= next.rows.len() {
                return Err(Rejection::NoSuchCondition(index));
            }
            next.rows.remove(index);
        }
        ConditionAction::Update { index, change } => {
            if let Some(row) = next.rows.get_mut(index) {
                match change {
                    ConditionChange::Field(field) => row.condition.field = field,
                    ConditionChange::Query(query) => row.condition.query = query,
                    ConditionChange::Logic(logic) => row.condition.logic = logic,
                    ConditionChange::Fuzzy(fuzzy) => row.condition.fuzzy = fuzzy,
                }
                row.revalidate();
            }
        }
        ConditionAction::SetFirstField(field) => match next.rows.first_mut() {
            Some(row) => {
                row.condition.field = field;
                row.revalidate();
            }
            None => next.rows.push(ConditionRow::new(SearchCondition {
                field,
                ..SearchCondition::initial()
            })),
        },
        ConditionAction::Blur(index) => {
            if let Some(row) = next.rows.get_mut(index) {
                row.touched = true;
                row.revalidate();
            }
        }
    }
    Ok(next)
}

/// The single-condition basic search form.
///
/// Serializes with the same plural parameter names as the advanced form so
/// the backend sees one convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicSearch {
    pub field: SearchField,
    pub query: String,
    pub fuzzy: bool,
}

impl Default for BasicSearch {
    fn default() -> Self {
        Self {
            field: SearchField::Title,
            query: String::new(),
            fuzzy: true,
        }
    }
}

impl BasicSearch {
    pub fn submit(&self, db_names: &[String]) -> Result<QueryParams, SubmitError> {
        let condition = SearchCondition {
            field: self.field,
            query: self.query.clone(),
            logic: Logic::And,
            fuzzy: self.fuzzy,
        };
        let state = ConditionsState {
            rows: vec![ConditionRow::new(condition)],
        };
        state.submit(db_names)
    }
}
