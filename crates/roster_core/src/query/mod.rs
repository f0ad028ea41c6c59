//! Declarative queries: criteria, sorting, windows, pages and bulk updates.
//!
//! # Responsibility
//! - Describe filters, ordering, windows and bulk assignments as values.
//! - Render them into parameterised SQL over the entity alias `e`.
//!
//! # Invariants
//! - Filters combine with AND only.
//! - Every ordering ends with the primary key ascending, so results are
//!   deterministic and pages partition the full result.
//! - User values are always bound, never interpolated.

mod criteria;
mod executor;
mod page;
mod sort;
pub(crate) mod sql;
mod update;

pub use criteria::Criteria;
pub use page::{Page, PageRequest};
pub use sort::{Direction, Order, Sort};
pub use update::Assignment;

use rusqlite::types::Value;
use std::fmt::Debug;

/// Storage class of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Text,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Text => "text",
        }
    }
}

/// A value compared against or assigned to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
}

impl FieldValue {
    /// `None` for `Null`, which fits any nullable field.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(ValueKind::Integer),
            Self::Text(_) => Some(ValueKind::Text),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub(crate) fn into_sql(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(value) => Value::Integer(value),
            Self::Text(value) => Value::Text(value),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A queryable attribute of an entity.
pub trait EntityField: Copy + Debug + Send + Sync + 'static {
    fn name(self) -> &'static str;

    /// Column qualified with the query alias (`e.` or `t.`).
    fn column(self) -> &'static str;

    fn value_kind(self) -> ValueKind;

    fn nullable(self) -> bool;

    /// Whether referencing this field requires the team join.
    fn needs_team_join(self) -> bool;

    /// Unqualified column for set-based updates, `None` when not updatable.
    fn update_column(self) -> Option<&'static str>;
}

/// How the team table is joined into a member query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Rows without a team are kept.
    Left,
    /// Rows without a team are dropped.
    Inner,
}

impl JoinKind {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Self::Left => "LEFT JOIN",
            Self::Inner => "INNER JOIN",
        }
    }
}

/// Row window applied after ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Window {
    #[default]
    All,
    Top(u32),
    Range { offset: u64, limit: Option<u32> },
}

/// Filter, ordering and window for one read.
#[derive(Debug, Clone)]
pub struct Query<F> {
    criteria: Criteria<F>,
    sort: Sort<F>,
    window: Window,
    read_only: bool,
}

impl<F: EntityField> Query<F> {
    /// Matches every row in primary key order.
    pub fn new() -> Self {
        Self {
            criteria: Criteria::new(),
            sort: Sort::unsorted(),
            window: Window::All,
            read_only: false,
        }
    }

    pub fn filter(criteria: Criteria<F>) -> Self {
        Self::new().with_criteria(criteria)
    }

    pub fn with_criteria(mut self, criteria: Criteria<F>) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn sorted(mut self, sort: Sort<F>) -> Self {
        self.sort = sort;
        self
    }

    /// Keeps only the first `n` rows.
    pub fn top(mut self, n: u32) -> Self {
        self.window = Window::Top(n);
        self
    }

    /// Skips `offset` rows, then keeps at most `limit` rows.
    pub fn window(mut self, offset: u64, limit: Option<u32>) -> Self {
        self.window = Window::Range { offset, limit };
        self
    }

    /// Returns detached snapshots that are not added to the session cache.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn criteria(&self) -> &Criteria<F> {
        &self.criteria
    }

    pub fn sort(&self) -> &Sort<F> {
        &self.sort
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) fn row_window(&self) -> Window {
        self.window
    }
}

impl<F: EntityField> Default for Query<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: EntityField> From<Criteria<F>> for Query<F> {
    fn from(criteria: Criteria<F>) -> Self {
        Self::filter(criteria)
    }
}
