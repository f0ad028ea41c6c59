//! Hand-written SQL with positional parameters.
//!
//! # Invariants
//! - Only `?` and `?NNN` placeholders are accepted.
//! - Results are detached snapshots; nothing is added to the session cache.
//! - Pending writes are flushed before the statement runs.

use crate::error::{PersistenceResult, ValidationError};
use crate::model::member::{Member, MemberId};
use crate::model::team::Team;
use crate::model::Entity;
use crate::query::sql::Statement;
use crate::query::{FieldValue, Page, PageRequest};
use crate::session::Session;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;

/// A native statement and, for paging, its count statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeQuery {
    sql: String,
    count_sql: Option<String>,
}

impl NativeQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            count_sql: None,
        }
    }

    /// Count statement used for page totals; takes the same parameters.
    pub fn with_count(mut self, count_sql: impl Into<String>) -> Self {
        self.count_sql = Some(count_sql.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn count_sql(&self) -> Option<&str> {
        self.count_sql.as_deref()
    }
}

/// Maps a row of a native statement by column label.
pub trait FromNativeRow: Sized {
    fn from_native_row(row: &Row<'_>) -> PersistenceResult<Self>;
}

impl FromNativeRow for Member {
    fn from_native_row(row: &Row<'_>) -> PersistenceResult<Self> {
        Member::from_row(row)
    }
}

impl FromNativeRow for Team {
    fn from_native_row(row: &Row<'_>) -> PersistenceResult<Self> {
        Team::from_row(row)
    }
}

/// Row shape of the member/team native projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberProjection {
    pub id: MemberId,
    pub username: String,
    pub team_name: Option<String>,
}

impl FromNativeRow for MemberProjection {
    fn from_native_row(row: &Row<'_>) -> PersistenceResult<Self> {
        Ok(Self {
            id: row.get("member_id")?,
            username: row.get("username")?,
            team_name: row.get("team_name")?,
        })
    }
}

impl Session<'_> {
    pub fn native_query<T: FromNativeRow>(
        &mut self,
        query: &NativeQuery,
        params: &[FieldValue],
    ) -> PersistenceResult<Vec<T>> {
        self.flush()?;
        let sql = trim_statement(query.sql());
        self.check_parameters(sql, params.len())?;
        let statement = Statement {
            sql: sql.to_string(),
            bind_values: bind_values(params),
        };
        self.query_rows(&statement, |row| T::from_native_row(row))
    }

    /// Pages a native statement by wrapping it with `LIMIT`/`OFFSET`.
    ///
    /// The count statement is required and receives the same parameters.
    pub fn native_page<T: FromNativeRow>(
        &mut self,
        query: &NativeQuery,
        params: &[FieldValue],
        page: PageRequest,
    ) -> PersistenceResult<Page<T>> {
        let count_sql = query
            .count_sql()
            .map(trim_statement)
            .ok_or(ValidationError::MissingCountQuery)?;
        let slice = page.resolve(self.config())?;
        self.flush()?;

        let sql = trim_statement(query.sql());
        self.check_parameters(sql, params.len())?;
        self.check_parameters(count_sql, params.len())?;

        let total = self.query_count(&Statement {
            sql: count_sql.to_string(),
            bind_values: bind_values(params),
        })?;
        let mut content_values = bind_values(params);
        content_values.push(Value::Integer(i64::from(slice.size)));
        content_values.push(Value::Integer(
            i64::try_from(slice.offset()).unwrap_or(i64::MAX),
        ));
        let content = self.query_rows(
            &Statement {
                sql: format!("SELECT * FROM ({sql}) LIMIT ? OFFSET ?"),
                bind_values: content_values,
            },
            |row| T::from_native_row(row),
        )?;
        Ok(slice.into_page(content, total))
    }

    fn check_parameters(&self, sql: &str, supplied: usize) -> PersistenceResult<()> {
        let statement = self.prepare_native(sql)?;
        let expected = statement.parameter_count();
        for index in 1..=expected {
            if let Some(name) = statement.parameter_name(index) {
                if !name.starts_with('?') {
                    return Err(ValidationError::NamedParameter(name.to_string()).into());
                }
            }
        }
        if expected != supplied {
            return Err(ValidationError::ParameterCount {
                expected,
                actual: supplied,
            }
            .into());
        }
        Ok(())
    }
}

fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

fn bind_values(params: &[FieldValue]) -> Vec<Value> {
    params.iter().cloned().map(FieldValue::into_sql).collect()
}
