//! SQL rendering shared by entity, projection and bulk statements.

use super::{Assignment, Criteria, EntityField, JoinKind, Sort, Window};
use crate::error::ValidationError;
use crate::model::Entity;
use rusqlite::types::Value;

/// Rendered SQL with its positional bind values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub sql: String,
    pub bind_values: Vec<Value>,
}

impl Statement {
    fn new(sql: String) -> Self {
        Self {
            sql,
            bind_values: Vec::new(),
        }
    }
}

/// The table a statement reads, aliased `e`, and how the team table joins it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Source {
    table: &'static str,
    id_column: &'static str,
    team_join: Option<&'static str>,
    join: Option<JoinKind>,
}

impl Source {
    pub fn of<E: Entity>() -> Self {
        Self {
            table: E::KIND.table(),
            id_column: E::KIND.id_column(),
            team_join: E::TEAM_JOIN,
            join: None,
        }
    }

    /// Forces the team join regardless of the fields a query touches.
    pub fn joined(mut self, join: Option<JoinKind>) -> Self {
        self.join = join;
        self
    }

    fn qualified_id(&self) -> String {
        format!("e.{}", self.id_column)
    }

    fn push_from(&self, sql: &mut String, needs_team_join: bool) {
        sql.push_str(" FROM ");
        sql.push_str(self.table);
        sql.push_str(" e");
        let join = self
            .join
            .or_else(|| needs_team_join.then_some(JoinKind::Left));
        if let (Some(join), Some(target)) = (join, self.team_join) {
            sql.push(' ');
            sql.push_str(join.keyword());
            sql.push(' ');
            sql.push_str(target);
        }
    }
}

pub(crate) fn select<F: EntityField>(
    source: &Source,
    select_list: &str,
    criteria: &Criteria<F>,
    sort: &Sort<F>,
    window: Window,
) -> Result<Statement, ValidationError> {
    let mut statement = Statement::new(format!("SELECT {select_list}"));
    source.push_from(
        &mut statement.sql,
        criteria.needs_team_join() || sort.needs_team_join(),
    );
    criteria.render(&mut statement.sql, &mut statement.bind_values)?;
    sort.render(&mut statement.sql, &source.qualified_id());
    push_window(&mut statement, window);
    Ok(statement)
}

pub(crate) fn count<F: EntityField>(
    source: &Source,
    criteria: &Criteria<F>,
) -> Result<Statement, ValidationError> {
    let mut statement = Statement::new(String::from("SELECT COUNT(*)"));
    source.push_from(&mut statement.sql, criteria.needs_team_join());
    criteria.render(&mut statement.sql, &mut statement.bind_values)?;
    Ok(statement)
}

/// Ids matching `criteria` in primary key order, used to lock rows up front.
pub(crate) fn ids<F: EntityField>(
    source: &Source,
    criteria: &Criteria<F>,
) -> Result<Statement, ValidationError> {
    let id_column = source.qualified_id();
    let mut statement = Statement::new(format!("SELECT {id_column}"));
    source.push_from(&mut statement.sql, criteria.needs_team_join());
    criteria.render(&mut statement.sql, &mut statement.bind_values)?;
    statement.sql.push_str(&format!(" ORDER BY {id_column} ASC"));
    Ok(statement)
}

/// Set-based update returning the ids of the changed rows.
pub(crate) fn bulk_update<F: EntityField>(
    source: &Source,
    criteria: &Criteria<F>,
    assignments: &[Assignment<F>],
) -> Result<Statement, ValidationError> {
    let mut statement = Statement::new(format!("UPDATE {} SET ", source.table));
    for (index, assignment) in assignments.iter().enumerate() {
        if index > 0 {
            statement.sql.push_str(", ");
        }
        assignment.render(&mut statement.sql, &mut statement.bind_values)?;
    }
    statement.sql.push_str(&format!(
        " WHERE {} IN (SELECT {}",
        source.id_column,
        source.qualified_id()
    ));
    source.push_from(&mut statement.sql, criteria.needs_team_join());
    criteria.render(&mut statement.sql, &mut statement.bind_values)?;
    statement
        .sql
        .push_str(&format!(") RETURNING {}", source.id_column));
    Ok(statement)
}

fn push_window(statement: &mut Statement, window: Window) {
    match window {
        Window::All => {}
        Window::Top(n) => {
            statement.sql.push_str(" LIMIT ?");
            statement.bind_values.push(Value::Integer(i64::from(n)));
        }
        Window::Range { offset, limit } => {
            match limit {
                Some(limit) => {
                    statement.sql.push_str(" LIMIT ? OFFSET ?");
                    statement.bind_values.push(Value::Integer(i64::from(limit)));
                }
                // SQLite requires LIMIT before OFFSET; -1 means unbounded.
                None => statement.sql.push_str(" LIMIT -1 OFFSET ?"),
            }
            statement
                .bind_values
                .push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));
        }
    }
}
