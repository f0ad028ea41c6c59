//! Conjunctive filters.

use super::{EntityField, FieldValue, ValueKind};
use crate::error::ValidationError;
use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate<F> {
    Compare {
        field: F,
        op: CompareOp,
        value: FieldValue,
    },
    Between {
        field: F,
        low: FieldValue,
        high: FieldValue,
    },
    In {
        field: F,
        values: Vec<FieldValue>,
    },
    Like {
        field: F,
        pattern: String,
    },
}

impl<F: EntityField> Predicate<F> {
    fn field(&self) -> F {
        match self {
            Self::Compare { field, .. }
            | Self::Between { field, .. }
            | Self::In { field, .. }
            | Self::Like { field, .. } => *field,
        }
    }
}

/// AND-combined predicates over the fields of one entity.
///
/// An empty criteria matches every row.
#[derive(Debug, Clone)]
pub struct Criteria<F> {
    predicates: Vec<Predicate<F>>,
}

impl<F: EntityField> Criteria<F> {
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Equality; comparing with `FieldValue::Null` means `IS NULL`.
    pub fn eq(self, field: F, value: impl Into<FieldValue>) -> Self {
        self.compare(field, CompareOp::Eq, value.into())
    }

    pub fn gt(self, field: F, value: impl Into<FieldValue>) -> Self {
        self.compare(field, CompareOp::Gt, value.into())
    }

    pub fn ge(self, field: F, value: impl Into<FieldValue>) -> Self {
        self.compare(field, CompareOp::Ge, value.into())
    }

    pub fn lt(self, field: F, value: impl Into<FieldValue>) -> Self {
        self.compare(field, CompareOp::Lt, value.into())
    }

    pub fn le(self, field: F, value: impl Into<FieldValue>) -> Self {
        self.compare(field, CompareOp::Le, value.into())
    }

    /// Inclusive range.
    pub fn between(
        mut self,
        field: F,
        low: impl Into<FieldValue>,
        high: impl Into<FieldValue>,
    ) -> Self {
        self.predicates.push(Predicate::Between {
            field,
            low: low.into(),
            high: high.into(),
        });
        self
    }

    /// Set membership. An empty set matches nothing.
    pub fn is_in<V, I>(mut self, field: F, values: I) -> Self
    where
        V: Into<FieldValue>,
        I: IntoIterator<Item = V>,
    {
        self.predicates.push(Predicate::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Case-sensitive pattern where `%` matches any run and `_` one character.
    pub fn like(mut self, field: F, pattern: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Like {
            field,
            pattern: pattern.into(),
        });
        self
    }

    /// Case-sensitive substring match.
    pub fn contains(self, field: F, fragment: &str) -> Self {
        self.like(field, format!("%{fragment}%"))
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub(crate) fn needs_team_join(&self) -> bool {
        self.predicates
            .iter()
            .any(|predicate| predicate.field().needs_team_join())
    }

    fn compare(mut self, field: F, op: CompareOp, value: FieldValue) -> Self {
        self.predicates.push(Predicate::Compare { field, op, value });
        self
    }

    /// Appends ` WHERE ...` (or nothing) to `sql`, pushing bind values.
    pub(crate) fn render(
        &self,
        sql: &mut String,
        bind_values: &mut Vec<Value>,
    ) -> Result<(), ValidationError> {
        for (index, predicate) in self.predicates.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            render_predicate(predicate, sql, bind_values)?;
        }
        Ok(())
    }
}

impl<F: EntityField> Default for Criteria<F> {
    fn default() -> Self {
        Self::new()
    }
}

fn render_predicate<F: EntityField>(
    predicate: &Predicate<F>,
    sql: &mut String,
    bind_values: &mut Vec<Value>,
) -> Result<(), ValidationError> {
    match predicate {
        Predicate::Compare { field, op, value } => {
            if value.is_null() {
                if *op != CompareOp::Eq {
                    return Err(ValidationError::NullComparison(field.name()));
                }
                sql.push_str(field.column());
                sql.push_str(" IS NULL");
                return Ok(());
            }
            check_kind(*field, value)?;
            sql.push_str(&format!("{} {} ?", field.column(), op.symbol()));
            bind_values.push(value.clone().into_sql());
        }
        Predicate::Between { field, low, high } => {
            for bound in [low, high] {
                if bound.is_null() {
                    return Err(ValidationError::NullComparison(field.name()));
                }
                check_kind(*field, bound)?;
            }
            sql.push_str(&format!("{} BETWEEN ? AND ?", field.column()));
            bind_values.push(low.clone().into_sql());
            bind_values.push(high.clone().into_sql());
        }
        Predicate::In { field, values } => {
            if values.is_empty() {
                sql.push_str("1 = 0");
                return Ok(());
            }
            for value in values {
                if value.is_null() {
                    return Err(ValidationError::NullComparison(field.name()));
                }
                check_kind(*field, value)?;
            }
            let placeholders = vec!["?"; values.len()].join(", ");
            sql.push_str(&format!("{} IN ({placeholders})", field.column()));
            bind_values.extend(values.iter().cloned().map(FieldValue::into_sql));
        }
        Predicate::Like { field, pattern } => {
            if field.value_kind() != ValueKind::Text {
                return Err(ValidationError::TypeMismatch {
                    field: field.name(),
                    expected: ValueKind::Text.as_str(),
                });
            }
            // GLOB is case-sensitive where LIKE is not.
            sql.push_str(&format!("{} GLOB ?", field.column()));
            bind_values.push(Value::Text(like_to_glob(pattern)));
        }
    }
    Ok(())
}

pub(crate) fn check_kind<F: EntityField>(
    field: F,
    value: &FieldValue,
) -> Result<(), ValidationError> {
    match value.kind() {
        Some(kind) if kind != field.value_kind() => Err(ValidationError::TypeMismatch {
            field: field.name(),
            expected: field.value_kind().as_str(),
        }),
        _ => Ok(()),
    }
}

/// Translates `%`/`_` wildcards into a GLOB pattern, escaping GLOB syntax.
fn like_to_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        match ch {
            '%' => glob.push('*'),
            '_' => glob.push('?'),
            '*' => glob.push_str("[*]"),
            '?' => glob.push_str("[?]"),
            '[' => glob.push_str("[[]"),
            other => glob.push(other),
        }
    }
    glob
}

#[cfg(test)]
mod tests {
    use super::{like_to_glob, Criteria};
    use crate::error::ValidationError;
    use crate::model::member::MemberField;
    use crate::query::FieldValue;
    use rusqlite::types::Value;

    fn render(criteria: &Criteria<MemberField>) -> Result<(String, Vec<Value>), ValidationError> {
        let mut sql = String::new();
        let mut bind_values = Vec::new();
        criteria.render(&mut sql, &mut bind_values)?;
        Ok((sql, bind_values))
    }

    #[test]
    fn like_wildcards_translate_to_glob() {
        assert_eq!(like_to_glob("%Anakin_"), "*Anakin?");
        assert_eq!(like_to_glob("a*b?c[d"), "a[*]b[?]c[[]d");
    }

    #[test]
    fn predicates_are_anded_with_bound_values() {
        let criteria = Criteria::new()
            .eq(MemberField::Username, "AAA")
            .gt(MemberField::Age, 15);
        let (sql, bind_values) = render(&criteria).unwrap();

        assert_eq!(sql, " WHERE e.username = ? AND e.age > ?");
        assert_eq!(
            bind_values,
            vec![Value::Text("AAA".to_string()), Value::Integer(15)]
        );
    }

    #[test]
    fn null_equality_renders_is_null() {
        let criteria = Criteria::new().eq(MemberField::TeamId, FieldValue::Null);
        let (sql, bind_values) = render(&criteria).unwrap();

        assert_eq!(sql, " WHERE e.team_id IS NULL");
        assert!(bind_values.is_empty());
    }

    #[test]
    fn empty_in_set_matches_nothing() {
        let criteria = Criteria::new().is_in(MemberField::Username, Vec::<String>::new());
        let (sql, _) = render(&criteria).unwrap();
        assert_eq!(sql, " WHERE 1 = 0");
    }

    #[test]
    fn ordering_against_null_is_rejected() {
        let criteria = Criteria::new().gt(MemberField::Age, FieldValue::Null);
        assert_eq!(
            render(&criteria).unwrap_err(),
            ValidationError::NullComparison("age")
        );
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let criteria = Criteria::new().eq(MemberField::Age, "ten");
        assert_eq!(
            render(&criteria).unwrap_err(),
            ValidationError::TypeMismatch {
                field: "age",
                expected: "integer",
            }
        );

        let criteria = Criteria::new().like(MemberField::Age, "1%");
        assert!(matches!(
            render(&criteria),
            Err(ValidationError::TypeMismatch { field: "age", .. })
        ));
    }

    #[test]
    fn team_name_filter_needs_join() {
        assert!(Criteria::new()
            .eq(MemberField::TeamName, "teamA")
            .needs_team_join());
        assert!(!Criteria::new().eq(MemberField::Age, 10).needs_team_join());
    }
}
