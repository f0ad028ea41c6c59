//! Column assignments for set-based updates.

use super::criteria::check_kind;
use super::{EntityField, FieldValue, ValueKind};
use crate::error::ValidationError;
use rusqlite::types::Value;

/// One `SET` clause of a bulk update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment<F> {
    Set(F, FieldValue),
    Add(F, i64),
    Multiply(F, i64),
}

impl<F: EntityField> Assignment<F> {
    pub fn set(field: F, value: impl Into<FieldValue>) -> Self {
        Self::Set(field, value.into())
    }

    pub fn add(field: F, delta: i64) -> Self {
        Self::Add(field, delta)
    }

    pub fn multiply(field: F, factor: i64) -> Self {
        Self::Multiply(field, factor)
    }

    fn field(&self) -> F {
        match self {
            Self::Set(field, _) | Self::Add(field, _) | Self::Multiply(field, _) => *field,
        }
    }

    /// Renders `column = expr`, pushing its bind value.
    pub(crate) fn render(
        &self,
        sql: &mut String,
        bind_values: &mut Vec<Value>,
    ) -> Result<(), ValidationError> {
        let field = self.field();
        let column = field
            .update_column()
            .ok_or(ValidationError::NotUpdatable(field.name()))?;
        match self {
            Self::Set(_, value) => {
                if value.is_null() && !field.nullable() {
                    return Err(ValidationError::TypeMismatch {
                        field: field.name(),
                        expected: field.value_kind().as_str(),
                    });
                }
                check_kind(field, value)?;
                sql.push_str(&format!("{column} = ?"));
                bind_values.push(value.clone().into_sql());
            }
            Self::Add(_, delta) => {
                require_integer(field)?;
                sql.push_str(&format!("{column} = {column} + ?"));
                bind_values.push(Value::Integer(*delta));
            }
            Self::Multiply(_, factor) => {
                require_integer(field)?;
                sql.push_str(&format!("{column} = {column} * ?"));
                bind_values.push(Value::Integer(*factor));
            }
        }
        Ok(())
    }
}

fn require_integer<F: EntityField>(field: F) -> Result<(), ValidationError> {
    if field.value_kind() == ValueKind::Integer {
        Ok(())
    } else {
        Err(ValidationError::TypeMismatch {
            field: field.name(),
            expected: ValueKind::Integer.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Assignment;
    use crate::error::ValidationError;
    use crate::model::member::MemberField;

    fn render(assignment: Assignment<MemberField>) -> Result<String, ValidationError> {
        let mut sql = String::new();
        assignment.render(&mut sql, &mut Vec::new())?;
        Ok(sql)
    }

    #[test]
    fn arithmetic_assignments_reference_the_column() {
        assert_eq!(
            render(Assignment::multiply(MemberField::Age, 10)).unwrap(),
            "age = age * ?"
        );
        assert_eq!(
            render(Assignment::add(MemberField::Age, 1)).unwrap(),
            "age = age + ?"
        );
    }

    #[test]
    fn creation_and_key_columns_are_not_updatable() {
        for field in [
            MemberField::Id,
            MemberField::CreatedAt,
            MemberField::CreatedBy,
            MemberField::TeamName,
        ] {
            assert!(matches!(
                render(Assignment::set(field, 1)),
                Err(ValidationError::NotUpdatable(_))
            ));
        }
    }

    #[test]
    fn arithmetic_on_text_is_rejected() {
        assert!(matches!(
            render(Assignment::add(MemberField::Username, 1)),
            Err(ValidationError::TypeMismatch { field: "username", .. })
        ));
    }
}
