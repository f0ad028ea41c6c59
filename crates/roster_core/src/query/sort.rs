//! Result ordering.

use super::EntityField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Accepts `asc` / `desc` in any case.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order<F> {
    pub field: F,
    pub direction: Direction,
}

/// Ordered list of sort keys.
///
/// Rendering always appends the primary key ascending as the final key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort<F> {
    orders: Vec<Order<F>>,
}

impl<F: EntityField> Sort<F> {
    /// Primary key order only.
    pub fn unsorted() -> Self {
        Self { orders: Vec::new() }
    }

    pub fn by(field: F, direction: Direction) -> Self {
        Self::unsorted().then(field, direction)
    }

    pub fn asc(field: F) -> Self {
        Self::by(field, Direction::Asc)
    }

    pub fn desc(field: F) -> Self {
        Self::by(field, Direction::Desc)
    }

    pub fn then(mut self, field: F, direction: Direction) -> Self {
        self.orders.push(Order { field, direction });
        self
    }

    pub fn orders(&self) -> &[Order<F>] {
        &self.orders
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }

    pub(crate) fn needs_team_join(&self) -> bool {
        self.orders.iter().any(|order| order.field.needs_team_join())
    }

    /// Appends ` ORDER BY ...` ending with `id_column ASC`.
    pub(crate) fn render(&self, sql: &mut String, id_column: &str) {
        sql.push_str(" ORDER BY ");
        for order in &self.orders {
            sql.push_str(order.field.column());
            sql.push(' ');
            sql.push_str(order.direction.keyword());
            sql.push_str(", ");
        }
        sql.push_str(id_column);
        sql.push_str(" ASC");
    }
}

impl<F: EntityField> Default for Sort<F> {
    fn default() -> Self {
        Self::unsorted()
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, Sort};
    use crate::model::member::MemberField;

    #[test]
    fn primary_key_breaks_ties() {
        let mut sql = String::new();
        Sort::desc(MemberField::Username)
            .then(MemberField::Age, Direction::Asc)
            .render(&mut sql, "e.member_id");
        assert_eq!(
            sql,
            " ORDER BY e.username DESC, e.age ASC, e.member_id ASC"
        );
    }

    #[test]
    fn unsorted_orders_by_primary_key() {
        let mut sql = String::new();
        Sort::<MemberField>::unsorted().render(&mut sql, "e.member_id");
        assert_eq!(sql, " ORDER BY e.member_id ASC");
    }

    #[test]
    fn direction_parse_ignores_case() {
        assert_eq!(Direction::parse("DESC"), Some(Direction::Desc));
        assert_eq!(Direction::parse("asc"), Some(Direction::Asc));
        assert_eq!(Direction::parse("up"), None);
    }
}
