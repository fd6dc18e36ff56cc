//! WHERE clause assembly for the CRUD helpers.

/// How multiple conditions are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operand {
    #[default]
    And,
    Or,
}

impl Operand {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operand::And => "AND",
            Operand::Or => "OR",
        }
    }
}

/// Zero, one, or several raw condition fragments.
///
/// A single fragment is used as written. Several fragments are each wrapped in
/// parentheses before being joined, so `a = ? OR b = ?` stays one condition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Where {
    #[default]
    None,
    Single(String),
    List(Vec<String>),
}

impl Where {
    pub fn is_empty(&self) -> bool {
        match self {
            Where::None => true,
            Where::Single(s) => s.trim().is_empty(),
            Where::List(items) => items.iter().all(|s| s.trim().is_empty()),
        }
    }

    /// Render as `" WHERE ..."` (leading space) or `""` when empty.
    pub fn to_sql(&self, operand: Operand) -> String {
        match self {
            _ if self.is_empty() => String::new(),
            Where::Single(s) => format!(" WHERE {s}"),
            Where::List(items) => {
                let joiner = format!(" {} ", operand.as_sql());
                let body = items
                    .iter()
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| format!("({s})"))
                    .collect::<Vec<_>>()
                    .join(&joiner);
                format!(" WHERE {body}")
            }
            Where::None => String::new(),
        }
    }
}

/// Anything usable as the `where` argument of the CRUD helpers.
pub trait IntoWhere {
    fn into_where(self) -> Where;
}

impl IntoWhere for Where {
    fn into_where(self) -> Where {
        self
    }
}

impl IntoWhere for () {
    fn into_where(self) -> Where {
        Where::None
    }
}

impl IntoWhere for &str {
    fn into_where(self) -> Where {
        Where::Single(self.to_string())
    }
}

impl IntoWhere for String {
    fn into_where(self) -> Where {
        Where::Single(self)
    }
}

impl IntoWhere for &String {
    fn into_where(self) -> Where {
        Where::Single(self.clone())
    }
}

impl<W: IntoWhere> IntoWhere for Option<W> {
    fn into_where(self) -> Where {
        self.map_or(Where::None, IntoWhere::into_where)
    }
}

impl<S: AsRef<str>> IntoWhere for Vec<S> {
    fn into_where(self) -> Where {
        Where::List(self.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

impl<S: AsRef<str>> IntoWhere for &[S] {
    fn into_where(self) -> Where {
        Where::List(self.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

impl<S: AsRef<str>, const N: usize> IntoWhere for [S; N] {
    fn into_where(self) -> Where {
        Where::List(self.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

/// Build a `" WHERE ..."` suffix from one or many conditions.
pub fn build_where(conditions: impl IntoWhere, operand: Operand) -> String {
    conditions.into_where().to_sql(operand)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_renders_nothing() {
        assert_eq!(build_where((), Operand::And), "");
        assert_eq!(build_where("", Operand::And), "");
        assert_eq!(build_where(None::<&str>, Operand::And), "");
        assert_eq!(build_where(Vec::<String>::new(), Operand::And), "");
    }

    #[test]
    fn single_string_is_verbatim() {
        assert_eq!(build_where("id = ?", Operand::And), " WHERE id = ?");
        assert_eq!(
            build_where("a = ? OR b = ?".to_string(), Operand::And),
            " WHERE a = ? OR b = ?"
        );
    }

    #[test]
    fn list_items_are_parenthesised() {
        assert_eq!(
            build_where(["a = ?", "b = ? OR c = ?"], Operand::And),
            " WHERE (a = ?) AND (b = ? OR c = ?)"
        );
        assert_eq!(
            build_where(vec!["a = 1", "b = 2"], Operand::Or),
            " WHERE (a = 1) OR (b = 2)"
        );
    }

    #[test]
    fn blank_list_items_are_dropped() {
        assert_eq!(build_where(["", "x = ?", "  "], Operand::And), " WHERE (x = ?)");
    }
}
