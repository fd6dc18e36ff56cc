//! Table and column name quoting.
//!
//! The CRUD helpers on [`DbConn`](crate::DbConn) never splice a caller-provided
//! table or column name into SQL verbatim. Every name goes through [`Ident`],
//! which accepts:
//!
//! - bare parts matching `[A-Za-z_][A-Za-z0-9_$]*`
//! - `"quoted"` parts containing anything but NUL (`""` escapes a quote)
//! - any `.`-separated mix of the two (`public.users`, `app."Order"`)
//!
//! and renders each part double-quoted. Unquoted parts are folded to lower
//! case first, the way the server folds them, so `Users.UserName` and
//! `users.username` name the same column.
//!
//! ```ignore
//! assert_eq!(pgconn::quote_ident("public.users")?, r#""public"."users""#);
//! ```

use crate::error::{ConnError, ConnResult};

/// A parsed, dotted SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// Parse a table or column reference.
    pub fn parse(s: &str) -> ConnResult<Self> {
        if s.is_empty() {
            return Err(ConnError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(ConnError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        loop {
            let part = if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            name.push('"');
                        }
                        Some('"') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(ConnError::validation(format!(
                                "Unclosed quoted identifier in '{s}'"
                            )));
                        }
                    }
                }
                name
            } else {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' {
                        break;
                    }
                    let ok = if name.is_empty() {
                        c == '_' || c.is_ascii_alphabetic()
                    } else {
                        c == '_' || c == '$' || c.is_ascii_alphanumeric()
                    };
                    if !ok {
                        return Err(ConnError::validation(format!(
                            "Invalid character '{c}' in identifier '{s}'"
                        )));
                    }
                    name.push(c.to_ascii_lowercase());
                    chars.next();
                }
                name
            };

            if part.is_empty() {
                return Err(ConnError::validation(format!(
                    "Empty identifier segment in '{s}'"
                )));
            }
            parts.push(part);

            match chars.next() {
                None => break,
                Some('.') if chars.peek().is_some() => continue,
                Some('.') => {
                    return Err(ConnError::validation(format!(
                        "Trailing '.' in identifier '{s}'"
                    )));
                }
                Some(c) => {
                    return Err(ConnError::validation(format!(
                        "Expected '.' between identifier parts in '{s}', got '{c}'"
                    )));
                }
            }
        }

        Ok(Self { parts })
    }

    /// The name parts as the server sees them (unquoted parts case-folded),
    /// outermost first.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The last part (the table or column name itself).
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// The qualifying part before the name, if any (usually a schema).
    pub fn qualifier(&self) -> Option<&str> {
        match self.parts.len() {
            0 | 1 => None,
            n => Some(self.parts[n - 2].as_str()),
        }
    }

    /// Render with every part double-quoted.
    pub fn to_quoted_sql(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push('"');
            out.push_str(&part.replace('"', "\"\""));
            out.push('"');
        }
        out
    }
}

/// Parse and quote a table or column reference in one step.
pub fn quote_ident(s: &str) -> ConnResult<String> {
    Ident::parse(s).map(|i| i.to_quoted_sql())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_bare_name() {
        assert_eq!(quote_ident("users").unwrap(), r#""users""#);
    }

    #[test]
    fn quotes_each_dotted_part() {
        assert_eq!(quote_ident("public.users").unwrap(), r#""public"."users""#);
    }

    #[test]
    fn keeps_quoted_case_and_escapes() {
        assert_eq!(quote_ident(r#""CamelCase""#).unwrap(), r#""CamelCase""#);
        assert_eq!(quote_ident(r#""has""quote""#).unwrap(), r#""has""quote""#);
        assert_eq!(
            quote_ident(r#"app."Order".id"#).unwrap(),
            r#""app"."Order"."id""#
        );
    }

    #[test]
    fn folds_unquoted_parts_to_lower_case() {
        assert_eq!(quote_ident("Users.UserName").unwrap(), r#""users"."username""#);
        assert_eq!(quote_ident(r#"Sales."Order""#).unwrap(), r#""sales"."Order""#);
        let ident = Ident::parse("Audit.Events").unwrap();
        assert_eq!(ident.qualifier(), Some("audit"));
        assert_eq!(ident.name(), "events");
    }

    #[test]
    fn name_and_qualifier() {
        let ident = Ident::parse("sales.orders").unwrap();
        assert_eq!(ident.name(), "orders");
        assert_eq!(ident.qualifier(), Some("sales"));
        assert_eq!(Ident::parse("orders").unwrap().qualifier(), None);
    }

    #[test]
    fn dollar_allowed_after_first_char() {
        assert_eq!(quote_ident("col$1").unwrap(), r#""col$1""#);
        assert!(quote_ident("$col").is_err());
    }

    #[test]
    fn rejects_injection_and_malformed_input() {
        assert!(quote_ident("").is_err());
        assert!(quote_ident("users; DROP TABLE users").is_err());
        assert!(quote_ident("1users").is_err());
        assert!(quote_ident("a..b").is_err());
        assert!(quote_ident("a.").is_err());
        assert!(quote_ident(r#""open"#).is_err());
        assert!(quote_ident(r#""""#).is_err());
        assert!(quote_ident(r#""a"b"#).is_err());
    }
}
