//! Error types for pgconn

use thiserror::Error;

/// Result type alias for pgconn operations
pub type ConnResult<T> = Result<T, ConnError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum ConnError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Invalid input detected before anything reaches the server
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl ConnError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Parse a tokio_postgres error into a more specific ConnError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }

    /// Whether a failed prepared-statement execution is worth re-preparing once.
    ///
    /// Covers statements invalidated by a schema change and statements the server
    /// no longer knows about.
    pub(crate) fn is_retryable_prepared(&self) -> bool {
        let Self::Query(e) = self else {
            return false;
        };
        let Some(db_err) = e.as_db_error() else {
            return false;
        };

        match db_err.code().code() {
            "0A000" => db_err
                .message()
                .to_ascii_lowercase()
                .contains("cached plan must not change result type"),
            // invalid_sql_statement_name
            "26000" => true,
            _ => false,
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for ConnError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<toml::de::Error> for ConnError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_prefix() {
        assert_eq!(
            ConnError::validation("empty SET").to_string(),
            "Validation error: empty SET"
        );
        assert_eq!(
            ConnError::decode("id", "bad type").to_string(),
            "Decode error on column 'id': bad type"
        );
    }

    #[test]
    fn predicates_match_variants() {
        assert!(ConnError::not_found("x").is_not_found());
        assert!(ConnError::validation("x").is_validation());
        assert!(!ConnError::config("x").is_unique_violation());
        assert!(!ConnError::Other("x".into()).is_retryable_prepared());
    }

    #[test]
    fn toml_errors_become_config_errors() {
        let err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        assert!(matches!(ConnError::from(err), ConnError::Config(_)));
    }
}
