//! Connection configuration.
//!
//! A [`DbConfig`] is the DSN plus optional credential overrides and a few
//! behaviour switches. It can be built in code, read from TOML, or taken from
//! the environment (`DATABASE_URL`, `DATABASE_USER`, `DATABASE_PASSWORD`, with a
//! `.env` file honoured via `dotenvy`).
//!
//! ```toml
//! dsn = "postgres://localhost/app"
//! username = "app"
//!
//! [options]
//! check_columns = true
//! statement_cache_capacity = 128
//! ```

use crate::error::{ConnError, ConnResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Behaviour switches applied to every connection built from a [`DbConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnOptions {
    /// Filter data rows down to the table's real columns before INSERT/UPDATE.
    pub check_columns: bool,
    /// Maximum number of keyed prepared statements kept per connection.
    pub statement_cache_capacity: usize,
    /// `application_name` reported to the server.
    pub application_name: Option<String>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Maximum pool size when a pool is built from this config.
    pub pool_max_size: usize,
}

impl Default for ConnOptions {
    fn default() -> Self {
        Self {
            check_columns: false,
            statement_cache_capacity: 64,
            application_name: None,
            connect_timeout_secs: None,
            pool_max_size: 16,
        }
    }
}

impl ConnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_columns(mut self, enabled: bool) -> Self {
        self.check_columns = enabled;
        self
    }

    /// Set the keyed statement cache capacity. `0` disables caching.
    pub fn statement_cache(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn pool_max_size(mut self, size: usize) -> Self {
        self.pool_max_size = size;
        self
    }
}

/// Where and how to connect.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// libpq-style connection string or `postgres://` URL.
    pub dsn: String,
    /// Overrides the user in `dsn` when set.
    pub username: Option<String>,
    /// Overrides the password in `dsn` when set.
    pub password: Option<String>,
    pub options: ConnOptions,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("dsn", &self.dsn)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("options", &self.options)
            .finish()
    }
}

impl DbConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn options(mut self, options: ConnOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse a single configuration from TOML.
    pub fn from_toml_str(raw: &str) -> ConnResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Read a single configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> ConnResult<Self> {
        Self::from_toml_str(&read_file(path.as_ref())?)
    }

    /// Parse several named configurations from TOML, one table per instance name.
    ///
    /// ```toml
    /// [default]
    /// dsn = "postgres://localhost/app"
    ///
    /// [reporting]
    /// dsn = "postgres://replica/app"
    /// ```
    pub fn instances_from_toml_str(raw: &str) -> ConnResult<BTreeMap<String, Self>> {
        Ok(toml::from_str(raw)?)
    }

    /// Read several named configurations from a TOML file.
    pub fn instances_from_file(path: impl AsRef<Path>) -> ConnResult<BTreeMap<String, Self>> {
        Self::instances_from_toml_str(&read_file(path.as_ref())?)
    }

    /// Build from `DATABASE_URL` (required), `DATABASE_USER` and `DATABASE_PASSWORD`.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> ConnResult<Self> {
        let _ = dotenvy::dotenv();
        let dsn = std::env::var("DATABASE_URL")
            .map_err(|_| ConnError::config("DATABASE_URL is not set"))?;
        Ok(Self {
            dsn,
            username: std::env::var("DATABASE_USER").ok(),
            password: std::env::var("DATABASE_PASSWORD").ok(),
            options: ConnOptions::default(),
        })
    }

    /// Resolve into a driver config, applying credential and option overrides.
    pub fn to_pg_config(&self) -> ConnResult<tokio_postgres::Config> {
        if self.dsn.trim().is_empty() {
            return Err(ConnError::config("dsn is empty"));
        }
        let mut cfg: tokio_postgres::Config = self
            .dsn
            .parse()
            .map_err(|e: tokio_postgres::Error| ConnError::config(format!("invalid dsn: {e}")))?;

        if let Some(user) = &self.username {
            cfg.user(user);
        }
        if let Some(password) = &self.password {
            cfg.password(password);
        }
        if let Some(name) = &self.options.application_name {
            cfg.application_name(name);
        }
        if let Some(secs) = self.options.connect_timeout_secs {
            cfg.connect_timeout(Duration::from_secs(secs));
        }
        Ok(cfg)
    }
}

fn read_file(path: &Path) -> ConnResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| ConnError::config(format!("failed to read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = DbConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.dsn, "");
        assert_eq!(cfg.username, None);
        assert_eq!(cfg.password, None);
        assert_eq!(cfg.options, ConnOptions::default());
    }

    #[test]
    fn parses_options_table() {
        let cfg = DbConfig::from_toml_str(
            r#"
dsn = "postgres://localhost/app"
username = "svc"

[options]
check_columns = true
statement_cache_capacity = 8
"#,
        )
        .unwrap();
        assert_eq!(cfg.username.as_deref(), Some("svc"));
        assert!(cfg.options.check_columns);
        assert_eq!(cfg.options.statement_cache_capacity, 8);
        assert_eq!(cfg.options.pool_max_size, 16);
    }

    #[test]
    fn parses_named_instances() {
        let map = DbConfig::instances_from_toml_str(
            r#"
[default]
dsn = "postgres://a/app"

[reporting]
dsn = "postgres://b/app"
password = "pw"
"#,
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["reporting"].password.as_deref(), Some("pw"));
    }

    #[test]
    fn credentials_override_dsn() {
        let pg = DbConfig::new("postgres://someone@localhost:5433/app")
            .username("other")
            .password("secret")
            .options(ConnOptions::new().application_name("pgconn-test"))
            .to_pg_config()
            .unwrap();
        assert_eq!(pg.get_user(), Some("other"));
        assert_eq!(pg.get_password(), Some(&b"secret"[..]));
        assert_eq!(pg.get_dbname(), Some("app"));
        assert_eq!(pg.get_application_name(), Some("pgconn-test"));
    }

    #[test]
    fn empty_or_malformed_dsn_is_config_error() {
        assert!(matches!(
            DbConfig::default().to_pg_config(),
            Err(ConnError::Config(_))
        ));
        assert!(matches!(
            DbConfig::new("postgres://host:notaport/db").to_pg_config(),
            Err(ConnError::Config(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let cfg = DbConfig::new("host=localhost").password("hunter2");
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }
}
