//! Named configurations and shared connections.
//!
//! A [`Registry`] maps instance names to [`DbConfig`]s and connects lazily, once
//! per name, the first time [`Registry::instance`] is awaited. Most programs use
//! the process-wide [`Registry::global`]:
//!
//! ```ignore
//! use pgconn::{DbConfig, Registry, DEFAULT_INSTANCE};
//!
//! Registry::global().set_config(DbConfig::from_env()?, DEFAULT_INSTANCE);
//! let conn = Registry::global().instance(DEFAULT_INSTANCE).await?;
//! conn.insert("events", pgconn::Record::new().set("kind", "boot")).await?;
//! ```

use crate::config::DbConfig;
use crate::conn::DbConn;
use crate::error::{ConnError, ConnResult};
use crate::hook::{ErrorCallback, error_callback, report};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use tokio::sync::OnceCell;

/// Name used when no instance name is given.
pub const DEFAULT_INSTANCE: &str = "default";

type SharedConn = Arc<DbConn<tokio_postgres::Client>>;

/// Named configs plus the connections built from them.
#[derive(Default)]
pub struct Registry {
    configs: RwLock<HashMap<String, DbConfig>>,
    instances: Mutex<HashMap<String, Arc<OnceCell<SharedConn>>>>,
    error_callback: Arc<RwLock<Option<ErrorCallback>>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self
            .configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        f.debug_struct("Registry")
            .field("configs", &names)
            .finish_non_exhaustive()
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Store `config` under `name`.
    ///
    /// An already-open connection for `name` keeps running on the old config
    /// until [`reset`](Self::reset) is called.
    pub fn set_config(&self, config: DbConfig, name: &str) {
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), config);
    }

    pub fn config(&self, name: &str) -> Option<DbConfig> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Register every table of a TOML document as a named config.
    /// Returns how many were registered.
    pub fn load_toml_str(&self, raw: &str) -> ConnResult<usize> {
        let configs = DbConfig::instances_from_toml_str(raw)?;
        let n = configs.len();
        for (name, config) in configs {
            self.set_config(config, &name);
        }
        Ok(n)
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> ConnResult<usize> {
        let configs = DbConfig::instances_from_file(path)?;
        let n = configs.len();
        for (name, config) in configs {
            self.set_config(config, &name);
        }
        Ok(n)
    }

    /// Shared connection for `name`, connecting on first use.
    ///
    /// Concurrent first calls for the same name share one connection attempt.
    /// A failed attempt is not cached; the next call tries again.
    pub async fn instance(&self, name: &str) -> ConnResult<SharedConn> {
        let Some(config) = self.config(name) else {
            let err = ConnError::config(format!(
                "Configuration is not set for instance '{name}'. \
                 Use Registry::set_config(config, name) to set"
            ));
            return report(Some(&self.dispatch()), Err(err));
        };

        let cell = Arc::clone(
            self.instances
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(name.to_string())
                .or_default(),
        );

        let conn = cell
            .get_or_try_init(|| async {
                tracing::debug!(target: "pgconn", instance = name, "opening shared connection");
                DbConn::connect_with_callback(&config, Some(self.dispatch()))
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(conn))
    }

    /// Drop the shared connection for `name`. Returns whether one existed.
    ///
    /// Callers still holding the `Arc` keep using the old connection.
    pub fn reset(&self, name: &str) -> bool {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some_and(|cell| cell.initialized())
    }

    /// Observe every error raised by this registry and its connections,
    /// including connections opened before the callback was registered.
    pub fn register_error_callback(&self, callback: ErrorCallback) {
        *self
            .error_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn clear_error_callback(&self) {
        *self
            .error_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// A callback that forwards to whatever is registered at the time of the error.
    fn dispatch(&self) -> ErrorCallback {
        let slot = Arc::clone(&self.error_callback);
        error_callback(move |err| {
            let current = slot.read().unwrap_or_else(PoisonError::into_inner).clone();
            if let Some(cb) = current {
                cb(err);
            }
        })
    }
}
