//! # pgconn
//!
//! A thin PostgreSQL convenience layer over `tokio-postgres`.
//!
//! ## Features
//!
//! - **Fluent query builder**: `select`, `from`, `join`, `and_where`, `group_by`,
//!   `having`, `order_by`, `limit`/`offset`, with `?` placeholders
//! - **CRUD helpers**: `insert`, `update`, `replace` (upsert), `delete`, `count`
//!   and `save` from column/value [`Record`]s
//! - **Keyed statements**: pass a key to reuse one prepared statement across calls
//! - **Column checking**: optionally drop data columns the table does not have
//! - **Transaction-friendly**: wrap a transaction anywhere a `GenericClient` is expected
//! - **Safe defaults**: DELETE requires WHERE, UPDATE requires data
//! - **Named instances**: a registry of configs with lazily shared connections
//!
//! ## Query builder
//!
//! ```ignore
//! use pgconn::{DbConn, DbConfig, Query};
//!
//! let conn = DbConn::connect(&DbConfig::from_env()?).await?;
//!
//! let rows = conn
//!     .select("u.id")
//!     .select("u.username")
//!     .from("users u")
//!     .and_where("u.age > ?", 18)
//!     .where_in("u.status", ["active", "invited"])
//!     .order_by("u.id DESC")
//!     .limit(20)
//!     .fetch_all(&conn)
//!     .await?;
//! ```
//!
//! ## CRUD helpers
//!
//! ```ignore
//! use pgconn::Record;
//!
//! conn.insert("users", Record::new().set("username", "alice").set("age", 31)).await?;
//! conn.update("users", Record::new().set("age", 32), "username = ?", "alice").await?;
//! conn.replace("settings", Record::new().set("key", "theme").set("value", "dark"), &["key"]).await?;
//! let adults = conn.count("users", "age >= ?", 18).await?;
//! conn.delete("users", "username = ?", "alice").await?;
//! ```
//!
//! `$1, $2, ...` placeholders may be written directly instead of `?`; SQL that
//! contains no `?` is passed through unchanged. Write `??` for a literal `?`
//! operator (e.g. jsonb key existence).

pub mod client;
pub mod config;
pub mod conn;
pub mod error;
pub mod hook;
pub mod ident;
pub mod param;
pub mod placeholder;
pub mod query;
pub mod record;
pub mod registry;
pub mod row;
pub mod value;
pub mod where_clause;

pub use client::GenericClient;
pub use config::{ConnOptions, DbConfig};
pub use conn::DbConn;
pub use error::{ConnError, ConnResult};
pub use hook::{ErrorCallback, error_callback};
pub use ident::{Ident, quote_ident};
pub use param::{IntoParams, Param, ParamList};
pub use placeholder::{count_placeholders, rewrite_placeholders};
pub use query::Query;
pub use record::{IntoRecord, Record};
pub use registry::{DEFAULT_INSTANCE, Registry};
pub use row::{FromRow, RowExt};
pub use value::Value;
pub use where_clause::{IntoWhere, Operand, Where, build_where};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_tls};
