//! `DbConn`: a client wrapper with CRUD helpers.
//!
//! Every helper assembles SQL with `?` markers, quotes table and column names,
//! rewrites the markers to `$n`, and hands the statement to the wrapped
//! [`GenericClient`]. Nothing here talks to the network directly.
//!
//! # Example
//!
//! ```ignore
//! use pgconn::{DbConfig, DbConn, Record};
//!
//! let conn = DbConn::connect(&DbConfig::from_env()?).await?;
//!
//! conn.insert("users", Record::new().set("username", "alice").set("age", 31)).await?;
//! conn.update("users", Record::new().set("age", 32), "username = ?", "alice").await?;
//! let n = conn.count("users", "age > ?", 30).await?;
//! conn.delete("users", "username = ?", "alice").await?;
//! ```

mod statement_cache;


use crate::client::GenericClient;
use crate::config::{ConnOptions, DbConfig};
use crate::error::{ConnError, ConnResult};
use crate::hook::{ErrorCallback, report};
use crate::ident::{Ident, quote_ident};
use crate::param::{IntoParams, Param, ParamList};
use crate::placeholder::rewrite_placeholders;
use crate::query::Query;
use crate::record::{IntoRecord, Record};
use crate::row::RowExt;
use crate::where_clause::{IntoWhere, Operand, build_where};
use statement_cache::{CachedStatement, StatementCache};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row, Statement};

const MAX_LOGGED_SQL: usize = 200;

const COLUMNS_SQL: &str = "SELECT column_name::text FROM information_schema.columns \
     WHERE table_schema::text = COALESCE($1::text, current_schema()::text) \
     AND table_name::text = $2::text \
     ORDER BY ordinal_position";

/// A database client plus CRUD helpers, keyed statement reuse and column filtering.
///
/// `C` is any [`GenericClient`]: a `tokio_postgres::Client`, a pooled
/// `deadpool_postgres::Client`, a `Transaction`, or a reference to one.
pub struct DbConn<C> {
    client: C,
    check_columns: AtomicBool,
    statements: StatementCache,
    on_error: Option<ErrorCallback>,
}

impl<C> std::fmt::Debug for DbConn<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConn")
            .field("check_columns", &self.check_columns())
            .field("cached_statements", &self.statements.len())
            .field("error_callback", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

impl DbConn<tokio_postgres::Client> {
    /// Open a dedicated connection.
    ///
    /// The connection task is spawned onto the current tokio runtime.
    pub async fn connect(config: &DbConfig) -> ConnResult<Self> {
        Self::connect_with_callback(config, None).await
    }

    pub(crate) async fn connect_with_callback(
        config: &DbConfig,
        callback: Option<ErrorCallback>,
    ) -> ConnResult<Self> {
        let connected = async {
            let pg = config.to_pg_config()?;
            let (client, connection) = pg
                .connect(NoTls)
                .await
                .map_err(|e| ConnError::Connection(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(target: "pgconn", error = %e, "connection task failed");
                }
            });
            Ok::<_, ConnError>(client)
        }
        .await;

        let client = report(callback.as_ref(), connected)?;
        tracing::debug!(target: "pgconn", "connected");
        Ok(Self::with_options(client, &config.options).with_error_callback_opt(callback))
    }
}

impl<C> DbConn<C> {
    /// Wrap a client with default options.
    pub fn new(client: C) -> Self {
        Self::with_options(client, &ConnOptions::default())
    }

    pub fn with_options(client: C, options: &ConnOptions) -> Self {
        Self {
            client,
            check_columns: AtomicBool::new(options.check_columns),
            statements: StatementCache::new(options.statement_cache_capacity),
            on_error: None,
        }
    }

    /// Forward every error this connection returns to `callback`.
    pub fn with_error_callback(self, callback: ErrorCallback) -> Self {
        self.with_error_callback_opt(Some(callback))
    }

    fn with_error_callback_opt(mut self, callback: Option<ErrorCallback>) -> Self {
        self.on_error = callback;
        self
    }

    pub fn set_error_callback(&mut self, callback: Option<ErrorCallback>) {
        self.on_error = callback;
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    pub fn check_columns(&self) -> bool {
        self.check_columns.load(Ordering::Relaxed)
    }

    /// Toggle filtering of data rows down to the table's real columns.
    pub fn set_check_columns(&self, enabled: bool) {
        self.check_columns.store(enabled, Ordering::Relaxed);
    }

    /// Forget keyed statements and cached column lists.
    pub fn clear_statement_cache(&self) {
        self.statements.clear();
    }

    /// Build a `" WHERE ..."` suffix; see [`build_where`].
    pub fn build_where(&self, conditions: impl IntoWhere, operand: Operand) -> String {
        build_where(conditions, operand)
    }

    pub fn create_query(&self) -> Query {
        Query::new()
    }

    /// Start a query with one select-list item.
    pub fn select(&self, statement: impl Into<String>) -> Query {
        Query::new().select(statement)
    }

    fn report<T>(&self, result: ConnResult<T>) -> ConnResult<T> {
        report(self.on_error.as_ref(), result)
    }
}

impl<C: GenericClient> DbConn<C> {
    // ==================== Raw SQL ====================

    /// Run SQL (with `?` or `$n` placeholders) and return its rows.
    pub async fn execute_query(&self, sql: &str, params: impl IntoParams) -> ConnResult<Vec<Row>> {
        let params = params.into_params();
        let result = async {
            let sql = finalize_sql(sql, &params)?;
            self.run_query(&sql, &params).await
        }
        .await;
        self.report(result)
    }

    /// Run a statement (with `?` or `$n` placeholders) and return the affected row count.
    pub async fn execute_statement(&self, sql: &str, params: impl IntoParams) -> ConnResult<u64> {
        let params = params.into_params();
        let result = async {
            let sql = finalize_sql(sql, &params)?;
            self.run_execute(&sql, &params).await
        }
        .await;
        self.report(result)
    }

    /// Run a built [`Query`].
    pub async fn exec_query(&self, query: &Query) -> ConnResult<Vec<Row>> {
        let result = async {
            query.validate()?;
            self.run_query(&query.to_sql(), &query.params()).await
        }
        .await;
        self.report(result)
    }

    // ==================== CRUD helpers ====================

    /// `INSERT INTO "table" (...) VALUES (...)`.
    pub async fn insert(&self, table: &str, data: impl IntoRecord) -> ConnResult<u64> {
        let result = self.insert_inner(table, data.into_record(), None).await;
        self.report(result)
    }

    /// [`insert`](Self::insert), reusing the statement stored under `stmt_key`.
    ///
    /// The first call with a key builds and prepares the statement; later calls
    /// reuse it and only bind the new values, so every call with the same key must
    /// pass the same columns in the same order.
    pub async fn insert_with_key(
        &self,
        table: &str,
        data: impl IntoRecord,
        stmt_key: &str,
    ) -> ConnResult<u64> {
        let result = self.insert_inner(table, data.into_record(), Some(stmt_key)).await;
        self.report(result)
    }

    /// `INSERT ... RETURNING <returning>` and return the produced row.
    pub async fn insert_returning(
        &self,
        table: &str,
        data: impl IntoRecord,
        returning: &str,
    ) -> ConnResult<Row> {
        let result = async {
            let data = self.filter_columns(table, data.into_record()?, None).await?;
            if returning.trim().is_empty() {
                return Err(ConnError::validation("insert_returning: empty RETURNING list"));
            }
            let sql = format!("{} RETURNING {}", insert_sql(table, &data)?, returning);
            let params = record_params(&data);
            let sql = finalize_sql(&sql, &params)?;
            log_sql(&sql, params.len());
            self.client.query_one(&sql, &params.as_refs()).await
        }
        .await;
        self.report(result)
    }

    /// `UPDATE "table" SET ... WHERE ...`. Data values bind before `where_params`.
    pub async fn update(
        &self,
        table: &str,
        data: impl IntoRecord,
        conditions: impl IntoWhere,
        where_params: impl IntoParams,
    ) -> ConnResult<u64> {
        let result = self
            .update_inner(
                table,
                data.into_record(),
                conditions.into_where().to_sql(Operand::And),
                where_params.into_params(),
                None,
            )
            .await;
        self.report(result)
    }

    /// [`update`](Self::update), reusing the statement stored under `stmt_key`.
    pub async fn update_with_key(
        &self,
        table: &str,
        data: impl IntoRecord,
        conditions: impl IntoWhere,
        where_params: impl IntoParams,
        stmt_key: &str,
    ) -> ConnResult<u64> {
        let result = self
            .update_inner(
                table,
                data.into_record(),
                conditions.into_where().to_sql(Operand::And),
                where_params.into_params(),
                Some(stmt_key),
            )
            .await;
        self.report(result)
    }

    /// Insert, or overwrite the row that conflicts on `conflict_columns`.
    ///
    /// Renders `INSERT ... ON CONFLICT (...) DO UPDATE SET col = EXCLUDED.col`
    /// for every non-conflict column, or `DO NOTHING` when there are none.
    pub async fn replace(
        &self,
        table: &str,
        data: impl IntoRecord,
        conflict_columns: &[&str],
    ) -> ConnResult<u64> {
        let result = self
            .replace_inner(table, data.into_record(), conflict_columns, None)
            .await;
        self.report(result)
    }

    /// [`replace`](Self::replace), reusing the statement stored under `stmt_key`.
    pub async fn replace_with_key(
        &self,
        table: &str,
        data: impl IntoRecord,
        conflict_columns: &[&str],
        stmt_key: &str,
    ) -> ConnResult<u64> {
        let result = self
            .replace_inner(table, data.into_record(), conflict_columns, Some(stmt_key))
            .await;
        self.report(result)
    }

    /// `DELETE FROM "table" WHERE ...`. An empty condition is rejected.
    pub async fn delete(
        &self,
        table: &str,
        conditions: impl IntoWhere,
        params: impl IntoParams,
    ) -> ConnResult<u64> {
        let params = params.into_params();
        let result = async {
            let where_sql = conditions.into_where().to_sql(Operand::And);
            if where_sql.is_empty() {
                return Err(ConnError::validation(format!(
                    "delete from '{table}' requires a WHERE clause"
                )));
            }
            let sql = format!("DELETE FROM {}{}", quote_ident(table)?, where_sql);
            let sql = finalize_sql(&sql, &params)?;
            self.run_execute(&sql, &params).await
        }
        .await;
        self.report(result)
    }

    /// `SELECT COUNT(*) FROM "table" [WHERE ...]`.
    pub async fn count(
        &self,
        table: &str,
        conditions: impl IntoWhere,
        params: impl IntoParams,
    ) -> ConnResult<i64> {
        let params = params.into_params();
        let result = async {
            let sql = format!(
                "SELECT COUNT(*) FROM {}{}",
                quote_ident(table)?,
                conditions.into_where().to_sql(Operand::And)
            );
            let sql = finalize_sql(&sql, &params)?;
            log_sql(&sql, params.len());
            let row = self.client.query_one(&sql, &params.as_refs()).await?;
            row.try_get_index::<i64>(0)
        }
        .await;
        self.report(result)
    }

    /// Update by primary key when the data carries a non-empty key value,
    /// otherwise insert.
    ///
    /// On the insert path an empty key column is left out so the column default
    /// (a sequence or identity) applies.
    pub async fn save(
        &self,
        table: &str,
        data: impl IntoRecord,
        primary_key: &str,
    ) -> ConnResult<u64> {
        let result = self.save_inner(table, data.into_record(), primary_key, None).await;
        self.report(result)
    }

    /// [`save`](Self::save) with keyed statement reuse. The UPDATE and INSERT
    /// paths are cached under `<stmt_key>:update` and `<stmt_key>:insert`.
    pub async fn save_with_key(
        &self,
        table: &str,
        data: impl IntoRecord,
        primary_key: &str,
        stmt_key: &str,
    ) -> ConnResult<u64> {
        let result = self
            .save_inner(table, data.into_record(), primary_key, Some(stmt_key))
            .await;
        self.report(result)
    }

    /// Column names of `table` in ordinal order.
    ///
    /// `table` may be schema-qualified; unqualified names resolve against
    /// `current_schema()`.
    pub async fn columns_from_table(&self, table: &str) -> ConnResult<Vec<String>> {
        let result = self.fetch_columns(table).await;
        self.report(result)
    }

    // ==================== Internals ====================

    async fn insert_inner(
        &self,
        table: &str,
        data: ConnResult<Record>,
        stmt_key: Option<&str>,
    ) -> ConnResult<u64> {
        let data = self.filter_columns(table, data?, stmt_key).await?;
        let params = record_params(&data);
        self.execute_keyed(stmt_key, || insert_sql(table, &data), &params)
            .await
    }

    async fn update_inner(
        &self,
        table: &str,
        data: ConnResult<Record>,
        where_sql: String,
        where_params: ParamList,
        stmt_key: Option<&str>,
    ) -> ConnResult<u64> {
        let data = self.filter_columns(table, data?, stmt_key).await?;
        let mut params = record_params(&data);
        params.extend(&where_params);
        self.execute_keyed(stmt_key, || update_sql(table, &data, &where_sql), &params)
            .await
    }

    async fn replace_inner(
        &self,
        table: &str,
        data: ConnResult<Record>,
        conflict_columns: &[&str],
        stmt_key: Option<&str>,
    ) -> ConnResult<u64> {
        let data = self.filter_columns(table, data?, stmt_key).await?;
        let params = record_params(&data);
        self.execute_keyed(stmt_key, || replace_sql(table, &data, conflict_columns), &params)
            .await
    }

    async fn save_inner(
        &self,
        table: &str,
        data: ConnResult<Record>,
        primary_key: &str,
        stmt_key: Option<&str>,
    ) -> ConnResult<u64> {
        let mut data = data?;
        let key_value = data.get(primary_key).filter(|v| !v.is_empty()).cloned();
        match key_value {
            Some(id) => {
                let update_key = stmt_key.map(|k| format!("{k}:update"));
                let where_sql = format!(" WHERE {} = ?", quote_ident(primary_key)?);
                self.update_inner(
                    table,
                    Ok(data),
                    where_sql,
                    Param::from(id).into_params(),
                    update_key.as_deref(),
                )
                .await
            }
            None => {
                data.remove(primary_key);
                let insert_key = stmt_key.map(|k| format!("{k}:insert"));
                self.insert_inner(table, Ok(data), insert_key.as_deref()).await
            }
        }
    }

    async fn fetch_columns(&self, table: &str) -> ConnResult<Vec<String>> {
        let ident = Ident::parse(table)?;
        let schema = ident.qualifier().map(str::to_string);
        let name = ident.name().to_string();
        log_sql(COLUMNS_SQL, 2);
        let rows = self.client.query(COLUMNS_SQL, &[&schema, &name]).await?;
        if rows.is_empty() {
            return Err(ConnError::not_found(format!(
                "table '{table}' does not exist or has no visible columns"
            )));
        }
        rows.iter().map(|r| r.try_get_index::<String>(0)).collect()
    }

    /// Apply column checking, using the column list cached under `stmt_key` if any.
    async fn filter_columns(
        &self,
        table: &str,
        mut data: Record,
        stmt_key: Option<&str>,
    ) -> ConnResult<Record> {
        if !self.check_columns() {
            return Ok(data);
        }

        let cached = stmt_key.and_then(|k| self.statements.columns(k));
        let columns = match cached {
            Some(columns) => columns,
            None => {
                let columns = self.fetch_columns(table).await?;
                if let Some(k) = stmt_key {
                    self.statements.insert_columns(k, columns.clone());
                }
                columns
            }
        };

        let before = data.len();
        data.retain_columns(&columns);
        if data.len() != before {
            tracing::trace!(
                target: "pgconn",
                table,
                dropped = before - data.len(),
                "dropped columns not present in table"
            );
        }
        Ok(data)
    }

    /// Execute a write, going through the keyed statement cache when `stmt_key` is set.
    ///
    /// `build` produces the SQL with `?` markers; it only runs on a cache miss.
    async fn execute_keyed(
        &self,
        stmt_key: Option<&str>,
        build: impl FnOnce() -> ConnResult<String>,
        params: &ParamList,
    ) -> ConnResult<u64> {
        let key = match stmt_key {
            Some(k) if self.statements.is_enabled() => k,
            _ => {
                let sql = finalize_sql(&build()?, params)?;
                return self.run_execute(&sql, params).await;
            }
        };

        let entry = match self.statements.get(key) {
            Some(entry) => {
                tracing::trace!(target: "pgconn", stmt_key = key, "statement cache hit");
                entry
            }
            None => {
                tracing::trace!(target: "pgconn", stmt_key = key, "statement cache miss");
                let sql = finalize_sql(&build()?, params)?;
                let prepared = self.prepare(&sql).await?;
                let param_count = prepared.as_ref().map_or(params.len(), |s| s.params().len());
                self.statements.insert_if_absent(
                    key,
                    CachedStatement {
                        sql,
                        param_count,
                        prepared,
                    },
                )
            }
        };

        if entry.param_count != params.len() {
            return Err(ConnError::validation(format!(
                "statement '{key}' expects {} params, got {}",
                entry.param_count,
                params.len()
            )));
        }

        let Some(stmt) = &entry.prepared else {
            return self.run_execute(&entry.sql, params).await;
        };

        log_sql(&entry.sql, params.len());
        match self.client.execute_prepared(stmt, &params.as_refs()).await {
            Err(e) if e.is_retryable_prepared() => {
                tracing::debug!(target: "pgconn", stmt_key = key, error = %e, "re-preparing statement");
                self.statements.remove(key);
                let stmt = self.client.prepare_statement(&entry.sql).await?;
                self.statements.replace(
                    key,
                    CachedStatement {
                        prepared: Some(stmt.clone()),
                        ..entry.clone()
                    },
                );
                self.client.execute_prepared(&stmt, &params.as_refs()).await
            }
            other => other,
        }
    }

    async fn prepare(&self, sql: &str) -> ConnResult<Option<Statement>> {
        if !self.client.supports_prepared_statements() {
            return Ok(None);
        }
        self.client.prepare_statement(sql).await.map(Some)
    }

    async fn run_query(&self, sql: &str, params: &ParamList) -> ConnResult<Vec<Row>> {
        log_sql(sql, params.len());
        self.client.query(sql, &params.as_refs()).await
    }

    async fn run_execute(&self, sql: &str, params: &ParamList) -> ConnResult<u64> {
        log_sql(sql, params.len());
        self.client.execute(sql, &params.as_refs()).await
    }
}

/// `DbConn` is itself a client: calls pass straight through (no placeholder
/// rewriting), with logging and the error callback applied.
impl<C: GenericClient> GenericClient for DbConn<C> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ConnResult<Vec<Row>> {
        log_sql(sql, params.len());
        let result = self.client.query(sql, params).await;
        self.report(result)
    }

    async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ConnResult<Row> {
        log_sql(sql, params.len());
        let result = self.client.query_one(sql, params).await;
        self.report(result)
    }

    async fn query_opt(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ConnResult<Option<Row>> {
        log_sql(sql, params.len());
        let result = self.client.query_opt(sql, params).await;
        self.report(result)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ConnResult<u64> {
        log_sql(sql, params.len());
        let result = self.client.execute(sql, params).await;
        self.report(result)
    }

    fn supports_prepared_statements(&self) -> bool {
        self.client.supports_prepared_statements()
    }

    async fn prepare_statement(&self, sql: &str) -> ConnResult<Statement> {
        let result = self.client.prepare_statement(sql).await;
        self.report(result)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> ConnResult<Vec<Row>> {
        let result = self.client.query_prepared(stmt, params).await;
        self.report(result)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> ConnResult<u64> {
        let result = self.client.execute_prepared(stmt, params).await;
        self.report(result)
    }
}

// ==================== SQL assembly ====================

fn record_params(data: &Record) -> ParamList {
    data.values().cloned().map(Param::from).collect()
}

fn quoted_columns(data: &Record) -> ConnResult<Vec<String>> {
    data.columns().map(quote_ident).collect()
}

pub(crate) fn insert_sql(table: &str, data: &Record) -> ConnResult<String> {
    let table = quote_ident(table)?;
    if data.is_empty() {
        return Ok(format!("INSERT INTO {table} DEFAULT VALUES"));
    }
    let columns = quoted_columns(data)?;
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        vec!["?"; columns.len()].join(", ")
    ))
}

pub(crate) fn update_sql(table: &str, data: &Record, where_sql: &str) -> ConnResult<String> {
    let table = quote_ident(table)?;
    if data.is_empty() {
        return Err(ConnError::validation(format!(
            "update of {table} has no columns to SET"
        )));
    }
    let set = quoted_columns(data)?
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("UPDATE {table} SET {set}{where_sql}"))
}

pub(crate) fn replace_sql(
    table: &str,
    data: &Record,
    conflict_columns: &[&str],
) -> ConnResult<String> {
    if conflict_columns.is_empty() {
        return Err(ConnError::validation(format!(
            "replace into '{table}' needs at least one conflict column"
        )));
    }
    if data.is_empty() {
        return Err(ConnError::validation(format!(
            "replace into '{table}' has no columns"
        )));
    }
    let target = conflict_columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<ConnResult<Vec<_>>>()?
        .join(", ");
    let updates = data
        .columns()
        .filter(|c| !conflict_columns.contains(c))
        .map(|c| quote_ident(c).map(|q| format!("{q} = EXCLUDED.{q}")))
        .collect::<ConnResult<Vec<_>>>()?;
    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    Ok(format!(
        "{} ON CONFLICT ({}) {}",
        insert_sql(table, data)?,
        target,
        action
    ))
}

/// Rewrite `?` markers and check them against the parameter count.
pub(crate) fn finalize_sql(sql: &str, params: &ParamList) -> ConnResult<String> {
    let (rewritten, markers) = rewrite_placeholders(sql);
    if markers > 0 && markers != params.len() {
        return Err(ConnError::validation(format!(
            "{markers} placeholders but {} params",
            params.len()
        )));
    }
    Ok(rewritten)
}

fn log_sql(sql: &str, param_count: usize) {
    if sql.len() > MAX_LOGGED_SQL {
        let mut end = MAX_LOGGED_SQL;
        while !sql.is_char_boundary(end) {
            end -= 1;
        }
        tracing::debug!(target: "pgconn.sql", param_count, sql = %format_args!("{}...", &sql[..end]));
    } else {
        tracing::debug!(target: "pgconn.sql", param_count, sql = %sql);
    }
}
