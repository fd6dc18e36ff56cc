//! Fluent SELECT builder.
//!
//! Fragments are plain SQL with `?` markers. Each clause keeps its own parameter
//! list, and the lists are concatenated in clause order when the query is
//! rendered, so calling `having()` before `and_where()` still binds correctly.
//!
//! # Example
//!
//! ```ignore
//! use pgconn::Query;
//!
//! let rows = Query::new()
//!     .select("u.id, u.username, COUNT(o.id) AS orders")
//!     .from("users u")
//!     .join("LEFT JOIN orders o ON o.user_id = u.id")
//!     .and_where("u.status = ?", "active")
//!     .where_in("u.role", vec!["admin", "staff"])
//!     .group_by("u.id")
//!     .having("COUNT(o.id) > ?", 3_i64)
//!     .order_by("orders DESC")
//!     .limit(20)
//!     .fetch_all(&conn)
//!     .await?;
//! ```

use crate::client::GenericClient;
use crate::error::{ConnError, ConnResult};
use crate::param::{IntoParams, ParamList};
use crate::placeholder::{count_placeholders, rewrite_placeholders};
use crate::row::{FromRow, RowExt};
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;


/// Accumulated SELECT statement.
#[derive(Clone, Debug, Default)]
pub struct Query {
    select: Vec<String>,
    from: Vec<String>,
    joins: Vec<String>,
    join_params: ParamList,
    wheres: Vec<String>,
    where_params: ParamList,
    group_by: Vec<String>,
    having: Vec<String>,
    having_params: ParamList,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Clauses ====================

    /// Append a select-list item. With none, `*` is selected.
    pub fn select(mut self, statement: impl Into<String>) -> Self {
        push_nonempty(&mut self.select, statement);
        self
    }

    /// Append a FROM item (items are comma-separated).
    pub fn from(mut self, statement: impl Into<String>) -> Self {
        push_nonempty(&mut self.from, statement);
        self
    }

    /// Append a full JOIN clause, e.g. `"LEFT JOIN orders o ON o.user_id = u.id"`.
    pub fn join(mut self, statement: impl Into<String>) -> Self {
        push_nonempty(&mut self.joins, statement);
        self
    }

    /// Append a JOIN clause whose ON condition has `?` markers.
    pub fn join_with(mut self, statement: impl Into<String>, params: impl IntoParams) -> Self {
        if push_nonempty(&mut self.joins, statement) {
            self.join_params.extend(&params.into_params());
        }
        self
    }

    /// Append a WHERE condition and its parameters. Conditions are AND-ed.
    /// A blank condition is ignored together with its parameters.
    pub fn and_where(mut self, statement: impl Into<String>, params: impl IntoParams) -> Self {
        if push_nonempty(&mut self.wheres, statement) {
            self.where_params.extend(&params.into_params());
        }
        self
    }

    /// `column IN (?, ?, ...)` with one marker per value. No values matches nothing.
    pub fn where_in(self, column: &str, values: impl IntoParams) -> Self {
        self.in_list(column, values, false)
    }

    /// `column NOT IN (?, ?, ...)`. No values matches everything.
    pub fn where_not_in(self, column: &str, values: impl IntoParams) -> Self {
        self.in_list(column, values, true)
    }

    fn in_list(mut self, column: &str, values: impl IntoParams, negated: bool) -> Self {
        let values = values.into_params();
        let condition = match (values.len(), negated) {
            (0, false) => "1=0".to_string(),
            (0, true) => "1=1".to_string(),
            (n, _) => format!(
                "{} {} ({})",
                column,
                if negated { "NOT IN" } else { "IN" },
                vec!["?"; n].join(", ")
            ),
        };
        self.wheres.push(condition);
        self.where_params.extend(&values);
        self
    }

    /// Append a GROUP BY item.
    pub fn group_by(mut self, statement: impl Into<String>) -> Self {
        push_nonempty(&mut self.group_by, statement);
        self
    }

    /// Append a HAVING condition and its parameters. Conditions are AND-ed.
    pub fn having(mut self, statement: impl Into<String>, params: impl IntoParams) -> Self {
        if push_nonempty(&mut self.having, statement) {
            self.having_params.extend(&params.into_params());
        }
        self
    }

    /// Append an ORDER BY item, e.g. `"created_at DESC"`.
    pub fn order_by(mut self, statement: impl Into<String>) -> Self {
        push_nonempty(&mut self.order_by, statement);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set LIMIT and, when given, OFFSET. Passing `None` clears a previous offset.
    pub fn limit_offset(mut self, limit: u64, offset: Option<u64>) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// Page-based LIMIT/OFFSET. Pages start at 1.
    pub fn page(self, page: u64, per_page: u64) -> ConnResult<Self> {
        if page < 1 {
            return Err(ConnError::validation(format!("page must be >= 1, got {page}")));
        }
        let offset = (page - 1).saturating_mul(per_page);
        Ok(self.limit_offset(per_page, Some(offset)))
    }

    pub fn clear_select(mut self) -> Self {
        self.select.clear();
        self
    }

    pub fn clear_group_by(mut self) -> Self {
        self.group_by.clear();
        self
    }

    pub fn clear_order_by(mut self) -> Self {
        self.order_by.clear();
        self
    }

    /// Drop all WHERE conditions together with their parameters.
    pub fn clear_where(mut self) -> Self {
        self.wheres.clear();
        self.where_params.clear();
        self
    }

    // ==================== Rendering ====================

    /// SQL with the caller's `?` markers still in place.
    pub fn to_raw_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select.join(", "));
        }
        if !self.from.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&self.from.join(", "));
        }
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&and_conditions(&self.wheres));
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&and_conditions(&self.having));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    /// Final SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        rewrite_placeholders(&self.to_raw_sql()).0
    }

    /// Parameters in placeholder order: JOIN, then WHERE, then HAVING.
    pub fn params(&self) -> ParamList {
        let mut params = self.join_params.clone();
        params.extend(&self.where_params);
        params.extend(&self.having_params);
        params
    }

    /// Check that the number of `?` markers matches the number of parameters.
    ///
    /// SQL without any `?` is not checked, since it may use `$n` directly.
    pub fn validate(&self) -> ConnResult<()> {
        let markers = count_placeholders(&self.to_raw_sql());
        let params = self.join_params.len() + self.where_params.len() + self.having_params.len();
        if markers > 0 && markers != params {
            return Err(ConnError::validation(format!(
                "Query: {markers} placeholders but {params} params"
            )));
        }
        Ok(())
    }

    // ==================== Execution ====================

    /// Execute and return all rows.
    pub async fn fetch_all(&self, conn: &impl GenericClient) -> ConnResult<Vec<Row>> {
        self.validate()?;
        let sql = self.to_sql();
        let params = self.params();
        conn.query(&sql, &params.as_refs()).await
    }

    /// Execute and map every row to `T`.
    pub async fn fetch_all_as<T: FromRow>(&self, conn: &impl GenericClient) -> ConnResult<Vec<T>> {
        let rows = self.fetch_all(conn).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Execute and return the first row ([`ConnError::NotFound`] when there is none).
    pub async fn fetch_one(&self, conn: &impl GenericClient) -> ConnResult<Row> {
        self.validate()?;
        let sql = self.to_sql();
        let params = self.params();
        conn.query_one(&sql, &params.as_refs()).await
    }

    pub async fn fetch_one_as<T: FromRow>(&self, conn: &impl GenericClient) -> ConnResult<T> {
        let row = self.fetch_one(conn).await?;
        T::from_row(&row)
    }

    /// Execute and return the first row, if any.
    pub async fn fetch_opt(&self, conn: &impl GenericClient) -> ConnResult<Option<Row>> {
        self.validate()?;
        let sql = self.to_sql();
        let params = self.params();
        conn.query_opt(&sql, &params.as_refs()).await
    }

    /// First column of the first row.
    pub async fn fetch_scalar_one<T>(&self, conn: &impl GenericClient) -> ConnResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.fetch_one(conn).await?.try_get_index(0)
    }

    /// First column of every row.
    pub async fn fetch_column<T>(&self, conn: &impl GenericClient) -> ConnResult<Vec<T>>
    where
        T: for<'a> FromSql<'a>,
    {
        let rows = self.fetch_all(conn).await?;
        rows.iter().map(|r| r.try_get_index(0)).collect()
    }

    /// Execute against the global registry's `default` instance.
    pub async fn execute_default(&self) -> ConnResult<Vec<Row>> {
        let conn = crate::registry::Registry::global()
            .instance(crate::registry::DEFAULT_INSTANCE)
            .await?;
        conn.exec_query(self).await
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Push `statement` unless it is blank. Returns whether it was pushed, so a
/// blank fragment's parameters can be dropped with it.
fn push_nonempty(list: &mut Vec<String>, statement: impl Into<String>) -> bool {
    let statement = statement.into();
    if statement.trim().is_empty() {
        return false;
    }
    list.push(statement);
    true
}

fn and_conditions(items: &[String]) -> String {
    match items {
        [single] => single.clone(),
        _ => items
            .iter()
            .map(|c| format!("({c})"))
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}
