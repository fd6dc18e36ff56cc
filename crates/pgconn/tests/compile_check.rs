//! Compile-only tests for core API patterns.
//!
//! These tests verify that key API surfaces compile correctly.
//! They do NOT execute against a database; they only check types and signatures.

#![allow(dead_code)]

use pgconn::{
    ConnOptions, ConnResult, DbConfig, DbConn, FromRow, GenericClient, Operand, Param, Query,
    Record, Registry, RowExt, Value, DEFAULT_INSTANCE,
};
use tokio_postgres::Row;

struct User {
    id: i64,
    username: String,
    age: Option<i32>,
}

impl FromRow for User {
    fn from_row(row: &Row) -> ConnResult<Self> {
        Ok(User {
            id: row.try_get_column("id")?,
            username: row.try_get_column("username")?,
            age: row.try_get_column("age")?,
        })
    }
}

// ── Compile checks ──────────────────────────────────────────────────────────

async fn _crud_helpers_compile(conn: &DbConn<tokio_postgres::Client>) -> ConnResult<()> {
    conn.insert("users", Record::new().set("username", "alice").set("age", 31))
        .await?;
    conn.insert_with_key("users", [("username", "bob")], "users:insert")
        .await?;
    let row = conn
        .insert_returning("users", serde_json::json!({ "username": "carol" }), "id")
        .await?;
    let _id: i64 = row.try_get_column("id")?;

    conn.update(
        "users",
        Record::new().set("age", 32),
        vec!["username = ?", "age < ?"],
        ("alice", 40),
    )
    .await?;
    conn.replace(
        "settings",
        Record::new().set("key", "theme").set("value", "dark"),
        &["key"],
    )
    .await?;
    conn.save("users", Record::new().set("id", 1_i64).set("age", 33), "id")
        .await?;
    let _n: i64 = conn.count("users", (), ()).await?;
    let _deleted: u64 = conn.delete("users", "id = ?", 1_i64).await?;
    let name = String::from("bob");
    let _n: i64 = conn.count("users", "username = ?", name.as_str()).await?;
    let _n: i64 = conn.count("users", "username = ?", &name).await?;

    let _cols: Vec<String> = conn.columns_from_table("public.users").await?;
    let _where = conn.build_where(["a = ?", "b = ?"], Operand::Or);
    Ok(())
}

async fn _query_builder_compiles(conn: &DbConn<tokio_postgres::Client>) -> ConnResult<()> {
    let users: Vec<User> = conn
        .select("id")
        .select("username")
        .select("age")
        .from("users")
        .and_where("age > ?", 18)
        .where_in("status", ["active", "invited"])
        .order_by("id DESC")
        .page(2, 25)?
        .fetch_all_as(conn)
        .await?;
    let _ = users;

    let total: i64 = Query::new()
        .select("COUNT(*)")
        .from("users")
        .and_where("id = ANY(?)", Param::new(vec![1_i64, 2, 3]))
        .fetch_scalar_one(conn)
        .await?;
    let _ = total;

    let pair: (i64, String) = conn
        .create_query()
        .select("id, username")
        .from("users")
        .limit(1)
        .fetch_one_as(conn)
        .await?;
    let _ = pair;
    Ok(())
}

async fn _raw_sql_compiles(conn: &DbConn<tokio_postgres::Client>) -> ConnResult<()> {
    let rows = conn
        .execute_query("SELECT * FROM users WHERE id = ? AND meta ?? 'k'", 1_i64)
        .await?;
    let _ = rows;
    let _ = conn
        .execute_statement("UPDATE users SET age = $1 WHERE id = $2", (Value::Null, 1_i64))
        .await?;
    Ok(())
}

async fn _transaction_compiles(client: &mut tokio_postgres::Client) -> ConnResult<()> {
    let tx = client.transaction().await?;
    let conn = DbConn::new(tx);
    conn.insert("audit", Record::new().set("action", "login")).await?;
    conn.into_inner().commit().await?;
    Ok(())
}

async fn _generic_client_compiles<C: GenericClient>(client: C) -> ConnResult<u64> {
    DbConn::new(client)
        .delete("sessions", "expires_at < now()", ())
        .await
}

#[cfg(feature = "pool")]
async fn _pool_compiles(config: &DbConfig) -> ConnResult<()> {
    let pool = pgconn::create_pool(config)?;
    let conn = DbConn::from_pool(&pool, &ConnOptions::new().check_columns(true)).await?;
    conn.insert("users", Record::new().set("username", "dave")).await?;
    Ok(())
}

async fn _registry_compiles() -> ConnResult<()> {
    Registry::global().set_config(
        DbConfig::new("postgres://localhost/app").options(ConnOptions::new().statement_cache(32)),
        DEFAULT_INSTANCE,
    );
    Registry::global().register_error_callback(pgconn::error_callback(|err| {
        eprintln!("db error: {err}");
    }));
    let conn = Registry::global().instance(DEFAULT_INSTANCE).await?;
    conn.count("users", (), ()).await?;

    let rows = Query::new().from("users").execute_default().await?;
    let _ = rows;
    Ok(())
}

fn _spawned_futures_are_send(conn: std::sync::Arc<DbConn<tokio_postgres::Client>>) {
    tokio::spawn(async move {
        let _ = conn.insert("users", Record::new().set("username", "eve")).await;
        let _ = conn
            .update_with_key("users", Record::new().set("age", 1), "id = ?", 5_i64, "age")
            .await;
    });
}

#[test]
fn compile_checks() {}
