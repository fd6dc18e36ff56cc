use pgconn::{ConnOptions, ConnResult, DbConfig, DbConn, Record, RowExt, Value};
use std::time::{SystemTime, UNIX_EPOCH};

#[tokio::test]
async fn crud_roundtrip() -> ConnResult<()> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping crud_roundtrip");
            return Ok(());
        }
    };

    let config = DbConfig::new(database_url).options(ConnOptions::new().check_columns(true));
    let conn = DbConn::connect(&config).await?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX_EPOCH")
        .as_nanos();
    let table = format!("pgconn_live_{}_{}", std::process::id(), nanos);

    conn.execute_statement(
        &format!(
            "CREATE TABLE {table} (id BIGSERIAL PRIMARY KEY, username TEXT UNIQUE NOT NULL, age INT, meta JSONB)"
        ),
        (),
    )
    .await?;

    let result = exercise(&conn, &table).await;

    conn.execute_statement(&format!("DROP TABLE IF EXISTS {table}"), ())
        .await?;
    result
}

async fn exercise(conn: &DbConn<tokio_postgres::Client>, table: &str) -> ConnResult<()> {
    assert_eq!(
        conn.columns_from_table(table).await?,
        vec!["id", "username", "age", "meta"]
    );

    // Unknown columns are dropped while column checking is on.
    conn.insert(
        table,
        Record::new()
            .set("username", "alice")
            .set("age", 31)
            .set("not_a_column", "x"),
    )
    .await?;

    for (name, age) in [("bob", 20), ("carol", 45)] {
        conn.insert_with_key(table, Record::new().set("username", name).set("age", age), "ins")
            .await?;
    }
    assert_eq!(conn.count(table, (), ()).await?, 3);

    // Drop every server-side prepared statement; the keyed insert re-prepares once.
    conn.client().batch_execute("DEALLOCATE ALL").await?;
    conn.insert_with_key(table, Record::new().set("username", "zed").set("age", 60), "ins")
        .await?;
    assert_eq!(conn.count(table, (), ()).await?, 4);
    conn.delete(table, "username = ?", "zed").await?;

    assert_eq!(conn.count(table, "age > ?", 30).await?, 2);

    let updated = conn
        .update(table, Record::new().set("age", 21), "username = ?", "bob")
        .await?;
    assert_eq!(updated, 1);

    conn.replace(
        table,
        Record::new().set("username", "carol").set("age", 46),
        &["username"],
    )
    .await?;

    let row = conn
        .insert_returning(
            table,
            Record::new()
                .set("username", "dave")
                .set("meta", serde_json::json!({ "tags": ["x"] })),
            "id",
        )
        .await?;
    let dave_id: i64 = row.try_get_column("id")?;

    conn.save(table, Record::new().set("id", dave_id).set("age", 50), "id")
        .await?;
    conn.save(
        table,
        Record::new().set("id", Value::Null).set("username", "erin"),
        "id",
    )
    .await?;

    let rows = conn
        .select("username")
        .select("age")
        .from(table)
        .and_where("age >= ?", 21)
        .where_not_in("username", ["alice"])
        .order_by("age")
        .fetch_all(conn)
        .await?;
    let got: Vec<(String, i32)> = rows
        .iter()
        .map(|r| -> ConnResult<(String, i32)> {
            Ok((r.try_get_column("username")?, r.try_get_column("age")?))
        })
        .collect::<ConnResult<_>>()?;
    assert_eq!(
        got,
        vec![
            ("bob".to_string(), 21),
            ("carol".to_string(), 46),
            ("dave".to_string(), 50),
        ]
    );

    let tagged = conn
        .execute_query(&format!("SELECT id FROM {table} WHERE meta ?? 'tags'"), ())
        .await?;
    assert_eq!(tagged.len(), 1);

    let err = conn
        .insert(table, Record::new().set("username", "bob"))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    assert_eq!(conn.delete(table, "age IS NULL", ()).await?, 1);
    assert_eq!(conn.count(table, (), ()).await?, 4);
    Ok(())
}
