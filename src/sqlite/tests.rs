//! Tests for SQLite driver.

use std::sync::Arc;

use serde::Deserialize;

use super::*;
use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::logger::{LogLevel, Logger, LoggerConfig, MemorySink};
use crate::types::{QueryResult, Rows, SqlValue};

#[tokio::test]
async fn test_connection_open_memory() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    assert!(!conn.is_closed());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_and_query() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();

    conn.run(
        "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, value REAL)",
        &[],
    )
    .await
    .unwrap();

    let inserted = conn
        .run(
            "INSERT INTO test (name, value) VALUES (?, ?)",
            &[SqlValue::Text("hello".to_string()), SqlValue::Float(1.5)],
        )
        .await
        .unwrap();
    assert_eq!(inserted.rows_affected, 1);

    let result = conn.run("SELECT * FROM test", &[]).await.unwrap();
    assert_eq!(result.columns, vec!["id", "name", "value"]);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][1], SqlValue::Text("hello".to_string()));
    assert_eq!(result.rows[0][2], SqlValue::Float(1.5));
}

#[tokio::test]
async fn test_null_values() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();

    conn.run("CREATE TABLE test (id INTEGER, name TEXT)", &[])
        .await
        .unwrap();
    conn.run(
        "INSERT INTO test (id, name) VALUES (?, ?)",
        &[SqlValue::Int(1), SqlValue::Null],
    )
    .await
    .unwrap();

    let result = conn.run("SELECT * FROM test", &[]).await.unwrap();
    assert_eq!(result.rows[0][1], SqlValue::Null);
}

#[tokio::test]
async fn test_blob_values() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();

    conn.run("CREATE TABLE test (data BLOB)", &[]).await.unwrap();

    let data = vec![0xDE, 0xAD, 0xBE, 0xEF];
    conn.run(
        "INSERT INTO test (data) VALUES (?)",
        &[SqlValue::Bytes(data.clone())],
    )
    .await
    .unwrap();

    let result = conn.run("SELECT * FROM test", &[]).await.unwrap();
    assert_eq!(result.rows[0][0], SqlValue::Bytes(data));
}

#[tokio::test]
async fn test_bool_stored_as_integer() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();

    let result = conn
        .run("SELECT ? AS flag", &[SqlValue::Bool(true)])
        .await
        .unwrap();
    assert_eq!(result.rows[0][0], SqlValue::Int(1));
}

#[tokio::test]
async fn test_multiple_rows() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();

    conn.execute_batch("CREATE TABLE test (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();

    for i in 0..100 {
        conn.run("INSERT INTO test (id) VALUES (?)", &[SqlValue::Int(i)])
            .await
            .unwrap();
    }

    let result = conn.run("SELECT * FROM test", &[]).await.unwrap();
    assert_eq!(result.rows.len(), 100);

    let deleted = conn
        .run("DELETE FROM test WHERE id >= ?", &[SqlValue::Int(90)])
        .await
        .unwrap();
    assert_eq!(deleted.rows_affected, 10);
}

#[tokio::test]
async fn test_invalid_sql_is_an_error() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();

    let err = conn.run("SELEKT 1", &[]).await.err().unwrap();
    assert!(matches!(err, SqliteError::Worker(_)));
}

#[tokio::test]
async fn test_file_database_persists() {
    let path = std::env::temp_dir().join(format!("poolkit-{}.db", uuid::Uuid::new_v4()));
    let path_str = path.to_string_lossy().into_owned();

    {
        let conn = SqliteConnection::open(&path_str).await.unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT); INSERT INTO t VALUES ('kept');")
            .await
            .unwrap();
        conn.close().await.unwrap();
    }

    let conn = SqliteConnection::open(&path_str).await.unwrap();
    let result = conn.run("SELECT v FROM t", &[]).await.unwrap();
    assert_eq!(result.rows[0][0], SqlValue::Text("kept".into()));
    conn.close().await.unwrap();

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path_str, suffix));
    }
}

#[test]
fn test_sqlite_path() {
    assert_eq!(sqlite_path("sqlite::memory:").unwrap(), ":memory:");
    assert_eq!(sqlite_path("sqlite:data.db").unwrap(), "data.db");
    assert_eq!(sqlite_path("sqlite:///var/lib/app.db").unwrap(), "/var/lib/app.db");

    assert!(matches!(
        sqlite_path("postgres://localhost/db"),
        Err(SqliteError::InvalidPath(_))
    ));
    assert!(matches!(sqlite_path("sqlite://"), Err(SqliteError::InvalidPath(_))));
}

// ============================================================================
// Through the pooled client
// ============================================================================

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: i64,
    name: String,
}

fn database() -> (Database, MemorySink) {
    let sink = MemorySink::new();
    let logger = Logger::with_sink(
        LoggerConfig::default().level(LogLevel::Debug).timestamp(false),
        Arc::new(sink.clone()),
    );
    let config = DatabaseConfig::new("sqlite::memory:").pool_size(1);
    let db = Database::new(config, Arc::new(SqliteDriver), &logger).unwrap();
    (db, sink)
}

#[tokio::test]
async fn test_database_round_trip() {
    let (db, sink) = database();
    db.connect().await.unwrap();

    db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)", &[])
        .await
        .unwrap();
    let inserted = db
        .execute(
            "INSERT INTO users (name) VALUES (?), (?)",
            &crate::params!["ada", "grace"],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let users: Rows<User> = db
        .query("SELECT id, name FROM users ORDER BY id", &[])
        .await
        .unwrap();
    assert_eq!(
        users.into_inner(),
        vec![
            User { id: 1, name: "ada".into() },
            User { id: 2, name: "grace".into() },
        ]
    );

    let raw: QueryResult = db
        .query("SELECT COUNT(*) AS n FROM users", &[])
        .await
        .unwrap();
    assert_eq!(raw.rows[0][0], SqlValue::Int(2));

    assert!(sink
        .records()
        .iter()
        .any(|r| r.message.starts_with("Opened sqlite connection")));
    db.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_database_reports_sql_errors() {
    let (db, _) = database();
    db.connect().await.unwrap();

    let err = db
        .query::<QueryResult>("SELECT * FROM missing", &[])
        .await
        .err()
        .unwrap();
    assert_eq!(err.code(), crate::error::ErrorCode::DatabaseQueryError);
    assert!(std::error::Error::source(&err)
        .unwrap()
        .to_string()
        .contains("no such table"));

    db.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_database_rejects_bad_sqlite_url() {
    let logger = Logger::with_sink(LoggerConfig::default(), Arc::new(MemorySink::new()));
    let db = Database::new(
        DatabaseConfig::new("postgres://localhost/db"),
        Arc::new(SqliteDriver),
        &logger,
    )
    .unwrap();

    let err = db.connect().await.err().unwrap();
    assert_eq!(err.code(), crate::error::ErrorCode::DatabaseConnectionError);
    assert!(!db.is_connected());
}
