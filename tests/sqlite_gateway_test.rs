//! End-to-end tests against a file-backed SQLite database.
//!
//! Tests verify that:
//! - Writes report the affected-row count
//! - Reads are split into ordered chunks whose concatenation is the full result
//! - Chunking never changes the rows returned
//! - Column values are encoded by type (NULL, numbers, base64 binary, booleans)

use chunked_sql_gateway::config::ChunkPolicy;
use chunked_sql_gateway::db::{QueryGateway, SqlxDriver};
use chunked_sql_gateway::error::DbError;
use chunked_sql_gateway::models::{ConnectionConfig, ConnectionState};
use chunked_sql_gateway::tools::connection::{ConnectInput, ConnectionToolHandler};
use chunked_sql_gateway::tools::data::{DataToolHandler, StatementInput};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Create a SQLite database file that outlives the handle.
fn temp_db_url() -> String {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    format!("sqlite:{}", db_path)
}

async fn setup(policy: ChunkPolicy) -> (Arc<QueryGateway>, String) {
    let url = temp_db_url();
    let gateway = Arc::new(QueryGateway::new(Arc::new(SqlxDriver::new()), policy));
    let config = ConnectionConfig::new(&url, "", "", 10).unwrap();
    gateway.connect(config).await.unwrap();
    (gateway, url)
}

/// Parse every fragment and concatenate the rows.
fn all_rows(fragments: &[String]) -> Vec<Value> {
    fragments
        .iter()
        .flat_map(|f| serde_json::from_str::<Vec<Value>>(f).unwrap())
        .collect()
}

async fn seed_numbers(gateway: &QueryGateway, count: i64) {
    gateway
        .write("CREATE TABLE numbers (id INTEGER PRIMARY KEY, label TEXT)")
        .await
        .unwrap();
    for id in 1..=count {
        gateway
            .write(&format!(
                "INSERT INTO numbers (id, label) VALUES ({}, 'n{}')",
                id, id
            ))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_write_reports_affected_rows() {
    let (gateway, _) = setup(ChunkPolicy::default()).await;
    seed_numbers(&gateway, 3).await;

    let result = gateway
        .write("UPDATE numbers SET label = 'x' WHERE id >= 2")
        .await
        .unwrap();
    assert_eq!(result.affected_rows, 2);
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"affectedRows":2}"#
    );
}

#[tokio::test]
async fn test_read_is_split_into_ordered_chunks() {
    let (gateway, _) = setup(ChunkPolicy::fixed(5)).await;
    seed_numbers(&gateway, 12).await;

    let result = gateway
        .read("SELECT id, label FROM numbers ORDER BY id")
        .await
        .unwrap();

    assert_eq!(result.total_rows, 12);
    let sizes: Vec<usize> = result.fragments.iter().map(|f| f.len()).collect();
    assert_eq!(sizes, vec![5, 5, 2]);

    let rows = all_rows(&result.into_json_fragments());
    let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    assert_eq!(rows[0], json!({"id": 1, "label": "n1"}));
}

#[tokio::test]
async fn test_chunking_does_not_change_rows() {
    let query = "WITH RECURSIVE cnt(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM cnt WHERE x < 5000) \
                 SELECT x, 'row ' || x AS label FROM cnt";

    let (chunked, _) = setup(ChunkPolicy::fixed(1000)).await;
    let (single, _) = setup(ChunkPolicy::fixed(10_000)).await;

    let chunked = chunked.read(query).await.unwrap().into_json_fragments();
    let single = single.read(query).await.unwrap().into_json_fragments();

    // 5000 is an exact multiple of 1000, so a trailing empty chunk follows
    assert_eq!(chunked.len(), 6);
    assert_eq!(chunked.last().map(String::as_str), Some("[]"));
    assert_eq!(single.len(), 1);

    let chunked_rows = all_rows(&chunked);
    assert_eq!(chunked_rows.len(), 5000);
    assert_eq!(chunked_rows, all_rows(&single));
    assert_eq!(chunked_rows[4999], json!({"x": 5000, "label": "row 5000"}));
}

#[tokio::test]
async fn test_in_memory_read_runs_on_single_connection() {
    let gateway = QueryGateway::new(Arc::new(SqlxDriver::new()), ChunkPolicy::fixed(2));
    let config = ConnectionConfig::new("sqlite::memory:", "", "", 1)
        .unwrap()
        .with_max_statements(4);
    gateway.connect(config).await.unwrap();
    gateway
        .write("CREATE TABLE t (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();
    gateway
        .write("INSERT INTO t (id) VALUES (1), (2), (3), (4), (5), (6), (7), (8), (9)")
        .await
        .unwrap();

    let result = gateway.read("SELECT id FROM t ORDER BY id").await.unwrap();

    assert_eq!(result.fragments.len(), 5);
    let rows = all_rows(&result.into_json_fragments());
    let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, (1..=9).collect::<Vec<_>>());
    assert_eq!(gateway.status().await.reconnects, 0);
}

#[tokio::test]
async fn test_empty_result_yields_one_empty_fragment() {
    let (gateway, _) = setup(ChunkPolicy::default()).await;
    seed_numbers(&gateway, 0).await;

    let result = gateway.read("SELECT id FROM numbers").await.unwrap();

    assert_eq!(result.total_rows, 0);
    assert_eq!(result.into_json_fragments(), vec!["[]".to_string()]);
}

#[tokio::test]
async fn test_values_are_encoded_by_type() {
    let (gateway, _) = setup(ChunkPolicy::default()).await;
    gateway
        .write(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL, \
             payload BLOB, active BOOLEAN)",
        )
        .await
        .unwrap();
    gateway
        .write("INSERT INTO items VALUES (1, NULL, 19.5, x'DEADBEEF', 1)")
        .await
        .unwrap();

    let fragments = gateway
        .read("SELECT id, name, price, payload, active FROM items")
        .await
        .unwrap()
        .into_json_fragments();

    // Keys follow column order
    assert_eq!(
        fragments,
        vec![r#"[{"id":1,"name":null,"price":19.5,"payload":"3q2+7w==","active":true}]"#.to_string()]
    );
}

#[tokio::test]
async fn test_invalid_sql_is_fatal_and_keeps_connection() {
    let (gateway, _) = setup(ChunkPolicy::default()).await;

    let err = gateway.read("SELEC 1").await.unwrap_err();
    assert!(matches!(err, DbError::FatalQuery { .. }), "{:?}", err);

    let err = gateway.write("INSERT INTO missing VALUES (1)").await.unwrap_err();
    assert!(matches!(err, DbError::FatalQuery { .. }), "{:?}", err);

    let status = gateway.status().await;
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.reconnects, 0);
}

#[tokio::test]
async fn test_tool_handlers_round_trip() {
    let url = temp_db_url();
    let gateway = Arc::new(QueryGateway::new(
        Arc::new(SqlxDriver::new()),
        ChunkPolicy::fixed(2),
    ));
    let connection = ConnectionToolHandler::new(gateway.clone(), 10, 4);
    let data = DataToolHandler::new(gateway.clone());

    let connected = connection
        .connect(ConnectInput {
            address: url,
            username: String::new(),
            password: String::new(),
            timeout_in_seconds: None,
            database: None,
        })
        .await
        .unwrap();
    assert!(connected.connected);

    data.write_data(StatementInput {
        query: "CREATE TABLE t (v TEXT)".to_string(),
    })
    .await
    .unwrap();
    let write = data
        .write_data(StatementInput {
            query: "INSERT INTO t VALUES ('a'), ('b'), ('c')".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(write.affected_rows, 3);

    // Disconnect keeps the configuration; the next read reconnects
    connection.disconnect().await.unwrap();
    assert_eq!(connection.status().await.state, ConnectionState::Disconnected);

    let output = data
        .get_data(StatementInput {
            query: "SELECT v FROM t ORDER BY v".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(
        output.fragments,
        vec![
            r#"[{"v":"a"},{"v":"b"}]"#.to_string(),
            r#"[{"v":"c"}]"#.to_string(),
        ]
    );

    let status = connection.status().await;
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.reconnects, 1);
    assert!(status.connected_at.is_some());
}

#[tokio::test]
async fn test_connect_rejects_unknown_address() {
    let gateway = Arc::new(QueryGateway::new(
        Arc::new(SqlxDriver::new()),
        ChunkPolicy::default(),
    ));
    let connection = ConnectionToolHandler::new(gateway, 10, 4);

    let err = connection
        .connect(ConnectInput {
            address: "oracle://db:1521/xe".to_string(),
            username: String::new(),
            password: String::new(),
            timeout_in_seconds: None,
            database: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::InvalidInput { .. }));
}
