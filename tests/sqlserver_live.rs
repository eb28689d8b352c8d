// ABOUTME: Integration tests against a live SQL Server instance
// ABOUTME: Run with `cargo test -- --ignored` after setting MSSQL_TEST_HOST and MSSQL_TEST_PASSWORD

use sqlweb_lib::config::{ConnectionProfile, PoolSettings};
use sqlweb_lib::db::ErrorKind;
use sqlweb_lib::SqlServerOperation;

fn test_profile() -> ConnectionProfile {
    let host = std::env::var("MSSQL_TEST_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("MSSQL_TEST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1433);
    ConnectionProfile {
        name: "integration".to_string(),
        host,
        port,
        username: std::env::var("MSSQL_TEST_USER").unwrap_or_else(|_| "sa".to_string()),
        password: std::env::var("MSSQL_TEST_PASSWORD").unwrap_or_default(),
        trust_certificate: true,
    }
}

const FIXTURE: &str = "
IF OBJECT_ID('dbo.users') IS NULL
BEGIN
    CREATE TABLE dbo.users (id int NOT NULL PRIMARY KEY, name varchar(50) NULL);
    INSERT INTO dbo.users (id, name) VALUES (1, 'ann'), (2, 'bob'), (3, NULL), (4, 'dee'), (5, 'eve');
END;
IF OBJECT_ID('dbo.named_users') IS NULL
    EXEC('CREATE VIEW dbo.named_users AS SELECT id, name FROM dbo.users WHERE name IS NOT NULL');
IF OBJECT_ID('dbo.count_users') IS NULL
    EXEC('CREATE PROCEDURE dbo.count_users AS SELECT COUNT(*) AS total FROM dbo.users');
";

async fn fixture() -> SqlServerOperation {
    let operation = SqlServerOperation::connect(&test_profile(), &PoolSettings::default())
        .await
        .expect("connect to test server");
    operation
        .execute_query(
            "master",
            "IF DB_ID('app_db') IS NULL CREATE DATABASE app_db; \
             IF DB_ID('empty_db') IS NULL CREATE DATABASE empty_db;",
            0,
        )
        .await
        .expect("create fixture databases");
    operation
        .execute_query("app_db", FIXTURE, 0)
        .await
        .expect("create fixture objects");
    operation
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn health_check_succeeds() {
    let operation = fixture().await;
    assert!(operation.check_health().await.unwrap());
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn lists_fixture_databases_in_server_order() {
    let operation = fixture().await;
    let names: Vec<String> = operation
        .list_databases()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    let master = names.iter().position(|n| n == "master").unwrap();
    let app_db = names.iter().position(|n| n == "app_db").unwrap();
    assert!(master < app_db);
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn empty_database_has_no_tables() {
    let operation = fixture().await;
    let tables = operation.list_tables("empty_db").await.unwrap();
    assert!(tables.is_empty());
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn lists_tables_with_row_counts() {
    let operation = fixture().await;
    let tables = operation.list_tables("app_db").await.unwrap();
    let users = tables.iter().find(|t| t.name == "users").unwrap();
    assert_eq!(users.row_count, 5);
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn unknown_database_is_an_error() {
    let operation = fixture().await;
    let err = operation.list_tables("no_such_db_42").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxOrPermission);
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn lists_user_columns() {
    let operation = fixture().await;
    let columns = operation.list_columns("app_db", "users").await.unwrap();
    assert_eq!(columns.len(), 2);

    assert_eq!(columns[0].name, "id");
    assert_eq!(columns[0].column_type, "int");
    assert_eq!(columns[0].nullability, "not null");
    assert_eq!(columns[0].comment, "");

    assert_eq!(columns[1].name, "name");
    assert_eq!(columns[1].column_type, "varchar");
    assert_eq!(columns[1].length, "50");
    assert_eq!(columns[1].nullability, "null");
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn maps_tables_to_columns() {
    let operation = fixture().await;
    let map = operation.get_table_column_map("app_db").await.unwrap();
    assert_eq!(map["users"], vec!["id", "name"]);
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn lists_primary_key_index() {
    let operation = fixture().await;
    let indexes = operation.list_indexes("app_db", "users").await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].description.contains("primary key"));
    assert_eq!(indexes[0].key_columns, "id");
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn views_and_procedures() {
    let operation = fixture().await;

    let views = operation.list_views("app_db").await.unwrap();
    assert!(views.iter().any(|v| v.name == "named_users"));
    let view = operation
        .get_view("app_db", "named_users")
        .await
        .unwrap()
        .unwrap();
    assert!(view.definition_text.unwrap().contains("CREATE VIEW"));

    let procedures = operation.list_stored_procedures("app_db").await.unwrap();
    assert!(procedures.iter().any(|p| p.name == "count_users"));
    let procedure = operation
        .get_stored_procedure("app_db", "count_users")
        .await
        .unwrap()
        .unwrap();
    assert!(procedure.definition_text.unwrap().contains("COUNT(*)"));
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn missing_view_and_procedure_are_absent() {
    let operation = fixture().await;
    assert!(operation
        .get_view("app_db", "nonexistent")
        .await
        .unwrap()
        .is_none());
    assert!(operation
        .get_stored_procedure("app_db", "nonexistent")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn query_respects_row_limit() {
    let operation = fixture().await;
    let result = operation
        .execute_query("app_db", "SELECT * FROM users ORDER BY id", 1)
        .await
        .unwrap();
    assert_eq!(result.total_row_count, 5);
    assert_eq!(result.returned_row_count, 1);
    assert_eq!(result.columns, vec!["id", "name"]);
    assert_eq!(result.rows[0].get("id"), Some("1"));
    assert_eq!(result.rows[0].get("name"), Some("ann"));
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn null_cells_are_absent() {
    let operation = fixture().await;
    let result = operation
        .execute_query("app_db", "SELECT name FROM users WHERE id = 3", 10)
        .await
        .unwrap();
    assert_eq!(result.returned_row_count, 1);
    assert_eq!(result.rows[0].cells, vec![("name".to_string(), None)]);
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn malformed_query_releases_connection() {
    let operation = fixture().await;
    let before = operation.pool_status();

    let err = operation
        .execute_query("app_db", "SELEC * FORM users", 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxOrPermission);

    let after = operation.pool_status();
    assert_eq!(after.in_use(), 0);
    assert_eq!(after.connections, before.connections);

    // The released connection is still usable.
    assert!(operation.check_health().await.unwrap());
}

#[tokio::test]
#[ignore = "requires a SQL Server instance"]
async fn statement_timeout_discards_connection() {
    let settings = PoolSettings {
        statement_timeout_ms: 500,
        ..PoolSettings::default()
    };
    let operation = SqlServerOperation::connect(&test_profile(), &settings)
        .await
        .expect("connect to test server");

    let err = operation
        .execute_query("master", "WAITFOR DELAY '00:00:03'", 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    // The next caller gets a clean connection, not the one still waiting on the server.
    assert!(operation.check_health().await.unwrap());
    let rows = operation
        .execute_query("master", "SELECT 1 AS one", 10)
        .await
        .unwrap();
    assert_eq!(rows.rows[0].get("one"), Some("1"));
    assert_eq!(operation.pool_status().in_use(), 0);
}
