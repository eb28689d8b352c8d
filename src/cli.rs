// ABOUTME: Command-line front end standing in for the web console's API layer
// ABOUTME: Parses subcommands and renders operation results as JSON envelopes

use serde::Serialize;
use thiserror::Error;

use crate::db::SqlServerOperation;
use crate::{ApiResponse, HealthResponse};

pub const DEFAULT_ROW_LIMIT: usize = 100;

pub const USAGE: &str = "\
usage: sqlweb <command> [args]

commands:
  health
  databases
  tables <db>
  views <db>
  view <db> <view>
  columns <db> <table>
  column-map <db>
  indexes <db> <table>
  procedures <db>
  procedure <db> <procedure>
  query <db> <sql> [limit]";

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("missing command\n\n{}", USAGE)]
    MissingCommand,
    #[error("unknown command: {0}\n\n{}", USAGE)]
    UnknownCommand(String),
    #[error("{command} expects {expected}\n\n{}", USAGE)]
    WrongArguments {
        command: String,
        expected: &'static str,
    },
    #[error("invalid row limit: {0}")]
    InvalidLimit(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Health,
    Databases,
    Tables { db: String },
    Views { db: String },
    View { db: String, name: String },
    Columns { db: String, table: String },
    ColumnMap { db: String },
    Indexes { db: String, table: String },
    Procedures { db: String },
    Procedure { db: String, name: String },
    Query { db: String, sql: String, limit: usize },
}

impl Command {
    /// Parse the arguments following the program name
    pub fn parse<I, S>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let (command, rest) = args.split_first().ok_or(CliError::MissingCommand)?;

        let wrong = |expected: &'static str| CliError::WrongArguments {
            command: command.clone(),
            expected,
        };

        let cmd = match (command.as_str(), rest) {
            ("health", []) => Command::Health,
            ("databases", []) => Command::Databases,
            ("tables", [db]) => Command::Tables { db: db.clone() },
            ("views", [db]) => Command::Views { db: db.clone() },
            ("view", [db, name]) => Command::View {
                db: db.clone(),
                name: name.clone(),
            },
            ("columns", [db, table]) => Command::Columns {
                db: db.clone(),
                table: table.clone(),
            },
            ("column-map", [db]) => Command::ColumnMap { db: db.clone() },
            ("indexes", [db, table]) => Command::Indexes {
                db: db.clone(),
                table: table.clone(),
            },
            ("procedures", [db]) => Command::Procedures { db: db.clone() },
            ("procedure", [db, name]) => Command::Procedure {
                db: db.clone(),
                name: name.clone(),
            },
            ("query", [db, sql]) => Command::Query {
                db: db.clone(),
                sql: sql.clone(),
                limit: DEFAULT_ROW_LIMIT,
            },
            ("query", [db, sql, limit]) => Command::Query {
                db: db.clone(),
                sql: sql.clone(),
                limit: limit
                    .parse()
                    .map_err(|_| CliError::InvalidLimit(limit.clone()))?,
            },
            ("health" | "databases", _) => return Err(wrong("no arguments")),
            ("tables" | "views" | "column-map" | "procedures", _) => {
                return Err(wrong("<db>"))
            }
            ("columns" | "indexes", _) => return Err(wrong("<db> <table>")),
            ("view" | "procedure", _) => return Err(wrong("<db> <name>")),
            ("query", _) => return Err(wrong("<db> <sql> [limit]")),
            (other, _) => return Err(CliError::UnknownCommand(other.to_string())),
        };
        Ok(cmd)
    }
}

fn envelope<T: Serialize, E: std::fmt::Display>(
    result: Result<T, E>,
    context: &str,
) -> serde_json::Result<serde_json::Value> {
    let response = match result {
        Ok(data) => ApiResponse::success(data),
        Err(e) => ApiResponse::error(format!("{}: {}", context, e)),
    };
    serde_json::to_value(response)
}

fn optional_envelope<T: Serialize, E: std::fmt::Display>(
    result: Result<Option<T>, E>,
    context: &str,
    missing: String,
) -> serde_json::Result<serde_json::Value> {
    match result {
        Ok(None) => serde_json::to_value(ApiResponse::<T>::empty().with_info(missing)),
        other => envelope(other, context),
    }
}

/// Run a command and wrap its outcome in an [`ApiResponse`] envelope
pub async fn execute(
    operation: &SqlServerOperation,
    command: Command,
) -> serde_json::Result<serde_json::Value> {
    match command {
        Command::Health => {
            let result = operation.check_health().await.map(|connected| HealthResponse {
                connected,
                version: env!("CARGO_PKG_VERSION").to_string(),
                platform: std::env::consts::OS.to_string(),
            });
            envelope(result, "Health check failed")
        }
        Command::Databases => envelope(
            operation.list_databases().await,
            "Failed to list databases",
        ),
        Command::Tables { db } => envelope(
            operation.list_tables(&db).await,
            "Failed to list tables",
        ),
        Command::Views { db } => envelope(operation.list_views(&db).await, "Failed to list views"),
        Command::View { db, name } => optional_envelope(
            operation.get_view(&db, &name).await,
            "Failed to get view",
            format!("View not found: {}", name),
        ),
        Command::Columns { db, table } => envelope(
            operation.list_columns(&db, &table).await,
            "Failed to list columns",
        ),
        Command::ColumnMap { db } => envelope(
            operation.get_table_column_map(&db).await,
            "Failed to map table columns",
        ),
        Command::Indexes { db, table } => envelope(
            operation.list_indexes(&db, &table).await,
            "Failed to list indexes",
        ),
        Command::Procedures { db } => envelope(
            operation.list_stored_procedures(&db).await,
            "Failed to list stored procedures",
        ),
        Command::Procedure { db, name } => optional_envelope(
            operation.get_stored_procedure(&db, &name).await,
            "Failed to get stored procedure",
            format!("Stored procedure not found: {}", name),
        ),
        Command::Query { db, sql, limit } => envelope(
            operation.execute_query(&db, &sql, limit).await,
            "Query failed",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_commands() {
        assert_eq!(Command::parse(["databases"]), Ok(Command::Databases));
        assert_eq!(
            Command::parse(["columns", "app_db", "users"]),
            Ok(Command::Columns {
                db: "app_db".to_string(),
                table: "users".to_string()
            })
        );
        assert_eq!(
            Command::parse(["procedure", "app_db", "usp_cleanup"]),
            Ok(Command::Procedure {
                db: "app_db".to_string(),
                name: "usp_cleanup".to_string()
            })
        );
    }

    #[test]
    fn query_limit_defaults_and_parses() {
        assert_eq!(
            Command::parse(["query", "app_db", "SELECT * FROM users"]),
            Ok(Command::Query {
                db: "app_db".to_string(),
                sql: "SELECT * FROM users".to_string(),
                limit: DEFAULT_ROW_LIMIT,
            })
        );
        assert_eq!(
            Command::parse(["query", "app_db", "SELECT 1", "0"]),
            Ok(Command::Query {
                db: "app_db".to_string(),
                sql: "SELECT 1".to_string(),
                limit: 0,
            })
        );
        assert_eq!(
            Command::parse(["query", "app_db", "SELECT 1", "-3"]),
            Err(CliError::InvalidLimit("-3".to_string()))
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert_eq!(
            Command::parse(Vec::<String>::new()),
            Err(CliError::MissingCommand)
        );
        assert_eq!(
            Command::parse(["drop"]),
            Err(CliError::UnknownCommand("drop".to_string()))
        );
        assert!(matches!(
            Command::parse(["tables"]),
            Err(CliError::WrongArguments { expected: "<db>", .. })
        ));
        assert!(matches!(
            Command::parse(["health", "extra"]),
            Err(CliError::WrongArguments { .. })
        ));
    }

    #[test]
    fn not_found_is_a_successful_empty_response() {
        let value = optional_envelope::<String, std::io::Error>(
            Ok(None),
            "Failed to get view",
            "View not found: v_missing".to_string(),
        )
        .unwrap();
        assert_eq!(value["success"], true);
        assert!(value["data"].is_null());
        assert_eq!(value["messages"]["info"][0], "View not found: v_missing");
        assert!(value["messages"]["error"].as_array().unwrap().is_empty());
    }

    #[test]
    fn errors_carry_context() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "Invalid object name 'userz'");
        let value = envelope::<(), _>(Err(err), "Query failed").unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(
            value["messages"]["error"][0],
            "Query failed: Invalid object name 'userz'"
        );
    }
}
