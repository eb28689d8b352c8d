// ABOUTME: SQL Server operation facade over a bb8 pool of tiberius clients
// ABOUTME: Lists catalog objects and runs row-limited ad-hoc queries per database

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use bb8::{Pool, PooledConnection, RunError};
use futures::{Stream, TryStreamExt};
use thiserror::Error;
use tiberius::{AuthMethod, Config, QueryItem, Row};

use crate::config::{ConnectionProfile, PoolSettings};
use crate::db::catalog;
use crate::db::pool::{GuardedClient, GuardedManager};
use crate::db::render::cell_to_string;
use crate::models::{
    nullability_label, ColumnName, DatabaseName, QueryResult, QueryRow, StoredProcedure,
    TableIndex, TableName, ViewName,
};

#[derive(Error, Debug)]
pub enum SqlServerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Connection pool error: {0}")]
    Pool(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),
    #[error("Tiberius error: {0}")]
    Tiberius(#[from] tiberius::error::Error),
}

/// Coarse classification of a [`SqlServerError`] for callers deciding what to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Pool exhausted, network unreachable or login refused
    Connectivity,
    /// Rejected by the server: bad syntax, missing object, missing permission
    SyntaxOrPermission,
    Timeout,
}

impl SqlServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlServerError::ConnectionFailed(_) | SqlServerError::Pool(_) => ErrorKind::Connectivity,
            SqlServerError::QueryFailed(_) => ErrorKind::SyntaxOrPermission,
            SqlServerError::Timeout(_) => ErrorKind::Timeout,
            SqlServerError::Tiberius(tiberius::error::Error::Server(_)) => {
                ErrorKind::SyntaxOrPermission
            }
            SqlServerError::Tiberius(_) => ErrorKind::Connectivity,
        }
    }
}

impl From<RunError<tiberius::error::Error>> for SqlServerError {
    fn from(err: RunError<tiberius::error::Error>) -> Self {
        match err {
            RunError::User(e) => SqlServerError::ConnectionFailed(e.to_string()),
            RunError::TimedOut => {
                SqlServerError::Pool("timed out waiting for a free connection".to_string())
            }
        }
    }
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub connections: u32,
    pub idle_connections: u32,
}

impl PoolStatus {
    pub fn in_use(&self) -> u32 {
        self.connections - self.idle_connections
    }
}

/// Caps materialized rows while still counting the whole result set
#[derive(Debug)]
pub(crate) struct LimitedRows {
    limit: usize,
    columns: Vec<String>,
    rows: Vec<QueryRow>,
    total: u64,
}

impl LimitedRows {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            columns: Vec::new(),
            rows: Vec::with_capacity(limit.min(1024)),
            total: 0,
        }
    }

    pub(crate) fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }

    /// Count a row; `render` only runs while under the limit
    pub(crate) fn push(&mut self, render: impl FnOnce() -> QueryRow) {
        self.total += 1;
        if self.rows.len() < self.limit {
            self.rows.push(render());
        }
    }

    pub(crate) fn finish(self) -> QueryResult {
        QueryResult {
            total_row_count: self.total,
            returned_row_count: self.rows.len() as u64,
            columns: self.columns,
            rows: self.rows,
        }
    }
}

/// Read a query stream to its end, keeping the first result set up to `row_limit` rows
pub(crate) async fn collect_first_result<S>(
    mut stream: S,
    row_limit: usize,
) -> Result<QueryResult, SqlServerError>
where
    S: Stream<Item = tiberius::Result<QueryItem>> + Unpin,
{
    let mut collected = LimitedRows::new(row_limit);
    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) if meta.result_index() == 0 => {
                collected.set_columns(meta.columns().iter().map(|c| c.name().to_string()).collect());
            }
            QueryItem::Row(row) if row.result_index() == 0 => {
                collected.push(|| render_row(&row));
            }
            _ => {}
        }
    }
    Ok(collected.finish())
}

/// Clear the in-flight mark unless the connection itself failed
fn settle<T>(conn: &mut GuardedClient, result: &Result<T, SqlServerError>) {
    match result {
        Err(e) if e.kind() == ErrorKind::Connectivity => {}
        _ => conn.finish(),
    }
}

fn render_row(row: &Row) -> QueryRow {
    let cells = row
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| (column.name().to_string(), cell_to_string(row, i)))
        .collect();
    QueryRow { cells }
}

fn text(row: &Row, column: &str) -> Result<String, SqlServerError> {
    Ok(optional_text(row, column)?.unwrap_or_default())
}

fn optional_text(row: &Row, column: &str) -> Result<Option<String>, SqlServerError> {
    Ok(row.try_get::<&str, _>(column)?.map(str::to_string))
}

/// Metadata and query operations against one SQL Server instance.
///
/// Holds a pool shared by every database on the instance; each call checks out
/// a connection, selects its database with `USE`, and returns the connection
/// when the call ends, whatever the outcome.
#[derive(Clone)]
pub struct SqlServerOperation {
    pool: Pool<GuardedManager>,
    statement_timeout: Option<Duration>,
}

impl SqlServerOperation {
    /// Build the pool for `profile` and open `initial_size` connections
    pub async fn connect(
        profile: &ConnectionProfile,
        settings: &PoolSettings,
    ) -> Result<Self, SqlServerError> {
        let settings = settings.normalized();

        let mut config = Config::new();
        config.host(&profile.host);
        config.port(profile.port);
        config.authentication(AuthMethod::sql_server(&profile.username, &profile.password));

        if profile.trust_certificate {
            config.trust_cert();
        }

        log::info!(
            "Connecting to SQL Server {}:{} as {}",
            profile.host,
            profile.port,
            profile.username
        );

        let pool = Pool::builder()
            .max_size(settings.max_size)
            .min_idle(Some(settings.min_idle))
            .connection_timeout(settings.connection_timeout())
            .test_on_check_out(true)
            .build(GuardedManager::new(config))
            .await
            .map_err(|e| SqlServerError::ConnectionFailed(e.to_string()))?;

        let operation = Self {
            pool,
            statement_timeout: settings.statement_timeout(),
        };
        operation.warm_up(settings.initial_size).await?;

        log::info!(
            "SQL Server pool ready (initial {}, min idle {}, max {})",
            settings.initial_size,
            settings.min_idle,
            settings.max_size
        );

        Ok(operation)
    }

    async fn warm_up(&self, initial_size: u32) -> Result<(), SqlServerError> {
        let mut held = Vec::with_capacity(initial_size as usize);
        for _ in 0..initial_size {
            held.push(self.connection().await?);
        }
        Ok(())
    }

    async fn connection(
        &self,
    ) -> Result<PooledConnection<'_, GuardedManager>, SqlServerError> {
        Ok(self.pool.get().await?)
    }

    pub fn pool_status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// `None` when statements may run without a time limit
    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, SqlServerError>>,
    ) -> Result<T, SqlServerError> {
        match self.statement_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| SqlServerError::Timeout(limit))?,
            None => fut.await,
        }
    }

    /// Run a batch and collect the rows of its first result set
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, SqlServerError> {
        log::debug!("Executing catalog query: {}", sql);
        let result = self
            .with_timeout(async {
                let mut conn = self.connection().await?;
                conn.begin();
                let rows = async {
                    let stream = conn.simple_query(sql).await?;
                    Ok::<_, SqlServerError>(stream.into_first_result().await?)
                }
                .await;
                settle(&mut conn, &rows);
                rows
            })
            .await;

        if let Err(ref e) = result {
            log::warn!("Catalog query failed: {}", e);
        }
        result
    }

    /// List every database on the instance in server order
    pub async fn list_databases(&self) -> Result<Vec<DatabaseName>, SqlServerError> {
        let rows = self.fetch_rows(catalog::LIST_DATABASES).await?;
        rows.iter()
            .map(|row| Ok(DatabaseName::new(text(row, "name")?)))
            .collect()
    }

    /// List user tables with approximate row counts
    pub async fn list_tables(&self, db_name: &str) -> Result<Vec<TableName>, SqlServerError> {
        log::debug!("Listing tables of {}", db_name);
        let rows = self.fetch_rows(&catalog::list_tables(db_name)).await?;
        rows.iter()
            .map(|row| {
                Ok(TableName {
                    name: text(row, "name")?,
                    row_count: row.try_get::<i64, _>("row_count")?.unwrap_or(0),
                })
            })
            .collect()
    }

    pub async fn list_views(&self, db_name: &str) -> Result<Vec<ViewName>, SqlServerError> {
        log::debug!("Listing views of {}", db_name);
        let rows = self.fetch_rows(&catalog::list_views(db_name)).await?;
        rows.iter()
            .map(|row| {
                Ok(ViewName {
                    name: text(row, "name")?,
                    definition_text: None,
                })
            })
            .collect()
    }

    /// Fetch a view's definition; `None` when no such view exists
    pub async fn get_view(
        &self,
        db_name: &str,
        view_name: &str,
    ) -> Result<Option<ViewName>, SqlServerError> {
        let definition = self.module_definition(db_name, view_name).await?;
        Ok(definition.map(|definition_text| ViewName {
            name: view_name.to_string(),
            definition_text,
        }))
    }

    /// Outer `None`: object not found. Inner `None`: definition hidden (encrypted module).
    async fn module_definition(
        &self,
        db_name: &str,
        object_name: &str,
    ) -> Result<Option<Option<String>>, SqlServerError> {
        let rows = self
            .fetch_rows(&catalog::module_definition(db_name, object_name))
            .await?;
        match rows.last() {
            Some(row) => Ok(Some(optional_text(row, "definition")?)),
            None => Ok(None),
        }
    }

    /// List the columns of a table in column order
    pub async fn list_columns(
        &self,
        db_name: &str,
        table_name: &str,
    ) -> Result<Vec<ColumnName>, SqlServerError> {
        log::debug!("Listing columns of {}.{}", db_name, table_name);
        let rows = self
            .fetch_rows(&catalog::list_columns(db_name, table_name))
            .await?;
        rows.iter()
            .map(|row| {
                let length = row.try_get::<i32, _>("column_length")?.unwrap_or(0);
                let is_nullable = row.try_get::<i32, _>("is_null_able")?.unwrap_or(1);
                Ok(ColumnName {
                    name: text(row, "column_name")?,
                    column_type: text(row, "column_type")?,
                    length: length.to_string(),
                    comment: text(row, "column_comment")?,
                    nullability: nullability_label(is_nullable).to_string(),
                })
            })
            .collect()
    }

    /// Map every user table to its column names
    pub async fn get_table_column_map(
        &self,
        db_name: &str,
    ) -> Result<HashMap<String, Vec<String>>, SqlServerError> {
        let rows = self.fetch_rows(&catalog::table_column_map(db_name)).await?;
        let mut tables = HashMap::with_capacity(rows.len());
        for row in &rows {
            let columns = text(row, "column_name")?;
            tables.insert(text(row, "table_name")?, catalog::split_column_list(&columns));
        }
        Ok(tables)
    }

    pub async fn list_indexes(
        &self,
        db_name: &str,
        table_name: &str,
    ) -> Result<Vec<TableIndex>, SqlServerError> {
        log::debug!("Listing indexes of {}.{}", db_name, table_name);
        let rows = self
            .fetch_rows(&catalog::list_indexes(db_name, table_name))
            .await?;
        rows.iter()
            .map(|row| {
                Ok(TableIndex {
                    index_name: text(row, "index_name")?,
                    description: text(row, "index_description")?,
                    key_columns: text(row, "index_keys")?,
                })
            })
            .collect()
    }

    pub async fn list_stored_procedures(
        &self,
        db_name: &str,
    ) -> Result<Vec<StoredProcedure>, SqlServerError> {
        log::debug!("Listing stored procedures of {}", db_name);
        let rows = self
            .fetch_rows(&catalog::list_stored_procedures(db_name))
            .await?;
        rows.iter()
            .map(|row| {
                Ok(StoredProcedure {
                    name: text(row, "name")?,
                    definition_text: None,
                })
            })
            .collect()
    }

    /// Fetch a stored procedure's definition; `None` when no such procedure exists
    pub async fn get_stored_procedure(
        &self,
        db_name: &str,
        sp_name: &str,
    ) -> Result<Option<StoredProcedure>, SqlServerError> {
        let definition = self.module_definition(db_name, sp_name).await?;
        Ok(definition.map(|definition_text| StoredProcedure {
            name: sp_name.to_string(),
            definition_text,
        }))
    }

    /// Run caller-supplied SQL against `db_name`.
    ///
    /// At most `row_limit` rows of the first result set are materialized; the
    /// rest of the stream is still read so `total_row_count` reflects the full
    /// result set and the connection goes back to the pool clean.
    pub async fn execute_query(
        &self,
        db_name: &str,
        sql: &str,
        row_limit: usize,
    ) -> Result<QueryResult, SqlServerError> {
        let batch = catalog::user_query(db_name, sql);
        log::debug!("Executing query on {} (limit {}): {}", db_name, row_limit, sql);

        let result = self
            .with_timeout(async {
                let mut conn = self.connection().await?;
                conn.begin();
                let collected = async {
                    let stream = conn.simple_query(batch.as_str()).await?;
                    collect_first_result(stream, row_limit).await
                }
                .await;
                settle(&mut conn, &collected);
                collected
            })
            .await;

        match &result {
            Ok(r) => log::debug!(
                "Query on {} returned {} of {} rows",
                db_name,
                r.returned_row_count,
                r.total_row_count
            ),
            Err(e) => log::warn!("Query on {} failed: {}", db_name, e),
        }
        result
    }

    /// Liveness check; errors propagate instead of reporting `false`
    pub async fn check_health(&self) -> Result<bool, SqlServerError> {
        self.with_timeout(async {
            let mut conn = self.connection().await?;
            conn.begin();
            let row = async {
                let stream = conn.simple_query(catalog::SERVER_TIME).await?;
                Ok::<_, SqlServerError>(stream.into_row().await?)
            }
            .await;
            settle(&mut conn, &row);
            match row? {
                Some(_) => Ok(true),
                None => Err(SqlServerError::QueryFailed(
                    "No server time returned".to_string(),
                )),
            }
        })
        .await
    }
}
