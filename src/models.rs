// ABOUTME: Record types returned by the SQL Server operation facade
// ABOUTME: Each record is a read-only snapshot of one catalog or query row

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// A database on the server instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseName {
    pub name: String,
}

impl DatabaseName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A user table with its row count.
///
/// `row_count` comes from catalog statistics (`sysindexes`), not a live
/// `COUNT(*)`, so it may lag behind the actual table contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableName {
    pub name: String,
    #[serde(rename = "rowCount")]
    pub row_count: i64,
}

/// A view, with its definition when fetched individually
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewName {
    pub name: String,
    #[serde(rename = "definitionText", default)]
    pub definition_text: Option<String>,
}

/// A column of a user table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnName {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub length: String,
    pub comment: String,
    pub nullability: String,
}

pub const NOT_NULL_LABEL: &str = "not null";
pub const NULL_LABEL: &str = "null";

/// Render the `syscolumns.isnullable` flag as the two-valued label callers display
pub fn nullability_label(is_nullable: i32) -> &'static str {
    if is_nullable == 0 {
        NOT_NULL_LABEL
    } else {
        NULL_LABEL
    }
}

/// An index as reported by `sp_helpindex`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableIndex {
    #[serde(rename = "indexName")]
    pub index_name: String,
    pub description: String,
    #[serde(rename = "keyColumns")]
    pub key_columns: String,
}

/// A stored procedure, with its definition when fetched individually
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProcedure {
    pub name: String,
    #[serde(rename = "definitionText", default)]
    pub definition_text: Option<String>,
}

/// One materialized row of an ad-hoc query.
///
/// Cells keep the column order of the result set. Serializes as a JSON object
/// whose keys appear in that same order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryRow {
    pub cells: Vec<(String, Option<String>)>,
}

impl QueryRow {
    /// Value of the first column with the given name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }
}

impl Serialize for QueryRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Result of an ad-hoc query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    /// Rows in the full result set, including those past the row limit
    #[serde(rename = "totalRowCount")]
    pub total_row_count: u64,
    #[serde(rename = "returnedRowCount")]
    pub returned_row_count: u64,
    pub columns: Vec<String>,
    pub rows: Vec<QueryRow>,
}
