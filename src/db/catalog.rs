// ABOUTME: SQL Server catalog queries used by the operation facade
// ABOUTME: Every per-database statement is a `USE [db];` batch against the shared pool

/// Liveness query
pub const SERVER_TIME: &str = "SELECT getdate()";

pub const LIST_DATABASES: &str = "SELECT database_id, name FROM sys.databases;";

/// Quote an identifier for use inside `[...]`
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Quote a value for use inside a `'...'` literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Prefix a statement with the database switch
pub fn in_database(db_name: &str, statement: &str) -> String {
    format!("USE {};\n{}", quote_ident(db_name), statement)
}

/// User tables with their approximate row counts from index statistics
pub fn list_tables(db_name: &str) -> String {
    in_database(
        db_name,
        "SELECT a.name, CAST(b.rows AS BIGINT) AS row_count \
         FROM sysobjects a JOIN sysindexes b ON a.id = b.id \
         WHERE a.xtype = 'U' AND b.indid IN (0, 1) ORDER BY a.name;",
    )
}

pub fn list_views(db_name: &str) -> String {
    in_database(
        db_name,
        "SELECT name FROM sysobjects WHERE xtype = 'V' ORDER BY name;",
    )
}

/// Definition of a view or procedure by name
pub fn module_definition(db_name: &str, object_name: &str) -> String {
    in_database(
        db_name,
        &format!(
            "SELECT definition FROM sys.sql_modules WHERE object_id = OBJECT_ID({});",
            quote_literal(object_name)
        ),
    )
}

pub fn list_columns(db_name: &str, table_name: &str) -> String {
    in_database(
        db_name,
        &format!(
            "SELECT b.name AS column_name, c.name AS column_type, \
             CAST(b.length AS INT) AS column_length, \
             CAST(b.isnullable AS INT) AS is_null_able, \
             CAST(d.value AS NVARCHAR(4000)) AS column_comment \
             FROM sysobjects a JOIN syscolumns b ON a.id = b.id AND a.xtype = 'U' \
             JOIN systypes c ON b.xtype = c.xusertype \
             LEFT JOIN sys.extended_properties d ON d.major_id = b.id AND d.minor_id = b.colid \
             WHERE a.name = {} ORDER BY b.colorder;",
            quote_literal(table_name)
        ),
    )
}

/// Table name plus its comma-joined column names, aggregated server-side
pub fn table_column_map(db_name: &str) -> String {
    in_database(
        db_name,
        "SELECT a.name AS table_name, \
         STUFF((SELECT ',' + b.name FROM syscolumns b WHERE a.id = b.id \
         ORDER BY b.colorder FOR XML PATH('')), 1, 1, '') AS column_name \
         FROM sysobjects a WHERE a.xtype = 'U' GROUP BY a.name, a.id;",
    )
}

pub fn list_indexes(db_name: &str, table_name: &str) -> String {
    in_database(
        db_name,
        &format!("EXEC sp_helpindex {};", quote_literal(table_name)),
    )
}

pub fn list_stored_procedures(db_name: &str) -> String {
    in_database(
        db_name,
        "SELECT name FROM sysobjects WHERE type = 'P' ORDER BY name;",
    )
}

/// Caller-supplied SQL is passed through untouched after the database switch
pub fn user_query(db_name: &str, sql: &str) -> String {
    in_database(db_name, sql)
}

/// Split the comma-joined column list produced by [`table_column_map`]
pub fn split_column_list(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(',').map(str::to_string).collect()
}
