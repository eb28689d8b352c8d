// ABOUTME: Database module exports for the SQL web console backend
// ABOUTME: Contains the SQL Server operation facade and its catalog queries

pub mod catalog;
pub mod pool;
pub mod render;
pub mod sqlserver;

pub use sqlserver::{ErrorKind, PoolStatus, SqlServerError, SqlServerOperation};
