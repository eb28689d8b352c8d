// ABOUTME: Main library for the SQL web console's SQL Server backend
// ABOUTME: Contains the response envelope and module declarations

use serde::{Deserialize, Serialize};

// Module declarations
pub mod cli;
pub mod config;
pub mod db;
pub mod models;

pub use db::{SqlServerError, SqlServerOperation};

/// Standard API response format rendered by the web console
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub messages: Messages,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Messages {
    pub error: Vec<String>,
    pub warning: Vec<String>,
    pub info: Vec<String>,
    pub success: Vec<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            messages: Messages::default(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            messages: Messages {
                error: vec![message],
                ..Default::default()
            },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Successful call that produced no data
    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            messages: Messages::default(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Attach an informational message
    pub fn with_info(mut self, message: String) -> Self {
        self.messages.info.push(message);
        self
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub connected: bool,
    pub version: String,
    pub platform: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope() {
        let response = ApiResponse::success(vec!["master".to_string()]);
        assert!(response.success);
        assert!(response.messages.error.is_empty());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"][0], "master");
    }

    #[test]
    fn error_envelope() {
        let response: ApiResponse<()> = ApiResponse::error("Login failed for user 'sa'".to_string());
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.messages.error, vec!["Login failed for user 'sa'"]);
    }
}
