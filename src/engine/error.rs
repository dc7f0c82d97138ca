// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the MySQL engine layer
//!
//! Driver-specific errors are mapped to these unified error types so the
//! HTTP surface can translate them to status codes uniformly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MySQL error number for "table doesn't exist".
pub const ER_NO_SUCH_TABLE: u32 = 1146;
/// MySQL error number for "unknown database".
pub const ER_BAD_DB: u32 = 1049;
/// MySQL error number for dropping a database that does not exist.
pub const ER_DB_DROP_EXISTS: u32 = 1008;

/// Unified error type for all engine operations
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("Not connected to a database server")]
    NotConnected,

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Driver error: {message}")]
    Driver { code: Option<u32>, message: String },

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl EngineError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: msg.into() }
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: msg.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation { message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound { message: msg.into() }
    }

    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver {
            code: None,
            message: msg.into(),
        }
    }

    /// Maps a sqlx error, keeping the MySQL error number when the server
    /// reported one.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let code = db
                    .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                    .map(|e| u32::from(e.number()));
                Self::Driver {
                    code,
                    message: db.message().to_string(),
                }
            }
            _ => Self::Driver {
                code: None,
                message: err.to_string(),
            },
        }
    }

    /// True when the underlying driver error says the table or database
    /// named in the statement does not exist.
    pub fn is_unknown_object(&self) -> bool {
        matches!(
            self,
            Self::Driver {
                code: Some(ER_NO_SUCH_TABLE | ER_BAD_DB | ER_DB_DROP_EXISTS),
                ..
            }
        )
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
