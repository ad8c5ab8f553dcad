use std::io;

use http::status::StatusCode;
use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[cfg(feature = "service")]
use sqlx::Error as SqlxError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum PressNativeError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Storage unavailable: {0}")]
    Storage(String),
}

impl PressNativeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PressNativeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PressNativeError::Custom(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PressNativeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PressNativeError::NotFound(_) => StatusCode::NOT_FOUND,
            PressNativeError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PressNativeError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<toml::de::Error> for PressNativeError {
    fn from(src: toml::de::Error) -> PressNativeError {
        PressNativeError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for PressNativeError {
    fn from(src: toml::ser::Error) -> PressNativeError {
        PressNativeError::Config(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for PressNativeError {
    fn from(src: JsonError) -> PressNativeError {
        PressNativeError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for PressNativeError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => PressNativeError::NotFound(format!("{x}")),
            _ => PressNativeError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<RegexError> for PressNativeError {
    fn from(x: RegexError) -> Self {
        PressNativeError::Config(format!("Regex parse failed: {x}"))
    }
}

#[cfg(feature = "service")]
impl From<SqlxError> for PressNativeError {
    fn from(db_error: SqlxError) -> Self {
        PressNativeError::Storage(format!("database error: {db_error:?}"))
    }
}
