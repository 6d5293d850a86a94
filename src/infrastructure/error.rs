use crate::domain::time_block::RecordId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: RecordId },
    #[error("Storage error: {0}")]
    Storage(String),
}
