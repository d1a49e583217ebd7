//! Error types for the casebox backend
//!
//! One root error with a sub-enum per concern. HTTP handlers translate these
//! into `api::errors::ApiError` at the edge.

use thiserror::Error;

/// Root error type for all casebox operations
#[derive(Debug, Error)]
pub enum CaseboxError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

/// Storage system errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Failures talking to Steam, the payment provider or the rate service
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {message}")]
    RequestFailed { service: &'static str, message: String },

    #[error("{service} returned status {status}")]
    BadStatus { service: &'static str, status: u16 },

    #[error("{service} rejected the request: {message}")]
    Rejected { service: &'static str, message: String },

    #[error("{service} response could not be decoded: {message}")]
    InvalidResponse { service: &'static str, message: String },
}

/// Balance bookkeeping errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientFunds { balance: i64, required: i64 },

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("Balance {balance} cannot absorb a change of {delta}")]
    BalanceOverflow { balance: i64, delta: i64 },

    #[error("Amount {0} is out of range")]
    AmountOutOfRange(f64),
}

impl CaseboxError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CaseboxError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<rocksdb::Error> for CaseboxError {
    fn from(e: rocksdb::Error) -> Self {
        CaseboxError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

impl From<std::io::Error> for CaseboxError {
    fn from(e: std::io::Error) -> Self {
        CaseboxError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

impl From<jsonwebtoken::errors::Error> for CaseboxError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                CaseboxError::Unauthorized("Token expired".to_string())
            }
            _ => CaseboxError::Unauthorized("Invalid token".to_string()),
        }
    }
}

// Convenience type alias for Results
pub type CaseboxResult<T> = Result<T, CaseboxError>;
