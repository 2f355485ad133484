//! Error types for tsm
//!
//! Provides a unified error type for the engine and the series store.

use thiserror::Error;

/// Result type alias using TsmError
pub type Result<T> = std::result::Result<T, TsmError>;

/// Unified error type for tsm operations
#[derive(Debug, Error)]
pub enum TsmError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Series Store Errors
    // -------------------------------------------------------------------------
    /// A timestamp or value could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The referenced domain or series does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller passed data the store cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A transaction could not be committed
    #[error("Transaction failed: {0}")]
    Transaction(String),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Database locked: {0}")]
    Locked(String),
}

impl TsmError {
    /// True for errors caused by a missing domain or series
    pub fn is_not_found(&self) -> bool {
        matches!(self, TsmError::NotFound(_))
    }
}
