//! Rich diagnostic error types for the telos engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text so calling code knows exactly
//! what went wrong and how to fix it. Planning errors live with the planning
//! layer in [`crate::plan::error`]; this module holds the top-level wrapper
//! and the storage/identity error classes.

use miette::Diagnostic;
use thiserror::Error;

use crate::plan::error::PlanError;

/// Top-level error type for the telos engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum TelosError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ident(#[from] IdentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

/// Convenience alias for engine-level operations.
pub type TelosResult<T> = std::result::Result<T, TelosError>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Transport-level storage errors.
///
/// These indicate infrastructure failure, not caller misuse. The planning
/// layer treats them as opaque and non-retryable; the process owner decides
/// whether to retry, re-open, or fail over.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(telos::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(telos::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption — try running with a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(telos::store::serde),
        help(
            "Failed to serialize or deserialize a stored record. \
             This usually means the stored data format has changed between versions."
        )
    )]
    Serialization { message: String },
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Identity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IdentError {
    #[error("ID allocator exhausted")]
    #[diagnostic(
        code(telos::ident::exhausted),
        help("The 64-bit ID space has been consumed. This should never happen in practice.")
    )]
    AllocatorExhausted,
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid engine configuration: {message}")]
    #[diagnostic(
        code(telos::engine::invalid_config),
        help("Check the EngineConfig values against their documented ranges.")
    )]
    InvalidConfig { message: String },

    #[error("cannot create data directory \"{path}\"")]
    #[diagnostic(
        code(telos::engine::data_dir),
        help("Check that the parent directory exists and is writable.")
    )]
    DataDir { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::error::PlanError;

    #[test]
    fn plan_error_converts_to_top_level() {
        let err: TelosError = PlanError::DepthExceeded { depth: 4, max: 3 }.into();
        assert!(matches!(err, TelosError::Plan(_)));
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::Redb {
            message: "commit failed".into(),
        };
        assert!(err.to_string().contains("commit failed"));
    }
}
