//! Error types for the ENSEMBLE core library.

use thiserror::Error;

/// Top-level error type for registry and configuration operations.
///
/// Decision-path failures never use this type: inference and parsing errors
/// are absorbed by the fallback policy, and per-agent failures are reported
/// as data in the turn result.
#[derive(Error, Debug)]
pub enum EnsembleError {
    /// An agent with this ID is already registered.
    #[error("Agent already registered: {0}")]
    AlreadyRegistered(crate::AgentId),

    /// No agent with this ID is registered.
    #[error("Agent not found: {0}")]
    AgentNotFound(crate::AgentId),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, EnsembleError>;
