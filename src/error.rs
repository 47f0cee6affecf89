use thiserror::Error;

/// Main error type for Graphscope
#[derive(Error, Debug)]
pub enum GraphscopeError {
    /// Requested depth outside the supported 1..=3 range
    #[error("Invalid depth: {0} (expected 1 to 3)")]
    InvalidDepth(i64),

    /// Graph store could not be reached or failed mid-query
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GraphscopeError {
    /// True when the failure originates in the graph store rather than the caller.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            GraphscopeError::BackendUnavailable(_) | GraphscopeError::Database(_)
        )
    }

    /// Process exit code used by the CLI surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            GraphscopeError::InvalidDepth(_) | GraphscopeError::InvalidInput(_) => 2,
            e if e.is_backend_failure() => 3,
            _ => 1,
        }
    }
}

/// Convenient Result type using GraphscopeError
pub type Result<T> = std::result::Result<T, GraphscopeError>;
