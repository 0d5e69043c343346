use thiserror::Error;

/// Application-wide error type - single point of truth
#[derive(Error, Debug)]
pub enum AppError {
    /// Bitcoin RPC operations
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// File I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV report writing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration issues
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or unusable address list
    #[error("Input error: {0}")]
    Input(String),

    /// Data validation/parsing
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// RPC error types
#[derive(Error, Debug)]
pub enum RpcError {
    /// Failed to establish connection to Bitcoin Core RPC server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// RPC method call failed (covers network errors, authentication, etc.)
    #[error("RPC call failed: {method} - {message}")]
    CallFailed { method: String, message: String },

    /// Retry limit exceeded for RPC operation
    #[error("Max retries exceeded: {operation} after {attempts} attempts ({last_error})")]
    MaxRetriesExceeded {
        operation: String,
        attempts: usize,
        last_error: String,
    },

    /// RPC request timed out
    #[error("Request timeout: {timeout_seconds}s for {operation}")]
    Timeout {
        timeout_seconds: u64,
        operation: String,
    },

    /// RPC returned unexpected or malformed response data
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The node kept reporting a running UTXO scan after we asked it to abort
    #[error("UTXO scan still in progress after {waited_seconds}s")]
    ScanInProgress { waited_seconds: u64 },
}

/// Message fragments that mark a call failure as worth retrying.
const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "connection aborted",
    "broken pipe",
    "transport",
    "http",
    "socket",
    "scan already in progress",
    "loading block index",
    "verifying blocks",
    "rewinding blocks",
    "warmup",
];

/// Message fragments that mark a call failure as an expired deadline.
const TIMEOUT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "resource temporarily unavailable",
    "would block",
];

impl RpcError {
    /// Whether another attempt at the same call could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::ConnectionFailed(_) | RpcError::Timeout { .. } => true,
            RpcError::ScanInProgress { .. } => true,
            RpcError::CallFailed { message, .. } => {
                let message = message.to_lowercase();
                TRANSIENT_MARKERS
                    .iter()
                    .any(|marker| message.contains(marker))
            }
            RpcError::MaxRetriesExceeded { .. } | RpcError::InvalidResponse(_) => false,
        }
    }

    /// Whether the call hit a deadline; the node may still be working on it
    pub fn is_timeout(&self) -> bool {
        match self {
            RpcError::Timeout { .. } => true,
            RpcError::CallFailed { message, .. } => {
                let message = message.to_lowercase();
                TIMEOUT_MARKERS.iter().any(|marker| message.contains(marker))
            }
            _ => false,
        }
    }
}

/// Application-wide result type - single point of truth
pub type AppResult<T> = Result<T, AppError>;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidData(format!("JSON error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
