use derive_more::From;
use plughost_core::LauncherError;
use thiserror::Error;

/// Errors surfaced by the high-level plugin host
#[derive(Error, Debug, From)]
pub enum PlughostError {
    #[error(transparent)]
    Launcher(LauncherError),

    #[error("MCP operation failed: {0}")]
    McpOperationFailed(rmcp::ServiceError),
}

impl PlughostError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PlughostError::Launcher(e) => e.is_retryable(),
            PlughostError::McpOperationFailed(_) => false,
        }
    }
}
