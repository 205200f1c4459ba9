use thiserror::Error;

/// Failure of a single stream relay, surfaced once through `StreamRelay::close`
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("failed to write plugin {stream} to host sink: {source}")]
    SinkWrite {
        stream: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("relay was closed before it was started")]
    NotStarted,

    #[error("relay loop for {0} exited without reporting completion")]
    Aborted(&'static str),
}

impl RelayError {
    /// The underlying sink error, if this relay failed while writing.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            RelayError::SinkWrite { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised while launching, connecting to or shutting down a plugin
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Plugin has not been launched")]
    NotLaunched,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Process management error: {0}")]
    ProcessError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Output relay failed: {0}")]
    Relay(#[from] RelayError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl LauncherError {
    pub fn connection_failed(message: impl Into<String>) -> Self {
        LauncherError::ConnectionFailed(message.into())
    }

    pub fn process_error(message: impl Into<String>) -> Self {
        LauncherError::ProcessError(message.into())
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        LauncherError::TransportError(message.into())
    }

    pub fn configuration_error(message: impl Into<String>) -> Self {
        LauncherError::ConfigurationError(message.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LauncherError::ConnectionFailed(_) | LauncherError::TransportError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categorization() {
        assert!(LauncherError::connection_failed("refused").is_retryable());
        assert!(LauncherError::transport_error("reset").is_retryable());

        assert!(!LauncherError::configuration_error("bad").is_retryable());
        assert!(!LauncherError::process_error("spawn").is_retryable());
        assert!(!LauncherError::NotLaunched.is_retryable());
    }

    #[test]
    fn test_relay_error_display() {
        let error = RelayError::SinkWrite {
            stream: "stderr",
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        };
        let display = format!("{error}");
        assert!(display.contains("stderr"));
        assert!(display.contains("pipe closed"));
        assert_eq!(
            error.io_error().map(std::io::Error::kind),
            Some(std::io::ErrorKind::BrokenPipe)
        );

        let wrapped: LauncherError = error.into();
        assert!(format!("{wrapped}").starts_with("Output relay failed"));
        assert!(!wrapped.is_retryable());
    }
}
