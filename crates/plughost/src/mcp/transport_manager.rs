use backon::{ExponentialBuilder, Retryable};
use plughost_core::{LauncherConfig, LauncherError, Transport};
use rmcp::ServiceExt;
use rmcp::model::ClientInfo;
use rmcp::transport::SseClientTransport;
use std::time::Duration;
use tracing::{info, warn};

/// How long to wait for a freshly launched plugin to answer on its endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readiness {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(1000),
        }
    }
}

/// Opens the SSE transport to a launched plugin once it answers requests
pub struct TransportManager {
    transport: SseClientTransport<reqwest::Client>,
}

impl TransportManager {
    pub async fn new(config: &LauncherConfig, readiness: Readiness) -> Result<Self, LauncherError> {
        match &config.transport {
            Transport::Detached => Err(LauncherError::configuration_error(
                "plugin transport is detached, there is no RPC endpoint to connect to",
            )),
            Transport::Sse { url } => {
                info!(url = %url, "Creating SSE transport for plugin");
                Self::create_sse_transport(url, readiness).await
            }
        }
    }

    async fn create_sse_transport(url: &str, readiness: Readiness) -> Result<Self, LauncherError> {
        Self::poll_server_readiness(url, readiness).await?;

        let transport = SseClientTransport::start(url.to_string())
            .await
            .map_err(|e| {
                LauncherError::connection_failed(format!("Failed to open SSE stream at {url}: {e}"))
            })?;

        info!("SSE transport created successfully");
        Ok(Self { transport })
    }

    /// Poll the endpoint with `list_tools` until it answers
    async fn poll_server_readiness(url: &str, readiness: Readiness) -> Result<(), LauncherError> {
        info!(
            "Polling plugin readiness at {} (max {} attempts, {:?} interval)",
            url, readiness.max_attempts, readiness.interval
        );

        let poll = ExponentialBuilder::new()
            .with_jitter()
            .with_factor(1.0)
            .with_max_times(readiness.max_attempts.saturating_sub(1) as usize)
            .with_min_delay(readiness.interval)
            .with_max_delay(readiness.interval.max(Duration::from_secs(1)));

        (|| Self::test_server_connectivity(url))
            .retry(poll)
            .when(|e: &LauncherError| e.is_retryable())
            .await
    }

    async fn test_server_connectivity(url: &str) -> Result<(), LauncherError> {
        let check_transport = SseClientTransport::start(url.to_string())
            .await
            .map_err(|e| LauncherError::connection_failed(format!("{url} is not reachable: {e}")))?;

        let client_info = ClientInfo {
            protocol_version: rmcp::model::ProtocolVersion::default(),
            capabilities: rmcp::model::ClientCapabilities::default(),
            client_info: rmcp::model::Implementation {
                name: "plughost-readiness-check".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let service = client_info
            .serve(check_transport)
            .await
            .map_err(|e| LauncherError::connection_failed(format!("Handshake failed: {e}")))?;

        service
            .list_tools(Default::default())
            .await
            .map_err(|e| LauncherError::connection_failed(format!("Plugin not ready: {e}")))?;

        if let Err(e) = service.cancel().await {
            warn!(error = %e, "Failed to cancel readiness check");
        }

        info!("Plugin is ready and responding to list_tools");
        Ok(())
    }

    /// Consumes the manager and returns the transport for service creation
    pub fn into_transport(self) -> SseClientTransport<reqwest::Client> {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(transport: Transport) -> LauncherConfig {
        LauncherConfig::builder()
            .name("endpoint")
            .version("0.1")
            .command("plugin")
            .transport(transport)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_detached_transport_is_not_retried() {
        let result = TransportManager::new(&config(Transport::Detached), Readiness::default()).await;
        let Err(error) = result else {
            panic!("detached transport must not connect");
        };
        assert!(matches!(error, LauncherError::ConfigurationError(_)));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retryable() {
        let readiness = Readiness {
            max_attempts: 2,
            interval: Duration::from_millis(10),
        };
        let transport = Transport::Sse {
            url: "http://127.0.0.1:9/sse".to_string(),
        };

        let result = TransportManager::new(&config(transport), readiness).await;
        let Err(error) = result else {
            panic!("nothing listens on the discard port");
        };
        assert!(matches!(error, LauncherError::ConnectionFailed(_)));
        assert!(error.is_retryable());
    }
}
