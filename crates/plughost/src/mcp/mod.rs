mod service_coordinator;
mod transport_manager;

pub use service_coordinator::ServiceCoordinator;
pub use transport_manager::{Readiness, TransportManager};

use async_trait::async_trait;
use plughost_core::{Dispatcher, LauncherConfig, LauncherError};

/// Connects to plugins that serve MCP over SSE.
///
/// The plugin keeps its stdout and stderr for output, which the launcher
/// relays to the host while this dispatcher talks to the configured URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct McpDispatcher {
    readiness: Readiness,
}

impl McpDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }
}

#[async_trait]
impl Dispatcher for McpDispatcher {
    type Client = ServiceCoordinator;

    async fn dispense(&self, config: &LauncherConfig) -> Result<ServiceCoordinator, LauncherError> {
        let transport = TransportManager::new(config, self.readiness).await?;
        ServiceCoordinator::new(transport, config).await
    }

    async fn release(&self, client: ServiceCoordinator) -> Result<(), LauncherError> {
        client.cancel().await
    }
}
