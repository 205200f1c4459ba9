use super::transport_manager::TransportManager;
use crate::PlughostError;
use plughost_core::{LauncherConfig, LauncherError};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ClientInfo, InitializeRequestParam, ListToolsResult,
    ServerInfo,
};
use rmcp::{RoleClient, ServiceExt, service::RunningService};
use tracing::{debug, info, warn};

/// MCP session with one plugin
pub struct ServiceCoordinator {
    service: RunningService<RoleClient, InitializeRequestParam>,
}

impl ServiceCoordinator {
    pub async fn new(
        transport_manager: TransportManager,
        config: &LauncherConfig,
    ) -> Result<Self, LauncherError> {
        let service = host_identity(config)
            .serve(transport_manager.into_transport())
            .await
            .map_err(|e| LauncherError::transport_error(format!("MCP handshake failed: {e}")))?;

        info!(plugin = %config.name, "MCP session established");
        Ok(Self { service })
    }

    pub async fn list_tools(&self) -> Result<ListToolsResult, PlughostError> {
        Ok(self.service.list_tools(Default::default()).await?)
    }

    pub async fn call_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, PlughostError> {
        debug!(tool = %request.name, "Calling plugin tool");
        Ok(self.service.call_tool(request).await?)
    }

    /// Server information reported by the plugin during the handshake
    pub fn peer_info(&self) -> Option<&ServerInfo> {
        self.service.peer_info()
    }

    /// End the session; the plugin process itself is left running
    pub async fn cancel(self) -> Result<(), LauncherError> {
        self.service.cancel().await.map(drop).map_err(|e| {
            warn!(error = %e, "Failed to cancel MCP session");
            LauncherError::transport_error(format!("Failed to cancel MCP session: {e}"))
        })
    }
}

/// The plugin sees the host under the configured plugin name and version
fn host_identity(config: &LauncherConfig) -> ClientInfo {
    ClientInfo {
        protocol_version: rmcp::model::ProtocolVersion::default(),
        capabilities: rmcp::model::ClientCapabilities::default(),
        client_info: rmcp::model::Implementation {
            name: config.name.to_string(),
            version: config.version.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_identity_uses_plugin_name_and_version() {
        let config = LauncherConfig::builder()
            .name("resizer")
            .version("2.1.0")
            .command("resizer-plugin")
            .build()
            .unwrap();

        let info = host_identity(&config);
        assert_eq!(info.client_info.name, "resizer");
        assert_eq!(info.client_info.version, "2.1.0");
    }
}
