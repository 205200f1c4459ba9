//! plughost - launch plugin processes, relay their output and talk to them
//!
//! ```no_run
//! # async fn run() -> Result<(), plughost::PlughostError> {
//! use plughost::{LauncherConfig, Plughost, Transport};
//!
//! let config = LauncherConfig::builder()
//!     .name("resizer")
//!     .version("0.1.0")
//!     .command("./resizer-plugin")
//!     .verbose(true)
//!     .transport(Transport::Sse {
//!         url: "http://127.0.0.1:8000/sse".to_string(),
//!     })
//!     .build()
//!     .expect("valid config");
//!
//! let plugin = Plughost::new(config).connect().await?;
//! println!("{:?}", plugin.list_tools().await?);
//! plugin.cancel().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod factory;
mod logging;
pub mod mcp;

pub use error::PlughostError;
pub use factory::*;
pub use logging::init_tracing;
pub use mcp::{McpDispatcher, Readiness, ServiceCoordinator};

// Re-export core functionality
pub use plughost_core::*;

#[cfg(unix)]
pub use platform::*;

#[cfg(unix)]
mod platform {
    use super::*;
    use std::sync::Arc;

    /// Launcher bound to this platform's process manager
    pub type PlatformLauncher<Status, D> = PluginLauncher<Status, PlatformPluginProcessManager, D>;

    /// Launcher relaying plugin output to the host's own stdout and stderr
    pub fn launcher<D: Dispatcher>(
        config: LauncherConfig,
        dispatcher: D,
    ) -> PlatformLauncher<Unlaunched, D> {
        let manager = Arc::new(PlatformPluginProcessManagerFactory::create_process_manager(
            &config,
        ));
        PluginLauncher::new(config, manager, dispatcher)
    }

    /// Launcher relaying plugin output to the given sinks
    pub fn launcher_with_sinks<D: Dispatcher>(
        config: LauncherConfig,
        dispatcher: D,
        out: HostStdout,
        err: HostStderr,
    ) -> PlatformLauncher<Unlaunched, D> {
        let manager = Arc::new(PlatformPluginProcessManagerFactory::create_process_manager(
            &config,
        ));
        PluginLauncher::new_with_sinks(config, manager, dispatcher, out, err)
    }

    /// An MCP plugin that has not been started yet
    pub struct Plughost {
        inner: PlatformLauncher<Unlaunched, McpDispatcher>,
    }

    impl Plughost {
        pub fn new(config: LauncherConfig) -> Self {
            Self {
                inner: launcher(config, McpDispatcher::new()),
            }
        }

        pub fn with_launcher(inner: PlatformLauncher<Unlaunched, McpDispatcher>) -> Self {
            Self { inner }
        }

        /// Start the plugin with its output relayed, then open the MCP session
        pub async fn connect(self) -> Result<ConnectedPlughost, PlughostError> {
            tracing::debug!(
                platform = PlatformPluginProcessManagerFactory::platform_name(),
                "Starting plugin host"
            );
            let connected = self.inner.launch().await?.connect().await?;
            Ok(ConnectedPlughost { inner: connected })
        }
    }

    /// A running MCP plugin
    pub struct ConnectedPlughost {
        inner: PlatformLauncher<Connected, McpDispatcher>,
    }

    impl ConnectedPlughost {
        fn service(&self) -> Result<&ServiceCoordinator, PlughostError> {
            self.inner
                .client()
                .ok_or_else(|| LauncherError::connection_failed("MCP session is gone").into())
        }

        pub async fn list_tools(&self) -> Result<rmcp::model::ListToolsResult, PlughostError> {
            self.service()?.list_tools().await
        }

        pub async fn call_tool(
            &self,
            request: rmcp::model::CallToolRequestParam,
        ) -> Result<rmcp::model::CallToolResult, PlughostError> {
            self.service()?.call_tool(request).await
        }

        pub fn peer_info(&self) -> Option<&rmcp::model::ServerInfo> {
            self.inner.client().and_then(ServiceCoordinator::peer_info)
        }

        pub fn pid(&self) -> Option<ProcessId> {
            self.inner.pid()
        }

        /// Close the session, drain the plugin's output and stop it
        pub async fn cancel(self) -> Result<(), PlughostError> {
            Ok(self.inner.shutdown().await?)
        }
    }
}
