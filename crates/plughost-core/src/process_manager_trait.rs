use crate::config::LauncherConfig;
use crate::process::ProcessHandle;
use crate::relay::RelayPair;
use crate::stdio::{HostStderr, HostStdout};
use anyhow::Result;
use async_trait::async_trait;

/// A plugin process whose output is already being relayed to the host.
pub struct LaunchedPlugin<H> {
    pub handle: H,
    pub relays: RelayPair,
}

/// High-level, configuration-aware plugin process orchestration.
///
/// Platform crates implement this on top of their low-level
/// [`ProcessManager`](crate::ProcessManager). Implementations must start both
/// output relays before `start_plugin` returns so nothing the plugin prints
/// during the RPC handshake is lost.
#[async_trait]
pub trait PluginProcessManager: Send + Sync {
    type Handle: ProcessHandle;

    fn new(config: &LauncherConfig) -> Self
    where
        Self: Sized;

    /// Spawn the configured plugin with `plugin_args()` and wire its stdout
    /// and stderr into two independently started relays bound to `out` and
    /// `err`.
    async fn start_plugin(
        &self,
        out: HostStdout,
        err: HostStderr,
    ) -> Result<LaunchedPlugin<Self::Handle>>;

    /// Terminate the plugin and everything it spawned, and stop tracking it.
    async fn terminate(&self, handle: &mut Self::Handle) -> Result<()>;

    /// Terminate every tracked plugin and release resources.
    async fn cleanup(&self) -> Result<()>;
}

/// Creates the plugin process manager for the current platform
pub trait PluginProcessManagerFactory {
    type Manager: PluginProcessManager;

    fn create_process_manager(config: &LauncherConfig) -> Self::Manager;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}
