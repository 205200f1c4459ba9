use plughost_core::{LauncherConfig, PluginProcessManagerFactory};

/// Plugin process manager for the platform this crate was built for
#[cfg(unix)]
pub type PlatformPluginProcessManager = plughost_unix::UnixPluginProcessManager;

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformPluginProcessManagerFactory;

#[cfg(unix)]
impl PluginProcessManagerFactory for PlatformPluginProcessManagerFactory {
    type Manager = PlatformPluginProcessManager;

    fn create_process_manager(config: &LauncherConfig) -> Self::Manager {
        plughost_unix::UnixPluginProcessManagerFactory::create_process_manager(config)
    }

    fn platform_name() -> &'static str {
        plughost_unix::UnixPluginProcessManagerFactory::platform_name()
    }
}
