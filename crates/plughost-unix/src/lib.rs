//! Unix process management for plughost
//!
//! Plugins are spawned into their own process group with piped output, so
//! shutdown can signal the whole tree they started.
#![cfg(unix)]

mod plugin_process_manager;
mod unix_process_manager;

pub use plugin_process_manager::{UnixPluginProcessManager, UnixPluginProcessManagerFactory};
pub use unix_process_manager::{UnixProcessHandle, UnixProcessManager};

/// Factory for the low-level Unix process manager
pub struct UnixProcessManagerFactory;

impl UnixProcessManagerFactory {
    pub fn create_process_manager() -> UnixProcessManager {
        UnixProcessManager::default()
    }

    pub fn platform_name() -> &'static str {
        "Unix"
    }
}
