use crate::unix_process_manager::{UnixProcessHandle, UnixProcessManager, signal_group};
use anyhow::{Context, Result};
use async_trait::async_trait;
use nix::sys::signal::Signal;
use plughost_core::relay::RelayPair;
use plughost_core::{
    HostStderr, HostStdout, LaunchedPlugin, LauncherConfig, PluginProcessManager,
    PluginProcessManagerFactory, ProcessHandle, ProcessId, ProcessLifecycle, ProcessManager,
    ProcessTermination, TerminationResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// How long a plugin may take to exit after SIGTERM before escalating
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a terminated plugin gets to be reaped before we stop waiting
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Unix implementation of [`PluginProcessManager`].
///
/// Composes [`UnixProcessManager`] for signalling and adds plugin tracking,
/// output relay wiring and emergency cleanup on drop.
pub struct UnixPluginProcessManager {
    platform_manager: Arc<UnixProcessManager>,
    active_processes: Arc<Mutex<HashMap<ProcessId, String>>>,
    config: LauncherConfig,
}

impl UnixPluginProcessManager {
    fn track(&self, pid: ProcessId, label: String) {
        self.active_processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid, label);
    }

    fn untrack(&self, pid: ProcessId) {
        self.active_processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid);
    }

    fn tracked(&self) -> Vec<ProcessId> {
        self.active_processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Number of plugins currently tracked by this manager
    pub fn active_count(&self) -> usize {
        self.active_processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl PluginProcessManager for UnixPluginProcessManager {
    type Handle = UnixProcessHandle;

    fn new(config: &LauncherConfig) -> Self {
        Self {
            platform_manager: Arc::new(<UnixProcessManager as ProcessManager>::new()),
            active_processes: Arc::new(Mutex::new(HashMap::new())),
            config: config.clone(),
        }
    }

    async fn start_plugin(
        &self,
        out: HostStdout,
        err: HostStderr,
    ) -> Result<LaunchedPlugin<UnixProcessHandle>> {
        let command = &self.config.command;
        let args = self.config.plugin_args();

        let mut handle = self
            .platform_manager
            .spawn_process(
                command,
                &args,
                self.config.working_directory.as_deref(),
                &self.config.env,
            )
            .await
            .with_context(|| format!("Failed to start plugin with command: {command}"))?;

        let relays = RelayPair::from_child(handle.child_mut(), out, err, &self.config.relay)?;

        if let Some(pid) = handle.get_pid() {
            self.track(pid, format!("plugin:{}", self.config.name));
        }

        Ok(LaunchedPlugin { handle, relays })
    }

    async fn terminate(&self, handle: &mut UnixProcessHandle) -> Result<()> {
        let Some(pid) = handle.get_pid() else {
            return Ok(());
        };

        if let Some(status) = handle.try_wait().await? {
            tracing::debug!(%pid, ?status, "Plugin already exited");
            self.untrack(pid);
            return Ok(());
        }

        // Give the plugin a chance to print its last output and exit
        if signal_group(pid, Signal::SIGTERM) == TerminationResult::Success {
            if let Ok(status) = tokio::time::timeout(STOP_TIMEOUT, handle.wait()).await {
                tracing::info!(%pid, ?status, "Plugin exited after SIGTERM");
                // Descendants that ignored SIGTERM would keep the pipes open
                signal_group(pid, Signal::SIGKILL);
                self.untrack(pid);
                return Ok(());
            }
        }

        match self.platform_manager.terminate_completely(pid).await {
            TerminationResult::Success | TerminationResult::ProcessNotFound => {
                tracing::info!("Terminated plugin process tree for PID {}", pid);
            }
            other => {
                tracing::warn!("Failed to terminate plugin {}: {:?}", pid, other);
                handle.kill().await?;
            }
        }

        self.platform_manager
            .wait_for_exit(handle, Some(REAP_TIMEOUT))
            .await?;
        self.untrack(pid);
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        for pid in self.tracked() {
            match self.platform_manager.terminate_process_tree(pid).await {
                TerminationResult::Success => {
                    tracing::info!("Successfully terminated process tree for PID {}", pid);
                }
                TerminationResult::ProcessNotFound => {
                    tracing::info!("Process {} already terminated", pid);
                }
                other => {
                    tracing::warn!("Failed to terminate process {}: {:?}", pid, other);
                }
            }
        }

        self.active_processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        self.platform_manager.cleanup().await
    }
}

impl Drop for UnixPluginProcessManager {
    fn drop(&mut self) {
        let active_processes = self.tracked();

        if !active_processes.is_empty() {
            tracing::warn!(
                "Emergency cleanup: terminating {} plugins during drop",
                active_processes.len()
            );

            for pid in active_processes {
                use nix::sys::signal::{self, Signal};
                use nix::unistd::Pid as NixPid;

                let nix_pid = NixPid::from_raw(pid.0 as i32);

                if let Err(e) = signal::kill(nix_pid, Signal::SIGTERM) {
                    tracing::warn!("Failed to send SIGTERM to plugin {} during drop: {}", pid, e);

                    if let Err(e) = signal::kill(nix_pid, Signal::SIGKILL) {
                        tracing::error!(
                            "Failed to send SIGKILL to plugin {} during drop: {}",
                            pid,
                            e
                        );
                    }
                }
            }
        }
    }
}

/// Factory for creating Unix plugin process managers
pub struct UnixPluginProcessManagerFactory;

impl PluginProcessManagerFactory for UnixPluginProcessManagerFactory {
    type Manager = UnixPluginProcessManager;

    fn create_process_manager(config: &LauncherConfig) -> Self::Manager {
        UnixPluginProcessManager::new(config)
    }

    fn platform_name() -> &'static str {
        "Unix"
    }
}
