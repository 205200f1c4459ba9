use anyhow::{Context, Result};
use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use plughost_core::{
    ProcessHandle, ProcessId, ProcessLifecycle, ProcessManager, ProcessStatus, ProcessTermination,
    TerminationResult,
};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use sysinfo::System;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Unix-specific plugin process handle
pub struct UnixProcessHandle {
    child: Child,
    command: String,
    args: Vec<String>,
}

impl UnixProcessHandle {
    pub fn new(child: Child, command: String, args: Vec<String>) -> Self {
        Self {
            child,
            command,
            args,
        }
    }

    /// The underlying child, e.g. to take its piped descriptors.
    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }
}

#[async_trait]
impl ProcessHandle for UnixProcessHandle {
    fn get_pid(&self) -> Option<ProcessId> {
        self.child.id().map(ProcessId::from)
    }

    fn get_command(&self) -> &str {
        &self.command
    }

    fn get_args(&self) -> &[String] {
        &self.args
    }

    async fn is_running(&self) -> bool {
        match self.get_pid() {
            // Signal 0 only checks that the process exists
            Some(pid) => signal::kill(NixPid::from_raw(pid.0 as i32), None).is_ok(),
            None => false,
        }
    }

    async fn try_wait(&mut self) -> Result<Option<ProcessStatus>> {
        Ok(self.child.try_wait()?.map(ProcessStatus::Exited))
    }

    async fn wait(&mut self) -> Result<ProcessStatus> {
        let status = self.child.wait().await?;
        Ok(ProcessStatus::Exited(status))
    }

    async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to kill process: {}", e))
    }
}

/// Unix process manager with process group and process tree termination
pub struct UnixProcessManager {
    system: std::sync::Mutex<System>,
}

impl Default for UnixProcessManager {
    fn default() -> Self {
        <Self as ProcessManager>::new()
    }
}

#[async_trait]
impl ProcessLifecycle for UnixProcessManager {
    type Handle = UnixProcessHandle;

    async fn spawn_process(
        &self,
        command: &str,
        args: &[String],
        working_dir: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<UnixProcessHandle> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        // Own process group so the whole plugin tree can be signalled at once
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn plugin: {command}"))?;

        if let Some(pid) = child.id() {
            info!(pid, ?args, "Spawned plugin process: {command}");
        }

        Ok(UnixProcessHandle::new(
            child,
            command.to_string(),
            args.to_vec(),
        ))
    }
}

#[async_trait]
impl ProcessTermination for UnixProcessManager {
    async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult {
        send_signal(pid, Signal::SIGTERM)
    }

    async fn force_kill(&self, pid: ProcessId) -> TerminationResult {
        send_signal(pid, Signal::SIGKILL)
    }

    async fn find_child_processes(&self, parent_pid: ProcessId) -> Result<Vec<ProcessId>> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow::anyhow!("process table lock poisoned"))?;
        system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::All,
            true,
            sysinfo::ProcessRefreshKind::default(),
        );

        let mut children = Vec::new();
        find_children_recursive(&system, parent_pid.0, &mut children);

        Ok(children.into_iter().map(ProcessId::from).collect())
    }

    async fn terminate_process_tree(&self, root_pid: ProcessId) -> TerminationResult {
        info!("Terminating process tree for root PID {}", root_pid);

        let children = match self.find_child_processes(root_pid).await {
            Ok(children) => children,
            Err(e) => {
                warn!("Failed to find child processes for PID {}: {}", root_pid, e);
                return TerminationResult::Failed(format!("Failed to enumerate children: {e}"));
            }
        };

        if !children.is_empty() {
            debug!("Found {} child processes to terminate", children.len());

            // Descendants come first, so the tree is taken down bottom-up
            for child_pid in children {
                match self.terminate_single_process(child_pid).await {
                    TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                    result => {
                        warn!("Failed to terminate child process {}: {:?}", child_pid, result);
                    }
                }
            }
        }

        self.terminate_single_process(root_pid).await
    }

    async fn terminate_process_group(&self, pid: ProcessId) -> TerminationResult {
        let pgid = NixPid::from_raw(pid.0 as i32);

        match signal::killpg(pgid, Signal::SIGTERM) {
            Ok(()) => {
                info!("Sent SIGTERM to process group {}", pid);

                tokio::time::sleep(Duration::from_millis(2000)).await;

                match signal::killpg(pgid, Signal::SIGKILL) {
                    Ok(()) => {
                        info!("Sent SIGKILL to process group {}", pid);
                        TerminationResult::Success
                    }
                    Err(nix::errno::Errno::ESRCH) => TerminationResult::Success,
                    Err(e) => {
                        warn!("Failed to send SIGKILL to process group {}: {}", pid, e);
                        TerminationResult::Failed(format!("SIGKILL to process group failed: {e}"))
                    }
                }
            }
            Err(nix::errno::Errno::ESRCH) => {
                debug!("Process group {} not found (already terminated)", pid);
                TerminationResult::ProcessNotFound
            }
            Err(nix::errno::Errno::EPERM) => {
                warn!("Permission denied to terminate process group {}", pid);
                TerminationResult::AccessDenied
            }
            Err(e) => {
                warn!("Failed to send SIGTERM to process group {}: {}", pid, e);
                TerminationResult::Failed(format!("SIGTERM to process group failed: {e}"))
            }
        }
    }
}

#[async_trait]
impl ProcessManager for UnixProcessManager {
    fn new() -> Self {
        debug!("Initializing Unix process manager");
        Self {
            system: std::sync::Mutex::new(System::new()),
        }
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

impl UnixProcessManager {
    /// SIGTERM, a short pause, then SIGKILL if the process is still around
    async fn terminate_single_process(&self, pid: ProcessId) -> TerminationResult {
        match send_signal(pid, Signal::SIGTERM) {
            TerminationResult::Success => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                match send_signal(pid, Signal::SIGKILL) {
                    TerminationResult::ProcessNotFound => TerminationResult::Success,
                    result => result,
                }
            }
            TerminationResult::ProcessNotFound => TerminationResult::Success,
            result => result,
        }
    }
}

/// Signal every process in the group led by `pid`.
pub(crate) fn signal_group(pid: ProcessId, sig: Signal) -> TerminationResult {
    match signal::killpg(NixPid::from_raw(pid.0 as i32), sig) {
        Ok(()) => {
            debug!("Sent {} to process group {}", sig, pid);
            TerminationResult::Success
        }
        Err(nix::errno::Errno::ESRCH) => TerminationResult::ProcessNotFound,
        Err(nix::errno::Errno::EPERM) => TerminationResult::AccessDenied,
        Err(e) => TerminationResult::Failed(format!("{sig} to process group failed: {e}")),
    }
}

fn send_signal(pid: ProcessId, sig: Signal) -> TerminationResult {
    match signal::kill(NixPid::from_raw(pid.0 as i32), sig) {
        Ok(()) => {
            debug!("Sent {} to process {}", sig, pid);
            TerminationResult::Success
        }
        Err(nix::errno::Errno::ESRCH) => TerminationResult::ProcessNotFound,
        Err(nix::errno::Errno::EPERM) => {
            warn!("Permission denied to signal process {}", pid);
            TerminationResult::AccessDenied
        }
        Err(e) => {
            warn!("Failed to send {} to process {}: {}", sig, pid, e);
            TerminationResult::Failed(format!("{sig} failed: {e}"))
        }
    }
}

/// Collect all descendants of `parent_pid`, deepest first.
fn find_children_recursive(system: &System, parent_pid: u32, result: &mut Vec<u32>) {
    for (pid, process) in system.processes() {
        if process.parent().map(|ppid| ppid.as_u32()) == Some(parent_pid) {
            let child_pid = pid.as_u32();
            find_children_recursive(system, child_pid, result);
            result.push(child_pid);
        }
    }
}
