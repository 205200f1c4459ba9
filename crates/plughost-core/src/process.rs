use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Unique identifier for a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::From)]
pub struct ProcessId(pub u32);

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a plugin process
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessStatus {
    /// Process is currently running
    Running,
    /// Process exited with status information
    Exited(std::process::ExitStatus),
    /// Process was terminated by a signal or forcibly killed
    Terminated,
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Insufficient privileges to signal the process
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

/// Handle to a spawned plugin process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None if process has exited)
    fn get_pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn get_command(&self) -> &str;

    /// Get the arguments passed to this process
    fn get_args(&self) -> &[String];

    /// Check if the process is still running (non-blocking)
    async fn is_running(&self) -> bool;

    /// Try to get exit status without blocking
    async fn try_wait(&mut self) -> Result<Option<ProcessStatus>>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ProcessStatus>;

    /// Kill the process
    async fn kill(&mut self) -> Result<()>;
}

/// Spawning and waiting on plugin processes
#[async_trait]
pub trait ProcessLifecycle: Send + Sync {
    type Handle: ProcessHandle;

    /// Spawn `command` with its stdout and stderr piped back to the host.
    async fn spawn_process(
        &self,
        command: &str,
        args: &[String],
        working_dir: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<Self::Handle>;

    /// Wait for a process to exit with optional timeout
    async fn wait_for_exit(
        &self,
        handle: &mut Self::Handle,
        timeout: Option<Duration>,
    ) -> Result<ProcessStatus> {
        match timeout {
            Some(duration) => tokio::time::timeout(duration, handle.wait())
                .await
                .map_err(|_| anyhow::anyhow!("Timeout waiting for process exit"))?,
            None => handle.wait().await,
        }
    }
}

/// Termination of plugin processes and everything they started
#[async_trait]
pub trait ProcessTermination: Send + Sync {
    /// Ask a single process to exit (SIGTERM on Unix)
    async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult;

    /// Force kill a single process (SIGKILL on Unix)
    async fn force_kill(&self, pid: ProcessId) -> TerminationResult;

    /// Find all descendants of a given process
    async fn find_child_processes(&self, pid: ProcessId) -> Result<Vec<ProcessId>>;

    /// Terminate a process and all of its descendants
    async fn terminate_process_tree(&self, root_pid: ProcessId) -> TerminationResult;

    /// Terminate the process group led by `pid`
    async fn terminate_process_group(&self, pid: ProcessId) -> TerminationResult;

    /// Process group, then process tree, then the process itself.
    async fn terminate_completely(&self, pid: ProcessId) -> TerminationResult {
        if self.terminate_process_group(pid).await == TerminationResult::Success {
            return TerminationResult::Success;
        }

        if self.terminate_process_tree(pid).await == TerminationResult::Success {
            return TerminationResult::Success;
        }

        match self.terminate_gracefully(pid).await {
            TerminationResult::ProcessNotFound => TerminationResult::Success,
            TerminationResult::Success => {
                tokio::time::sleep(Duration::from_millis(1000)).await;
                match self.force_kill(pid).await {
                    TerminationResult::ProcessNotFound => TerminationResult::Success,
                    result => result,
                }
            }
            _ => self.force_kill(pid).await,
        }
    }
}

/// Low-level process manager combining lifecycle and termination
#[async_trait]
pub trait ProcessManager: ProcessLifecycle + ProcessTermination {
    fn new() -> Self
    where
        Self: Sized;

    /// Release any resources held by the manager
    async fn cleanup(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the termination steps that were attempted.
    struct ScriptedTermination {
        group: TerminationResult,
        tree: TerminationResult,
        steps: Mutex<Vec<&'static str>>,
    }

    impl ScriptedTermination {
        fn new(group: TerminationResult, tree: TerminationResult) -> Self {
            Self {
                group,
                tree,
                steps: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, step: &'static str) {
            self.steps.lock().unwrap().push(step);
        }
    }

    #[async_trait]
    impl ProcessTermination for ScriptedTermination {
        async fn terminate_gracefully(&self, _pid: ProcessId) -> TerminationResult {
            self.record("term");
            TerminationResult::Success
        }

        async fn force_kill(&self, _pid: ProcessId) -> TerminationResult {
            self.record("kill");
            TerminationResult::ProcessNotFound
        }

        async fn find_child_processes(&self, _pid: ProcessId) -> Result<Vec<ProcessId>> {
            Ok(Vec::new())
        }

        async fn terminate_process_tree(&self, _root_pid: ProcessId) -> TerminationResult {
            self.record("tree");
            self.tree.clone()
        }

        async fn terminate_process_group(&self, _pid: ProcessId) -> TerminationResult {
            self.record("group");
            self.group.clone()
        }
    }

    #[tokio::test]
    async fn test_group_termination_short_circuits() {
        let manager = ScriptedTermination::new(TerminationResult::Success, TerminationResult::Success);
        let result = manager.terminate_completely(ProcessId(42)).await;

        assert_eq!(result, TerminationResult::Success);
        assert_eq!(*manager.steps.lock().unwrap(), vec!["group"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalates_to_single_process() {
        let manager = ScriptedTermination::new(
            TerminationResult::AccessDenied,
            TerminationResult::Failed("no tree".to_string()),
        );
        let result = manager.terminate_completely(ProcessId(42)).await;

        assert_eq!(result, TerminationResult::Success);
        assert_eq!(
            *manager.steps.lock().unwrap(),
            vec!["group", "tree", "term", "kill"]
        );
    }

    #[test]
    fn test_process_id_display() {
        assert_eq!(ProcessId::from(7).to_string(), "7");
    }
}
