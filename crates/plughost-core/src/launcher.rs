use crate::config::{LauncherConfig, RetryConfig};
use crate::dispatch::Dispatcher;
use crate::error::LauncherError;
use crate::process::{ProcessHandle, ProcessId};
use crate::process_manager_trait::{LaunchedPlugin, PluginProcessManager};
use crate::relay::RelayPair;
use crate::stdio::{HostStderr, HostStdout};
use backon::{ExponentialBuilder, Retryable};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Unlaunched;

pub struct Launched;

pub struct Connected;

/// Launches a plugin, relays its output and connects to it.
///
/// ```text
/// PluginLauncher<Unlaunched> --launch()--> PluginLauncher<Launched>
///                            --connect()--> PluginLauncher<Connected>
/// ```
pub struct PluginLauncher<Status, Manager, D>
where
    Manager: PluginProcessManager,
    D: Dispatcher,
{
    config: LauncherConfig,
    process_manager: Arc<Manager>,
    dispatcher: Arc<D>,
    out: HostStdout,
    err: HostStderr,
    plugin: Option<LaunchedPlugin<Manager::Handle>>,
    client: Option<D::Client>,
    retry: ExponentialBuilder,
    _status: PhantomData<Status>,
}

impl<Manager, D> PluginLauncher<Unlaunched, Manager, D>
where
    Manager: PluginProcessManager,
    D: Dispatcher,
{
    /// Relay plugin output to the host's own stdout and stderr.
    pub fn new(config: LauncherConfig, process_manager: Arc<Manager>, dispatcher: D) -> Self {
        Self::new_with_sinks(
            config,
            process_manager,
            dispatcher,
            HostStdout::default(),
            HostStderr::default(),
        )
    }

    pub fn new_with_sinks(
        config: LauncherConfig,
        process_manager: Arc<Manager>,
        dispatcher: D,
        out: HostStdout,
        err: HostStderr,
    ) -> Self {
        Self {
            retry: create_retry_strategy(&config.retry_config),
            config,
            process_manager,
            dispatcher: Arc::new(dispatcher),
            out,
            err,
            plugin: None,
            client: None,
            _status: PhantomData,
        }
    }

    /// Spawn the plugin with both output relays running.
    pub async fn launch(mut self) -> Result<PluginLauncher<Launched, Manager, D>, LauncherError> {
        self.config
            .validate()
            .map_err(|e| LauncherError::configuration_error(e.to_string()))?;

        info!(
            plugin = %self.config.name,
            command = %self.config.command,
            verbose = self.config.verbose,
            "Launching plugin"
        );

        let plugin = self
            .process_manager
            .start_plugin(self.out.clone(), self.err.clone())
            .await
            .map_err(|e| LauncherError::process_error(format!("Failed to start plugin: {e:#}")))?;

        self.plugin = Some(plugin);
        Ok(self.transition())
    }
}

impl<Manager, D> PluginLauncher<Launched, Manager, D>
where
    Manager: PluginProcessManager,
    D: Dispatcher,
{
    /// Hand the running plugin to the dispatcher, retrying retryable
    /// failures. The plugin is shut down if no client can be obtained.
    pub async fn connect(mut self) -> Result<PluginLauncher<Connected, Manager, D>, LauncherError> {
        let dispatcher: &D = &self.dispatcher;
        let config = &self.config;
        let dispensed = (move || dispatcher.dispense(config))
            .retry(self.retry)
            .when(|e: &LauncherError| e.is_retryable())
            .notify(|e, delay| warn!("Connecting to plugin failed, retrying in {delay:?}: {e}"))
            .await;

        match dispensed {
            Ok(client) => {
                info!(plugin = %self.config.name, "Connected to plugin");
                self.client = Some(client);
                Ok(self.transition())
            }
            Err(e) => {
                warn!(plugin = %self.config.name, "Giving up on plugin connection: {e}");
                if let Err(stop_error) = self.stop().await {
                    warn!("Failed to stop plugin after connection failure: {stop_error}");
                }
                Err(e)
            }
        }
    }

    pub async fn shutdown(self) -> Result<(), LauncherError> {
        self.stop().await
    }
}

impl<Manager, D> PluginLauncher<Connected, Manager, D>
where
    Manager: PluginProcessManager,
    D: Dispatcher,
{
    pub fn client(&self) -> Option<&D::Client> {
        self.client.as_ref()
    }

    /// Release the RPC client, stop the plugin and wait for its output to
    /// drain.
    pub async fn shutdown(mut self) -> Result<(), LauncherError> {
        if let Some(client) = self.client.take() {
            if let Err(e) = self.dispatcher.release(client).await {
                warn!(plugin = %self.config.name, "Failed to release plugin client: {e}");
            }
        }
        self.stop().await
    }
}

impl<Status, Manager, D> PluginLauncher<Status, Manager, D>
where
    Manager: PluginProcessManager,
    D: Dispatcher,
{
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn pid(&self) -> Option<ProcessId> {
        self.plugin.as_ref().and_then(|p| p.handle.get_pid())
    }

    pub fn relays(&self) -> Option<&RelayPair> {
        self.plugin.as_ref().map(|p| &p.relays)
    }

    fn transition<Next>(self) -> PluginLauncher<Next, Manager, D> {
        PluginLauncher {
            config: self.config,
            process_manager: self.process_manager,
            dispatcher: self.dispatcher,
            out: self.out,
            err: self.err,
            plugin: self.plugin,
            client: self.client,
            retry: self.retry,
            _status: PhantomData,
        }
    }

    /// Ask the plugin to stop, let its remaining output (ideally ending in
    /// the marker) drain through the relays, then release process resources.
    ///
    /// Every step runs even if an earlier one failed. Errors are reported in
    /// a fixed order: relay, termination, cleanup.
    async fn stop(self) -> Result<(), LauncherError> {
        let Some(LaunchedPlugin {
            mut handle,
            relays,
        }) = self.plugin
        else {
            return Err(LauncherError::NotLaunched);
        };

        let terminated = self
            .process_manager
            .terminate(&mut handle)
            .await
            .map_err(|e| LauncherError::process_error(format!("Failed to stop plugin: {e:#}")));

        let drained = relays.close().await.map_err(LauncherError::from);

        let cleaned = self
            .process_manager
            .cleanup()
            .await
            .map_err(|e| LauncherError::process_error(format!("Failed to clean up: {e:#}")));

        info!(plugin = %self.config.name, "Plugin stopped");
        drained.and(terminated).and(cleaned)
    }
}

/// Creates a configured retry strategy from the retry configuration
fn create_retry_strategy(retry_config: &RetryConfig) -> ExponentialBuilder {
    let mut retry_builder = ExponentialBuilder::default()
        .with_min_delay(retry_config.min_delay())
        .with_max_delay(retry_config.max_delay())
        .with_max_times(retry_config.max_attempts.saturating_sub(1) as usize);

    if retry_config.jitter_factor > 0.0 {
        retry_builder = retry_builder.with_jitter();
    }

    retry_builder
}
