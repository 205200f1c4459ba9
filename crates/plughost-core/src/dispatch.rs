use crate::config::LauncherConfig;
use crate::error::LauncherError;
use async_trait::async_trait;

/// Negotiates the RPC connection to a launched plugin and hands out the
/// client used to drive it.
///
/// The wire protocol belongs entirely to the implementation; the launcher
/// only guarantees that output relays are running before `dispense` is
/// called.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    type Client: Send + Sync;

    async fn dispense(&self, config: &LauncherConfig) -> Result<Self::Client, LauncherError>;

    /// Tear down the connection created by `dispense`.
    async fn release(&self, client: Self::Client) -> Result<(), LauncherError>;
}

/// Dispatcher for plugins that are only observed through their output.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedDispatcher;

#[async_trait]
impl Dispatcher for DetachedDispatcher {
    type Client = ();

    async fn dispense(&self, _config: &LauncherConfig) -> Result<(), LauncherError> {
        Ok(())
    }

    async fn release(&self, _client: ()) -> Result<(), LauncherError> {
        Ok(())
    }
}
