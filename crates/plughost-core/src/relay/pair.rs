use super::pump::pump;
use super::stream_relay::StreamRelay;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::stdio::{HostStderr, HostStdout};
use anyhow::Context;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// The two relays of a running plugin, one per output stream, together with
/// the tasks copying the plugin's descriptors into them.
pub struct RelayPair {
    stdout: StreamRelay,
    stderr: StreamRelay,
    stdout_pump: JoinHandle<std::io::Result<u64>>,
    stderr_pump: JoinHandle<std::io::Result<u64>>,
    grace_period: Duration,
    poll_interval: Duration,
}

impl RelayPair {
    /// Wire the piped stdout and stderr of `child` into freshly started relays.
    pub fn from_child(
        child: &mut Child,
        out: HostStdout,
        err: HostStderr,
        config: &RelayConfig,
    ) -> anyhow::Result<Self> {
        let stdout = child
            .stdout
            .take()
            .context("plugin stdout was not piped")?;
        let stderr = child
            .stderr
            .take()
            .context("plugin stderr was not piped")?;

        Ok(Self::from_readers(stdout, stderr, out, err, config))
    }

    pub fn from_readers<O, E>(
        stdout: O,
        stderr: E,
        out: HostStdout,
        err: HostStderr,
        config: &RelayConfig,
    ) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let mut stdout_relay = StreamRelay::new(out, config.clone());
        let mut stderr_relay = StreamRelay::new(err, config.clone());
        stdout_relay.start();
        stderr_relay.start();

        let stdout_pump = pump(stdout, stdout_relay.writer(), stdout_relay.label());
        let stderr_pump = pump(stderr, stderr_relay.writer(), stderr_relay.label());

        Self {
            stdout: stdout_relay,
            stderr: stderr_relay,
            stdout_pump,
            stderr_pump,
            grace_period: config.grace_period(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn stdout(&self) -> &StreamRelay {
        &self.stdout
    }

    pub fn stderr(&self) -> &StreamRelay {
        &self.stderr
    }

    /// Both streams have either hit EOF or already carried the marker.
    fn settled(&self) -> bool {
        (self.stdout_pump.is_finished() || self.stdout.marker_seen())
            && (self.stderr_pump.is_finished() || self.stderr.marker_seen())
    }

    /// Wait for the plugin's output to be exhausted, then close both relays
    /// concurrently and stop copying.
    ///
    /// Waiting ends early once each stream has carried the marker, and never
    /// lasts longer than the grace period. Returns the stdout error first if
    /// both relays failed.
    pub async fn close(self) -> Result<(), RelayError> {
        info!("Waiting for plugin output to drain");
        let deadline = Instant::now() + self.grace_period;
        while !self.settled() && Instant::now() < deadline {
            tokio::time::sleep(self.poll_interval).await;
        }

        let RelayPair {
            stdout,
            stderr,
            stdout_pump,
            stderr_pump,
            ..
        } = self;

        let (out, err) = tokio::join!(stdout.close(), stderr.close());

        for pump in [stdout_pump, stderr_pump] {
            if !pump.is_finished() {
                debug!("Plugin descriptor still open after relay completed");
                pump.abort();
            }
        }

        out.and(err)
    }
}
