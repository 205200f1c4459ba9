use super::pending::PendingBuffer;
use super::sentinel::SentinelWindow;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::stdio::HostStdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

type Completion = Result<(), RelayError>;

struct RelayState {
    pending: PendingBuffer,
    sentinel: SentinelWindow,
    closing: bool,
}

type SharedState = Arc<Mutex<RelayState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, RelayState> {
    // The state stays consistent even if a writer panicked mid-append.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer side of a relay.
///
/// Writes are pure in-memory appends and never block on I/O, so this can be
/// cloned into any thread or task that reads the plugin's output.
#[derive(Clone)]
pub struct RelayWriter {
    state: SharedState,
}

impl RelayWriter {
    /// Queue `bytes` for the sink. Always accepts the whole chunk.
    pub fn push(&self, bytes: &[u8]) -> usize {
        let mut state = lock(&self.state);
        state.pending.append(bytes);
        state.sentinel.push(bytes);
        bytes.len()
    }
}

impl std::io::Write for RelayWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.push(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Forwards one plugin output stream to a host sink from a background task
/// and decides when the stream is finished.
///
/// After [`StreamRelay::close`] is requested the task keeps draining until
/// nothing is pending, then completes as soon as the trailing bytes equal the
/// configured marker, or once the grace period has passed since the last
/// flush.
pub struct StreamRelay {
    label: &'static str,
    state: SharedState,
    config: RelayConfig,
    unstarted: Option<(HostStdio, oneshot::Sender<Completion>)>,
    done: oneshot::Receiver<Completion>,
    task: Option<JoinHandle<()>>,
}

impl StreamRelay {
    pub fn new(sink: impl Into<HostStdio>, config: RelayConfig) -> Self {
        let sink = sink.into();
        let (done_tx, done) = oneshot::channel();
        let state = RelayState {
            pending: PendingBuffer::new(),
            sentinel: SentinelWindow::new(config.marker.as_bytes()),
            closing: false,
        };

        Self {
            label: sink.label(),
            state: Arc::new(Mutex::new(state)),
            config,
            unstarted: Some((sink, done_tx)),
            done,
            task: None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn writer(&self) -> RelayWriter {
        RelayWriter {
            state: self.state.clone(),
        }
    }

    /// Shorthand for `self.writer().push(bytes)`.
    pub fn write(&self, bytes: &[u8]) -> usize {
        self.writer().push(bytes)
    }

    /// Whether the bytes written so far end with the marker.
    pub fn marker_seen(&self) -> bool {
        lock(&self.state).sentinel.matches()
    }

    pub fn is_started(&self) -> bool {
        self.unstarted.is_none()
    }

    /// Spawn the draining task on the current tokio runtime. Calling this
    /// again is a no-op.
    pub fn start(&mut self) {
        let Some((sink, done_tx)) = self.unstarted.take() else {
            return;
        };

        debug!(
            stream = self.label,
            grace_period_ms = self.config.grace_period_ms,
            poll_interval_ms = self.config.poll_interval_ms,
            "Starting output relay"
        );

        let task = tokio::spawn(drain(
            self.state.clone(),
            sink,
            self.config.clone(),
            done_tx,
        ));
        self.task = Some(task);
    }

    /// Request shutdown and wait for the draining task to finish.
    ///
    /// Returns the sink error that stopped the relay, if any. Reaching the
    /// grace period without seeing the marker is not an error.
    pub async fn close(mut self) -> Result<(), RelayError> {
        if self.unstarted.is_some() {
            return Err(RelayError::NotStarted);
        }

        lock(&self.state).closing = true;
        debug!(stream = self.label, "Closing output relay");

        match (&mut self.done).await {
            Ok(result) => result,
            Err(_) => {
                if let Some(task) = self.task.take() {
                    if let Err(e) = task.await {
                        warn!(stream = self.label, "Output relay task failed: {e}");
                    }
                }
                Err(RelayError::Aborted(self.label))
            }
        }
    }
}

impl Drop for StreamRelay {
    fn drop(&mut self) {
        // An abandoned relay still winds down once its grace period expires.
        lock(&self.state).closing = true;
    }
}

async fn drain(
    state: SharedState,
    sink: HostStdio,
    config: RelayConfig,
    done_tx: oneshot::Sender<Completion>,
) {
    let stream = sink.label();
    let grace_period = config.grace_period();
    let poll_interval = config.poll_interval();
    let mut last_activity = Instant::now();

    let result = loop {
        let chunk = {
            let mut state = lock(&state);
            if state.pending.is_empty() {
                if state.closing {
                    let marker_seen = state.sentinel.matches();
                    if marker_seen || last_activity.elapsed() > grace_period {
                        debug!(stream, marker_seen, "Output relay drained");
                        break Ok(());
                    }
                }
                None
            } else {
                Some(state.pending.take())
            }
        };

        match chunk {
            Some(chunk) => {
                if let Err(source) = sink.write_chunk(&chunk).await {
                    warn!(stream, "Failed to forward plugin output: {source}");
                    break Err(RelayError::SinkWrite { stream, source });
                }
                trace!(stream, bytes = chunk.len(), "Forwarded plugin output");
                last_activity = Instant::now();
            }
            None => tokio::time::sleep(poll_interval).await,
        }
    };

    // The receiver is gone only if the relay was dropped without closing.
    let _ = done_tx.send(result);
}
