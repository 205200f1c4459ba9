//! Relaying of plugin output streams to host sinks.

mod pair;
mod pending;
mod pump;
mod sentinel;
mod stream_relay;

pub use pair::RelayPair;
pub use pending::PendingBuffer;
pub use pump::pump;
pub use sentinel::{SentinelWindow, TERMINATION_MARKER, write_termination_marker};
pub use stream_relay::{RelayWriter, StreamRelay};
