use super::stream_relay::RelayWriter;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::debug;

/// Copy everything `io` produces into a relay until EOF.
///
/// Chunks are forwarded exactly as read; no decoding or line splitting.
/// Resolves to the number of bytes copied.
pub fn pump<R>(io: R, writer: RelayWriter, stream: &'static str) -> JoinHandle<std::io::Result<u64>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut frames = FramedRead::with_capacity(io, BytesCodec::new(), 1024);
        let mut total = 0u64;

        while let Some(frame) = frames.next().await {
            let bytes = frame?;
            total += writer.push(&bytes) as u64;
        }

        debug!(stream, total, "Plugin output reached EOF");
        Ok(total)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::relay::{StreamRelay, TERMINATION_MARKER};
    use crate::stdio::MemorySink;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_pump_feeds_relay_until_eof() {
        let sink = MemorySink::new();
        let mut relay = StreamRelay::new(sink.stdout(), RelayConfig::default());
        relay.start();

        let (mut plugin_side, host_side) = tokio::io::duplex(64);
        let task = pump(host_side, relay.writer(), "stdout");

        let payload = "x".repeat(4096);
        plugin_side.write_all(payload.as_bytes()).await.unwrap();
        plugin_side
            .write_all(TERMINATION_MARKER.as_bytes())
            .await
            .unwrap();
        drop(plugin_side);

        let copied = task.await.unwrap().unwrap();
        assert_eq!(copied as usize, payload.len() + TERMINATION_MARKER.len());

        relay.close().await.unwrap();
        assert_eq!(
            sink.contents_lossy(),
            format!("{payload}{TERMINATION_MARKER}")
        );
    }
}
