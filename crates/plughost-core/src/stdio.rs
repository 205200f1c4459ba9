use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

pub type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Unpin + Sync + Send>>>;

/// A host output stream a relay forwards plugin bytes to.
#[derive(Clone, derive_more::From)]
pub enum HostStdio {
    Out(HostStdout),
    Err(HostStderr),
}

impl HostStdio {
    pub fn inner(&self) -> SharedWriter {
        match self {
            HostStdio::Out(out) => out.inner(),
            HostStdio::Err(err) => err.inner(),
        }
    }

    /// Name of the stream, used in logs and errors.
    pub fn label(&self) -> &'static str {
        match self {
            HostStdio::Out(_) => "stdout",
            HostStdio::Err(_) => "stderr",
        }
    }

    /// Write one chunk byte-for-byte and flush it.
    pub async fn write_chunk(&self, bytes: &[u8]) -> std::io::Result<()> {
        let inner = self.inner();
        let mut lock = inner.lock().await;
        lock.write_all(bytes).await?;
        lock.flush().await
    }
}

pub struct HostStdout(SharedWriter);

impl Clone for HostStdout {
    fn clone(&self) -> Self {
        HostStdout(self.0.clone())
    }
}

impl Default for HostStdout {
    fn default() -> Self {
        HostStdout::new(Box::new(tokio::io::stdout()))
    }
}

impl HostStdout {
    pub fn new(t: Box<dyn AsyncWrite + Unpin + Sync + Send>) -> HostStdout {
        HostStdout(Arc::new(Mutex::new(t)))
    }

    pub fn inner(&self) -> SharedWriter {
        self.0.clone()
    }
}

pub struct HostStderr(SharedWriter);

impl Clone for HostStderr {
    fn clone(&self) -> Self {
        HostStderr(self.0.clone())
    }
}

impl Default for HostStderr {
    fn default() -> Self {
        HostStderr::new(Box::new(tokio::io::stderr()))
    }
}

impl HostStderr {
    pub fn new(t: Box<dyn AsyncWrite + Unpin + Sync + Send>) -> HostStderr {
        HostStderr(Arc::new(Mutex::new(t)))
    }

    pub fn inner(&self) -> SharedWriter {
        self.0.clone()
    }
}

/// In-memory sink for capturing plugin output instead of printing it.
#[derive(Clone, Default, Debug)]
pub struct MemorySink {
    buf: Arc<std::sync::Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buf
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn stdout(&self) -> HostStdout {
        HostStdout::new(Box::new(self.clone()))
    }

    pub fn stderr(&self) -> HostStderr {
        HostStderr::new(Box::new(self.clone()))
    }
}

impl AsyncWrite for MemorySink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.buf
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_captures_chunks() {
        let sink = MemorySink::new();
        let out: HostStdio = sink.stdout().into();

        out.write_chunk(b"hello ").await.unwrap();
        out.write_chunk(b"world").await.unwrap();

        assert_eq!(sink.contents(), b"hello world");
        assert_eq!(out.label(), "stdout");
    }

    #[tokio::test]
    async fn test_shared_sink_labels() {
        let sink = MemorySink::new();
        let out: HostStdio = sink.stdout().into();
        let err: HostStdio = sink.stderr().into();

        out.write_chunk(b"out ").await.unwrap();
        err.write_chunk(b"err").await.unwrap();

        assert_eq!(err.label(), "stderr");
        assert_eq!(sink.contents_lossy(), "out err");
    }
}
