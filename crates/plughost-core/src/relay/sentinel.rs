use std::collections::VecDeque;
use std::io::Write;

/// Byte sequence a cooperating plugin prints when it has finished producing
/// output: a newline, the `{plugin:terminated}` tag, a carriage return and
/// the ANSI clear-line escape so the tag never stays visible on a terminal.
pub const TERMINATION_MARKER: &str = "\n{plugin:terminated}\r\x1b[2K";

/// Sliding window over the most recent bytes written to a relay.
///
/// The window holds at most `marker.len()` bytes and is compared against the
/// marker to decide whether the plugin has announced its own termination.
#[derive(Debug, Clone)]
pub struct SentinelWindow {
    marker: Vec<u8>,
    window: VecDeque<u8>,
}

impl SentinelWindow {
    pub fn new(marker: impl Into<Vec<u8>>) -> Self {
        let marker = marker.into();
        Self {
            window: VecDeque::with_capacity(marker.len()),
            marker,
        }
    }

    /// Extend the window with `bytes`, then trim it from the front.
    pub fn push(&mut self, bytes: &[u8]) {
        let capacity = self.marker.len();
        if capacity == 0 {
            return;
        }

        // Only the tail of a large chunk can ever end up in the window.
        let tail = &bytes[bytes.len().saturating_sub(capacity)..];
        self.window.extend(tail.iter().copied());

        let overflow = self.window.len().saturating_sub(capacity);
        self.window.drain(..overflow);
    }

    /// True when the trailing bytes are exactly the marker. An empty marker
    /// never matches; relay configs reject one up front.
    pub fn matches(&self) -> bool {
        !self.marker.is_empty() && self.window.iter().eq(self.marker.iter())
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.marker.len()
    }

    pub fn marker(&self) -> &[u8] {
        &self.marker
    }
}

impl Default for SentinelWindow {
    fn default() -> Self {
        Self::new(TERMINATION_MARKER)
    }
}

/// Plugin-side helper: announce termination on `out` and flush it.
pub fn write_termination_marker<W: Write>(out: &mut W) -> std::io::Result<()> {
    out.write_all(TERMINATION_MARKER.as_bytes())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_bytes() {
        assert_eq!(
            TERMINATION_MARKER.as_bytes(),
            b"\n{plugin:terminated}\r\x1b[2K"
        );
    }

    #[test]
    fn test_window_never_exceeds_marker_length() {
        let mut window = SentinelWindow::new("abc");
        window.push(b"a");
        assert_eq!(window.len(), 1);
        window.push(b"bcdefgh");
        assert_eq!(window.len(), 3);
        window.push(b"ij");
        assert_eq!(window.len(), 3);
        assert_eq!(window.capacity(), 3);
    }

    #[test]
    fn test_matches_only_trailing_bytes() {
        let mut window = SentinelWindow::new("end");
        window.push(b"the end");
        assert!(window.matches());

        window.push(b"!");
        assert!(!window.matches());
    }

    #[test]
    fn test_marker_split_across_writes() {
        let mut window = SentinelWindow::default();
        let marker = TERMINATION_MARKER.as_bytes();
        window.push(b"scenario output");
        for byte in marker {
            assert!(!window.matches());
            window.push(std::slice::from_ref(byte));
        }
        assert!(window.matches());
    }

    #[test]
    fn test_empty_marker_never_matches() {
        let mut window = SentinelWindow::new(Vec::<u8>::new());
        window.push(b"anything");
        assert!(window.is_empty());
        assert!(!window.matches());
    }

    #[test]
    fn test_write_termination_marker() {
        let mut out = Vec::new();
        write_termination_marker(&mut out).unwrap();

        let mut window = SentinelWindow::default();
        window.push(&out);
        assert!(window.matches());
    }
}
