//! Frame reassembly for the analysis event stream.
//!
//! Transport chunks may split a frame at any byte. `FrameBuffer` owns the
//! partial tail between chunks and only emits a frame once its blank-line
//! separator has been seen.

use std::collections::VecDeque;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

/// One complete, separator-terminated block of the event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    text: String,
}

impl RawFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Frame body without the trailing separator.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Accumulates transport chunks and splits them into complete frames.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame it completed, in order.
    ///
    /// The trailing piece after the last separator (possibly empty) stays
    /// buffered for the next call.
    pub fn ingest(&mut self, chunk: impl AsRef<[u8]>) -> Vec<RawFrame> {
        self.buf.extend_from_slice(chunk.as_ref());
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame = RawFrame::new(String::from_utf8_lossy(&self.buf[..idx]));
            self.buf.drain(..idx + delim_len);
            frames.push(frame);
        }
        frames
    }

    /// Bytes held back waiting for a separator.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Ends the stream. An unterminated trailing frame is discarded; the
    /// number of discarded bytes is returned.
    pub fn finish(self) -> usize {
        self.buf.len()
    }
}

/// Finds the first `\n\n` (or `\r\n\r\n`) separator, returning its offset and length.
fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

/// Turns a fallible chunk stream into a lazy stream of complete frames.
///
/// The first chunk error is yielded and ends the stream. On a clean end of
/// stream any buffered partial frame is dropped.
pub fn frames<S, B, E>(chunks: S) -> impl futures::Stream<Item = Result<RawFrame, E>>
where
    S: futures::Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    struct State<S> {
        chunks: S,
        buffer: FrameBuffer,
        pending: VecDeque<RawFrame>,
    }

    stream::try_unfold(
        State {
            chunks,
            buffer: FrameBuffer::new(),
            pending: VecDeque::new(),
        },
        |mut state| async move {
            loop {
                if let Some(frame) = state.pending.pop_front() {
                    return Ok(Some((frame, state)));
                }
                match state.chunks.next().await {
                    Some(Ok(chunk)) => state.pending.extend(state.buffer.ingest(chunk)),
                    Some(Err(e)) => return Err(e),
                    None => {
                        let discarded = state.buffer.pending_len();
                        if discarded > 0 {
                            debug!(discarded, "dropping unterminated trailing frame");
                        }
                        return Ok(None);
                    }
                }
            }
        },
    )
}
