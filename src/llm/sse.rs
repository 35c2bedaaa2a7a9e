//! Decoding of streamed chat completions delivered as server-sent events.
//!
//! Each `data:` line holds one JSON chunk whose `choices[0].delta.content`
//! is the next text fragment. `data: [DONE]` ends the stream. Network chunks
//! do not respect line boundaries, so partial lines are buffered until their
//! terminating newline arrives.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use super::error::{LlmError, LlmResult};

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// Longest unterminated line kept in memory before the body is rejected.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental line decoder for an SSE body.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known to hold no newline.
    scanned: usize,
    done: bool,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` marker (or end of input) has been seen.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes and return one item per complete `data:` line.
    ///
    /// Only the new bytes are searched for line ends. A partial line growing
    /// past [`MAX_LINE_BYTES`] yields a [`LlmError::Malformed`] and ends decoding.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<LlmResult<String>> {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(chunk);

        let mut start = 0;
        while !self.done {
            let Some(offset) = buffer[self.scanned..].iter().position(|&b| b == b'\n') else {
                break;
            };
            let end = self.scanned + offset + 1;
            self.decode_line(&buffer[start..end], &mut fragments);
            start = end;
            self.scanned = end;
        }

        if self.done {
            self.scanned = 0;
            return fragments;
        }

        buffer.drain(..start);
        if buffer.len() > MAX_LINE_BYTES {
            fragments.push(Err(LlmError::Malformed(format!(
                "event stream line exceeds {MAX_LINE_BYTES} bytes"
            ))));
            self.done = true;
            self.scanned = 0;
            return fragments;
        }

        self.scanned = buffer.len();
        self.buffer = buffer;
        fragments
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<LlmResult<String>> {
        let mut fragments = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut fragments);
        }
        self.buffer.clear();
        self.scanned = 0;
        self.done = true;
        fragments
    }

    fn decode_line(&mut self, raw: &[u8], out: &mut Vec<LlmResult<String>>) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches(['\r', '\n']);

        // Comments, `event:`, `id:` and blank separators carry no text.
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        let data = data.trim_start();
        if data.is_empty() {
            return;
        }
        if data == DONE_MARKER {
            self.done = true;
            return;
        }

        out.push(parse_chunk(data));
    }
}

/// Parse one JSON chunk into its text fragment.
///
/// A chunk without choices, delta or content yields the empty string.
fn parse_chunk(data: &str) -> LlmResult<String> {
    let chunk: StreamChunk = serde_json::from_str(data)?;

    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(LlmError::Api(message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default())
}

struct FragmentState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<LlmResult<String>>,
    exhausted: bool,
}

/// Turn a byte stream carrying an SSE body into a stream of text fragments.
///
/// The returned stream ends after `[DONE]`, at end of input, or right after
/// yielding a transport error.
pub fn decode_fragments<S, B, E>(bytes: S) -> impl Stream<Item = LlmResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
    E: Into<LlmError> + Send,
{
    let state = FragmentState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.exhausted || state.decoder.is_done() {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let fragments = state.decoder.feed(chunk.as_ref());
                    state.pending.extend(fragments);
                }
                Some(Err(err)) => {
                    state.exhausted = true;
                    return Some((Err(err.into()), state));
                }
                None => {
                    state.exhausted = true;
                    let tail = state.decoder.finish();
                    state.pending.extend(tail);
                }
            }
        }
    })
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
