//! Server-Sent Events (SSE) line splitting and classification.
//!
//! Only the single-field `data:` framing used by chat completion streams is
//! understood:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//! Lines without the prefix are continuations of a payload that was split
//! across chunks.

use std::str::Utf8Error;

use futures::{Stream, TryStreamExt};
use tracing::warn;

use crate::client::TransportError;
use crate::decode::Decode;
use crate::options::StreamOptions;
use crate::stream::{sse_events, SessionEvent};

/// Prefix of a line carrying a payload.
pub const DATA_PREFIX: &str = "data:";

/// Line that marks the end of the stream.
pub const DONE_SENTINEL: &str = "data: [DONE]";

/// One classified line of SSE text.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// The `data: [DONE]` end-of-stream marker.
    Sentinel,
    /// A `data:` line; the payload keeps any space following the colon.
    Data(&'a str),
    /// Text without the `data:` prefix, continuing a split payload.
    Bare(&'a str),
    /// Nothing to process.
    Blank,
}

/// Classify a single line.
///
/// # Example
/// ```
/// use deltastream::sse::{classify_line, Line};
///
/// assert_eq!(classify_line("data: [DONE]"), Line::Sentinel);
/// assert_eq!(classify_line("data: {\"id\":1}"), Line::Data(" {\"id\":1}"));
/// assert_eq!(classify_line("\"done\":true}"), Line::Bare("\"done\":true}"));
/// assert_eq!(classify_line("data:"), Line::Blank);
/// ```
pub fn classify_line(line: &str) -> Line<'_> {
    if is_done_marker(line) {
        return Line::Sentinel;
    }
    match parse_sse_line(line) {
        Some("") => Line::Blank,
        Some(payload) => Line::Data(payload),
        None if line.is_empty() => Line::Blank,
        None => Line::Bare(line),
    }
}

/// Split decoded text on `\n` and classify each piece, in order.
pub fn lines(text: &str) -> impl Iterator<Item = Line<'_>> {
    text.split('\n').map(classify_line)
}

/// Extract the payload of a `data:` line.
///
/// Exactly the five prefix bytes are stripped; a following space stays in
/// the payload.
///
/// # Example
/// ```
/// use deltastream::sse::parse_sse_line;
///
/// assert_eq!(parse_sse_line("data: hello"), Some(" hello"));
/// assert_eq!(parse_sse_line("data:hello"), Some("hello"));
/// assert_eq!(parse_sse_line("invalid"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX)
}

/// Check if a line is the end-of-stream marker.
///
/// # Example
/// ```
/// use deltastream::sse::is_done_marker;
///
/// assert!(is_done_marker("data: [DONE]"));
/// assert!(!is_done_marker("[DONE]"));
/// assert!(!is_done_marker("data: [DONE] "));
/// ```
pub fn is_done_marker(line: &str) -> bool {
    line == DONE_SENTINEL
}

/// Turns raw transport chunks into text ready for line classification.
///
/// Lines are not buffered here: an unterminated line at the end of a chunk
/// is handed on as is and the reassembly buffer deals with it. Two kinds of
/// tail are carried into the next chunk instead:
/// - an incomplete UTF-8 sequence (at most three bytes), and
/// - an unterminated line that is a proper prefix of [`DONE_SENTINEL`]
///   (`"d"`, `"data:"`, `"data: [DO"`, ...), whose meaning depends on what
///   follows.
#[derive(Debug, Default)]
pub struct LineSplitter {
    partial_utf8: Vec<u8>,
    held: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` and return the text to split into lines.
    ///
    /// Invalid UTF-8 fails the whole chunk. Carried text is kept; a carried
    /// partial sequence that the chunk does not complete is discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Result<String, Utf8Error> {
        let decoded = self.decode_utf8(chunk)?;

        let mut text = std::mem::take(&mut self.held);
        text.push_str(&decoded);

        let tail_start = text.rfind('\n').map_or(0, |pos| pos + 1);
        if is_sentinel_prefix(&text[tail_start..]) {
            self.held = text.split_off(tail_start);
        }
        Ok(text)
    }

    /// Whether any carried bytes or text are waiting for the next chunk.
    pub fn has_pending(&self) -> bool {
        !self.partial_utf8.is_empty() || !self.held.is_empty()
    }

    pub fn clear(&mut self) {
        self.partial_utf8.clear();
        self.held.clear();
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> Result<String, Utf8Error> {
        if self.partial_utf8.is_empty() {
            return self.decode_bytes(chunk);
        }

        let mut bytes = std::mem::take(&mut self.partial_utf8);
        bytes.extend_from_slice(chunk);
        match self.decode_bytes(&bytes) {
            Ok(text) => Ok(text),
            Err(_) => {
                // The carried bytes were never completed; drop them and
                // judge the chunk on its own.
                warn!(
                    dropped = bytes.len() - chunk.len(),
                    "discarding incomplete UTF-8 sequence"
                );
                self.decode_bytes(chunk)
            }
        }
    }

    fn decode_bytes(&mut self, bytes: &[u8]) -> Result<String, Utf8Error> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            // error_len() is None only for a sequence cut off by the end of input
            Err(e) if e.error_len().is_none() => {
                let (valid, tail) = bytes.split_at(e.valid_up_to());
                let text = std::str::from_utf8(valid)?.to_string();
                self.partial_utf8 = tail.to_vec();
                Ok(text)
            }
            Err(e) => Err(e),
        }
    }
}

fn is_sentinel_prefix(tail: &str) -> bool {
    !tail.is_empty() && tail.len() < DONE_SENTINEL.len() && DONE_SENTINEL.starts_with(tail)
}

/// Extension trait for `reqwest::Response` to enable SSE streaming.
///
/// # Example
/// ```ignore
/// use deltastream::decode::JsonDecoder;
/// use deltastream::sse::SSEResponseExt;
///
/// let response = client.post(url).json(&body).send().await?;
/// let mut events = response.sse_events(JsonDecoder::<ChatCompletionChunk>::new(), Default::default());
/// while let Some(event) = events.next().await {
///     println!("{:?}", event);
/// }
/// ```
pub trait SSEResponseExt {
    /// Convert the response body into a stream of session events.
    ///
    /// The stream ends after `SessionEvent::Complete`, after the sentinel, or
    /// after a transport error event.
    fn sse_events<D: Decode>(
        self,
        decoder: D,
        options: StreamOptions,
    ) -> impl Stream<Item = SessionEvent<D::Delta>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse_events<D: Decode>(
        self,
        decoder: D,
        options: StreamOptions,
    ) -> impl Stream<Item = SessionEvent<D::Delta>> + Send {
        sse_events(
            self.bytes_stream().map_err(TransportError::from),
            decoder,
            options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("data: [DONE]"), Line::Sentinel);
        assert_eq!(classify_line("data: hello"), Line::Data(" hello"));
        assert_eq!(classify_line("data:{}"), Line::Data("{}"));
        assert_eq!(classify_line("data:"), Line::Blank);
        assert_eq!(classify_line(""), Line::Blank);
        assert_eq!(classify_line("  }"), Line::Bare("  }"));
        assert_eq!(classify_line("data: [DONE] "), Line::Data(" [DONE] "));
    }

    #[test]
    fn test_lines_preserve_order() {
        let classified: Vec<_> = lines("data: {\"a\":1}\n\ndata: {\"b\":\n2}\n").collect();
        assert_eq!(
            classified,
            vec![
                Line::Data(" {\"a\":1}"),
                Line::Blank,
                Line::Data(" {\"b\":"),
                Line::Bare("2}"),
                Line::Blank,
            ]
        );
    }

    #[test]
    fn test_unterminated_line_is_passed_through() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"data: {\"id\":1,").unwrap(), "data: {\"id\":1,");
        assert!(!splitter.has_pending());
    }

    #[test]
    fn test_split_multibyte_character_is_carried() {
        let text = "data: {\"s\":\"é\"}\n";
        let bytes = text.as_bytes();
        let cut = text.find('é').unwrap() + 1;

        let mut splitter = LineSplitter::new();
        let first = splitter.push(&bytes[..cut]).unwrap();
        assert!(splitter.has_pending());
        let second = splitter.push(&bytes[cut..]).unwrap();

        assert_eq!(format!("{}{}", first, second), text);
        assert!(!splitter.has_pending());
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(&[0x64, 0xff, 0x0a]).is_err());
        assert_eq!(splitter.push(b"data: {}\n").unwrap(), "data: {}\n");
    }

    #[test]
    fn test_unfinished_sequence_does_not_poison_later_chunks() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"data: {\"a\":1}\n\xC3").unwrap(), "data: {\"a\":1}\n");
        assert!(splitter.has_pending());

        // 'd' cannot continue the carried lead byte.
        assert_eq!(splitter.push(b"data: {\"b\":2}\n").unwrap(), "data: {\"b\":2}\n");
        assert!(!splitter.has_pending());
        assert_eq!(splitter.push(b"data: {\"c\":3}\n").unwrap(), "data: {\"c\":3}\n");
    }

    #[test]
    fn test_invalid_chunk_after_carried_sequence_is_dropped_with_it() {
        let mut splitter = LineSplitter::new();
        splitter.push(b"\xE2\x82").unwrap();
        assert!(splitter.push(&[0xff, b'\n']).is_err());
        assert!(!splitter.has_pending());
        assert_eq!(splitter.push(b"data: {}\n").unwrap(), "data: {}\n");
    }

    #[test]
    fn test_partial_prefix_is_held() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"data: {\"a\":1}\nda").unwrap(), "data: {\"a\":1}\n");
        assert!(splitter.has_pending());
        assert_eq!(splitter.push(b"ta: {\"b\":2}\n").unwrap(), "data: {\"b\":2}\n");
    }

    #[test]
    fn test_partial_sentinel_is_held() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"data: [DO").unwrap(), "");
        let text = splitter.push(b"NE]\n").unwrap();
        assert_eq!(lines(&text).next(), Some(Line::Sentinel));
    }

    #[test]
    fn test_held_prefix_inside_payload_is_rejoined() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"data: {\"").unwrap(), "data: {\"");
        assert_eq!(splitter.push(b"da").unwrap(), "");
        assert!(splitter.has_pending());

        let text = splitter.push(b"ta\":2}\n").unwrap();
        assert_eq!(lines(&text).next(), Some(Line::Bare("data\":2}")));
    }

    #[test]
    fn test_clear_drops_carried_state() {
        let mut splitter = LineSplitter::new();
        splitter.push(b"dat").unwrap();
        splitter.clear();
        assert!(!splitter.has_pending());
        assert_eq!(splitter.push(b"{}\n").unwrap(), "{}\n");
    }
}
