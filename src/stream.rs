//! Per-session event pipeline: chunks in, decoded session events out.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, trace, warn};

use crate::client::{StreamError, TransportError};
use crate::decode::{Decode, StreamMessage};
use crate::options::StreamOptions;
use crate::reassembly::FragmentBuffer;
use crate::sse::{lines, Line, LineSplitter};

/// What a stream session delivers to its consumer.
#[derive(Debug)]
pub enum SessionEvent<T> {
    /// One reassembled message, a decode failure, or a non-terminal stream
    /// error. A transport error is the last event of a session.
    Event(Result<StreamMessage<T>, StreamError>),
    /// The transport finished without error.
    Complete,
}

impl<T> SessionEvent<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, SessionEvent::Complete)
    }

    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        match self {
            SessionEvent::Complete => true,
            SessionEvent::Event(Err(err)) => err.is_terminal(),
            SessionEvent::Event(Ok(_)) => false,
        }
    }
}

/// Whether the transport should keep delivering chunks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The sentinel was seen.
    Done,
}

/// Frame splitter, fragment buffer and decoder for one stream session.
///
/// Chunks and the final termination must be delivered one at a time and in
/// order; the pipeline does no locking of its own.
pub struct EventPipeline<D> {
    decoder: D,
    splitter: LineSplitter,
    buffer: FragmentBuffer,
    options: StreamOptions,
}

impl<D: Decode> EventPipeline<D> {
    pub fn new(decoder: D, options: StreamOptions) -> Self {
        Self {
            decoder,
            splitter: LineSplitter::new(),
            buffer: FragmentBuffer::new(),
            options,
        }
    }

    pub fn buffer(&self) -> &FragmentBuffer {
        &self.buffer
    }

    /// Process one transport chunk, handing every resulting event to `emit`.
    ///
    /// Returns [`Flow::Done`] when the chunk contained the sentinel; lines
    /// after the sentinel in the same chunk are not processed.
    pub fn feed<F>(&mut self, chunk: &[u8], mut emit: F) -> Flow
    where
        F: FnMut(SessionEvent<D::Delta>),
    {
        let text = match self.splitter.push(chunk) {
            Ok(text) => text,
            Err(err) => {
                warn!(len = chunk.len(), error = %err, "dropping chunk with invalid UTF-8");
                emit(SessionEvent::Event(Err(StreamError::Encoding(err))));
                return Flow::Continue;
            }
        };

        for line in lines(&text) {
            trace!(?line, "sse line");
            let flushed = match line {
                Line::Sentinel => {
                    debug!(pending = self.buffer.len(), "received [DONE] sentinel");
                    self.buffer.clear();
                    self.splitter.clear();
                    return Flow::Done;
                }
                Line::Data(payload) => self.buffer.push_data(payload),
                Line::Bare(text) => self.buffer.push_bare(text),
                Line::Blank => continue,
            };

            match flushed {
                Some(json) => emit(SessionEvent::Event(self.decode(&json))),
                None => {
                    if let Some(err) = self.check_overflow() {
                        emit(SessionEvent::Event(Err(err)));
                    }
                }
            }
        }

        Flow::Continue
    }

    /// Handle termination of the transport.
    ///
    /// Clears all pending state and returns the terminal event: a transport
    /// error if one occurred, otherwise `Complete`.
    pub fn finish(&mut self, error: Option<TransportError>) -> SessionEvent<D::Delta> {
        self.buffer.clear();
        self.splitter.clear();

        match error {
            Some(err) => {
                warn!(error = %err, "stream terminated by transport error");
                SessionEvent::Event(Err(StreamError::Transport(err)))
            }
            None => {
                debug!("stream completed");
                SessionEvent::Complete
            }
        }
    }

    fn decode(&self, json: &str) -> Result<StreamMessage<D::Delta>, StreamError> {
        debug!(len = json.len(), "flushing reassembled message");
        self.decoder.decode(json).map_err(|err| {
            warn!(error = %err.source, "failed to decode stream message");
            StreamError::Decode(err)
        })
    }

    fn check_overflow(&mut self) -> Option<StreamError> {
        let limit = self.options.max_pending_bytes?;
        if self.buffer.pending_bytes() <= limit {
            return None;
        }
        warn!(
            pending = self.buffer.pending_bytes(),
            limit, "discarding fragments over the pending limit"
        );
        self.buffer.clear();
        Some(StreamError::Overflow { limit })
    }
}

/// Run a byte stream through an [`EventPipeline`].
///
/// The returned stream ends with `SessionEvent::Complete` (clean end of the
/// byte stream, or the sentinel) or with a transport error event.
pub fn sse_events<S, D>(
    byte_stream: S,
    decoder: D,
    options: StreamOptions,
) -> impl Stream<Item = SessionEvent<D::Delta>> + Send
where
    S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
    D: Decode,
{
    let pipeline = EventPipeline::new(decoder, options);

    stream::unfold(
        (Box::pin(byte_stream), pipeline, VecDeque::new(), false),
        |(mut byte_stream, mut pipeline, mut pending, mut finished)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((event, (byte_stream, pipeline, pending, finished)));
                }
                if finished {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        let flow = pipeline.feed(&chunk, |event| pending.push_back(event));
                        if flow == Flow::Done {
                            pending.push_back(pipeline.finish(None));
                            finished = true;
                        }
                    }
                    Some(Err(err)) => {
                        pending.push_back(pipeline.finish(Some(err)));
                        finished = true;
                    }
                    None => {
                        pending.push_back(pipeline.finish(None));
                        finished = true;
                    }
                }
            }
        },
    )
}
