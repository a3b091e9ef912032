//! Stream sessions: one transport connection feeding one event pipeline.
//!
//! A session runs the transport on a background tokio task. Events reach
//! the consumer through an [`EventStream`]; the task is the only caller of
//! the pipeline, so chunks and the termination are processed strictly in
//! order.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::TransportError;
use crate::decode::Decode;
use crate::http::Transport;
use crate::options::StreamOptions;
use crate::stream::{EventPipeline, Flow, SessionEvent};

/// Lifecycle of a [`SseSession`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Never connected.
    Idle,
    /// A transport is running.
    Connected,
    /// The last connection completed, failed, or was disconnected.
    Terminated,
}

/// Events of one connection, in delivery order.
///
/// Ends after `SessionEvent::Complete` or a transport error event.
/// Dropping the stream stops the connection at the next chunk boundary.
pub struct EventStream<T> {
    receiver: UnboundedReceiver<SessionEvent<T>>,
    cancel: CancellationToken,
}

impl<T> EventStream<T> {
    /// Request cancellation of the underlying transfer.
    ///
    /// A chunk already being processed is finished first; the stream then
    /// yields a `TransportError::Cancelled` event and ends.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl<T> Stream for EventStream<T> {
    type Item = SessionEvent<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

struct Connection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Binds a transport and a decoder to successive stream connections.
///
/// Each call to [`connect`](SseSession::connect) gets its own fragment
/// buffer; nothing is shared between connections.
pub struct SseSession<T, D> {
    transport: Arc<T>,
    decoder: Arc<D>,
    options: StreamOptions,
    connection: Option<Connection>,
}

impl<T: Transport, D: Decode> SseSession<T, D> {
    pub fn new(transport: T, decoder: D) -> Self {
        Self {
            transport: Arc::new(transport),
            decoder: Arc::new(decoder),
            options: StreamOptions::default(),
            connection: None,
        }
    }

    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    /// Start streaming `request` and return its events.
    ///
    /// Connecting while a previous connection is still running cancels it
    /// first; the old stream receives its cancellation event.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&mut self, request: T::Request) -> EventStream<D::Delta> {
        if let Some(previous) = self.connection.take() {
            if !previous.task.is_finished() {
                debug!("reconnecting; cancelling previous stream");
            }
            previous.cancel.cancel();
        }

        let (sender, receiver) = mpsc::unbounded();
        let cancel = CancellationToken::new();
        let pipeline = EventPipeline::new(Arc::clone(&self.decoder), self.options);
        let task = tokio::spawn(pump(
            Arc::clone(&self.transport),
            request,
            pipeline,
            sender,
            cancel.clone(),
        ));

        self.connection = Some(Connection {
            cancel: cancel.clone(),
            task,
        });
        EventStream { receiver, cancel }
    }

    /// Request cancellation of the current connection, if any.
    ///
    /// Pending fragments are dropped once the transport task observes the
    /// request, not synchronously.
    pub fn disconnect(&self) {
        if let Some(connection) = &self.connection {
            debug!("disconnect requested");
            connection.cancel.cancel();
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.connection {
            None => SessionState::Idle,
            Some(connection)
                if connection.task.is_finished() || connection.cancel.is_cancelled() =>
            {
                SessionState::Terminated
            }
            Some(_) => SessionState::Connected,
        }
    }
}

async fn pump<T: Transport, D: Decode>(
    transport: Arc<T>,
    request: T::Request,
    mut pipeline: EventPipeline<Arc<D>>,
    sender: UnboundedSender<SessionEvent<D::Delta>>,
    cancel: CancellationToken,
) {
    let started = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        started = transport.start(request) => started,
    };

    let error = match started {
        Ok(mut body) => loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(Err(TransportError::Cancelled)),
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let flow = pipeline.feed(&chunk, |event| {
                        // A closed receiver is checked below.
                        let _ = sender.unbounded_send(event);
                    });
                    if flow == Flow::Done {
                        break None;
                    }
                    if sender.is_closed() {
                        debug!("event stream dropped; stopping transfer");
                        return;
                    }
                }
                Some(Err(err)) => break Some(err),
                None => break None,
            }
        },
        Err(err) => Some(err),
    };

    let _ = sender.unbounded_send(pipeline.finish(error));
}
