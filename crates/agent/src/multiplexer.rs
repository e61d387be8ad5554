//! Generation stream multiplexer.
//!
//! Bridges a provider's chunk channel to a per-request [`EventStream`].
//! A forwarding task owns the upstream receiver; it emits `Content` for
//! every non-empty fragment, then exactly one terminal event. Cancelling
//! the stream (explicitly or by dropping it) makes the task emit a
//! `cancelled` error if the consumer is still listening and drop the
//! upstream receiver, which stops the provider's producer task.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use profesor_core::error::GenerationError;
use profesor_core::provider::StreamChunk;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::stream_event::StreamEvent;

/// Chunk channel returned by `Provider::stream`.
pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk, GenerationError>>;

/// Write side of an event stream. Refuses anything after a terminal event.
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    token: CancellationToken,
    finished: bool,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>, token: CancellationToken) -> Self {
        Self {
            tx,
            token,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Deliver one event.
    ///
    /// Returns `true` while more events may follow. A terminal event, a
    /// closed consumer or a cancellation all finish the sink.
    pub async fn emit(&mut self, event: StreamEvent) -> bool {
        if self.finished {
            debug!(event = event.event_type(), "Dropping event after terminal");
            return false;
        }

        let terminal = event.is_terminal();
        let sent = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = self.tx.send(event) => Some(result.is_ok()),
        };

        match sent {
            None => {
                self.cancel();
                false
            }
            Some(false) => {
                self.finished = true;
                false
            }
            Some(true) => {
                self.finished = terminal;
                !terminal
            }
        }
    }

    /// Finish with a `cancelled` error, if there is room to deliver it.
    pub fn cancel(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let _ = self.tx.try_send(StreamEvent::cancelled());
    }

    pub async fn fail(&mut self, err: &GenerationError) {
        self.emit(StreamEvent::error(err)).await;
    }
}

/// Read side of a per-request event stream.
///
/// Dropping it cancels the forwarding task.
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
    token: CancellationToken,
    _cancel_on_drop: DropGuard,
}

impl EventStream {
    fn new(rx: mpsc::Receiver<StreamEvent>, token: CancellationToken) -> Self {
        Self {
            rx,
            _cancel_on_drop: token.clone().drop_guard(),
            token,
        }
    }

    /// Stop generation; at most one terminal event still arrives.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Drain every remaining event.
    pub async fn collect_events(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }

    /// Concatenate all content, or return the terminal error.
    pub async fn collect_text(mut self) -> Result<String, StreamEvent> {
        let mut text = String::new();
        while let Some(event) = self.rx.recv().await {
            match event {
                StreamEvent::Content { text: fragment } => text.push_str(&fragment),
                StreamEvent::ToolUsed { .. } | StreamEvent::Complete => {}
                error @ StreamEvent::Error { .. } => return Err(error),
            }
        }
        Ok(text)
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StreamMultiplexer {
    buffer: usize,
}

impl Default for StreamMultiplexer {
    fn default() -> Self {
        Self { buffer: 32 }
    }
}

impl StreamMultiplexer {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
        }
    }

    /// Start forwarding from `upstream` once it resolves to a chunk channel.
    ///
    /// `preface` events are delivered first. Cancellation is honoured while
    /// waiting for `upstream` too.
    pub fn spawn<F>(&self, preface: Vec<StreamEvent>, upstream: F) -> EventStream
    where
        F: Future<Output = Result<ChunkReceiver, GenerationError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.buffer);
        let token = CancellationToken::new();
        let sink = EventSink::new(tx, token.clone());
        tokio::spawn(forward(sink, preface, upstream, token.clone()));
        EventStream::new(rx, token)
    }

    /// A stream over an already complete answer.
    pub fn from_text(&self, preface: Vec<StreamEvent>, text: String) -> EventStream {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Ok(StreamChunk::text(text)));
        drop(tx);
        self.spawn(preface, async move { Ok(rx) })
    }
}

async fn forward<F>(
    mut sink: EventSink,
    preface: Vec<StreamEvent>,
    upstream: F,
    token: CancellationToken,
) where
    F: Future<Output = Result<ChunkReceiver, GenerationError>>,
{
    for event in preface {
        if !sink.emit(event).await {
            return;
        }
    }

    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = upstream => Some(result),
    };
    let mut chunks = match opened {
        None => {
            sink.cancel();
            return;
        }
        Some(Ok(chunks)) => chunks,
        Some(Err(e)) => {
            warn!(error = %e, kind = ?e.kind(), "Generation failed to start");
            sink.fail(&e).await;
            return;
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Generation cancelled, releasing upstream");
                sink.cancel();
                return;
            }
            next = chunks.recv() => next,
        };

        match next {
            None => {
                sink.emit(StreamEvent::Complete).await;
                return;
            }
            Some(Ok(chunk)) => {
                if let Some(text) = chunk.content.filter(|t| !t.is_empty())
                    && !sink.emit(StreamEvent::content(text)).await
                {
                    return;
                }
                if chunk.done {
                    sink.emit(StreamEvent::Complete).await;
                    return;
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, kind = ?e.kind(), "Generation stream failed");
                sink.fail(&e).await;
                return;
            }
        }
    }
}
