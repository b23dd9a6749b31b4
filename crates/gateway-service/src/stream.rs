//! Decoration of adapter streams.
//!
//! Each partial result becomes a [`StreamEvent::Chunk`] stamped with the
//! time since the gateway accepted the request. A normal end of the upstream
//! appends one [`StreamEvent::Done`]; a failure ends the stream after the
//! error item, without the sentinel.
//!
//! The stream owns the end of its dispatch: it reports `Success` before the
//! sentinel, `Failure` before an error item, and `Cancelled` when dropped
//! before either.

use async_stream::try_stream;
use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use gateway_core::{CompletionStream, GatewayResult, StreamChunk, StreamEvent, StreamSummary};
use gateway_telemetry::{DispatchOutcome, GatewayObserver};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Decorated stream handed to callers
pub type EventStream = BoxStream<'static, GatewayResult<StreamEvent>>;

/// Reports the end of a streamed dispatch exactly once
struct StreamGuard {
    provider: String,
    chunks: u64,
    started: Instant,
    observer: Arc<dyn GatewayObserver>,
    finished: bool,
}

impl StreamGuard {
    fn finish(&mut self, outcome: DispatchOutcome) {
        self.finished = true;
        self.observer
            .dispatch_finished(&self.provider, outcome, self.started.elapsed());
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if !self.finished {
            debug!(provider = %self.provider, chunks = self.chunks, "Stream closed before completion");
            self.finish(DispatchOutcome::Cancelled);
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Wrap an adapter stream whose dispatch `observer` has seen start
pub fn decorate(
    inner: CompletionStream,
    provider: impl Into<String>,
    started: Instant,
    observer: Arc<dyn GatewayObserver>,
) -> EventStream {
    let provider = provider.into();
    let stream = try_stream! {
        let mut inner = inner;
        let mut guard = StreamGuard {
            provider,
            chunks: 0,
            started,
            observer,
            finished: false,
        };

        while let Some(item) = inner.next().await {
            let partial = match item {
                Ok(partial) => partial,
                Err(e) => {
                    debug!(provider = %guard.provider, chunks = guard.chunks, error = %e, "Stream failed");
                    guard.finish(DispatchOutcome::Failure(e.kind()));
                    Err(e)?
                }
            };
            guard.chunks += 1;
            yield StreamEvent::Chunk(StreamChunk {
                text: partial.text,
                model: partial.metadata.model,
                provider: partial.metadata.provider,
                latency_ms: elapsed_ms(started),
                timestamp: Utc::now(),
            });
        }

        debug!(provider = %guard.provider, chunks = guard.chunks, "Stream completed");
        guard.finish(DispatchOutcome::Success);
        yield StreamEvent::Done(StreamSummary {
            chunks: guard.chunks,
            latency_ms: elapsed_ms(started),
        });
    };

    Box::pin(stream)
}
