//! Cooperative cancellation of uniform event streams.

use crate::adapter::{UniformEvent, UniformEventStream};
use async_stream::stream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Wraps `events` so it ends as soon as `token` is cancelled.
///
/// The token is checked between yields only; a backend call already in flight
/// is dropped with the stream, not interrupted.
pub fn cancellable(mut events: UniformEventStream, token: CancellationToken) -> UniformEventStream {
    Box::pin(stream! {
        loop {
            let next: Option<UniformEvent> = tokio::select! {
                biased;
                () = token.cancelled() => None,
                item = events.next() => item,
            };
            match next {
                Some(event) => yield event,
                None => break,
            }
        }
    })
}
