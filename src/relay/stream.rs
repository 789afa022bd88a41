//! Streaming relay.
//!
//! # Data Flow
//! ```text
//! upstream ChunkStream ──pump task──▶ mpsc(1) ──▶ client Body
//! ```
//!
//! # Invariants
//! - Chunks reach the client in upstream order
//! - At most one chunk waits in the hand-off channel
//! - Upstream end-of-stream ends the client body normally
//! - Dropping the client body cancels the upstream read and drops the upstream
//!   stream, which releases its connection

use axum::body::{Body, Bytes};
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::relay::observer::{RelayEvent, RelayObserver, RequestContext, StreamEnd, StreamStats};
use crate::relay::upstream::{ChunkStream, UpstreamFailure};

type Chunk = Result<Bytes, UpstreamFailure>;

/// Start relaying `upstream` and return the client body fed by it.
pub fn spawn_relay(
    upstream: ChunkStream,
    idle_timeout: Duration,
    observer: Arc<dyn RelayObserver>,
    ctx: RequestContext,
) -> Body {
    let (tx, rx) = mpsc::channel::<Chunk>(1);

    tokio::spawn(async move {
        let mut upstream = upstream;
        observer.on_event(&ctx, RelayEvent::StreamStarted);
        let (end, stats) = pump(&mut upstream, &tx, idle_timeout, |bytes| {
            observer.on_event(&ctx, RelayEvent::StreamChunk { bytes });
        })
        .await;
        // Release the upstream connection before reporting.
        drop(upstream);
        drop(tx);
        observer.on_event(&ctx, RelayEvent::StreamEnded { end: &end, stats });
    });

    Body::from_stream(receiver_stream(rx))
}

fn receiver_stream(rx: mpsc::Receiver<Chunk>) -> impl futures_util::Stream<Item = Chunk> + Send + 'static {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|chunk| (chunk, rx)) })
}

/// Move chunks from `upstream` to `tx` until one side ends.
async fn pump<F>(
    upstream: &mut ChunkStream,
    tx: &mpsc::Sender<Chunk>,
    idle_timeout: Duration,
    mut on_chunk: F,
) -> (StreamEnd, StreamStats)
where
    F: FnMut(usize),
{
    let mut stats = StreamStats::default();

    loop {
        // Wait for room first so a chunk is only pulled once it can be handed off.
        let permit = match tx.reserve().await {
            Ok(permit) => permit,
            Err(_) => return (StreamEnd::ClientGone, stats),
        };

        let next = tokio::select! {
            biased;
            _ = tx.closed() => return (StreamEnd::ClientGone, stats),
            next = tokio::time::timeout(idle_timeout, upstream.next()) => next,
        };

        match next {
            Ok(Some(Ok(chunk))) => {
                let len = chunk.len();
                stats.record(len);
                permit.send(Ok(chunk));
                on_chunk(len);
            }
            Ok(Some(Err(failure))) => {
                let message = failure.to_string();
                permit.send(Err(failure));
                return (StreamEnd::UpstreamFailed(message), stats);
            }
            Ok(None) => return (StreamEnd::Finished, stats),
            Err(_) => {
                permit.send(Err(UpstreamFailure::Timeout(format!(
                    "no upstream data for {}s",
                    idle_timeout.as_secs()
                ))));
                return (StreamEnd::IdleTimeout, stats);
            }
        }
    }
}
