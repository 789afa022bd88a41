//! Test doubles for the relay seams.

use axum::body::Bytes;
use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::relay::observer::{RelayEvent, RelayObserver, RequestContext};
use crate::relay::upstream::{
    ChunkStream, UpstreamClient, UpstreamFailure, UpstreamRequest, UpstreamResponse,
};

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Yields `first`, then never ends. Sets `dropped` when the stream is dropped.
pub fn hanging_stream(first: &'static str, dropped: Arc<AtomicBool>) -> ChunkStream {
    let guard = DropFlag(dropped);
    stream::once(async move { Ok(Bytes::from_static(first.as_bytes())) })
        .chain(stream::pending())
        .map(move |item| {
            let _keep = &guard;
            item
        })
        .boxed()
}

/// Yields each chunk after sleeping `delay`.
pub fn delayed_chunks(chunks: &[&'static str], delay: Duration) -> ChunkStream {
    let chunks: Vec<Bytes> = chunks.iter().map(|c| Bytes::from_static(c.as_bytes())).collect();
    stream::iter(chunks)
        .then(move |chunk| async move {
            tokio::time::sleep(delay).await;
            Ok(chunk)
        })
        .boxed()
}

type Reply = Box<dyn Fn() -> Result<UpstreamResponse, UpstreamFailure> + Send + Sync>;

/// Scripted upstream that counts and records calls.
pub struct FakeUpstream {
    calls: AtomicUsize,
    requests: Mutex<Vec<UpstreamRequest>>,
    reply: Reply,
}

impl FakeUpstream {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn() -> Result<UpstreamResponse, UpstreamFailure> + Send + Sync + 'static,
    {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        }
    }

    /// Single-chunk body with the given status.
    pub fn respond(status: u16, body: &'static str) -> Self {
        Self::new(move || {
            Ok(response(status, stream::iter([Ok(Bytes::from_static(body.as_bytes()))]).boxed()))
        })
    }

    /// 200 whose body is produced by `make_body` on every call.
    pub fn streaming<F>(make_body: F) -> Self
    where
        F: Fn() -> ChunkStream + Send + Sync + 'static,
    {
        Self::new(move || Ok(response(200, make_body())))
    }

    pub fn failing(failure: UpstreamFailure) -> Self {
        Self::new(move || Err(failure.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<UpstreamRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

fn response(status: u16, body: ChunkStream) -> UpstreamResponse {
    UpstreamResponse {
        status: StatusCode::from_u16(status).unwrap(),
        body,
    }
}

impl UpstreamClient for FakeUpstream {
    fn send(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse, UpstreamFailure>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let reply = (self.reply)();
        async move { reply }.boxed()
    }
}

/// Records the outcome label of every event.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == label).count()
    }

    /// Poll until `label` has been recorded, failing after two seconds.
    pub async fn wait_for(&self, label: &str) {
        let found = tokio::time::timeout(Duration::from_secs(2), async {
            while self.count(label) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(found.is_ok(), "event '{}' never recorded, saw {:?}", label, self.events());
    }
}

impl RelayObserver for RecordingObserver {
    fn on_event(&self, _ctx: &RequestContext, event: RelayEvent<'_>) {
        let label = match event {
            RelayEvent::Preflight => "preflight".to_string(),
            RelayEvent::Dispatched { .. } => "dispatched".to_string(),
            RelayEvent::Relayed { .. } => "relayed".to_string(),
            RelayEvent::Failed { error } => error.outcome().to_string(),
            RelayEvent::StreamStarted => "stream_started".to_string(),
            RelayEvent::StreamChunk { .. } => "chunk".to_string(),
            RelayEvent::StreamEnded { end, .. } => end.outcome().to_string(),
        };
        self.events.lock().unwrap().push(label);
    }
}
