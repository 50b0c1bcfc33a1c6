//! Progress stream handler.
//!
//! Tails the progress store for one request and pushes snapshots to the
//! client as Server-Sent Events. The stream closes itself after forwarding
//! a terminal snapshot, or after emitting a synthetic error when the store
//! entry never appears within the liveness window.

use std::convert::Infallible;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use scopeguard::ScopeGuard;
use tracing::{debug, warn};

use haul_models::{ProgressSnapshot, RequestId};
use haul_queue::ProgressStore;

use crate::metrics;
use crate::state::AppState;

/// Global counter for active progress streams.
static ACTIVE_SSE_STREAMS: AtomicI64 = AtomicI64::new(0);

/// Poll loop state carried across `unfold` steps.
struct StreamState<F: FnOnce(())> {
    store: Arc<ProgressStore>,
    id: RequestId,
    last: Option<ProgressSnapshot>,
    /// Set when the store first came up empty; cleared on any hit.
    missing_since: Option<Instant>,
    first_poll: bool,
    done: bool,
    _guard: ScopeGuard<(), F>,
}

/// GET /api/progress/:request_id
///
/// Open a Server-Sent Events stream of progress snapshots.
///
/// Each event's data is one JSON snapshot; events are only emitted when the
/// snapshot differs from the last one sent. The stream ends after a terminal
/// snapshot (complete or error), or with a synthetic error snapshot when the
/// store entry stays missing past the liveness window.
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let count = ACTIVE_SSE_STREAMS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_sse_active_streams(count);
    metrics::record_sse_stream_opened();

    debug!(request_id = %request_id, "Progress stream opened");

    // Runs when the stream is dropped, whether it finished or the client
    // disconnected mid-flight.
    let guard = scopeguard::guard((), |_| {
        let count = ACTIVE_SSE_STREAMS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_sse_active_streams(count);
    });

    let poll_interval = state.config.stream_poll_interval;
    let stale_after = state.config.stream_stale_after;

    let initial = StreamState {
        store: Arc::clone(&state.progress),
        id: RequestId::from_string(request_id),
        last: None,
        missing_since: None,
        first_poll: true,
        done: false,
        _guard: guard,
    };

    let stream = stream::unfold(initial, move |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            if !st.first_poll {
                tokio::time::sleep(poll_interval).await;
            }
            st.first_poll = false;

            match poll_store(&st.store, &st.id).await {
                Some(snap) => {
                    st.missing_since = None;
                    if st.last.as_ref() == Some(&snap) {
                        continue;
                    }
                    if snap.is_terminal() {
                        st.done = true;
                    }
                    let event = snapshot_event(&snap);
                    st.last = Some(snap);
                    return Some((event, st));
                }
                None => {
                    let since = *st.missing_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= stale_after {
                        warn!(request_id = %st.id, "Progress stream went stale");
                        st.done = true;
                        return Some((snapshot_event(&ProgressSnapshot::stale()), st));
                    }
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Read the latest snapshot, treating store errors as a miss so a Redis
/// outage surfaces as staleness instead of killing the connection early.
async fn poll_store(store: &ProgressStore, id: &RequestId) -> Option<ProgressSnapshot> {
    match store.read(id).await {
        Ok(snap) => snap,
        Err(e) => {
            warn!(request_id = %id, error = %e, "Progress read failed");
            None
        }
    }
}

/// Serialize a snapshot as an unnamed SSE data event.
fn snapshot_event(snapshot: &ProgressSnapshot) -> Result<SseEvent, Infallible> {
    let json = serde_json::to_string(snapshot)
        .unwrap_or_else(|_| r#"{"error":"serialization failed"}"#.to_string());
    Ok(SseEvent::default().data(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_event_serializes() {
        let event = snapshot_event(&ProgressSnapshot::queued(3));
        assert!(event.is_ok());
    }

    #[test]
    fn test_stale_snapshot_is_terminal() {
        let snap = ProgressSnapshot::stale();
        assert!(snap.is_terminal());
        assert_eq!(snap.error.as_deref(), Some("Progress not found or expired"));
    }
}
