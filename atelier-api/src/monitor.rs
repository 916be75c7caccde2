use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::state::AppState;

/// GET /v1/admin/monitor/stream — live reservation lifecycle events for the
/// admin dashboard. Backed by the in-process broadcast channel, so a lagging
/// browser drops events rather than slowing writers down.
pub async fn monitor_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.monitor_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let name = event.topic();
                let data = serde_json::to_string(&event).unwrap_or_default();
                Some(Ok(Event::default().event(name).data(data)))
            }
            // Lagged receiver: skip and keep streaming.
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
