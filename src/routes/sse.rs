// Live queries over server-sent events
use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::error::AppResult;

/// One `snapshot` event per delivery carrying the full JSON array. A failed
/// snapshot becomes an `error` event; the stream stays open. Dropping the
/// response (client disconnect) drops the underlying subscription.
pub fn snapshots<T, S>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + 'static,
    S: Stream<Item = AppResult<Vec<T>>> + Send + 'static,
{
    let events = stream.map(|snapshot| {
        let event = match snapshot {
            Ok(rows) => Event::default().event("snapshot").json_data(&rows),
            Err(e) => {
                tracing::warn!("Live query failed: {}", e);
                let message = if e.status().is_server_error() {
                    "Internal server error".to_string()
                } else {
                    e.to_string()
                };
                Event::default()
                    .event("error")
                    .json_data(serde_json::json!({ "error": e.kind(), "message": message }))
            }
        };
        Ok(event.unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
