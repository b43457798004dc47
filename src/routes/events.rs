// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-sent event stream of sync status messages.

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/events", get(sync_events))
}

/// Stream every `SyncEvent` as one JSON `data:` frame.
async fn sync_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.sync.subscribe();
    tracing::debug!("UI subscribed to sync events");

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((Event::default().json_data(&event), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Sync event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
