use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream;
use futures_util::stream::Stream;

use crate::state::AppState;

/// `GET /api/events` - live event stream.
///
/// One bus subscription per connection, each event delivered as a JSON SSE
/// frame; a keep-alive heartbeat goes out when 30 s pass without traffic.
/// Client disconnect drops the subscription, which unsubscribes it from the
/// bus.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, anyhow::Error>>> {
    let subscription = state.bus.subscribe();

    let stream = stream::unfold(subscription, move |mut subscription| async move {
        match subscription.recv().await {
            Some(event) => {
                let frame = Event::default()
                    .event(event.kind())
                    .json_data(&event)
                    .map_err(Into::into);
                Some((frame, subscription))
            }
            None => None,
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    )
}
