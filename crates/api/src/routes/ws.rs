use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use common::PlatformEvent;

use crate::{auth::unauthorized, AppState};

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/events", get(ws_events_handler))
}

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket endpoint streaming platform events as JSON text frames.
/// Auth via query param `?token=<DASHBOARD_TOKEN>` (browsers can't set
/// custom WS headers).
async fn ws_events_handler(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> Response {
    let authed = q
        .token
        .as_deref()
        .map(|t| t == state.dashboard_token)
        .unwrap_or(false);

    if !authed {
        return unauthorized();
    }

    let Some(ws) = ws else {
        return (StatusCode::BAD_REQUEST, "expected a websocket upgrade").into_response();
    };
    let events = state.events.subscribe();
    ws.on_upgrade(move |socket| handle_ws(socket, events))
}

async fn handle_ws(mut socket: WebSocket, mut events: broadcast::Receiver<PlatformEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize event");
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    debug!("WebSocket client disconnected");
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!(dropped = n, "WebSocket event client lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::router;
    use crate::test_support::{get, state, TOKEN};

    #[tokio::test]
    async fn event_stream_checks_the_query_token() {
        let (state, _) = state();
        let app = router(state);

        let wrong = app.clone().oneshot(get("/ws/events?token=wrong", None)).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let missing = app.clone().oneshot(get("/ws/events", None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let plain_get = app.oneshot(get(&format!("/ws/events?token={TOKEN}"), None)).await.unwrap();
        assert_eq!(plain_get.status(), StatusCode::BAD_REQUEST);
    }
}
