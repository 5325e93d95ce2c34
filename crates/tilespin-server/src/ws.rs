use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{FromRequest, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use tilespin_core::net::protocol::{MAX_MESSAGE_SIZE, ProtocolError, decode_client_message};
use tilespin_core::time::now_millis;

use crate::fanout::{ConnectionId, Role};
use crate::session_manager::FollowUp;
use crate::state::{AppState, ConnectionGuard};

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub role: Option<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let Some(guard) = ConnectionGuard::try_acquire(Arc::clone(&state.ws_connection_count), max_ws)
    else {
        tracing::warn!(max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    // Upgrade manually so the cap is checked before the handshake.
    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let role = Role::from_query(params.role.as_deref());
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, role, guard))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, role: Role, _guard: ConnectionGuard) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);

    // Writer first, so the init-ack queued by `connect` drains immediately.
    spawn_writer(ws_sender, rx);

    let (conn_id, player_id) = {
        let mut mgr = state.session.write().await;
        mgr.connect(role, tx)
    };

    read_loop(&mut ws_receiver, &state, conn_id).await;

    // Dropping the fanout's sender also ends the writer task.
    state.session.write().await.disconnect(conn_id);

    tracing::info!(conn_id, player_id, "Connection closed");
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    conn_id: ConnectionId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            Message::Text(_) => {
                tracing::debug!(conn_id, "Ignoring text frame");
                continue;
            },
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(conn_id, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            tracing::debug!(conn_id, len = data.len(), "Dropping empty or oversized frame");
            continue;
        }

        let client_msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(ProtocolError::UnexpectedMessageType(msg_type)) => {
                tracing::warn!(conn_id, ?msg_type, "Rejected server-only message from client");
                continue;
            },
            Err(e) => {
                tracing::debug!(conn_id, error = %e, "Dropping malformed message");
                continue;
            },
        };

        let follow_up = {
            let mut mgr = state.session.write().await;
            mgr.handle_message(conn_id, client_msg, now_millis())
        };

        if let FollowUp::DeleteAssets(urls) = follow_up {
            spawn_asset_cleanup(state, urls);
        }
    }
}

/// Remove the images a reset retired without holding up the session.
/// Uploads that land after the reset are not in `urls` and survive.
pub(crate) fn spawn_asset_cleanup(state: &AppState, urls: Vec<String>) {
    if urls.is_empty() {
        return;
    }
    let assets = Arc::clone(&state.assets);
    tokio::spawn(async move {
        let removed = assets.delete_urls(&urls).await;
        tracing::info!(removed, retired = urls.len(), "Deleted assets after reset");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_refills() {
        let mut limiter = RateLimiter::new(2.0, 2.0);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        tokio::time::advance(std::time::Duration::from_millis(600)).await;
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
