use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use tilespin_core::SessionStatus;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub session: SessionInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
}

#[derive(Serialize)]
pub struct SessionInfo {
    pub status: SessionStatus,
    pub players: usize,
    pub has_asset: bool,
}

/// Returns server status, connection counts and session info as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ws = state.ws_connection_count.load(Ordering::Relaxed);

    let snapshot = {
        let mgr = state.session.read().await;
        mgr.snapshot()
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket: ws },
        session: SessionInfo {
            status: snapshot.status,
            players: snapshot.player_count,
            has_asset: snapshot.asset_url.is_some(),
        },
    })
}
