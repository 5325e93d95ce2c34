use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use bytes::Bytes;
use serde::Serialize;

use tilespin_core::SessionSnapshot;

use crate::error::AppError;
use crate::state::AppState;

/// Response for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub asset_url: String,
}

/// GET /api/v1/status: current session snapshot.
pub async fn get_status(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let mgr = state.session.read().await;
    Json(mgr.snapshot())
}

/// POST /api/v1/assets: store an uploaded image and make it the session's
/// current puzzle image.
pub async fn upload_asset(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::UnsupportedMediaType("missing content type".to_string()))?;

    let asset_url = state.assets.publish(&body, content_type).await?;

    {
        let mut mgr = state.session.write().await;
        mgr.publish_asset(asset_url.clone());
    }
    tracing::info!(asset_url = %asset_url, "Asset published");

    Ok((StatusCode::CREATED, Json(UploadResponse { asset_url })))
}
