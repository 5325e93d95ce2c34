use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::assets::AssetError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    PayloadTooLarge(String),
    UnsupportedMediaType(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(m)
            | Self::PayloadTooLarge(m)
            | Self::UnsupportedMediaType(m)
            | Self::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl From<AssetError> for AppError {
    fn from(e: AssetError) -> Self {
        match e {
            AssetError::Empty => Self::BadRequest(e.to_string()),
            AssetError::TooLarge { .. } => Self::PayloadTooLarge(e.to_string()),
            AssetError::UnsupportedType(_) => Self::UnsupportedMediaType(e.to_string()),
            AssetError::Io(_) => {
                tracing::error!(error = %e, "Asset storage failed");
                Self::Internal("asset storage failed".to_string())
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Self::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
            Self::UnsupportedMediaType(m) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, m.clone()),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
