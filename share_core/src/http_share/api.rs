//! JSON endpoints under `/api`

use super::websocket::ShareState;
use crate::error::SignalError;
use crate::{FileDescriptor, HealthSnapshot};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceRequest {
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub file_type: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceResponse {
    pub success: bool,
    pub otp: String,
    pub owner_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub otp: Option<String>,
    pub downloader_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    #[serde(flatten)]
    pub file: FileDescriptor,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    kind: &'static str,
}

impl IntoResponse for SignalError {
    fn into_response(self) -> Response {
        let status = match self {
            SignalError::NotFound(_) => StatusCode::NOT_FOUND,
            SignalError::TargetOffline(_) => StatusCode::CONFLICT,
            SignalError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            SignalError::CodeSpaceExhausted => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

fn malformed_body(rejection: JsonRejection) -> SignalError {
    SignalError::malformed(rejection.body_text())
}

pub async fn health(State(state): State<Arc<ShareState>>) -> Json<HealthSnapshot> {
    Json(state.hub.health().await)
}

pub async fn announce_file(
    State(state): State<Arc<ShareState>>,
    payload: Result<Json<AnnounceRequest>, JsonRejection>,
) -> Result<Json<AnnounceResponse>, SignalError> {
    let Json(req) = payload.map_err(malformed_body)?;

    let (file_name, file_size) = match (req.file_name, req.file_size) {
        (Some(name), Some(size)) if !name.trim().is_empty() => (name, size),
        _ => return Err(SignalError::malformed("fileName and fileSize are required")),
    };

    let file = FileDescriptor::new(file_name, file_size, req.file_type);
    if let Some(hint) = req.owner_id.as_deref() {
        tracing::debug!("Ignoring ownerId {} on HTTP announce", hint);
    }
    let (otp, owner) = state.hub.announce_http(file).await?;

    Ok(Json(AnnounceResponse {
        success: true,
        otp,
        owner_id: owner.as_str().to_string(),
        message: "File announced successfully".to_string(),
    }))
}

pub async fn request_download(
    State(state): State<Arc<ShareState>>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<DownloadResponse>, SignalError> {
    let Json(req) = payload.map_err(malformed_body)?;
    let otp = req
        .otp
        .filter(|otp| !otp.trim().is_empty())
        .ok_or_else(|| SignalError::malformed("otp is required"))?;

    let file = state.hub.request_http(otp.trim()).await?;
    tracing::info!(
        "Download requested for: {} with code {} by {}",
        file.name,
        otp,
        req.downloader_id.as_deref().unwrap_or("anonymous")
    );

    Ok(Json(DownloadResponse {
        success: true,
        file,
        message: "File info retrieved successfully".to_string(),
    }))
}

/// Fallback for unknown routes when no static directory is served
pub async fn not_found() -> SignalError {
    SignalError::not_found("no such route")
}
