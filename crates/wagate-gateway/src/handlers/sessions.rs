// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use wagate_core::SessionStatus;
use wagate_session::SessionSnapshot;

use crate::error::ApiError;
use crate::qr::qr_data_url;
use crate::request_id::RequestId;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StartSessionRequest {
    pub session_id: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

impl From<SessionSnapshot> for SessionResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id,
            status: snapshot.status,
            webhook_url: snapshot.webhook_url,
            identity: snapshot.identity,
        }
    }
}

pub async fn start_session(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let snapshot = state
        .manager
        .start(&request.session_id, request.webhook_url)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    Ok((StatusCode::CREATED, Json(snapshot.into())))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    request_id: RequestId,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let sessions = state
        .manager
        .list()
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

pub async fn session_status(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let snapshot = state
        .manager
        .status(&session_id)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    Ok(Json(snapshot.into()))
}

/// Pairing endpoint. While SCANNING_QR the current code is rendered as an SVG
/// data URL; an already-connected session short-circuits, and any other state
/// reports pending without an error.
pub async fn session_qr(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state
        .manager
        .status(&session_id)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;

    let body = if snapshot.status == SessionStatus::Connected {
        json!({
            "sessionId": snapshot.session_id,
            "status": snapshot.status,
            "message": "session is already connected",
        })
    } else if let Some(payload) = snapshot.qr.as_deref() {
        let data_url = qr_data_url(payload).map_err(|e| ApiError::new(e, &request_id.0))?;
        json!({
            "sessionId": snapshot.session_id,
            "status": snapshot.status,
            "qr": data_url,
        })
    } else {
        json!({
            "sessionId": snapshot.session_id,
            "status": snapshot.status,
            "message": "pairing code not yet available",
        })
    };
    Ok(Json(body))
}

pub async fn stop_session(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .manager
        .stop(&session_id)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    Ok(Json(json!({ "sessionId": session_id, "status": SessionStatus::Stopped })))
}

pub async fn logout_session(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .manager
        .logout(&session_id)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    Ok(Json(json!({ "sessionId": session_id, "loggedOut": true })))
}
