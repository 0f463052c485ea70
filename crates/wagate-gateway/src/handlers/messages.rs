// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send endpoints and the message log.
//!
//! Send handlers admit (session must be live and CONNECTED) and enqueue; the
//! message worker owns delivery, retries, and rate limiting. The HTTP
//! response carries the durable job id, not a delivery receipt.

use std::collections::HashMap;
use std::path::PathBuf;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use wagate_core::{MediaType, OutboundJob, SessionStatus, WagateError};
use wagate_messaging::submit;
use wagate_storage::models::MessageLog;
use wagate_storage::queries::messages;

use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::server::AppState;

const MAX_FILES_PER_REQUEST: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendTextRequest {
    pub to: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMediaRequest {
    pub to: String,
    pub media_type: MediaType,
    pub media_url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendTemplateRequest {
    pub to: String,
    pub template_name: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// Admission check shared by the send endpoints: the session must exist and
/// be live in the CONNECTED state before a job is accepted.
async fn ensure_connected(state: &AppState, session_id: &str) -> Result<(), WagateError> {
    match state.manager.store().status(session_id) {
        Some(SessionStatus::Connected) => Ok(()),
        Some(status) => Err(WagateError::Validation(format!(
            "session {session_id} is not connected (status {status})"
        ))),
        None => {
            // Distinguish "exists but offline" from "unknown".
            state.manager.status(session_id).await?;
            Err(WagateError::Validation(format!(
                "session {session_id} is not connected"
            )))
        }
    }
}

async fn accept(
    state: &AppState,
    request_id: &RequestId,
    job: OutboundJob,
) -> Result<i64, ApiError> {
    ensure_connected(state, job.session_id())
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    submit(&state.db, &job, state.config.message_queue.max_attempts)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))
}

pub async fn send_text(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    request_id: RequestId,
    Json(request): Json<SendTextRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let job = OutboundJob::Text {
        session_id,
        to: request.to,
        message: request.message,
    };
    let job_id = accept(&state, &request_id, job).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued", "jobId": job_id }))))
}

pub async fn send_media(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    request_id: RequestId,
    Json(request): Json<SendMediaRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let job = OutboundJob::Media {
        session_id,
        to: request.to,
        media_type: request.media_type,
        media_url: request.media_url,
        caption: request.caption,
    };
    let job_id = accept(&state, &request_id, job).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued", "jobId": job_id }))))
}

pub async fn send_template(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    request_id: RequestId,
    Json(request): Json<SendTemplateRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let job = OutboundJob::Template {
        session_id,
        to: request.to,
        template_name: request.template_name,
        variables: request.variables,
    };
    let job_id = accept(&state, &request_id, job).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued", "jobId": job_id }))))
}

/// Multipart file send: a `to` text field, up to ten `files` parts, and
/// optional `caption` fields aligned positionally with the files.
///
/// Each uploaded blob is written under the upload directory and owned by its
/// queue job from this point on; the worker deletes it at the job's terminal
/// outcome.
pub async fn send_file(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    request_id: RequestId,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let fail = |e: WagateError| ApiError::new(e, &request_id.0);

    let mut to: Option<String> = None;
    let mut captions: Vec<String> = Vec::new();
    let mut files: Vec<(String, String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| fail(WagateError::Validation(format!("invalid multipart body: {e}"))))?
    {
        match field.name() {
            Some("to") => {
                to = Some(read_text(field).await.map_err(fail)?);
            }
            Some("caption") => {
                captions.push(read_text(field).await.map_err(fail)?);
            }
            Some("files") | Some("file") => {
                if files.len() >= MAX_FILES_PER_REQUEST {
                    return Err(fail(WagateError::Validation(format!(
                        "too many files: at most {MAX_FILES_PER_REQUEST} per request"
                    ))));
                }
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload.bin".to_string());
                let mime_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    fail(WagateError::Validation(format!("failed to read file part: {e}")))
                })?;
                files.push((file_name, mime_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let to = to.ok_or_else(|| fail(WagateError::Validation("missing to field".into())))?;
    if files.is_empty() {
        return Err(fail(WagateError::Validation("no files in request".into())));
    }

    ensure_connected(&state, &session_id).await.map_err(fail)?;

    let upload_dir = PathBuf::from(&state.config.storage.upload_dir);
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| fail(WagateError::Internal(format!("cannot create upload dir: {e}"))))?;

    let mut job_ids = Vec::with_capacity(files.len());
    for (index, (file_name, mime_type, bytes)) in files.into_iter().enumerate() {
        let blob_path = upload_dir.join(format!(
            "{}_{}",
            uuid::Uuid::new_v4(),
            sanitize_file_name(&file_name)
        ));
        tokio::fs::write(&blob_path, &bytes)
            .await
            .map_err(|e| fail(WagateError::Internal(format!("cannot store upload: {e}"))))?;

        let job = OutboundJob::File {
            session_id: session_id.clone(),
            to: to.clone(),
            path: blob_path.to_string_lossy().into_owned(),
            mime_type,
            file_name,
            caption: captions.get(index).cloned(),
        };
        let job_id = submit(&state.db, &job, state.config.message_queue.max_attempts)
            .await
            .map_err(fail)?;
        job_ids.push(job_id);
    }

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued", "jobIds": job_ids }))))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, WagateError> {
    field
        .text()
        .await
        .map_err(|e| WagateError::Validation(format!("invalid text field: {e}")))
}

/// Keep only characters safe for a filename on disk.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLogResponse {
    pub id: i64,
    pub session_id: String,
    pub direction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub timestamp: String,
}

impl From<MessageLog> for MessageLogResponse {
    fn from(log: MessageLog) -> Self {
        Self {
            id: log.id,
            session_id: log.session_id,
            direction: log.direction,
            message_id: log.message_id,
            recipient: log.recipient,
            message_type: log.message_type,
            content_preview: log.content_preview,
            status: log.status,
            timestamp: log.timestamp,
        }
    }
}

pub async fn message_log(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    request_id: RequestId,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<MessageLogResponse>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);
    let logs = messages::find_recent(&state.db, Some(&session_id), limit, offset)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}
