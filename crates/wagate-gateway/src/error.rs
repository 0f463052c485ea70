// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error responses for the HTTP API.
//!
//! Every error body has the same shape: `{status, message, code, requestId}`,
//! with `code` being the stable machine-readable identifier from
//! [`WagateError::code`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use wagate_core::WagateError;

/// An API error paired with the request's correlation id.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: &'static str,
    request_id: String,
}

impl ApiError {
    pub fn new(error: WagateError, request_id: impl Into<String>) -> Self {
        Self {
            status: status_for(&error),
            message: error.to_string(),
            code: error.code(),
            request_id: request_id.into(),
        }
    }

    pub fn unauthorized(request_id: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "invalid or missing API key".to_string(),
            code: "UNAUTHORIZED",
            request_id: request_id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(error: &WagateError) -> StatusCode {
    match error {
        WagateError::NotFound { .. } => StatusCode::NOT_FOUND,
        WagateError::Ownership { .. } => StatusCode::FORBIDDEN,
        WagateError::Validation(_) => StatusCode::BAD_REQUEST,
        WagateError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        WagateError::Transport { .. } => StatusCode::BAD_GATEWAY,
        WagateError::Config(_) | WagateError::Storage { .. } | WagateError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = self.status.as_u16(),
                code = self.code,
                request_id = %self.request_id,
                "request failed: {}",
                self.message
            );
        } else {
            tracing::debug!(
                status = self.status.as_u16(),
                code = self.code,
                request_id = %self.request_id,
                "request rejected: {}",
                self.message
            );
        }

        let body = json!({
            "status": self.status.as_u16(),
            "message": self.message,
            "code": self.code,
            "requestId": self.request_id,
        });
        (self.status, Json(body)).into_response()
    }
}
