// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the API routes.
//!
//! A single shared secret in the `X-API-Key` header. When no key is
//! configured, all requests are rejected (fail-closed) so a missing config
//! value can never expose the API.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::request_id::request_id_of;

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected API key. `None` rejects every request.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Middleware that validates the `X-API-Key` header.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = request_id_of(&request);

    let Some(ref expected) = auth.api_key else {
        tracing::error!("gateway has no api key configured, rejecting request");
        return Err(ApiError::unauthorized(request_id));
    };

    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == expected => Ok(next.run(request).await),
        _ => Err(ApiError::unauthorized(request_id)),
    }
}
