// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inspection endpoint for terminally failed webhook deliveries.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use wagate_storage::models::WebhookDelivery;
use wagate_storage::queries::webhooks;

use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct FailedQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDeliveryResponse {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub webhook_url: String,
    pub event_type: String,
    pub payload: String,
    pub event_timestamp: String,
    pub attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<String>,
}

impl From<WebhookDelivery> for FailedDeliveryResponse {
    fn from(delivery: WebhookDelivery) -> Self {
        Self {
            id: delivery.id,
            session_id: delivery.session_id,
            webhook_url: delivery.webhook_url,
            event_type: delivery.event_type,
            payload: delivery.payload,
            event_timestamp: delivery.event_timestamp,
            attempts: delivery.attempts,
            last_attempt_at: delivery.last_attempt_at,
        }
    }
}

/// Failed deliveries are retained rather than purged; this surfaces them for
/// operators.
pub async fn failed_deliveries(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(query): Query<FailedQuery>,
) -> Result<Json<Vec<FailedDeliveryResponse>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let failed = webhooks::list_failed(&state.db, limit)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    Ok(Json(failed.into_iter().map(Into::into).collect()))
}
