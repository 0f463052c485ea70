// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template CRUD endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use wagate_core::WagateError;
use wagate_storage::models::Template;
use wagate_storage::queries::templates;

use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTemplateRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Template> for TemplateResponse {
    fn from(template: Template) -> Self {
        Self {
            id: template.id,
            name: template.name,
            content: template.content,
            language: template.language,
            category: template.category,
            created_at: template.created_at,
            updated_at: template.updated_at,
        }
    }
}

pub async fn create_template(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), ApiError> {
    let fail = |e: WagateError| ApiError::new(e, &request_id.0);

    if request.name.trim().is_empty() {
        return Err(fail(WagateError::Validation("template name is required".into())));
    }
    if templates::get_by_name(&state.db, &request.name)
        .await
        .map_err(fail)?
        .is_some()
    {
        return Err(fail(WagateError::Validation(format!(
            "template {} already exists",
            request.name
        ))));
    }

    let template = templates::create(
        &state.db,
        &request.name,
        &request.content,
        request.language.as_deref(),
        request.category.as_deref(),
    )
    .await
    .map_err(fail)?;
    Ok((StatusCode::CREATED, Json(template.into())))
}

pub async fn list_templates(
    State(state): State<AppState>,
    request_id: RequestId,
) -> Result<Json<Vec<TemplateResponse>>, ApiError> {
    let all = templates::list(&state.db)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    Ok(Json(all.into_iter().map(Into::into).collect()))
}

pub async fn get_template(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(name): Path<String>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let template = templates::get_by_name(&state.db, &name)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?
        .ok_or_else(|| {
            ApiError::new(
                WagateError::NotFound {
                    resource: "template",
                    id: name.clone(),
                },
                &request_id.0,
            )
        })?;
    Ok(Json(template.into()))
}

pub async fn update_template(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(name): Path<String>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let template = templates::update(
        &state.db,
        &name,
        request.content.as_deref(),
        request.language.as_deref(),
        request.category.as_deref(),
    )
    .await
    .map_err(|e| ApiError::new(e, &request_id.0))?
    .ok_or_else(|| {
        ApiError::new(
            WagateError::NotFound {
                resource: "template",
                id: name.clone(),
            },
            &request_id.0,
        )
    })?;
    Ok(Json(template.into()))
}

pub async fn delete_template(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = templates::delete(&state.db, &name)
        .await
        .map_err(|e| ApiError::new(e, &request_id.0))?;
    if !deleted {
        return Err(ApiError::new(
            WagateError::NotFound {
                resource: "template",
                id: name,
            },
            &request_id.0,
        ));
    }
    Ok(Json(json!({ "deleted": true })))
}
