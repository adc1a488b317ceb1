//! Template preview, export and variable discovery endpoints.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::template::{
    export_messages, missing_fields, referenced_fields, MergeTemplate, Record, RenderedMessage,
};

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub template: MergeTemplate,
    pub recipients: Vec<Record>,
    /// Zero-based recipient to render
    #[serde(default)]
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub index: usize,
    pub total: usize,
    pub message: RenderedMessage,
    /// Whether the rendered destination is usable
    pub has_destination: bool,
    /// Referenced fields this recipient does not provide
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub template: MergeTemplate,
    pub recipients: Vec<Record>,
}

#[derive(Debug, Deserialize)]
pub struct VariablesRequest {
    pub template: MergeTemplate,
    #[serde(default)]
    pub recipients: Vec<Record>,
}

#[derive(Debug, Serialize)]
pub struct VariablesResponse {
    /// Distinct fields referenced by the template, in first-seen order
    pub variables: Vec<String>,
    /// Referenced fields missing from the first recipient
    pub missing_fields: Vec<String>,
}

/// POST /api/v1/merge/preview - Render one recipient
#[tracing::instrument(
    name = "http.merge_preview",
    skip(request),
    fields(index = request.index, recipients = request.recipients.len())
)]
pub async fn preview(Json(request): Json<PreviewRequest>) -> Result<Json<PreviewResponse>> {
    let total = request.recipients.len();
    let record = request.recipients.get(request.index).ok_or_else(|| {
        AppError::Validation(format!(
            "Recipient index {} out of range for {} recipients",
            request.index, total
        ))
    })?;

    let message = request.template.render(record);

    Ok(Json(PreviewResponse {
        index: request.index,
        total,
        has_destination: message.has_destination(),
        missing_fields: missing_fields(&request.template, record),
        message,
    }))
}

/// POST /api/v1/merge/export - Plain-text export of every personalized message
#[tracing::instrument(
    name = "http.merge_export",
    skip(request),
    fields(recipients = request.recipients.len())
)]
pub async fn export(Json(request): Json<ExportRequest>) -> Result<impl IntoResponse> {
    if request.recipients.is_empty() {
        return Err(AppError::Validation("No recipients loaded".to_string()));
    }

    let text = export_messages(&request.template, &request.recipients);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"mail-merge-export.txt\"",
            ),
        ],
        text,
    ))
}

/// POST /api/v1/merge/variables - Fields referenced by a template
pub async fn variables(Json(request): Json<VariablesRequest>) -> Json<VariablesResponse> {
    let missing = request
        .recipients
        .first()
        .map(|record| missing_fields(&request.template, record))
        .unwrap_or_default();

    Json(VariablesResponse {
        variables: referenced_fields(&request.template),
        missing_fields: missing,
    })
}
