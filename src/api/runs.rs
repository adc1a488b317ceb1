//! Dispatch run endpoints.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::{DispatchReport, ProgressSnapshot};
use crate::error::{AppError, Result};
use crate::metrics::RunMetrics;
use crate::server::AppState;
use crate::template::{MergeTemplate, Record};

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub template: MergeTemplate,
    pub recipients: Vec<Record>,
}

#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub run_id: Uuid,
    pub total: usize,
}

/// A terminal report with its human-readable summary
#[derive(Debug, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: DispatchReport,
    pub summary: String,
}

impl From<DispatchReport> for ReportView {
    fn from(report: DispatchReport) -> Self {
        Self {
            summary: report.summary(),
            report,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub progress: ProgressSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportView>,
}

#[derive(Debug, Serialize)]
pub struct AbortRunResponse {
    pub run_id: Uuid,
    /// The run had already stopped; nothing was cancelled
    pub already_finished: bool,
}

fn run_not_found(run_id: &Uuid) -> AppError {
    AppError::NotFound(format!("Run {} not found", run_id))
}

/// POST /api/v1/runs - Validate and start a dispatch run
#[tracing::instrument(
    name = "http.start_run",
    skip(state, request),
    fields(recipients = request.recipients.len())
)]
pub async fn start_run(
    State(state): State<AppState>,
    Json(request): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<StartRunResponse>)> {
    let total = request.recipients.len();

    let handle = state
        .runs
        .start(request.template, request.recipients)
        .inspect_err(|error| {
            RunMetrics::record_rejected();
            tracing::warn!(error = %error, "Run rejected");
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartRunResponse {
            run_id: handle.id,
            total,
        }),
    ))
}

/// GET /api/v1/runs/{id} - Latest progress and, once finished, the report
#[tracing::instrument(name = "http.get_run", skip(state))]
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunStatusResponse>> {
    let handle = state.runs.get(&run_id).ok_or_else(|| run_not_found(&run_id))?;

    Ok(Json(RunStatusResponse {
        run_id,
        started_at: handle.started_at,
        progress: handle.snapshot(),
        report: handle.report().map(ReportView::from),
    }))
}

/// DELETE /api/v1/runs/{id} - Stop a run before its next recipient
#[tracing::instrument(name = "http.abort_run", skip(state))]
pub async fn abort_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<(StatusCode, Json<AbortRunResponse>)> {
    let handle = state.runs.get(&run_id).ok_or_else(|| run_not_found(&run_id))?;
    let already_finished = handle.is_finished();

    if !already_finished {
        state.runs.abort(&run_id);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(AbortRunResponse {
            run_id,
            already_finished,
        }),
    ))
}

/// GET /api/v1/runs/{id}/events - SSE stream of `progress` events then one `report`
#[tracing::instrument(name = "http.run_events", skip(state))]
pub async fn run_events(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let handle = state.runs.get(&run_id).ok_or_else(|| run_not_found(&run_id))?;
    let mut progress = handle.progress_receiver();
    let mut report = handle.report_receiver();

    let stream = async_stream::stream! {
        loop {
            let snapshot = progress.borrow_and_update().clone();
            yield Ok(json_event("progress", &snapshot));
            if snapshot.finished || progress.changed().await.is_err() {
                break;
            }
        }

        let final_report = match report.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        if let Some(final_report) = final_report {
            yield Ok(json_event("report", &ReportView::from(final_report)));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn json_event<T: Serialize>(name: &str, data: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, event = name, "Failed to serialize SSE event");
            Event::default().event("error").data(e.to_string())
        })
}
