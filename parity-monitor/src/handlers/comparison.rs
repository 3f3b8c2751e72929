use axum::extract::{Query, State};
use axum::Json;
use parity_engine::ComparisonResult;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::app::AppState;
use crate::error::{ApiError, TargetFileError};
use crate::targets::{read_targets_file, Targets};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub team_ids: Option<Vec<String>>,
    pub channel_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileQuery {
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub success: bool,
    pub team_count: usize,
    pub channel_count: usize,
    pub comparison_count: usize,
    pub results: Vec<ComparisonResult>,
}

#[instrument(skip_all)]
pub async fn run(
    State(state): State<AppState>,
    body: Option<Json<RunRequest>>,
) -> Result<Json<RunResponse>, ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    execute(&state, request.team_ids, request.channel_ids).await
}

#[instrument(skip_all)]
pub async fn run_from_file(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> Result<Json<RunResponse>, ApiError> {
    let path = query
        .file_path
        .filter(|path| !path.is_empty())
        .ok_or(ApiError::MissingFilePath)?;

    let Targets {
        team_ids,
        channel_ids,
    } = read_targets_file(&path).await.map_err(|e| {
        error!(path = %path, "failed to read targets file: {}", e);
        e
    })?;

    if team_ids.is_none() && channel_ids.is_none() {
        return Err(TargetFileError::NoTargets.into());
    }

    execute(&state, team_ids, channel_ids).await
}

async fn execute(
    state: &AppState,
    team_ids: Option<Vec<String>>,
    channel_ids: Option<Vec<String>>,
) -> Result<Json<RunResponse>, ApiError> {
    let run = state
        .scheduler
        .run_manual_comparison(team_ids.as_deref(), channel_ids.as_deref())
        .await
        .map_err(|e| {
            error!("on-demand comparison failed: {}", e);
            e
        })?;

    info!(
        channels = run.channel_ids.len(),
        comparisons = run.results.len(),
        "on-demand comparison completed"
    );

    Ok(Json(RunResponse {
        success: true,
        team_count: team_ids.map_or(0, |ids| ids.len()),
        channel_count: channel_ids.map_or(0, |ids| ids.len()),
        comparison_count: run.results.len(),
        results: run.results,
    }))
}
