use api_types::analysis::AnalysisView;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use engine::User;

use crate::{ServerError, server::ServerState, views::analysis_view};

pub async fn get(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
) -> Result<Json<AnalysisView>, ServerError> {
    let analysis = state.engine.analysis(group_id, user.id).await?;
    Ok(Json(analysis_view(&analysis)))
}

pub async fn export_csv(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ServerError> {
    let csv = state
        .engine
        .export_csv(group_id, user.id)
        .await
        .map_err(ServerError::action("export"))?;
    let disposition = format!("attachment; filename=\"group-{group_id}.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
