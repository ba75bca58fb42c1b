//! Groups API endpoints.

use api_types::group::{GroupDetail, GroupNew, GroupSummary, GroupUpdate, OwnerTransfer};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{Currency, GroupCmd, User};

use crate::{
    ServerError,
    json::ValidJson,
    server::ServerState,
    views::{detail_view, kind_from_api, parse_amount, summary_view},
};

pub async fn list(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<GroupSummary>>, ServerError> {
    let groups = state.engine.groups(user.id).await?;
    Ok(Json(groups.iter().map(summary_view).collect()))
}

pub async fn group_new(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    ValidJson(payload): ValidJson<GroupNew>,
) -> Result<(StatusCode, Json<GroupDetail>), ServerError> {
    let currency = match payload.currency {
        Some(currency) => Currency::try_from(currency.code())?,
        None => state.engine.config().default_currency,
    };
    let mut cmd = GroupCmd::new(user.id, payload.name, kind_from_api(payload.kind))
        .currency(currency.code());
    if let Some(limit) = payload.member_limit {
        cmd = cmd.member_limit(limit);
    }
    if let Some(floor) = &payload.min_floor {
        cmd = cmd.min_floor_minor(parse_amount(floor, currency)?.minor());
    }

    let detail = state.engine.new_group(cmd).await?;
    Ok((StatusCode::CREATED, Json(detail_view(&detail, user.id))))
}

pub async fn get(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
) -> Result<Json<GroupDetail>, ServerError> {
    let detail = state.engine.group(group_id, user.id).await?;
    Ok(Json(detail_view(&detail, user.id)))
}

pub async fn update(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    ValidJson(payload): ValidJson<GroupUpdate>,
) -> Result<Json<GroupDetail>, ServerError> {
    if payload.name.is_none() && payload.min_floor.is_none() {
        return Err(ServerError::Generic(
            "provide at least one of name or min_floor".to_string(),
        ));
    }

    let min_floor_minor = match &payload.min_floor {
        Some(floor) => {
            let current = state.engine.group(group_id, user.id).await?;
            Some(parse_amount(floor, current.group.currency)?.minor())
        }
        None => None,
    };
    let update = engine::GroupUpdate {
        name: payload.name,
        min_floor_minor,
    };
    let detail = state
        .engine
        .update_group(group_id, update, user.id)
        .await
        .map_err(ServerError::action("update"))?;
    Ok(Json(detail_view(&detail, user.id)))
}

pub async fn remove(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_group(group_id, user.id)
        .await
        .map_err(ServerError::action("delete"))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .leave_group(group_id, user.id)
        .await
        .map_err(ServerError::action("leave"))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn archive(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
) -> Result<Json<GroupDetail>, ServerError> {
    let detail = state
        .engine
        .archive_group(group_id, user.id)
        .await
        .map_err(ServerError::action("archive"))?;
    Ok(Json(detail_view(&detail, user.id)))
}

pub async fn transfer_owner(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    ValidJson(payload): ValidJson<OwnerTransfer>,
) -> Result<Json<GroupDetail>, ServerError> {
    let detail = state
        .engine
        .transfer_ownership(group_id, payload.member_id, user.id)
        .await
        .map_err(ServerError::action("transfer_ownership"))?;
    Ok(Json(detail_view(&detail, user.id)))
}

pub async fn join(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(code): Path<String>,
) -> Result<Json<GroupDetail>, ServerError> {
    let detail = state
        .engine
        .join_group(&code, user.id)
        .await
        .map_err(ServerError::action("join"))?;
    Ok(Json(detail_view(&detail, user.id)))
}
