//! Group membership endpoints.

use api_types::member::{MemberAdd, MemberView};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use engine::User;

use crate::{ServerError, json::ValidJson, server::ServerState, views::member_view};

pub async fn list(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
) -> Result<Json<Vec<MemberView>>, ServerError> {
    let members = state.engine.members(group_id, user.id).await?;
    Ok(Json(members.iter().map(member_view).collect()))
}

pub async fn add(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    ValidJson(payload): ValidJson<MemberAdd>,
) -> Result<Json<Vec<MemberView>>, ServerError> {
    let members = state
        .engine
        .add_member(group_id, payload.member_id, user.id)
        .await
        .map_err(ServerError::action("add_member"))?;
    Ok(Json(members.iter().map(member_view).collect()))
}

pub async fn remove(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path((group_id, member_id)): Path<(i64, i64)>,
) -> Result<Json<Vec<MemberView>>, ServerError> {
    let members = state
        .engine
        .remove_member(group_id, member_id, user.id)
        .await
        .map_err(ServerError::action("remove_member"))?;
    Ok(Json(members.iter().map(member_view).collect()))
}
