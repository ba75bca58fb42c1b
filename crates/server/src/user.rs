use api_types::user::Me;
use axum::{Extension, Json};
use engine::User;

use crate::views::me_view;

/// The principal resolved from the bearer token.
pub async fn me(Extension(user): Extension<User>) -> Json<Me> {
    Json(me_view(&user))
}
