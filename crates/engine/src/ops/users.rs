use chrono::Utc;
use sea_orm::{
    ActiveValue, QueryFilter, TransactionTrait, prelude::*, sea_query::OnConflict,
};

use crate::{EngineError, ResultEngine, User, users, util::normalize_required_name};

use super::{Engine, with_tx};

impl Engine {
    /// Returns the user behind a verified token subject, creating it on
    /// first sight and refreshing the display name when it changed.
    pub async fn resolve_user(&self, external_id: &str, name: &str) -> ResultEngine<User> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(EngineError::Validation(
                "user subject must not be empty".to_string(),
            ));
        }
        let name = normalize_required_name(name, "user")?;
        with_tx!(self, |db_tx| {
            users::Entity::insert(users::new_active(external_id, &name, Utc::now()))
                .on_conflict(
                    OnConflict::column(users::Column::ExternalId)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&db_tx)
                .await?;

            let model = users::Entity::find()
                .filter(users::Column::ExternalId.eq(external_id))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;

            let model = if model.name == name {
                model
            } else {
                let active = users::ActiveModel {
                    id: ActiveValue::Set(model.id),
                    name: ActiveValue::Set(name.clone()),
                    ..Default::default()
                };
                active.update(&db_tx).await?
            };
            Ok(User::from(model))
        })
    }

    /// Looks a user up by token subject without creating it.
    pub async fn user_by_external_id(&self, external_id: &str) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let model = users::Entity::find()
                .filter(users::Column::ExternalId.eq(external_id.trim()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;
            Ok(User::from(model))
        })
    }
}
