//! Users known to the service.
//!
//! A user row is created the first time a verified bearer token names it;
//! `external_id` is the token subject and never changes, `name` follows the
//! latest token.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

pub type UserId = i64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub external_id: String,
    pub name: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::members::Entity")]
    Memberships,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            external_id: model.external_id,
            name: model.name,
            created_at: model.created_at,
        }
    }
}

pub(crate) fn new_active(external_id: &str, name: &str, now: DateTime<Utc>) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::NotSet,
        external_id: ActiveValue::Set(external_id.to_string()),
        name: ActiveValue::Set(name.to_string()),
        created_at: ActiveValue::Set(now),
    }
}
