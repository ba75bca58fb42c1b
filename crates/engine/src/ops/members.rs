use chrono::Utc;
use sea_orm::{TransactionTrait, prelude::*};

use crate::{Member, ResultEngine, UserId, members};

use super::{Engine, with_tx};

impl Engine {
    /// Current members ordered by id.
    pub async fn members(&self, group_id: i64, user_id: UserId) -> ResultEngine<Vec<Member>> {
        with_tx!(self, |db_tx| {
            let group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            Ok(group.members().to_vec())
        })
    }

    /// Owner adds an existing user. Fails with `Conflict` once the member
    /// limit is reached.
    pub async fn add_member(
        &self,
        group_id: i64,
        member_id: UserId,
        user_id: UserId,
    ) -> ResultEngine<Vec<Member>> {
        let _guard = self.locks.acquire(group_id).await;
        let current = with_tx!(self, |db_tx| {
            let mut group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            let user = self.require_user(&db_tx, member_id).await?;
            group.add_member(Member::new(user.id, user.name), user_id)?;
            members::Entity::insert(members::new_active(group_id, member_id, Utc::now()))
                .exec_without_returning(&db_tx)
                .await?;
            Ok(group.members().to_vec())
        })?;

        self.cache.invalidate(group_id);
        tracing::info!(group_id, member_id, "member added");
        Ok(current)
    }

    /// Owner removes a member. Past expenses keep their recorded shares.
    pub async fn remove_member(
        &self,
        group_id: i64,
        member_id: UserId,
        user_id: UserId,
    ) -> ResultEngine<Vec<Member>> {
        let _guard = self.locks.acquire(group_id).await;
        let current = with_tx!(self, |db_tx| {
            let mut group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            group.remove_member(member_id, user_id)?;
            members::Entity::delete_by_id((group_id, member_id))
                .exec(&db_tx)
                .await?;
            Ok(group.members().to_vec())
        })?;

        self.cache.invalidate(group_id);
        tracing::info!(group_id, member_id, "member removed");
        Ok(current)
    }
}
