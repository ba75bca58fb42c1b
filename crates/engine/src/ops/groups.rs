use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Group, GroupCmd, GroupDetail, GroupSummary, GroupUpdate, Member, Money,
    NewGroup, ResultEngine, UserId, expenses, groups, members, participants,
};

use super::{Engine, with_tx};

impl Engine {
    pub(super) fn detail(&self, group: Group, requester: UserId) -> ResultEngine<GroupDetail> {
        let summary = GroupSummary::compute(&group, requester, self.config.split_policy)?;
        Ok(GroupDetail { group, summary })
    }

    /// Creates a group owned by the requester, who becomes its first member.
    ///
    /// Missing settings fall back to the engine configuration (member limit,
    /// debt floor, currency).
    pub async fn new_group(&self, cmd: GroupCmd) -> ResultEngine<GroupDetail> {
        let currency = match cmd.currency.as_deref() {
            Some(code) => Currency::try_from(code)?,
            None => self.config.default_currency,
        };
        let member_limit = cmd
            .member_limit
            .or(Some(self.config.default_member_limit));
        let floor = cmd
            .min_floor_minor
            .unwrap_or(self.config.default_min_floor_minor);
        let now = Utc::now();

        let group = with_tx!(self, |db_tx| {
            let owner = self.require_user(&db_tx, cmd.user_id).await?;
            let mut group = Group::create(
                0,
                NewGroup {
                    name: cmd.name.clone(),
                    kind: cmd.kind,
                    owner: Member::new(owner.id, owner.name),
                    member_limit,
                    min_floor: Money::new(floor, currency),
                    invite_code: Uuid::new_v4().simple().to_string(),
                },
                now,
            )?;

            let mut active = groups::ActiveModel::from(&group);
            active.id = ActiveValue::NotSet;
            let model = active.insert(&db_tx).await?;
            group.id = model.id;

            members::Entity::insert(members::new_active(group.id, cmd.user_id, now))
                .exec_without_returning(&db_tx)
                .await?;
            Ok(group)
        })?;

        tracing::info!(group_id = group.id, owner = group.owner_id, "group created");
        self.detail(group, cmd.user_id)
    }

    /// Summaries of every group `user_id` belongs to, most recent activity
    /// first.
    pub async fn groups(&self, user_id: UserId) -> ResultEngine<Vec<GroupSummary>> {
        with_tx!(self, |db_tx| {
            let memberships = members::Entity::find()
                .filter(members::Column::UserId.eq(user_id))
                .all(&db_tx)
                .await?;
            let mut summaries = Vec::with_capacity(memberships.len());
            for membership in memberships {
                let group = self.load_group(&db_tx, membership.group_id).await?;
                summaries.push(GroupSummary::compute(
                    &group,
                    user_id,
                    self.config.split_policy,
                )?);
            }
            summaries.sort_by(|a, b| {
                b.last_activity
                    .cmp(&a.last_activity)
                    .then(b.group_id.cmp(&a.group_id))
            });
            Ok(summaries)
        })
    }

    pub async fn group(&self, group_id: i64, user_id: UserId) -> ResultEngine<GroupDetail> {
        let group = with_tx!(self, |db_tx| {
            self.load_group_for_member(&db_tx, group_id, user_id).await
        })?;
        self.detail(group, user_id)
    }

    /// Owner-only rename and floor change.
    pub async fn update_group(
        &self,
        group_id: i64,
        update: GroupUpdate,
        user_id: UserId,
    ) -> ResultEngine<GroupDetail> {
        let _guard = self.locks.acquire(group_id).await;
        let group = with_tx!(self, |db_tx| {
            let mut group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            group.require_owner(user_id)?;
            if let Some(name) = update.name.as_deref() {
                group.update_name(name, user_id)?;
            }
            if let Some(floor) = update.min_floor_minor {
                group.update_min_floor(floor, user_id)?;
            }
            self.save_group_header(&db_tx, &group).await?;
            Ok(group)
        })?;

        self.cache.invalidate(group_id);
        tracing::info!(group_id, "group updated");
        self.detail(group, user_id)
    }

    /// Deletes the group with all its expenses and memberships. Owner-only.
    pub async fn delete_group(&self, group_id: i64, user_id: UserId) -> ResultEngine<()> {
        let guard = self.locks.acquire(group_id).await;
        with_tx!(self, |db_tx| {
            let group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            group.authorize_delete(user_id)?;

            let expense_ids: Vec<i64> = group.ledger().iter().map(|e| e.id).collect();
            if !expense_ids.is_empty() {
                participants::Entity::delete_many()
                    .filter(participants::Column::ExpenseId.is_in(expense_ids))
                    .exec(&db_tx)
                    .await?;
            }
            expenses::Entity::delete_many()
                .filter(expenses::Column::GroupId.eq(group_id))
                .exec(&db_tx)
                .await?;
            members::Entity::delete_many()
                .filter(members::Column::GroupId.eq(group_id))
                .exec(&db_tx)
                .await?;
            groups::Entity::delete_by_id(group_id).exec(&db_tx).await?;
            Ok(())
        })?;

        self.cache.invalidate(group_id);
        drop(guard);
        self.locks.forget(group_id);
        tracing::info!(group_id, "group deleted");
        Ok(())
    }

    /// The requester leaves. The owner has to transfer ownership first.
    pub async fn leave_group(&self, group_id: i64, user_id: UserId) -> ResultEngine<()> {
        let _guard = self.locks.acquire(group_id).await;
        with_tx!(self, |db_tx| {
            let mut group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            group.leave(user_id)?;
            members::Entity::delete_by_id((group_id, user_id))
                .exec(&db_tx)
                .await?;
            Ok(())
        })?;

        self.cache.invalidate(group_id);
        tracing::info!(group_id, user_id, "member left group");
        Ok(())
    }

    pub async fn transfer_ownership(
        &self,
        group_id: i64,
        new_owner: UserId,
        user_id: UserId,
    ) -> ResultEngine<GroupDetail> {
        let _guard = self.locks.acquire(group_id).await;
        let group = with_tx!(self, |db_tx| {
            let mut group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            group.transfer_ownership(new_owner, user_id)?;
            self.save_group_header(&db_tx, &group).await?;
            Ok(group)
        })?;

        self.cache.invalidate(group_id);
        tracing::info!(group_id, new_owner, "group ownership transferred");
        self.detail(group, user_id)
    }

    pub async fn archive_group(&self, group_id: i64, user_id: UserId) -> ResultEngine<GroupDetail> {
        let _guard = self.locks.acquire(group_id).await;
        let group = with_tx!(self, |db_tx| {
            let mut group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            group.archive(user_id, Utc::now())?;
            self.save_group_header(&db_tx, &group).await?;
            Ok(group)
        })?;

        self.cache.invalidate(group_id);
        tracing::info!(group_id, "group archived");
        self.detail(group, user_id)
    }

    /// Joins the group behind `invite_code`, subject to the member limit.
    pub async fn join_group(&self, invite_code: &str, user_id: UserId) -> ResultEngine<GroupDetail> {
        let invite_code = invite_code.trim();
        let group_id = with_tx!(self, |db_tx| {
            groups::Entity::find()
                .filter(groups::Column::InviteCode.eq(invite_code))
                .one(&db_tx)
                .await?
                .map(|model| model.id)
                .ok_or_else(|| EngineError::KeyNotFound("invite not exists".to_string()))
        })?;

        let _guard = self.locks.acquire(group_id).await;
        let group = with_tx!(self, |db_tx| {
            let user = self.require_user(&db_tx, user_id).await?;
            let mut group = self.load_group(&db_tx, group_id).await?;
            group.join(Member::new(user.id, user.name), invite_code)?;
            members::Entity::insert(members::new_active(group_id, user_id, Utc::now()))
                .exec_without_returning(&db_tx)
                .await?;
            Ok(group)
        })?;

        self.cache.invalidate(group_id);
        tracing::info!(group_id, user_id, "member joined group");
        self.detail(group, user_id)
    }
}
