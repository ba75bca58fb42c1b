use std::collections::{HashMap, HashSet};

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};

use crate::{
    EngineError, Expense, Group, Ledger, Member, ResultEngine, UserId, expenses, groups, members,
    participants, users,
};

use super::Engine;

impl Engine {
    /// Loads a whole group (header, members, ledger) from `db`.
    ///
    /// Display names of former members still referenced by the ledger are
    /// loaded too, so their expenses stay readable after they leave.
    pub(super) async fn load_group(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
    ) -> ResultEngine<Group> {
        let header = groups::Entity::find_by_id(group_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))?;
        let header = Group::try_from(header)?;

        let rows = members::Entity::find()
            .filter(members::Column::GroupId.eq(group_id))
            .find_also_related(users::Entity)
            .all(db)
            .await?;
        let mut names: HashMap<UserId, String> = HashMap::new();
        let mut group_members = Vec::with_capacity(rows.len());
        for (membership, user) in rows {
            let user = user.ok_or_else(|| {
                EngineError::CorruptLedger(format!(
                    "group {group_id}: member {} has no user",
                    membership.user_id
                ))
            })?;
            names.insert(user.id, user.name.clone());
            group_members.push(Member::new(user.id, user.name));
        }

        let stored = expenses::Entity::find()
            .filter(expenses::Column::GroupId.eq(group_id))
            .order_by_asc(expenses::Column::Id)
            .find_with_related(participants::Entity)
            .all(db)
            .await?;

        let missing: HashSet<UserId> = stored
            .iter()
            .flat_map(|(expense, rows)| {
                std::iter::once(expense.payer_id).chain(rows.iter().map(|row| row.user_id))
            })
            .filter(|id| !names.contains_key(id))
            .collect();
        if !missing.is_empty() {
            let former = users::Entity::find()
                .filter(users::Column::Id.is_in(missing))
                .all(db)
                .await?;
            names.extend(former.into_iter().map(|user| (user.id, user.name)));
        }

        let expenses = stored
            .into_iter()
            .map(|(model, rows)| expenses::hydrate(model, rows, &names))
            .collect::<ResultEngine<Vec<Expense>>>()?;
        let ledger = Ledger::from_stored(expenses)?;

        Group::from_parts(header, group_members, ledger)
    }

    /// Loads `group_id` for `user_id`. Groups the user does not belong to are
    /// reported as missing.
    pub(super) async fn load_group_for_member(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
        user_id: UserId,
    ) -> ResultEngine<Group> {
        let group = self.load_group(db, group_id).await?;
        if !group.is_member(user_id) {
            return Err(EngineError::KeyNotFound("group not exists".to_string()));
        }
        Ok(group)
    }

    pub(super) async fn require_membership(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
        user_id: UserId,
    ) -> ResultEngine<()> {
        let found = members::Entity::find_by_id((group_id, user_id))
            .one(db)
            .await?
            .is_some();
        if !found {
            return Err(EngineError::KeyNotFound("group not exists".to_string()));
        }
        Ok(())
    }

    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: UserId,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    /// Group id of an expense, used to route expense-level calls to the
    /// right group lock.
    pub(super) async fn expense_group_id(
        &self,
        db: &DatabaseTransaction,
        expense_id: i64,
    ) -> ResultEngine<i64> {
        expenses::Entity::find_by_id(expense_id)
            .one(db)
            .await?
            .map(|model| model.group_id)
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    /// Writes an expense and its participant rows. New expenses (id `0`) get
    /// their id from the DB.
    pub(super) async fn save_expense(
        &self,
        db: &DatabaseTransaction,
        expense: &mut Expense,
    ) -> ResultEngine<()> {
        let mut active = expenses::ActiveModel::from(&*expense);
        if expense.id == 0 {
            active.id = sea_orm::ActiveValue::NotSet;
            let model = active.insert(db).await?;
            expense.id = model.id;
        } else {
            active.update(db).await?;
            participants::Entity::delete_many()
                .filter(participants::Column::ExpenseId.eq(expense.id))
                .exec(db)
                .await?;
        }
        participants::Entity::insert_many(participants::rows_for(expense))
            .exec_without_returning(db)
            .await?;
        Ok(())
    }

    pub(super) async fn save_group_header(
        &self,
        db: &DatabaseTransaction,
        group: &Group,
    ) -> ResultEngine<()> {
        groups::ActiveModel::from(group).update(db).await?;
        Ok(())
    }
}
