//! The `Group` aggregate: one ledger plus membership and ownership.
//!
//! Every rule that involves "who may do what" lives here, so the engine only
//! has to load a group, call one of these methods and persist the result.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    ApprovalStatus, Currency, EngineError, Expense, ExpenseCmd, ExpenseId, ExpenseStatus, Ledger,
    Member, Money, Participant, ResultEngine, SplitSpec, UserId,
    util::{normalize_category, normalize_description, normalize_required_name},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupKind {
    /// Trips and one-off events.
    #[default]
    Short,
    /// Flatmates and other long-running groups.
    Long,
}

impl GroupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "SHORT",
            Self::Long => "LONG",
        }
    }
}

impl TryFrom<&str> for GroupKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SHORT" => Ok(Self::Short),
            "LONG" => Ok(Self::Long),
            other => Err(EngineError::Validation(format!(
                "invalid group type: {other}"
            ))),
        }
    }
}

/// A group with its members and ledger, loaded as one consistent snapshot.
#[derive(Clone, Debug)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub kind: GroupKind,
    pub owner_id: UserId,
    pub member_limit: Option<u32>,
    /// Debt above this amount is flagged in the analysis.
    pub min_floor: Money,
    pub currency: Currency,
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    members: Vec<Member>,
    ledger: Ledger,
}

/// Settings of a group that is about to be created.
#[derive(Clone, Debug)]
pub struct NewGroup {
    pub name: String,
    pub kind: GroupKind,
    pub owner: Member,
    pub member_limit: Option<u32>,
    pub min_floor: Money,
    pub invite_code: String,
}

impl Group {
    /// Creates a group whose only member is its owner.
    pub fn create(id: i64, new: NewGroup, now: DateTime<Utc>) -> ResultEngine<Self> {
        let name = normalize_required_name(&new.name, "group")?;
        if let Some(limit) = new.member_limit {
            if limit == 0 {
                return Err(EngineError::Validation(
                    "member_limit must be at least 1".to_string(),
                ));
            }
            if i32::try_from(limit).is_err() {
                return Err(EngineError::Validation(format!(
                    "member_limit must be at most {}",
                    i32::MAX
                )));
            }
        }
        if new.min_floor.is_negative() {
            return Err(EngineError::Validation(
                "min_floor must not be negative".to_string(),
            ));
        }
        Ok(Self {
            id,
            name,
            kind: new.kind,
            owner_id: new.owner.id,
            member_limit: new.member_limit,
            currency: new.min_floor.currency(),
            min_floor: new.min_floor,
            invite_code: new.invite_code,
            created_at: now,
            archived_at: None,
            members: vec![new.owner],
            ledger: Ledger::new(),
        })
    }

    /// Reassembles a stored group. The owner must be among `members`.
    pub(crate) fn from_parts(
        mut header: Group,
        mut members: Vec<Member>,
        ledger: Ledger,
    ) -> ResultEngine<Self> {
        members.sort_by_key(|m| m.id);
        if !members.iter().any(|m| m.id == header.owner_id) {
            return Err(EngineError::CorruptLedger(format!(
                "group {}: owner is not a member",
                header.id
            )));
        }
        header.members = members;
        header.ledger = ledger;
        Ok(header)
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn member(&self, id: UserId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn is_member(&self, id: UserId) -> bool {
        self.member(id).is_some()
    }

    pub fn is_owner(&self, id: UserId) -> bool {
        self.owner_id == id
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn require_member(&self, id: UserId) -> ResultEngine<&Member> {
        self.member(id)
            .ok_or_else(|| EngineError::Forbidden("not a member of the group".to_string()))
    }

    pub fn require_owner(&self, id: UserId) -> ResultEngine<()> {
        if !self.is_owner(id) {
            return Err(EngineError::Forbidden(
                "only the group owner can do this".to_string(),
            ));
        }
        Ok(())
    }

    fn require_active(&self) -> ResultEngine<()> {
        if self.is_archived() {
            return Err(EngineError::Conflict("group is archived".to_string()));
        }
        Ok(())
    }

    pub fn update_name(&mut self, name: &str, requester: UserId) -> ResultEngine<()> {
        self.require_owner(requester)?;
        self.require_active()?;
        self.name = normalize_required_name(name, "group")?;
        Ok(())
    }

    pub fn update_min_floor(&mut self, floor_minor: i64, requester: UserId) -> ResultEngine<()> {
        self.require_owner(requester)?;
        self.require_active()?;
        if floor_minor < 0 {
            return Err(EngineError::Validation(
                "min_floor must not be negative".to_string(),
            ));
        }
        self.min_floor = Money::new(floor_minor, self.currency);
        Ok(())
    }

    fn insert_member(&mut self, member: Member) -> ResultEngine<()> {
        self.require_active()?;
        if self.is_member(member.id) {
            return Err(EngineError::ExistingKey(format!("member {}", member.id)));
        }
        if let Some(limit) = self.member_limit
            && self.members.len() >= limit as usize
        {
            return Err(EngineError::Conflict(format!(
                "group is full ({limit} members)"
            )));
        }
        self.members.push(member);
        self.members.sort_by_key(|m| m.id);
        Ok(())
    }

    /// Owner adds a user to the group.
    pub fn add_member(&mut self, member: Member, requester: UserId) -> ResultEngine<()> {
        self.require_owner(requester)?;
        self.insert_member(member)
    }

    /// A user joins through the invite code.
    pub fn join(&mut self, member: Member, invite_code: &str) -> ResultEngine<()> {
        if self.invite_code != invite_code {
            return Err(EngineError::KeyNotFound("invite not exists".to_string()));
        }
        self.insert_member(member)
    }

    fn drop_member(&mut self, member_id: UserId) -> ResultEngine<Member> {
        let index = self
            .members
            .iter()
            .position(|m| m.id == member_id)
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;
        Ok(self.members.remove(index))
    }

    /// Owner removes another member.
    pub fn remove_member(&mut self, member_id: UserId, requester: UserId) -> ResultEngine<Member> {
        self.require_owner(requester)?;
        self.require_active()?;
        if member_id == self.owner_id {
            return Err(EngineError::OwnerCannotLeave(
                "transfer ownership or delete the group instead".to_string(),
            ));
        }
        self.drop_member(member_id)
    }

    /// A non-owner member leaves. Still allowed once the group is archived.
    pub fn leave(&mut self, member_id: UserId) -> ResultEngine<Member> {
        if member_id == self.owner_id {
            return Err(EngineError::OwnerCannotLeave(
                "transfer ownership or delete the group instead".to_string(),
            ));
        }
        self.drop_member(member_id)
    }

    pub fn transfer_ownership(&mut self, new_owner: UserId, requester: UserId) -> ResultEngine<()> {
        self.require_owner(requester)?;
        self.require_active()?;
        if !self.is_member(new_owner) {
            return Err(EngineError::KeyNotFound("member not exists".to_string()));
        }
        self.owner_id = new_owner;
        Ok(())
    }

    pub fn archive(&mut self, requester: UserId, now: DateTime<Utc>) -> ResultEngine<()> {
        self.require_owner(requester)?;
        self.require_active()?;
        self.archived_at = Some(now);
        Ok(())
    }

    /// Checks that `requester` may delete the group. The cascade itself is a
    /// storage concern.
    pub fn authorize_delete(&self, requester: UserId) -> ResultEngine<()> {
        self.require_owner(requester)
    }

    /// Builds a new expense from `cmd` without recording it.
    ///
    /// The returned record has id `0`; the caller assigns the stored id and
    /// hands it to [`Group::record_expense`].
    pub fn prepare_expense(
        &self,
        cmd: &ExpenseCmd,
        now: DateTime<Utc>,
        auto_approve: bool,
    ) -> ResultEngine<Expense> {
        self.require_member(cmd.user_id)?;
        self.require_active()?;

        let amount = Money::new(cmd.amount_minor, self.currency);
        if !amount.is_positive() {
            return Err(EngineError::InvalidExpense(
                "amount must be > 0".to_string(),
            ));
        }
        let description = normalize_description(&cmd.description)?;
        let payer_id = cmd.payer_id.unwrap_or(cmd.user_id);
        let payer = self.member(payer_id).cloned().ok_or_else(|| {
            EngineError::InvalidExpense("payer is not a member of the group".to_string())
        })?;

        let (shares, explicit_split) = self.shares_for(amount, cmd.split.as_ref())?;
        let participants: Vec<Participant> = shares
            .into_iter()
            .map(|(member, share)| Participant {
                approval: if member.id == payer.id || member.id == cmd.user_id {
                    ApprovalStatus::Approved
                } else {
                    ApprovalStatus::Pending
                },
                member,
                share,
            })
            .collect();

        let mut expense = Expense {
            id: 0,
            group_id: self.id,
            amount,
            description,
            category: normalize_category(cmd.category.as_deref()),
            payer,
            created_by: cmd.user_id,
            created_at: now,
            updated_at: now,
            status: ExpenseStatus::Pending,
            dispute_reason: None,
            source: cmd.source,
            explicit_split,
            idempotency_key: cmd.idempotency_key.clone(),
            participants,
        };
        if auto_approve || expense.all_approved() {
            expense.status = ExpenseStatus::Approved;
        }
        expense.validate()?;
        Ok(expense)
    }

    fn split_member(&self, id: UserId) -> ResultEngine<Member> {
        self.member(id).cloned().ok_or_else(|| {
            EngineError::InvalidExpense(format!("member {id} is not in the group"))
        })
    }

    fn shares_for(
        &self,
        amount: Money,
        split: Option<&SplitSpec>,
    ) -> ResultEngine<(Vec<(Member, Money)>, bool)> {
        let ensure_unique = |ids: &mut dyn Iterator<Item = UserId>| -> ResultEngine<()> {
            let mut seen = HashSet::new();
            for id in ids {
                if !seen.insert(id) {
                    return Err(EngineError::InvalidExpense(format!(
                        "member {id} appears twice in the split"
                    )));
                }
            }
            if seen.is_empty() {
                return Err(EngineError::InvalidExpense(
                    "the split needs at least one member".to_string(),
                ));
            }
            Ok(())
        };

        match split {
            None => {
                let parts = amount.allocate(self.members.len())?;
                Ok((self.members.iter().cloned().zip(parts).collect(), false))
            }
            Some(SplitSpec::Equal(ids)) => {
                ensure_unique(&mut ids.iter().copied())?;
                let mut members = ids
                    .iter()
                    .map(|id| self.split_member(*id))
                    .collect::<ResultEngine<Vec<_>>>()?;
                members.sort_by_key(|m| m.id);
                let parts = amount.allocate(members.len())?;
                Ok((members.into_iter().zip(parts).collect(), true))
            }
            Some(SplitSpec::Exact(pairs)) => {
                ensure_unique(&mut pairs.iter().map(|(id, _)| *id))?;
                let shares = pairs
                    .iter()
                    .map(|(id, minor)| {
                        Ok((self.split_member(*id)?, Money::new(*minor, self.currency)))
                    })
                    .collect::<ResultEngine<Vec<_>>>()?;
                Ok((shares, true))
            }
            Some(SplitSpec::Weighted(pairs)) => {
                ensure_unique(&mut pairs.iter().map(|(id, _)| *id))?;
                let weights: Vec<u32> = pairs.iter().map(|(_, w)| *w).collect();
                let parts = amount.allocate_weighted(&weights).map_err(|_| {
                    EngineError::InvalidExpense("split weights must not all be zero".to_string())
                })?;
                let shares = pairs
                    .iter()
                    .zip(parts)
                    .map(|((id, _), share)| Ok((self.split_member(*id)?, share)))
                    .collect::<ResultEngine<Vec<_>>>()?;
                Ok((shares, true))
            }
        }
    }

    /// Appends a prepared expense that now carries its stored id.
    pub fn record_expense(&mut self, expense: Expense) -> ResultEngine<&Expense> {
        self.ledger.append(expense, &self.members)
    }

    pub fn expense(&self, id: ExpenseId) -> ResultEngine<&Expense> {
        self.ledger
            .get(id)
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    /// Group-level status change.
    ///
    /// Any member may dispute (a reason is required); only the owner approves
    /// or rejects on behalf of the group.
    pub fn set_expense_status(
        &mut self,
        id: ExpenseId,
        status: ExpenseStatus,
        reason: Option<&str>,
        requester: UserId,
        now: DateTime<Utc>,
    ) -> ResultEngine<&Expense> {
        self.require_member(requester)?;
        self.require_active()?;
        match status {
            ExpenseStatus::Disputed => {
                self.ledger
                    .dispute(id, requester, reason.unwrap_or_default(), now)
            }
            ExpenseStatus::Approved | ExpenseStatus::Rejected => {
                self.require_owner(requester)?;
                self.ledger.transition(id, status, reason, now)
            }
            ExpenseStatus::Pending => Err(EngineError::InvalidTransition(
                "an expense cannot return to PENDING".to_string(),
            )),
        }
    }

    pub fn dispute_expense(
        &mut self,
        id: ExpenseId,
        reason: &str,
        requester: UserId,
        now: DateTime<Utc>,
    ) -> ResultEngine<&Expense> {
        self.set_expense_status(id, ExpenseStatus::Disputed, Some(reason), requester, now)
    }

    pub fn record_approval(
        &mut self,
        id: ExpenseId,
        decision: ApprovalStatus,
        requester: UserId,
        now: DateTime<Utc>,
    ) -> ResultEngine<&Expense> {
        self.require_member(requester)?;
        self.require_active()?;
        self.ledger.record_approval(id, requester, decision, now)
    }

    pub fn remove_expense(&mut self, id: ExpenseId, requester: UserId) -> ResultEngine<Expense> {
        self.require_member(requester)?;
        self.require_active()?;
        self.ledger.remove(id, requester, self.owner_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub owner_id: i64,
    pub member_limit: Option<i32>,
    pub min_floor_minor: i64,
    pub currency: String,
    #[sea_orm(unique)]
    pub invite_code: String,
    pub created_at: DateTimeUtc,
    pub archived_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::members::Entity")]
    Members,
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Group> for ActiveModel {
    fn from(group: &Group) -> Self {
        Self {
            id: ActiveValue::Set(group.id),
            name: ActiveValue::Set(group.name.clone()),
            kind: ActiveValue::Set(group.kind.as_str().to_string()),
            owner_id: ActiveValue::Set(group.owner_id),
            member_limit: ActiveValue::Set(
                group
                    .member_limit
                    .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX)),
            ),
            min_floor_minor: ActiveValue::Set(group.min_floor.minor()),
            currency: ActiveValue::Set(group.currency.code().to_string()),
            invite_code: ActiveValue::Set(group.invite_code.clone()),
            created_at: ActiveValue::Set(group.created_at),
            archived_at: ActiveValue::Set(group.archived_at),
        }
    }
}

impl TryFrom<Model> for Group {
    type Error = EngineError;

    /// Header only; members and ledger are attached by `Group::from_parts`.
    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let corrupt = |what: String| EngineError::CorruptLedger(format!("group {}: {what}", model.id));
        let currency = Currency::try_from(model.currency.as_str())
            .map_err(|_| corrupt(format!("invalid currency {}", model.currency)))?;
        let kind = GroupKind::try_from(model.kind.as_str())
            .map_err(|_| corrupt(format!("invalid kind {}", model.kind)))?;
        let member_limit = model
            .member_limit
            .map(|limit| u32::try_from(limit).map_err(|_| corrupt(format!("invalid limit {limit}"))))
            .transpose()?;
        Ok(Self {
            id: model.id,
            name: model.name,
            kind,
            owner_id: model.owner_id,
            member_limit,
            min_floor: Money::new(model.min_floor_minor, currency),
            currency,
            invite_code: model.invite_code,
            created_at: model.created_at,
            archived_at: model.archived_at,
            members: Vec::new(),
            ledger: Ledger::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: UserId) -> Member {
        Member::new(id, format!("user{id}"))
    }

    fn group(limit: Option<u32>) -> Group {
        Group::create(
            1,
            NewGroup {
                name: "Goa".to_string(),
                kind: GroupKind::Short,
                owner: member(1),
                member_limit: limit,
                min_floor: Money::new(200_000, Currency::Inr),
                invite_code: "code".to_string(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn only_owner_renames() {
        let mut g = group(None);
        g.add_member(member(2), 1).unwrap();
        assert!(matches!(
            g.update_name("Other", 2),
            Err(EngineError::Forbidden(_))
        ));
        g.update_name("  Goa 2026 ", 1).unwrap();
        assert_eq!(g.name, "Goa 2026");
        assert!(matches!(
            g.update_name("  ", 1),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn member_limit_must_be_storable() {
        let new = |limit| NewGroup {
            name: "Goa".to_string(),
            kind: GroupKind::Short,
            owner: member(1),
            member_limit: Some(limit),
            min_floor: Money::new(0, Currency::Inr),
            invite_code: "code".to_string(),
        };
        assert!(matches!(
            Group::create(1, new(0), Utc::now()),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            Group::create(1, new(u32::MAX), Utc::now()),
            Err(EngineError::Validation(_))
        ));
        let group = Group::create(1, new(i32::MAX as u32), Utc::now()).unwrap();
        assert_eq!(ActiveModel::from(&group).member_limit.unwrap(), Some(i32::MAX));
    }

    #[test]
    fn member_limit_is_enforced() {
        let mut g = group(Some(2));
        g.add_member(member(2), 1).unwrap();
        assert!(matches!(
            g.add_member(member(3), 1),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            g.join(member(3), "code"),
            Err(EngineError::Conflict(_))
        ));
        assert_eq!(g.members().len(), 2);
    }

    #[test]
    fn join_requires_matching_code_and_rejects_duplicates() {
        let mut g = group(None);
        assert!(matches!(
            g.join(member(2), "nope"),
            Err(EngineError::KeyNotFound(_))
        ));
        g.join(member(2), "code").unwrap();
        assert!(matches!(
            g.join(member(2), "code"),
            Err(EngineError::ExistingKey(_))
        ));
    }

    #[test]
    fn owner_cannot_leave_but_members_can() {
        let mut g = group(None);
        g.add_member(member(2), 1).unwrap();
        assert!(matches!(g.leave(1), Err(EngineError::OwnerCannotLeave(_))));
        assert!(matches!(
            g.remove_member(1, 1),
            Err(EngineError::OwnerCannotLeave(_))
        ));
        g.leave(2).unwrap();
        assert!(!g.is_member(2));
        assert!(matches!(g.leave(2), Err(EngineError::KeyNotFound(_))));
    }

    #[test]
    fn transfer_then_former_owner_can_leave() {
        let mut g = group(None);
        g.add_member(member(2), 1).unwrap();
        assert!(matches!(
            g.transfer_ownership(3, 1),
            Err(EngineError::KeyNotFound(_))
        ));
        assert!(matches!(
            g.transfer_ownership(2, 2),
            Err(EngineError::Forbidden(_))
        ));
        g.transfer_ownership(2, 1).unwrap();
        assert!(g.is_owner(2));
        g.leave(1).unwrap();
        assert!(matches!(g.authorize_delete(1), Err(EngineError::Forbidden(_))));
        g.authorize_delete(2).unwrap();
    }

    #[test]
    fn archived_groups_take_no_expenses_or_members() {
        let mut g = group(None);
        g.add_member(member(2), 1).unwrap();
        g.add_member(member(3), 1).unwrap();
        g.archive(1, Utc::now()).unwrap();
        assert!(matches!(
            g.add_member(member(4), 1),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            g.remove_member(2, 1),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            g.transfer_ownership(2, 1),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            g.update_name("Goa again", 1),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            g.update_min_floor(0, 1),
            Err(EngineError::Conflict(_))
        ));
        // owner checks still come first
        assert!(matches!(
            g.remove_member(3, 2),
            Err(EngineError::Forbidden(_))
        ));
        let cmd = ExpenseCmd::new(1, 1, 100, "Dinner");
        assert!(matches!(
            g.prepare_expense(&cmd, Utc::now(), false),
            Err(EngineError::Conflict(_))
        ));
        g.leave(3).unwrap();
        assert_eq!(g.members().len(), 2);
    }

    #[test]
    fn default_split_covers_all_members_and_payer_approves() {
        let mut g = group(None);
        g.add_member(member(2), 1).unwrap();
        g.add_member(member(3), 1).unwrap();
        let cmd = ExpenseCmd::new(1, 1, 9000, " Dinner ").category("Food");
        let mut expense = g.prepare_expense(&cmd, Utc::now(), false).unwrap();
        assert_eq!(expense.status, ExpenseStatus::Pending);
        assert_eq!(expense.description, "Dinner");
        assert_eq!(expense.category, "food");
        assert!(!expense.explicit_split);
        assert_eq!(expense.participants.len(), 3);
        assert!(expense.participants.iter().all(|p| p.share.minor() == 3000));
        assert_eq!(expense.approval_of(1), Some(ApprovalStatus::Approved));
        assert_eq!(expense.approval_of(2), Some(ApprovalStatus::Pending));

        expense.id = 7;
        g.record_expense(expense).unwrap();
        assert_eq!(g.ledger().len(), 1);
    }

    #[test]
    fn sole_participant_expense_starts_approved() {
        let g = group(None);
        let cmd = ExpenseCmd::new(1, 1, 500, "Taxi");
        let expense = g.prepare_expense(&cmd, Utc::now(), false).unwrap();
        assert_eq!(expense.status, ExpenseStatus::Approved);
    }

    #[test]
    fn explicit_splits_are_validated() {
        let mut g = group(None);
        g.add_member(member(2), 1).unwrap();

        let exact = ExpenseCmd::new(1, 1, 1000, "Tickets")
            .split(SplitSpec::Exact(vec![(1, 400), (2, 500)]));
        assert!(matches!(
            g.prepare_expense(&exact, Utc::now(), false),
            Err(EngineError::InvalidExpense(_))
        ));

        let outsider =
            ExpenseCmd::new(1, 1, 1000, "Tickets").split(SplitSpec::Equal(vec![1, 9]));
        assert!(matches!(
            g.prepare_expense(&outsider, Utc::now(), false),
            Err(EngineError::InvalidExpense(_))
        ));

        let twice = ExpenseCmd::new(1, 1, 1000, "Tickets").split(SplitSpec::Equal(vec![2, 2]));
        assert!(matches!(
            g.prepare_expense(&twice, Utc::now(), false),
            Err(EngineError::InvalidExpense(_))
        ));

        let weighted = ExpenseCmd::new(1, 1, 1000, "Tickets")
            .split(SplitSpec::Weighted(vec![(1, 1), (2, 3)]));
        let expense = g.prepare_expense(&weighted, Utc::now(), false).unwrap();
        assert!(expense.explicit_split);
        assert_eq!(expense.participant(2).unwrap().share.minor(), 750);
    }

    #[test]
    fn outsiders_cannot_create_expenses_and_payer_must_be_member() {
        let g = group(None);
        let cmd = ExpenseCmd::new(1, 5, 100, "Snacks");
        assert!(matches!(
            g.prepare_expense(&cmd, Utc::now(), false),
            Err(EngineError::Forbidden(_))
        ));
        let cmd = ExpenseCmd::new(1, 1, 100, "Snacks").payer(5);
        assert!(matches!(
            g.prepare_expense(&cmd, Utc::now(), false),
            Err(EngineError::InvalidExpense(_))
        ));
        let cmd = ExpenseCmd::new(1, 1, 0, "Snacks");
        assert!(matches!(
            g.prepare_expense(&cmd, Utc::now(), false),
            Err(EngineError::InvalidExpense(_))
        ));
    }

    #[test]
    fn only_owner_approves_or_rejects_for_the_group() {
        let mut g = group(None);
        g.add_member(member(2), 1).unwrap();
        let mut expense = g
            .prepare_expense(&ExpenseCmd::new(1, 2, 1000, "Fuel"), Utc::now(), false)
            .unwrap();
        expense.id = 1;
        g.record_expense(expense).unwrap();

        assert!(matches!(
            g.set_expense_status(1, ExpenseStatus::Approved, None, 2, Utc::now()),
            Err(EngineError::Forbidden(_))
        ));
        assert!(matches!(
            g.set_expense_status(1, ExpenseStatus::Pending, None, 1, Utc::now()),
            Err(EngineError::InvalidTransition(_))
        ));
        let e = g
            .set_expense_status(1, ExpenseStatus::Approved, None, 1, Utc::now())
            .unwrap();
        assert_eq!(e.status, ExpenseStatus::Approved);
        let e = g.dispute_expense(1, "double counted", 2, Utc::now()).unwrap();
        assert_eq!(e.status, ExpenseStatus::Disputed);
    }
}
