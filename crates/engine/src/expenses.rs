//! Expense records.
//!
//! An `Expense` carries two levels of status:
//!
//! - the group-level [`ExpenseStatus`], which decides whether the expense
//!   counts towards balances (everything except `REJECTED` does);
//! - a personal [`ApprovalStatus`] per participant (`user_approval_status` in
//!   the HTTP API), which never changes balances by itself.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    Currency, EngineError, Member, Money, ResultEngine, UserId, participants, util::model_currency,
};

pub type ExpenseId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
    Disputed,
}

impl ExpenseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Disputed => "DISPUTED",
        }
    }

    /// Whether the expense contributes to balances.
    pub fn counts_towards_balance(self) -> bool {
        !matches!(self, Self::Rejected)
    }

    /// The status state machine.
    ///
    /// `PENDING`/`APPROVED` may move to `APPROVED`, `REJECTED` or `DISPUTED`;
    /// `DISPUTED` may only be `REJECTED`; `REJECTED` is terminal.
    pub fn can_transition_to(self, next: ExpenseStatus) -> bool {
        match self {
            Self::Pending | Self::Approved => matches!(
                next,
                Self::Approved | Self::Rejected | Self::Disputed
            ),
            Self::Disputed => next == Self::Rejected,
            Self::Rejected => false,
        }
    }
}

impl TryFrom<&str> for ExpenseStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "DISPUTED" => Ok(Self::Disputed),
            other => Err(EngineError::Validation(format!(
                "invalid expense status: {other}"
            ))),
        }
    }
}

/// A member's personal verdict on an expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Disputed,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Disputed => "DISPUTED",
        }
    }
}

impl TryFrom<&str> for ApprovalStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "DISPUTED" => Ok(Self::Disputed),
            other => Err(EngineError::Validation(format!(
                "invalid approval status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseSource {
    Manual,
    Ai,
    Receipt,
}

impl ExpenseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Ai => "AI",
            Self::Receipt => "RECEIPT",
        }
    }
}

impl TryFrom<&str> for ExpenseSource {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "MANUAL" => Ok(Self::Manual),
            "AI" => Ok(Self::Ai),
            "RECEIPT" => Ok(Self::Receipt),
            other => Err(EngineError::Validation(format!(
                "invalid expense source: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub member: Member,
    pub share: Money,
    pub approval: ApprovalStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub group_id: i64,
    pub amount: Money,
    pub description: String,
    pub category: String,
    pub payer: Member,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: ExpenseStatus,
    pub dispute_reason: Option<String>,
    pub source: ExpenseSource,
    /// `false` when the shares came from the default equal split.
    pub explicit_split: bool,
    pub idempotency_key: Option<String>,
    pub participants: Vec<Participant>,
}

impl Expense {
    pub fn participant(&self, member_id: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.member.id == member_id)
    }

    pub(crate) fn participant_mut(&mut self, member_id: UserId) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.member.id == member_id)
    }

    /// `user_approval_status` of `member_id`, if they take part.
    pub fn approval_of(&self, member_id: UserId) -> Option<ApprovalStatus> {
        self.participant(member_id).map(|p| p.approval)
    }

    /// Payer or participant.
    pub fn involves(&self, member_id: UserId) -> bool {
        self.payer.id == member_id || self.participant(member_id).is_some()
    }

    pub fn all_approved(&self) -> bool {
        self.participants
            .iter()
            .all(|p| p.approval == ApprovalStatus::Approved)
    }

    /// Checks the record-level invariants: positive amount, a single
    /// currency, unique participants whose non-negative shares sum exactly to
    /// the amount, and a reason on disputed expenses.
    pub(crate) fn validate(&self) -> ResultEngine<()> {
        if !self.amount.is_positive() {
            return Err(EngineError::InvalidExpense(
                "amount must be > 0".to_string(),
            ));
        }
        if self.participants.is_empty() {
            return Err(EngineError::InvalidExpense(
                "an expense needs at least one participant".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for participant in &self.participants {
            if !seen.insert(participant.member.id) {
                return Err(EngineError::InvalidExpense(format!(
                    "member {} appears twice in the split",
                    participant.member.id
                )));
            }
            if participant.share.currency() != self.amount.currency() {
                return Err(EngineError::CurrencyMismatch(format!(
                    "share in {} for an expense in {}",
                    participant.share.currency(),
                    self.amount.currency()
                )));
            }
            if participant.share.is_negative() {
                return Err(EngineError::InvalidExpense(
                    "shares must not be negative".to_string(),
                ));
            }
        }
        let total = Money::sum(
            self.participants.iter().map(|p| p.share),
            self.amount.currency(),
        )?;
        if total != self.amount {
            return Err(EngineError::InvalidExpense(format!(
                "shares sum to {total}, expected {}",
                self.amount
            )));
        }
        if self.status == ExpenseStatus::Disputed
            && self
                .dispute_reason
                .as_deref()
                .is_none_or(|r| r.trim().is_empty())
        {
            return Err(EngineError::MissingReason(
                "a disputed expense needs a reason".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub group_id: i64,
    pub payer_id: i64,
    pub created_by: i64,
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub category: String,
    pub status: String,
    pub dispute_reason: Option<String>,
    pub source: String,
    pub explicit_split: bool,
    pub idempotency_key: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_delete = "Cascade"
    )]
    Group,
    #[sea_orm(has_many = "super::participants::Entity")]
    Participants,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id),
            group_id: ActiveValue::Set(expense.group_id),
            payer_id: ActiveValue::Set(expense.payer.id),
            created_by: ActiveValue::Set(expense.created_by),
            amount_minor: ActiveValue::Set(expense.amount.minor()),
            currency: ActiveValue::Set(expense.amount.currency().code().to_string()),
            description: ActiveValue::Set(expense.description.clone()),
            category: ActiveValue::Set(expense.category.clone()),
            status: ActiveValue::Set(expense.status.as_str().to_string()),
            dispute_reason: ActiveValue::Set(expense.dispute_reason.clone()),
            source: ActiveValue::Set(expense.source.as_str().to_string()),
            explicit_split: ActiveValue::Set(expense.explicit_split),
            idempotency_key: ActiveValue::Set(expense.idempotency_key.clone()),
            created_at: ActiveValue::Set(expense.created_at),
            updated_at: ActiveValue::Set(expense.updated_at),
        }
    }
}

/// Rebuilds an `Expense` from its stored row, its participant rows and the
/// display names of everyone involved.
///
/// Stored data that does not decode is an invariant violation and reported
/// as `CorruptLedger`.
pub(crate) fn hydrate(
    model: Model,
    rows: Vec<participants::Model>,
    names: &HashMap<UserId, String>,
) -> ResultEngine<Expense> {
    let corrupt = |what: String| EngineError::CorruptLedger(format!("expense {}: {what}", model.id));
    let member = |id: UserId| -> ResultEngine<Member> {
        names
            .get(&id)
            .map(|name| Member::new(id, name.clone()))
            .ok_or_else(|| corrupt(format!("unknown member {id}")))
    };

    let currency: Currency = model_currency(&model.currency)?;
    let status = ExpenseStatus::try_from(model.status.as_str())
        .map_err(|_| corrupt(format!("invalid status {}", model.status)))?;
    let source = ExpenseSource::try_from(model.source.as_str())
        .map_err(|_| corrupt(format!("invalid source {}", model.source)))?;

    let mut participants = Vec::with_capacity(rows.len());
    for row in rows {
        let approval = ApprovalStatus::try_from(row.approval_status.as_str())
            .map_err(|_| corrupt(format!("invalid approval {}", row.approval_status)))?;
        participants.push(Participant {
            member: member(row.user_id)?,
            share: Money::new(row.share_minor, currency),
            approval,
        });
    }
    participants.sort_by_key(|p| p.member.id);

    Ok(Expense {
        id: model.id,
        group_id: model.group_id,
        amount: Money::new(model.amount_minor, currency),
        description: model.description,
        category: model.category,
        payer: member(model.payer_id)?,
        created_by: model.created_by,
        created_at: model.created_at,
        updated_at: model.updated_at,
        status,
        dispute_reason: model.dispute_reason,
        source,
        explicit_split: model.explicit_split,
        idempotency_key: model.idempotency_key,
        participants,
    })
}
