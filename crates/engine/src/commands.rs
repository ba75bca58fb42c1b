//! Command structs for engine operations.
//!
//! These types group parameters for write operations (group creation and
//! updates, expense creation), keeping call sites readable and avoiding long
//! argument lists.

use crate::{ExpenseSource, UserId, groups::GroupKind};

/// How an expense amount is divided among participants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SplitSpec {
    /// Equal shares among the listed members.
    Equal(Vec<UserId>),
    /// Exact shares in minor units; they must sum to the amount.
    Exact(Vec<(UserId, i64)>),
    /// Shares proportional to the weights (largest-remainder rounding).
    Weighted(Vec<(UserId, u32)>),
}

/// Create an expense in a group.
///
/// Without an explicit `split` the expense is divided equally among the
/// members of the group at creation time. Without a `payer_id` the requester
/// paid.
#[derive(Clone, Debug)]
pub struct ExpenseCmd {
    pub group_id: i64,
    pub amount_minor: i64,
    pub description: String,
    pub category: Option<String>,
    pub payer_id: Option<UserId>,
    pub split: Option<SplitSpec>,
    pub source: ExpenseSource,
    pub idempotency_key: Option<String>,
    pub user_id: UserId,
}

impl ExpenseCmd {
    #[must_use]
    pub fn new(
        group_id: i64,
        user_id: UserId,
        amount_minor: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            group_id,
            amount_minor,
            description: description.into(),
            category: None,
            payer_id: None,
            split: None,
            source: ExpenseSource::Manual,
            idempotency_key: None,
            user_id,
        }
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn payer(mut self, payer_id: UserId) -> Self {
        self.payer_id = Some(payer_id);
        self
    }

    #[must_use]
    pub fn split(mut self, split: SplitSpec) -> Self {
        self.split = Some(split);
        self
    }

    #[must_use]
    pub fn source(mut self, source: ExpenseSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Create a group owned by the requester.
#[derive(Clone, Debug)]
pub struct GroupCmd {
    pub name: String,
    pub kind: GroupKind,
    pub member_limit: Option<u32>,
    /// Debt threshold in minor units; defaults to the configured floor.
    pub min_floor_minor: Option<i64>,
    pub currency: Option<String>,
    pub user_id: UserId,
}

impl GroupCmd {
    #[must_use]
    pub fn new(user_id: UserId, name: impl Into<String>, kind: GroupKind) -> Self {
        Self {
            name: name.into(),
            kind,
            member_limit: None,
            min_floor_minor: None,
            currency: None,
            user_id,
        }
    }

    #[must_use]
    pub fn member_limit(mut self, limit: u32) -> Self {
        self.member_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn min_floor_minor(mut self, floor: i64) -> Self {
        self.min_floor_minor = Some(floor);
        self
    }

    #[must_use]
    pub fn currency(mut self, code: impl Into<String>) -> Self {
        self.currency = Some(code.into());
        self
    }
}

/// Owner-only changes to group settings. `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub min_floor_minor: Option<i64>,
}
