use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Inr,
    Usd,
    Eur,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Self::Inr => "INR",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

/// A money amount as typed by a client: either a JSON number (`90.5`) or a
/// decimal string (`"90.50"`).
///
/// The server never goes through floating point: numbers are read back as
/// their decimal text and parsed into minor units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl AmountInput {
    /// The amount as decimal text, ready for a minor-unit parser.
    pub fn as_decimal(&self) -> String {
        match self {
            Self::Number(number) => number.to_string(),
            Self::Text(text) => text.trim().to_string(),
        }
    }
}

pub mod member {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MemberView {
        pub id: i64,
        pub name: String,
    }

    /// Request body for adding a member (owner-only).
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct MemberAdd {
        pub member_id: i64,
    }
}

pub mod group {
    use super::*;
    use crate::member::MemberView;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum GroupType {
        Short,
        Long,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct GroupNew {
        pub name: String,
        #[serde(rename = "type")]
        pub kind: GroupType,
        pub member_limit: Option<u32>,
        /// Debt threshold in major units.
        pub min_floor: Option<AmountInput>,
        pub currency: Option<Currency>,
    }

    /// Owner-only changes; absent fields stay as they are.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct GroupUpdate {
        pub name: Option<String>,
        pub min_floor: Option<AmountInput>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct OwnerTransfer {
        pub member_id: i64,
    }

    /// One entry of `GET /groups`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GroupSummary {
        pub id: i64,
        pub name: String,
        #[serde(rename = "type")]
        pub kind: GroupType,
        pub total_transactions: u32,
        pub approved_transactions: u32,
        pub pending_transactions: u32,
        pub disputed_transactions: u32,
        /// The requester's net balance, display only.
        pub net_amount: f64,
        pub net_amount_minor: i64,
        pub member_count: u32,
        pub last_activity: DateTime<Utc>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct GroupDetail {
        #[serde(flatten)]
        pub summary: GroupSummary,
        pub owner_id: i64,
        /// Whether the requester owns the group.
        pub is_owner: bool,
        pub members: Vec<MemberView>,
        pub member_limit: Option<u32>,
        pub min_floor: f64,
        pub min_floor_minor: i64,
        pub currency: Currency,
        pub invite_code: String,
        pub created_at: DateTime<Utc>,
        pub archived: bool,
    }
}

pub mod expense {
    use super::*;
    use crate::member::MemberView;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ExpenseStatus {
        Pending,
        Approved,
        Rejected,
        Disputed,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ApprovalStatus {
        Pending,
        Approved,
        Rejected,
        Disputed,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ExpenseSource {
        Manual,
        Ai,
        Receipt,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct ExactShare {
        pub member_id: i64,
        pub amount: AmountInput,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct WeightedShare {
        pub member_id: i64,
        pub weight: u32,
    }

    /// How to split a manual expense. Without one, all current members share
    /// equally.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum SplitInput {
        Equal { members: Vec<i64> },
        Exact { shares: Vec<ExactShare> },
        Weighted { weights: Vec<WeightedShare> },
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct ExpenseNew {
        pub amount: AmountInput,
        pub description: String,
        pub category: Option<String>,
        /// Defaults to the requester.
        pub payer_id: Option<i64>,
        pub split: Option<SplitInput>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct ExpenseAiNew {
        pub text_input: String,
        pub user_name: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct Dispute {
        pub reason: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct StatusChange {
        pub status: ExpenseStatus,
        pub reason: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct ApprovalDecision {
        pub decision: ApprovalStatus,
    }

    /// Query string of `GET /groups/{id}/expenses`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct ExpenseListQuery {
        /// Comma separated statuses, e.g. `PENDING,DISPUTED`.
        pub status: Option<String>,
        pub limit: Option<usize>,
        /// Opaque cursor from the `X-Next-Cursor` header.
        pub cursor: Option<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ParticipantView {
        pub id: i64,
        pub name: String,
        pub share: f64,
        pub share_minor: i64,
        pub approval_status: ApprovalStatus,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: i64,
        pub group_id: i64,
        /// Display only; `amount_minor` is authoritative.
        pub amount: f64,
        pub amount_minor: i64,
        pub currency: Currency,
        pub description: String,
        pub category: String,
        pub payer: MemberView,
        pub created_at: DateTime<Utc>,
        pub status: ExpenseStatus,
        pub dispute_reason: Option<String>,
        /// The requester's own approval, absent when they do not take part.
        pub user_approval_status: Option<ApprovalStatus>,
        pub source: ExpenseSource,
        pub participants: Vec<ParticipantView>,
    }
}

pub mod analysis {
    use super::*;
    use crate::member::MemberView;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct MemberDetail {
        pub name: String,
        pub id: i64,
        pub balance: f64,
        pub balance_minor: i64,
        pub transaction_count: u32,
        pub is_member: bool,
        pub over_floor: bool,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SettlementView {
        pub from: MemberView,
        pub to: MemberView,
        pub amount: f64,
        pub amount_minor: i64,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CategoryTotal {
        pub category: String,
        pub amount: f64,
        pub amount_minor: i64,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AnalysisView {
        pub group_id: i64,
        pub currency: Currency,
        pub min_floor_minor: i64,
        pub member_details: Vec<MemberDetail>,
        pub settlements: Vec<SettlementView>,
        pub total_spent: f64,
        pub total_spent_minor: i64,
        pub category_totals: Vec<CategoryTotal>,
        pub computed_at: DateTime<Utc>,
    }
}

pub mod user {
    use super::*;

    /// `GET /me`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct Me {
        pub id: i64,
        pub external_id: String,
        pub name: String,
        pub created_at: DateTime<Utc>,
    }
}

pub mod error {
    use super::*;

    /// Body of every error response.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ErrorBody {
        /// Human readable, shown to users verbatim.
        pub error: String,
        /// Stable upper-snake identifier such as `VALIDATION_ERROR`.
        pub code: String,
        /// Operation that failed (`dispute`, `delete`, `leave`, ...).
        #[serde(skip_serializing_if = "Option::is_none")]
        pub action: Option<String>,
    }
}
