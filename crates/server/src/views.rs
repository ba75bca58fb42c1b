//! Conversions between engine types and the JSON contracts.
//!
//! Money leaves the engine as integer minor units; the `f64` major-unit
//! fields are computed here for display only.

use api_types::{
    AmountInput,
    analysis::{AnalysisView, CategoryTotal, MemberDetail, SettlementView},
    expense::{self as api_expense, ExpenseView, ParticipantView, SplitInput},
    group::{GroupDetail as GroupDetailView, GroupSummary as GroupSummaryView, GroupType},
    member::MemberView,
    user::Me,
};
use engine::{
    ApprovalStatus, Currency, EngineError, Expense, ExpenseSource, ExpenseStatus, GroupAnalysis,
    GroupDetail, GroupKind, GroupSummary, Member, Money, SplitSpec, User, UserId,
};

pub(crate) fn currency_to_api(currency: Currency) -> api_types::Currency {
    match currency {
        Currency::Inr => api_types::Currency::Inr,
        Currency::Usd => api_types::Currency::Usd,
        Currency::Eur => api_types::Currency::Eur,
    }
}

pub(crate) fn kind_from_api(kind: GroupType) -> GroupKind {
    match kind {
        GroupType::Short => GroupKind::Short,
        GroupType::Long => GroupKind::Long,
    }
}

fn kind_to_api(kind: GroupKind) -> GroupType {
    match kind {
        GroupKind::Short => GroupType::Short,
        GroupKind::Long => GroupType::Long,
    }
}

pub(crate) fn status_from_api(status: api_expense::ExpenseStatus) -> ExpenseStatus {
    match status {
        api_expense::ExpenseStatus::Pending => ExpenseStatus::Pending,
        api_expense::ExpenseStatus::Approved => ExpenseStatus::Approved,
        api_expense::ExpenseStatus::Rejected => ExpenseStatus::Rejected,
        api_expense::ExpenseStatus::Disputed => ExpenseStatus::Disputed,
    }
}

fn status_to_api(status: ExpenseStatus) -> api_expense::ExpenseStatus {
    match status {
        ExpenseStatus::Pending => api_expense::ExpenseStatus::Pending,
        ExpenseStatus::Approved => api_expense::ExpenseStatus::Approved,
        ExpenseStatus::Rejected => api_expense::ExpenseStatus::Rejected,
        ExpenseStatus::Disputed => api_expense::ExpenseStatus::Disputed,
    }
}

pub(crate) fn approval_from_api(approval: api_expense::ApprovalStatus) -> ApprovalStatus {
    match approval {
        api_expense::ApprovalStatus::Pending => ApprovalStatus::Pending,
        api_expense::ApprovalStatus::Approved => ApprovalStatus::Approved,
        api_expense::ApprovalStatus::Rejected => ApprovalStatus::Rejected,
        api_expense::ApprovalStatus::Disputed => ApprovalStatus::Disputed,
    }
}

fn approval_to_api(approval: ApprovalStatus) -> api_expense::ApprovalStatus {
    match approval {
        ApprovalStatus::Pending => api_expense::ApprovalStatus::Pending,
        ApprovalStatus::Approved => api_expense::ApprovalStatus::Approved,
        ApprovalStatus::Rejected => api_expense::ApprovalStatus::Rejected,
        ApprovalStatus::Disputed => api_expense::ApprovalStatus::Disputed,
    }
}

fn source_to_api(source: ExpenseSource) -> api_expense::ExpenseSource {
    match source {
        ExpenseSource::Manual => api_expense::ExpenseSource::Manual,
        ExpenseSource::Ai => api_expense::ExpenseSource::Ai,
        ExpenseSource::Receipt => api_expense::ExpenseSource::Receipt,
    }
}

/// Comma separated status filter, e.g. `PENDING,DISPUTED`.
pub(crate) fn parse_status_filter(raw: &str) -> Result<Vec<ExpenseStatus>, EngineError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ExpenseStatus::try_from)
        .collect()
}

pub(crate) fn parse_amount(input: &AmountInput, currency: Currency) -> Result<Money, EngineError> {
    Money::parse_major(&input.as_decimal(), currency)
}

pub(crate) fn split_from_api(
    split: SplitInput,
    currency: Currency,
) -> Result<SplitSpec, EngineError> {
    Ok(match split {
        SplitInput::Equal { members } => SplitSpec::Equal(members),
        SplitInput::Exact { shares } => SplitSpec::Exact(
            shares
                .iter()
                .map(|share| Ok((share.member_id, parse_amount(&share.amount, currency)?.minor())))
                .collect::<Result<_, EngineError>>()?,
        ),
        SplitInput::Weighted { weights } => SplitSpec::Weighted(
            weights
                .into_iter()
                .map(|share| (share.member_id, share.weight))
                .collect(),
        ),
    })
}

pub(crate) fn member_view(member: &Member) -> MemberView {
    MemberView {
        id: member.id,
        name: member.name.clone(),
    }
}

pub(crate) fn summary_view(summary: &GroupSummary) -> GroupSummaryView {
    GroupSummaryView {
        id: summary.group_id,
        name: summary.name.clone(),
        kind: kind_to_api(summary.kind),
        total_transactions: summary.total_transactions,
        approved_transactions: summary.approved_transactions,
        pending_transactions: summary.pending_transactions,
        disputed_transactions: summary.disputed_transactions,
        net_amount: summary.net.to_major_f64(),
        net_amount_minor: summary.net.minor(),
        member_count: summary.member_count,
        last_activity: summary.last_activity,
    }
}

pub(crate) fn detail_view(detail: &GroupDetail, requester: UserId) -> GroupDetailView {
    let group = &detail.group;
    GroupDetailView {
        summary: summary_view(&detail.summary),
        owner_id: group.owner_id,
        is_owner: group.is_owner(requester),
        members: group.members().iter().map(member_view).collect(),
        member_limit: group.member_limit,
        min_floor: group.min_floor.to_major_f64(),
        min_floor_minor: group.min_floor.minor(),
        currency: currency_to_api(group.currency),
        invite_code: group.invite_code.clone(),
        created_at: group.created_at,
        archived: group.is_archived(),
    }
}

pub(crate) fn expense_view(expense: &Expense, requester: UserId) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        group_id: expense.group_id,
        amount: expense.amount.to_major_f64(),
        amount_minor: expense.amount.minor(),
        currency: currency_to_api(expense.amount.currency()),
        description: expense.description.clone(),
        category: expense.category.clone(),
        payer: member_view(&expense.payer),
        created_at: expense.created_at,
        status: status_to_api(expense.status),
        dispute_reason: expense.dispute_reason.clone(),
        user_approval_status: expense.approval_of(requester).map(approval_to_api),
        source: source_to_api(expense.source),
        participants: expense
            .participants
            .iter()
            .map(|p| ParticipantView {
                id: p.member.id,
                name: p.member.name.clone(),
                share: p.share.to_major_f64(),
                share_minor: p.share.minor(),
                approval_status: approval_to_api(p.approval),
            })
            .collect(),
    }
}

pub(crate) fn analysis_view(analysis: &GroupAnalysis) -> AnalysisView {
    AnalysisView {
        group_id: analysis.group_id,
        currency: currency_to_api(analysis.currency),
        min_floor_minor: analysis.min_floor.minor(),
        member_details: analysis
            .members
            .iter()
            .map(|m| MemberDetail {
                name: m.balance.member.name.clone(),
                id: m.balance.member.id,
                balance: m.balance.net.to_major_f64(),
                balance_minor: m.balance.net.minor(),
                transaction_count: m.balance.transaction_count,
                is_member: m.balance.is_member,
                over_floor: m.over_floor,
            })
            .collect(),
        settlements: analysis
            .settlements
            .iter()
            .map(|s| SettlementView {
                from: member_view(&s.from),
                to: member_view(&s.to),
                amount: s.amount.to_major_f64(),
                amount_minor: s.amount.minor(),
            })
            .collect(),
        total_spent: analysis.total_spent.to_major_f64(),
        total_spent_minor: analysis.total_spent.minor(),
        category_totals: analysis
            .category_totals
            .iter()
            .map(|(category, amount)| CategoryTotal {
                category: category.clone(),
                amount: amount.to_major_f64(),
                amount_minor: amount.minor(),
            })
            .collect(),
        computed_at: analysis.computed_at,
    }
}

pub(crate) fn me_view(user: &User) -> Me {
    Me {
        id: user.id,
        external_id: user.external_id.clone(),
        name: user.name.clone(),
        created_at: user.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_accepts_lists() {
        let statuses = parse_status_filter("pending, DISPUTED,").unwrap();
        assert_eq!(statuses, vec![ExpenseStatus::Pending, ExpenseStatus::Disputed]);
        assert!(parse_status_filter("PENDING,LOST").is_err());
    }

    #[test]
    fn exact_split_amounts_are_parsed_in_minor_units() {
        let split = SplitInput::Exact {
            shares: vec![api_expense::ExactShare {
                member_id: 3,
                amount: AmountInput::Text("12.50".to_string()),
            }],
        };
        assert_eq!(
            split_from_api(split, Currency::Inr).unwrap(),
            SplitSpec::Exact(vec![(3, 1_250)])
        );
    }
}
