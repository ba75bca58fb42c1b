//! Group analysis: balances, settlements and spending totals derived from a
//! group snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Balance, Currency, ExpenseStatus, Group, Money, ResultEngine, Settlement, SplitPolicy, UserId,
    balances::{compute_balances, settle},
    groups::GroupKind,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub balance: Balance,
    /// The member owes more than the group's `min_floor`.
    pub over_floor: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAnalysis {
    pub group_id: i64,
    pub currency: Currency,
    pub min_floor: Money,
    /// Ordered by member id.
    pub members: Vec<MemberBalance>,
    pub settlements: Vec<Settlement>,
    /// Sum of all expenses that count towards balances.
    pub total_spent: Money,
    /// Category key to total, sorted by category.
    pub category_totals: Vec<(String, Money)>,
    pub computed_at: DateTime<Utc>,
}

impl GroupAnalysis {
    pub fn compute(group: &Group, policy: SplitPolicy, now: DateTime<Utc>) -> ResultEngine<Self> {
        let balances = compute_balances(group.members(), group.ledger(), group.currency, policy)?;
        let settlements = settle(&balances)?;

        let mut total_spent = Money::zero(group.currency);
        let mut categories: BTreeMap<String, Money> = BTreeMap::new();
        for expense in group
            .ledger()
            .iter()
            .filter(|e| e.status.counts_towards_balance())
        {
            total_spent = total_spent.checked_add(expense.amount)?;
            let slot = categories
                .entry(expense.category.clone())
                .or_insert_with(|| Money::zero(group.currency));
            *slot = slot.checked_add(expense.amount)?;
        }

        let members = balances
            .into_values()
            .map(|balance| MemberBalance {
                over_floor: balance.net.minor() < 0
                    && balance.net.minor().unsigned_abs() > group.min_floor.minor().unsigned_abs(),
                balance,
            })
            .collect();

        Ok(Self {
            group_id: group.id,
            currency: group.currency,
            min_floor: group.min_floor,
            members,
            settlements,
            total_spent,
            category_totals: categories.into_iter().collect(),
            computed_at: now,
        })
    }

    pub fn balance_of(&self, member_id: i64) -> Option<&Balance> {
        self.members
            .iter()
            .map(|m| &m.balance)
            .find(|b| b.member.id == member_id)
    }
}

/// One line of the requester's group list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_id: i64,
    pub name: String,
    pub kind: GroupKind,
    pub total_transactions: u32,
    pub approved_transactions: u32,
    pub pending_transactions: u32,
    pub disputed_transactions: u32,
    /// Net balance of the requester in this group.
    pub net: Money,
    pub member_count: u32,
    pub last_activity: DateTime<Utc>,
}

impl GroupSummary {
    pub fn compute(group: &Group, requester: UserId, policy: SplitPolicy) -> ResultEngine<Self> {
        let balances = compute_balances(group.members(), group.ledger(), group.currency, policy)?;
        let net = balances
            .get(&requester)
            .map_or_else(|| Money::zero(group.currency), |b| b.net);

        let count = |status: ExpenseStatus| -> u32 {
            let n = group.ledger().iter().filter(|e| e.status == status).count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };
        let last_activity = group
            .ledger()
            .iter()
            .map(|e| e.updated_at)
            .max()
            .map_or(group.created_at, |last| last.max(group.created_at));

        Ok(Self {
            group_id: group.id,
            name: group.name.clone(),
            kind: group.kind,
            total_transactions: u32::try_from(group.ledger().len()).unwrap_or(u32::MAX),
            approved_transactions: count(ExpenseStatus::Approved),
            pending_transactions: count(ExpenseStatus::Pending),
            disputed_transactions: count(ExpenseStatus::Disputed),
            net,
            member_count: u32::try_from(group.members().len()).unwrap_or(u32::MAX),
            last_activity,
        })
    }
}

/// A group snapshot together with the requester's summary line.
#[derive(Clone, Debug)]
pub struct GroupDetail {
    pub group: Group,
    pub summary: GroupSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExpenseCmd, Member, groups::NewGroup};

    fn scenario() -> Group {
        let mut group = Group::create(
            7,
            NewGroup {
                name: "Goa".to_string(),
                kind: GroupKind::Short,
                owner: Member::new(1, "A"),
                member_limit: None,
                min_floor: Money::new(2_000, Currency::Inr),
                invite_code: "code".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        group.add_member(Member::new(2, "B"), 1).unwrap();
        group.add_member(Member::new(3, "C"), 1).unwrap();
        for (id, cmd) in [
            (1, ExpenseCmd::new(7, 1, 9_000, "Dinner").category("Food")),
            (2, ExpenseCmd::new(7, 2, 300, "Chai").category("food")),
            (3, ExpenseCmd::new(7, 1, 600, "Cab").category("travel")),
        ] {
            let mut expense = group.prepare_expense(&cmd, Utc::now(), false).unwrap();
            expense.id = id;
            group.record_expense(expense).unwrap();
        }
        group
            .set_expense_status(3, ExpenseStatus::Rejected, None, 1, Utc::now())
            .unwrap();
        group
    }

    #[test]
    fn analysis_totals_skip_rejected_expenses() {
        let group = scenario();
        let analysis = GroupAnalysis::compute(&group, SplitPolicy::CreationTime, Utc::now()).unwrap();
        assert_eq!(analysis.total_spent.minor(), 9_300);
        assert_eq!(
            analysis.category_totals,
            vec![("food".to_string(), Money::new(9_300, Currency::Inr))]
        );
        assert_eq!(analysis.balance_of(1).unwrap().net.minor(), 6_000 - 100);
        assert_eq!(analysis.balance_of(2).unwrap().net.minor(), 300 - 3_000 - 100);
        let sum: i64 = analysis.members.iter().map(|m| m.balance.net.minor()).sum();
        assert_eq!(sum, 0);
    }

    #[test]
    fn over_floor_flags_large_debts_only() {
        let group = scenario();
        let analysis = GroupAnalysis::compute(&group, SplitPolicy::CreationTime, Utc::now()).unwrap();
        let flagged: Vec<_> = analysis
            .members
            .iter()
            .filter(|m| m.over_floor)
            .map(|m| m.balance.member.id)
            .collect();
        assert_eq!(flagged, vec![2, 3]);
    }

    #[test]
    fn summary_counts_statuses_and_requester_net() {
        let group = scenario();
        let summary = GroupSummary::compute(&group, 3, SplitPolicy::CreationTime).unwrap();
        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.pending_transactions, 2);
        assert_eq!(summary.approved_transactions, 0);
        assert_eq!(summary.member_count, 3);
        assert_eq!(summary.net.minor(), -3_100);
    }
}
