//! Net balances and settlement suggestions.
//!
//! Everything here is a pure function of a group's members and ledger: no
//! storage, no clock. For each expense that counts (anything but
//! `REJECTED`) the payer is credited the full amount and every participant is
//! debited their share, so the balances of a well-formed ledger always sum
//! to zero.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, Expense, Ledger, Member, Money, ResultEngine, UserId};

/// How expenses created without an explicit split are divided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Use the shares recorded when the expense was created (all members at
    /// that time). Later joins and leaves do not change past balances.
    #[default]
    CreationTime,
    /// Re-split equally across the members of the group *now*.
    CurrentMembership,
}

impl TryFrom<&str> for SplitPolicy {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "creation_time" => Ok(Self::CreationTime),
            "current_membership" => Ok(Self::CurrentMembership),
            other => Err(EngineError::Validation(format!(
                "invalid split policy: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub member: Member,
    /// `credited - debited`. Positive: the group owes this member.
    pub net: Money,
    pub credited: Money,
    pub debited: Money,
    /// Counting expenses this member paid for or takes part in.
    pub transaction_count: u32,
    /// `false` for former members who still appear in the ledger.
    pub is_member: bool,
}

impl Balance {
    fn new(member: Member, currency: Currency, is_member: bool) -> Self {
        Self {
            member,
            net: Money::zero(currency),
            credited: Money::zero(currency),
            debited: Money::zero(currency),
            transaction_count: 0,
            is_member,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub from: Member,
    pub to: Member,
    pub amount: Money,
}

/// Shares an expense contributes under `policy`.
fn effective_shares(
    expense: &Expense,
    members: &[Member],
    currency: Currency,
    policy: SplitPolicy,
) -> ResultEngine<Vec<(Member, Money)>> {
    let corrupt = |what: &str| EngineError::CorruptLedger(format!("expense {}: {what}", expense.id));

    if expense.amount.currency() != currency {
        return Err(corrupt("currency differs from the group currency"));
    }

    let shares: Vec<(Member, Money)> =
        if policy == SplitPolicy::CurrentMembership && !expense.explicit_split {
            let mut current: Vec<&Member> = members.iter().collect();
            current.sort_by_key(|m| m.id);
            let parts = expense
                .amount
                .allocate(current.len())
                .map_err(|_| corrupt("group has no members to split across"))?;
            current.into_iter().cloned().zip(parts).collect()
        } else {
            expense
                .participants
                .iter()
                .map(|p| (p.member.clone(), p.share))
                .collect()
        };

    if shares.is_empty() {
        return Err(corrupt("no participants"));
    }
    let total = Money::sum(shares.iter().map(|(_, share)| *share), currency)
        .map_err(|_| corrupt("shares overflow or mix currencies"))?;
    if total != expense.amount {
        return Err(corrupt("shares do not sum to the amount"));
    }
    Ok(shares)
}

/// Computes every member's net balance.
///
/// Current members always get an entry; former members get one when the
/// ledger still references them. Malformed stored data surfaces as
/// `CorruptLedger`.
pub fn compute_balances(
    members: &[Member],
    ledger: &Ledger,
    currency: Currency,
    policy: SplitPolicy,
) -> ResultEngine<BTreeMap<UserId, Balance>> {
    let mut balances: BTreeMap<UserId, Balance> = members
        .iter()
        .map(|m| (m.id, Balance::new(m.clone(), currency, true)))
        .collect();

    for expense in ledger.iter().filter(|e| e.status.counts_towards_balance()) {
        let shares = effective_shares(expense, members, currency, policy)?;
        let mut involved = BTreeSet::new();

        let payer = balances
            .entry(expense.payer.id)
            .or_insert_with(|| Balance::new(expense.payer.clone(), currency, false));
        payer.credited = payer.credited.checked_add(expense.amount)?;
        involved.insert(expense.payer.id);

        for (member, share) in shares {
            involved.insert(member.id);
            let entry = balances
                .entry(member.id)
                .or_insert_with(|| Balance::new(member, currency, false));
            entry.debited = entry.debited.checked_add(share)?;
        }

        for id in involved {
            if let Some(entry) = balances.get_mut(&id) {
                entry.transaction_count += 1;
            }
        }
    }

    for balance in balances.values_mut() {
        balance.net = balance.credited.checked_sub(balance.debited)?;
    }

    let total = Money::sum(balances.values().map(|b| b.net), currency)?;
    if !total.is_zero() {
        return Err(EngineError::CorruptLedger(format!(
            "balances sum to {total} instead of zero"
        )));
    }

    Ok(balances)
}

/// Greedy settlement plan: repeatedly pays the largest creditor from the
/// largest debtor. Produces at most `n - 1` transfers and zeroes every
/// balance. Ties are broken by member id so the plan is deterministic.
pub fn settle(balances: &BTreeMap<UserId, Balance>) -> ResultEngine<Vec<Settlement>> {
    let mut creditors: Vec<(Member, i64)> = Vec::new();
    let mut debtors: Vec<(Member, i64)> = Vec::new();
    let mut currency = None;
    for balance in balances.values() {
        currency.get_or_insert(balance.net.currency());
        let minor = balance.net.minor();
        if minor > 0 {
            creditors.push((balance.member.clone(), minor));
        } else if minor < 0 {
            let owed = minor.checked_neg().ok_or_else(|| {
                EngineError::InvalidArithmetic("balance overflow".to_string())
            })?;
            debtors.push((balance.member.clone(), owed));
        }
    }
    let Some(currency) = currency else {
        return Ok(Vec::new());
    };

    let by_size = |a: &(Member, i64), b: &(Member, i64)| b.1.cmp(&a.1).then(a.0.id.cmp(&b.0.id));
    let mut settlements = Vec::new();
    loop {
        creditors.sort_by(by_size);
        debtors.sort_by(by_size);
        let (Some(creditor), Some(debtor)) = (creditors.first_mut(), debtors.first_mut()) else {
            break;
        };
        let amount = creditor.1.min(debtor.1);
        creditor.1 -= amount;
        debtor.1 -= amount;
        settlements.push(Settlement {
            from: debtor.0.clone(),
            to: creditor.0.clone(),
            amount: Money::new(amount, currency),
        });
        creditors.retain(|(_, left)| *left > 0);
        debtors.retain(|(_, left)| *left > 0);
    }

    Ok(settlements)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{ApprovalStatus, ExpenseSource, ExpenseStatus, Participant};

    const INR: Currency = Currency::Inr;

    fn m(id: UserId) -> Member {
        Member::new(id, ["", "A", "B", "C", "D"][id as usize])
    }

    fn expense(id: i64, payer: UserId, amount: i64, participants: &[UserId]) -> Expense {
        let shares = Money::new(amount, INR).allocate(participants.len()).unwrap();
        Expense {
            id,
            group_id: 1,
            amount: Money::new(amount, INR),
            description: "x".to_string(),
            category: "general".to_string(),
            payer: m(payer),
            created_by: payer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            status: ExpenseStatus::Pending,
            dispute_reason: None,
            source: ExpenseSource::Manual,
            explicit_split: false,
            idempotency_key: None,
            participants: participants
                .iter()
                .zip(shares)
                .map(|(id, share)| Participant {
                    member: m(*id),
                    share,
                    approval: ApprovalStatus::Pending,
                })
                .collect(),
        }
    }

    fn net(balances: &BTreeMap<UserId, Balance>, id: UserId) -> i64 {
        balances[&id].net.minor()
    }

    fn assert_zero_sum(balances: &BTreeMap<UserId, Balance>) {
        let total: i64 = balances.values().map(|b| b.net.minor()).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn equal_split_scenario() {
        let members = vec![m(1), m(2), m(3)];
        let mut ledger = Ledger::new();
        ledger
            .append(expense(1, 1, 9000, &[1, 2, 3]), &members)
            .unwrap();

        let balances = compute_balances(&members, &ledger, INR, SplitPolicy::CreationTime).unwrap();
        assert_eq!(net(&balances, 1), 6000);
        assert_eq!(net(&balances, 2), -3000);
        assert_eq!(net(&balances, 3), -3000);
        assert!(balances.values().all(|b| b.transaction_count == 1));
        assert_zero_sum(&balances);
    }

    #[test]
    fn disputed_expenses_still_count_rejected_do_not() {
        let members = vec![m(1), m(2), m(3)];
        let mut ledger = Ledger::new();
        ledger
            .append(expense(1, 1, 9000, &[1, 2, 3]), &members)
            .unwrap();
        ledger
            .append(expense(2, 2, 300, &[1, 2, 3]), &members)
            .unwrap();
        ledger.dispute(1, 2, "wasn't there", Utc::now()).unwrap();
        ledger
            .transition(2, ExpenseStatus::Rejected, None, Utc::now())
            .unwrap();

        let balances = compute_balances(&members, &ledger, INR, SplitPolicy::CreationTime).unwrap();
        assert_eq!(net(&balances, 1), 6000);
        assert_eq!(net(&balances, 2), -3000);
        assert_eq!(balances[&2].transaction_count, 1);
    }

    #[test]
    fn former_members_keep_their_balance() {
        let members = vec![m(1), m(2), m(3)];
        let mut ledger = Ledger::new();
        ledger
            .append(expense(1, 1, 100, &[1, 2, 3]), &members)
            .unwrap();

        let remaining = vec![m(1), m(2)];
        let balances =
            compute_balances(&remaining, &ledger, INR, SplitPolicy::CreationTime).unwrap();
        assert!(!balances[&3].is_member);
        assert_eq!(net(&balances, 1), 66);
        assert_eq!(net(&balances, 2), -33);
        assert_eq!(net(&balances, 3), -33);
        assert_zero_sum(&balances);
    }

    #[test]
    fn current_membership_policy_resplits_default_expenses() {
        let members = vec![m(1), m(2), m(3)];
        let mut ledger = Ledger::new();
        ledger
            .append(expense(1, 1, 9000, &[1, 2, 3]), &members)
            .unwrap();
        let mut explicit = expense(2, 2, 1000, &[1, 2]);
        explicit.explicit_split = true;
        ledger.append(explicit, &members).unwrap();

        let now = vec![m(1), m(2)];
        let balances =
            compute_balances(&now, &ledger, INR, SplitPolicy::CurrentMembership).unwrap();
        // 9000 split over {1, 2}; the explicit 1000 keeps {1, 2} at 500 each.
        assert_eq!(net(&balances, 1), 9000 - 4500 - 500);
        assert_eq!(net(&balances, 2), 1000 - 4500 - 500);
        assert!(!balances.contains_key(&3));
        assert_zero_sum(&balances);
    }

    #[test]
    fn zero_sum_holds_across_many_ledgers() {
        let members = vec![m(1), m(2), m(3), m(4)];
        let groups: [&[UserId]; 4] = [&[1, 2, 3, 4], &[2, 3], &[4], &[1, 3, 4]];
        let mut ledger = Ledger::new();
        for id in 1..=40_i64 {
            let payer = (id % 4 + 1) as UserId;
            let split = groups[(id % 4) as usize];
            let mut split = split.to_vec();
            if !split.contains(&payer) {
                split.push(payer);
            }
            split.sort_unstable();
            ledger
                .append(expense(id, payer, 97 * id + 13, &split), &members)
                .unwrap();
            if id % 5 == 0 {
                ledger
                    .transition(id, ExpenseStatus::Rejected, None, Utc::now())
                    .unwrap();
            }
            for policy in [SplitPolicy::CreationTime, SplitPolicy::CurrentMembership] {
                let balances = compute_balances(&members, &ledger, INR, policy).unwrap();
                assert_zero_sum(&balances);
            }
        }
    }

    #[test]
    fn corrupt_shares_are_reported() {
        let members = vec![m(1), m(2)];
        let mut broken = expense(1, 1, 100, &[1, 2]);
        broken.participants[0].share = Money::new(1, INR);
        let ledger = Ledger::from_stored(vec![broken]).unwrap();
        let err = compute_balances(&members, &ledger, INR, SplitPolicy::CreationTime).unwrap_err();
        assert!(matches!(err, EngineError::CorruptLedger(_)));
    }

    #[test]
    fn settlements_zero_every_balance() {
        let members = vec![m(1), m(2), m(3), m(4)];
        let mut ledger = Ledger::new();
        ledger
            .append(expense(1, 1, 9000, &[1, 2, 3]), &members)
            .unwrap();
        ledger
            .append(expense(2, 4, 1000, &[2, 4]), &members)
            .unwrap();
        let balances = compute_balances(&members, &ledger, INR, SplitPolicy::CreationTime).unwrap();
        let plan = settle(&balances).unwrap();
        assert!(plan.len() <= members.len() - 1);

        let mut left: BTreeMap<UserId, i64> =
            balances.iter().map(|(id, b)| (*id, b.net.minor())).collect();
        for s in &plan {
            *left.get_mut(&s.from.id).unwrap() += s.amount.minor();
            *left.get_mut(&s.to.id).unwrap() -= s.amount.minor();
            assert!(s.amount.is_positive());
        }
        assert!(left.values().all(|v| *v == 0));
    }
}
