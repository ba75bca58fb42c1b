//! The expense ledger of one group.
//!
//! `Ledger` is a plain in-memory collection: it validates every change
//! against the expense state machine but knows nothing about storage. The
//! engine loads it inside a DB transaction, mutates it, then persists the
//! touched records.

use std::{
    cmp::Reverse,
    collections::{BTreeSet, HashMap},
    ops::Bound,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ApprovalStatus, EngineError, Expense, ExpenseId, ExpenseStatus, Member, ResultEngine, UserId,
    util::normalize_optional_text,
};

type OrderKey = (Reverse<DateTime<Utc>>, Reverse<ExpenseId>);

/// Position in the newest-first ordering, used to resume a listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCursor {
    pub created_at: DateTime<Utc>,
    pub id: ExpenseId,
}

impl From<&Expense> for LedgerCursor {
    fn from(expense: &Expense) -> Self {
        Self {
            created_at: expense.created_at,
            id: expense.id,
        }
    }
}

/// Filters for listing expenses.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct ExpenseFilter {
    /// If present, acts as an allow-list of statuses to return.
    pub statuses: Option<Vec<ExpenseStatus>>,
    pub payer: Option<UserId>,
    /// Only expenses where this member is payer or participant.
    pub involving: Option<UserId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ExpenseFilter {
    pub fn validate(&self) -> ResultEngine<()> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from >= to
        {
            return Err(EngineError::Validation(
                "invalid range: from must be < to".to_string(),
            ));
        }
        if self.statuses.as_ref().is_some_and(Vec::is_empty) {
            return Err(EngineError::Validation(
                "statuses must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn matches(&self, expense: &Expense) -> bool {
        if let Some(statuses) = &self.statuses
            && !statuses.contains(&expense.status)
        {
            return false;
        }
        if self.payer.is_some_and(|payer| expense.payer.id != payer) {
            return false;
        }
        if self.involving.is_some_and(|member| !expense.involves(member)) {
            return false;
        }
        if self.from.is_some_and(|from| expense.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| expense.created_at >= to) {
            return false;
        }
        true
    }
}

#[derive(Clone, Debug, Default)]
pub struct Ledger {
    expenses: HashMap<ExpenseId, Expense>,
    order: BTreeSet<OrderKey>,
}

fn order_key(created_at: DateTime<Utc>, id: ExpenseId) -> OrderKey {
    (Reverse(created_at), Reverse(id))
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from stored records without re-running the
    /// creation checks (members may have left since).
    pub(crate) fn from_stored(expenses: Vec<Expense>) -> ResultEngine<Self> {
        let mut ledger = Self::new();
        for expense in expenses {
            let id = expense.id;
            ledger.order.insert(order_key(expense.created_at, id));
            if ledger.expenses.insert(id, expense).is_some() {
                return Err(EngineError::CorruptLedger(format!(
                    "expense {id} stored twice"
                )));
            }
        }
        Ok(ledger)
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    pub fn get(&self, id: ExpenseId) -> Option<&Expense> {
        self.expenses.get(&id)
    }

    fn require(&self, id: ExpenseId) -> ResultEngine<&Expense> {
        self.expenses
            .get(&id)
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    fn require_mut(&mut self, id: ExpenseId) -> ResultEngine<&mut Expense> {
        self.expenses
            .get_mut(&id)
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    /// All expenses in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Expense> {
        self.expenses.values()
    }

    /// Adds a new record.
    ///
    /// Fails with `InvalidExpense` when the amount is not positive, the payer
    /// or a participant is not in `members`, the id is already used, the
    /// status is not an initial one (`PENDING`/`APPROVED`) or the shares do
    /// not sum to the amount.
    pub fn append(&mut self, expense: Expense, members: &[Member]) -> ResultEngine<&Expense> {
        let is_member = |id: UserId| members.iter().any(|m| m.id == id);
        if !matches!(
            expense.status,
            ExpenseStatus::Pending | ExpenseStatus::Approved
        ) {
            return Err(EngineError::InvalidExpense(format!(
                "a new expense cannot start as {}",
                expense.status.as_str()
            )));
        }
        if !is_member(expense.payer.id) {
            return Err(EngineError::InvalidExpense(
                "payer is not a member of the group".to_string(),
            ));
        }
        if let Some(outsider) = expense.participants.iter().find(|p| !is_member(p.member.id)) {
            return Err(EngineError::InvalidExpense(format!(
                "member {} is not in the group",
                outsider.member.id
            )));
        }
        expense.validate()?;
        if self.expenses.contains_key(&expense.id) {
            return Err(EngineError::InvalidExpense(format!(
                "expense {} already recorded",
                expense.id
            )));
        }

        let id = expense.id;
        self.order.insert(order_key(expense.created_at, id));
        let stored = self.expenses.entry(id).or_insert(expense);
        Ok(&*stored)
    }

    /// Moves an expense along the status state machine.
    ///
    /// Illegal edges fail with `InvalidTransition`; `DISPUTED` without a
    /// non-blank reason fails with `MissingReason`.
    pub fn transition(
        &mut self,
        id: ExpenseId,
        next: ExpenseStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultEngine<&Expense> {
        let expense = self.require_mut(id)?;
        if !expense.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition(format!(
                "cannot move expense from {} to {}",
                expense.status.as_str(),
                next.as_str()
            )));
        }
        if next == ExpenseStatus::Disputed {
            let reason = normalize_optional_text(reason).ok_or_else(|| {
                EngineError::MissingReason("disputing an expense needs a reason".to_string())
            })?;
            expense.dispute_reason = Some(reason);
        }
        expense.status = next;
        expense.updated_at = now;
        Ok(&*expense)
    }

    /// Disputes an expense on behalf of `member`, marking their personal
    /// approval as disputed too.
    pub fn dispute(
        &mut self,
        id: ExpenseId,
        member: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<&Expense> {
        self.transition(id, ExpenseStatus::Disputed, Some(reason), now)?;
        let expense = self.require_mut(id)?;
        if let Some(participant) = expense.participant_mut(member) {
            participant.approval = ApprovalStatus::Disputed;
        }
        Ok(&*expense)
    }

    /// Records a member's personal verdict.
    ///
    /// Once every participant approved, a `PENDING` expense becomes
    /// `APPROVED`. A personal rejection never changes the group-level status.
    pub fn record_approval(
        &mut self,
        id: ExpenseId,
        member: UserId,
        decision: ApprovalStatus,
        now: DateTime<Utc>,
    ) -> ResultEngine<&Expense> {
        if !matches!(decision, ApprovalStatus::Approved | ApprovalStatus::Rejected) {
            return Err(EngineError::Validation(format!(
                "approval decision must be APPROVED or REJECTED, got {}",
                decision.as_str()
            )));
        }
        let expense = self.require_mut(id)?;
        if expense.status == ExpenseStatus::Rejected {
            return Err(EngineError::InvalidTransition(
                "expense is rejected".to_string(),
            ));
        }
        let participant = expense.participant_mut(member).ok_or_else(|| {
            EngineError::Forbidden("only participants can approve an expense".to_string())
        })?;
        participant.approval = decision;
        if expense.status == ExpenseStatus::Pending && expense.all_approved() {
            expense.status = ExpenseStatus::Approved;
        }
        expense.updated_at = now;
        Ok(&*expense)
    }

    /// Removes an expense. Only its payer or the group owner may do so.
    pub fn remove(
        &mut self,
        id: ExpenseId,
        requester: UserId,
        owner: UserId,
    ) -> ResultEngine<Expense> {
        let expense = self.require(id)?;
        if expense.payer.id != requester && owner != requester {
            return Err(EngineError::Forbidden(
                "only the payer or the group owner can delete an expense".to_string(),
            ));
        }
        let key = order_key(expense.created_at, id);
        self.order.remove(&key);
        self.expenses
            .remove(&id)
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    /// Newest-first listing.
    ///
    /// The iterator is lazy and `Clone`, so a caller can restart it without
    /// touching the ledger again.
    pub fn list<'a>(
        &'a self,
        filter: &'a ExpenseFilter,
    ) -> impl Iterator<Item = &'a Expense> + Clone + 'a {
        self.list_after(filter, None)
    }

    /// Like [`Ledger::list`], resuming strictly after `cursor`.
    pub fn list_after<'a>(
        &'a self,
        filter: &'a ExpenseFilter,
        cursor: Option<LedgerCursor>,
    ) -> impl Iterator<Item = &'a Expense> + Clone + 'a {
        let start = match cursor {
            Some(cursor) => Bound::Excluded(order_key(cursor.created_at, cursor.id)),
            None => Bound::Unbounded,
        };
        self.order
            .range((start, Bound::Unbounded))
            .filter_map(move |(_, Reverse(id))| self.expenses.get(id))
            .filter(move |expense| filter.matches(expense))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{Currency, ExpenseSource, Money, Participant};

    fn member(id: UserId) -> Member {
        Member::new(id, format!("m{id}"))
    }

    fn members() -> Vec<Member> {
        vec![member(1), member(2), member(3)]
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn expense(id: ExpenseId, payer: UserId, amount: i64, created: i64) -> Expense {
        let shares = Money::new(amount, Currency::Inr).allocate(3).unwrap();
        Expense {
            id,
            group_id: 1,
            amount: Money::new(amount, Currency::Inr),
            description: format!("expense {id}"),
            category: "general".to_string(),
            payer: member(payer),
            created_by: payer,
            created_at: at(created),
            updated_at: at(created),
            status: ExpenseStatus::Pending,
            dispute_reason: None,
            source: ExpenseSource::Manual,
            explicit_split: false,
            idempotency_key: None,
            participants: members()
                .into_iter()
                .zip(shares)
                .map(|(m, share)| Participant {
                    approval: if m.id == payer {
                        ApprovalStatus::Approved
                    } else {
                        ApprovalStatus::Pending
                    },
                    member: m,
                    share,
                })
                .collect(),
        }
    }

    fn ledger_with(expenses: Vec<Expense>) -> Ledger {
        let mut ledger = Ledger::new();
        for e in expenses {
            ledger.append(e, &members()).unwrap();
        }
        ledger
    }

    #[test]
    fn append_rejects_invalid_records() {
        let mut ledger = Ledger::new();

        let mut zero = expense(1, 1, 9000, 0);
        zero.amount = Money::new(0, Currency::Inr);
        assert!(matches!(
            ledger.append(zero, &members()),
            Err(EngineError::InvalidExpense(_))
        ));

        let outsider = expense(2, 9, 9000, 0);
        assert!(matches!(
            ledger.append(outsider, &members()),
            Err(EngineError::InvalidExpense(_))
        ));

        let mut rejected = expense(3, 1, 9000, 0);
        rejected.status = ExpenseStatus::Rejected;
        assert!(matches!(
            ledger.append(rejected, &members()),
            Err(EngineError::InvalidExpense(_))
        ));

        let mut lopsided = expense(4, 1, 9000, 0);
        lopsided.participants[0].share = Money::new(1, Currency::Inr);
        assert!(matches!(
            ledger.append(lopsided, &members()),
            Err(EngineError::InvalidExpense(_))
        ));

        ledger.append(expense(5, 1, 9000, 0), &members()).unwrap();
        assert!(matches!(
            ledger.append(expense(5, 2, 300, 1), &members()),
            Err(EngineError::InvalidExpense(_))
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn rejected_expenses_accept_no_transition() {
        let mut ledger = ledger_with(vec![expense(1, 1, 9000, 0)]);
        ledger
            .transition(1, ExpenseStatus::Rejected, None, at(1))
            .unwrap();
        for next in [
            ExpenseStatus::Pending,
            ExpenseStatus::Approved,
            ExpenseStatus::Rejected,
            ExpenseStatus::Disputed,
        ] {
            let err = ledger.transition(1, next, Some("why"), at(2)).unwrap_err();
            assert!(matches!(err, EngineError::InvalidTransition(_)));
        }
        assert!(matches!(
            ledger.record_approval(1, 2, ApprovalStatus::Approved, at(3)),
            Err(EngineError::InvalidTransition(_))
        ));
    }

    #[test]
    fn dispute_requires_reason() {
        let mut ledger = ledger_with(vec![expense(1, 1, 9000, 0)]);
        for reason in [None, Some(""), Some("   ")] {
            let err = ledger
                .transition(1, ExpenseStatus::Disputed, reason, at(1))
                .unwrap_err();
            assert!(matches!(err, EngineError::MissingReason(_)));
        }
        assert_eq!(ledger.get(1).unwrap().status, ExpenseStatus::Pending);

        let disputed = ledger.dispute(1, 2, " wasn't there ", at(1)).unwrap();
        assert_eq!(disputed.status, ExpenseStatus::Disputed);
        assert_eq!(disputed.dispute_reason.as_deref(), Some("wasn't there"));
        assert_eq!(disputed.approval_of(2), Some(ApprovalStatus::Disputed));
        assert_eq!(disputed.approval_of(1), Some(ApprovalStatus::Approved));
    }

    #[test]
    fn approvals_promote_pending_once_everyone_agrees() {
        let mut ledger = ledger_with(vec![expense(1, 1, 9000, 0)]);
        let e = ledger
            .record_approval(1, 2, ApprovalStatus::Approved, at(1))
            .unwrap();
        assert_eq!(e.status, ExpenseStatus::Pending);
        let e = ledger
            .record_approval(1, 3, ApprovalStatus::Approved, at(2))
            .unwrap();
        assert_eq!(e.status, ExpenseStatus::Approved);
    }

    #[test]
    fn personal_rejection_keeps_group_status() {
        let mut ledger = ledger_with(vec![expense(1, 1, 9000, 0)]);
        let e = ledger
            .record_approval(1, 2, ApprovalStatus::Rejected, at(1))
            .unwrap();
        assert_eq!(e.status, ExpenseStatus::Pending);
        assert_eq!(e.approval_of(2), Some(ApprovalStatus::Rejected));

        assert!(matches!(
            ledger.record_approval(1, 9, ApprovalStatus::Approved, at(2)),
            Err(EngineError::Forbidden(_))
        ));
        assert!(matches!(
            ledger.record_approval(1, 2, ApprovalStatus::Pending, at(2)),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn remove_is_limited_to_payer_or_owner() {
        let mut ledger = ledger_with(vec![expense(1, 2, 9000, 0), expense(2, 2, 300, 1)]);
        assert!(matches!(
            ledger.remove(1, 3, 1),
            Err(EngineError::Forbidden(_))
        ));
        ledger.remove(1, 2, 1).unwrap();
        ledger.remove(2, 1, 1).unwrap();
        assert!(ledger.is_empty());
        assert!(matches!(
            ledger.remove(2, 1, 1),
            Err(EngineError::KeyNotFound(_))
        ));
    }

    #[test]
    fn list_is_newest_first_and_restartable() {
        let ledger = ledger_with(vec![
            expense(1, 1, 100, 0),
            expense(2, 2, 200, 5),
            expense(3, 3, 300, 5),
            expense(4, 1, 400, 2),
        ]);
        let filter = ExpenseFilter::default();
        let listing = ledger.list(&filter);
        let ids: Vec<_> = listing.clone().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);
        let again: Vec<_> = listing.map(|e| e.id).collect();
        assert_eq!(ids, again);

        let cursor = LedgerCursor::from(ledger.get(2).unwrap());
        let rest: Vec<_> = ledger
            .list_after(&filter, Some(cursor))
            .map(|e| e.id)
            .collect();
        assert_eq!(rest, vec![4, 1]);
    }

    #[test]
    fn list_applies_filters() {
        let mut ledger = ledger_with(vec![
            expense(1, 1, 100, 0),
            expense(2, 2, 200, 1),
            expense(3, 1, 300, 2),
        ]);
        ledger
            .transition(3, ExpenseStatus::Rejected, None, at(3))
            .unwrap();

        let by_payer = ExpenseFilter {
            payer: Some(1),
            ..Default::default()
        };
        let ids: Vec<_> = ledger.list(&by_payer).map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 1]);

        let live = ExpenseFilter {
            statuses: Some(vec![ExpenseStatus::Pending, ExpenseStatus::Approved]),
            from: Some(at(1)),
            ..Default::default()
        };
        let ids: Vec<_> = ledger.list(&live).map(|e| e.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn append_then_list_returns_once_and_remove_hides() {
        let mut ledger = ledger_with(vec![expense(1, 1, 100, 0)]);
        ledger.append(expense(2, 1, 100, 1), &members()).unwrap();
        let filter = ExpenseFilter::default();
        assert_eq!(ledger.list(&filter).filter(|e| e.id == 2).count(), 1);
        ledger.remove(2, 1, 1).unwrap();
        assert_eq!(ledger.list(&filter).filter(|e| e.id == 2).count(), 0);
    }

    #[test]
    fn filter_rejects_empty_range() {
        let filter = ExpenseFilter {
            from: Some(at(1)),
            to: Some(at(1)),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }
}
