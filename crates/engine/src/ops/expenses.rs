use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use sea_orm::{QueryFilter, TransactionTrait, prelude::*};

use crate::{
    ApprovalStatus, Currency, EngineError, Expense, ExpenseCmd, ExpenseDraft, ExpenseFilter,
    ExpenseSource, ExpenseStatus, ExtractFuture, Group, LedgerCursor, Member, ReceiptInput,
    ReceiptUpload, ResultEngine, TextInput, UserId, expenses, parse_quick_add, participants,
    util::{name_key, normalize_optional_text},
};

use super::{Engine, with_tx};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// One page of a newest-first expense listing.
#[derive(Clone, Debug)]
pub struct ExpensePage {
    pub items: Vec<Expense>,
    /// Opaque token for the next page, `None` on the last page.
    pub next_cursor: Option<String>,
}

fn encode_cursor(cursor: LedgerCursor) -> ResultEngine<String> {
    let raw = serde_json::to_vec(&cursor)
        .map_err(|err| EngineError::Validation(format!("invalid cursor: {err}")))?;
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

fn decode_cursor(token: &str) -> ResultEngine<LedgerCursor> {
    let invalid = || EngineError::Validation("invalid cursor".to_string());
    let raw = URL_SAFE_NO_PAD.decode(token.trim()).map_err(|_| invalid())?;
    serde_json::from_slice(&raw).map_err(|_| invalid())
}

fn normalize_idempotency_key(key: Option<&str>) -> ResultEngine<Option<String>> {
    let Some(key) = normalize_optional_text(key) else {
        return Ok(None);
    };
    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(EngineError::Validation(format!(
            "Idempotency-Key must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    Ok(Some(key))
}

fn find_by_key<'a>(group: &'a Group, key: Option<&str>) -> Option<&'a Expense> {
    let key = key?;
    group
        .ledger()
        .iter()
        .find(|e| e.idempotency_key.as_deref() == Some(key))
}

/// Matches a parsed payer name against the members; falls back to the
/// requester when nothing matches.
fn resolve_payer(members: &[Member], payer_name: Option<&str>, requester: UserId) -> UserId {
    let Some(wanted) = payer_name.map(name_key).filter(|k| !k.is_empty()) else {
        return requester;
    };
    let matching: Vec<UserId> = members
        .iter()
        .filter(|m| name_key(&m.name) == wanted)
        .map(|m| m.id)
        .collect();
    if matching.contains(&requester) {
        return requester;
    }
    matching.first().copied().unwrap_or(requester)
}

/// Group state the parsers need, read before any lock is taken.
struct ParseContext {
    currency: Currency,
    members: Vec<Member>,
    requester_name: String,
    replay: Option<Expense>,
}

impl Engine {
    /// Records a new expense.
    ///
    /// With an idempotency key, a retry returns the expense created by the
    /// first call instead of recording a duplicate.
    pub async fn new_expense(&self, mut cmd: ExpenseCmd) -> ResultEngine<Expense> {
        cmd.idempotency_key = normalize_idempotency_key(cmd.idempotency_key.as_deref())?;
        let group_id = cmd.group_id;
        let _guard = self.locks.acquire(group_id).await;
        let (expense, created) = with_tx!(self, |db_tx| {
            let mut group = self
                .load_group_for_member(&db_tx, group_id, cmd.user_id)
                .await?;
            match find_by_key(&group, cmd.idempotency_key.as_deref()) {
                Some(existing) if existing.created_by != cmd.user_id => Err(EngineError::Conflict(
                    "Idempotency-Key already used by another member".to_string(),
                )),
                Some(existing) => Ok((existing.clone(), false)),
                None => {
                    let mut expense =
                        group.prepare_expense(&cmd, Utc::now(), self.config.auto_approve)?;
                    self.save_expense(&db_tx, &mut expense).await?;
                    let stored = group.record_expense(expense)?.clone();
                    Ok((stored, true))
                }
            }
        })?;

        if created {
            self.cache.invalidate(group_id);
            tracing::info!(
                group_id,
                expense_id = expense.id,
                amount_minor = expense.amount.minor(),
                source = expense.source.as_str(),
                "expense created"
            );
        } else {
            tracing::info!(group_id, expense_id = expense.id, "expense creation replayed");
        }
        Ok(expense)
    }

    async fn parse_context(
        &self,
        group_id: i64,
        user_id: UserId,
        idempotency_key: Option<&str>,
    ) -> ResultEngine<ParseContext> {
        with_tx!(self, |db_tx| {
            let group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            let requester_name = group
                .member(user_id)
                .map(|m| m.name.clone())
                .unwrap_or_default();
            Ok(ParseContext {
                currency: group.currency,
                members: group.members().to_vec(),
                requester_name,
                replay: find_by_key(&group, idempotency_key)
                    .filter(|e| e.created_by == user_id)
                    .cloned(),
            })
        })
    }

    /// Awaits one parsing call, bounded by the configured timeout.
    async fn run_extraction(
        &self,
        call: ExtractFuture<'_>,
        currency: Currency,
    ) -> ResultEngine<ExpenseDraft> {
        let draft = match tokio::time::timeout(self.config.extract_timeout, call).await {
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.extract_timeout.as_secs(),
                    "expense parsing timed out"
                );
                return Err(EngineError::ExpenseCreationTimeout(
                    "the parsing service did not answer in time".to_string(),
                ));
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "expense parsing failed");
                return Err(EngineError::ExpenseCreationFailed(err.to_string()));
            }
            Ok(Ok(draft)) => draft,
        };
        if draft.amount.currency() != currency || !draft.amount.is_positive() {
            tracing::warn!(amount = %draft.amount, "parsing service returned an unusable amount");
            return Err(EngineError::ExpenseCreationFailed(
                "the parsing service returned an unusable amount".to_string(),
            ));
        }
        Ok(draft)
    }

    fn draft_to_cmd(
        &self,
        group_id: i64,
        user_id: UserId,
        draft: ExpenseDraft,
        context: &ParseContext,
        source: ExpenseSource,
        fallback_description: &str,
    ) -> ExpenseCmd {
        let payer = resolve_payer(&context.members, draft.payer_name.as_deref(), user_id);
        let description = normalize_optional_text(Some(&draft.description))
            .unwrap_or_else(|| fallback_description.to_string());
        let mut cmd = ExpenseCmd::new(group_id, user_id, draft.amount.minor(), description)
            .payer(payer)
            .source(source);
        cmd.category = draft.category;
        cmd
    }

    /// Creates an expense from free text such as `"90 dinner #food"`.
    ///
    /// The parsing service runs before the group is locked. Without a
    /// configured service the local quick-add parser is used and its errors
    /// are plain validation errors.
    pub async fn new_expense_from_text(
        &self,
        group_id: i64,
        text: &str,
        user_name: Option<&str>,
        idempotency_key: Option<&str>,
        user_id: UserId,
    ) -> ResultEngine<Expense> {
        let idempotency_key = normalize_idempotency_key(idempotency_key)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::Validation("text_input is empty".to_string()));
        }
        let context = self
            .parse_context(group_id, user_id, idempotency_key.as_deref())
            .await?;
        if let Some(existing) = context.replay {
            tracing::info!(group_id, expense_id = existing.id, "expense creation replayed");
            return Ok(existing);
        }

        let draft = match &self.extractor {
            Some(extractor) => {
                let input = TextInput {
                    text: text.to_string(),
                    user_name: normalize_optional_text(user_name)
                        .unwrap_or_else(|| context.requester_name.clone()),
                    currency: context.currency,
                    member_names: context.members.iter().map(|m| m.name.clone()).collect(),
                };
                self.run_extraction(extractor.parse_text(&input), context.currency)
                    .await?
            }
            None => parse_quick_add(text, context.currency)?,
        };

        let mut cmd = self.draft_to_cmd(group_id, user_id, draft, &context, ExpenseSource::Ai, text);
        cmd.idempotency_key = idempotency_key;
        self.new_expense(cmd).await
    }

    /// Creates an expense from a receipt image. Requires a parsing service.
    pub async fn new_expense_from_receipt(
        &self,
        group_id: i64,
        receipt: ReceiptUpload,
        user_id: UserId,
    ) -> ResultEngine<Expense> {
        if receipt.bytes.is_empty() {
            return Err(EngineError::Validation("receipt file is empty".to_string()));
        }
        let context = self.parse_context(group_id, user_id, None).await?;
        let Some(extractor) = &self.extractor else {
            return Err(EngineError::ExpenseCreationFailed(
                "receipt parsing is not configured".to_string(),
            ));
        };

        let caption = normalize_optional_text(receipt.caption.as_deref());
        let input = ReceiptInput {
            bytes: receipt.bytes,
            file_name: receipt.file_name,
            content_type: receipt.content_type,
            caption: caption.clone(),
            user_name: context.requester_name.clone(),
            currency: context.currency,
            member_names: context.members.iter().map(|m| m.name.clone()).collect(),
        };
        let draft = self
            .run_extraction(extractor.parse_receipt(&input), context.currency)
            .await?;

        let fallback = caption.unwrap_or_else(|| "Receipt".to_string());
        let cmd = self.draft_to_cmd(
            group_id,
            user_id,
            draft,
            &context,
            ExpenseSource::Receipt,
            &fallback,
        );
        self.new_expense(cmd).await
    }

    /// Group of an expense the user can see.
    async fn locate_expense(&self, expense_id: i64, user_id: UserId) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            let group_id = self.expense_group_id(&db_tx, expense_id).await?;
            self.require_membership(&db_tx, group_id, user_id)
                .await
                .map_err(|_| EngineError::KeyNotFound("expense not exists".to_string()))?;
            Ok(group_id)
        })
    }

    pub async fn expense(&self, expense_id: i64, user_id: UserId) -> ResultEngine<Expense> {
        let group_id = self.locate_expense(expense_id, user_id).await?;
        with_tx!(self, |db_tx| {
            let group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            group.expense(expense_id).cloned()
        })
    }

    /// Newest-first page of a group's expenses.
    pub async fn expenses(
        &self,
        group_id: i64,
        filter: ExpenseFilter,
        limit: Option<usize>,
        cursor: Option<&str>,
        user_id: UserId,
    ) -> ResultEngine<ExpensePage> {
        filter.validate()?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(EngineError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let cursor = cursor.map(decode_cursor).transpose()?;

        let group = with_tx!(self, |db_tx| {
            self.load_group_for_member(&db_tx, group_id, user_id).await
        })?;

        let mut listing = group.ledger().list_after(&filter, cursor);
        let items: Vec<Expense> = listing.by_ref().take(limit).cloned().collect();
        let next_cursor = match (items.last(), listing.next()) {
            (Some(last), Some(_)) => Some(encode_cursor(LedgerCursor::from(last))?),
            _ => None,
        };
        Ok(ExpensePage { items, next_cursor })
    }

    /// Loads the expense's group under its lock, applies `apply` and stores
    /// the changed expense.
    async fn update_expense<F>(
        &self,
        expense_id: i64,
        user_id: UserId,
        action: &'static str,
        apply: F,
    ) -> ResultEngine<Expense>
    where
        F: FnOnce(&mut Group) -> ResultEngine<Expense> + Send,
    {
        let group_id = self.locate_expense(expense_id, user_id).await?;
        let _guard = self.locks.acquire(group_id).await;
        let expense = with_tx!(self, |db_tx| {
            let mut group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            let mut expense = apply(&mut group)?;
            self.save_expense(&db_tx, &mut expense).await?;
            Ok(expense)
        })?;

        self.cache.invalidate(group_id);
        tracing::info!(
            group_id,
            expense_id,
            action,
            status = expense.status.as_str(),
            "expense updated"
        );
        Ok(expense)
    }

    /// Any member may dispute; a non-blank reason is required.
    pub async fn dispute_expense(
        &self,
        expense_id: i64,
        reason: &str,
        user_id: UserId,
    ) -> ResultEngine<Expense> {
        self.update_expense(expense_id, user_id, "dispute", |group| {
            group
                .dispute_expense(expense_id, reason, user_id, Utc::now())
                .cloned()
        })
        .await
    }

    /// Group-level status change. `APPROVED` and `REJECTED` are owner-only.
    pub async fn set_expense_status(
        &self,
        expense_id: i64,
        status: ExpenseStatus,
        reason: Option<&str>,
        user_id: UserId,
    ) -> ResultEngine<Expense> {
        self.update_expense(expense_id, user_id, "status", |group| {
            group
                .set_expense_status(expense_id, status, reason, user_id, Utc::now())
                .cloned()
        })
        .await
    }

    /// The requester's personal approval or rejection.
    pub async fn record_approval(
        &self,
        expense_id: i64,
        decision: ApprovalStatus,
        user_id: UserId,
    ) -> ResultEngine<Expense> {
        self.update_expense(expense_id, user_id, "approval", |group| {
            group
                .record_approval(expense_id, decision, user_id, Utc::now())
                .cloned()
        })
        .await
    }

    /// Deletes an expense. Payer or group owner only.
    pub async fn delete_expense(&self, expense_id: i64, user_id: UserId) -> ResultEngine<()> {
        let group_id = self.locate_expense(expense_id, user_id).await?;
        let _guard = self.locks.acquire(group_id).await;
        with_tx!(self, |db_tx| {
            let mut group = self
                .load_group_for_member(&db_tx, group_id, user_id)
                .await?;
            group.remove_expense(expense_id, user_id)?;
            participants::Entity::delete_many()
                .filter(participants::Column::ExpenseId.eq(expense_id))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(expense_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })?;

        self.cache.invalidate(group_id);
        tracing::info!(group_id, expense_id, "expense deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_survives_encoding_and_rejects_garbage() {
        let cursor = LedgerCursor {
            created_at: Utc::now(),
            id: 42,
        };
        let token = encode_cursor(cursor).unwrap();
        assert_eq!(decode_cursor(&token).unwrap(), cursor);
        assert!(matches!(
            decode_cursor("not a cursor"),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn payer_names_match_loosely_and_prefer_the_requester() {
        let members = vec![
            Member::new(1, "Asha"),
            Member::new(2, "Ravi  Kumar"),
            Member::new(3, "asha"),
        ];
        assert_eq!(resolve_payer(&members, Some("ravi kumar"), 1), 2);
        assert_eq!(resolve_payer(&members, Some("ASHA"), 3), 3);
        assert_eq!(resolve_payer(&members, Some("Asha"), 2), 1);
        assert_eq!(resolve_payer(&members, Some("nobody"), 2), 2);
        assert_eq!(resolve_payer(&members, None, 2), 2);
    }

    #[test]
    fn idempotency_keys_are_trimmed_and_bounded() {
        assert_eq!(normalize_idempotency_key(Some("  ")).unwrap(), None);
        assert_eq!(
            normalize_idempotency_key(Some(" k1 ")).unwrap().as_deref(),
            Some("k1")
        );
        let long = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(normalize_idempotency_key(Some(&long)).is_err());
    }
}
