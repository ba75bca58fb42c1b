mod common;

use engine::{
    ApprovalStatus, Currency, EngineError, ExpenseCmd, GroupCmd, GroupKind, GroupUpdate,
};

use common::{engine_with_db, trip, users};

#[tokio::test]
async fn new_group_has_owner_as_only_member_and_defaults() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;

    let detail = engine
        .new_group(GroupCmd::new(trio.alice.id, "  Flat 4B ", GroupKind::Long))
        .await
        .unwrap();
    let group = &detail.group;
    assert_eq!(group.name, "Flat 4B");
    assert_eq!(group.kind, GroupKind::Long);
    assert_eq!(group.owner_id, trio.alice.id);
    assert_eq!(group.member_limit, Some(32));
    assert_eq!(group.min_floor.minor(), 200_000);
    assert_eq!(group.currency, Currency::Inr);
    assert!(!group.invite_code.is_empty());
    assert_eq!(group.members().len(), 1);
    assert_eq!(detail.summary.member_count, 1);
    assert_eq!(detail.summary.total_transactions, 0);

    let err = engine
        .new_group(GroupCmd::new(trio.alice.id, "Euro trip", GroupKind::Short).currency("GBP"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn groups_lists_only_memberships() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let group_id = trip(&engine, &trio).await;
    engine
        .new_group(GroupCmd::new(trio.carol.id, "Solo", GroupKind::Short))
        .await
        .unwrap();

    let bob_groups = engine.groups(trio.bob.id).await.unwrap();
    assert_eq!(bob_groups.len(), 1);
    assert_eq!(bob_groups[0].group_id, group_id);
    assert_eq!(bob_groups[0].member_count, 3);
    assert_eq!(engine.groups(trio.carol.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn outsiders_get_not_found() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let detail = engine
        .new_group(GroupCmd::new(trio.alice.id, "Private", GroupKind::Short))
        .await
        .unwrap();
    let group_id = detail.group.id;

    let err = engine.group(group_id, trio.bob.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine.analysis(group_id, trio.bob.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine
        .new_expense(ExpenseCmd::new(group_id, trio.bob.id, 100, "Snacks"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn only_owner_updates_group() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let group_id = trip(&engine, &trio).await;

    let update = GroupUpdate {
        name: Some("Goa 2026".to_string()),
        min_floor_minor: Some(50_000),
    };
    let err = engine
        .update_group(group_id, update.clone(), trio.bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let detail = engine
        .update_group(group_id, update, trio.alice.id)
        .await
        .unwrap();
    assert_eq!(detail.group.name, "Goa 2026");
    assert_eq!(detail.group.min_floor.minor(), 50_000);

    let reloaded = engine.group(group_id, trio.carol.id).await.unwrap();
    assert_eq!(reloaded.group.name, "Goa 2026");
}

#[tokio::test]
async fn member_limit_rejects_extra_members() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let detail = engine
        .new_group(GroupCmd::new(trio.alice.id, "Pair", GroupKind::Short).member_limit(2))
        .await
        .unwrap();
    let group_id = detail.group.id;

    engine
        .add_member(group_id, trio.bob.id, trio.alice.id)
        .await
        .unwrap();
    let err = engine
        .add_member(group_id, trio.carol.id, trio.alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(
        engine.members(group_id, trio.alice.id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn concurrent_joins_respect_member_limit() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let detail = engine
        .new_group(GroupCmd::new(trio.alice.id, "Pair", GroupKind::Short).member_limit(2))
        .await
        .unwrap();
    let group_id = detail.group.id;
    let code = detail.group.invite_code.clone();

    let (bob, carol) = tokio::join!(
        engine.join_group(&code, trio.bob.id),
        engine.join_group(&code, trio.carol.id)
    );
    let outcomes = [bob.is_ok(), carol.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let failure = bob.err().or(carol.err()).unwrap();
    assert!(matches!(failure, EngineError::Conflict(_)));
    assert_eq!(
        engine.members(group_id, trio.alice.id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn join_with_unknown_code_is_not_found() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let err = engine.join_group("nope", trio.bob.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn owner_cannot_leave_and_leavers_drop_out_of_new_splits() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let group_id = trip(&engine, &trio).await;

    let err = engine
        .leave_group(group_id, trio.alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OwnerCannotLeave(_)));

    engine.leave_group(group_id, trio.carol.id).await.unwrap();
    let members = engine.members(group_id, trio.alice.id).await.unwrap();
    assert!(members.iter().all(|m| m.id != trio.carol.id));
    let err = engine.group(group_id, trio.carol.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let expense = engine
        .new_expense(ExpenseCmd::new(group_id, trio.alice.id, 1_000, "Breakfast"))
        .await
        .unwrap();
    assert_eq!(expense.participants.len(), 2);
    assert!(!expense.involves(trio.carol.id));
}

#[tokio::test]
async fn former_members_keep_their_balance() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let group_id = trip(&engine, &trio).await;

    engine
        .new_expense(ExpenseCmd::new(group_id, trio.alice.id, 9_000, "Dinner"))
        .await
        .unwrap();
    engine.leave_group(group_id, trio.carol.id).await.unwrap();

    let analysis = engine.analysis(group_id, trio.alice.id).await.unwrap();
    let carol = analysis.balance_of(trio.carol.id).unwrap();
    assert!(!carol.is_member);
    assert_eq!(carol.net.minor(), -3_000);
    assert_eq!(carol.member.name, "Carol");
    let sum: i64 = analysis.members.iter().map(|m| m.balance.net.minor()).sum();
    assert_eq!(sum, 0);
}

#[tokio::test]
async fn transfer_ownership_lets_former_owner_leave() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let group_id = trip(&engine, &trio).await;

    let err = engine
        .transfer_ownership(group_id, trio.carol.id, trio.bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let detail = engine
        .transfer_ownership(group_id, trio.bob.id, trio.alice.id)
        .await
        .unwrap();
    assert_eq!(detail.group.owner_id, trio.bob.id);
    engine.leave_group(group_id, trio.alice.id).await.unwrap();

    let err = engine
        .remove_member(group_id, trio.bob.id, trio.bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OwnerCannotLeave(_)));
    let members = engine
        .remove_member(group_id, trio.carol.id, trio.bob.id)
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn deleting_a_group_removes_its_expenses() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let group_id = trip(&engine, &trio).await;
    let expense = engine
        .new_expense(ExpenseCmd::new(group_id, trio.bob.id, 4_500, "Cab"))
        .await
        .unwrap();

    let err = engine
        .delete_group(group_id, trio.bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    engine.delete_group(group_id, trio.alice.id).await.unwrap();
    let err = engine.group(group_id, trio.alice.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine
        .expense(expense.id, trio.alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    assert!(engine.groups(trio.bob.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn archived_groups_are_read_only_except_leave() {
    let engine = engine_with_db().await;
    let trio = users(&engine).await;
    let group_id = trip(&engine, &trio).await;
    let expense = engine
        .new_expense(ExpenseCmd::new(group_id, trio.alice.id, 9000, "Dinner"))
        .await
        .unwrap();

    let detail = engine.archive_group(group_id, trio.alice.id).await.unwrap();
    assert!(detail.group.is_archived());
    let err = engine
        .new_expense(ExpenseCmd::new(group_id, trio.bob.id, 100, "Late chai"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let err = engine
        .archive_group(group_id, trio.alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    let err = engine
        .remove_member(group_id, trio.bob.id, trio.alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let err = engine
        .transfer_ownership(group_id, trio.bob.id, trio.alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let update = GroupUpdate {
        name: Some("Goa 2027".to_string()),
        min_floor_minor: None,
    };
    let err = engine
        .update_group(group_id, update, trio.alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let err = engine
        .dispute_expense(expense.id, "wrong amount", trio.bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let err = engine
        .record_approval(expense.id, ApprovalStatus::Approved, trio.carol.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let err = engine
        .delete_expense(expense.id, trio.alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    let detail = engine.group(group_id, trio.bob.id).await.unwrap();
    assert_eq!(detail.group.members().len(), 3);
    assert_eq!(detail.summary.total_transactions, 1);

    engine.leave_group(group_id, trio.carol.id).await.unwrap();
    let members = engine.members(group_id, trio.alice.id).await.unwrap();
    assert_eq!(members.len(), 2);
}
