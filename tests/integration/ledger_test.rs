/// Ledger invariants under sequential and concurrent use.
///
/// The core property: for any set of concurrent debits, the final balance
/// equals the starting balance minus the sum of the accepted debits, and no
/// accepted debit brings the balance below zero.
use crate::{ledger_config, setup_test_db};
use entity::sea_orm_active_enums::LedgerEntryType;
use opzen::error::ApiError;
use opzen::services::LedgerService;
use sea_orm::{entity::*, query::*};
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

#[tokio::test]
#[ignore] // Run only when database is available
async fn first_touch_provisions_account_with_signup_grant() {
    let db = setup_test_db().await;
    let service = LedgerService::new(db, &ledger_config(60));

    let user_id = Uuid::new_v4();
    let status = service
        .get_status(user_id, Some("new-user@example.com"))
        .await
        .expect("status should provision the account");

    assert_eq!(status.credits, 60);
    assert!(!status.is_expired);

    // Exactly one grant entry in the audit trail
    let entries = service.recent_entries(user_id, 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, LedgerEntryType::Grant);
    assert_eq!(entries[0].amount, 60);
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn debit_appends_log_and_decrements_balance() {
    let db = setup_test_db().await;
    let service = LedgerService::new(db, &ledger_config(100));

    let user_id = Uuid::new_v4();
    let log_id = service
        .debit(user_id, 30, "video generation")
        .await
        .expect("debit within balance should succeed");

    let status = service.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 70);

    let entries = service.recent_entries(user_id, 10).await.unwrap();
    let debit = entries
        .iter()
        .find(|e| e.id == log_id)
        .expect("debit entry should exist");
    assert_eq!(debit.entry_type, LedgerEntryType::Debit);
    assert_eq!(debit.amount, 30);
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn debit_beyond_balance_is_rejected_atomically() {
    let db = setup_test_db().await;
    let service = LedgerService::new(db.clone(), &ledger_config(20));

    let user_id = Uuid::new_v4();
    let result = service.debit(user_id, 50, "oversized request").await;

    match result {
        Err(ApiError::InsufficientCredits {
            required,
            available,
        }) => {
            assert_eq!(required, 50);
            assert_eq!(available, 20);
        }
        other => panic!("Expected InsufficientCredits, got {:?}", other.map(|_| ())),
    }

    // Balance untouched, no debit entry was written
    let status = service.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 20);

    let debit_entries = entity::usage_logs::Entity::find()
        .filter(entity::usage_logs::Column::UserId.eq(user_id))
        .filter(entity::usage_logs::Column::EntryType.eq(LedgerEntryType::Debit))
        .all(&db)
        .await
        .unwrap();
    assert!(debit_entries.is_empty());
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn compensating_credit_restores_balance() {
    let db = setup_test_db().await;
    let service = LedgerService::new(db, &ledger_config(100));

    let user_id = Uuid::new_v4();
    service.debit(user_id, 30, "job A").await.unwrap();

    let status = service.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 70);

    // Simulates the job-insert-failed compensation path
    service
        .credit(
            user_id,
            30,
            LedgerEntryType::Refund,
            "Refund: failed to create job A",
        )
        .await
        .unwrap();

    let status = service.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 100);
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn concurrent_debits_never_overdraw() {
    let db = setup_test_db().await;
    let service = Arc::new(LedgerService::new(db, &ledger_config(100)));

    let user_id = Uuid::new_v4();
    // Provision before the storm so every task races on the same row
    service.get_status(user_id, None).await.unwrap();

    // 10 concurrent debits of 30 against a balance of 100: exactly 3 can win
    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let service = service.clone();
        tasks.spawn(async move {
            let result = service.debit(user_id, 30, &format!("debit {}", i)).await;
            result.is_ok()
        });
    }

    let mut accepted = 0;
    while let Some(result) = tasks.join_next().await {
        if result.expect("task should not panic") {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 3, "Expected exactly 3 accepted debits");

    let status = service.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 100 - 30 * accepted);
    assert!(status.credits >= 0);
}
