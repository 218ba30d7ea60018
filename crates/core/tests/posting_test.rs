//! End-to-end posting scenarios over the in-memory store.

use chrono::{NaiveDate, Utc};
use postbook_core::posting::{
    AccountCategory, ClosingService, DetailAccount, FaultPoint, GeneralAccount, LedgerEntry,
    LedgerType, MemoryStore, PostingError, PostingStatus, RejectionReason, StoreError,
};
use postbook_shared::config::PostingConfig;
use postbook_shared::types::{DetailAccountId, GeneralAccountId, LedgerEntryId, Money, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn money(d: Decimal) -> Money {
    Money::new(d).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn general(number: &str, category: AccountCategory) -> GeneralAccount {
    GeneralAccount {
        id: GeneralAccountId::new(),
        account_number: number.to_string(),
        account_name: format!("General {number}"),
        category,
        report_type: category.report_type(),
        natural_side: category.natural_side(),
        balance_debit: Money::ZERO,
        balance_credit: Money::ZERO,
        deleted_at: None,
    }
}

fn detail(number: &str, parent: &str, category: AccountCategory) -> DetailAccount {
    DetailAccount {
        id: DetailAccountId::new(),
        account_number: number.to_string(),
        account_name: format!("Detail {number}"),
        general_account_number: parent.to_string(),
        category,
        report_type: category.report_type(),
        natural_side: category.natural_side(),
        balance_debit: Money::ZERO,
        balance_credit: Money::ZERO,
        deleted_at: None,
    }
}

fn entry(
    account: DetailAccountId,
    transaction_type: &str,
    amount: Decimal,
    ledger_date: NaiveDate,
) -> LedgerEntry {
    LedgerEntry {
        id: LedgerEntryId::new(),
        reference_number: Some("TRX-001".to_string()),
        amount,
        description: "Scenario entry".to_string(),
        transaction_type: transaction_type.to_string(),
        ledger_type: LedgerType::CashIn,
        ledger_date,
        posting_status: PostingStatus::Pending,
        detail_account_id: account,
        posted_at: None,
        posted_by: None,
        deleted_at: None,
    }
}

fn service(store: &MemoryStore) -> ClosingService<MemoryStore> {
    ClosingService::new(
        store.clone(),
        PostingConfig {
            max_retry_attempts: 3,
            retry_backoff_ms: 1,
        },
    )
}

/// Seeds one revenue detail account "4001" under general "4000".
fn seed_revenue_account(store: &MemoryStore) -> DetailAccount {
    let g = general("4000", AccountCategory::Revenue);
    let d = detail("4001", "4000", AccountCategory::Revenue);
    store.insert_general(g);
    store.insert_detail(d.clone());
    d
}

#[tokio::test]
async fn test_close_posts_entries_and_updates_balances() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    let e = entry(account.id, "DEBIT", dec!(500.00), date(2025, 1, 15));
    store.insert_entry(e.clone());

    let outcome = service(&store)
        .post_period(date(2025, 1, 15), UserId::new())
        .await
        .unwrap();

    assert_eq!(outcome.posted_count, 1);
    assert_eq!(outcome.total_debit, money(dec!(500.00)));
    assert_eq!(outcome.total_credit, Money::ZERO);

    assert_eq!(store.entry_status(e.id), Some(PostingStatus::Posted));
    assert_eq!(
        store.detail_balances(account.id),
        Some((money(dec!(500.00)), Money::ZERO))
    );
    assert_eq!(
        store.general_balances("4000"),
        Some((money(dec!(500.00)), Money::ZERO))
    );

    let batch = store.batch_for(date(2025, 1, 15)).unwrap();
    assert_eq!(batch.entry_count, 1);
    assert_eq!(batch.total_debit, money(dec!(500.00)));
    assert_eq!(batch.total_credit, Money::ZERO);
}

#[tokio::test]
async fn test_second_close_for_same_date_rejected() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    store.insert_entry(entry(account.id, "CREDIT", dec!(250.00), date(2025, 1, 15)));

    let svc = service(&store);
    let actor = UserId::new();
    svc.post_period(date(2025, 1, 15), actor).await.unwrap();
    let balances_after_first = store.detail_balances(account.id);

    let err = svc.post_period(date(2025, 1, 15), actor).await.unwrap_err();
    assert!(matches!(
        err,
        PostingError::AlreadyPostedForDate(d) if d == date(2025, 1, 15)
    ));
    assert_eq!(store.detail_balances(account.id), balances_after_first);
}

#[tokio::test]
async fn test_close_with_nothing_pending_rejected() {
    let store = MemoryStore::new();
    seed_revenue_account(&store);

    let err = service(&store)
        .post_period(date(2025, 1, 31), UserId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::NoPendingEntries(_)));
}

#[tokio::test]
async fn test_reopen_restores_balances_and_statuses() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    let e1 = entry(account.id, "DEBIT", dec!(100.00), date(2025, 1, 15));
    let e2 = entry(account.id, "KREDIT", dec!(40.00), date(2025, 1, 15));
    store.insert_entry(e1.clone());
    store.insert_entry(e2.clone());

    let svc = service(&store);
    let actor = UserId::new();
    svc.post_period(date(2025, 1, 15), actor).await.unwrap();

    let outcome = svc.reopen_period(date(2025, 1, 15), actor).await.unwrap();
    assert_eq!(outcome.unposted_count, 2);
    assert_eq!(outcome.total_debit, money(dec!(100.00)));
    assert_eq!(outcome.total_credit, money(dec!(40.00)));

    assert_eq!(store.entry_status(e1.id), Some(PostingStatus::Pending));
    assert_eq!(store.entry_status(e2.id), Some(PostingStatus::Pending));
    assert_eq!(
        store.detail_balances(account.id),
        Some((Money::ZERO, Money::ZERO))
    );
    assert_eq!(
        store.general_balances("4000"),
        Some((Money::ZERO, Money::ZERO))
    );
    assert!(store.batch_for(date(2025, 1, 15)).is_none());
}

#[tokio::test]
async fn test_reopen_unclosed_date_rejected() {
    let store = MemoryStore::new();
    seed_revenue_account(&store);

    let err = service(&store)
        .reopen_period(date(2025, 1, 15), UserId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::NothingToUnpost(_)));
}

#[tokio::test]
async fn test_any_rejection_aborts_the_whole_close() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    let good = entry(account.id, "DEBIT", dec!(100.00), date(2025, 1, 15));
    let bad = entry(account.id, "DEBIT", dec!(0), date(2025, 1, 15));
    store.insert_entry(good.clone());
    store.insert_entry(bad.clone());

    let err = service(&store)
        .post_period(date(2025, 1, 15), UserId::new())
        .await
        .unwrap_err();

    let PostingError::ValidationFailed(rejected) = err else {
        panic!("expected ValidationFailed, got {err:?}");
    };
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].id, bad.id);
    assert_eq!(rejected[0].reason, RejectionReason::InvalidAmount);

    // Nothing moved, including the valid entry.
    assert_eq!(store.entry_status(good.id), Some(PostingStatus::Pending));
    assert_eq!(
        store.detail_balances(account.id),
        Some((Money::ZERO, Money::ZERO))
    );
    assert!(store.batch_for(date(2025, 1, 15)).is_none());
}

#[tokio::test]
async fn test_soft_deleted_account_rejects_close() {
    let store = MemoryStore::new();
    store.insert_general(general("4000", AccountCategory::Revenue));
    let mut d = detail("4001", "4000", AccountCategory::Revenue);
    d.deleted_at = Some(Utc::now());
    store.insert_detail(d.clone());
    store.insert_entry(entry(d.id, "DEBIT", dec!(500.00), date(2025, 1, 15)));

    let err = service(&store)
        .post_period(date(2025, 1, 15), UserId::new())
        .await
        .unwrap_err();

    let PostingError::ValidationFailed(rejected) = err else {
        panic!("expected ValidationFailed, got {err:?}");
    };
    assert_eq!(rejected[0].reason, RejectionReason::AccountNotFound);
}

#[tokio::test]
async fn test_multi_date_close_records_one_batch_per_date() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    store.insert_entry(entry(account.id, "DEBIT", dec!(10.00), date(2025, 1, 10)));
    store.insert_entry(entry(account.id, "CREDIT", dec!(20.00), date(2025, 1, 15)));

    let outcome = service(&store)
        .post_period(date(2025, 1, 31), UserId::new())
        .await
        .unwrap();

    assert_eq!(outcome.posted_count, 2);
    assert_eq!(outcome.total_debit, money(dec!(10.00)));
    assert_eq!(outcome.total_credit, money(dec!(20.00)));
    assert_eq!(outcome.batch_date, date(2025, 1, 31));

    let jan10 = store.batch_for(date(2025, 1, 10)).unwrap();
    assert_eq!(jan10.entry_count, 1);
    assert_eq!(jan10.total_debit, money(dec!(10.00)));
    let jan15 = store.batch_for(date(2025, 1, 15)).unwrap();
    assert_eq!(jan15.total_credit, money(dec!(20.00)));
    assert!(store.batch_for(date(2025, 1, 31)).is_none());
}

#[tokio::test]
async fn test_entries_after_cutoff_stay_pending() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    let inside = entry(account.id, "DEBIT", dec!(10.00), date(2025, 1, 15));
    let outside = entry(account.id, "DEBIT", dec!(99.00), date(2025, 2, 1));
    store.insert_entry(inside.clone());
    store.insert_entry(outside.clone());

    let outcome = service(&store)
        .post_period(date(2025, 1, 31), UserId::new())
        .await
        .unwrap();

    assert_eq!(outcome.posted_count, 1);
    assert_eq!(store.entry_status(inside.id), Some(PostingStatus::Posted));
    assert_eq!(store.entry_status(outside.id), Some(PostingStatus::Pending));
    assert_eq!(
        store.detail_balances(account.id),
        Some((money(dec!(10.00)), Money::ZERO))
    );
}

#[tokio::test]
async fn test_storage_failure_mid_apply_rolls_back_everything() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    let e = entry(account.id, "DEBIT", dec!(500.00), date(2025, 1, 15));
    store.insert_entry(e.clone());

    store.inject_fault(
        FaultPoint::ApplyDeltas,
        StoreError::Backend("disk on fire".into()),
    );

    let err = service(&store)
        .post_period(date(2025, 1, 15), UserId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::PostingFailed(_)));
    assert!(!err.is_retryable());

    assert_eq!(store.entry_status(e.id), Some(PostingStatus::Pending));
    assert_eq!(
        store.detail_balances(account.id),
        Some((Money::ZERO, Money::ZERO))
    );
    assert!(store.batch_for(date(2025, 1, 15)).is_none());
}

#[tokio::test]
async fn test_transient_commit_failure_is_retried_to_success() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    store.insert_entry(entry(account.id, "DEBIT", dec!(500.00), date(2025, 1, 15)));

    store.inject_fault(
        FaultPoint::Commit,
        StoreError::Transient("connection reset".into()),
    );

    let outcome = service(&store)
        .post_period(date(2025, 1, 15), UserId::new())
        .await
        .unwrap();
    assert_eq!(outcome.posted_count, 1);
    assert_eq!(
        store.detail_balances(account.id),
        Some((money(dec!(500.00)), Money::ZERO))
    );
}

#[tokio::test]
async fn test_transient_failures_exhaust_retry_budget() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    store.insert_entry(entry(account.id, "DEBIT", dec!(500.00), date(2025, 1, 15)));

    for _ in 0..3 {
        store.inject_fault(
            FaultPoint::Commit,
            StoreError::Transient("connection reset".into()),
        );
    }

    let err = service(&store)
        .post_period(date(2025, 1, 15), UserId::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PostingError::PostingFailed(StoreError::Transient(_))
    ));
    assert_eq!(
        store.detail_balances(account.id),
        Some((Money::ZERO, Money::ZERO))
    );
}

#[tokio::test]
async fn test_concurrent_closes_for_one_date_have_one_winner() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    store.insert_entry(entry(account.id, "DEBIT", dec!(500.00), date(2025, 1, 15)));

    let first = service(&store);
    let second = service(&store);
    let actor = UserId::new();
    let (a, b) = tokio::join!(
        first.post_period(date(2025, 1, 15), actor),
        second.post_period(date(2025, 1, 15), actor),
    );

    let (winner, loser) = match (a, b) {
        (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert_eq!(winner.posted_count, 1);
    assert!(matches!(
        loser,
        PostingError::AlreadyPostedForDate(_) | PostingError::Conflict(_)
    ));

    // The winning close applied exactly once.
    assert_eq!(
        store.detail_balances(account.id),
        Some((money(dec!(500.00)), Money::ZERO))
    );
}

#[tokio::test]
async fn test_validate_batch_dry_run_changes_nothing() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    let good = entry(account.id, "DEBET", dec!(500.00), date(2025, 1, 15));
    store.insert_entry(good.clone());
    let unknown = LedgerEntryId::new();

    let outcome = service(&store)
        .validate_batch(&[good.id, unknown], date(2025, 1, 31))
        .await
        .unwrap();

    assert_eq!(outcome.accepted.len(), 1);
    assert_eq!(outcome.accepted[0].id, good.id);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].id, unknown);
    assert_eq!(outcome.rejected[0].reason, RejectionReason::EntryNotFound);

    assert_eq!(store.entry_status(good.id), Some(PostingStatus::Pending));
    assert_eq!(
        store.detail_balances(account.id),
        Some((Money::ZERO, Money::ZERO))
    );
}

#[tokio::test]
async fn test_post_reopen_post_round_trip() {
    let store = MemoryStore::new();
    let account = seed_revenue_account(&store);
    let e = entry(account.id, "CREDIT", dec!(75.50), date(2025, 1, 15));
    store.insert_entry(e.clone());

    let svc = service(&store);
    let actor = UserId::new();
    svc.post_period(date(2025, 1, 15), actor).await.unwrap();
    svc.reopen_period(date(2025, 1, 15), actor).await.unwrap();
    let outcome = svc.post_period(date(2025, 1, 15), actor).await.unwrap();

    assert_eq!(outcome.posted_count, 1);
    assert_eq!(
        store.detail_balances(account.id),
        Some((Money::ZERO, money(dec!(75.50))))
    );
    assert_eq!(store.entry_status(e.id), Some(PostingStatus::Posted));
}
