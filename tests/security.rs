mod common;

use coral_wallet::error::WalletError;
use coral_wallet::ledger::Ledger;
use coral_wallet::models::{CurrencyKind, LimitPeriod, SecurityEvent, WalletStatus};
use coral_wallet::points::Points;
use coral_wallet::security::Security;
use coral_wallet::transfer::Donate;

#[tokio::test]
async fn verification_passes_through_without_a_password() {
    let pool = common::pool().await;
    assert!(Security::verify_payment_password(&pool, 1, "anything").await.unwrap());
    assert!(Security::logs(&pool, 1, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn password_round_trip_and_failed_attempt_audit() {
    let pool = common::pool().await;
    Security::set_payment_password(&pool, 1, "hunter2").await.unwrap();

    assert!(Security::verify_payment_password(&pool, 1, "hunter2").await.unwrap());
    assert!(!Security::verify_payment_password(&pool, 1, "wrong").await.unwrap());

    let logs = Security::logs(&pool, 1, 10, 0).await.unwrap();
    assert!(logs.iter().any(|l| l.event_type == SecurityEvent::PasswordFailed));
    assert!(logs.iter().any(|l| l.event_type == SecurityEvent::PasswordSet));
}

#[tokio::test]
async fn resetting_the_password_replaces_the_old_one() {
    let pool = common::pool().await;
    Security::set_payment_password(&pool, 1, "first").await.unwrap();
    Security::set_payment_password(&pool, 1, "second").await.unwrap();

    assert!(!Security::verify_payment_password(&pool, 1, "first").await.unwrap());
    assert!(Security::verify_payment_password(&pool, 1, "second").await.unwrap());
}

#[tokio::test]
async fn single_limit_applies_to_one_amount() {
    let pool = common::pool().await;
    Security::set_limits(&pool, 1, Some(100), None, None).await.unwrap();

    assert!(Security::check_transaction_limit(&pool, 1, 100, LimitPeriod::Single)
        .await
        .unwrap());
    assert!(!Security::check_transaction_limit(&pool, 1, 101, LimitPeriod::Single)
        .await
        .unwrap());

    let logs = Security::logs(&pool, 1, 10, 0).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].event_type, SecurityEvent::LimitExceeded);
}

#[tokio::test]
async fn daily_limit_counts_cash_already_spent() {
    let pool = common::pool().await;
    Security::set_limits(&pool, 1, None, Some(100), None).await.unwrap();
    Ledger::recharge(&pool, 1, CurrencyKind::Cash, 200, "").await.unwrap();
    Ledger::consume(&pool, 1, CurrencyKind::Cash, 60, "").await.unwrap();

    assert!(Security::check_transaction_limit(&pool, 1, 40, LimitPeriod::Daily)
        .await
        .unwrap());
    assert!(!Security::check_transaction_limit(&pool, 1, 41, LimitPeriod::Daily)
        .await
        .unwrap());
}

#[tokio::test]
async fn unconfigured_limits_always_pass() {
    let pool = common::pool().await;
    for period in [LimitPeriod::Single, LimitPeriod::Daily, LimitPeriod::Monthly] {
        assert!(Security::check_transaction_limit(&pool, 1, 1_000_000, period)
            .await
            .unwrap());
    }
}

#[tokio::test]
async fn suspended_wallet_rejects_mutations() {
    let pool = common::pool().await;
    Ledger::recharge(&pool, 1, CurrencyKind::Cash, 100, "").await.unwrap();
    Points::grant(&pool, 1, 10, "manual", &Default::default()).await.unwrap();
    Security::suspend(&pool, 1).await.unwrap();

    let err = Ledger::recharge(&pool, 1, CurrencyKind::Cash, 10, "").await.unwrap_err();
    assert!(matches!(err, WalletError::WalletSuspended));
    let err = Ledger::consume(&pool, 1, CurrencyKind::Cash, 10, "").await.unwrap_err();
    assert!(matches!(err, WalletError::WalletSuspended));
    let err = Donate::transfer(&pool, 1, 2, CurrencyKind::Cash, 10, "", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::WalletSuspended));
    let err = Points::use_points(&pool, 1, 5, "").await.unwrap_err();
    assert!(matches!(err, WalletError::WalletSuspended));

    let account = Ledger::get_account(&pool, 1, coral_wallet::models::LedgerKind::Cash)
        .await
        .unwrap();
    assert_eq!(account.amount, 100);
}

#[tokio::test]
async fn activate_restores_operations_and_audits_transitions() {
    let pool = common::pool().await;
    Security::suspend(&pool, 1).await.unwrap();
    // Repeated suspends are no-ops and are not re-audited.
    Security::suspend(&pool, 1).await.unwrap();
    let restored = Security::activate(&pool, 1).await.unwrap();
    assert_eq!(restored.status, WalletStatus::Active);

    Ledger::recharge(&pool, 1, CurrencyKind::Cash, 10, "").await.unwrap();

    let logs = Security::logs(&pool, 1, 10, 0).await.unwrap();
    let freezes = logs.iter().filter(|l| l.event_type == SecurityEvent::Freeze).count();
    let unfreezes = logs.iter().filter(|l| l.event_type == SecurityEvent::Unfreeze).count();
    assert_eq!(freezes, 1);
    assert_eq!(unfreezes, 1);
}

#[tokio::test]
async fn suspension_does_not_block_incoming_donations() {
    let pool = common::pool().await;
    Ledger::recharge(&pool, 2, CurrencyKind::Cash, 50, "").await.unwrap();
    Security::suspend(&pool, 1).await.unwrap();

    // The sender is the acting party; a frozen recipient can still receive.
    let outcome = Donate::transfer(&pool, 2, 1, CurrencyKind::Cash, 20, "", None)
        .await
        .unwrap();
    assert_eq!(outcome.to.amount, 20);
}
