mod common;

use coral_wallet::error::WalletError;
use coral_wallet::ledger::Ledger;
use coral_wallet::models::{CurrencyKind, LedgerKind};
use coral_wallet::transfer::Donate;

#[tokio::test]
async fn account_is_created_lazily_with_zero_balance() {
    let pool = common::pool().await;

    let account = Ledger::get_account(&pool, 1, LedgerKind::Cash).await.unwrap();
    assert_eq!(account.amount, 0);
    assert_eq!(account.frozen_amount, 0);

    // Idempotent: a second read returns the same row.
    let again = Ledger::get_account(&pool, 1, LedgerKind::Cash).await.unwrap();
    assert_eq!(again.created_at, account.created_at);
}

#[tokio::test]
async fn recharge_consume_transfer_scenario() {
    let pool = common::pool().await;

    let account = Ledger::recharge(&pool, 1, CurrencyKind::Cash, 100, "top-up")
        .await
        .unwrap();
    assert_eq!(account.amount, 100);
    assert_eq!(common::log_sum(&pool, 1, "cash").await, 100);

    let account = Ledger::consume(&pool, 1, CurrencyKind::Cash, 30, "sticker pack")
        .await
        .unwrap();
    assert_eq!(account.amount, 70);
    assert_eq!(common::log_sum(&pool, 1, "cash").await, 70);

    let outcome = Donate::transfer(&pool, 1, 2, CurrencyKind::Cash, 50, "tip", None)
        .await
        .unwrap();
    assert_eq!(outcome.from.amount, 20);
    assert_eq!(outcome.to.amount, 50);

    let err = Ledger::consume(&pool, 1, CurrencyKind::Cash, 999, "too much")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds));
    let account = Ledger::get_account(&pool, 1, LedgerKind::Cash).await.unwrap();
    assert_eq!(account.amount, 20);
}

#[tokio::test]
async fn failed_consume_leaves_log_untouched() {
    let pool = common::pool().await;
    Ledger::recharge(&pool, 7, CurrencyKind::Cash, 10, "").await.unwrap();
    let before = common::record_count(&pool, 7).await;

    let err = Ledger::consume(&pool, 7, CurrencyKind::Cash, 11, "").await.unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds));

    assert_eq!(common::record_count(&pool, 7).await, before);
    let account = Ledger::get_account(&pool, 7, LedgerKind::Cash).await.unwrap();
    assert_eq!(account.amount, 10);
}

#[tokio::test]
async fn balance_never_goes_negative() {
    let pool = common::pool().await;
    Ledger::recharge(&pool, 3, CurrencyKind::Cash, 25, "").await.unwrap();

    for spend in [10, 10, 10, 10] {
        let _ = Ledger::consume(&pool, 3, CurrencyKind::Cash, spend, "").await;
        let account = Ledger::get_account(&pool, 3, LedgerKind::Cash).await.unwrap();
        assert!(account.amount >= 0);
    }
    let account = Ledger::get_account(&pool, 3, LedgerKind::Cash).await.unwrap();
    assert_eq!(account.amount, 5);
}

#[tokio::test]
async fn log_matches_balance_after_mixed_operations() {
    let pool = common::pool().await;
    Ledger::recharge(&pool, 4, CurrencyKind::Cash, 500, "").await.unwrap();
    Ledger::consume(&pool, 4, CurrencyKind::Cash, 120, "").await.unwrap();
    Donate::transfer(&pool, 4, 5, CurrencyKind::Cash, 80, "", None).await.unwrap();
    Ledger::recharge(&pool, 4, CurrencyKind::Cash, 40, "").await.unwrap();

    let account = Ledger::get_account(&pool, 4, LedgerKind::Cash).await.unwrap();
    assert_eq!(common::log_sum(&pool, 4, "cash").await, account.amount);
    let peer = Ledger::get_account(&pool, 5, LedgerKind::Cash).await.unwrap();
    assert_eq!(common::log_sum(&pool, 5, "cash").await, peer.amount);
}

#[tokio::test]
async fn coin_recharge_applies_exchange_rate() {
    let pool = common::pool().await;

    let account = Ledger::recharge_coins(&pool, 9, 10, "coin pack").await.unwrap();
    assert_eq!(account.kind, LedgerKind::Coin);
    assert_eq!(account.amount, 100);

    let history = Ledger::list_history(&pool, 9, Some(LedgerKind::Coin), 10, 0)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, 100);
    assert_eq!(history[0].rmb_equivalent, Some(10));
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let pool = common::pool().await;

    for amount in [0, -5] {
        let err = Ledger::recharge(&pool, 1, CurrencyKind::Cash, amount, "").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        let err = Ledger::consume(&pool, 1, CurrencyKind::Cash, amount, "").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }
    assert_eq!(common::record_count(&pool, 1).await, 0);
}

#[tokio::test]
async fn has_enough_respects_balance() {
    let pool = common::pool().await;
    Ledger::recharge(&pool, 6, CurrencyKind::Cash, 50, "").await.unwrap();

    assert!(Ledger::has_enough(&pool, 6, LedgerKind::Cash, 50).await.unwrap());
    assert!(!Ledger::has_enough(&pool, 6, LedgerKind::Cash, 51).await.unwrap());
}

#[tokio::test]
async fn frozen_funds_are_not_spendable() {
    let pool = common::pool().await;
    Ledger::recharge(&pool, 8, CurrencyKind::Cash, 100, "").await.unwrap();
    sqlx::query("UPDATE accounts SET frozen_amount = 60 WHERE user_id = 8 AND kind = 'cash'")
        .execute(&pool)
        .await
        .unwrap();

    assert!(!Ledger::has_enough(&pool, 8, LedgerKind::Cash, 50).await.unwrap());
    let err = Ledger::consume(&pool, 8, CurrencyKind::Cash, 50, "").await.unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds));
    Ledger::consume(&pool, 8, CurrencyKind::Cash, 40, "").await.unwrap();
}

#[tokio::test]
async fn history_is_newest_first_and_paginated() {
    let pool = common::pool().await;
    for i in 1..=5 {
        Ledger::recharge(&pool, 10, CurrencyKind::Cash, i * 10, "").await.unwrap();
    }

    let page = Ledger::list_history(&pool, 10, None, 2, 0).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].amount, 50);
    assert_eq!(page[1].amount, 40);

    let next = Ledger::list_history(&pool, 10, None, 2, 2).await.unwrap();
    assert_eq!(next[0].amount, 30);
}

#[tokio::test]
async fn leaderboard_ranks_by_balance() {
    let pool = common::pool().await;
    Ledger::recharge(&pool, 1, CurrencyKind::Cash, 10, "").await.unwrap();
    Ledger::recharge(&pool, 2, CurrencyKind::Cash, 300, "").await.unwrap();
    Ledger::recharge(&pool, 3, CurrencyKind::Cash, 70, "").await.unwrap();
    Ledger::recharge_coins(&pool, 4, 100, "").await.unwrap();

    let top = Ledger::leaderboard(&pool, LedgerKind::Cash, 2).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].user_id, 2);
    assert_eq!(top[1].user_id, 3);
}

#[tokio::test]
async fn stats_aggregate_per_type() {
    let pool = common::pool().await;
    Ledger::recharge(&pool, 11, CurrencyKind::Cash, 200, "").await.unwrap();
    Ledger::consume(&pool, 11, CurrencyKind::Cash, 50, "").await.unwrap();
    Donate::transfer(&pool, 11, 12, CurrencyKind::Cash, 30, "", None).await.unwrap();
    Donate::transfer(&pool, 12, 11, CurrencyKind::Cash, 5, "", None).await.unwrap();

    let stats = Ledger::stats(&pool, 11, LedgerKind::Cash).await.unwrap();
    assert_eq!(stats.total_recharged, 200);
    assert_eq!(stats.total_consumed, 50);
    assert_eq!(stats.total_tips_sent, 30);
    assert_eq!(stats.total_tips_received, 5);
}
