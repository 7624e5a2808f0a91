// Ledger service: recharge / consume / history over the spendable kinds.
//
// Each public operation is one database transaction pairing the account
// mutation with its log append; a failure rolls both back.

use tracing::info;

use crate::database::DbPool;
use crate::error::{Result, WalletError};
use crate::models::{
    coins_from_rmb, Account, CurrencyKind, LedgerKind, TransactionRecord, TxnType, WalletStats,
};
use crate::store::{self, NewRecord};

pub struct Ledger;

impl Ledger {
    /// Current account row, created with a zero balance on first access.
    pub async fn get_account(pool: &DbPool, user_id: i64, kind: LedgerKind) -> Result<Account> {
        let mut conn = pool.acquire().await?;
        store::get_or_create_account(&mut conn, user_id, kind).await
    }

    /// Credits the account and appends a `recharge` entry.
    pub async fn recharge(
        pool: &DbPool,
        user_id: i64,
        kind: CurrencyKind,
        amount: i64,
        description: &str,
    ) -> Result<Account> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let kind = LedgerKind::from(kind);

        let mut tx = pool.begin().await?;
        store::ensure_active(&mut tx, user_id).await?;
        let account = store::increment(&mut tx, user_id, kind, amount).await?;
        let mut record = NewRecord::new(user_id, kind, TxnType::Recharge, amount);
        record.description = Some(description.to_string());
        store::append_record(&mut tx, record).await?;
        tx.commit().await?;

        info!(user_id, kind = kind.as_str(), amount, "recharge committed");
        Ok(account)
    }

    /// Coin recharge priced in RMB: credits `rmb * 10` coins and records
    /// the RMB equivalent on the log entry.
    pub async fn recharge_coins(
        pool: &DbPool,
        user_id: i64,
        rmb_amount: i64,
        description: &str,
    ) -> Result<Account> {
        if rmb_amount <= 0 {
            return Err(WalletError::InvalidAmount(rmb_amount));
        }
        let coins = coins_from_rmb(rmb_amount);

        let mut tx = pool.begin().await?;
        store::ensure_active(&mut tx, user_id).await?;
        let account = store::increment(&mut tx, user_id, LedgerKind::Coin, coins).await?;
        let mut record = NewRecord::new(user_id, LedgerKind::Coin, TxnType::Recharge, coins);
        record.rmb_equivalent = Some(rmb_amount);
        record.description = Some(description.to_string());
        store::append_record(&mut tx, record).await?;
        tx.commit().await?;

        info!(user_id, coins, rmb_amount, "coin recharge committed");
        Ok(account)
    }

    /// Debits the account and appends a `consume` entry. Fails with
    /// `InsufficientFunds` before any write becomes visible.
    pub async fn consume(
        pool: &DbPool,
        user_id: i64,
        kind: CurrencyKind,
        amount: i64,
        description: &str,
    ) -> Result<Account> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let kind = LedgerKind::from(kind);

        let mut tx = pool.begin().await?;
        store::ensure_active(&mut tx, user_id).await?;
        let account = store::decrement(&mut tx, user_id, kind, amount).await?;
        let mut record = NewRecord::new(user_id, kind, TxnType::Consume, -amount);
        record.description = Some(description.to_string());
        store::append_record(&mut tx, record).await?;
        tx.commit().await?;

        info!(user_id, kind = kind.as_str(), amount, "consume committed");
        Ok(account)
    }

    /// Read-only pre-check against the spendable balance. This is advisory:
    /// the authoritative check happens inside `decrement` itself.
    pub async fn has_enough(
        pool: &DbPool,
        user_id: i64,
        kind: LedgerKind,
        amount: i64,
    ) -> Result<bool> {
        let mut conn = pool.acquire().await?;
        let account = store::get_or_create_account(&mut conn, user_id, kind).await?;
        Ok(account.spendable() >= amount)
    }

    /// Log entries for a user, newest first, optionally filtered by kind.
    pub async fn list_history(
        pool: &DbPool,
        user_id: i64,
        kind: Option<LedgerKind>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TransactionRecord>> {
        let records = match kind {
            Some(kind) => {
                sqlx::query_as::<_, TransactionRecord>(
                    r#"
                    SELECT * FROM transactions
                    WHERE user_id = ? AND kind = ?
                    ORDER BY created_at DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(user_id)
                .bind(kind)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, TransactionRecord>(
                    r#"
                    SELECT * FROM transactions
                    WHERE user_id = ?
                    ORDER BY created_at DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
            }
        };

        Ok(records)
    }

    /// Top balances for one ledger kind.
    pub async fn leaderboard(pool: &DbPool, kind: LedgerKind, limit: i64) -> Result<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE kind = ?
            ORDER BY amount DESC, user_id ASC
            LIMIT ?
            "#,
        )
        .bind(kind)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(accounts)
    }

    /// Totals per transaction type for one user and kind.
    pub async fn stats(pool: &DbPool, user_id: i64, kind: LedgerKind) -> Result<WalletStats> {
        let mut stats = WalletStats {
            user_id,
            kind,
            total_recharged: 0,
            total_consumed: 0,
            total_tips_sent: 0,
            total_tips_received: 0,
        };

        let rows = sqlx::query_as::<_, (TxnType, i64)>(
            r#"
            SELECT txn_type, COALESCE(SUM(ABS(amount)), 0)
            FROM transactions
            WHERE user_id = ? AND kind = ?
            GROUP BY txn_type
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .fetch_all(pool)
        .await?;

        for (txn_type, total) in rows {
            match txn_type {
                TxnType::Recharge => stats.total_recharged = total,
                TxnType::Consume => stats.total_consumed = total,
                TxnType::TipSent => stats.total_tips_sent = total,
                TxnType::TipReceived => stats.total_tips_received = total,
                TxnType::Reward | TxnType::Reconciliation => {}
            }
        }

        Ok(stats)
    }
}
