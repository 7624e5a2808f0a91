// Account store and append-only transaction log.
//
// Every function here runs against a caller-supplied connection so that a
// service can compose account mutations and log appends inside one
// transaction: either everything commits or nothing does.

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::{Result, WalletError};
use crate::models::{Account, LedgerKind, TransactionRecord, TxnType, WalletStatus};

/// Insert payload for one transaction log entry.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub user_id: i64,
    pub kind: LedgerKind,
    pub txn_type: TxnType,
    pub amount: i64,
    pub counterparty_id: Option<i64>,
    pub rmb_equivalent: Option<i64>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewRecord {
    pub fn new(user_id: i64, kind: LedgerKind, txn_type: TxnType, amount: i64) -> Self {
        NewRecord {
            user_id,
            kind,
            txn_type,
            amount,
            counterparty_id: None,
            rmb_equivalent: None,
            description: None,
            metadata: None,
        }
    }
}

/// Returns the account row, creating it with a zero balance on first access.
pub async fn get_or_create_account(
    conn: &mut SqliteConnection,
    user_id: i64,
    kind: LedgerKind,
) -> Result<Account> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO accounts (user_id, kind, amount, frozen_amount, created_at, updated_at)
        VALUES (?, ?, 0, 0, ?, ?)
        ON CONFLICT (user_id, kind) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    fetch_account(conn, user_id, kind).await
}

pub async fn fetch_account(
    conn: &mut SqliteConnection,
    user_id: i64,
    kind: LedgerKind,
) -> Result<Account> {
    let account = sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE user_id = ? AND kind = ?",
    )
    .bind(user_id)
    .bind(kind)
    .fetch_one(&mut *conn)
    .await?;

    Ok(account)
}

/// Credits the account. No upper bound; creates the account if missing.
pub async fn increment(
    conn: &mut SqliteConnection,
    user_id: i64,
    kind: LedgerKind,
    amount: i64,
) -> Result<Account> {
    get_or_create_account(&mut *conn, user_id, kind).await?;

    sqlx::query(
        "UPDATE accounts SET amount = amount + ?, updated_at = ? WHERE user_id = ? AND kind = ?",
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id)
    .bind(kind)
    .execute(&mut *conn)
    .await?;

    fetch_account(conn, user_id, kind).await
}

/// Debits the account. The balance check and the write are a single
/// conditional UPDATE, so two racing decrements can never both pass a
/// stale check: the second one simply matches no row.
pub async fn decrement(
    conn: &mut SqliteConnection,
    user_id: i64,
    kind: LedgerKind,
    amount: i64,
) -> Result<Account> {
    get_or_create_account(&mut *conn, user_id, kind).await?;

    let result = sqlx::query(
        r#"
        UPDATE accounts SET amount = amount - ?, updated_at = ?
        WHERE user_id = ? AND kind = ? AND amount - frozen_amount >= ?
        "#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id)
    .bind(kind)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(WalletError::InsufficientFunds);
    }

    fetch_account(conn, user_id, kind).await
}

/// Appends one immutable entry to the transaction log.
pub async fn append_record(
    conn: &mut SqliteConnection,
    record: NewRecord,
) -> Result<TransactionRecord> {
    let metadata = record.metadata.as_ref().map(|v| v.to_string());
    let result = sqlx::query(
        r#"
        INSERT INTO transactions
            (user_id, kind, txn_type, amount, counterparty_id, rmb_equivalent,
             description, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.user_id)
    .bind(record.kind)
    .bind(record.txn_type)
    .bind(record.amount)
    .bind(record.counterparty_id)
    .bind(record.rmb_equivalent)
    .bind(record.description)
    .bind(metadata)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    let inserted = sqlx::query_as::<_, TransactionRecord>(
        "SELECT * FROM transactions WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(inserted)
}

/// Suspension gate evaluated inside the same transaction as the mutation
/// it protects. A user with no security row is active.
pub async fn ensure_active(conn: &mut SqliteConnection, user_id: i64) -> Result<()> {
    let status = sqlx::query_scalar::<_, WalletStatus>(
        "SELECT status FROM wallet_security WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    match status {
        Some(WalletStatus::Suspended) => Err(WalletError::WalletSuspended),
        _ => Ok(()),
    }
}

/// Signed sum of all log entries for one user and kind.
pub async fn log_sum(
    conn: &mut SqliteConnection,
    user_id: i64,
    kind: LedgerKind,
) -> Result<i64> {
    let sum = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = ? AND kind = ?",
    )
    .bind(user_id)
    .bind(kind)
    .fetch_one(&mut *conn)
    .await?;

    Ok(sum)
}
