// Wallet security guard: payment password, per-period limits, freeze state,
// and the append-only security audit log.
//
// Password and limit checks are advisory: callers reject the underlying
// ledger operation when a check fails. The freeze state itself is enforced
// inside the ledger transactions via `store::ensure_active`.

use blake2::{Blake2b512, Digest};
use chrono::{DateTime, Datelike, NaiveTime, Utc};
use rand::RngCore;
use serde_json::json;
use tracing::{info, warn};

use crate::database::DbPool;
use crate::error::Result;
use crate::models::{LedgerKind, LimitPeriod, SecurityEvent, SecurityLog, WalletSecurity, WalletStatus};

pub struct Security;

impl Security {
    /// Security row for the user, created with defaults on first access.
    pub async fn get(pool: &DbPool, user_id: i64) -> Result<WalletSecurity> {
        sqlx::query(
            r#"
            INSERT INTO wallet_security (user_id, password_enabled, status, updated_at)
            VALUES (?, 0, 'active', ?)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        let row = sqlx::query_as::<_, WalletSecurity>(
            "SELECT * FROM wallet_security WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    /// Stores a salted one-way hash and enables the password gate.
    pub async fn set_payment_password(pool: &DbPool, user_id: i64, raw: &str) -> Result<()> {
        Self::get(pool, user_id).await?;

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let stored = format!("{}${}", hex::encode(salt), digest(&hex::encode(salt), raw));

        sqlx::query(
            r#"
            UPDATE wallet_security
            SET password_hash = ?, password_enabled = 1, updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(stored)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;

        append_log(pool, user_id, SecurityEvent::PasswordSet, None).await?;
        info!(user_id, "payment password set");
        Ok(())
    }

    /// Verifies the payment password. Trivially succeeds while no password
    /// is enabled; every failed attempt is audited.
    pub async fn verify_payment_password(pool: &DbPool, user_id: i64, raw: &str) -> Result<bool> {
        let security = Self::get(pool, user_id).await?;
        let stored = match (security.password_enabled, security.password_hash.as_deref()) {
            (true, Some(stored)) => stored,
            _ => return Ok(true),
        };

        let ok = match stored.split_once('$') {
            Some((salt, expected)) => constant_time_eq(digest(salt, raw).as_bytes(), expected.as_bytes()),
            None => false,
        };
        if !ok {
            warn!(user_id, "payment password verification failed");
            append_log(pool, user_id, SecurityEvent::PasswordFailed, None).await?;
        }
        Ok(ok)
    }

    pub async fn set_limits(
        pool: &DbPool,
        user_id: i64,
        single: Option<i64>,
        daily: Option<i64>,
        monthly: Option<i64>,
    ) -> Result<WalletSecurity> {
        Self::get(pool, user_id).await?;
        sqlx::query(
            r#"
            UPDATE wallet_security
            SET single_limit = ?, daily_limit = ?, monthly_limit = ?, updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(single)
        .bind(daily)
        .bind(monthly)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;

        Self::get(pool, user_id).await
    }

    /// True when the proposed cash spend fits the configured limit for the
    /// period. Violations are audited and return false; the caller must then
    /// reject the underlying operation.
    pub async fn check_transaction_limit(
        pool: &DbPool,
        user_id: i64,
        amount: i64,
        period: LimitPeriod,
    ) -> Result<bool> {
        let security = Self::get(pool, user_id).await?;
        let now = Utc::now();

        let (limit, spent) = match period {
            LimitPeriod::Single => (security.single_limit, 0),
            LimitPeriod::Daily => {
                let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
                (security.daily_limit, spent_since(pool, user_id, start).await?)
            }
            LimitPeriod::Monthly => {
                let month_start = now
                    .date_naive()
                    .with_day(1)
                    .unwrap_or(now.date_naive())
                    .and_time(NaiveTime::MIN)
                    .and_utc();
                (security.monthly_limit, spent_since(pool, user_id, month_start).await?)
            }
        };

        let Some(limit) = limit else {
            return Ok(true);
        };
        if spent + amount > limit {
            warn!(user_id, amount, spent, limit, period = ?period, "transaction limit exceeded");
            let detail = json!({
                "period": period,
                "amount": amount,
                "already_spent": spent,
                "limit": limit,
            });
            append_log(pool, user_id, SecurityEvent::LimitExceeded, Some(detail.to_string()))
                .await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Freezes the wallet; ledger, donate, and points-spend transactions
    /// reject the user until `activate`. Audited on actual transitions only.
    pub async fn suspend(pool: &DbPool, user_id: i64) -> Result<WalletSecurity> {
        Self::set_status(pool, user_id, WalletStatus::Suspended, SecurityEvent::Freeze).await
    }

    pub async fn activate(pool: &DbPool, user_id: i64) -> Result<WalletSecurity> {
        Self::set_status(pool, user_id, WalletStatus::Active, SecurityEvent::Unfreeze).await
    }

    async fn set_status(
        pool: &DbPool,
        user_id: i64,
        status: WalletStatus,
        event: SecurityEvent,
    ) -> Result<WalletSecurity> {
        let current = Self::get(pool, user_id).await?;
        if current.status == status {
            return Ok(current);
        }

        sqlx::query("UPDATE wallet_security SET status = ?, updated_at = ? WHERE user_id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(user_id)
            .execute(pool)
            .await?;
        append_log(pool, user_id, event, None).await?;

        info!(user_id, status = ?status, "wallet status changed");
        Self::get(pool, user_id).await
    }

    /// Audit trail, newest first.
    pub async fn logs(
        pool: &DbPool,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SecurityLog>> {
        let logs = sqlx::query_as::<_, SecurityLog>(
            r#"
            SELECT * FROM security_logs
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(logs)
    }
}

/// Cash spent (negative entries, absolute value) since the given instant.
async fn spent_since(pool: &DbPool, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
    let spent = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(-amount), 0) FROM transactions
        WHERE user_id = ? AND kind = ? AND amount < 0 AND created_at >= ?
        "#,
    )
    .bind(user_id)
    .bind(LedgerKind::Cash)
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(spent)
}

/// Audit writes go through the pool, not a caller's transaction, so they
/// survive the rollback of the operation they describe.
async fn append_log(
    pool: &DbPool,
    user_id: i64,
    event: SecurityEvent,
    detail: Option<String>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO security_logs (user_id, event_type, detail, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(event)
    .bind(detail)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

fn digest(salt: &str, raw: &str) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(salt.as_bytes());
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Length-safe comparison that does not short-circuit on the first
/// differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_per_salt() {
        assert_eq!(digest("abcd", "secret"), digest("abcd", "secret"));
        assert_ne!(digest("abcd", "secret"), digest("ef01", "secret"));
        assert_ne!(digest("abcd", "secret"), digest("abcd", "other"));
    }

    #[test]
    fn comparison_handles_length_mismatch() {
        assert!(constant_time_eq(b"same", b"same"));
        assert!(!constant_time_eq(b"same", b"samee"));
        assert!(!constant_time_eq(b"same", b"sane"));
    }
}
