// Points rule engine: rule-triggered grants over a derived balance.
//
// The points balance is materialized in the accounts table and updated
// atomically with every log append; `reconcile` cross-checks it against
// the signed sum of the log and repairs drift.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::database::DbPool;
use crate::error::{Result, WalletError};
use crate::models::{
    Account, GrantResult, LedgerKind, PointsRule, PointsRuleRow, RuleCondition, RuleStatus,
    TransactionRecord, TriggerContext, TxnType,
};
use crate::store::{self, NewRecord};

/// Insert payload for a new rule.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPointsRule {
    pub action: String,
    pub formula: crate::models::PointsFormula,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub priority: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

pub struct Points;

impl Points {
    pub async fn create_rule(pool: &DbPool, rule: NewPointsRule) -> Result<PointsRule> {
        let formula = serde_json::to_string(&rule.formula)?;
        let conditions = serde_json::to_string(&rule.conditions)?;
        let result = sqlx::query(
            r#"
            INSERT INTO points_rules
                (action, formula, conditions, priority, status, starts_at, ends_at, created_at)
            VALUES (?, ?, ?, ?, 'active', ?, ?, ?)
            "#,
        )
        .bind(&rule.action)
        .bind(formula)
        .bind(conditions)
        .bind(rule.priority)
        .bind(rule.starts_at)
        .bind(rule.ends_at)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        let row = sqlx::query_as::<_, PointsRuleRow>("SELECT * FROM points_rules WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(pool)
            .await?;
        row.try_into()
    }

    pub async fn set_rule_status(pool: &DbPool, rule_id: i64, status: RuleStatus) -> Result<()> {
        sqlx::query("UPDATE points_rules SET status = ? WHERE id = ?")
            .bind(status)
            .bind(rule_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Evaluates every active in-window rule matching `action` and grants
    /// points for each rule whose conditions hold. Rules are independent;
    /// one action may produce several grants. The whole trigger is one
    /// transaction.
    pub async fn trigger(
        pool: &DbPool,
        user_id: i64,
        action: &str,
        ctx: &TriggerContext,
    ) -> Result<Vec<GrantResult>> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let rows = sqlx::query_as::<_, PointsRuleRow>(
            r#"
            SELECT * FROM points_rules
            WHERE action = ? AND status = 'active' AND starts_at <= ? AND ends_at >= ?
            ORDER BY priority DESC, id ASC
            "#,
        )
        .bind(action)
        .bind(now)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let mut results = Vec::new();
        for row in rows {
            let rule: PointsRule = row.try_into()?;
            if !conditions_hold(&mut tx, &rule, user_id, ctx, now).await? {
                continue;
            }
            let points = rule.formula.evaluate(ctx);
            if points <= 0 {
                warn!(rule_id = rule.id, user_id, points, "rule formula yielded no points");
                continue;
            }
            let record = grant_on(&mut tx, user_id, points, Some(&rule), action, ctx).await?;
            results.push(GrantResult {
                rule_id: rule.id,
                points,
                record_id: record.id,
            });
        }

        tx.commit().await?;
        if !results.is_empty() {
            info!(user_id, action, grants = results.len(), "points rules granted");
        }
        Ok(results)
    }

    /// Direct grant outside rule evaluation (admin-side).
    pub async fn grant(
        pool: &DbPool,
        user_id: i64,
        points: i64,
        action: &str,
        ctx: &TriggerContext,
    ) -> Result<Account> {
        if points <= 0 {
            return Err(WalletError::InvalidAmount(points));
        }
        let mut tx = pool.begin().await?;
        grant_on(&mut tx, user_id, points, None, action, ctx).await?;
        let account = store::fetch_account(&mut tx, user_id, LedgerKind::Points).await?;
        tx.commit().await?;
        Ok(account)
    }

    /// Batch grant to several users (admin-side); one transaction overall.
    pub async fn grant_many(
        pool: &DbPool,
        user_ids: &[i64],
        points: i64,
        action: &str,
    ) -> Result<usize> {
        if points <= 0 {
            return Err(WalletError::InvalidAmount(points));
        }
        let ctx = TriggerContext::default();
        let mut tx = pool.begin().await?;
        for &user_id in user_ids {
            grant_on(&mut tx, user_id, points, None, action, &ctx).await?;
        }
        tx.commit().await?;
        info!(users = user_ids.len(), points, action, "batch points grant committed");
        Ok(user_ids.len())
    }

    /// Spends points. The suspension gate and the balance check both run
    /// inside the transaction.
    pub async fn use_points(
        pool: &DbPool,
        user_id: i64,
        points: i64,
        description: &str,
    ) -> Result<Account> {
        if points <= 0 {
            return Err(WalletError::InvalidAmount(points));
        }
        let mut tx = pool.begin().await?;
        store::ensure_active(&mut tx, user_id).await?;
        let account = store::decrement(&mut tx, user_id, LedgerKind::Points, points)
            .await
            .map_err(|e| match e {
                WalletError::InsufficientFunds => WalletError::InsufficientPoints,
                other => other,
            })?;
        let mut record = NewRecord::new(user_id, LedgerKind::Points, TxnType::Consume, -points);
        record.description = Some(description.to_string());
        store::append_record(&mut tx, record).await?;
        tx.commit().await?;

        info!(user_id, points, "points spent");
        Ok(account)
    }

    /// Materialized current balance.
    pub async fn current_points(pool: &DbPool, user_id: i64) -> Result<i64> {
        let mut conn = pool.acquire().await?;
        let account = store::get_or_create_account(&mut conn, user_id, LedgerKind::Points).await?;
        Ok(account.amount)
    }

    /// Balance derived by summing the log, bypassing the materialized row.
    pub async fn derived_points(pool: &DbPool, user_id: i64) -> Result<i64> {
        let mut conn = pool.acquire().await?;
        store::log_sum(&mut conn, user_id, LedgerKind::Points).await
    }

    /// Compares the materialized balance against the log sum and resets the
    /// row to the log's value when they disagree, marking the repair with a
    /// zero-amount `reconciliation` entry. Returns the drift found.
    pub async fn reconcile(pool: &DbPool, user_id: i64) -> Result<i64> {
        let mut tx = pool.begin().await?;
        let account = store::get_or_create_account(&mut tx, user_id, LedgerKind::Points).await?;
        let derived = store::log_sum(&mut tx, user_id, LedgerKind::Points).await?;
        let drift = account.amount - derived;
        if drift != 0 {
            warn!(user_id, materialized = account.amount, derived, "points balance drift");
            sqlx::query(
                "UPDATE accounts SET amount = ?, updated_at = ? WHERE user_id = ? AND kind = ?",
            )
            .bind(derived)
            .bind(Utc::now())
            .bind(user_id)
            .bind(LedgerKind::Points)
            .execute(&mut *tx)
            .await?;

            let mut record =
                NewRecord::new(user_id, LedgerKind::Points, TxnType::Reconciliation, 0);
            record.metadata = Some(json!({ "previous": account.amount, "derived": derived }));
            store::append_record(&mut tx, record).await?;
        }
        tx.commit().await?;
        Ok(drift)
    }
}

/// Credits points and appends the `reward` entry on the given connection.
async fn grant_on(
    conn: &mut SqliteConnection,
    user_id: i64,
    points: i64,
    rule: Option<&PointsRule>,
    action: &str,
    ctx: &TriggerContext,
) -> Result<TransactionRecord> {
    store::increment(&mut *conn, user_id, LedgerKind::Points, points).await?;

    let mut record = NewRecord::new(user_id, LedgerKind::Points, TxnType::Reward, points);
    record.description = Some(format!("points for {action}"));
    record.metadata = Some(json!({
        "rule_id": rule.map(|r| r.id),
        "action": action,
        "context": ctx.metadata,
    }));
    store::append_record(conn, record).await
}

async fn conditions_hold(
    conn: &mut SqliteConnection,
    rule: &PointsRule,
    user_id: i64,
    ctx: &TriggerContext,
    now: DateTime<Utc>,
) -> Result<bool> {
    for condition in &rule.conditions {
        let holds = match condition {
            RuleCondition::MinAmount { amount } => ctx.amount.unwrap_or(0) >= *amount,
            RuleCondition::OncePerDay => !granted_today(&mut *conn, rule.id, user_id, now).await?,
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Whether this rule already produced a grant for the user today (UTC).
async fn granted_today(
    conn: &mut SqliteConnection,
    rule_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let records = sqlx::query_as::<_, TransactionRecord>(
        r#"
        SELECT * FROM transactions
        WHERE user_id = ? AND kind = ? AND txn_type = ? AND created_at >= ?
        "#,
    )
    .bind(user_id)
    .bind(LedgerKind::Points)
    .bind(TxnType::Reward)
    .bind(day_start)
    .fetch_all(conn)
    .await?;

    Ok(records.iter().any(|r| {
        r.metadata_value()
            .and_then(|m| m.get("rule_id").and_then(|v| v.as_i64()))
            == Some(rule_id)
    }))
}
