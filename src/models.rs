// Database models for the wallet core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Independent balance types. Points never move through the plain ledger
/// operations; they are granted and spent by the points rule engine only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LedgerKind {
    Cash,
    Coin,
    Points,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Cash => "cash",
            LedgerKind::Coin => "coin",
            LedgerKind::Points => "points",
        }
    }
}

/// Kinds a caller may recharge, consume, or donate directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyKind {
    Cash,
    Coin,
}

impl From<CurrencyKind> for LedgerKind {
    fn from(kind: CurrencyKind) -> Self {
        match kind {
            CurrencyKind::Cash => LedgerKind::Cash,
            CurrencyKind::Coin => LedgerKind::Coin,
        }
    }
}

/// Fixed VirtualCoin exchange rate: 1 RMB = 10 coins.
pub const COINS_PER_RMB: i64 = 10;

pub fn coins_from_rmb(rmb: i64) -> i64 {
    rmb * COINS_PER_RMB
}

pub fn rmb_from_coins(coins: i64) -> i64 {
    coins / COINS_PER_RMB
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TxnType {
    Recharge,
    Consume,
    TipSent,
    TipReceived,
    Reward,
    Reconciliation,
}

/// Mutable current-balance row, one per user per ledger kind.
/// Created lazily on first access and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub user_id: i64,
    pub kind: LedgerKind,
    pub amount: i64,
    pub frozen_amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Balance available for spending; frozen funds are excluded.
    pub fn spendable(&self) -> i64 {
        self.amount - self.frozen_amount
    }
}

/// Immutable append-only entry describing one signed balance change.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: i64,
    pub kind: LedgerKind,
    pub txn_type: TxnType,
    pub amount: i64,
    pub counterparty_id: Option<i64>,
    pub rmb_equivalent: Option<i64>,
    pub description: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn metadata_value(&self) -> Option<serde_json::Value> {
        self.metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DiscountType {
    AmountOff,
    PercentOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CouponStatus {
    Active,
    Inactive,
}

/// Reusable discount definition.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: i64,
    pub title: String,
    pub discount_type: DiscountType,
    pub threshold: i64,
    pub value: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: CouponStatus,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now <= self.ends_at
    }

    /// Discount granted against an order of the given amount.
    pub fn discount_for(&self, order_amount: i64) -> i64 {
        match self.discount_type {
            DiscountType::AmountOff => self.value.min(order_amount),
            DiscountType::PercentOff => order_amount * self.value / 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum GrantStatus {
    Unused,
    Used,
}

/// A per-user grant of a coupon. Expiry is derived from the backing
/// coupon's window at read time; only unused -> used is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserCoupon {
    pub id: i64,
    pub user_id: i64,
    pub coupon_id: i64,
    pub status: GrantStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RuleStatus {
    Active,
    Inactive,
}

/// How a rule computes the points to grant for a triggering action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointsFormula {
    /// Flat number of points per trigger.
    Fixed { points: i64 },
    /// Points proportional to the context amount, in whole units.
    PerAmount { unit: i64, points: i64 },
}

impl PointsFormula {
    pub fn evaluate(&self, ctx: &TriggerContext) -> i64 {
        match self {
            PointsFormula::Fixed { points } => *points,
            PointsFormula::PerAmount { unit, points } => {
                if *unit <= 0 {
                    return 0;
                }
                ctx.amount.unwrap_or(0) / unit * points
            }
        }
    }
}

/// Per-rule eligibility conditions; all listed conditions must hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Context amount must reach the given minimum.
    MinAmount { amount: i64 },
    /// At most one grant from this rule per user per UTC day.
    OncePerDay,
}

/// Caller-supplied context for a triggering action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerContext {
    pub amount: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

/// Condition-and-formula pair that auto-grants points on matching actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsRule {
    pub id: i64,
    pub action: String,
    pub formula: PointsFormula,
    pub conditions: Vec<RuleCondition>,
    pub priority: i64,
    pub status: RuleStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Raw row; formula and conditions are JSON text parsed at the boundary.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PointsRuleRow {
    pub id: i64,
    pub action: String,
    pub formula: String,
    pub conditions: String,
    pub priority: i64,
    pub status: RuleStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PointsRuleRow> for PointsRule {
    type Error = WalletError;

    fn try_from(row: PointsRuleRow) -> Result<Self, WalletError> {
        Ok(PointsRule {
            id: row.id,
            action: row.action,
            formula: serde_json::from_str(&row.formula)?,
            conditions: serde_json::from_str(&row.conditions)?,
            priority: row.priority,
            status: row.status,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            created_at: row.created_at,
        })
    }
}

/// Outcome of one rule grant produced by a trigger.
#[derive(Debug, Clone, Serialize)]
pub struct GrantResult {
    pub rule_id: i64,
    pub points: i64,
    pub record_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WalletStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WalletSecurity {
    pub user_id: i64,
    pub password_hash: Option<String>,
    pub password_enabled: bool,
    pub single_limit: Option<i64>,
    pub daily_limit: Option<i64>,
    pub monthly_limit: Option<i64>,
    pub status: WalletStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SecurityEvent {
    PasswordSet,
    PasswordFailed,
    LimitExceeded,
    Freeze,
    Unfreeze,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SecurityLog {
    pub id: i64,
    pub user_id: i64,
    pub event_type: SecurityEvent,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Period a transaction limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPeriod {
    Single,
    Daily,
    Monthly,
}

/// Per-user totals aggregated from the transaction log.
#[derive(Debug, Clone, Serialize)]
pub struct WalletStats {
    pub user_id: i64,
    pub kind: LedgerKind,
    pub total_recharged: i64,
    pub total_consumed: i64,
    pub total_tips_sent: i64,
    pub total_tips_received: i64,
}
