// Coupon lifecycle: issue -> use, with expiry computed from the coupon
// window at read time.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::database::DbPool;
use crate::error::{Result, WalletError};
use crate::models::{Coupon, CouponStatus, DiscountType, UserCoupon};

/// Insert payload for a new coupon definition (admin-side).
#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub title: String,
    pub discount_type: DiscountType,
    #[serde(default)]
    pub threshold: i64,
    pub value: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

pub struct Coupons;

impl Coupons {
    pub async fn create(pool: &DbPool, coupon: NewCoupon) -> Result<Coupon> {
        let result = sqlx::query(
            r#"
            INSERT INTO coupons
                (title, discount_type, threshold, value, starts_at, ends_at, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'active', ?)
            "#,
        )
        .bind(&coupon.title)
        .bind(coupon.discount_type)
        .bind(coupon.threshold)
        .bind(coupon.value)
        .bind(coupon.starts_at)
        .bind(coupon.ends_at)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        let created = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(pool)
            .await?;
        Ok(created)
    }

    pub async fn set_status(pool: &DbPool, coupon_id: i64, status: CouponStatus) -> Result<()> {
        sqlx::query("UPDATE coupons SET status = ? WHERE id = ?")
            .bind(status)
            .bind(coupon_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Grants the coupon to the user. Duplicate grants are allowed; the
    /// coupon must be active and inside its own window.
    pub async fn issue(pool: &DbPool, user_id: i64, coupon_id: i64) -> Result<UserCoupon> {
        let now = Utc::now();
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = ?")
            .bind(coupon_id)
            .fetch_optional(pool)
            .await?
            .ok_or(WalletError::CouponNotUsable)?;

        if coupon.status != CouponStatus::Active || !coupon.in_window(now) {
            return Err(WalletError::CouponNotUsable);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO user_coupons (user_id, coupon_id, status, created_at)
            VALUES (?, ?, 'unused', ?)
            "#,
        )
        .bind(user_id)
        .bind(coupon_id)
        .bind(now)
        .execute(pool)
        .await?;

        let grant = sqlx::query_as::<_, UserCoupon>("SELECT * FROM user_coupons WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(pool)
            .await?;

        info!(user_id, coupon_id, grant_id = grant.id, "coupon issued");
        Ok(grant)
    }

    /// Consumes one eligible grant: unused, non-expired, coupon active, and
    /// `order_amount` reaching the threshold. The unused -> used transition
    /// is guarded in SQL so a grant can never be spent twice.
    pub async fn use_coupon(
        pool: &DbPool,
        user_id: i64,
        coupon_id: i64,
        order_amount: i64,
    ) -> Result<UserCoupon> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let grant = sqlx::query_as::<_, UserCoupon>(
            r#"
            SELECT uc.* FROM user_coupons uc
            JOIN coupons c ON c.id = uc.coupon_id
            WHERE uc.user_id = ? AND uc.coupon_id = ? AND uc.status = 'unused'
              AND c.status = 'active' AND c.starts_at <= ? AND c.ends_at >= ?
              AND c.threshold <= ?
            ORDER BY uc.id ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(coupon_id)
        .bind(now)
        .bind(now)
        .bind(order_amount)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(WalletError::CouponNotUsable)?;

        let updated = sqlx::query(
            "UPDATE user_coupons SET status = 'used', used_at = ? WHERE id = ? AND status = 'unused'",
        )
        .bind(now)
        .bind(grant.id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(WalletError::CouponNotUsable);
        }

        let used = sqlx::query_as::<_, UserCoupon>("SELECT * FROM user_coupons WHERE id = ?")
            .bind(grant.id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(user_id, coupon_id, grant_id = used.id, order_amount, "coupon used");
        Ok(used)
    }

    /// Held grants that could be applied to an order of the given amount.
    pub async fn list_usable(
        pool: &DbPool,
        user_id: i64,
        order_amount: i64,
    ) -> Result<Vec<UserCoupon>> {
        let now = Utc::now();
        let grants = sqlx::query_as::<_, UserCoupon>(
            r#"
            SELECT uc.* FROM user_coupons uc
            JOIN coupons c ON c.id = uc.coupon_id
            WHERE uc.user_id = ? AND uc.status = 'unused'
              AND c.status = 'active' AND c.starts_at <= ? AND c.ends_at >= ?
              AND c.threshold <= ?
            ORDER BY uc.id ASC
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(now)
        .bind(order_amount)
        .fetch_all(pool)
        .await?;

        Ok(grants)
    }
}
