// Error taxonomy for the wallet core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    /// Decrement or transfer beyond the available (non-frozen) balance.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Points usage beyond the current points balance.
    #[error("insufficient points")]
    InsufficientPoints,

    /// Transfer source equals destination.
    #[error("self transfer not allowed")]
    SelfTransferNotAllowed,

    /// Coupon inactive, outside its window, or no eligible grant.
    #[error("coupon not usable")]
    CouponNotUsable,

    /// Non-positive amount passed to a mutating operation.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Wallet security status is suspended; mutations are rejected.
    #[error("wallet is suspended")]
    WalletSuspended,

    /// Stored rule payload failed to parse as a known formula/condition.
    #[error("malformed rule payload: {0}")]
    MalformedRule(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, WalletError>;
