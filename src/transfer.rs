// Donate engine: atomic paired debit-credit between two users.

use tracing::info;

use crate::database::DbPool;
use crate::error::{Result, WalletError};
use crate::models::{Account, CurrencyKind, LedgerKind, TxnType};
use crate::store::{self, NewRecord};

/// Both sides of a committed donation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DonateOutcome {
    pub from: Account,
    pub to: Account,
}

pub struct Donate;

impl Donate {
    /// Moves `amount` from one user to another within a single transaction:
    /// debit, credit, and two sign-mirrored log entries referencing each
    /// other's user as counterparty. All four writes commit or none do.
    pub async fn transfer(
        pool: &DbPool,
        from_user_id: i64,
        to_user_id: i64,
        kind: CurrencyKind,
        amount: i64,
        description: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<DonateOutcome> {
        if from_user_id == to_user_id {
            return Err(WalletError::SelfTransferNotAllowed);
        }
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let kind = LedgerKind::from(kind);

        let mut tx = pool.begin().await?;
        store::ensure_active(&mut tx, from_user_id).await?;

        // Touch both account rows in ascending user id order so that
        // concurrent opposite-direction transfers acquire them the same way.
        let (first, second) = if from_user_id < to_user_id {
            (from_user_id, to_user_id)
        } else {
            (to_user_id, from_user_id)
        };
        store::get_or_create_account(&mut tx, first, kind).await?;
        store::get_or_create_account(&mut tx, second, kind).await?;

        let from = store::decrement(&mut tx, from_user_id, kind, amount).await?;
        let to = store::increment(&mut tx, to_user_id, kind, amount).await?;

        let mut sent = NewRecord::new(from_user_id, kind, TxnType::TipSent, -amount);
        sent.counterparty_id = Some(to_user_id);
        sent.description = Some(description.to_string());
        sent.metadata = metadata.clone();
        store::append_record(&mut tx, sent).await?;

        let mut received = NewRecord::new(to_user_id, kind, TxnType::TipReceived, amount);
        received.counterparty_id = Some(from_user_id);
        received.description = Some(description.to_string());
        received.metadata = metadata;
        store::append_record(&mut tx, received).await?;

        tx.commit().await?;

        info!(
            from_user_id,
            to_user_id,
            kind = kind.as_str(),
            amount,
            "donation committed"
        );
        Ok(DonateOutcome { from, to })
    }
}
