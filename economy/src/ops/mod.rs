//! Economy operations.
//!
//! Every operation follows the same shape: validate input, ensure the
//! accounts exist, then submit the state transition to the store's guarded
//! primitive and branch on the typed result. Nothing in this module formats
//! user-facing text.

pub mod admin;
pub mod bank;
pub mod daily;
pub mod shop;
pub mod steal;
pub mod transfer;
pub mod vault_rob;
pub mod wager;
pub mod work;

use crate::store::Store;
use pixelvault_types::{EconomyError, UserId};

/// Scale a profit by the account's coin multiplier, flooring the result.
/// Multipliers amplify gains only; principal and losses are never scaled.
pub(crate) fn scaled_profit(base: u64, multiplier: f64) -> u64 {
    if !multiplier.is_finite() || multiplier < 0.0 {
        return base;
    }
    (base as f64 * multiplier).floor() as u64
}

/// Count a social interaction (hug/pat/etc.) against the actor's record.
/// The interaction media itself is presentation-layer.
pub async fn record_interaction<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
) -> Result<u64, EconomyError> {
    store.ensure(actor, display_name).await?;
    let (account, _) = store
        .apply_if(actor, |account| {
            account.interact_count = account.interact_count.saturating_add(1);
            Ok(())
        })
        .await?;
    Ok(account.interact_count)
}
