//! The singleton house account ("the vault").
//!
//! Taxes, fines, and the lottery house cut accumulate here; vault robberies
//! drain it. The vault is not a special case in the storage layer: it is an
//! ordinary account row addressed by a reserved identity, and every write
//! goes through the same guarded primitives as user accounts.

use crate::store::{Store, Withdrawal};
use pixelvault_types::account::VAULT_NAME;
use pixelvault_types::{EconomyError, UserId};
use tracing::warn;

/// Create the vault row if it does not exist yet.
pub async fn ensure<S: Store>(store: &S) -> Result<(), EconomyError> {
    store.ensure(&UserId::vault(), VAULT_NAME).await?;
    Ok(())
}

pub async fn balance<S: Store>(store: &S) -> Result<u64, EconomyError> {
    Ok(store
        .get(&UserId::vault())
        .await?
        .map(|account| account.wallet)
        .unwrap_or(0))
}

/// Credit `amount` to the vault. Zero amounts are a no-op.
pub async fn deposit<S: Store>(store: &S, amount: u64) -> Result<u64, EconomyError> {
    if amount == 0 {
        return Ok(0);
    }
    ensure(store).await?;
    store
        .apply_if(&UserId::vault(), |vault| {
            vault.wallet = vault.wallet.saturating_add(amount);
            Ok(())
        })
        .await?;
    Ok(amount)
}

/// Record a tax/fine deposit after the primary transaction already
/// committed. Failures here must never roll that transaction back, so they
/// are logged and swallowed.
pub async fn deposit_non_critical<S: Store>(store: &S, amount: u64) {
    if let Err(reason) = deposit(store, amount).await {
        warn!(%reason, amount, "failed to record vault deposit");
    }
}

/// Withdraw up to `want`, capped at the vault's current balance.
pub async fn withdraw_up_to<S: Store>(store: &S, want: u64) -> Result<Withdrawal, EconomyError> {
    ensure(store).await?;
    store.withdraw_up_to(&UserId::vault(), want).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn deposit_creates_vault_lazily() {
        let store = MemoryStore::new();
        assert_eq!(balance(&store).await.unwrap(), 0);
        assert_eq!(deposit(&store, 250).await.unwrap(), 250);
        assert_eq!(balance(&store).await.unwrap(), 250);
    }

    #[tokio::test]
    async fn zero_deposit_is_noop() {
        let store = MemoryStore::new();
        assert_eq!(deposit(&store, 0).await.unwrap(), 0);
        assert!(store.get(&UserId::vault()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn withdrawal_never_goes_negative() {
        let store = MemoryStore::new();
        deposit(&store, 100).await.unwrap();
        let out = withdraw_up_to(&store, 1_000).await.unwrap();
        assert_eq!(out.withdrawn, 100);
        assert_eq!(out.remaining, 0);
        assert_eq!(balance(&store).await.unwrap(), 0);
    }
}
