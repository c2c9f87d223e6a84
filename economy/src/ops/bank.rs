//! Untaxed moves between a user's own wallet and bank.
//!
//! Deposits clamp to remaining capacity (fill exactly, never overshoot) and
//! settle under a `wallet >= amount && bank + amount <= bank_limit` guard;
//! when the guard refuses, the reason is computed from the row state seen
//! at write time.

use crate::amount::AmountSpec;
use crate::store::Store;
use pixelvault_types::{EconomyError, UserId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankOutcome {
    pub moved: u64,
    pub wallet: u64,
    pub bank: u64,
    pub bank_limit: u64,
}

pub async fn deposit<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    amount: AmountSpec,
) -> Result<BankOutcome, EconomyError> {
    let account = store.ensure(actor, display_name).await?;
    let requested = amount.resolve(account.wallet);
    if requested == 0 {
        return Err(EconomyError::InvalidAmount);
    }

    let (account, moved) = store
        .apply_if(actor, |account| {
            let space = account.bank_space();
            if space == 0 {
                return Err(EconomyError::BankFull { space: 0 });
            }
            if requested > account.wallet {
                return Err(EconomyError::InsufficientFunds {
                    needed: requested,
                    available: account.wallet,
                });
            }
            let moved = requested.min(space);
            account.wallet -= moved;
            account.bank += moved;
            Ok(moved)
        })
        .await?;

    Ok(BankOutcome {
        moved,
        wallet: account.wallet,
        bank: account.bank,
        bank_limit: account.bank_limit,
    })
}

pub async fn withdraw<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    amount: AmountSpec,
) -> Result<BankOutcome, EconomyError> {
    let account = store.ensure(actor, display_name).await?;
    let requested = amount.resolve(account.bank);
    if requested == 0 {
        return Err(EconomyError::InvalidAmount);
    }

    let (account, moved) = store
        .apply_if(actor, |account| {
            if requested > account.bank {
                return Err(EconomyError::InsufficientFunds {
                    needed: requested,
                    available: account.bank,
                });
            }
            account.bank -= requested;
            account.wallet = account.wallet.saturating_add(requested);
            Ok(requested)
        })
        .await?;

    Ok(BankOutcome {
        moved,
        wallet: account.wallet,
        bank: account.bank,
        bank_limit: account.bank_limit,
    })
}
