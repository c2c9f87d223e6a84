//! Taxed transfers between two accounts.
//!
//! Both rows are updated inside one guarded pair step. When the destination
//! is a bank with limited capacity, the gross is recomputed so the net
//! amount exactly fills the remaining space (inverting the tax formula and
//! rounding the required gross up), and sender affordability is re-verified
//! against the adjusted gross.

use crate::amount::AmountSpec;
use crate::store::Store;
use crate::tax::{compute_tax, gross_for_net};
use crate::vault;
use pixelvault_types::{BalanceKind, EconomyError, UserId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferOutcome {
    pub gross: u64,
    pub tax: u64,
    pub net: u64,
    pub source: BalanceKind,
    pub dest: BalanceKind,
    pub sender_balance: u64,
    pub recipient_balance: u64,
}

pub async fn send<S: Store>(
    store: &S,
    sender: &UserId,
    sender_name: &str,
    recipient: &UserId,
    recipient_name: &str,
    amount: AmountSpec,
    source: BalanceKind,
    dest: BalanceKind,
) -> Result<TransferOutcome, EconomyError> {
    if sender == recipient {
        return Err(EconomyError::SelfTarget);
    }
    if recipient.is_vault() {
        return Err(EconomyError::IneligibleTarget);
    }

    let sender_row = store.ensure(sender, sender_name).await?;
    store.ensure(recipient, recipient_name).await?;

    let requested = amount.resolve(sender_row.balance(source));
    if requested == 0 {
        return Err(EconomyError::InvalidAmount);
    }

    let (sender_row, recipient_row, (gross, tax, net)) = store
        .apply_pair_if(sender, recipient, |from, to| {
            let available = from.balance(source);
            if available < requested {
                return Err(EconomyError::InsufficientFunds {
                    needed: requested,
                    available,
                });
            }

            let mut gross = requested;
            let mut tax = compute_tax(gross);
            let mut net = gross - tax;

            if dest == BalanceKind::Bank {
                let space = to.bank_space();
                if space == 0 {
                    return Err(EconomyError::BankFull { space: 0 });
                }
                if net > space {
                    // Refit: find the minimal gross whose net exactly fills
                    // the remaining capacity.
                    gross = gross_for_net(space);
                    tax = compute_tax(gross);
                    let mut refit_net = gross - tax;
                    if refit_net > space {
                        gross -= 1;
                        tax = compute_tax(gross);
                        refit_net = gross - tax;
                    }
                    net = refit_net;
                    if net == 0 {
                        return Err(EconomyError::BankFull { space });
                    }
                    if available < gross {
                        return Err(EconomyError::InsufficientFunds {
                            needed: gross,
                            available,
                        });
                    }
                }
            }

            *from.balance_mut(source) -= gross;
            let credited = to.balance(dest).saturating_add(net);
            *to.balance_mut(dest) = credited;
            Ok((gross, tax, net))
        })
        .await?;

    // Bookkeeping side effect; the principal transfer is already committed.
    if tax > 0 {
        vault::deposit_non_critical(store, tax).await;
    }

    Ok(TransferOutcome {
        gross,
        tax,
        net,
        source,
        dest,
        sender_balance: sender_row.balance(source),
        recipient_balance: recipient_row.balance(dest),
    })
}
