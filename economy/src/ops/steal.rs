//! Theft: a probabilistic, non-consensual transfer.
//!
//! Thief and victim rows are locked together so the cooldown stamp, the
//! thief's items, and the victim's balance are all read and written in one
//! indivisible step. The random rolls are drawn up front and compared
//! against chances computed from the row state at write time.

use crate::store::Store;
use crate::vault;
use pixelvault_types::{EconomyError, ItemKey, UserId};
use rand::Rng;

pub const STEAL_COOLDOWN_MS: u64 = 7 * 60 * 1000;

const BASE_SUCCESS: f64 = 0.30;
const GLOVES_BONUS: f64 = 0.05;
const SUCCESS_CAP: f64 = 0.95;

/// At most this fraction of the victim's wallet can be attempted.
const MAX_STEAL_NUM: u64 = 70;
const MAX_STEAL_DEN: u64 = 100;

/// Weighted fine brackets on failure: (weight, per-mille of the attempted
/// amount).
const FINE_BRACKETS: [(f64, u64); 4] = [(0.50, 55), (0.30, 100), (0.15, 150), (0.05, 200)];

/// Share of the fine rebated to the victim; the rest goes to the vault.
const VICTIM_COMP_NUM: u64 = 2;
const VICTIM_COMP_DEN: u64 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StealOutcome {
    Success {
        taken: u64,
        thief_wallet: u64,
    },
    Caught {
        fine: u64,
        victim_comp: u64,
        vault_cut: u64,
        boots_applied: bool,
    },
}

fn fine_permille(roll: f64) -> u64 {
    let mut acc = 0.0;
    for (weight, permille) in FINE_BRACKETS {
        acc += weight;
        if roll < acc {
            return permille;
        }
    }
    FINE_BRACKETS[FINE_BRACKETS.len() - 1].1
}

pub async fn steal<S: Store>(
    store: &S,
    thief: &UserId,
    thief_name: &str,
    victim: &UserId,
    victim_name: &str,
    requested: u64,
    now_ms: u64,
    rng: &mut impl Rng,
) -> Result<StealOutcome, EconomyError> {
    let success_roll: f64 = rng.gen();
    let fine_roll: f64 = rng.gen();
    steal_rolled(
        store,
        thief,
        thief_name,
        victim,
        victim_name,
        requested,
        now_ms,
        success_roll,
        fine_roll,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn steal_rolled<S: Store>(
    store: &S,
    thief: &UserId,
    thief_name: &str,
    victim: &UserId,
    victim_name: &str,
    requested: u64,
    now_ms: u64,
    success_roll: f64,
    fine_roll: f64,
) -> Result<StealOutcome, EconomyError> {
    if thief == victim {
        return Err(EconomyError::SelfTarget);
    }
    if victim.is_vault() {
        return Err(EconomyError::IneligibleTarget);
    }
    if requested == 0 {
        return Err(EconomyError::InvalidAmount);
    }

    store.ensure(thief, thief_name).await?;
    store.ensure(victim, victim_name).await?;

    let (_, _, outcome) = store
        .apply_pair_if(thief, victim, |thief_row, victim_row| {
            let last = thief_row.last_steal;
            if last != 0 && now_ms.saturating_sub(last) < STEAL_COOLDOWN_MS {
                return Err(EconomyError::CooldownActive {
                    ready_at: last + STEAL_COOLDOWN_MS,
                });
            }

            let victim_money = victim_row.wallet;
            let max_allowed =
                (victim_money as u128 * MAX_STEAL_NUM as u128 / MAX_STEAL_DEN as u128) as u64;
            let amount = requested.min(max_allowed);
            if amount == 0 {
                return Err(EconomyError::NothingToSteal);
            }

            let gloves = thief_row.item_count(ItemKey::Gloves).min(1) as f64;
            let chance = (BASE_SUCCESS + gloves * GLOVES_BONUS).min(SUCCESS_CAP);

            if success_roll < chance {
                let taken = amount.min(victim_money);
                victim_row.wallet -= taken;
                thief_row.wallet = thief_row.wallet.saturating_add(taken);
                thief_row.last_steal = now_ms;
                Ok(StealOutcome::Success {
                    taken,
                    thief_wallet: thief_row.wallet,
                })
            } else {
                let boots = thief_row.has_item(ItemKey::Boots);
                let mut fine =
                    (amount as u128 * fine_permille(fine_roll) as u128 / 1_000) as u64;
                if boots {
                    fine /= 2;
                }
                fine = fine.min(thief_row.wallet);

                let victim_comp =
                    (fine as u128 * VICTIM_COMP_NUM as u128 / VICTIM_COMP_DEN as u128) as u64;
                let vault_cut = fine - victim_comp;

                thief_row.wallet -= fine;
                thief_row.last_steal = now_ms;
                victim_row.wallet = victim_row.wallet.saturating_add(victim_comp);
                Ok(StealOutcome::Caught {
                    fine,
                    victim_comp,
                    vault_cut,
                    boots_applied: boots,
                })
            }
        })
        .await?;

    if let StealOutcome::Caught { vault_cut, .. } = &outcome {
        vault::deposit_non_critical(store, *vault_cut).await;
    }
    Ok(outcome)
}
