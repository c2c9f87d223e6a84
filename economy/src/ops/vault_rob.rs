//! High-risk robbery of the vault.
//!
//! The cooldown stamp is claimed atomically before anything else, so two
//! racing attempts cannot both proceed. The haul comes out of the vault via
//! a capped withdrawal (the vault can never go negative); a Master Key
//! doubles the haul and is consumed only when it actually helped.

use crate::store::Store;
use crate::vault;
use pixelvault_types::{EconomyError, ItemKey, UserId};
use rand::Rng;
use tracing::info;

pub const ROB_COOLDOWN_MS: u64 = 60 * 60 * 1000;

/// Attempts are refused while the vault holds less than this.
pub const MIN_VAULT_TO_ATTEMPT: u64 = 10_000;

/// Odds and reward band, tripled/raised while a big heist is active.
#[derive(Clone, Copy, Debug)]
struct RobOdds {
    success: f64,
    reward_min: f64,
    reward_max: f64,
}

const NORMAL_ODDS: RobOdds = RobOdds {
    success: 0.03,
    reward_min: 0.10,
    reward_max: 0.15,
};

const HEIST_ODDS: RobOdds = RobOdds {
    success: 0.09,
    reward_min: 0.20,
    reward_max: 0.30,
};

/// Fine on failure: 15% of the robber's wallet.
const FINE_NUM: u64 = 15;
const FINE_DEN: u64 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RobOutcome {
    Success {
        haul: u64,
        vault_before: u64,
        vault_after: u64,
        key_consumed: bool,
    },
    Caught {
        fine: u64,
        boots_applied: bool,
        vault_before: u64,
    },
}

pub async fn rob_vault<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    big_heist: bool,
    now_ms: u64,
    rng: &mut impl Rng,
) -> Result<RobOutcome, EconomyError> {
    let success_roll: f64 = rng.gen();
    let reward_roll: f64 = rng.gen();
    rob_vault_rolled(
        store,
        actor,
        display_name,
        big_heist,
        now_ms,
        success_roll,
        reward_roll,
    )
    .await
}

pub(crate) async fn rob_vault_rolled<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    big_heist: bool,
    now_ms: u64,
    success_roll: f64,
    reward_roll: f64,
) -> Result<RobOutcome, EconomyError> {
    if actor.is_vault() {
        return Err(EconomyError::IneligibleTarget);
    }
    store.ensure(actor, display_name).await?;

    let vault_before = vault::balance(store).await?;
    if vault_before < MIN_VAULT_TO_ATTEMPT {
        return Err(EconomyError::VaultTooSmall {
            minimum: MIN_VAULT_TO_ATTEMPT,
        });
    }

    let odds = if big_heist { HEIST_ODDS } else { NORMAL_ODDS };

    if success_roll < odds.success {
        // Claim the cooldown first; losers of this race stop here.
        let (_, has_key) = store
            .apply_if(actor, |account| {
                let last = account.last_vaultrob;
                if last != 0 && now_ms.saturating_sub(last) < ROB_COOLDOWN_MS {
                    return Err(EconomyError::CooldownActive {
                        ready_at: last + ROB_COOLDOWN_MS,
                    });
                }
                account.last_vaultrob = now_ms;
                Ok(account.has_item(ItemKey::MasterKey))
            })
            .await?;

        let pct = odds.reward_min + reward_roll * (odds.reward_max - odds.reward_min);
        let multiplier = if has_key { 2 } else { 1 };
        let desired = ((vault_before as f64 * pct).floor() as u64)
            .saturating_mul(multiplier)
            .max(1);

        let withdrawal = vault::withdraw_up_to(store, desired).await?;
        let haul = withdrawal.withdrawn;

        let (account, key_consumed) = store
            .apply_if(actor, |account| {
                account.wallet = account.wallet.saturating_add(haul);
                let consumed = has_key && haul > 0 && account.consume_item(ItemKey::MasterKey);
                Ok(consumed)
            })
            .await?;
        info!(
            user = %account.user_id,
            haul,
            vault_after = withdrawal.remaining,
            "vault robbery succeeded"
        );
        Ok(RobOutcome::Success {
            haul,
            vault_before,
            vault_after: withdrawal.remaining,
            key_consumed,
        })
    } else {
        let (_, (fine, boots_applied)) = store
            .apply_if(actor, |account| {
                let last = account.last_vaultrob;
                if last != 0 && now_ms.saturating_sub(last) < ROB_COOLDOWN_MS {
                    return Err(EconomyError::CooldownActive {
                        ready_at: last + ROB_COOLDOWN_MS,
                    });
                }
                let boots = account.has_item(ItemKey::Boots);
                let mut fine =
                    (account.wallet as u128 * FINE_NUM as u128 / FINE_DEN as u128) as u64;
                if boots {
                    fine /= 2;
                }
                fine = fine.min(account.wallet);
                account.wallet -= fine;
                account.last_vaultrob = now_ms;
                Ok((fine, boots))
            })
            .await?;

        vault::deposit_non_critical(store, fine).await;
        Ok(RobOutcome::Caught {
            fine,
            boots_applied,
            vault_before,
        })
    }
}
