//! Daily reward with a 24-hour cooldown.
//!
//! Reward ranges scale with level, multipliers apply to the rolled values,
//! and the credit and cooldown stamp commit in one guarded step: a second
//! claim inside the window is refused with the ready-at timestamp computed
//! from the stamp actually stored.

use crate::store::Store;
use pixelvault_types::{EconomyError, UserId};
use rand::Rng;

pub const DAILY_COOLDOWN_MS: u64 = 24 * 60 * 60 * 1000;

/// Chance of a lucky bonus worth +25% coins.
const LUCKY_CHANCE: f64 = 0.02;
const LUCKY_BONUS_NUM: u64 = 25;
const LUCKY_BONUS_DEN: u64 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyOutcome {
    pub coins: u64,
    pub xp: u64,
    pub lucky_bonus: u64,
    pub wallet: u64,
    pub total_xp: u64,
}

fn range_roll(min: u64, max: u64, roll: f64) -> u64 {
    min + ((max - min + 1) as f64 * roll).floor() as u64
}

pub async fn claim<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    now_ms: u64,
    rng: &mut impl Rng,
) -> Result<DailyOutcome, EconomyError> {
    let coin_roll: f64 = rng.gen();
    let xp_roll: f64 = rng.gen();
    let lucky_roll: f64 = rng.gen();
    claim_rolled(store, actor, display_name, now_ms, coin_roll, xp_roll, lucky_roll).await
}

pub(crate) async fn claim_rolled<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    now_ms: u64,
    coin_roll: f64,
    xp_roll: f64,
    lucky_roll: f64,
) -> Result<DailyOutcome, EconomyError> {
    store.ensure(actor, display_name).await?;

    let (account, (coins, xp, lucky_bonus)) = store
        .apply_if(actor, |account| {
            let last = account.last_daily;
            if last != 0 && now_ms.saturating_sub(last) < DAILY_COOLDOWN_MS {
                return Err(EconomyError::CooldownActive {
                    ready_at: last + DAILY_COOLDOWN_MS,
                });
            }

            let level = account.level.max(1) as u64;
            let coin_min = 300 + (level - 1) * 20;
            let coin_max = 500 + (level - 1) * 30;
            let xp_min = 120 + (level - 1) * 10;
            let xp_max = 250 + (level - 1) * 15;

            let mut coins = range_roll(coin_min, coin_max, coin_roll);
            let mut xp = range_roll(xp_min, xp_max, xp_roll);
            coins = crate::ops::scaled_profit(coins, account.coin_multiplier);
            xp = crate::ops::scaled_profit(xp, account.xp_multiplier);

            let lucky_bonus = if lucky_roll < LUCKY_CHANCE {
                let bonus = coins * LUCKY_BONUS_NUM / LUCKY_BONUS_DEN;
                coins += bonus;
                bonus
            } else {
                0
            };

            account.wallet = account.wallet.saturating_add(coins);
            account.xp = account.xp.saturating_add(xp);
            account.last_daily = now_ms;
            Ok((coins, xp, lucky_bonus))
        })
        .await?;

    Ok(DailyOutcome {
        coins,
        xp,
        lucky_bonus,
        wallet: account.wallet,
        total_xp: account.xp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn uid(id: &str) -> UserId {
        UserId::from(id)
    }

    #[tokio::test]
    async fn claim_credits_and_stamps() {
        let store = MemoryStore::new();
        let user = uid("u1");
        let outcome = claim_rolled(&store, &user, "u1", 1_000, 0.0, 0.0, 0.5)
            .await
            .unwrap();
        assert_eq!(outcome.coins, 300);
        assert_eq!(outcome.xp, 120);
        assert_eq!(outcome.lucky_bonus, 0);
        assert_eq!(outcome.wallet, 300);

        let err = claim_rolled(&store, &user, "u1", 2_000, 0.0, 0.0, 0.5)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EconomyError::CooldownActive {
                ready_at: 1_000 + DAILY_COOLDOWN_MS
            }
        );

        // The full window later, claiming works again.
        claim_rolled(&store, &user, "u1", 1_000 + DAILY_COOLDOWN_MS, 0.0, 0.0, 0.5)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rewards_scale_with_level_and_multiplier() {
        let store = MemoryStore::new();
        let user = uid("u1");
        store.ensure(&user, "u1").await.unwrap();
        store
            .apply_if(&user, |account| {
                account.level = 11;
                account.coin_multiplier = 2.0;
                Ok(())
            })
            .await
            .unwrap();

        // Level 11: coins 500..=800, top of range doubled = 1_600.
        let outcome = claim_rolled(&store, &user, "u1", 1_000, 0.999, 0.0, 0.5)
            .await
            .unwrap();
        assert_eq!(outcome.coins, 1_600);
        assert_eq!(outcome.xp, 220);
    }

    #[tokio::test]
    async fn lucky_bonus_adds_quarter() {
        let store = MemoryStore::new();
        let user = uid("u1");
        let outcome = claim_rolled(&store, &user, "u1", 1_000, 0.0, 0.0, 0.0)
            .await
            .unwrap();
        assert_eq!(outcome.lucky_bonus, 75);
        assert_eq!(outcome.coins, 375);
    }
}
