//! Work-shift rewards.
//!
//! The reaction minigame itself lives in the presentation layer; the core
//! receives whether the shift succeeded, scales the base ranges by the job
//! level and the account multipliers, rolls the rare bonuses, and credits
//! everything atomically.

use crate::store::Store;
use pixelvault_types::{EconomyError, UserId};
use rand::Rng;

const WIN_COINS: (u64, u64) = (150, 300);
const LOSE_COINS: (u64, u64) = (20, 60);
const WIN_XP: (u64, u64) = (40, 75);
const LOSE_XP: (u64, u64) = (5, 20);

/// Earnings grow 12% per job level.
const JOB_BONUS_PER_LEVEL: f64 = 0.12;

const TREASURE_CHANCE: f64 = 0.002;
const TREASURE_COINS: u64 = 2_500;
const TREASURE_XP: u64 = 250;
const JACKPOT_CHANCE: f64 = 0.003; // cumulative with the treasure band
const JACKPOT_COINS: u64 = 5_000;
const JACKPOT_XP: u64 = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkOutcome {
    pub correct: bool,
    pub coins: u64,
    pub xp: u64,
    pub bonus_coins: u64,
    pub bonus_xp: u64,
    pub wallet: u64,
    pub total_xp: u64,
}

fn range_roll((min, max): (u64, u64), roll: f64) -> u64 {
    min + ((max - min + 1) as f64 * roll).floor() as u64
}

pub async fn finish_shift<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    correct: bool,
    rng: &mut impl Rng,
) -> Result<WorkOutcome, EconomyError> {
    let coin_roll: f64 = rng.gen();
    let xp_roll: f64 = rng.gen();
    let bonus_roll: f64 = rng.gen();
    finish_shift_rolled(store, actor, display_name, correct, coin_roll, xp_roll, bonus_roll).await
}

pub(crate) async fn finish_shift_rolled<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    correct: bool,
    coin_roll: f64,
    xp_roll: f64,
    bonus_roll: f64,
) -> Result<WorkOutcome, EconomyError> {
    store.ensure(actor, display_name).await?;

    let (account, (coins, xp, bonus_coins, bonus_xp)) = store
        .apply_if(actor, |account| {
            let job_mult = 1.0 + JOB_BONUS_PER_LEVEL * account.job_level.max(1) as f64;
            let (coin_range, xp_range) = if correct {
                (WIN_COINS, WIN_XP)
            } else {
                (LOSE_COINS, LOSE_XP)
            };

            let base_coins = range_roll(coin_range, coin_roll);
            let base_xp = range_roll(xp_range, xp_roll);
            let coins = crate::ops::scaled_profit(
                (base_coins as f64 * job_mult).floor() as u64,
                account.coin_multiplier,
            );
            let xp = crate::ops::scaled_profit(
                (base_xp as f64 * job_mult).floor() as u64,
                account.xp_multiplier,
            );

            let (bonus_coins, bonus_xp) = if bonus_roll < TREASURE_CHANCE {
                (TREASURE_COINS, TREASURE_XP)
            } else if bonus_roll < JACKPOT_CHANCE {
                (JACKPOT_COINS, JACKPOT_XP)
            } else {
                (0, 0)
            };

            account.wallet = account
                .wallet
                .saturating_add(coins)
                .saturating_add(bonus_coins);
            account.xp = account.xp.saturating_add(xp).saturating_add(bonus_xp);
            Ok((coins, xp, bonus_coins, bonus_xp))
        })
        .await?;

    Ok(WorkOutcome {
        correct,
        coins,
        xp,
        bonus_coins,
        bonus_xp,
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
    async fn correct_shift_pays_scaled_range() {
        let store = MemoryStore::new();
        let user = uid("u1");
        store.ensure(&user, "u1").await.unwrap();
        store
            .apply_if(&user, |account| {
                account.job_level = 5;
                Ok(())
            })
            .await
            .unwrap();

        // floor(150 * 1.6) = 240 coins, floor(40 * 1.6) = 64 xp.
        let outcome = finish_shift_rolled(&store, &user, "u1", true, 0.0, 0.0, 0.5)
            .await
            .unwrap();
        assert_eq!(outcome.coins, 240);
        assert_eq!(outcome.xp, 64);
        assert_eq!(outcome.bonus_coins, 0);
    }

    #[tokio::test]
    async fn wrong_answer_still_pays_consolation() {
        let store = MemoryStore::new();
        let user = uid("u1");
        let outcome = finish_shift_rolled(&store, &user, "u1", false, 0.0, 0.0, 0.5)
            .await
            .unwrap();
        // floor(20 * 1.12) = 22 coins at job level 1.
        assert_eq!(outcome.coins, 22);
        assert_eq!(outcome.xp, 5);
    }

    #[tokio::test]
    async fn bonus_bands_are_ordered() {
        let store = MemoryStore::new();
        let user = uid("u1");
        let outcome = finish_shift_rolled(&store, &user, "u1", true, 0.0, 0.0, 0.001)
            .await
            .unwrap();
        assert_eq!(outcome.bonus_coins, TREASURE_COINS);

        let outcome = finish_shift_rolled(&store, &user, "u1", true, 0.0, 0.0, 0.0025)
            .await
            .unwrap();
        assert_eq!(outcome.bonus_coins, JACKPOT_COINS);
    }
}
