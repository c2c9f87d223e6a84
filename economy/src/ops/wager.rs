//! Wager games: coin-flip gamble, slot machine, spin wheel.
//!
//! The randomized outcome is pure and independent of the storage layer; the
//! balance change settles in one guarded step (`wallet >= bet` at write
//! time) so a racing wager can never overdraw.

use crate::amount::AmountSpec;
use crate::ops::scaled_profit;
use crate::store::Store;
use pixelvault_types::{Account, EconomyError, UserId};
use rand::Rng;

/// Win probability of the plain gamble.
const GAMBLE_WIN_CHANCE: f64 = 0.5;

pub const REELS: usize = 4;

/// Chance for a later reel to copy an earlier one, nudging pair/triple rates
/// up slightly.
const REPEAT_BIAS: f64 = 0.10;

/// Four-of-a-kind results are re-rolled at this rate to keep jackpots rare.
const JACKPOT_REROLL: f64 = 0.50;

const WHEEL_JACKPOT_CHANCE: f64 = 0.03;

/// Settle a wager atomically: debit the bet and credit the return in one
/// guarded step. The coin multiplier applies to the profit portion only and
/// is read from the row at write time.
pub(crate) async fn settle_wager<S: Store>(
    store: &S,
    actor: &UserId,
    bet: u64,
    base_return: u64,
) -> Result<(u64, u64, Account), EconomyError> {
    let (account, (credited, profit)) = store
        .apply_if(actor, |account| {
            if account.wallet < bet {
                return Err(EconomyError::InsufficientFunds {
                    needed: bet,
                    available: account.wallet,
                });
            }
            let (credited, profit) = if base_return > bet {
                let profit = scaled_profit(base_return - bet, account.coin_multiplier);
                (bet.saturating_add(profit), profit)
            } else {
                (base_return, 0)
            };
            account.wallet -= bet;
            account.wallet = account.wallet.saturating_add(credited);
            Ok((credited, profit))
        })
        .await?;
    Ok((credited, profit, account))
}

fn resolve_bet(spec: AmountSpec, wallet: u64) -> Result<u64, EconomyError> {
    let bet = spec.resolve(wallet);
    if bet == 0 {
        return Err(EconomyError::InvalidAmount);
    }
    if bet > wallet {
        return Err(EconomyError::InsufficientFunds {
            needed: bet,
            available: wallet,
        });
    }
    Ok(bet)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GambleOutcome {
    pub won: bool,
    pub bet: u64,
    pub profit: u64,
    pub new_wallet: u64,
}

pub async fn gamble<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    bet: AmountSpec,
    rng: &mut impl Rng,
) -> Result<GambleOutcome, EconomyError> {
    let account = store.ensure(actor, display_name).await?;
    let bet = resolve_bet(bet, account.wallet)?;

    let won = rng.gen_bool(GAMBLE_WIN_CHANCE);
    let base_return = if won { bet.saturating_mul(2) } else { 0 };
    let (_, profit, account) = settle_wager(store, actor, bet, base_return).await?;
    Ok(GambleOutcome {
        won,
        bet,
        profit,
        new_wallet: account.wallet,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotSymbol {
    Eggplant,
    Hearts,
    Cherry,
    Lemon,
    Watermelon,
    Grapes,
    Star,
    Bell,
    Seven,
}

/// Enough distinct symbols that "no match" stays possible on four reels.
pub const SYMBOLS: [SlotSymbol; 9] = [
    SlotSymbol::Eggplant,
    SlotSymbol::Hearts,
    SlotSymbol::Cherry,
    SlotSymbol::Lemon,
    SlotSymbol::Watermelon,
    SlotSymbol::Grapes,
    SlotSymbol::Star,
    SlotSymbol::Bell,
    SlotSymbol::Seven,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotHand {
    FourKind,
    ThreeKind,
    TwoPairs,
    OnePair,
    None,
}

impl SlotHand {
    /// Base return multiplier in tenths (a one-pair return of 1.0x is still
    /// a small loss once nothing else lines up).
    pub fn multiplier_tenths(self) -> u64 {
        match self {
            SlotHand::FourKind => 120,
            SlotHand::ThreeKind => 40,
            SlotHand::TwoPairs => 25,
            SlotHand::OnePair => 10,
            SlotHand::None => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SlotHand::FourKind => "four of a kind",
            SlotHand::ThreeKind => "three of a kind",
            SlotHand::TwoPairs => "two pairs",
            SlotHand::OnePair => "one pair",
            SlotHand::None => "no match",
        }
    }
}

fn spin_reels(rng: &mut impl Rng) -> [SlotSymbol; REELS] {
    let mut reels = [SYMBOLS[0]; REELS];
    for i in 0..REELS {
        if i > 0 && rng.gen_bool(REPEAT_BIAS) {
            let j = rng.gen_range(0..i);
            reels[i] = reels[j];
        } else {
            reels[i] = SYMBOLS[rng.gen_range(0..SYMBOLS.len())];
        }
    }
    reels
}

pub fn classify(reels: &[SlotSymbol; REELS]) -> SlotHand {
    let mut counts = [0u8; SYMBOLS.len()];
    for reel in reels {
        counts[SYMBOLS.iter().position(|s| s == reel).unwrap_or(0)] += 1;
    }
    let mut freqs: Vec<u8> = counts.iter().copied().filter(|c| *c > 0).collect();
    freqs.sort_unstable_by(|a, b| b.cmp(a));
    match freqs[0] {
        4 => SlotHand::FourKind,
        3 => SlotHand::ThreeKind,
        2 => {
            if freqs.iter().filter(|f| **f == 2).count() == 2 {
                SlotHand::TwoPairs
            } else {
                SlotHand::OnePair
            }
        }
        _ => SlotHand::None,
    }
}

pub(crate) fn roll_reels(rng: &mut impl Rng) -> ([SlotSymbol; REELS], SlotHand) {
    loop {
        let reels = spin_reels(rng);
        let hand = classify(&reels);
        if hand == SlotHand::FourKind && rng.gen_bool(JACKPOT_REROLL) {
            continue;
        }
        return (reels, hand);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotOutcome {
    pub reels: [SlotSymbol; REELS],
    pub hand: SlotHand,
    pub bet: u64,
    pub returned: u64,
    pub profit: u64,
    pub new_wallet: u64,
}

pub async fn slot<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    bet: AmountSpec,
    rng: &mut impl Rng,
) -> Result<SlotOutcome, EconomyError> {
    let account = store.ensure(actor, display_name).await?;
    let bet = resolve_bet(bet, account.wallet)?;

    let (reels, hand) = roll_reels(rng);
    let base_return = ((bet as u128 * hand.multiplier_tenths() as u128) / 10)
        .min(u64::MAX as u128) as u64;
    let (credited, profit, account) = settle_wager(store, actor, bet, base_return).await?;
    Ok(SlotOutcome {
        reels,
        hand,
        bet,
        returned: credited,
        profit,
        new_wallet: account.wallet,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WheelSegment {
    Double,
    Lucky,
    Minor,
    Half,
    Lose,
    Jackpot,
}

impl WheelSegment {
    pub fn multiplier_tenths(self) -> u64 {
        match self {
            WheelSegment::Double => 20,
            WheelSegment::Lucky => 15,
            WheelSegment::Minor => 12,
            WheelSegment::Half => 5,
            WheelSegment::Lose => 0,
            WheelSegment::Jackpot => 50,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WheelSegment::Double => "x2.0",
            WheelSegment::Lucky => "x1.5",
            WheelSegment::Minor => "x1.2",
            WheelSegment::Half => "x0.5",
            WheelSegment::Lose => "Lose",
            WheelSegment::Jackpot => "Jackpot!",
        }
    }
}

const WHEEL_POOL: [WheelSegment; 5] = [
    WheelSegment::Double,
    WheelSegment::Lucky,
    WheelSegment::Minor,
    WheelSegment::Half,
    WheelSegment::Lose,
];

fn spin_wheel(rng: &mut impl Rng) -> WheelSegment {
    if rng.gen_bool(WHEEL_JACKPOT_CHANCE) {
        WheelSegment::Jackpot
    } else {
        WHEEL_POOL[rng.gen_range(0..WHEEL_POOL.len())]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WheelOutcome {
    pub segment: WheelSegment,
    pub bet: u64,
    pub payout: u64,
    pub profit: u64,
    pub loss: u64,
    pub new_wallet: u64,
}

pub async fn spinwheel<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    bet: AmountSpec,
    rng: &mut impl Rng,
) -> Result<WheelOutcome, EconomyError> {
    let account = store.ensure(actor, display_name).await?;
    let bet = resolve_bet(bet, account.wallet)?;

    let segment = spin_wheel(rng);
    let payout =
        ((bet as u128 * segment.multiplier_tenths() as u128) / 10).min(u64::MAX as u128) as u64;
    let (credited, profit, account) = settle_wager(store, actor, bet, payout).await?;
    let loss = bet.saturating_sub(credited);
    Ok(WheelOutcome {
        segment,
        bet,
        payout,
        profit,
        loss,
        new_wallet: account.wallet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn uid(id: &str) -> UserId {
        UserId::from(id)
    }

    async fn funded(store: &MemoryStore, id: &str, wallet: u64) -> UserId {
        let user = uid(id);
        store.ensure(&user, id).await.unwrap();
        store
            .apply_if(&user, |account| {
                account.wallet = wallet;
                Ok(())
            })
            .await
            .unwrap();
        user
    }

    #[tokio::test]
    async fn all_in_loss_then_rejection() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;

        // Guaranteed-loss settle of an "all" bet empties the wallet.
        let (credited, profit, account) =
            settle_wager(&store, &user, 1_000, 0).await.unwrap();
        assert_eq!((credited, profit), (0, 0));
        assert_eq!(account.wallet, 0);

        // A second identical wager is rejected: 0 < any positive bet.
        let err = settle_wager(&store, &user, 1_000, 0).await.unwrap_err();
        assert_eq!(
            err,
            EconomyError::InsufficientFunds {
                needed: 1_000,
                available: 0
            }
        );
    }

    #[tokio::test]
    async fn multiplier_scales_profit_not_principal() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;
        store
            .apply_if(&user, |account| {
                account.coin_multiplier = 2.0;
                Ok(())
            })
            .await
            .unwrap();

        // Win at even money: base profit 100, doubled by the multiplier.
        let (credited, profit, account) =
            settle_wager(&store, &user, 100, 200).await.unwrap();
        assert_eq!(profit, 200);
        assert_eq!(credited, 300);
        assert_eq!(account.wallet, 1_200);

        // Losses are not amplified.
        let (_, profit, account) = settle_wager(&store, &user, 100, 0).await.unwrap();
        assert_eq!(profit, 0);
        assert_eq!(account.wallet, 1_100);
    }

    #[tokio::test]
    async fn partial_return_is_not_a_win() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;
        store
            .apply_if(&user, |account| {
                account.coin_multiplier = 10.0;
                Ok(())
            })
            .await
            .unwrap();

        // A 0.5x return is a loss; the multiplier must not touch it.
        let (credited, profit, account) =
            settle_wager(&store, &user, 100, 50).await.unwrap();
        assert_eq!((credited, profit), (50, 0));
        assert_eq!(account.wallet, 950);
    }

    #[tokio::test]
    async fn gamble_rejects_zero_and_oversized_bets() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 10).await;
        let mut rng = StdRng::seed_from_u64(1);

        let err = gamble(&store, &user, "u1", AmountSpec::Exact(0), &mut rng)
            .await
            .unwrap_err();
        assert_eq!(err, EconomyError::InvalidAmount);

        let err = gamble(&store, &user, "u1", AmountSpec::Exact(11), &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::InsufficientFunds { .. }));
    }

    #[test]
    fn classify_hands() {
        use SlotSymbol::*;
        assert_eq!(classify(&[Star, Star, Star, Star]), SlotHand::FourKind);
        assert_eq!(classify(&[Star, Star, Star, Bell]), SlotHand::ThreeKind);
        assert_eq!(classify(&[Star, Star, Bell, Bell]), SlotHand::TwoPairs);
        assert_eq!(classify(&[Star, Star, Bell, Seven]), SlotHand::OnePair);
        assert_eq!(classify(&[Star, Cherry, Bell, Seven]), SlotHand::None);
    }

    #[test]
    fn wheel_hits_every_segment_eventually() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut jackpots = 0u32;
        let mut losses = 0u32;
        for _ in 0..10_000 {
            match spin_wheel(&mut rng) {
                WheelSegment::Jackpot => jackpots += 1,
                WheelSegment::Lose => losses += 1,
                _ => {}
            }
        }
        // ~3% jackpots, ~19% losses; just assert the shape.
        assert!(jackpots > 100 && jackpots < 700);
        assert!(losses > 1_000);
    }

    #[tokio::test]
    async fn slot_settles_with_tenths_multiplier() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;
        let mut rng = StdRng::seed_from_u64(9);
        let outcome = slot(&store, &user, "u1", AmountSpec::Exact(100), &mut rng)
            .await
            .unwrap();
        let expected_return = 100 * outcome.hand.multiplier_tenths() / 10;
        if expected_return > 100 {
            assert_eq!(outcome.returned, 100 + outcome.profit);
        } else {
            assert_eq!(outcome.returned, expected_return);
        }
        assert_eq!(
            outcome.new_wallet,
            1_000 - 100 + outcome.returned
        );
    }
}
