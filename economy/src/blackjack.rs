//! Turn-based blackjack.
//!
//! Lifecycle: dealing -> player turn -> dealer turn -> settled. The bet is
//! debited up front under a wallet guard; settlement performs exactly one
//! credit. The per-user "one active game" set is an in-memory fast path;
//! the money invariants are enforced by the storage guards, so losing this
//! set on restart can never double-debit or double-credit.
//!
//! Payouts: natural blackjack 3:2, normal win 1:1 on the full stake, push
//! refunds the stake, a loss forfeits it. The coin multiplier scales the
//! profit portion only.
//!
//! A wall-clock deadline resolves an abandoned player turn as an implicit
//! stand; late timer firings after settlement are no-ops.

use crate::amount::AmountSpec;
use crate::cards::{fresh_deck, hand_value, is_blackjack};
use crate::ops::scaled_profit;
use crate::store::Store;
use pixelvault_types::{EconomyError, UserId};
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// How long the seated player has before the game stands for them.
pub const TURN_TIMEOUT_MS: u64 = 60_000;

/// Dealer draws to 17 and redraws a soft 17.
const DEALER_STAND: u8 = 17;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Hit,
    Stand,
    Double,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    Blackjack,
    Win,
    Push,
    Lose,
}

#[derive(Clone, Debug)]
struct Game {
    deck: Vec<u8>,
    player: Vec<u8>,
    dealer: Vec<u8>,
    bet: u64,
    stake: u64,
    can_double: bool,
    deadline_ms: u64,
}

impl Game {
    fn draw(&mut self) -> u8 {
        self.deck
            .pop()
            .expect("a single-seat game cannot exhaust a 52-card deck")
    }
}

/// Snapshot of an in-flight game for the presentation layer. Only the
/// dealer's upcard is exposed before the dealer turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameView {
    pub player: Vec<u8>,
    pub player_total: u8,
    pub dealer_upcard: u8,
    pub bet: u64,
    pub stake: u64,
    pub can_double: bool,
    pub deadline_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlackjackOutcome {
    pub settlement: Settlement,
    pub player: Vec<u8>,
    pub dealer: Vec<u8>,
    pub bet: u64,
    pub stake: u64,
    pub profit: u64,
    pub credited: u64,
    pub new_wallet: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Deal {
    /// Naturals settle on the deal.
    Settled(BlackjackOutcome),
    Playing(GameView),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Turn {
    Playing(GameView),
    /// A double was requested but the extra stake could not be debited;
    /// the game continues with doubling disabled.
    DoubleRefused(GameView),
    Settled(BlackjackOutcome),
}

/// Registry of active games, one per user.
#[derive(Default)]
pub struct Table {
    games: Mutex<HashMap<UserId, Game>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_playing(&self, actor: &UserId) -> bool {
        self.games.lock().await.contains_key(actor)
    }

    pub async fn view(&self, actor: &UserId) -> Option<GameView> {
        self.games.lock().await.get(actor).map(Self::view_of)
    }

    fn view_of(game: &Game) -> GameView {
        GameView {
            player: game.player.clone(),
            player_total: hand_value(&game.player).0,
            dealer_upcard: game.dealer[0],
            bet: game.bet,
            stake: game.stake,
            can_double: game.can_double,
            deadline_ms: game.deadline_ms,
        }
    }

    pub async fn start<S: Store>(
        &self,
        store: &S,
        actor: &UserId,
        display_name: &str,
        bet: AmountSpec,
        now_ms: u64,
        rng: &mut impl Rng,
    ) -> Result<Deal, EconomyError> {
        let deck = fresh_deck(rng);
        self.start_with_deck(store, actor, display_name, bet, now_ms, deck)
            .await
    }

    pub(crate) async fn start_with_deck<S: Store>(
        &self,
        store: &S,
        actor: &UserId,
        display_name: &str,
        bet: AmountSpec,
        now_ms: u64,
        mut deck: Vec<u8>,
    ) -> Result<Deal, EconomyError> {
        let mut games = self.games.lock().await;
        if games.contains_key(actor) {
            return Err(EconomyError::GameInProgress);
        }

        let account = store.ensure(actor, display_name).await?;
        let bet = bet.resolve(account.wallet);
        if bet == 0 {
            return Err(EconomyError::InvalidAmount);
        }

        // Authoritative up-front debit.
        store
            .apply_if(actor, |account| {
                if account.wallet < bet {
                    return Err(EconomyError::InsufficientFunds {
                        needed: bet,
                        available: account.wallet,
                    });
                }
                account.wallet -= bet;
                Ok(())
            })
            .await?;

        let player = vec![
            deck.pop().expect("fresh deck"),
            deck.pop().expect("fresh deck"),
        ];
        let dealer = vec![
            deck.pop().expect("fresh deck"),
            deck.pop().expect("fresh deck"),
        ];
        let game = Game {
            deck,
            player,
            dealer,
            bet,
            stake: bet,
            can_double: true,
            deadline_ms: now_ms + TURN_TIMEOUT_MS,
        };

        let player_bj = is_blackjack(&game.player);
        let dealer_bj = is_blackjack(&game.dealer);
        if player_bj || dealer_bj {
            let settlement = if player_bj && dealer_bj {
                Settlement::Push
            } else if player_bj {
                Settlement::Blackjack
            } else {
                Settlement::Lose
            };
            let outcome = Self::settle(store, actor, game, settlement).await?;
            return Ok(Deal::Settled(outcome));
        }

        let view = Self::view_of(&game);
        games.insert(actor.clone(), game);
        Ok(Deal::Playing(view))
    }

    pub async fn act<S: Store>(
        &self,
        store: &S,
        actor: &UserId,
        action: Action,
        now_ms: u64,
    ) -> Result<Turn, EconomyError> {
        let mut games = self.games.lock().await;
        let game = games.get_mut(actor).ok_or(EconomyError::NoActiveGame)?;

        // A late action past the deadline resolves the same way the timer
        // would: an implicit stand.
        if now_ms >= game.deadline_ms {
            debug!(user = %actor, "blackjack action past deadline, standing");
            let game = games.remove(actor).expect("present above");
            let outcome = Self::run_dealer(store, actor, game).await?;
            return Ok(Turn::Settled(outcome));
        }

        match action {
            Action::Hit => {
                let card = game.draw();
                game.player.push(card);
                game.can_double = false;
                if hand_value(&game.player).0 > 21 {
                    let game = games.remove(actor).expect("present above");
                    let outcome = Self::settle(store, actor, game, Settlement::Lose).await?;
                    return Ok(Turn::Settled(outcome));
                }
                Ok(Turn::Playing(Self::view_of(game)))
            }
            Action::Stand => {
                let game = games.remove(actor).expect("present above");
                let outcome = Self::run_dealer(store, actor, game).await?;
                Ok(Turn::Settled(outcome))
            }
            Action::Double => {
                if !game.can_double {
                    return Err(EconomyError::InvalidMove);
                }
                let extra = game.bet;
                let debit = store
                    .apply_if(actor, |account| {
                        if account.wallet < extra {
                            return Err(EconomyError::InsufficientFunds {
                                needed: extra,
                                available: account.wallet,
                            });
                        }
                        account.wallet -= extra;
                        Ok(())
                    })
                    .await;
                match debit {
                    Err(EconomyError::InsufficientFunds { .. }) => {
                        // Doubling quietly turns off; the hand goes on.
                        game.can_double = false;
                        return Ok(Turn::DoubleRefused(Self::view_of(game)));
                    }
                    Err(other) => return Err(other),
                    Ok(_) => {}
                }
                game.stake += extra;
                game.can_double = false;
                let card = game.draw();
                game.player.push(card);

                let game = games.remove(actor).expect("present above");
                if hand_value(&game.player).0 > 21 {
                    let outcome = Self::settle(store, actor, game, Settlement::Lose).await?;
                    return Ok(Turn::Settled(outcome));
                }
                let outcome = Self::run_dealer(store, actor, game).await?;
                Ok(Turn::Settled(outcome))
            }
        }
    }

    /// Timer entry point: resolve an overdue player turn as a stand.
    /// Returns `None` when there is nothing due (the game is gone because
    /// it already settled, or the deadline has not passed), so duplicate
    /// and late firings are harmless.
    pub async fn expire<S: Store>(
        &self,
        store: &S,
        actor: &UserId,
        now_ms: u64,
    ) -> Result<Option<BlackjackOutcome>, EconomyError> {
        let mut games = self.games.lock().await;
        let due = games
            .get(actor)
            .map(|game| now_ms >= game.deadline_ms)
            .unwrap_or(false);
        if !due {
            return Ok(None);
        }
        let game = games.remove(actor).expect("present above");
        let outcome = Self::run_dealer(store, actor, game).await?;
        Ok(Some(outcome))
    }

    async fn run_dealer<S: Store>(
        store: &S,
        actor: &UserId,
        mut game: Game,
    ) -> Result<BlackjackOutcome, EconomyError> {
        let mut dealer = hand_value(&game.dealer);
        while dealer.0 < DEALER_STAND || (dealer.0 == DEALER_STAND && dealer.1) {
            let card = game.draw();
            game.dealer.push(card);
            dealer = hand_value(&game.dealer);
        }

        let player_total = hand_value(&game.player).0;
        let settlement = if dealer.0 > 21 {
            Settlement::Win
        } else if player_total > dealer.0 {
            Settlement::Win
        } else if player_total == dealer.0 {
            Settlement::Push
        } else {
            Settlement::Lose
        };
        Self::settle(store, actor, game, settlement).await
    }

    async fn settle<S: Store>(
        store: &S,
        actor: &UserId,
        game: Game,
        settlement: Settlement,
    ) -> Result<BlackjackOutcome, EconomyError> {
        let stake = game.stake;
        let base_profit = match settlement {
            Settlement::Blackjack => stake.saturating_mul(3) / 2,
            Settlement::Win => stake,
            Settlement::Push | Settlement::Lose => 0,
        };

        let (account, (credited, profit)) = store
            .apply_if(actor, |account| {
                let (credited, profit) = match settlement {
                    Settlement::Push => (stake, 0),
                    Settlement::Lose => (0, 0),
                    _ => {
                        let profit = scaled_profit(base_profit, account.coin_multiplier);
                        (stake.saturating_add(profit), profit)
                    }
                };
                account.wallet = account.wallet.saturating_add(credited);
                Ok((credited, profit))
            })
            .await?;

        Ok(BlackjackOutcome {
            settlement,
            player: game.player,
            dealer: game.dealer,
            bet: game.bet,
            stake,
            profit,
            credited,
            new_wallet: account.wallet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

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

    // Card constructor: suit * 13 + rank index (0 = Ace, 9 = Ten, 12 = King).
    fn card(rank: u8, suit: u8) -> u8 {
        suit * 13 + rank
    }

    /// Build a deck whose draws come out in the given order (player 1,
    /// player 2, dealer 1, dealer 2, then hits). Draws pop from the end.
    fn scripted_deck(order: &[u8]) -> Vec<u8> {
        let mut deck: Vec<u8> = order.to_vec();
        deck.reverse();
        deck
    }

    const TEN: u8 = 9; // rank index of the ten
    const ACE: u8 = 0;

    #[tokio::test]
    async fn natural_blackjack_pays_three_to_two() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;
        let table = Table::new();

        // Player A + 10, dealer 9 + 7.
        let deck = scripted_deck(&[
            card(ACE, 0),
            card(TEN, 1),
            card(8, 2),
            card(6, 3),
        ]);
        let deal = table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(100), 0, deck)
            .await
            .unwrap();
        match deal {
            Deal::Settled(outcome) => {
                assert_eq!(outcome.settlement, Settlement::Blackjack);
                assert_eq!(outcome.profit, 150);
                assert_eq!(outcome.credited, 250);
                assert_eq!(outcome.new_wallet, 1_150);
            }
            other => panic!("expected settled deal, got {other:?}"),
        }
        assert!(!table.is_playing(&user).await);
    }

    #[tokio::test]
    async fn bust_forfeits_the_stake() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;
        let table = Table::new();

        // Player 10 + 9, dealer 7 + 8, hit card 10 -> bust.
        let deck = scripted_deck(&[
            card(TEN, 0),
            card(8, 1),
            card(6, 2),
            card(7, 3),
            card(TEN, 1),
        ]);
        table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(200), 0, deck)
            .await
            .unwrap();
        let turn = table.act(&store, &user, Action::Hit, 10).await.unwrap();
        match turn {
            Turn::Settled(outcome) => {
                assert_eq!(outcome.settlement, Settlement::Lose);
                assert_eq!(outcome.credited, 0);
                assert_eq!(outcome.new_wallet, 800);
            }
            other => panic!("expected settled, got {other:?}"),
        }
        assert!(!table.is_playing(&user).await);
    }

    #[tokio::test]
    async fn dealer_redraws_soft_seventeen() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;
        let table = Table::new();

        // Player 10 + 9 (19, stands). Dealer A + 6 = soft 17, must redraw;
        // next card 4 makes hard 21 -> player loses.
        let deck = scripted_deck(&[
            card(TEN, 0),
            card(8, 1),
            card(ACE, 2),
            card(5, 3),
            card(3, 1),
        ]);
        table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(100), 0, deck)
            .await
            .unwrap();
        let turn = table.act(&store, &user, Action::Stand, 10).await.unwrap();
        match turn {
            Turn::Settled(outcome) => {
                assert_eq!(outcome.settlement, Settlement::Lose);
                assert_eq!(outcome.dealer.len(), 3);
            }
            other => panic!("expected settled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn push_refunds_the_stake() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 500).await;
        let table = Table::new();

        // Player 10 + 9 = 19; dealer 10 + 9 = 19.
        let deck = scripted_deck(&[
            card(TEN, 0),
            card(8, 1),
            card(TEN, 2),
            card(8, 3),
        ]);
        table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(500), 0, deck)
            .await
            .unwrap();
        let turn = table.act(&store, &user, Action::Stand, 10).await.unwrap();
        match turn {
            Turn::Settled(outcome) => {
                assert_eq!(outcome.settlement, Settlement::Push);
                assert_eq!(outcome.new_wallet, 500);
            }
            other => panic!("expected settled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn double_debits_extra_and_wins_on_full_stake() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 300).await;
        let table = Table::new();

        // Player 5 + 6 = 11; double draws 10 -> 21. Dealer 10 + 8 = 18.
        let deck = scripted_deck(&[
            card(4, 0),
            card(5, 1),
            card(TEN, 2),
            card(7, 3),
            card(TEN, 1),
        ]);
        table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(100), 0, deck)
            .await
            .unwrap();
        let turn = table.act(&store, &user, Action::Double, 10).await.unwrap();
        match turn {
            Turn::Settled(outcome) => {
                assert_eq!(outcome.settlement, Settlement::Win);
                assert_eq!(outcome.stake, 200);
                assert_eq!(outcome.profit, 200);
                assert_eq!(outcome.credited, 400);
                // 300 - 100 - 100 + 400
                assert_eq!(outcome.new_wallet, 500);
            }
            other => panic!("expected settled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_double_disables_doubling_but_keeps_playing() {
        let store = MemoryStore::new();
        // Exactly the bet: nothing left for the double.
        let user = funded(&store, "u1", 100).await;
        let table = Table::new();

        let deck = scripted_deck(&[
            card(4, 0),
            card(5, 1),
            card(TEN, 2),
            card(7, 3),
            card(TEN, 1),
            card(2, 1),
        ]);
        table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(100), 0, deck)
            .await
            .unwrap();
        let turn = table.act(&store, &user, Action::Double, 10).await.unwrap();
        match turn {
            Turn::DoubleRefused(view) => {
                assert!(!view.can_double);
                assert_eq!(view.stake, 100);
            }
            other => panic!("expected refusal, got {other:?}"),
        }
        // A second double is an invalid move now.
        let err = table
            .act(&store, &user, Action::Double, 20)
            .await
            .unwrap_err();
        assert_eq!(err, EconomyError::InvalidMove);
        assert!(table.is_playing(&user).await);
    }

    #[tokio::test]
    async fn only_one_game_per_user() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;
        let table = Table::new();
        let deck = scripted_deck(&[
            card(4, 0),
            card(5, 1),
            card(TEN, 2),
            card(7, 3),
        ]);
        table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(100), 0, deck.clone())
            .await
            .unwrap();
        let err = table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(100), 0, deck)
            .await
            .unwrap_err();
        assert_eq!(err, EconomyError::GameInProgress);
    }

    #[tokio::test]
    async fn timeout_stands_and_duplicate_firings_are_noops() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;
        let table = Table::new();

        // Player 10 + 9 = 19; dealer 10 + 8 = 18 -> timeout stand wins.
        let deck = scripted_deck(&[
            card(TEN, 0),
            card(8, 1),
            card(TEN, 2),
            card(7, 3),
        ]);
        table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(100), 0, deck)
            .await
            .unwrap();

        // Not due yet.
        assert_eq!(
            table.expire(&store, &user, TURN_TIMEOUT_MS - 1).await.unwrap(),
            None
        );

        let outcome = table
            .expire(&store, &user, TURN_TIMEOUT_MS)
            .await
            .unwrap()
            .expect("due game must settle");
        assert_eq!(outcome.settlement, Settlement::Win);
        assert_eq!(outcome.new_wallet, 1_100);

        // Late duplicate firing: settlement must not be applied twice.
        assert_eq!(
            table.expire(&store, &user, TURN_TIMEOUT_MS + 1).await.unwrap(),
            None
        );
        assert_eq!(
            store.get(&user).await.unwrap().unwrap().wallet,
            1_100
        );
    }

    #[tokio::test]
    async fn coin_multiplier_scales_profit_only() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 1_000).await;
        store
            .apply_if(&user, |account| {
                account.coin_multiplier = 2.0;
                Ok(())
            })
            .await
            .unwrap();
        let table = Table::new();

        // Player 10 + 9 = 19; dealer 10 + 8 = 18 -> win.
        let deck = scripted_deck(&[
            card(TEN, 0),
            card(8, 1),
            card(TEN, 2),
            card(7, 3),
        ]);
        table
            .start_with_deck(&store, &user, "u1", AmountSpec::Exact(100), 0, deck)
            .await
            .unwrap();
        let turn = table.act(&store, &user, Action::Stand, 10).await.unwrap();
        match turn {
            Turn::Settled(outcome) => {
                assert_eq!(outcome.profit, 200);
                assert_eq!(outcome.credited, 300);
                assert_eq!(outcome.new_wallet, 1_200);
            }
            other => panic!("expected settled, got {other:?}"),
        }
    }
}
