//! The 6-digit lottery: round lifecycle, serialized ticket purchases, and
//! the atomic draw with rollover.
//!
//! Purchases by the same user in the same round serialize on a per-
//! (round, user) key lock so a rapid double-submission cannot overshoot the
//! ticket cap, while unrelated users proceed concurrently. The draw closes
//! the current round and opens exactly one successor inside a single
//! critical section, so no observer ever sees zero or two open rounds.

use crate::store::Store;
use crate::vault;
use pixelvault_types::lottery::{
    CODE_LEN, MAX_TICKETS_PER_USER, POT_SHARE_DEN, POT_SHARE_NUM, TICKET_PRICE,
};
use pixelvault_types::{
    EconomyError, LotteryRound, PrizeSplits, RoundId, RoundStatus, Ticket, TicketCode, UserId,
    WinRecord,
};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ops::admin::AdminList;

#[derive(Default)]
struct Inner {
    next_round: u64,
    next_ticket: u64,
    rounds: Vec<LotteryRound>,
    tickets: HashMap<RoundId, Vec<Ticket>>,
    wins: Vec<WinRecord>,
}

impl Inner {
    fn open_round(&self) -> Option<&LotteryRound> {
        self.rounds.iter().rev().find(|round| round.is_open())
    }

    fn open_round_mut(&mut self) -> Option<&mut LotteryRound> {
        self.rounds.iter_mut().rev().find(|round| round.is_open())
    }

    fn ensure_open(&mut self, now_ms: u64) -> LotteryRound {
        if let Some(round) = self.open_round() {
            return round.clone();
        }
        self.next_round += 1;
        let round = LotteryRound::open(RoundId(self.next_round), 0, now_ms);
        info!(round = %round.id, "opened lottery round");
        self.rounds.push(round.clone());
        round
    }

    fn held_by(&self, round: RoundId, user: &UserId) -> u32 {
        self.tickets
            .get(&round)
            .map(|tickets| tickets.iter().filter(|t| &t.owner == user).count() as u32)
            .unwrap_or(0)
    }
}

/// What the caller asked to buy.
#[derive(Clone, Debug)]
pub enum BuyRequest {
    /// Exactly one ticket at a chosen code.
    Code(String),
    /// Up to this many tickets at random codes.
    Random(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub round: RoundId,
    pub tickets: Vec<Ticket>,
    pub total_cost: u64,
    pub pot_contribution: u64,
    pub held_now: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawSummary {
    pub round: RoundId,
    pub winning_code: TicketCode,
    pub pot_total: u64,
    pub paid_out: u64,
    pub rollover: u64,
    pub winners_match6: u32,
    pub winners_match5: u32,
    pub winners_match4: u32,
    pub next_round: RoundId,
}

#[derive(Clone, Copy, Debug)]
pub enum PotAdjustment {
    Set(u64),
    Add(u64),
}

pub struct Lottery {
    inner: Mutex<Inner>,
    buy_locks: Mutex<HashMap<(RoundId, UserId), Arc<Mutex<()>>>>,
}

impl Default for Lottery {
    fn default() -> Self {
        Self::new()
    }
}

impl Lottery {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            buy_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The current open round, creating one when none exists. Idempotent.
    pub async fn ensure_open(&self, now_ms: u64) -> LotteryRound {
        self.inner.lock().await.ensure_open(now_ms)
    }

    pub async fn open_round(&self) -> Option<LotteryRound> {
        self.inner.lock().await.open_round().cloned()
    }

    pub async fn recent_results(&self, limit: usize) -> Vec<LotteryRound> {
        let inner = self.inner.lock().await;
        inner
            .rounds
            .iter()
            .rev()
            .filter(|round| round.status == RoundStatus::Drawn)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn tickets_of(&self, round: RoundId, user: &UserId) -> Vec<Ticket> {
        let inner = self.inner.lock().await;
        inner
            .tickets
            .get(&round)
            .map(|tickets| {
                tickets
                    .iter()
                    .filter(|t| &t.owner == user)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn ticket_count(&self, round: RoundId) -> usize {
        let inner = self.inner.lock().await;
        inner.tickets.get(&round).map(Vec::len).unwrap_or(0)
    }

    pub async fn wins_of(&self, user: &UserId) -> Vec<WinRecord> {
        let inner = self.inner.lock().await;
        inner
            .wins
            .iter()
            .filter(|win| &win.user == user)
            .cloned()
            .collect()
    }

    async fn buy_lock(&self, round: RoundId, user: &UserId) -> Arc<Mutex<()>> {
        let mut locks = self.buy_locks.lock().await;
        locks
            .entry((round, user.clone()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Buy tickets in the open round.
    ///
    /// Inside the per-(round, user) serialization window: the request is
    /// reduced first by the remaining cap, then by affordability; the total
    /// cost is debited under a wallet guard; the tickets are inserted and
    /// the pot grows by the non-house share. A reduction to zero charges
    /// nothing and reports the blocking reason.
    pub async fn buy<S: Store>(
        &self,
        store: &S,
        actor: &UserId,
        display_name: &str,
        request: BuyRequest,
        now_ms: u64,
        rng: &mut impl Rng,
    ) -> Result<PurchaseReceipt, EconomyError> {
        let account = store.ensure(actor, display_name).await?;
        let round = self.ensure_open(now_ms).await;

        let key_lock = self.buy_lock(round.id, actor).await;
        let _guard = key_lock.lock().await;

        let held = {
            let inner = self.inner.lock().await;
            inner.held_by(round.id, actor)
        };
        let remaining = MAX_TICKETS_PER_USER.saturating_sub(held);
        if remaining == 0 {
            return Err(EconomyError::CapReached {
                held,
                max: MAX_TICKETS_PER_USER,
            });
        }

        let codes: Vec<TicketCode> = match request {
            BuyRequest::Code(raw) => {
                let code = TicketCode::normalize(&raw).ok_or(EconomyError::InvalidCode)?;
                vec![code]
            }
            BuyRequest::Random(amount) => {
                if amount == 0 {
                    return Err(EconomyError::InvalidAmount);
                }
                let affordable =
                    (account.wallet / TICKET_PRICE).min(u32::MAX as u64) as u32;
                let can_buy = amount.min(remaining).min(affordable);
                if can_buy == 0 {
                    // affordable == 0 here; the cap case bailed above.
                    return Err(EconomyError::InsufficientFunds {
                        needed: TICKET_PRICE,
                        available: account.wallet,
                    });
                }
                (0..can_buy).map(|_| TicketCode::random(rng)).collect()
            }
        };

        let total_cost = TICKET_PRICE * codes.len() as u64;
        store
            .apply_if(actor, |account| {
                if account.wallet < total_cost {
                    return Err(EconomyError::InsufficientFunds {
                        needed: total_cost,
                        available: account.wallet,
                    });
                }
                account.wallet -= total_cost;
                Ok(())
            })
            .await?;

        let pot_contribution = total_cost * POT_SHARE_NUM / POT_SHARE_DEN;
        let mut inner = self.inner.lock().await;
        let still_open = inner
            .open_round()
            .map(|open| open.id == round.id)
            .unwrap_or(false);
        if !still_open {
            // The round was drawn while we were paying; undo the debit.
            drop(inner);
            if let Err(reason) = store
                .apply_if(actor, |account| {
                    account.wallet = account.wallet.saturating_add(total_cost);
                    Ok(())
                })
                .await
            {
                warn!(user = %actor, %reason, total_cost, "failed to refund closed-round purchase");
            }
            return Err(EconomyError::RoundClosed);
        }

        let mut tickets = Vec::with_capacity(codes.len());
        for code in codes {
            inner.next_ticket += 1;
            tickets.push(Ticket {
                id: inner.next_ticket,
                round: round.id,
                owner: actor.clone(),
                code,
                created_at: now_ms,
            });
        }
        inner
            .tickets
            .entry(round.id)
            .or_default()
            .extend(tickets.iter().cloned());
        if let Some(open) = inner.open_round_mut() {
            open.pot = open.pot.saturating_add(pot_contribution);
        }
        let held_now = inner.held_by(round.id, actor);
        drop(inner);

        Ok(PurchaseReceipt {
            round: round.id,
            tickets,
            total_cost,
            pot_contribution,
            held_now,
        })
    }

    /// Draw the open round (admin only).
    ///
    /// Runs at most once per round: everything from loading tickets to
    /// opening the successor happens under the same lock, and winners are
    /// paid before the lock is released.
    pub async fn draw<S: Store>(
        &self,
        store: &S,
        admins: &AdminList,
        caller: &UserId,
        now_ms: u64,
        rng: &mut impl Rng,
    ) -> Result<DrawSummary, EconomyError> {
        if !admins.is_admin(caller) {
            return Err(EconomyError::Unauthorized);
        }

        let mut inner = self.inner.lock().await;
        let round = inner.open_round().cloned().ok_or(EconomyError::NoOpenRound)?;

        let winning_code = round
            .planned_code
            .clone()
            .unwrap_or_else(|| TicketCode::random(rng));

        let tickets = inner.tickets.get(&round.id).cloned().unwrap_or_default();
        let mut tiers: [Vec<&Ticket>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for ticket in &tickets {
            match ticket.code.matches(&winning_code) {
                6 => tiers[0].push(ticket),
                5 => tiers[1].push(ticket),
                4 => tiers[2].push(ticket),
                _ => {}
            }
        }

        let splits = round.splits();
        let pot_total = round.pot.saturating_add(round.rollover);
        let mut paid_out: u64 = 0;
        let mut new_wins: Vec<WinRecord> = Vec::new();

        for (tier_index, match_count) in [(0usize, 6u32), (1, 5), (2, 4)] {
            let winners = &tiers[tier_index];
            if winners.is_empty() {
                continue;
            }
            let pool = (pot_total as f64 * splits.share_for(match_count)).floor() as u64;
            if pool == 0 {
                continue;
            }
            // Floor split, but never pay a zero-value "win".
            let each = (pool / winners.len() as u64).max(1);
            for ticket in winners.iter() {
                let credit = store
                    .apply_if(&ticket.owner, |account| {
                        account.wallet = account.wallet.saturating_add(each);
                        Ok(())
                    })
                    .await;
                if let Err(reason) = credit {
                    warn!(
                        user = %ticket.owner,
                        %reason,
                        prize = each,
                        "failed to credit lottery winner"
                    );
                    continue;
                }
                paid_out += each;
                new_wins.push(WinRecord {
                    round: round.id,
                    user: ticket.owner.clone(),
                    ticket: ticket.id,
                    prize: each,
                    matches: match_count,
                    created_at: now_ms,
                });
            }
        }

        let rollover = pot_total.saturating_sub(paid_out);
        let (winners6, winners5, winners4) = (
            tiers[0].len() as u32,
            tiers[1].len() as u32,
            tiers[2].len() as u32,
        );

        inner.wins.extend(new_wins);
        if let Some(open) = inner.open_round_mut() {
            open.status = RoundStatus::Drawn;
            open.draw_code = Some(winning_code.clone());
            open.paid_out = paid_out;
            open.planned_code = None;
            open.override_splits = None;
            open.rollover = 0;
            open.closed_at = now_ms;
        }

        inner.next_round += 1;
        let next = LotteryRound::open(RoundId(inner.next_round), rollover, now_ms);
        let next_id = next.id;
        inner.rounds.push(next);
        drop(inner);

        // Purchase locks for the closed round can never be used again.
        self.buy_locks
            .lock()
            .await
            .retain(|(round_id, _), _| *round_id != round.id);

        info!(
            round = %round.id,
            code = %winning_code,
            pot_total,
            paid_out,
            rollover,
            "lottery round drawn"
        );

        Ok(DrawSummary {
            round: round.id,
            winning_code,
            pot_total,
            paid_out,
            rollover,
            winners_match6: winners6,
            winners_match5: winners5,
            winners_match4: winners4,
            next_round: next_id,
        })
    }

    /// Set or clear the planned winning code of the open round (admin).
    pub async fn set_planned_code(
        &self,
        admins: &AdminList,
        caller: &UserId,
        code: Option<&str>,
    ) -> Result<Option<TicketCode>, EconomyError> {
        if !admins.is_admin(caller) {
            return Err(EconomyError::Unauthorized);
        }
        let mut inner = self.inner.lock().await;
        let round = inner.open_round_mut().ok_or(EconomyError::NoOpenRound)?;
        let normalized = match code {
            Some(raw) => Some(TicketCode::normalize(raw).ok_or(EconomyError::InvalidCode)?),
            None => None,
        };
        round.planned_code = normalized.clone();
        Ok(normalized)
    }

    /// Set or add to the open round's pot (admin).
    pub async fn set_pot(
        &self,
        admins: &AdminList,
        caller: &UserId,
        adjustment: PotAdjustment,
    ) -> Result<u64, EconomyError> {
        if !admins.is_admin(caller) {
            return Err(EconomyError::Unauthorized);
        }
        let mut inner = self.inner.lock().await;
        let round = inner.open_round_mut().ok_or(EconomyError::NoOpenRound)?;
        round.pot = match adjustment {
            PotAdjustment::Set(amount) => amount,
            PotAdjustment::Add(amount) => round.pot.saturating_add(amount),
        };
        Ok(round.pot)
    }

    /// Override the prize splits of the open round (admin). Accepts either
    /// fractions or percentages per share.
    pub async fn set_splits(
        &self,
        admins: &AdminList,
        caller: &UserId,
        match6: f64,
        match5: f64,
        match4: f64,
    ) -> Result<PrizeSplits, EconomyError> {
        if !admins.is_admin(caller) {
            return Err(EconomyError::Unauthorized);
        }
        let normalize = |share: f64| -> Option<f64> {
            if !share.is_finite() || share < 0.0 {
                return None;
            }
            Some(if share > 1.0 { share / 100.0 } else { share })
        };
        let splits = PrizeSplits {
            share_match6: normalize(match6).ok_or(EconomyError::InvalidSplits)?,
            share_match5: normalize(match5).ok_or(EconomyError::InvalidSplits)?,
            share_match4: normalize(match4).ok_or(EconomyError::InvalidSplits)?,
        };
        if !splits.is_valid() {
            return Err(EconomyError::InvalidSplits);
        }
        let mut inner = self.inner.lock().await;
        let round = inner.open_round_mut().ok_or(EconomyError::NoOpenRound)?;
        round.override_splits = Some(splits);
        Ok(splits)
    }

    /// Number of digits callers should collect for a custom code.
    pub fn code_len() -> usize {
        CODE_LEN
    }
}
