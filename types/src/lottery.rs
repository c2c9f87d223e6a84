use crate::account::UserId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Price of a single ticket.
pub const TICKET_PRICE: u64 = 500;

/// Digits in a ticket code.
pub const CODE_LEN: usize = 6;

/// Per-user, per-round ticket cap.
pub const MAX_TICKETS_PER_USER: u32 = 100;

/// Share of ticket revenue that flows into the pot (the house keeps the
/// remainder), as an integer ratio.
pub const POT_SHARE_NUM: u64 = 9;
pub const POT_SHARE_DEN: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(pub u64);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Open,
    Drawn,
}

/// A fixed-width numeric ticket code, always exactly [`CODE_LEN`] digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketCode(String);

impl TicketCode {
    /// Normalize arbitrary input: strip non-digits, keep the last
    /// [`CODE_LEN`] digits, left-pad with zeros. Returns `None` when the
    /// input contains no digits at all.
    pub fn normalize(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let tail: String = if digits.len() > CODE_LEN {
            digits[digits.len() - CODE_LEN..].to_string()
        } else {
            digits
        };
        Some(Self(format!("{:0>width$}", tail, width = CODE_LEN)))
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        let mut code = String::with_capacity(CODE_LEN);
        for _ in 0..CODE_LEN {
            code.push(char::from(b'0' + rng.gen_range(0..10u8)));
        }
        Self(code)
    }

    /// Count of positions where both codes carry the same digit.
    pub fn matches(&self, winning: &TicketCode) -> u32 {
        self.0
            .bytes()
            .zip(winning.0.bytes())
            .filter(|(a, b)| a == b)
            .count() as u32
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fraction of the pot paid to each exact-position match tier.
///
/// The highest match count always carries the largest share. Shares are
/// validated to be non-negative and sum to at most 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrizeSplits {
    pub share_match6: f64,
    pub share_match5: f64,
    pub share_match4: f64,
}

impl Default for PrizeSplits {
    fn default() -> Self {
        Self {
            share_match6: 0.75,
            share_match5: 0.20,
            share_match4: 0.05,
        }
    }
}

impl PrizeSplits {
    pub fn is_valid(&self) -> bool {
        let shares = [self.share_match6, self.share_match5, self.share_match4];
        shares.iter().all(|s| s.is_finite() && *s >= 0.0)
            && shares.iter().sum::<f64>() <= 1.0001
    }

    /// Share for an exact-position match count; tiers below 4 pay nothing.
    pub fn share_for(&self, matches: u32) -> f64 {
        match matches {
            6 => self.share_match6,
            5 => self.share_match5,
            4 => self.share_match4,
            _ => 0.0,
        }
    }
}

/// One sales-and-draw cycle. Exactly one round is `Open` at any time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LotteryRound {
    pub id: RoundId,
    pub status: RoundStatus,
    pub pot: u64,
    pub rollover: u64,
    pub planned_code: Option<TicketCode>,
    pub override_splits: Option<PrizeSplits>,
    pub draw_code: Option<TicketCode>,
    pub paid_out: u64,
    pub created_at: u64,
    pub closed_at: u64,
}

impl LotteryRound {
    pub fn open(id: RoundId, starting_pot: u64, now: u64) -> Self {
        Self {
            id,
            status: RoundStatus::Open,
            pot: starting_pot,
            rollover: 0,
            planned_code: None,
            override_splits: None,
            draw_code: None,
            paid_out: 0,
            created_at: now,
            closed_at: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }

    pub fn splits(&self) -> PrizeSplits {
        self.override_splits.unwrap_or_default()
    }
}

/// A purchased ticket. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub round: RoundId,
    pub owner: UserId,
    pub code: TicketCode,
    pub created_at: u64,
}

/// Audit record of a single payout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinRecord {
    pub round: RoundId,
    pub user: UserId,
    pub ticket: u64,
    pub prize: u64,
    pub matches: u32,
    pub created_at: u64,
}
