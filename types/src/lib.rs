pub mod account;
pub mod error;
pub mod lottery;

pub use account::{Account, BalanceKind, ItemKey, UserId};
pub use error::EconomyError;
pub use lottery::{
    LotteryRound, PrizeSplits, RoundId, RoundStatus, Ticket, TicketCode, WinRecord,
};
