use crate::account::ItemKey;
use thiserror::Error;

/// Expected failure modes of economy operations.
///
/// These are returned by value and pattern-matched by the presentation layer;
/// they never cross the boundary as panics. Guard failures and race losses
/// are indistinguishable at the storage layer, so both surface as the typed
/// reason computed against the row state seen at write time.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EconomyError {
    #[error("amount must be a positive whole number")]
    InvalidAmount,

    #[error("operation cannot target yourself")]
    SelfTarget,

    #[error("target is not eligible for this operation")]
    IneligibleTarget,

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("bank is full: only {space} of capacity left")]
    BankFull { space: u64 },

    #[error("bank capacity is already at the maximum")]
    BankLimitMaxed,

    #[error("ticket cap reached: holding {held} of {max}")]
    CapReached { held: u32, max: u32 },

    #[error("cooldown active until {ready_at}")]
    CooldownActive { ready_at: u64 },

    #[error("{} already at its maximum count", item.label())]
    AlreadyOwned { item: ItemKey },

    #[error("one of the parties is already married")]
    AlreadyMarried,

    #[error("not married")]
    NotMarried,

    #[error("no proposal pending")]
    NoProposal,

    #[error("the other party is no longer available")]
    NoLongerAvailable,

    #[error("title must contain something other than spaces and dashes")]
    InvalidTitle,

    #[error("ticket code must contain digits")]
    InvalidCode,

    #[error("prize splits must be non-negative and sum to at most 100%")]
    InvalidSplits,

    #[error("no open lottery round")]
    NoOpenRound,

    #[error("lottery round is already closed")]
    RoundClosed,

    #[error("target has nothing worth stealing")]
    NothingToSteal,

    #[error("the vault holds less than {minimum}")]
    VaultTooSmall { minimum: u64 },

    #[error("a game is already in progress")]
    GameInProgress,

    #[error("no active game")]
    NoActiveGame,

    #[error("action not allowed in the current game state")]
    InvalidMove,

    #[error("not authorized")]
    Unauthorized,

    #[error("account not found")]
    NotFound,

    #[error("storage failure: {0}")]
    Storage(String),
}

impl EconomyError {
    /// Whether the failure is a transient race/storage condition the user can
    /// simply retry, as opposed to a durable refusal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EconomyError::Storage(_))
    }
}
