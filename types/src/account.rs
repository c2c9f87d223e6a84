use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved identity of the house/tax account.
pub const VAULT_ID: &str = "BOT_BANK";

/// Display name used when the vault account is lazily created.
pub const VAULT_NAME: &str = "Bot Vault";

/// Bank capacity every new account starts with.
pub const INITIAL_BANK_LIMIT: u64 = 200_000;

/// Bank capacity can never be upgraded past this.
pub const BANK_HARD_CAP: u64 = 2_000_000;

/// Maximum display-name length accepted on upsert.
pub const MAX_NAME_LENGTH: usize = 32;

/// Stable, platform-assigned user identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity of the singleton vault account.
    pub fn vault() -> Self {
        Self(VAULT_ID.to_string())
    }

    pub fn is_vault(&self) -> bool {
        self.0 == VAULT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Inventory items. Flag items carry a maximum count; stack items accumulate
/// without bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemKey {
    /// +5% steal success chance. Not consumed.
    Gloves,
    /// Halves fines when caught. Not consumed.
    Boots,
    /// Doubles the next successful vault robbery, consumed on use.
    MasterKey,
}

impl ItemKey {
    /// Maximum count a user may hold, or `None` for stackable items.
    pub fn max_count(self) -> Option<u32> {
        match self {
            ItemKey::Gloves => Some(1),
            ItemKey::Boots => Some(1),
            ItemKey::MasterKey => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemKey::Gloves => "Gloves",
            ItemKey::Boots => "Silent Boots",
            ItemKey::MasterKey => "Master Key",
        }
    }
}

/// The two balance stores an operation may target. Runtime selection always
/// goes through this enum; there is no string-keyed field access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceKind {
    Wallet,
    Bank,
}

impl BalanceKind {
    pub fn label(self) -> &'static str {
        match self {
            BalanceKind::Wallet => "wallet",
            BalanceKind::Bank => "bank",
        }
    }
}

/// Per-user persisted economic record.
///
/// Invariants after every committed operation: `bank <= bank_limit`, and all
/// balances are non-negative by construction (`u64`). Marriage is symmetric:
/// `a.married_to == Some(b)` implies `b.married_to == Some(a)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub display_name: String,

    pub wallet: u64,
    pub bank: u64,
    pub bank_limit: u64,

    pub level: u32,
    pub xp: u64,
    pub job_level: u32,

    pub xp_multiplier: f64,
    pub coin_multiplier: f64,

    /// Epoch-millisecond cooldown stamps, 0 = never.
    pub last_daily: u64,
    pub last_steal: u64,
    pub last_vaultrob: u64,

    pub interact_count: u64,
    pub items: BTreeMap<ItemKey, u32>,

    pub married_to: Option<UserId>,
    pub couple_streak: u32,
    pub couple_last_claim: u64,
    pub couple_anniv: u64,
    pub couple_title: Option<String>,
}

impl Account {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            wallet: 0,
            bank: 0,
            bank_limit: INITIAL_BANK_LIMIT,
            level: 1,
            xp: 0,
            job_level: 1,
            xp_multiplier: 1.0,
            coin_multiplier: 1.0,
            last_daily: 0,
            last_steal: 0,
            last_vaultrob: 0,
            interact_count: 0,
            items: BTreeMap::new(),
            married_to: None,
            couple_streak: 0,
            couple_last_claim: 0,
            couple_anniv: 0,
            couple_title: None,
        }
    }

    pub fn balance(&self, kind: BalanceKind) -> u64 {
        match kind {
            BalanceKind::Wallet => self.wallet,
            BalanceKind::Bank => self.bank,
        }
    }

    pub fn balance_mut(&mut self, kind: BalanceKind) -> &mut u64 {
        match kind {
            BalanceKind::Wallet => &mut self.wallet,
            BalanceKind::Bank => &mut self.bank,
        }
    }

    /// Remaining bank capacity.
    pub fn bank_space(&self) -> u64 {
        self.bank_limit.saturating_sub(self.bank)
    }

    pub fn item_count(&self, item: ItemKey) -> u32 {
        self.items.get(&item).copied().unwrap_or(0)
    }

    pub fn has_item(&self, item: ItemKey) -> bool {
        self.item_count(item) > 0
    }

    pub fn grant_item(&mut self, item: ItemKey) {
        *self.items.entry(item).or_insert(0) += 1;
    }

    /// Remove one of `item`, if held. Returns whether anything was consumed.
    pub fn consume_item(&mut self, item: ItemKey) -> bool {
        match self.items.get_mut(&item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.items.remove(&item);
                }
                true
            }
            _ => false,
        }
    }
}
