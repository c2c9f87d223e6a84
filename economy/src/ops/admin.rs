//! Privileged operations behind an id allow-list.
//!
//! Admin edits ensure the target exists and run through the same guarded
//! primitives as user-initiated operations: there is no privileged bypass
//! of the non-negativity or capacity invariants. Balance targets go through
//! the closed [`BalanceKind`] enum, never a field name.

use crate::store::Store;
use pixelvault_types::{Account, BalanceKind, EconomyError, UserId};
use std::collections::HashSet;
use tracing::info;

const MULTIPLIER_MIN: f64 = 0.0;
const MULTIPLIER_MAX: f64 = 100.0;

/// Allow-list of privileged identities, with an optional owner override.
#[derive(Clone, Debug, Default)]
pub struct AdminList {
    ids: HashSet<UserId>,
    owner: Option<UserId>,
}

impl AdminList {
    pub fn new(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn is_admin(&self, id: &UserId) -> bool {
        self.owner.as_ref() == Some(id) || self.ids.contains(id)
    }

    fn authorize(&self, id: &UserId) -> Result<(), EconomyError> {
        if self.is_admin(id) {
            Ok(())
        } else {
            Err(EconomyError::Unauthorized)
        }
    }
}

/// Stats an admin may edit directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminStat {
    Xp,
    Level,
    JobLevel,
    Coins(BalanceKind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownKind {
    Daily,
    Steal,
    VaultRob,
}

fn write_stat(account: &mut Account, stat: AdminStat, value: u64) -> Result<(), EconomyError> {
    match stat {
        AdminStat::Xp => account.xp = value,
        AdminStat::Level => account.level = value.min(u32::MAX as u64) as u32,
        AdminStat::JobLevel => account.job_level = (value.min(u32::MAX as u64) as u32).max(1),
        AdminStat::Coins(BalanceKind::Wallet) => account.wallet = value,
        AdminStat::Coins(BalanceKind::Bank) => {
            // Even admins cannot push the bank past its capacity.
            if value > account.bank_limit {
                return Err(EconomyError::BankFull {
                    space: account.bank_space(),
                });
            }
            account.bank = value;
        }
    }
    Ok(())
}

fn read_stat(account: &Account, stat: AdminStat) -> u64 {
    match stat {
        AdminStat::Xp => account.xp,
        AdminStat::Level => account.level as u64,
        AdminStat::JobLevel => account.job_level as u64,
        AdminStat::Coins(kind) => account.balance(kind),
    }
}

/// Set a stat to an absolute value.
pub async fn edit_stat<S: Store>(
    store: &S,
    admins: &AdminList,
    caller: &UserId,
    target: &UserId,
    target_name: &str,
    stat: AdminStat,
    value: u64,
) -> Result<Account, EconomyError> {
    admins.authorize(caller)?;
    store.ensure(target, target_name).await?;
    let (account, _) = store
        .apply_if(target, |account| write_stat(account, stat, value))
        .await?;
    info!(admin = %caller, target = %target, ?stat, value, "admin stat edit");
    Ok(account)
}

/// Add to a stat, saturating; bank additions clamp at capacity.
pub async fn add_stat<S: Store>(
    store: &S,
    admins: &AdminList,
    caller: &UserId,
    target: &UserId,
    target_name: &str,
    stat: AdminStat,
    amount: u64,
) -> Result<Account, EconomyError> {
    admins.authorize(caller)?;
    store.ensure(target, target_name).await?;
    let (account, _) = store
        .apply_if(target, |account| {
            let current = read_stat(account, stat);
            let mut next = current.saturating_add(amount);
            if stat == AdminStat::Coins(BalanceKind::Bank) {
                next = next.min(account.bank_limit);
            }
            write_stat(account, stat, next)
        })
        .await?;
    info!(admin = %caller, target = %target, ?stat, amount, "admin stat add");
    Ok(account)
}

pub async fn reset_cooldown<S: Store>(
    store: &S,
    admins: &AdminList,
    caller: &UserId,
    target: &UserId,
    target_name: &str,
    which: CooldownKind,
) -> Result<Account, EconomyError> {
    admins.authorize(caller)?;
    store.ensure(target, target_name).await?;
    let (account, _) = store
        .apply_if(target, |account| {
            match which {
                CooldownKind::Daily => account.last_daily = 0,
                CooldownKind::Steal => account.last_steal = 0,
                CooldownKind::VaultRob => account.last_vaultrob = 0,
            }
            Ok(())
        })
        .await?;
    Ok(account)
}

/// Set one or both multipliers, clamped to a sane range. `None` leaves the
/// multiplier untouched.
pub async fn set_multipliers<S: Store>(
    store: &S,
    admins: &AdminList,
    caller: &UserId,
    target: &UserId,
    target_name: &str,
    xp: Option<f64>,
    coin: Option<f64>,
) -> Result<Account, EconomyError> {
    admins.authorize(caller)?;
    store.ensure(target, target_name).await?;
    let (account, _) = store
        .apply_if(target, |account| {
            if let Some(xp) = xp {
                if !xp.is_finite() {
                    return Err(EconomyError::InvalidAmount);
                }
                account.xp_multiplier = xp.clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);
            }
            if let Some(coin) = coin {
                if !coin.is_finite() {
                    return Err(EconomyError::InvalidAmount);
                }
                account.coin_multiplier = coin.clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);
            }
            Ok(())
        })
        .await?;
    info!(admin = %caller, target = %target, ?xp, ?coin, "admin multiplier update");
    Ok(account)
}

/// Reset both multipliers back to 1.0.
pub async fn reset_multipliers<S: Store>(
    store: &S,
    admins: &AdminList,
    caller: &UserId,
    target: &UserId,
    target_name: &str,
) -> Result<Account, EconomyError> {
    set_multipliers(store, admins, caller, target, target_name, Some(1.0), Some(1.0)).await
}
