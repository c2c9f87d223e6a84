//! Shop purchases: tiered bank upgrades, job upgrades, flag and stack
//! items.
//!
//! Every path computes its price and applies the charge inside the same
//! guarded step, so the price cannot move between check and charge.

use crate::store::Store;
use pixelvault_types::account::{BANK_HARD_CAP, INITIAL_BANK_LIMIT};
use pixelvault_types::{Account, EconomyError, ItemKey, UserId};

/// Capacity added per bank upgrade.
pub const BANK_STEP: u64 = 50_000;

/// First upgrade price; each tier costs 15% more.
pub const BANK_BASE_PRICE: u64 = 75_000;
pub const BANK_GROWTH: f64 = 1.15;

/// Job upgrade price per current level.
pub const JOB_PRICE_PER_LEVEL: u64 = 500;

pub fn item_price(item: ItemKey) -> u64 {
    match item {
        ItemKey::Gloves => 35_000,
        ItemKey::Boots => 30_000,
        ItemKey::MasterKey => 25_000,
    }
}

/// Upgrade tier implied by the current capacity.
pub fn bank_tier(bank_limit: u64) -> u32 {
    (bank_limit.saturating_sub(INITIAL_BANK_LIMIT) / BANK_STEP) as u32
}

/// Price of the next capacity upgrade: `base * growth^tier`, rounded up.
pub fn bank_upgrade_price(bank_limit: u64) -> u64 {
    let tier = bank_tier(bank_limit);
    (BANK_BASE_PRICE as f64 * BANK_GROWTH.powi(tier as i32)).ceil() as u64
}

#[derive(Clone, Debug, PartialEq)]
pub struct PurchaseOutcome {
    pub charged: u64,
    pub account: Account,
}

pub async fn buy_bank_upgrade<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
) -> Result<PurchaseOutcome, EconomyError> {
    store.ensure(actor, display_name).await?;
    let (account, charged) = store
        .apply_if(actor, |account| {
            if account.bank_limit >= BANK_HARD_CAP {
                return Err(EconomyError::BankLimitMaxed);
            }
            let price = bank_upgrade_price(account.bank_limit);
            if account.wallet < price {
                return Err(EconomyError::InsufficientFunds {
                    needed: price,
                    available: account.wallet,
                });
            }
            account.wallet -= price;
            account.bank_limit = (account.bank_limit + BANK_STEP).min(BANK_HARD_CAP);
            Ok(price)
        })
        .await?;
    Ok(PurchaseOutcome { charged, account })
}

pub async fn buy_job_upgrade<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
) -> Result<PurchaseOutcome, EconomyError> {
    store.ensure(actor, display_name).await?;
    let (account, charged) = store
        .apply_if(actor, |account| {
            let price = JOB_PRICE_PER_LEVEL * account.job_level.max(1) as u64;
            if account.wallet < price {
                return Err(EconomyError::InsufficientFunds {
                    needed: price,
                    available: account.wallet,
                });
            }
            account.wallet -= price;
            account.job_level += 1;
            Ok(price)
        })
        .await?;
    Ok(PurchaseOutcome { charged, account })
}

/// Buy an inventory item. Flag items are refused at their cap; stack items
/// only need affordability.
pub async fn buy_item<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    item: ItemKey,
) -> Result<PurchaseOutcome, EconomyError> {
    store.ensure(actor, display_name).await?;
    let price = item_price(item);
    let (account, charged) = store
        .apply_if(actor, |account| {
            if let Some(max) = item.max_count() {
                if account.item_count(item) >= max {
                    return Err(EconomyError::AlreadyOwned { item });
                }
            }
            if account.wallet < price {
                return Err(EconomyError::InsufficientFunds {
                    needed: price,
                    available: account.wallet,
                });
            }
            account.wallet -= price;
            account.grant_item(item);
            Ok(price)
        })
        .await?;
    Ok(PurchaseOutcome { charged, account })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

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

    #[test]
    fn tier_pricing_grows_fifteen_percent() {
        assert_eq!(bank_tier(INITIAL_BANK_LIMIT), 0);
        assert_eq!(bank_tier(INITIAL_BANK_LIMIT + BANK_STEP), 1);
        assert_eq!(bank_upgrade_price(INITIAL_BANK_LIMIT), 75_000);
        assert_eq!(bank_upgrade_price(INITIAL_BANK_LIMIT + BANK_STEP), 86_250);
        // ceil(75_000 * 1.15^2) = ceil(99_187.5)
        assert_eq!(
            bank_upgrade_price(INITIAL_BANK_LIMIT + 2 * BANK_STEP),
            99_188
        );
    }

    #[tokio::test]
    async fn bank_upgrade_charges_and_raises_limit() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 100_000).await;
        let outcome = buy_bank_upgrade(&store, &user, "u1").await.unwrap();
        assert_eq!(outcome.charged, 75_000);
        assert_eq!(outcome.account.bank_limit, INITIAL_BANK_LIMIT + BANK_STEP);
        assert_eq!(outcome.account.wallet, 25_000);

        let err = buy_bank_upgrade(&store, &user, "u1").await.unwrap_err();
        assert_eq!(
            err,
            EconomyError::InsufficientFunds {
                needed: 86_250,
                available: 25_000
            }
        );
    }

    #[tokio::test]
    async fn bank_upgrade_stops_at_hard_cap() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", u64::MAX / 2).await;
        store
            .apply_if(&user, |account| {
                account.bank_limit = BANK_HARD_CAP;
                Ok(())
            })
            .await
            .unwrap();
        let err = buy_bank_upgrade(&store, &user, "u1").await.unwrap_err();
        assert_eq!(err, EconomyError::BankLimitMaxed);
    }

    #[tokio::test]
    async fn flag_item_is_capped_at_one() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 100_000).await;
        buy_item(&store, &user, "u1", ItemKey::Gloves).await.unwrap();
        let err = buy_item(&store, &user, "u1", ItemKey::Gloves)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EconomyError::AlreadyOwned {
                item: ItemKey::Gloves
            }
        );
    }

    #[tokio::test]
    async fn stack_item_accumulates() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 100_000).await;
        buy_item(&store, &user, "u1", ItemKey::MasterKey)
            .await
            .unwrap();
        let outcome = buy_item(&store, &user, "u1", ItemKey::MasterKey)
            .await
            .unwrap();
        assert_eq!(outcome.account.item_count(ItemKey::MasterKey), 2);
        assert_eq!(outcome.account.wallet, 100_000 - 2 * 25_000);
    }

    #[tokio::test]
    async fn job_upgrade_price_scales_with_level() {
        let store = MemoryStore::new();
        let user = funded(&store, "u1", 2_000).await;
        let outcome = buy_job_upgrade(&store, &user, "u1").await.unwrap();
        assert_eq!(outcome.charged, 500);
        assert_eq!(outcome.account.job_level, 2);
        let outcome = buy_job_upgrade(&store, &user, "u1").await.unwrap();
        assert_eq!(outcome.charged, 1_000);
        assert_eq!(outcome.account.wallet, 500);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_purchases_cannot_double_spend() {
        let store = Arc::new(MemoryStore::new());
        // Exactly one glove purchase can be afforded.
        let user = funded(&store, "u1", 35_000).await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let user = user.clone();
            tasks.push(tokio::spawn(async move {
                buy_item(&*store, &user, "u1", ItemKey::Gloves).await
            }));
        }
        let mut bought = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                bought += 1;
            }
        }
        assert_eq!(bought, 1);
        let row = store.get(&user).await.unwrap().unwrap();
        assert_eq!(row.wallet, 0);
        assert_eq!(row.item_count(ItemKey::Gloves), 1);
    }
}
