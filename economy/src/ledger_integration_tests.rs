//! End-to-end ledger flow across subsystems.

use crate::amount::AmountSpec;
use crate::blackjack::{Deal, Table};
use crate::lottery::{BuyRequest, Lottery, PotAdjustment};
use crate::marriage::{self, Proposals};
use crate::ops::admin::{AdminList, AdminStat};
use crate::ops::{admin, bank, daily, shop, transfer, vault_rob};
use crate::store::{MemoryStore, Store};
use crate::vault;
use pixelvault_types::{BalanceKind, ItemKey, UserId};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn uid(id: &str) -> UserId {
    UserId::from(id)
}

#[tokio::test]
async fn a_full_day_in_the_economy() {
    let store = MemoryStore::new();
    let admins = AdminList::new([uid("admin")]);
    let lottery = Lottery::new();
    let proposals = Proposals::new();
    let table = Table::new();
    let mut rng = StdRng::seed_from_u64(2025);

    let alice = uid("alice");
    let bob = uid("bob");

    // Admin seeds alice's wallet; the same guarded path users go through.
    admin::edit_stat(
        &store,
        &admins,
        &uid("admin"),
        &alice,
        "alice",
        AdminStat::Coins(BalanceKind::Wallet),
        500_000,
    )
    .await
    .unwrap();

    // Daily claim credits coins and stamps the cooldown.
    let claimed = daily::claim(&store, &alice, "alice", 1_000, &mut rng)
        .await
        .unwrap();
    assert!(claimed.coins >= 300);

    // Shop: bank upgrade plus a master key.
    let upgrade = shop::buy_bank_upgrade(&store, &alice, "alice").await.unwrap();
    assert_eq!(upgrade.account.bank_limit, 250_000);
    shop::buy_item(&store, &alice, "alice", ItemKey::MasterKey)
        .await
        .unwrap();

    // Park savings in the bank.
    let banked = bank::deposit(&store, &alice, "alice", AmountSpec::Exact(100_000))
        .await
        .unwrap();
    assert_eq!(banked.bank, 100_000);

    // Taxed transfer to bob.
    let sent = transfer::send(
        &store,
        &alice,
        "alice",
        &bob,
        "bob",
        AmountSpec::Exact(10_000),
        BalanceKind::Wallet,
        BalanceKind::Wallet,
    )
    .await
    .unwrap();
    assert_eq!(sent.tax, 13);
    assert_eq!(vault::balance(&store).await.unwrap(), 13);

    // Lottery: alice buys a fixed code, admin forces that code and a pot.
    lottery
        .buy(
            &store,
            &alice,
            "alice",
            BuyRequest::Code("424242".into()),
            2_000,
            &mut rng,
        )
        .await
        .unwrap();
    lottery
        .set_planned_code(&admins, &uid("admin"), Some("424242"))
        .await
        .unwrap();
    lottery
        .set_pot(&admins, &uid("admin"), PotAdjustment::Set(40_000))
        .await
        .unwrap();
    let before_draw = store.get(&alice).await.unwrap().unwrap().wallet;
    let summary = lottery
        .draw(&store, &admins, &uid("admin"), 3_000, &mut rng)
        .await
        .unwrap();
    assert_eq!(summary.winners_match6, 1);
    assert_eq!(summary.paid_out, 30_000);
    assert_eq!(
        store.get(&alice).await.unwrap().unwrap().wallet,
        before_draw + 30_000
    );
    // The next round opened with the rollover.
    assert_eq!(lottery.open_round().await.unwrap().pot, summary.rollover);

    // Marriage and the shared claim.
    proposals
        .propose(&store, &alice, "alice", &bob, "bob", 4_000)
        .await
        .unwrap();
    proposals.respond(&store, &bob, true, 4_500).await.unwrap();
    let couple = marriage::claim(&store, &alice, "alice", 5_000_000).await.unwrap();
    assert_eq!(couple.streak, 1);

    // Vault robbery: the vault was fed by tax and a seeded amount.
    vault::deposit(&store, 60_000).await.unwrap();
    let rob = vault_rob::rob_vault(&store, &bob, "bob", false, 10_000_000, &mut rng).await;
    match rob {
        Ok(_) => {}
        Err(reason) => {
            // A failed-odds attempt surfaces as a fine, not an error, so
            // any error here must be a typed refusal, never a storage
            // fault.
            assert!(!reason.is_retryable(), "unexpected storage failure: {reason}");
        }
    }

    // Blackjack: a deal either settles immediately or leaves a live game.
    let wallet_before = store.get(&alice).await.unwrap().unwrap().wallet;
    let deal = table
        .start(&store, &alice, "alice", AmountSpec::Exact(1_000), 20_000_000, &mut rng)
        .await
        .unwrap();
    match deal {
        Deal::Settled(outcome) => {
            assert_eq!(
                store.get(&alice).await.unwrap().unwrap().wallet,
                wallet_before - 1_000 + outcome.credited
            );
        }
        Deal::Playing(_) => {
            // Timeout resolves it as a stand with exactly one credit.
            let outcome = table
                .expire(&store, &alice, 20_000_000 + crate::blackjack::TURN_TIMEOUT_MS)
                .await
                .unwrap()
                .expect("due game settles");
            assert_eq!(
                store.get(&alice).await.unwrap().unwrap().wallet,
                wallet_before - 1_000 + outcome.credited
            );
        }
    }

    // Invariants at rest.
    for account in store.snapshot().await {
        assert!(account.bank <= account.bank_limit);
        if let Some(partner) = &account.married_to {
            let partner = store.get(partner).await.unwrap().unwrap();
            assert_eq!(partner.married_to.as_ref(), Some(&account.user_id));
        }
    }
}
