//! Load driver for the pixelvault economy.
//!
//! Spawns a swarm of concurrent actors issuing randomized operations
//! against one shared in-memory store, then audits the system-wide
//! invariants (non-negative balances, bank capacity, lottery ticket caps,
//! marriage symmetry) and prints a JSON report.

use anyhow::Result;
use clap::Parser;
use pixelvault_economy::amount::AmountSpec;
use pixelvault_economy::blackjack::{Action, Deal, Table, Turn, TURN_TIMEOUT_MS};
use pixelvault_economy::heist::HeistEvent;
use pixelvault_economy::levels::{Progression, ProgressionConfig};
use pixelvault_economy::lottery::{BuyRequest, Lottery};
use pixelvault_economy::marriage::{self, Proposals};
use pixelvault_economy::ops::admin::{self, AdminList, AdminStat};
use pixelvault_economy::ops::{bank, daily, shop, steal, transfer, vault_rob, wager};
use pixelvault_economy::{vault, MemoryStore, Store};
use pixelvault_types::{BalanceKind, EconomyError, ItemKey, UserId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pixelvault-simulator", about = "Hammer the economy and audit its invariants")]
struct Args {
    /// Number of concurrent actors.
    #[arg(long, default_value_t = 16)]
    users: usize,

    /// Operations issued per actor.
    #[arg(long, default_value_t = 200)]
    ops: usize,

    /// Base RNG seed (each actor derives its own stream).
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Starting wallet per actor.
    #[arg(long, default_value_t = 250_000)]
    starting_wallet: u64,

    /// Emit the report as pretty JSON instead of a single line.
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Debug, Default, Serialize)]
struct Report {
    users: usize,
    ops_per_user: usize,
    operations_applied: u64,
    operations_refused: u64,
    total_wallets: u64,
    total_banks: u64,
    vault_balance: u64,
    lottery_tickets_sold: usize,
    lottery_paid_out: u64,
    lottery_rollover: u64,
    married_pairs: usize,
    invariant_violations: usize,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

struct World {
    store: MemoryStore,
    lottery: Lottery,
    table: Table,
    proposals: Proposals,
    heist: HeistEvent,
    progression: Progression,
    admins: AdminList,
}

async fn play_blackjack(world: &World, user: &UserId, rng: &mut StdRng) -> Result<(), EconomyError> {
    let bet = AmountSpec::Exact(rng.gen_range(10..2_000));
    let deal = world
        .table
        .start(&world.store, user, user.as_str(), bet, now_ms(), rng)
        .await?;
    let Deal::Playing(_) = deal else {
        return Ok(());
    };

    // Occasionally walk away and let the timeout stand for us.
    if rng.gen_bool(0.1) {
        world
            .table
            .expire(&world.store, user, now_ms() + TURN_TIMEOUT_MS)
            .await?;
        return Ok(());
    }

    loop {
        let action = if rng.gen_bool(0.4) {
            Action::Hit
        } else if rng.gen_bool(0.2) {
            Action::Double
        } else {
            Action::Stand
        };
        match world.table.act(&world.store, user, action, now_ms()).await {
            Ok(Turn::Settled(_)) => return Ok(()),
            Ok(_) => continue,
            Err(EconomyError::InvalidMove) => continue,
            Err(other) => return Err(other),
        }
    }
}

async fn run_actor(world: Arc<World>, index: usize, args: Arc<Args>) -> (u64, u64) {
    let user = UserId::new(format!("user-{index}"));
    let name = format!("Player {index}");
    let victim = UserId::new(format!("user-{}", (index + 1) % args.users));
    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(index as u64));
    let mut applied = 0u64;
    let mut refused = 0u64;

    for _ in 0..args.ops {
        let now = now_ms();
        // Every operation doubles as a chat message and runs the
        // message-driven side effects first.
        world.heist.maybe_trigger(now, &mut rng).await;
        let _ = world
            .progression
            .grant_message_xp(&world.store, &user, &name, now, &mut rng)
            .await;
        if rng.gen_bool(0.05) {
            let _ = pixelvault_economy::ops::record_interaction(&world.store, &user, &name).await;
        }

        let result: Result<(), EconomyError> = match rng.gen_range(0..10) {
            0 => wager::gamble(
                &world.store,
                &user,
                &name,
                AmountSpec::Exact(rng.gen_range(1..1_000)),
                &mut rng,
            )
            .await
            .map(|_| ()),
            1 => wager::slot(
                &world.store,
                &user,
                &name,
                AmountSpec::Exact(rng.gen_range(1..1_000)),
                &mut rng,
            )
            .await
            .map(|_| ()),
            2 => wager::spinwheel(
                &world.store,
                &user,
                &name,
                AmountSpec::Exact(rng.gen_range(1..1_000)),
                &mut rng,
            )
            .await
            .map(|_| ()),
            3 => daily::claim(&world.store, &user, &name, now, &mut rng)
                .await
                .map(|_| ()),
            4 => {
                if rng.gen_bool(0.5) {
                    bank::deposit(
                        &world.store,
                        &user,
                        &name,
                        AmountSpec::Percent(rng.gen_range(1..=50)),
                    )
                    .await
                    .map(|_| ())
                } else {
                    bank::withdraw(&world.store, &user, &name, AmountSpec::Half)
                        .await
                        .map(|_| ())
                }
            }
            5 => transfer::send(
                &world.store,
                &user,
                &name,
                &victim,
                victim.as_str(),
                AmountSpec::Exact(rng.gen_range(1..3_000)),
                BalanceKind::Wallet,
                if rng.gen_bool(0.5) {
                    BalanceKind::Wallet
                } else {
                    BalanceKind::Bank
                },
            )
            .await
            .map(|_| ()),
            6 => steal::steal(
                &world.store,
                &user,
                &name,
                &victim,
                victim.as_str(),
                rng.gen_range(1..2_000),
                now,
                &mut rng,
            )
            .await
            .map(|_| ()),
            7 => {
                let purchase = match rng.gen_range(0..4) {
                    0 => shop::buy_bank_upgrade(&world.store, &user, &name).await,
                    1 => shop::buy_item(&world.store, &user, &name, ItemKey::Gloves).await,
                    2 => shop::buy_item(&world.store, &user, &name, ItemKey::Boots).await,
                    _ => shop::buy_item(&world.store, &user, &name, ItemKey::MasterKey).await,
                };
                purchase.map(|_| ())
            }
            8 => world
                .lottery
                .buy(
                    &world.store,
                    &user,
                    &name,
                    BuyRequest::Random(rng.gen_range(1..10)),
                    now,
                    &mut rng,
                )
                .await
                .map(|_| ()),
            _ => {
                if rng.gen_bool(0.3) {
                    let big = world.heist.is_active(now).await && world.heist.claim(now).await;
                    vault_rob::rob_vault(&world.store, &user, &name, big, now, &mut rng)
                        .await
                        .map(|_| ())
                } else if rng.gen_bool(0.5) {
                    play_blackjack(&world, &user, &mut rng).await
                } else {
                    marriage::claim(&world.store, &user, &name, now).await.map(|_| ())
                }
            }
        };

        match result {
            Ok(()) => applied += 1,
            Err(reason) if reason.is_retryable() => {
                warn!(user = %user, %reason, "storage-level refusal");
                refused += 1;
            }
            Err(_) => refused += 1,
        }
    }
    (applied, refused)
}

async fn audit(world: &World, report: &mut Report) -> Result<()> {
    let accounts = world.store.snapshot().await;
    for account in &accounts {
        if account.bank > account.bank_limit {
            warn!(user = %account.user_id, "bank over capacity");
            report.invariant_violations += 1;
        }
        if let Some(partner_id) = &account.married_to {
            let partner = world.store.get(partner_id).await?;
            let symmetric = partner
                .map(|p| p.married_to.as_ref() == Some(&account.user_id))
                .unwrap_or(false);
            if !symmetric {
                warn!(user = %account.user_id, "marriage not symmetric");
                report.invariant_violations += 1;
            } else {
                report.married_pairs += 1;
            }
        }
        if account.user_id.is_vault() {
            report.vault_balance = account.wallet;
        } else {
            report.total_wallets += account.wallet;
            report.total_banks += account.bank;
        }
    }
    report.married_pairs /= 2;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Arc::new(Args::parse());
    let admin_id = UserId::new("simulator-admin");
    let world = Arc::new(World {
        store: MemoryStore::new(),
        lottery: Lottery::new(),
        table: Table::new(),
        proposals: Proposals::new(),
        heist: HeistEvent::new(),
        progression: Progression::new(ProgressionConfig::default()),
        admins: AdminList::new([admin_id.clone()]),
    });

    // Seed every actor through the same guarded admin path users get.
    for index in 0..args.users {
        let user = UserId::new(format!("user-{index}"));
        admin::edit_stat(
            &world.store,
            &world.admins,
            &admin_id,
            &user,
            &format!("Player {index}"),
            AdminStat::Coins(BalanceKind::Wallet),
            args.starting_wallet,
        )
        .await?;
    }
    vault::deposit(&world.store, 100_000).await?;
    world.lottery.ensure_open(now_ms()).await;

    // Marry adjacent pairs so couple claims have something to do.
    for index in (0..args.users.saturating_sub(1)).step_by(2) {
        let a = UserId::new(format!("user-{index}"));
        let b = UserId::new(format!("user-{}", index + 1));
        let now = now_ms();
        world
            .proposals
            .propose(&world.store, &a, a.as_str(), &b, b.as_str(), now)
            .await?;
        world.proposals.respond(&world.store, &b, true, now + 1).await?;
    }

    info!(users = args.users, ops = args.ops, seed = args.seed, "starting load");
    let mut tasks = Vec::new();
    for index in 0..args.users {
        tasks.push(tokio::spawn(run_actor(world.clone(), index, args.clone())));
    }

    let mut report = Report {
        users: args.users,
        ops_per_user: args.ops,
        ..Report::default()
    };
    for task in tasks {
        let (applied, refused) = task.await?;
        report.operations_applied += applied;
        report.operations_refused += refused;
    }

    // Close the books: draw the lottery round that accumulated tickets.
    let mut rng = StdRng::seed_from_u64(args.seed);
    if let Some(round) = world.lottery.open_round().await {
        report.lottery_tickets_sold = world.lottery.ticket_count(round.id).await;
        let summary = world
            .lottery
            .draw(&world.store, &world.admins, &admin_id, now_ms(), &mut rng)
            .await?;
        report.lottery_paid_out = summary.paid_out;
        report.lottery_rollover = summary.rollover;
    }

    audit(&world, &mut report).await?;
    if report.invariant_violations > 0 {
        warn!(
            violations = report.invariant_violations,
            "invariant violations detected"
        );
    }

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{rendered}");
    anyhow::ensure!(
        report.invariant_violations == 0,
        "economy invariants were violated"
    );
    Ok(())
}
