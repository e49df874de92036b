//! Keeper simulation.
//!
//! Walks a stop order through its lifecycle, runs keeper cycles over a book
//! of positions, and lets the funding watchdog refill a draining upkeep.

use exit_keeper::*;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const ADMIN: AccountId = AccountId(1);
const KEEPER: AccountId = AccountId(2);
const ALICE: AccountId = AccountId(10);
const BOB: AccountId = AccountId(11);
const WEEK: i64 = 60 * 60 * 24 * 7;

type Book = OrderBook<InMemoryLedger, InMemorySettlement, MockAggregator>;

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,exit_keeper=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    let config = match std::env::var("KEEPER_CONFIG") {
        Ok(path) => match std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse { reason: e.to_string() })
            .and_then(|raw| KeeperConfig::from_toml_str(&raw))
        {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {path}: {e}");
                std::process::exit(1);
            }
        },
        Err(_) => Environment::Development.config(),
    };

    println!("Stop Order Keeper Simulation\n");

    if let Err(e) = scenario_1_order_lifecycle(&config) {
        eprintln!("scenario 1 failed: {e}");
        std::process::exit(1);
    }
    if let Err(e) = scenario_2_keeper_cycles(&config) {
        eprintln!("scenario 2 failed: {e}");
        std::process::exit(1);
    }
    if let Err(e) = scenario_3_upkeep_funding(&config) {
        eprintln!("scenario 3 failed: {e}");
        std::process::exit(1);
    }

    println!("\nAll simulations completed successfully.");
}

fn new_book(config: &KeeperConfig) -> Result<Book, OrderBookError> {
    OrderBook::new(
        config.order_book.clone(),
        ADMIN,
        InMemoryLedger::new(),
        InMemorySettlement::new(),
        MockAggregator::new(config.order_book.price_decimals).with_answer(1500_0000_0000),
    )
}

/// Set, inspect and execute one stop order by hand.
fn scenario_1_order_lifecycle(config: &KeeperConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scenario 1: Stop Order Lifecycle\n");

    let mut book = new_book(config)?;
    let start = Timestamp::from_secs(1_700_000_000);
    let id = book.ledger_mut().mint(ALICE, start.plus_secs(WEEK));

    book.set_take_profit(ALICE, id, StopPrice(2000_0000_0000), StopPrice(1000_0000_0000), start)?;
    let info = book.take_info(id);
    println!("  Alice sets stops on {id}: upper {} lower {}", info.upper_stop_price, info.lower_stop_price);

    if let Err(e) = book.set_take_profit(BOB, id, StopPrice(1), StopPrice(1), start) {
        println!("  Bob tries to overwrite: {e}");
    }

    println!("  Oracle at $1500, payoff 0, triggered: {}", book.check_take_profit(id, start)?);

    book.oracle_mut().set_answer(1000_0000_0000);
    book.settlement_mut().set_payoff(id, Amount::new(dec!(100)));
    println!("  Oracle at $1000, payoff 100, triggered: {}", book.check_take_profit(id, start)?);

    let outcome = book.execute_take_profit(KEEPER, id, start)?;
    println!("  Executed ({:?}), paid {}, order absent: {}\n", outcome.reason, outcome.paid, book.take_info(id).is_absent());
    Ok(())
}

/// Several positions, bounded batches, one exercise that keeps reverting.
fn scenario_2_keeper_cycles(config: &KeeperConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scenario 2: Keeper Cycles\n");

    let mut book = new_book(config)?;
    let mut adapter = AutomationAdapter::new(config.automation.clone(), ADMIN, KEEPER);
    let start = Timestamp::from_secs(1_700_000_000);

    let mut ids = Vec::new();
    for i in 0..12 {
        let owner = if i % 2 == 0 { ALICE } else { BOB };
        let id = book.ledger_mut().mint(owner, start.plus_secs(WEEK));
        book.set_take_profit(owner, id, StopPrice(2000_0000_0000), StopPrice(1000_0000_0000), start)?;
        book.settlement_mut().set_payoff(id, Amount::new(dec!(25)));
        adapter.add_position(ADMIN, id)?;
        ids.push(id);
    }
    book.settlement_mut().fail_exercise(ids[3], true);
    println!("  {} positions tracked, batch size {}", ids.len(), adapter.config().max_batch_size);

    book.oracle_mut().set_answer(2200_0000_0000);
    println!("  Oracle jumps to $2200\n");

    for cycle in 1..=3 {
        let now = start.plus_secs(cycle * 60);
        let check = adapter.check(&book, now)?;
        if !check.upkeep_needed {
            println!("  Cycle {cycle}: nothing to do");
            continue;
        }
        let report = adapter.execute(&mut book, &check.perform_data, now)?;
        println!(
            "  Cycle {cycle}: executed {}, failed {}, open orders {}",
            report.executed.len(),
            report.failed.len(),
            book.len()
        );
    }

    book.settlement_mut().fail_exercise(ids[3], false);
    let now = start.plus_secs(600);
    let check = adapter.check(&book, now)?;
    let report = adapter.execute(&mut book, &check.perform_data, now)?;
    println!("  Exercise fixed, retry executed {:?}\n", report.executed_ids());

    book.set_global_time_to_execution(ADMIN, Duration::from_secs(3600), now)?;
    Ok(())
}

/// An upkeep drains with every perform; the watchdog refills it from its pool.
fn scenario_3_upkeep_funding(config: &KeeperConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scenario 3: Upkeep Funding\n");

    let pool = AccountId(500);
    let registry_payee = AccountId(501);
    let upkeep = UpkeepId::new("71811323549820858690788095236248551462108397831996880708762786105308124610685");

    let mut registry = InMemoryRegistry::new(registry_payee);
    registry.register(upkeep.clone(), Amount::new(dec!(1.5)));
    let mut token = InMemoryToken::new();
    token.mint(pool, Amount::new(dec!(5)));

    let mut watchdog = FundingWatchdog::new(config.watchdog.clone(), ADMIN, pool, registry, token);
    let start = Timestamp::from_secs(1_700_000_000);
    watchdog.add_registration(ADMIN, upkeep.clone(), None, start)?;

    for cycle in 1..=5 {
        let now = start.plus_secs(cycle * 3600);
        watchdog.registry_mut().charge(&upkeep, Amount::new(dec!(0.4)))?;

        let check = watchdog.check()?;
        if check.upkeep_needed {
            let report = watchdog.execute(&check.perform_data, now)?;
            for (id, err) in &report.failed {
                println!("  Cycle {cycle}: funding {id} failed: {err}");
            }
        }
        println!(
            "  Cycle {cycle}: upkeep balance {}, pool {}",
            watchdog.registry().balance_of(&upkeep)?,
            watchdog.pool_balance()
        );
    }

    let payee = watchdog.registry().payee();
    println!("  Registry payee holds {}", watchdog.asset().balance_of(payee));

    let leftover = watchdog.pool_balance();
    watchdog.withdraw(ADMIN, ADMIN, leftover, start.plus_secs(WEEK))?;
    println!("  Admin withdraws leftover {leftover}");
    Ok(())
}
