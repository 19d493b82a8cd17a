//! Margin position provider simulation.
//!
//! Walks the position lifecycle end to end: vault funding, open, fill through the
//! limit order protocol, close and settlement, plus the failure paths.
//!
//! Usage: `ccmt-sim [kovan | config.toml]`. Without an argument the local preset is used.

use ccmt_core::*;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let loaded = match std::env::args().nth(1) {
        Some(arg) if arg == "kovan" => Network::Kovan.config(Address::from_low_u64(0xad)),
        Some(path) => ProviderConfig::from_file(Path::new(&path)),
        None => Ok(ProviderConfig::local()),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    config.logging.init();

    println!("Margin Position Provider Simulation");
    println!("Network {:?}, protocol {}\n", config.network, config.protocol);

    let scenarios: [(&str, fn(&ProviderConfig) -> SimResult); 4] = [
        ("open, fill, close", scenario_1_full_lifecycle),
        ("vault exhaustion", scenario_2_vault_exhaustion),
        ("replayed close", scenario_3_replayed_close),
        ("rejected fills", scenario_4_rejected_fills),
    ];

    for (name, scenario) in scenarios {
        if let Err(e) = scenario(&config) {
            eprintln!("scenario '{}' failed: {}", name, e);
            return ExitCode::FAILURE;
        }
    }

    println!("\nAll simulations completed successfully.");
    ExitCode::SUCCESS
}

type SimResult = Result<(), Box<dyn std::error::Error>>;

struct Actors {
    funder: Address,
    trader: Address,
    taker: Address,
}

fn actors() -> Actors {
    Actors {
        funder: Address::from_low_u64(0xf00d),
        trader: Address::from_low_u64(0x7ade),
        taker: Address::from_low_u64(0x7a4e),
    }
}

fn settlement_asset(config: &ProviderConfig) -> Result<Address, ProviderError> {
    config
        .supported_assets
        .first()
        .copied()
        .or(Some(config.base_asset).filter(|a| !a.is_zero()))
        .ok_or(ProviderError::InvalidAsset(Address::ZERO))
}

fn new_registry(config: &ProviderConfig) -> Result<Registry, ConfigError> {
    let mut registry = Registry::new(config.clone())?;
    registry.set_time(Timestamp::now());
    Ok(registry)
}

/// Open 1000 units, fill at margin tier 2 against a named counterparty, close.
fn scenario_1_full_lifecycle(config: &ProviderConfig) -> SimResult {
    println!("Scenario 1: Open, Fill, Close\n");

    let asset = settlement_asset(config)?;
    let who = actors();
    let counterparty = Address::from_low_u64(0xc0c0);
    let mut registry = new_registry(config)?;
    let protocol = MockProtocol::new(registry.protocol());

    registry.fund_account(asset, who.funder, Amount::units(1_000_000))?;
    registry.fund_account(asset, who.taker, Amount::units(1_000_000))?;
    registry.deposit(asset, who.funder, Amount::units(1000))?;
    println!("  Vault funded with 1000 of {}", asset);

    let id = registry.open_position(asset, Amount::units(1000), who.trader)?;
    println!("  Position {} opened, token held by {}", id, registry.owner_of(id)?);

    let order = RestingOrder::new(who.trader, id, asset, Amount::units(100))
        .with_interaction(Interaction::new(counterparty, 2));
    let view = protocol.fill_order(&mut registry, &order, who.taker)?;
    println!(
        "  Filled: counterparty {}, margin {}, token now held by {}",
        view.counterparty.unwrap_or(Address::ZERO),
        view.margin_bps,
        registry.owner_of(id)?
    );

    registry.advance_time(60_000);
    let closed = registry.close_trade(who.taker, id)?;
    println!(
        "  Closed: holder gets {}, counterparty gets {}",
        closed.plan.holder_share, closed.plan.counterparty_share
    );
    println!("  Vault balance after close: {}", registry.vault_balance(asset));

    match registry.owner_of(id) {
        Err(e) => println!("  Owner query after close: {}\n", e),
        Ok(owner) => println!("  Unexpected owner after close: {}\n", owner),
    }
    Ok(())
}

/// Two positions that together exceed the vault.
fn scenario_2_vault_exhaustion(config: &ProviderConfig) -> SimResult {
    println!("Scenario 2: Vault Exhaustion\n");

    let asset = settlement_asset(config)?;
    let who = actors();
    let mut registry = new_registry(config)?;

    registry.fund_account(asset, who.funder, Amount::units(1500))?;
    registry.deposit(asset, who.funder, Amount::units(1500))?;

    let first = registry.open_position(asset, Amount::units(1000), who.trader)?;
    println!("  Position {} reserves 1000, free liquidity {}", first, registry.free_liquidity(asset));

    match registry.open_position(asset, Amount::units(1000), who.trader) {
        Err(e) => println!("  Second open rejected: {}", e),
        Ok(id) => println!("  Second open unexpectedly accepted: {}", id),
    }
    println!("  First position still {}\n", registry.get_trade_info(first)?.state);
    Ok(())
}

/// Two holders racing to close: the second one settles nothing.
fn scenario_3_replayed_close(config: &ProviderConfig) -> SimResult {
    println!("Scenario 3: Replayed Close\n");

    let asset = settlement_asset(config)?;
    let who = actors();
    let mut registry = new_registry(config)?;
    registry.fund_account(asset, who.funder, Amount::units(500))?;
    registry.deposit(asset, who.funder, Amount::units(500))?;

    let id = registry.open_position(asset, Amount::units(500), who.trader)?;
    let protocol_address = registry.protocol();
    registry.register_fill(protocol_address, id, who.taker, config.margin_tier_step())?;

    let shared = SharedRegistry::new(registry);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            let trader = who.trader;
            std::thread::spawn(move || shared.transact(|r| r.close_trade(trader, id)).is_ok())
        })
        .collect();

    let successes = handles
        .into_iter()
        .filter_map(|h| h.join().ok())
        .filter(|ok| *ok)
        .count();
    println!("  4 concurrent closes, {} succeeded", successes);
    shared.read(|r| println!("  Vault balance: {}\n", r.vault_balance(asset)));
    Ok(())
}

/// Malformed payloads and impostor callers never register a fill.
fn scenario_4_rejected_fills(config: &ProviderConfig) -> SimResult {
    println!("Scenario 4: Rejected Fills\n");

    let asset = settlement_asset(config)?;
    let who = actors();
    let mut registry = new_registry(config)?;
    registry.fund_account(asset, who.funder, Amount::units(100))?;
    registry.fund_account(asset, who.taker, Amount::units(100))?;
    registry.deposit(asset, who.funder, Amount::units(100))?;
    let id = registry.open_position(asset, Amount::units(100), who.trader)?;

    let protocol = MockProtocol::new(registry.protocol());
    let impostor = MockProtocol::new(Address::from_low_u64(0xbad));
    let good = RestingOrder::new(who.trader, id, asset, Amount::units(10))
        .with_interaction(Interaction::new(who.funder, 2));

    let attempts = [
        ("impostor protocol", impostor.fill_order(&mut registry, &good, who.taker)),
        (
            "truncated payload",
            protocol.fill_order(&mut registry, &good.clone().with_raw_interaction(vec![0u8; 20]), who.taker),
        ),
        (
            "margin code 255",
            protocol.fill_order(
                &mut registry,
                &good.clone().with_interaction(Interaction::new(who.funder, 255)),
                who.taker,
            ),
        ),
    ];

    for (label, result) in attempts {
        match result {
            Err(e) => println!("  {}: {}", label, e),
            Ok(_) => println!("  {}: unexpectedly accepted", label),
        }
    }
    println!(
        "  Position still {}, token still held by {}\n",
        registry.get_trade_info(id)?.state,
        registry.owner_of(id)?
    );
    Ok(())
}
