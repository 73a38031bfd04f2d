//! Scenario bootstrap
//!
//! Builds a fresh world state from a TOML scenario file: orchestrator
//! settings, token ledgers, balances, legacy converters, optional
//! pre-existing destination pools and registry entries.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use migration_core::env::{LegacyReserve, LegacySettings};
use migration_core::sim::{SimHarness, SimMultiReserve, SimWorld};
use migration_core::{
    AccountName, Asset, MigrationOrchestrator, OrchestratorSettings, SymbolCode, TokenSymbol,
};

use crate::config::{save_harness, CliConfig};

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub settings: OrchestratorSettings,
    #[serde(default)]
    pub tokens: Vec<TokenDef>,
    #[serde(default)]
    pub balances: Vec<BalanceDef>,
    #[serde(default)]
    pub legacy_converters: Vec<LegacyConverterDef>,
    #[serde(default)]
    pub destination_pools: Vec<DestinationPoolDef>,
    #[serde(default)]
    pub converters: Vec<RegistryDef>,
}

#[derive(Debug, Deserialize)]
pub struct TokenDef {
    pub ledger: AccountName,
    pub symbol: SymbolCode,
    pub precision: u8,
}

#[derive(Debug, Deserialize)]
pub struct BalanceDef {
    pub ledger: AccountName,
    pub account: AccountName,
    /// e.g. `"500.0000 BNT"`
    pub quantity: String,
}

#[derive(Debug, Deserialize)]
pub struct ReserveDef {
    pub ledger: AccountName,
    pub symbol: SymbolCode,
    pub precision: u8,
    pub ratio: u32,
}

#[derive(Debug, Deserialize)]
pub struct LegacyConverterDef {
    pub account: AccountName,
    pub smart_contract: AccountName,
    pub smart_token: SymbolCode,
    pub precision: u8,
    pub fee: u32,
    pub reserves: Vec<ReserveDef>,
}

#[derive(Debug, Deserialize)]
pub struct PoolReserveDef {
    pub ledger: AccountName,
    pub symbol: SymbolCode,
    pub precision: u8,
    pub ratio: u32,
    pub balance: String,
}

#[derive(Debug, Deserialize)]
pub struct DestinationPoolDef {
    pub token: SymbolCode,
    pub precision: u8,
    pub owner: AccountName,
    pub fee: u32,
    pub supply: String,
    pub supply_holder: AccountName,
    pub reserves: Vec<PoolReserveDef>,
}

#[derive(Debug, Deserialize)]
pub struct RegistryDef {
    pub token: SymbolCode,
    pub account: AccountName,
    pub owner: AccountName,
}

fn parse_asset(s: &str) -> Result<Asset> {
    s.parse::<Asset>()
        .with_context(|| format!("Invalid asset quantity: {:?}", s))
}

/// Build a harness from a parsed scenario
pub fn build_harness(scenario: &Scenario) -> Result<SimHarness> {
    let mut world = SimWorld::new(scenario.settings.clone());

    for token in &scenario.tokens {
        let symbol = TokenSymbol::new(token.symbol, token.precision)?;
        world.create_token(token.ledger, symbol)?;
    }
    for balance in &scenario.balances {
        let quantity = parse_asset(&balance.quantity)?;
        world.issue(balance.ledger, balance.account, quantity)?;
    }
    for converter in &scenario.legacy_converters {
        let smart_currency = TokenSymbol::new(converter.smart_token, converter.precision)?;
        let reserves = converter
            .reserves
            .iter()
            .map(|r| {
                Ok(LegacyReserve {
                    ledger: r.ledger,
                    symbol: TokenSymbol::new(r.symbol, r.precision)?,
                    ratio: r.ratio,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        world.add_legacy_converter(
            converter.account,
            LegacySettings {
                smart_contract: converter.smart_contract,
                smart_currency,
                smart_enabled: true,
                enabled: true,
                require_balance: false,
                fee: converter.fee,
            },
            reserves,
        );
    }
    for pool in &scenario.destination_pools {
        let symbol = TokenSymbol::new(pool.token, pool.precision)?;
        let reserves = pool
            .reserves
            .iter()
            .map(|r| {
                Ok(SimMultiReserve {
                    ledger: r.ledger,
                    symbol: TokenSymbol::new(r.symbol, r.precision)?,
                    ratio: r.ratio,
                    balance: parse_asset(&r.balance)?.amount,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        world.add_destination_pool(
            symbol,
            pool.owner,
            pool.fee,
            reserves,
            parse_asset(&pool.supply)?,
            pool.supply_holder,
        )?;
    }

    let mut orchestrator = MigrationOrchestrator::new(scenario.settings.clone());
    let admin = scenario.settings.self_account;
    for entry in &scenario.converters {
        orchestrator.register_converter(&admin, entry.token, entry.account, entry.owner)?;
    }

    Ok(SimHarness::new(orchestrator, world))
}

pub fn setup_world(config: &CliConfig, scenario_path: &Path) -> Result<()> {
    let data = fs::read_to_string(scenario_path)
        .with_context(|| format!("Failed to read scenario: {}", scenario_path.display()))?;
    let scenario: Scenario = toml::from_str(&data)
        .with_context(|| format!("Failed to parse scenario: {}", scenario_path.display()))?;

    log::debug!(
        "scenario {} defines {} tokens, {} legacy converters",
        scenario_path.display(),
        scenario.tokens.len(),
        scenario.legacy_converters.len()
    );
    let harness = build_harness(&scenario)?;
    save_harness(&config.state_path, &harness)?;

    println!("{}", "=== World Initialized ===".bright_green().bold());
    println!(
        "{} {}",
        "Orchestrator:".bright_cyan(),
        harness.orchestrator.settings().self_account
    );
    println!("{} {}", "Ledgers:".bright_cyan(), harness.world.ledgers.len());
    println!(
        "{} {}",
        "Legacy converters:".bright_cyan(),
        harness.world.legacy_converters.len()
    );
    println!(
        "{} {}",
        "Registered for migration:".bright_cyan(),
        harness.orchestrator.registry().iter().count()
    );
    println!(
        "{} {}",
        "State written to:".bright_cyan(),
        config.state_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
[settings]
self_account = "migration"
multi_converter_account = "multiconvert"
multi_tokens_ledger = "multi4tokens"
network_account = "thisisbancor"
network_token = "BNT"
reserved_accounts = ["eosio.ram", "eosio.stake", "eosio.rex"]

[[tokens]]
ledger = "eosio.token"
symbol = "EOS"
precision = 4

[[tokens]]
ledger = "bntbntbntbnt"
symbol = "BNT"
precision = 4

[[tokens]]
ledger = "bnt2eosrelay"
symbol = "OLD"
precision = 4

[[balances]]
ledger = "eosio.token"
account = "bnt2eoscnvrt"
quantity = "1000.0000 EOS"

[[balances]]
ledger = "bntbntbntbnt"
account = "bnt2eoscnvrt"
quantity = "500.0000 BNT"

[[balances]]
ledger = "bnt2eosrelay"
account = "alice"
quantity = "100.0000 OLD"

[[legacy_converters]]
account = "bnt2eoscnvrt"
smart_contract = "bnt2eosrelay"
smart_token = "OLD"
precision = 4
fee = 3000

[[legacy_converters.reserves]]
ledger = "bntbntbntbnt"
symbol = "BNT"
precision = 4
ratio = 500000

[[legacy_converters.reserves]]
ledger = "eosio.token"
symbol = "EOS"
precision = 4
ratio = 500000

[[converters]]
token = "OLD"
account = "bnt2eoscnvrt"
owner = "alice"
"#;

    #[test]
    fn test_scenario_builds_world() {
        let scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        let harness = build_harness(&scenario).unwrap();

        assert_eq!(harness.world.ledgers.len(), 3);
        assert!(harness
            .orchestrator
            .registry()
            .find(SymbolCode::new("OLD").unwrap())
            .is_some());
    }

    #[test]
    fn test_scenario_deposit_completes_migration() {
        let scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        let mut harness = build_harness(&scenario).unwrap();

        let alice = AccountName::new("alice").unwrap();
        harness
            .deposit(alice, "100.0000 OLD".parse().unwrap(), vec![alice])
            .unwrap();

        // EOS is the non-network reserve, so the replacement pool is EOSOLD
        let eosold = SymbolCode::new("EOSOLD").unwrap();
        assert!(harness.world.pools.contains_key(&eosold));
        assert!(harness
            .orchestrator
            .migrations()
            .find(SymbolCode::new("OLD").unwrap())
            .is_none());
    }
}
