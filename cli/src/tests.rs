//! End-to-end suite implementation
//!
//! Self-contained scenarios against a fresh in-memory world:
//! - full migration into a newly created destination pool
//! - full migration into a pre-existing destination pool
//! - failure-path behavior (duplicate tranches, residual balances)

use anyhow::{anyhow, Result};
use colored::Colorize;

use migration_core::effects::TransferNotice;
use migration_core::env::{LegacyReserve, LegacySettings, TokenLedger};
use migration_core::sim::{RunError, SimHarness, SimMultiReserve, SimWorld, HALF_RATIO};
use migration_core::{
    AccountName, Asset, MigrationError, MigrationOrchestrator, OrchestratorSettings, SymbolCode,
    TokenSymbol,
};
use migration_model::MathError;

// ============================================================================
// Test Runner Functions
// ============================================================================

pub fn run_new_pool_tests() -> Result<()> {
    println!("{}", "=== Running New-Pool Migration Tests ===".bright_yellow().bold());
    println!("{}", "Deposit through to a freshly created destination pool\n".dimmed());

    let mut passed = 0;
    let mut failed = 0;

    match test_new_pool_migration() {
        Ok(_) => {
            println!("{} New-pool migration end to end", "✓".bright_green());
            passed += 1;
        }
        Err(e) => {
            println!("{} New-pool migration: {}", "✗".bright_red(), e);
            failed += 1;
        }
    }

    match test_unregistered_deposit_ignored() {
        Ok(_) => {
            println!("{} Unregistered deposits are ignored", "✓".bright_green());
            passed += 1;
        }
        Err(e) => {
            println!("{} Unregistered deposit: {}", "✗".bright_red(), e);
            failed += 1;
        }
    }

    print_summary(passed, failed)
}

pub fn run_existing_pool_tests() -> Result<()> {
    println!("{}", "=== Running Existing-Pool Migration Tests ===".bright_yellow().bold());
    println!("{}", "Funding constrained by the destination pool's ratios\n".dimmed());

    let mut passed = 0;
    let mut failed = 0;

    match test_existing_pool_migration() {
        Ok(_) => {
            println!("{} Existing-pool migration end to end", "✓".bright_green());
            passed += 1;
        }
        Err(e) => {
            println!("{} Existing-pool migration: {}", "✗".bright_red(), e);
            failed += 1;
        }
    }

    print_summary(passed, failed)
}

pub fn run_failure_tests() -> Result<()> {
    println!("{}", "=== Running Failure-Path Tests ===".bright_yellow().bold());
    println!("{}", "Protocol violations must abort, not corrupt state\n".dimmed());

    let mut passed = 0;
    let mut failed = 0;

    match test_duplicate_tranche_aborts() {
        Ok(_) => {
            println!("{} Duplicate reserve tranche aborts", "✓".bright_green());
            passed += 1;
        }
        Err(e) => {
            println!("{} Duplicate tranche: {}", "✗".bright_red(), e);
            failed += 1;
        }
    }

    match test_tiny_position_aborts() {
        Ok(_) => {
            println!("{} Tiny position has no valid root", "✓".bright_green());
            passed += 1;
        }
        Err(e) => {
            println!("{} Tiny position: {}", "✗".bright_red(), e);
            failed += 1;
        }
    }

    print_summary(passed, failed)
}

fn print_summary(passed: usize, failed: usize) -> Result<()> {
    println!(
        "\n{} {} passed, {} failed",
        "Summary:".bright_cyan().bold(),
        passed.to_string().bright_green(),
        failed.to_string().bright_red()
    );
    if failed > 0 {
        anyhow::bail!("{} test(s) failed", failed);
    }
    Ok(())
}

// ============================================================================
// Fixtures
// ============================================================================

fn n(name: &str) -> AccountName {
    AccountName::new(name).expect("static name")
}

fn sym(code: &str) -> TokenSymbol {
    TokenSymbol::new(SymbolCode::new(code).expect("static code"), 4).expect("static symbol")
}

fn asset(amount: i64, code: &str) -> Asset {
    Asset::new(amount, sym(code))
}

fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        self_account: n("migration"),
        multi_converter_account: n("multiconvert"),
        multi_tokens_ledger: n("multi4tokens"),
        network_account: n("thisisbancor"),
        network_token: SymbolCode::new("BNT").expect("static code"),
        reserved_accounts: vec![n("eosio.ram"), n("eosio.stake"), n("eosio.rex")],
    }
}

/// Legacy converter: 100.0000 OLD supply (all alice's) against
/// 500.0000 BNT and 1000.0000 EOS
fn fixture() -> Result<SimHarness> {
    let mut world = SimWorld::new(settings());
    world.create_token(n("bntbntbntbnt"), sym("BNT"))?;
    world.create_token(n("eosio.token"), sym("EOS"))?;
    world.create_token(n("old.relay"), sym("OLD"))?;
    world.issue(n("bntbntbntbnt"), n("oldconverter"), asset(5_000_000, "BNT"))?;
    world.issue(n("eosio.token"), n("oldconverter"), asset(10_000_000, "EOS"))?;
    world.issue(n("old.relay"), n("alice"), asset(1_000_000, "OLD"))?;
    world.add_legacy_converter(
        n("oldconverter"),
        LegacySettings {
            smart_contract: n("old.relay"),
            smart_currency: sym("OLD"),
            smart_enabled: true,
            enabled: true,
            require_balance: false,
            fee: 3000,
        },
        vec![
            LegacyReserve {
                ledger: n("bntbntbntbnt"),
                symbol: sym("BNT"),
                ratio: HALF_RATIO,
            },
            LegacyReserve {
                ledger: n("eosio.token"),
                symbol: sym("EOS"),
                ratio: HALF_RATIO,
            },
        ],
    );

    let mut orchestrator = MigrationOrchestrator::new(settings());
    orchestrator.register_converter(&n("migration"), SymbolCode::new("OLD")?, n("oldconverter"), n("alice"))?;
    Ok(SimHarness::new(orchestrator, world))
}

fn expect(cond: bool, what: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(anyhow!("expected {}", what))
    }
}

// ============================================================================
// Scenarios
// ============================================================================

fn test_new_pool_migration() -> Result<()> {
    let mut harness = fixture()?;
    harness.deposit(n("alice"), asset(1_000_000, "OLD"), vec![n("alice")])?;

    let eosold = SymbolCode::new("EOSOLD")?;
    let pool = harness
        .world
        .pools
        .get(&eosold)
        .ok_or_else(|| anyhow!("replacement pool missing"))?;
    expect(pool.owner == n("alice"), "governance handed to initiator")?;
    expect(pool.fee == 3000, "legacy fee mirrored")?;

    let held = harness
        .world
        .balance_of(&n("multi4tokens"), &n("alice"), eosold)?;
    expect(held.amount == 1_000_000, "initiator holds the pool tokens")?;
    expect(
        harness.orchestrator.migrations().find(SymbolCode::new("OLD")?).is_none(),
        "record cleared",
    )
}

fn test_existing_pool_migration() -> Result<()> {
    let mut harness = fixture()?;
    harness.world.add_destination_pool(
        sym("EOSOLD"),
        n("poolowner"),
        2500,
        vec![
            SimMultiReserve {
                ledger: n("bntbntbntbnt"),
                symbol: sym("BNT"),
                ratio: HALF_RATIO,
                balance: 10_000_000,
            },
            SimMultiReserve {
                ledger: n("eosio.token"),
                symbol: sym("EOS"),
                ratio: HALF_RATIO,
                balance: 40_000_000,
            },
        ],
        asset(1_000_000, "EOSOLD"),
        n("poolowner"),
    )?;
    harness
        .world
        .issue(n("bntbntbntbnt"), n("multiconvert"), asset(10_000_000, "BNT"))?;
    harness
        .world
        .issue(n("eosio.token"), n("multiconvert"), asset(40_000_000, "EOS"))?;

    harness.deposit(n("alice"), asset(1_000_000, "OLD"), vec![n("alice")])?;

    // Liquidation contributes 4_999_999 BNT and 10_000_000 EOS; the EOS
    // leg binds at floor(1e6 * 1e7 / 4e7) = 250_000 minted pool tokens
    let eosold = SymbolCode::new("EOSOLD")?;
    let minted = harness
        .world
        .balance_of(&n("multi4tokens"), &n("alice"), eosold)?;
    expect(minted.amount == 250_000, "binding minimum minted")?;

    let refund = harness
        .world
        .balance_of(&n("bntbntbntbnt"), &n("alice"), SymbolCode::new("BNT")?)?;
    expect(refund.amount == 2_499_999, "excess BNT refunded")?;

    let pool = &harness.world.pools[&eosold];
    expect(pool.owner == n("poolowner"), "existing governance untouched")?;
    expect(
        harness.orchestrator.migrations().find(SymbolCode::new("OLD")?).is_none(),
        "record cleared",
    )
}

fn test_unregistered_deposit_ignored() -> Result<()> {
    let mut harness = fixture()?;
    harness.world.create_token(n("misc.token"), sym("MISC"))?;
    harness
        .world
        .issue(n("misc.token"), n("bob"), asset(500, "MISC"))?;

    harness.deposit(n("bob"), asset(500, "MISC"), vec![n("bob")])?;
    expect(
        harness.orchestrator.migrations().find(SymbolCode::new("MISC")?).is_none(),
        "no record for unregistered token",
    )
}

fn test_duplicate_tranche_aborts() -> Result<()> {
    let mut harness = fixture()?;
    let deposit = harness.world.transfer(
        n("old.relay"),
        n("alice"),
        n("migration"),
        asset(1_000_000, "OLD"),
        String::from("migrate"),
        vec![n("alice")],
    )?;
    harness
        .orchestrator
        .handle_transfer(&harness.world, &deposit[0])?;

    let tranche = TransferNotice {
        ledger: n("bntbntbntbnt"),
        from: n("oldconverter"),
        to: n("migration"),
        quantity: asset(100, "BNT"),
        memo: String::from("convert"),
        authorizations: vec![n("oldconverter")],
    };
    harness.orchestrator.handle_transfer(&harness.world, &tranche)?;
    let err = harness
        .orchestrator
        .handle_transfer(&harness.world, &tranche)
        .err()
        .ok_or_else(|| anyhow!("duplicate tranche accepted"))?;
    expect(
        matches!(err, MigrationError::DuplicateReserveTranche(_)),
        "duplicate tranche error",
    )
}

fn test_tiny_position_aborts() -> Result<()> {
    let mut harness = fixture()?;
    harness.world.transfer(
        n("old.relay"),
        n("alice"),
        n("bob"),
        asset(999_999, "OLD"),
        String::new(),
        vec![n("alice")],
    )?;

    let err = harness
        .deposit(n("alice"), asset(1, "OLD"), vec![n("alice")])
        .err()
        .ok_or_else(|| anyhow!("one-unit position accepted"))?;
    expect(
        matches!(
            err,
            RunError::Migration(MigrationError::Math(MathError::NoValidRoot { .. }))
        ),
        "no-valid-root abort",
    )?;
    expect(
        harness.orchestrator.migrations().find(SymbolCode::new("OLD")?).is_none(),
        "no record created",
    )
}
