//! Migration driving commands
//!
//! `deposit` injects a legacy-token transfer and pumps the event cascade
//! to quiescence; a healthy migration completes in that one invocation.
//! The remaining commands re-drive individual steps after an aborted run.

use anyhow::{Context, Result};
use colored::Colorize;

use migration_core::{AccountName, Asset, FollowUp, SymbolCode};

use crate::config::{load_harness, save_harness, CliConfig};

pub fn deposit(
    config: &CliConfig,
    from: String,
    quantity: String,
    extra_auth: Vec<String>,
) -> Result<()> {
    let mut harness = load_harness(&config.state_path)?;
    let from: AccountName = from.parse()?;
    let quantity: Asset = quantity
        .parse()
        .with_context(|| format!("Invalid quantity: {:?}", quantity))?;

    let mut authorizations = vec![from];
    for auth in extra_auth {
        authorizations.push(auth.parse()?);
    }

    println!(
        "{} {} {} {}",
        "Depositing".bright_green(),
        quantity,
        "from".bright_green(),
        from
    );
    // The whole cascade commits or none of it does: the state file is
    // only rewritten after the event queue drains cleanly
    harness.deposit(from, quantity, authorizations)?;
    save_harness(&config.state_path, &harness)?;
    log::info!("deposit cascade for {} drained", quantity.symbol.code);

    match harness.orchestrator.migrations().find(quantity.symbol.code) {
        None => println!("{}", "Migration completed and cleared".bright_green().bold()),
        Some(record) => println!(
            "{} {}",
            "Migration parked at stage".yellow(),
            record.stage.name().bright_yellow()
        ),
    }
    Ok(())
}

fn run_step(config: &CliConfig, follow_up: FollowUp, done: &str) -> Result<()> {
    let mut harness = load_harness(&config.state_path)?;
    harness.run_step(follow_up)?;
    save_harness(&config.state_path, &harness)?;
    println!("{}", done.bright_green());
    Ok(())
}

pub fn fund(config: &CliConfig, token: String) -> Result<()> {
    let token: SymbolCode = token.parse()?;
    run_step(config, FollowUp::FundMigration(token), "Funding step driven")
}

pub fn forward(config: &CliConfig, to: String, token: String) -> Result<()> {
    let to: AccountName = to.parse()?;
    let token: SymbolCode = token.parse()?;
    run_step(
        config,
        FollowUp::ForwardPoolTokens { to, token },
        "Pool tokens forwarded",
    )
}

pub fn reclaim(config: &CliConfig, token: String) -> Result<()> {
    let token: SymbolCode = token.parse()?;
    run_step(
        config,
        FollowUp::ReclaimReserves(token),
        "Stray reserves reclaimed",
    )
}

pub fn verify(config: &CliConfig, token: String) -> Result<()> {
    let token: SymbolCode = token.parse()?;
    run_step(
        config,
        FollowUp::VerifyComplete(token),
        "Verified complete; record cleared",
    )
}
