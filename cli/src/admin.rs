//! Converter registry administration

use anyhow::Result;
use colored::Colorize;

use migration_core::{AccountName, SymbolCode};

use crate::config::{load_harness, save_harness, CliConfig};

pub fn add_converter(
    config: &CliConfig,
    token: String,
    account: String,
    owner: String,
) -> Result<()> {
    let mut harness = load_harness(&config.state_path)?;
    let token: SymbolCode = token.parse()?;
    let account: AccountName = account.parse()?;
    let owner: AccountName = owner.parse()?;

    let admin = harness.orchestrator.settings().self_account;
    harness
        .orchestrator
        .register_converter(&admin, token, account, owner)?;
    save_harness(&config.state_path, &harness)?;

    println!("{}", "=== Converter Registered ===".bright_green().bold());
    println!("{} {}", "Token:".bright_cyan(), token);
    println!("{} {}", "Legacy account:".bright_cyan(), account);
    println!("{} {}", "Owner:".bright_cyan(), owner);
    Ok(())
}

pub fn remove_converter(config: &CliConfig, token: String) -> Result<()> {
    let mut harness = load_harness(&config.state_path)?;
    let token: SymbolCode = token.parse()?;

    let admin = harness.orchestrator.settings().self_account;
    harness.orchestrator.unregister_converter(&admin, token)?;
    save_harness(&config.state_path, &harness)?;

    println!("{} {}", "Unregistered converter".bright_green(), token);
    Ok(())
}

pub fn list_converters(config: &CliConfig) -> Result<()> {
    let harness = load_harness(&config.state_path)?;

    println!("{}", "=== Registered Converters ===".bright_green().bold());
    let mut count = 0;
    for (token, entry) in harness.orchestrator.registry().iter() {
        println!(
            "  {} {} {} (owner {})",
            token.to_string().bright_yellow(),
            "->".dimmed(),
            entry.legacy_pool_account,
            entry.owner
        );
        count += 1;
    }
    if count == 0 {
        println!("{}", "  (none)".dimmed());
    }
    Ok(())
}
