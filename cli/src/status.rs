//! Inspection commands

use anyhow::Result;
use colored::Colorize;

use migration_core::{AccountName, Asset, SymbolCode};

use crate::config::{load_harness, CliConfig};

pub fn show_status(config: &CliConfig, token: Option<String>) -> Result<()> {
    let harness = load_harness(&config.state_path)?;
    let filter = token.map(|t| t.parse::<SymbolCode>()).transpose()?;

    println!("{}", "=== Migration Status ===".bright_green().bold());
    match harness.orchestrator.context().current() {
        Some(holder) => println!(
            "{} {}",
            "Disambiguation context held by:".bright_cyan(),
            holder.to_string().bright_yellow()
        ),
        None => println!("{} {}", "Disambiguation context:".bright_cyan(), "free".dimmed()),
    }

    let mut shown = 0;
    for (token, record) in harness.orchestrator.migrations().iter() {
        if filter.is_some() && filter != Some(*token) {
            continue;
        }
        shown += 1;
        println!(
            "\n{} {}",
            token.to_string().bright_yellow().bold(),
            format!("[{}]", record.stage.name()).bright_magenta()
        );
        println!("  {} {}", "Legacy pool:".bright_cyan(), record.legacy_pool_account);
        println!("  {} {}", "Replacement token:".bright_cyan(), record.new_token);
        println!("  {} {}", "Initiator:".bright_cyan(), record.initiator);
        println!(
            "  {} {}",
            "Destination pool:".bright_cyan(),
            if record.new_pool_preexisting {
                "pre-existing"
            } else {
                "created by this migration"
            }
        );
        let staged: Vec<String> = harness
            .orchestrator
            .staging()
            .iter(*token)
            .map(|r| r.quantity.to_string())
            .collect();
        println!(
            "  {} {}/{} {}",
            "Staged reserves:".bright_cyan(),
            staged.len(),
            record.expected_reserves,
            if staged.is_empty() {
                String::new()
            } else {
                format!("({})", staged.join(", "))
            }
        );
    }
    if shown == 0 {
        println!("\n{}", "No migrations in flight".dimmed());
    }
    Ok(())
}

pub fn show_balances(config: &CliConfig, account: String) -> Result<()> {
    let harness = load_harness(&config.state_path)?;
    let account: AccountName = account.parse()?;

    println!("{}", "=== Balances ===".bright_green().bold());
    println!("{} {}\n", "Account:".bright_cyan(), account);

    let mut any = false;
    for (ledger_name, ledger) in &harness.world.ledgers {
        for token in ledger.tokens.values() {
            if let Some(amount) = token.balances.get(&account) {
                if *amount != 0 {
                    any = true;
                    println!(
                        "  {} {}",
                        Asset::new(*amount, token.symbol).to_string().bright_yellow(),
                        format!("({})", ledger_name).dimmed()
                    );
                }
            }
        }
    }
    if !any {
        println!("{}", "  (no balances)".dimmed());
    }
    Ok(())
}
