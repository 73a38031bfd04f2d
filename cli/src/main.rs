//! Migrator CLI - drive and inspect legacy-pool migrations
//!
//! Commands operate on a JSON-persisted world (ledgers, converters,
//! orchestrator state). A deposit normally carries a migration all the way
//! through; the step commands exist to re-drive an aborted run.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod admin;
mod config;
mod migrate;
mod setup;
mod status;
mod tests;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "migrator")]
#[command(about = "Pool migration orchestrator - move liquidity from legacy two-reserve pools", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the persisted world state
    #[arg(short, long, default_value = "migrator-state.json")]
    state: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a fresh world from a TOML scenario
    Setup {
        /// Scenario file (ledgers, converters, balances)
        #[arg(short = 'c', long)]
        scenario: PathBuf,
    },

    /// Converter registry administration
    Converter {
        #[command(subcommand)]
        command: ConverterCommands,
    },

    /// Send legacy pool tokens to the orchestrator and run the cascade
    Deposit {
        /// Sending account (and migration initiator)
        from: String,

        /// Quantity, e.g. "100.0000 OLD"
        quantity: String,

        /// Additional authorizing principals (e.g. the converter owner)
        #[arg(long)]
        auth: Vec<String>,
    },

    /// Re-drive the funding stage of a parked migration
    Fund {
        /// Legacy pool token symbol
        token: String,
    },

    /// Forward accumulated replacement pool tokens
    Forward {
        /// Recipient account
        to: String,

        /// Replacement pool token symbol
        token: String,
    },

    /// Pull back over-contributed reserves from the destination pool
    Reclaim {
        /// Legacy pool token symbol
        token: String,
    },

    /// Assert zero residual balances and clear the record
    Verify {
        /// Legacy pool token symbol
        token: String,
    },

    /// Show in-flight migrations and the disambiguation context
    Status {
        /// Restrict to one legacy token symbol
        token: Option<String>,
    },

    /// Show an account's balances across all ledgers
    Balances {
        /// Account name
        account: String,
    },

    /// Run the end-to-end suites against a fresh in-memory world
    Test {
        /// Run new-pool migration tests
        #[arg(long)]
        new_pool: bool,

        /// Run existing-pool migration tests
        #[arg(long)]
        existing_pool: bool,

        /// Run failure-path tests
        #[arg(long)]
        failures: bool,

        /// Run all tests
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum ConverterCommands {
    /// Register a legacy converter for migration
    Add {
        /// Legacy pool token symbol
        token: String,

        /// Legacy converter account
        account: String,

        /// Registered owner (consents to new-pool creation)
        owner: String,
    },

    /// Remove a registry entry
    Remove {
        /// Legacy pool token symbol
        token: String,
    },

    /// List registered converters
    List,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = CliConfig::new(cli.state, cli.verbose);

    if config.verbose {
        println!(
            "{} {}",
            "State file:".bright_cyan(),
            config.state_path.display()
        );
    }

    match cli.command {
        Commands::Setup { scenario } => {
            setup::setup_world(&config, &scenario)?;
        }
        Commands::Converter { command } => match command {
            ConverterCommands::Add {
                token,
                account,
                owner,
            } => {
                admin::add_converter(&config, token, account, owner)?;
            }
            ConverterCommands::Remove { token } => {
                admin::remove_converter(&config, token)?;
            }
            ConverterCommands::List => {
                admin::list_converters(&config)?;
            }
        },
        Commands::Deposit {
            from,
            quantity,
            auth,
        } => {
            migrate::deposit(&config, from, quantity, auth)?;
        }
        Commands::Fund { token } => {
            migrate::fund(&config, token)?;
        }
        Commands::Forward { to, token } => {
            migrate::forward(&config, to, token)?;
        }
        Commands::Reclaim { token } => {
            migrate::reclaim(&config, token)?;
        }
        Commands::Verify { token } => {
            migrate::verify(&config, token)?;
        }
        Commands::Status { token } => {
            status::show_status(&config, token)?;
        }
        Commands::Balances { account } => {
            status::show_balances(&config, account)?;
        }
        Commands::Test {
            new_pool,
            existing_pool,
            failures,
            all,
        } => {
            println!("{}", "Running test suite...".bright_green().bold());
            if all || new_pool {
                tests::run_new_pool_tests()?;
            }
            if all || existing_pool {
                tests::run_existing_pool_tests()?;
            }
            if all || failures {
                tests::run_failure_tests()?;
            }
        }
    }

    Ok(())
}
