//! Migration orchestration core
//!
//! Moves liquidity out of a legacy two-reserve converter and into a
//! multi-reserve replacement pool through a sequence of asynchronous token
//! transfers. The orchestrator is a per-pool state machine driven by
//! inbound transfer notifications and explicit operator steps; all
//! arithmetic lives in the pure `migration_model` crate, and all outbound
//! requests are returned as effects for the host to deliver.

#![forbid(unsafe_code)]

pub mod context;
pub mod effects;
pub mod env;
pub mod error;
pub mod orchestrator;
pub mod record;
pub mod registry;
pub mod settings;
pub mod sim;
pub mod staging;
pub mod types;

// Re-export commonly used types
pub use migration_model::MathError;

pub use context::DisambiguationContext;
pub use effects::{Effect, FollowUp, TransferNotice};
pub use error::{EnvError, MigrationError};
pub use orchestrator::MigrationOrchestrator;
pub use record::{MigrationRecord, MigrationStage, MigrationStore};
pub use registry::{ConverterEntry, ConverterRegistry};
pub use settings::OrchestratorSettings;
pub use types::{AccountName, Asset, SymbolCode, TokenSymbol};
