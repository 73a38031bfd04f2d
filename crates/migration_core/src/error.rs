//! Error types for the migration orchestrator
//!
//! Every failure is fatal-and-abort: a failed step returns before mutating
//! any store, leaving prior-committed state untouched. There is no retry
//! machinery; the operator re-drives the step once the condition is fixed.

use thiserror::Error;

use crate::types::{AccountName, SymbolCode, TypeError};
use migration_model::MathError;

/// Failures surfaced by collaborator queries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("token ledger {ledger} has no entry for {what}")]
    LedgerEntryNotFound { ledger: AccountName, what: String },
    #[error("legacy converter {0} settings do not exist")]
    ConverterSettingsNotFound(AccountName),
    #[error("destination converter {0} not found")]
    DestinationConverterNotFound(SymbolCode),
    #[error("destination reserve {reserve} not found on {converter}")]
    DestinationReserveNotFound {
        converter: SymbolCode,
        reserve: SymbolCode,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    // Precondition violations: abort, no state change
    #[error("converter {0} is not registered")]
    ConverterNotRegistered(SymbolCode),
    #[error("converter {0} is already registered")]
    ConverterAlreadyRegistered(SymbolCode),
    #[error("no migration in flight for {0}")]
    MigrationNotFound(SymbolCode),
    #[error("a migration for {0} is already in flight")]
    MigrationAlreadyActive(SymbolCode),
    #[error("migration for {token} is at stage {actual}, expected {expected}")]
    WrongStage {
        token: SymbolCode,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("operation requires authorization of {expected}, got {actual}")]
    Unauthorized {
        expected: AccountName,
        actual: AccountName,
    },
    #[error("transfer of {0} did not arrive on the registered token ledger")]
    UnknownTokenContract(SymbolCode),
    #[error("pool creation requires authorization of the registered owner {0}")]
    OwnerConsentMissing(AccountName),

    // Numeric impossibility: configuration/data inconsistency
    #[error("liquidation math failed: {0:?}")]
    Math(MathError),
    #[error("legacy converter {0} must hold exactly two reserves")]
    TwoReservesRequired(AccountName),
    #[error("every reserve of {0} is the network token; no replacement symbol")]
    NoReplacementReserve(SymbolCode),

    // Protocol violations: bug or unexpected transfer pattern
    #[error("reserve {0} already staged for this migration; not supported")]
    DuplicateReserveTranche(SymbolCode),
    #[error("disambiguation context already set for {0}")]
    ContextAlreadySet(SymbolCode),
    #[error("disambiguation context is not set")]
    ContextNotSet,
    #[error("migration stage cannot advance past DONE")]
    StageOverflow,
    #[error("no reserves staged for {0}")]
    NothingStaged(SymbolCode),
    #[error("unexpected transfer of {token} at stage {stage}")]
    UnexpectedTransfer {
        token: SymbolCode,
        stage: &'static str,
    },

    // Post-condition failures: record left in place for inspection
    #[error("residual balance of {0} remains on the orchestrator account")]
    ResidualBalance(crate::types::Asset),
    #[error("cannot clear migration for {0} before it reaches DONE")]
    ClearBeforeDone(SymbolCode),

    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl From<MathError> for MigrationError {
    fn from(e: MathError) -> Self {
        MigrationError::Math(e)
    }
}
