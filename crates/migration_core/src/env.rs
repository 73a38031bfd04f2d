//! Collaborator interfaces
//!
//! The orchestrator reads collaborator state synchronously through these
//! traits and never writes through them; every mutation it wants is
//! returned to the host as an [`Effect`](crate::effects::Effect). The
//! in-memory [`sim`](crate::sim) world implements all three for tests and
//! the CLI harness.

use serde::{Deserialize, Serialize};

use crate::error::EnvError;
use crate::types::{AccountName, Asset, SymbolCode, TokenSymbol};

/// Balance and supply queries against a token ledger account
pub trait TokenLedger {
    fn balance_of(
        &self,
        ledger: &AccountName,
        owner: &AccountName,
        code: SymbolCode,
    ) -> Result<Asset, EnvError>;

    fn supply_of(&self, ledger: &AccountName, code: SymbolCode) -> Result<Asset, EnvError>;
}

/// Configuration of a legacy two-reserve converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySettings {
    /// Ledger holding the legacy pool token
    pub smart_contract: AccountName,
    /// The legacy pool token
    pub smart_currency: TokenSymbol,
    pub smart_enabled: bool,
    pub enabled: bool,
    pub require_balance: bool,
    /// Conversion fee in parts-per-million
    pub fee: u32,
}

/// One reserve of a legacy converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyReserve {
    pub ledger: AccountName,
    pub symbol: TokenSymbol,
    /// Reserve ratio in parts-per-million (500_000 = 50%)
    pub ratio: u32,
}

/// Read access to the legacy converter being migrated
pub trait LegacyConverterApi {
    fn settings(&self, converter: &AccountName) -> Result<LegacySettings, EnvError>;

    fn reserves(&self, converter: &AccountName) -> Result<Vec<LegacyReserve>, EnvError>;
}

/// One reserve of the destination multi-reserve converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiReserve {
    pub ledger: AccountName,
    pub balance: Asset,
    pub ratio: u32,
}

/// Read access to the destination pool service
///
/// Pool token supplies are read from the multi-token ledger through
/// [`TokenLedger`], not here.
pub trait MultiConverterApi {
    fn converter_exists(&self, token: SymbolCode) -> bool;

    fn reserve(&self, token: SymbolCode, reserve: SymbolCode) -> Result<MultiReserve, EnvError>;

    fn reserve_codes(&self, token: SymbolCode) -> Result<Vec<SymbolCode>, EnvError>;

    /// Over-contributed balance parked for `owner` against one reserve,
    /// awaiting `fund` or withdrawal
    fn account_balance(
        &self,
        owner: &AccountName,
        token: SymbolCode,
        reserve: SymbolCode,
    ) -> Option<Asset>;
}

/// Everything the orchestrator needs to observe, in one bound
pub trait Environment: TokenLedger + LegacyConverterApi + MultiConverterApi {}

impl<T: TokenLedger + LegacyConverterApi + MultiConverterApi> Environment for T {}
