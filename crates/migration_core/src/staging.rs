//! Reserve staging store
//!
//! Holds the reserve tranches received while a liquidation is in flight,
//! keyed per migration and per reserve symbol. The protocol assumes at most
//! one tranche per reserve per migration, so staging the same reserve twice
//! is fatal. The set is drained entry-by-entry when funding begins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MigrationError;
use crate::types::{AccountName, Asset, SymbolCode};

/// One liquidated reserve tranche awaiting funding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedReserve {
    pub quantity: Asset,
    /// Token ledger the tranche arrived on (and is forwarded through)
    pub ledger: AccountName,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReserveStaging {
    staged: BTreeMap<SymbolCode, BTreeMap<SymbolCode, StagedReserve>>,
}

impl ReserveStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a tranche for `migration`; a second tranche of the same
    /// reserve is a protocol violation
    pub fn stage(
        &mut self,
        migration: SymbolCode,
        quantity: Asset,
        ledger: AccountName,
    ) -> Result<usize, MigrationError> {
        let reserves = self.staged.entry(migration).or_default();
        let code = quantity.symbol.code;
        if reserves.contains_key(&code) {
            return Err(MigrationError::DuplicateReserveTranche(code));
        }
        reserves.insert(code, StagedReserve { quantity, ledger });
        Ok(reserves.len())
    }

    pub fn count(&self, migration: SymbolCode) -> usize {
        self.staged.get(&migration).map_or(0, |r| r.len())
    }

    /// Remove and return every staged tranche for `migration`
    pub fn drain(&mut self, migration: SymbolCode) -> Vec<StagedReserve> {
        self.staged
            .remove(&migration)
            .map(|reserves| reserves.into_values().collect())
            .unwrap_or_default()
    }

    pub fn iter(&self, migration: SymbolCode) -> impl Iterator<Item = &StagedReserve> {
        self.staged.get(&migration).into_iter().flat_map(|r| r.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenSymbol;

    fn asset(code: &str, amount: i64) -> Asset {
        Asset::new(
            amount,
            TokenSymbol::new(SymbolCode::new(code).unwrap(), 4).unwrap(),
        )
    }

    #[test]
    fn test_duplicate_tranche_is_fatal() {
        let migration = SymbolCode::new("BNTEOS").unwrap();
        let ledger = AccountName::new("eosio.token").unwrap();
        let mut staging = ReserveStaging::new();

        assert_eq!(staging.stage(migration, asset("EOS", 100), ledger).unwrap(), 1);
        assert_eq!(staging.stage(migration, asset("BNT", 250), ledger).unwrap(), 2);
        assert_eq!(
            staging.stage(migration, asset("EOS", 5), ledger),
            Err(MigrationError::DuplicateReserveTranche(
                SymbolCode::new("EOS").unwrap()
            ))
        );
    }

    #[test]
    fn test_drain_empties_the_set() {
        let migration = SymbolCode::new("BNTEOS").unwrap();
        let ledger = AccountName::new("eosio.token").unwrap();
        let mut staging = ReserveStaging::new();
        staging.stage(migration, asset("EOS", 100), ledger).unwrap();
        staging.stage(migration, asset("BNT", 250), ledger).unwrap();

        let drained = staging.drain(migration);
        assert_eq!(drained.len(), 2);
        assert_eq!(staging.count(migration), 0);
        assert!(staging.drain(migration).is_empty());
    }
}
