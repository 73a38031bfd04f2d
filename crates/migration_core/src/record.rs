//! Per-migration records and the stage machine
//!
//! One record exists per legacy token symbol while a migration is in
//! flight. The record carries everything a later invocation needs to
//! resume: the stage, the initiator, the derived replacement token and
//! whether the destination pool pre-existed. Stages only ever increase.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MigrationError;
use crate::types::{AccountName, SymbolCode, TokenSymbol};

/// Migration stage, strictly increasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MigrationStage {
    Initial,
    Liquidation,
    Funding,
    Done,
}

impl MigrationStage {
    /// Next stage; advancing past `Done` is a fatal error
    pub fn next(self) -> Result<MigrationStage, MigrationError> {
        match self {
            MigrationStage::Initial => Ok(MigrationStage::Liquidation),
            MigrationStage::Liquidation => Ok(MigrationStage::Funding),
            MigrationStage::Funding => Ok(MigrationStage::Done),
            MigrationStage::Done => Err(MigrationError::StageOverflow),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MigrationStage::Initial => "INITIAL",
            MigrationStage::Liquidation => "LIQUIDATION",
            MigrationStage::Funding => "FUNDING",
            MigrationStage::Done => "DONE",
        }
    }
}

/// State of one in-flight migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Legacy pool token (symbol + precision)
    pub legacy_token: TokenSymbol,
    /// Replacement pool token assigned at initiation
    pub new_token: SymbolCode,
    /// Legacy converter being drained
    pub legacy_pool_account: AccountName,
    /// Current stage
    pub stage: MigrationStage,
    /// Principal who triggered the migration and receives the new tokens
    pub initiator: AccountName,
    /// Whether the destination pool existed before this migration
    pub new_pool_preexisting: bool,
    /// Reserve tranches expected during liquidation
    pub expected_reserves: usize,
}

/// Record store keyed by the legacy token symbol
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MigrationStore {
    records: BTreeMap<SymbolCode, MigrationRecord>,
}

impl MigrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the record for a new migration; exactly one may be in flight
    /// per legacy token
    pub fn create(
        &mut self,
        token: SymbolCode,
        record: MigrationRecord,
    ) -> Result<(), MigrationError> {
        if self.records.contains_key(&token) {
            return Err(MigrationError::MigrationAlreadyActive(token));
        }
        self.records.insert(token, record);
        Ok(())
    }

    pub fn get(&self, token: SymbolCode) -> Result<&MigrationRecord, MigrationError> {
        self.records
            .get(&token)
            .ok_or(MigrationError::MigrationNotFound(token))
    }

    pub fn find(&self, token: SymbolCode) -> Option<&MigrationRecord> {
        self.records.get(&token)
    }

    /// Advance the record's stage by one
    pub fn advance_stage(&mut self, token: SymbolCode) -> Result<MigrationStage, MigrationError> {
        let record = self
            .records
            .get_mut(&token)
            .ok_or(MigrationError::MigrationNotFound(token))?;
        let next = record.stage.next()?;
        log::info!("migration {}: {} -> {}", token, record.stage.name(), next.name());
        record.stage = next;
        Ok(next)
    }

    /// Delete a completed record; rejected before `Done`
    pub fn clear(&mut self, token: SymbolCode) -> Result<(), MigrationError> {
        let record = self.get(token)?;
        if record.stage != MigrationStage::Done {
            return Err(MigrationError::ClearBeforeDone(token));
        }
        self.records.remove(&token);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SymbolCode, &MigrationRecord)> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolCode;

    fn record(stage: MigrationStage) -> MigrationRecord {
        MigrationRecord {
            legacy_token: TokenSymbol::new(SymbolCode::new("OLD").unwrap(), 4).unwrap(),
            new_token: SymbolCode::new("R2OLD").unwrap(),
            legacy_pool_account: AccountName::new("oldconverter").unwrap(),
            stage,
            initiator: AccountName::new("alice").unwrap(),
            new_pool_preexisting: false,
            expected_reserves: 2,
        }
    }

    #[test]
    fn test_stage_is_monotonic() {
        let mut stage = MigrationStage::Initial;
        for expected in [
            MigrationStage::Liquidation,
            MigrationStage::Funding,
            MigrationStage::Done,
        ] {
            stage = stage.next().unwrap();
            assert_eq!(stage, expected);
        }
        assert_eq!(stage.next(), Err(MigrationError::StageOverflow));
    }

    #[test]
    fn test_single_record_per_token() {
        let token = SymbolCode::new("OLD").unwrap();
        let mut store = MigrationStore::new();
        store.create(token, record(MigrationStage::Initial)).unwrap();
        assert_eq!(
            store.create(token, record(MigrationStage::Initial)),
            Err(MigrationError::MigrationAlreadyActive(token))
        );
    }

    #[test]
    fn test_clear_requires_done() {
        let token = SymbolCode::new("OLD").unwrap();
        let mut store = MigrationStore::new();
        store.create(token, record(MigrationStage::Funding)).unwrap();
        assert_eq!(
            store.clear(token),
            Err(MigrationError::ClearBeforeDone(token))
        );

        store.advance_stage(token).unwrap();
        store.clear(token).unwrap();
        // Clearing an absent record reports not-found, it does not panic
        assert_eq!(
            store.clear(token),
            Err(MigrationError::MigrationNotFound(token))
        );
    }
}
