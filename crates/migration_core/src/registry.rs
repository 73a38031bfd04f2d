//! Converter registry
//!
//! Admin-maintained map from a legacy pool's token symbol to the legacy
//! converter account and its registered owner. Entries have their own
//! lifecycle, independent of migrations; a migration cannot start for a
//! token that is not registered here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MigrationError;
use crate::types::{AccountName, SymbolCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterEntry {
    pub legacy_token: SymbolCode,
    pub legacy_pool_account: AccountName,
    pub owner: AccountName,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ConverterRegistry {
    entries: BTreeMap<SymbolCode, ConverterEntry>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        token: SymbolCode,
        legacy_pool_account: AccountName,
        owner: AccountName,
    ) -> Result<(), MigrationError> {
        if self.entries.contains_key(&token) {
            return Err(MigrationError::ConverterAlreadyRegistered(token));
        }
        self.entries.insert(
            token,
            ConverterEntry {
                legacy_token: token,
                legacy_pool_account,
                owner,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, token: SymbolCode) -> Result<(), MigrationError> {
        self.entries
            .remove(&token)
            .map(|_| ())
            .ok_or(MigrationError::ConverterNotRegistered(token))
    }

    pub fn get(&self, token: SymbolCode) -> Result<&ConverterEntry, MigrationError> {
        self.entries
            .get(&token)
            .ok_or(MigrationError::ConverterNotRegistered(token))
    }

    pub fn find(&self, token: SymbolCode) -> Option<&ConverterEntry> {
        self.entries.get(&token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SymbolCode, &ConverterEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let token = SymbolCode::new("BNTEOS").unwrap();
        let mut registry = ConverterRegistry::new();
        registry
            .add(
                token,
                AccountName::new("bnt2eoscnvrt").unwrap(),
                AccountName::new("alice").unwrap(),
            )
            .unwrap();

        assert_eq!(
            registry.get(token).unwrap().legacy_pool_account.as_str(),
            "bnt2eoscnvrt"
        );
        assert_eq!(
            registry.add(
                token,
                AccountName::new("other").unwrap(),
                AccountName::new("bob").unwrap(),
            ),
            Err(MigrationError::ConverterAlreadyRegistered(token))
        );

        registry.remove(token).unwrap();
        assert_eq!(
            registry.remove(token),
            Err(MigrationError::ConverterNotRegistered(token))
        );
    }
}
