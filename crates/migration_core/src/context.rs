//! Disambiguation context
//!
//! While a liquidation is mid-flight, the reserve transfers it provokes are
//! indistinguishable from unrelated deposits of the same token types. This
//! single-slot pointer names the migration that owns every ambiguous
//! inbound transfer until the expected reserve count has been staged.
//!
//! It behaves as a non-blocking advisory lock: set-if-absent, released
//! exactly once, and a conflicting acquisition aborts rather than waits.

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;
use crate::types::SymbolCode;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DisambiguationContext {
    current: Option<SymbolCode>,
}

impl DisambiguationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<SymbolCode> {
        self.current
    }

    pub fn is_set(&self) -> bool {
        self.current.is_some()
    }

    /// Claim the context for `migration`; fatal if any migration holds it
    pub fn acquire(&mut self, migration: SymbolCode) -> Result<(), MigrationError> {
        if let Some(holder) = self.current {
            return Err(MigrationError::ContextAlreadySet(holder));
        }
        self.current = Some(migration);
        Ok(())
    }

    /// Release the context once the expected reserves are staged
    pub fn release(&mut self) -> Result<SymbolCode, MigrationError> {
        self.current.take().ok_or(MigrationError::ContextNotSet)
    }
}
