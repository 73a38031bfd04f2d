//! Orchestrator settings
//!
//! Collaborator accounts and the network token, configurable at runtime by
//! the admin instead of baked in as constants.

use serde::{Deserialize, Serialize};

use crate::types::{AccountName, SymbolCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// The orchestrator's own account; also the admin/operator principal
    pub self_account: AccountName,
    /// Destination multi-reserve converter
    pub multi_converter_account: AccountName,
    /// Token ledger issuing the destination pool tokens
    pub multi_tokens_ledger: AccountName,
    /// Conversion network the liquidation transfers route through
    pub network_account: AccountName,
    /// Network/base token; the reserve that is *not* this token names the
    /// replacement pool
    pub network_token: SymbolCode,
    /// System accounts whose incidental transfers are ignored
    pub reserved_accounts: Vec<AccountName>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        let name = |s: &str| AccountName::new(s).expect("static name");
        OrchestratorSettings {
            self_account: name("migration"),
            multi_converter_account: name("multiconvert"),
            multi_tokens_ledger: name("multi4tokens"),
            network_account: name("thisisbancor"),
            network_token: SymbolCode::new("BNT").expect("static code"),
            reserved_accounts: vec![
                name("eosio.ram"),
                name("eosio.stake"),
                name("eosio.rex"),
            ],
        }
    }
}
