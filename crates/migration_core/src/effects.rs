//! Inbound notices and outbound effects
//!
//! A step never calls a collaborator directly: it commits its own state,
//! then returns the outbound requests as a list of effects for the host to
//! deliver. A crash between commit and delivery is recoverable by replaying
//! the step against the persisted record, not by an in-memory
//! continuation. `Continue` effects are requests the orchestrator sends to
//! itself; the host re-enters it at the named step once earlier effects
//! have settled.

use serde::{Deserialize, Serialize};

use crate::types::{AccountName, Asset, SymbolCode, TokenSymbol};

/// Memo attached when forwarding replacement pool tokens
pub const POOL_TOKENS_MEMO: &str = "new converter pool tokens";

/// Memo attached when refunding over-contributed reserves
pub const REFUND_MEMO: &str = "pool tokens migration reserves refund";

/// A token-ledger transfer notification delivered to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferNotice {
    /// Ledger account the transfer executed on
    pub ledger: AccountName,
    pub from: AccountName,
    pub to: AccountName,
    pub quantity: Asset,
    pub memo: String,
    /// Principals that authorized the triggering transaction
    pub authorizations: Vec<AccountName>,
}

/// Self-scheduled continuation steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowUp {
    /// Drive the FUNDING stage for a migration
    FundMigration(SymbolCode),
    /// Pull back over-contributed reserves from the destination pool
    ReclaimReserves(SymbolCode),
    /// Forward accumulated replacement pool tokens
    ForwardPoolTokens { to: AccountName, token: SymbolCode },
    /// Assert zero residual balances and clear the record
    VerifyComplete(SymbolCode),
}

/// One outbound request to a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Move tokens from the orchestrator's account
    Transfer {
        ledger: AccountName,
        to: AccountName,
        quantity: Asset,
        memo: String,
    },
    /// Update a legacy converter's configuration
    ConfigureLegacyConverter {
        converter: AccountName,
        smart_enabled: bool,
        enabled: bool,
        require_balance: bool,
        fee: u32,
    },
    /// Create the replacement pool on the destination service
    CreateConverter {
        token: SymbolCode,
        initial_supply: Asset,
    },
    /// Set the replacement pool's conversion fee
    UpdateFee { token: SymbolCode, fee: u32 },
    /// Register one reserve on the replacement pool
    SetReserve {
        token: SymbolCode,
        reserve: TokenSymbol,
        ledger: AccountName,
        ratio: u32,
    },
    /// Mint exactly this many replacement pool tokens to the orchestrator
    FundConverter { quantity: Asset },
    /// Withdraw a stray reserve balance from the destination pool
    WithdrawReserve { quantity: Asset, token: SymbolCode },
    /// Hand the replacement pool's governance to a new owner
    TransferOwnership {
        token: SymbolCode,
        new_owner: AccountName,
    },
    /// Re-enter the orchestrator at a later step
    Continue(FollowUp),
}

impl Effect {
    /// Principal and role the host must sign this effect with
    pub fn required_auth(&self, self_account: &AccountName) -> (AccountName, &'static str) {
        match self {
            // Reconfiguring the legacy pool acts as its manager role
            Effect::ConfigureLegacyConverter { converter, .. } => (*converter, "manager"),
            _ => (*self_account, "active"),
        }
    }
}

/// Conversion-path memo: `"1,<converter> <reserve>,<min_return>,<receiver>"`
///
/// The minimum return is one minor unit of the target reserve, so the
/// conversion succeeds whenever the pool has any liquidity at all and
/// slippage is left entirely to the pool's own math.
pub fn conversion_memo(
    converter: &AccountName,
    reserve: TokenSymbol,
    receiver: &AccountName,
) -> String {
    format!(
        "1,{} {},{},{}",
        converter,
        reserve.code,
        reserve.one_unit().decimal_amount(),
        receiver
    )
}

/// Funding memo tagged with the destination pool token
pub fn fund_memo(token: SymbolCode) -> String {
    format!("fund;{}", token)
}

/// Parse a funding memo back into the pool token it targets
pub fn parse_fund_memo(memo: &str) -> Option<SymbolCode> {
    memo.strip_prefix("fund;")?.parse().ok()
}
