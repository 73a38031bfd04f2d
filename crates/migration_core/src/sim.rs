//! In-memory reference environment
//!
//! A self-contained world of token ledgers, legacy converters and the
//! destination multi-converter, implementing the collaborator traits the
//! orchestrator reads through. Applying an effect mutates the world and
//! yields the transfer notifications the effect provokes; the harness
//! feeds those back through the orchestrator in FIFO order, one event at a
//! time, until the queue is quiescent - the same cooperative, causal but
//! non-synchronous model the production host provides.
//!
//! Tests and the CLI both drive this world; the CLI additionally persists
//! it as JSON between invocations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

use crate::effects::{parse_fund_memo, Effect, FollowUp, TransferNotice};
use crate::env::{
    LegacyConverterApi, LegacyReserve, LegacySettings, MultiConverterApi, MultiReserve,
    TokenLedger,
};
use crate::error::{EnvError, MigrationError};
use crate::orchestrator::MigrationOrchestrator;
use crate::settings::OrchestratorSettings;
use crate::types::{AccountName, Asset, SymbolCode, TokenSymbol};

/// Reserve ratio of a balanced two-reserve converter, parts-per-million
pub const HALF_RATIO: u32 = 500_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("ledger {0} does not exist")]
    UnknownLedger(AccountName),
    #[error("token {0} does not exist on ledger {1}")]
    UnknownToken(SymbolCode, AccountName),
    #[error("token {0} is not issued by any ledger")]
    UnissuedToken(SymbolCode),
    #[error("token {0} already exists on ledger {1}")]
    DuplicateToken(SymbolCode, AccountName),
    #[error("{owner} has insufficient {token} balance on {ledger}")]
    InsufficientBalance {
        ledger: AccountName,
        owner: AccountName,
        token: SymbolCode,
    },
    #[error("must transfer positive quantity")]
    NonPositiveQuantity,
    #[error("legacy converter {0} does not exist")]
    UnknownLegacyConverter(AccountName),
    #[error("destination converter {0} does not exist")]
    UnknownDestinationConverter(SymbolCode),
    #[error("destination converter {0} already exists")]
    DuplicateDestinationConverter(SymbolCode),
    #[error("reserve {0} is not configured on converter {1}")]
    UnknownReserve(SymbolCode, SymbolCode),
    #[error("malformed conversion memo: {0:?}")]
    BadConversionMemo(String),
    #[error("conversion return below requested minimum")]
    InsufficientReturn,
    #[error("only balanced 50/50 reserves are supported, got ratio {0}")]
    UnsupportedRatio(u32),
    #[error("insufficient pending funding balance for {0}")]
    InsufficientPending(SymbolCode),
    #[error("cannot fund a converter with zero supply")]
    ZeroSupply,
    #[error("arithmetic overflow in conversion math")]
    Overflow,
}

/// One token issued on a ledger account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimToken {
    pub symbol: TokenSymbol,
    pub supply: i64,
    pub balances: BTreeMap<AccountName, i64>,
}

/// A token ledger account hosting any number of tokens
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SimLedger {
    pub tokens: BTreeMap<SymbolCode, SimToken>,
}

/// A legacy two-reserve converter; its reserve balances live on the
/// reserve ledgers under the converter's own account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimLegacyConverter {
    pub settings: LegacySettings,
    pub reserves: Vec<LegacyReserve>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimMultiReserve {
    pub ledger: AccountName,
    pub symbol: TokenSymbol,
    pub ratio: u32,
    pub balance: i64,
}

/// One pool on the destination multi-converter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimMultiPool {
    pub owner: AccountName,
    pub fee: u32,
    pub symbol: TokenSymbol,
    /// A pool stays in launch mode from creation until its governance is
    /// handed over; fund-memo transfers credit its reserves directly
    pub launching: bool,
    pub reserves: BTreeMap<SymbolCode, SimMultiReserve>,
    /// Pending funding balances per contributor and reserve, drawn down by
    /// `fund` and reclaimable by withdrawal
    pub pending: BTreeMap<AccountName, BTreeMap<SymbolCode, i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimWorld {
    pub settings: OrchestratorSettings,
    pub ledgers: BTreeMap<AccountName, SimLedger>,
    pub legacy_converters: BTreeMap<AccountName, SimLegacyConverter>,
    pub pools: BTreeMap<SymbolCode, SimMultiPool>,
}

impl SimWorld {
    pub fn new(settings: OrchestratorSettings) -> Self {
        SimWorld {
            settings,
            ledgers: BTreeMap::new(),
            legacy_converters: BTreeMap::new(),
            pools: BTreeMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // World construction
    // ------------------------------------------------------------------

    pub fn create_token(
        &mut self,
        ledger: AccountName,
        symbol: TokenSymbol,
    ) -> Result<(), SimError> {
        let tokens = &mut self.ledgers.entry(ledger).or_default().tokens;
        if tokens.contains_key(&symbol.code) {
            return Err(SimError::DuplicateToken(symbol.code, ledger));
        }
        tokens.insert(
            symbol.code,
            SimToken {
                symbol,
                supply: 0,
                balances: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Mint new supply to an account
    pub fn issue(
        &mut self,
        ledger: AccountName,
        to: AccountName,
        quantity: Asset,
    ) -> Result<(), SimError> {
        let token = self.token_mut(&ledger, quantity.symbol.code)?;
        token.supply += quantity.amount;
        *token.balances.entry(to).or_insert(0) += quantity.amount;
        Ok(())
    }

    pub fn add_legacy_converter(
        &mut self,
        account: AccountName,
        settings: LegacySettings,
        reserves: Vec<LegacyReserve>,
    ) {
        self.legacy_converters
            .insert(account, SimLegacyConverter { settings, reserves });
    }

    /// Register a pre-existing destination pool with live reserves
    pub fn add_destination_pool(
        &mut self,
        symbol: TokenSymbol,
        owner: AccountName,
        fee: u32,
        reserves: Vec<SimMultiReserve>,
        supply: Asset,
        supply_holder: AccountName,
    ) -> Result<(), SimError> {
        if self.pools.contains_key(&symbol.code) {
            return Err(SimError::DuplicateDestinationConverter(symbol.code));
        }
        let multi_ledger = self.settings.multi_tokens_ledger;
        self.create_token(multi_ledger, symbol)?;
        self.issue(multi_ledger, supply_holder, supply)?;
        self.pools.insert(
            symbol.code,
            SimMultiPool {
                owner,
                fee,
                symbol,
                launching: false,
                reserves: reserves.into_iter().map(|r| (r.symbol.code, r)).collect(),
                pending: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Ledger issuing a token, if any (symbols are unique across ledgers)
    pub fn find_token_ledger(&self, code: SymbolCode) -> Option<AccountName> {
        self.ledgers
            .iter()
            .find(|(_, ledger)| ledger.tokens.contains_key(&code))
            .map(|(account, _)| *account)
    }

    // ------------------------------------------------------------------
    // Transfers and effect application
    // ------------------------------------------------------------------

    fn token_mut(
        &mut self,
        ledger: &AccountName,
        code: SymbolCode,
    ) -> Result<&mut SimToken, SimError> {
        self.ledgers
            .get_mut(ledger)
            .ok_or(SimError::UnknownLedger(*ledger))?
            .tokens
            .get_mut(&code)
            .ok_or(SimError::UnknownToken(code, *ledger))
    }

    fn move_tokens(
        &mut self,
        ledger: &AccountName,
        from: &AccountName,
        to: &AccountName,
        quantity: Asset,
    ) -> Result<(), SimError> {
        if quantity.amount <= 0 {
            return Err(SimError::NonPositiveQuantity);
        }
        let token = self.token_mut(ledger, quantity.symbol.code)?;
        let balance = token.balances.entry(*from).or_insert(0);
        if *balance < quantity.amount {
            return Err(SimError::InsufficientBalance {
                ledger: *ledger,
                owner: *from,
                token: quantity.symbol.code,
            });
        }
        *balance -= quantity.amount;
        *token.balances.entry(*to).or_insert(0) += quantity.amount;
        Ok(())
    }

    /// Execute a transfer on behalf of any account and collect the
    /// notifications it provokes
    pub fn transfer(
        &mut self,
        ledger: AccountName,
        from: AccountName,
        to: AccountName,
        quantity: Asset,
        memo: String,
        authorizations: Vec<AccountName>,
    ) -> Result<Vec<TransferNotice>, SimError> {
        self.move_tokens(&ledger, &from, &to, quantity)?;
        let mut notices = vec![TransferNotice {
            ledger,
            from,
            to,
            quantity,
            memo: memo.clone(),
            authorizations,
        }];

        if to == self.settings.network_account {
            notices.extend(self.convert(quantity, &memo)?);
        } else if to == self.settings.multi_converter_account {
            if let Some(pool) = parse_fund_memo(&memo) {
                self.receive_funding(from, pool, quantity)?;
            }
        }
        Ok(notices)
    }

    /// Sell legacy pool tokens through the conversion network
    ///
    /// Memo: `"1,<converter> <RESERVE>,<min_return>,<receiver>"`. The sale
    /// return against a balanced 50/50 reserve is
    /// `floor(R·(2xS - x²) / S²)` for `x` pool tokens of supply `S`; the
    /// sold tokens are retired.
    fn convert(&mut self, quantity: Asset, memo: &str) -> Result<Vec<TransferNotice>, SimError> {
        let bad = || SimError::BadConversionMemo(memo.to_string());
        let mut parts = memo.split(',');
        let _hops = parts.next().ok_or_else(bad)?;
        let path = parts.next().ok_or_else(bad)?;
        let min_return = parts.next().ok_or_else(bad)?;
        let receiver: AccountName = parts
            .next()
            .ok_or_else(bad)?
            .parse()
            .map_err(|_| bad())?;

        let (converter_account, reserve_code) = path.split_once(' ').ok_or_else(bad)?;
        let converter_account: AccountName =
            converter_account.parse().map_err(|_| bad())?;
        let reserve_code: SymbolCode = reserve_code.parse().map_err(|_| bad())?;

        let converter = self
            .legacy_converters
            .get(&converter_account)
            .ok_or(SimError::UnknownLegacyConverter(converter_account))?
            .clone();
        let reserve = converter
            .reserves
            .iter()
            .find(|r| r.symbol.code == reserve_code)
            .ok_or(SimError::UnknownReserve(
                reserve_code,
                quantity.symbol.code,
            ))?
            .clone();
        if reserve.ratio != HALF_RATIO {
            return Err(SimError::UnsupportedRatio(reserve.ratio));
        }

        let smart_ledger = converter.settings.smart_contract;
        let supply = self.token_mut(&smart_ledger, quantity.symbol.code)?.supply;
        let reserve_balance = self
            .token_mut(&reserve.ledger, reserve.symbol.code)?
            .balances
            .get(&converter_account)
            .copied()
            .unwrap_or(0);

        let x = quantity.amount as u128;
        let s = supply as u128;
        let r = reserve_balance as u128;
        let num = (2 * x * s).checked_sub(x * x).ok_or(SimError::Overflow)?;
        let payout = r
            .checked_mul(num)
            .ok_or(SimError::Overflow)?
            .checked_div(s * s)
            .ok_or(SimError::Overflow)? as i64;

        let min_units = parse_decimal(min_return, reserve.symbol.precision).ok_or_else(bad)?;
        if payout < min_units {
            return Err(SimError::InsufficientReturn);
        }

        // Retire the sold pool tokens (now held by the network) and pay
        // out the reserve
        let network = self.settings.network_account;
        let token = self.token_mut(&smart_ledger, quantity.symbol.code)?;
        let held = token.balances.entry(network).or_insert(0);
        if *held < quantity.amount {
            return Err(SimError::InsufficientBalance {
                ledger: smart_ledger,
                owner: network,
                token: quantity.symbol.code,
            });
        }
        *held -= quantity.amount;
        token.supply -= quantity.amount;

        let payout = Asset::new(payout, reserve.symbol);
        self.move_tokens(&reserve.ledger, &converter_account, &receiver, payout)?;
        Ok(vec![TransferNotice {
            ledger: reserve.ledger,
            from: converter_account,
            to: receiver,
            quantity: payout,
            memo: String::from("convert"),
            authorizations: vec![converter_account],
        }])
    }

    /// Credit a fund-memo transfer: straight to the reserves while the
    /// pool is launching, to the contributor's pending balance otherwise
    fn receive_funding(
        &mut self,
        from: AccountName,
        pool: SymbolCode,
        quantity: Asset,
    ) -> Result<(), SimError> {
        let entry = self
            .pools
            .get_mut(&pool)
            .ok_or(SimError::UnknownDestinationConverter(pool))?;
        let code = quantity.symbol.code;
        let reserve = entry
            .reserves
            .get_mut(&code)
            .ok_or(SimError::UnknownReserve(code, pool))?;
        if entry.launching {
            reserve.balance += quantity.amount;
        } else {
            *entry
                .pending
                .entry(from)
                .or_default()
                .entry(code)
                .or_insert(0) += quantity.amount;
        }
        Ok(())
    }

    /// Apply one outbound effect, yielding provoked notifications
    pub fn apply(&mut self, effect: &Effect) -> Result<Vec<TransferNotice>, SimError> {
        let me = self.settings.self_account;
        match effect {
            Effect::Transfer {
                ledger,
                to,
                quantity,
                memo,
            } => self.transfer(*ledger, me, *to, *quantity, memo.clone(), vec![me]),

            Effect::ConfigureLegacyConverter {
                converter,
                smart_enabled,
                enabled,
                require_balance,
                fee,
            } => {
                let entry = self
                    .legacy_converters
                    .get_mut(converter)
                    .ok_or(SimError::UnknownLegacyConverter(*converter))?;
                entry.settings.smart_enabled = *smart_enabled;
                entry.settings.enabled = *enabled;
                entry.settings.require_balance = *require_balance;
                entry.settings.fee = *fee;
                Ok(Vec::new())
            }

            Effect::CreateConverter {
                token,
                initial_supply,
            } => {
                if self.pools.contains_key(token) {
                    return Err(SimError::DuplicateDestinationConverter(*token));
                }
                let multi_ledger = self.settings.multi_tokens_ledger;
                self.create_token(multi_ledger, initial_supply.symbol)?;
                self.issue(multi_ledger, me, *initial_supply)?;
                self.pools.insert(
                    *token,
                    SimMultiPool {
                        owner: me,
                        fee: 0,
                        symbol: initial_supply.symbol,
                        launching: true,
                        reserves: BTreeMap::new(),
                        pending: BTreeMap::new(),
                    },
                );
                // Issuance notification off the multi-token ledger; the
                // orchestrator filters it out as its own side effect
                Ok(vec![TransferNotice {
                    ledger: multi_ledger,
                    from: self.settings.multi_converter_account,
                    to: me,
                    quantity: *initial_supply,
                    memo: String::from("new converter issuance"),
                    authorizations: vec![self.settings.multi_converter_account],
                }])
            }

            Effect::UpdateFee { token, fee } => {
                self.pools
                    .get_mut(token)
                    .ok_or(SimError::UnknownDestinationConverter(*token))?
                    .fee = *fee;
                Ok(Vec::new())
            }

            Effect::SetReserve {
                token,
                reserve,
                ledger,
                ratio,
            } => {
                self.pools
                    .get_mut(token)
                    .ok_or(SimError::UnknownDestinationConverter(*token))?
                    .reserves
                    .insert(
                        reserve.code,
                        SimMultiReserve {
                            ledger: *ledger,
                            symbol: *reserve,
                            ratio: *ratio,
                            balance: 0,
                        },
                    );
                Ok(Vec::new())
            }

            Effect::FundConverter { quantity } => self.fund_pool(me, *quantity),

            Effect::WithdrawReserve { quantity, token } => {
                let code = quantity.symbol.code;
                let pool = self
                    .pools
                    .get_mut(token)
                    .ok_or(SimError::UnknownDestinationConverter(*token))?;
                let reserve_ledger = pool
                    .reserves
                    .get(&code)
                    .ok_or(SimError::UnknownReserve(code, *token))?
                    .ledger;
                let pending = pool
                    .pending
                    .entry(me)
                    .or_default()
                    .entry(code)
                    .or_insert(0);
                if *pending < quantity.amount {
                    return Err(SimError::InsufficientPending(code));
                }
                *pending -= quantity.amount;

                let multi_account = self.settings.multi_converter_account;
                self.move_tokens(&reserve_ledger, &multi_account, &me, *quantity)?;
                Ok(vec![TransferNotice {
                    ledger: reserve_ledger,
                    from: multi_account,
                    to: me,
                    quantity: *quantity,
                    memo: String::from("withdraw"),
                    authorizations: vec![multi_account],
                }])
            }

            Effect::TransferOwnership { token, new_owner } => {
                let pool = self
                    .pools
                    .get_mut(token)
                    .ok_or(SimError::UnknownDestinationConverter(*token))?;
                pool.owner = *new_owner;
                pool.launching = false;
                Ok(Vec::new())
            }

            // Continuations re-enter the orchestrator, not the world
            Effect::Continue(_) => Ok(Vec::new()),
        }
    }

    /// Mint pool tokens against the minter's pending reserve balances,
    /// drawing each reserve proportionally (rounded up)
    fn fund_pool(
        &mut self,
        minter: AccountName,
        quantity: Asset,
    ) -> Result<Vec<TransferNotice>, SimError> {
        let token = quantity.symbol.code;
        let multi_ledger = self.settings.multi_tokens_ledger;
        let supply = self.token_mut(&multi_ledger, token)?.supply;
        if supply <= 0 {
            return Err(SimError::ZeroSupply);
        }

        let pool = self
            .pools
            .get_mut(&token)
            .ok_or(SimError::UnknownDestinationConverter(token))?;
        for reserve in pool.reserves.values_mut() {
            let required = ((reserve.balance as u128 * quantity.amount as u128)
                + supply as u128
                - 1)
                / supply as u128;
            let required = required as i64;
            let pending = pool
                .pending
                .entry(minter)
                .or_default()
                .entry(reserve.symbol.code)
                .or_insert(0);
            if *pending < required {
                return Err(SimError::InsufficientPending(reserve.symbol.code));
            }
            *pending -= required;
            reserve.balance += required;
        }

        self.issue(multi_ledger, minter, quantity)?;
        Ok(vec![TransferNotice {
            ledger: multi_ledger,
            from: self.settings.multi_converter_account,
            to: minter,
            quantity,
            memo: String::from("fund"),
            authorizations: vec![self.settings.multi_converter_account],
        }])
    }
}

/// Parse a plain decimal amount at a fixed precision, e.g. `"0.0001"` at
/// precision 4 into `1`
fn parse_decimal(s: &str, precision: u8) -> Option<i64> {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if frac_part.len() > precision as usize {
        return None;
    }
    let scale = 10i64.checked_pow(precision as u32)?;
    let int: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let frac: i64 = if frac_part.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac_part, width = precision as usize);
        padded.parse().ok()?
    };
    int.checked_mul(scale)?.checked_add(frac)
}

// ----------------------------------------------------------------------
// Collaborator trait implementations
// ----------------------------------------------------------------------

impl TokenLedger for SimWorld {
    fn balance_of(
        &self,
        ledger: &AccountName,
        owner: &AccountName,
        code: SymbolCode,
    ) -> Result<Asset, EnvError> {
        let token = self
            .ledgers
            .get(ledger)
            .and_then(|l| l.tokens.get(&code))
            .ok_or_else(|| EnvError::LedgerEntryNotFound {
                ledger: *ledger,
                what: code.to_string(),
            })?;
        let amount = token.balances.get(owner).copied().unwrap_or(0);
        Ok(Asset::new(amount, token.symbol))
    }

    fn supply_of(&self, ledger: &AccountName, code: SymbolCode) -> Result<Asset, EnvError> {
        let token = self
            .ledgers
            .get(ledger)
            .and_then(|l| l.tokens.get(&code))
            .ok_or_else(|| EnvError::LedgerEntryNotFound {
                ledger: *ledger,
                what: code.to_string(),
            })?;
        Ok(Asset::new(token.supply, token.symbol))
    }
}

impl LegacyConverterApi for SimWorld {
    fn settings(&self, converter: &AccountName) -> Result<LegacySettings, EnvError> {
        self.legacy_converters
            .get(converter)
            .map(|c| c.settings.clone())
            .ok_or(EnvError::ConverterSettingsNotFound(*converter))
    }

    fn reserves(&self, converter: &AccountName) -> Result<Vec<LegacyReserve>, EnvError> {
        self.legacy_converters
            .get(converter)
            .map(|c| c.reserves.clone())
            .ok_or(EnvError::ConverterSettingsNotFound(*converter))
    }
}

impl MultiConverterApi for SimWorld {
    fn converter_exists(&self, token: SymbolCode) -> bool {
        self.pools.contains_key(&token)
    }

    fn reserve(&self, token: SymbolCode, reserve: SymbolCode) -> Result<MultiReserve, EnvError> {
        let pool = self
            .pools
            .get(&token)
            .ok_or(EnvError::DestinationConverterNotFound(token))?;
        let entry = pool
            .reserves
            .get(&reserve)
            .ok_or(EnvError::DestinationReserveNotFound {
                converter: token,
                reserve,
            })?;
        Ok(MultiReserve {
            ledger: entry.ledger,
            balance: Asset::new(entry.balance, entry.symbol),
            ratio: entry.ratio,
        })
    }

    fn reserve_codes(&self, token: SymbolCode) -> Result<Vec<SymbolCode>, EnvError> {
        let pool = self
            .pools
            .get(&token)
            .ok_or(EnvError::DestinationConverterNotFound(token))?;
        Ok(pool.reserves.keys().copied().collect())
    }

    fn account_balance(
        &self,
        owner: &AccountName,
        token: SymbolCode,
        reserve: SymbolCode,
    ) -> Option<Asset> {
        let pool = self.pools.get(&token)?;
        let amount = pool.pending.get(owner)?.get(&reserve).copied()?;
        let symbol = pool.reserves.get(&reserve)?.symbol;
        Some(Asset::new(amount, symbol))
    }
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

/// One queued event awaiting its own run-to-completion step
#[derive(Debug, Clone)]
pub enum SimEvent {
    Notice(TransferNotice),
    FollowUp(FollowUp),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Orchestrator + world + event queue
///
/// Each event runs to completion before the next is popped; effects
/// enqueue further events at the back. This mirrors the host's cooperative
/// single-threaded execution: causal ordering, no synchrony.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimHarness {
    pub orchestrator: MigrationOrchestrator,
    pub world: SimWorld,
}

impl SimHarness {
    pub fn new(orchestrator: MigrationOrchestrator, world: SimWorld) -> Self {
        SimHarness {
            orchestrator,
            world,
        }
    }

    /// Send tokens to the orchestrator as an external actor and drain the
    /// resulting event cascade
    pub fn deposit(
        &mut self,
        from: AccountName,
        quantity: Asset,
        authorizations: Vec<AccountName>,
    ) -> Result<(), RunError> {
        let ledger = self
            .world
            .find_token_ledger(quantity.symbol.code)
            .ok_or(SimError::UnissuedToken(quantity.symbol.code))?;
        let to = self.orchestrator.settings().self_account;
        let notices = self.world.transfer(
            ledger,
            from,
            to,
            quantity,
            String::from("migrate"),
            authorizations,
        )?;
        self.pump(notices.into_iter().map(SimEvent::Notice).collect())
    }

    /// Re-drive one explicit step (operator recovery path)
    pub fn run_step(&mut self, follow_up: FollowUp) -> Result<(), RunError> {
        let effects = self.orchestrator.run_follow_up(&self.world, &follow_up)?;
        let mut queue = VecDeque::new();
        self.dispatch(effects, &mut queue)?;
        self.pump(queue)
    }

    fn pump(&mut self, mut queue: VecDeque<SimEvent>) -> Result<(), RunError> {
        while let Some(event) = queue.pop_front() {
            let me = self.orchestrator.settings().self_account;
            let effects = match event {
                SimEvent::Notice(notice) => {
                    // Notifications fire only for transfers the
                    // orchestrator is a party to
                    if notice.from != me && notice.to != me {
                        continue;
                    }
                    self.orchestrator.handle_transfer(&self.world, &notice)?
                }
                SimEvent::FollowUp(follow_up) => {
                    self.orchestrator.run_follow_up(&self.world, &follow_up)?
                }
            };
            self.dispatch(effects, &mut queue)?;
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        effects: Vec<Effect>,
        queue: &mut VecDeque<SimEvent>,
    ) -> Result<(), RunError> {
        for effect in effects {
            match effect {
                Effect::Continue(follow_up) => queue.push_back(SimEvent::FollowUp(follow_up)),
                effect => {
                    for notice in self.world.apply(&effect)? {
                        queue.push_back(SimEvent::Notice(notice));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn sym(code: &str, precision: u8) -> TokenSymbol {
        TokenSymbol::new(SymbolCode::new(code).unwrap(), precision).unwrap()
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("0.0001", 4), Some(1));
        assert_eq!(parse_decimal("1.0500", 4), Some(10_500));
        assert_eq!(parse_decimal("7", 0), Some(7));
        assert_eq!(parse_decimal("1.5", 4), Some(15_000));
        assert_eq!(parse_decimal("1.00001", 4), None);
        assert_eq!(parse_decimal("abc", 4), None);
    }

    #[test]
    fn test_transfer_moves_balances() {
        let mut world = SimWorld::new(OrchestratorSettings::default());
        let ledger = name("eosio.token");
        let eos = sym("EOS", 4);
        world.create_token(ledger, eos).unwrap();
        world.issue(ledger, name("alice"), Asset::new(1000, eos)).unwrap();

        world
            .transfer(
                ledger,
                name("alice"),
                name("bob"),
                Asset::new(400, eos),
                String::new(),
                vec![name("alice")],
            )
            .unwrap();

        assert_eq!(
            world.balance_of(&ledger, &name("alice"), eos.code).unwrap().amount,
            600
        );
        assert_eq!(
            world.balance_of(&ledger, &name("bob"), eos.code).unwrap().amount,
            400
        );
    }

    #[test]
    fn test_transfer_rejects_overdraft_and_zero() {
        let mut world = SimWorld::new(OrchestratorSettings::default());
        let ledger = name("eosio.token");
        let eos = sym("EOS", 4);
        world.create_token(ledger, eos).unwrap();
        world.issue(ledger, name("alice"), Asset::new(10, eos)).unwrap();

        let over = world.transfer(
            ledger,
            name("alice"),
            name("bob"),
            Asset::new(11, eos),
            String::new(),
            vec![],
        );
        assert!(matches!(over, Err(SimError::InsufficientBalance { .. })));

        let zero = world.transfer(
            ledger,
            name("alice"),
            name("bob"),
            Asset::new(0, eos),
            String::new(),
            vec![],
        );
        assert_eq!(zero, Err(SimError::NonPositiveQuantity));
    }

    #[test]
    fn test_balanced_sale_return() {
        // Selling half the supply of a balanced pool returns 3/4 of the
        // reserve: R(2xS - x^2)/S^2 with x = S/2 gives 0.75 R
        let settings = OrchestratorSettings::default();
        let mut world = SimWorld::new(settings.clone());
        let smart_ledger = name("bnt2eosrelay");
        let reserve_ledger = name("eosio.token");
        let converter = name("bnt2eoscnvrt");
        let relay = sym("BNTEOS", 4);
        let eos = sym("EOS", 4);

        world.create_token(smart_ledger, relay).unwrap();
        world.create_token(reserve_ledger, eos).unwrap();
        world
            .issue(smart_ledger, settings.network_account, Asset::new(500, relay))
            .unwrap();
        world
            .issue(smart_ledger, name("other"), Asset::new(500, relay))
            .unwrap();
        world.issue(reserve_ledger, converter, Asset::new(10_000, eos)).unwrap();
        world.add_legacy_converter(
            converter,
            LegacySettings {
                smart_contract: smart_ledger,
                smart_currency: relay,
                smart_enabled: true,
                enabled: true,
                require_balance: false,
                fee: 0,
            },
            vec![LegacyReserve {
                ledger: reserve_ledger,
                symbol: eos,
                ratio: HALF_RATIO,
            }],
        );

        let notices = world
            .convert(Asset::new(500, relay), "1,bnt2eoscnvrt EOS,0.0001,migration")
            .unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].quantity.amount, 7_500);
        // Sold pool tokens are retired
        assert_eq!(world.supply_of(&smart_ledger, relay.code).unwrap().amount, 500);
    }
}
