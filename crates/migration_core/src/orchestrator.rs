//! The migration state machine
//!
//! A migration moves `INITIAL -> LIQUIDATION -> FUNDING -> DONE`, driven by
//! inbound transfer notifications and explicit operator steps. The same
//! notification entry point is both the public deposit surface and the
//! continuation mechanism: liquidating the legacy pool provokes reserve
//! transfers back to the orchestrator, which arrive as later invocations of
//! [`MigrationOrchestrator::handle_transfer`].
//!
//! Every step validates and computes first, commits its own state second,
//! and only then returns effects. A step that fails therefore leaves all
//! stores exactly as the previous step committed them.

use serde::{Deserialize, Serialize};

use crate::context::DisambiguationContext;
use crate::effects::{
    conversion_memo, fund_memo, Effect, FollowUp, TransferNotice, POOL_TOKENS_MEMO, REFUND_MEMO,
};
use crate::env::{Environment, LegacyReserve, LegacySettings};
use crate::error::MigrationError;
use crate::record::{MigrationRecord, MigrationStage, MigrationStore};
use crate::registry::ConverterRegistry;
use crate::settings::OrchestratorSettings;
use crate::staging::ReserveStaging;
use crate::types::{AccountName, Asset, SymbolCode, TokenSymbol};

use migration_model::{fund_pool_return, liquidation_split, MathError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOrchestrator {
    settings: OrchestratorSettings,
    registry: ConverterRegistry,
    migrations: MigrationStore,
    staging: ReserveStaging,
    context: DisambiguationContext,
}

impl MigrationOrchestrator {
    pub fn new(settings: OrchestratorSettings) -> Self {
        MigrationOrchestrator {
            settings,
            registry: ConverterRegistry::new(),
            migrations: MigrationStore::new(),
            staging: ReserveStaging::new(),
            context: DisambiguationContext::new(),
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn migrations(&self) -> &MigrationStore {
        &self.migrations
    }

    pub fn staging(&self) -> &ReserveStaging {
        &self.staging
    }

    pub fn context(&self) -> &DisambiguationContext {
        &self.context
    }

    fn require_self_auth(&self, auth: &AccountName) -> Result<(), MigrationError> {
        if *auth != self.settings.self_account {
            return Err(MigrationError::Unauthorized {
                expected: self.settings.self_account,
                actual: *auth,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub fn register_converter(
        &mut self,
        auth: &AccountName,
        token: SymbolCode,
        legacy_pool_account: AccountName,
        owner: AccountName,
    ) -> Result<(), MigrationError> {
        self.require_self_auth(auth)?;
        self.registry.add(token, legacy_pool_account, owner)
    }

    pub fn unregister_converter(
        &mut self,
        auth: &AccountName,
        token: SymbolCode,
    ) -> Result<(), MigrationError> {
        self.require_self_auth(auth)?;
        self.registry.remove(token)
    }

    pub fn set_settings(
        &mut self,
        auth: &AccountName,
        settings: OrchestratorSettings,
    ) -> Result<(), MigrationError> {
        self.require_self_auth(auth)?;
        self.settings = settings;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Notification entry point
    // ------------------------------------------------------------------

    /// React to one inbound transfer notification
    ///
    /// Notices from the orchestrator itself, from the multi-token ledger
    /// and from reserved system accounts are side effects of our own
    /// activity and are ignored. Everything else is routed to the
    /// migration named by the disambiguation context if one is held,
    /// otherwise to the migration keyed by the incoming token symbol.
    pub fn handle_transfer(
        &mut self,
        env: &impl Environment,
        notice: &TransferNotice,
    ) -> Result<Vec<Effect>, MigrationError> {
        let incoming = notice.quantity.symbol.code;
        if notice.from == self.settings.self_account
            || notice.ledger == self.settings.multi_tokens_ledger
            || self.settings.reserved_accounts.contains(&notice.from)
        {
            log::debug!("ignoring self/system transfer of {}", notice.quantity);
            return Ok(Vec::new());
        }

        let migration_token = self.context.current().unwrap_or(incoming);
        let stage = self
            .migrations
            .find(migration_token)
            .map_or(MigrationStage::Initial, |r| r.stage);

        match (stage, incoming) {
            (MigrationStage::Initial, _) => self.start_migration(env, notice),
            // The pool's own burn/issuance echo during liquidation
            (MigrationStage::Liquidation, token) if token == migration_token => {
                log::debug!("ignoring pool token echo for {}", migration_token);
                Ok(Vec::new())
            }
            (MigrationStage::Liquidation, _) => {
                self.handle_liquidated_reserve(migration_token, notice)
            }
            (stage, token) => Err(MigrationError::UnexpectedTransfer {
                token,
                stage: stage.name(),
            }),
        }
    }

    /// Begin a migration from a deposit of legacy pool tokens
    ///
    /// Everything that can fail is resolved before the record is created:
    /// an abort here leaves no trace. The returned effects provision the
    /// replacement pool if needed, then liquidate the legacy position.
    fn start_migration(
        &mut self,
        env: &impl Environment,
        notice: &TransferNotice,
    ) -> Result<Vec<Effect>, MigrationError> {
        let token = notice.quantity.symbol.code;
        let entry = match self.registry.find(token) {
            Some(entry) => entry.clone(),
            None => {
                // Not an entry condition; incidental deposits of
                // unregistered tokens are not ours to handle
                log::debug!("ignoring deposit of unregistered token {}", token);
                return Ok(Vec::new());
            }
        };

        let legacy = env.settings(&entry.legacy_pool_account)?;
        if legacy.smart_contract != notice.ledger {
            return Err(MigrationError::UnknownTokenContract(token));
        }

        let reserves = env.reserves(&entry.legacy_pool_account)?;
        if reserves.len() != 2 {
            return Err(MigrationError::TwoReservesRequired(
                entry.legacy_pool_account,
            ));
        }

        let new_token = self.replacement_symbol(token, &reserves)?;
        let preexisting = env.converter_exists(new_token);
        if !preexisting && !notice.authorizations.contains(&entry.owner) {
            // Creating a brand-new pool establishes its governance; that
            // needs the registered owner's consent
            return Err(MigrationError::OwnerConsentMissing(entry.owner));
        }

        let liquidation = self.plan_liquidation(env, &entry.legacy_pool_account, &legacy, &reserves)?;

        log::info!(
            "starting migration of {} for {}: replacement {} ({})",
            notice.quantity,
            notice.from,
            new_token,
            if preexisting { "existing pool" } else { "new pool" },
        );

        // Commit: record, context, stage. Effects follow.
        self.migrations.create(
            token,
            MigrationRecord {
                legacy_token: notice.quantity.symbol,
                new_token,
                legacy_pool_account: entry.legacy_pool_account,
                stage: MigrationStage::Initial,
                initiator: notice.from,
                new_pool_preexisting: preexisting,
                expected_reserves: reserves.len(),
            },
        )?;
        self.context.acquire(token)?;
        self.migrations.advance_stage(token)?;

        let mut effects = Vec::new();
        if !preexisting {
            let new_symbol = TokenSymbol::new(new_token, notice.quantity.symbol.precision)?;
            effects.push(Effect::CreateConverter {
                token: new_token,
                initial_supply: Asset::new(notice.quantity.amount, new_symbol),
            });
            effects.push(Effect::UpdateFee {
                token: new_token,
                fee: legacy.fee,
            });
            for reserve in &reserves {
                effects.push(Effect::SetReserve {
                    token: new_token,
                    reserve: reserve.symbol,
                    ledger: reserve.ledger,
                    ratio: reserve.ratio,
                });
            }
        }
        effects.extend(liquidation);
        effects.push(Effect::Continue(FollowUp::FundMigration(token)));
        Ok(effects)
    }

    /// Replacement pool token: non-network reserve code ++ legacy code
    fn replacement_symbol(
        &self,
        legacy: SymbolCode,
        reserves: &[LegacyReserve],
    ) -> Result<SymbolCode, MigrationError> {
        let reserve = reserves
            .iter()
            .find(|r| r.symbol.code != self.settings.network_token)
            .ok_or(MigrationError::NoReplacementReserve(legacy))?;
        Ok(reserve.symbol.code.join(&legacy)?)
    }

    /// Plan the liquidation transfers without touching any store
    ///
    /// The legacy pool's fee is zeroed for the duration so the conversions
    /// are not skimmed, and restored afterwards. Each conversion asks for a
    /// minimum return of one minor unit of its reserve; the one-unit
    /// headroom kept back by the split keeps the second leg redeemable.
    fn plan_liquidation(
        &self,
        env: &impl Environment,
        converter: &AccountName,
        legacy: &LegacySettings,
        reserves: &[LegacyReserve],
    ) -> Result<Vec<Effect>, MigrationError> {
        let supply = env.supply_of(&legacy.smart_contract, legacy.smart_currency.code)?;
        let held = env.balance_of(
            &legacy.smart_contract,
            &self.settings.self_account,
            legacy.smart_currency.code,
        )?;

        let (first, second) =
            liquidation_split(supply.amount.max(0) as u64, held.amount.max(0) as u64)?;

        let mut effects = vec![Effect::ConfigureLegacyConverter {
            converter: *converter,
            smart_enabled: legacy.smart_enabled,
            enabled: legacy.enabled,
            require_balance: legacy.require_balance,
            fee: 0,
        }];
        for (reserve, amount) in reserves.iter().zip([first, second]) {
            effects.push(Effect::Transfer {
                ledger: legacy.smart_contract,
                to: self.settings.network_account,
                quantity: Asset::new(amount as i64, legacy.smart_currency),
                memo: conversion_memo(converter, reserve.symbol, &self.settings.self_account),
            });
        }
        effects.push(Effect::ConfigureLegacyConverter {
            converter: *converter,
            smart_enabled: legacy.smart_enabled,
            enabled: legacy.enabled,
            require_balance: legacy.require_balance,
            fee: legacy.fee,
        });
        Ok(effects)
    }

    /// Stage one liquidated reserve tranche
    fn handle_liquidated_reserve(
        &mut self,
        migration_token: SymbolCode,
        notice: &TransferNotice,
    ) -> Result<Vec<Effect>, MigrationError> {
        let expected = self.migrations.get(migration_token)?.expected_reserves;
        let staged = self
            .staging
            .stage(migration_token, notice.quantity, notice.ledger)?;
        log::debug!(
            "staged {} for {} ({}/{})",
            notice.quantity,
            migration_token,
            staged,
            expected
        );

        if staged >= expected {
            self.migrations.advance_stage(migration_token)?;
            self.context.release()?;
        }
        Ok(Vec::new())
    }

    // ------------------------------------------------------------------
    // Explicit steps
    // ------------------------------------------------------------------

    /// Drive the FUNDING stage
    ///
    /// Forwards every staged reserve to the destination pool and, when the
    /// pool pre-existed, mints the binding constant-ratio return. The
    /// staged set is drained as it is forwarded.
    pub fn advance_funding(
        &mut self,
        env: &impl Environment,
        token: SymbolCode,
        auth: &AccountName,
    ) -> Result<Vec<Effect>, MigrationError> {
        self.require_self_auth(auth)?;
        let record = self.migrations.get(token)?.clone();
        if record.stage != MigrationStage::Funding {
            return Err(MigrationError::WrongStage {
                token,
                expected: "FUNDING",
                actual: record.stage.name(),
            });
        }
        if self.staging.count(token) == 0 {
            return Err(MigrationError::NothingStaged(token));
        }

        if record.new_pool_preexisting {
            self.fund_existing(env, token, &record)
        } else {
            self.fund_new(token, &record)
        }
    }

    fn fund_existing(
        &mut self,
        env: &impl Environment,
        token: SymbolCode,
        record: &MigrationRecord,
    ) -> Result<Vec<Effect>, MigrationError> {
        let supply = env.supply_of(&self.settings.multi_tokens_ledger, record.new_token)?;

        // The binding constraint is the least proportionally funded
        // reserve; any excess on the others is reclaimed afterwards
        let mut funding_return = u64::MAX;
        for staged in self.staging.iter(token) {
            let reserve = env.reserve(record.new_token, staged.quantity.symbol.code)?;
            let ret = fund_pool_return(
                supply.amount.max(0) as u64,
                staged.quantity.amount.max(0) as u64,
                reserve.balance.amount.max(0) as u64,
            )?;
            funding_return = funding_return.min(ret);
        }
        if funding_return > i64::MAX as u64 {
            return Err(MigrationError::Math(MathError::Overflow));
        }

        let mut effects = Vec::new();
        for staged in self.staging.drain(token) {
            effects.push(Effect::Transfer {
                ledger: staged.ledger,
                to: self.settings.multi_converter_account,
                quantity: staged.quantity,
                memo: fund_memo(record.new_token),
            });
        }
        self.migrations.advance_stage(token)?;

        effects.push(Effect::FundConverter {
            quantity: Asset::new(funding_return as i64, supply.symbol),
        });
        effects.push(Effect::Continue(FollowUp::ReclaimReserves(token)));
        effects.push(Effect::Continue(FollowUp::ForwardPoolTokens {
            to: record.initiator,
            token: record.new_token,
        }));
        effects.push(Effect::Continue(FollowUp::VerifyComplete(token)));
        Ok(effects)
    }

    fn fund_new(
        &mut self,
        token: SymbolCode,
        record: &MigrationRecord,
    ) -> Result<Vec<Effect>, MigrationError> {
        // The first funding of a brand-new pool establishes its reserve
        // balances directly; there is no return to compute
        let mut effects = Vec::new();
        for staged in self.staging.drain(token) {
            effects.push(Effect::Transfer {
                ledger: staged.ledger,
                to: self.settings.multi_converter_account,
                quantity: staged.quantity,
                memo: fund_memo(record.new_token),
            });
        }
        effects.push(Effect::TransferOwnership {
            token: record.new_token,
            new_owner: record.initiator,
        });
        effects.push(Effect::Continue(FollowUp::ForwardPoolTokens {
            to: record.initiator,
            token: record.new_token,
        }));
        self.migrations.advance_stage(token)?;
        effects.push(Effect::Continue(FollowUp::VerifyComplete(token)));
        Ok(effects)
    }

    /// Forward the orchestrator's accumulated replacement pool tokens
    pub fn forward_pool_tokens(
        &self,
        env: &impl Environment,
        to: &AccountName,
        token: SymbolCode,
        auth: &AccountName,
    ) -> Result<Vec<Effect>, MigrationError> {
        self.require_self_auth(auth)?;
        let balance = env.balance_of(
            &self.settings.multi_tokens_ledger,
            &self.settings.self_account,
            token,
        )?;
        Ok(vec![Effect::Transfer {
            ledger: self.settings.multi_tokens_ledger,
            to: *to,
            quantity: balance,
            memo: POOL_TOKENS_MEMO.to_string(),
        }])
    }

    /// Pull back over-contributed reserves parked in the destination pool
    /// and refund them to the initiator
    pub fn reclaim_reserves(
        &self,
        env: &impl Environment,
        token: SymbolCode,
        auth: &AccountName,
    ) -> Result<Vec<Effect>, MigrationError> {
        self.require_self_auth(auth)?;
        let record = self.migrations.get(token)?;

        let mut effects = Vec::new();
        for reserve_code in env.reserve_codes(record.new_token)? {
            let stray = env.account_balance(
                &self.settings.self_account,
                record.new_token,
                reserve_code,
            );
            if let Some(balance) = stray.filter(|b| b.amount > 0) {
                let reserve = env.reserve(record.new_token, reserve_code)?;
                effects.push(Effect::WithdrawReserve {
                    quantity: balance,
                    token: record.new_token,
                });
                effects.push(Effect::Transfer {
                    ledger: reserve.ledger,
                    to: record.initiator,
                    quantity: balance,
                    memo: REFUND_MEMO.to_string(),
                });
            }
        }
        Ok(effects)
    }

    /// Assert nothing was stranded, then delete the record
    ///
    /// Requires the migration to be at DONE. Every balance the migration
    /// touched - legacy pool token, replacement pool token, each legacy
    /// reserve - must be exactly zero on the orchestrator account; a
    /// nonzero residue aborts without clearing, leaving the record
    /// inspectable.
    pub fn verify_complete(
        &mut self,
        env: &impl Environment,
        token: SymbolCode,
        auth: &AccountName,
    ) -> Result<(), MigrationError> {
        self.require_self_auth(auth)?;
        let record = self.migrations.get(token)?.clone();
        if record.stage != MigrationStage::Done {
            return Err(MigrationError::ClearBeforeDone(token));
        }

        let me = self.settings.self_account;
        let legacy = env.settings(&record.legacy_pool_account)?;

        let old_pool = env.balance_of(&legacy.smart_contract, &me, legacy.smart_currency.code)?;
        if !old_pool.is_zero() {
            return Err(MigrationError::ResidualBalance(old_pool));
        }
        let new_pool =
            env.balance_of(&self.settings.multi_tokens_ledger, &me, record.new_token)?;
        if !new_pool.is_zero() {
            return Err(MigrationError::ResidualBalance(new_pool));
        }
        for reserve in env.reserves(&record.legacy_pool_account)? {
            let balance = env.balance_of(&reserve.ledger, &me, reserve.symbol.code)?;
            if !balance.is_zero() {
                return Err(MigrationError::ResidualBalance(balance));
            }
        }

        self.migrations.clear(token)?;
        log::info!("migration of {} complete, record cleared", token);
        Ok(())
    }

    /// Execute one self-scheduled continuation
    pub fn run_follow_up(
        &mut self,
        env: &impl Environment,
        follow_up: &FollowUp,
    ) -> Result<Vec<Effect>, MigrationError> {
        let me = self.settings.self_account;
        match follow_up {
            FollowUp::FundMigration(token) => self.advance_funding(env, *token, &me),
            FollowUp::ReclaimReserves(token) => self.reclaim_reserves(env, *token, &me),
            FollowUp::ForwardPoolTokens { to, token } => {
                self.forward_pool_tokens(env, to, *token, &me)
            }
            FollowUp::VerifyComplete(token) => {
                self.verify_complete(env, *token, &me).map(|_| Vec::new())
            }
        }
    }
}
