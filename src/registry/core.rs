// 8.0 registry/core.rs: the registry. holds positions, the token ledger, the vault and
// the external asset ledger. the only thing allowed to mutate any of them.

use super::results::ProviderError;
use crate::config::{ConfigError, ProviderConfig};
use crate::events::{Event, EventId, EventPayload, VaultDepositEvent, VaultWithdrawalEvent};
use crate::position::{Position, PositionView};
use crate::settlement::AssetLedger;
use crate::token::PositionToken;
use crate::types::{Address, Amount, PositionId, Timestamp};
use crate::vault::Vault;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/** 8.1: registry state. Clone is what makes `atomically` possible */
#[derive(Debug, Clone)]
pub struct Registry {
    pub(super) config: ProviderConfig,
    // closed and cancelled records stay here for audit
    pub(super) positions: BTreeMap<PositionId, Position>,
    pub(super) token: PositionToken,
    pub(super) vault: Vault,
    pub(super) ledger: AssetLedger,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) next_position_id: u64,
    pub(super) current_time: Timestamp,
    // open `atomically` scopes. retention trimming waits until the outermost commits.
    pub(super) tx_depth: u32,
}

impl Registry {
    pub fn new(config: ProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            network = ?config.network,
            protocol = %config.protocol,
            base_asset = %config.base_asset,
            "position registry created"
        );
        Ok(Self {
            config,
            positions: BTreeMap::new(),
            token: PositionToken::new(),
            vault: Vault::new(),
            ledger: AssetLedger::new(),
            events: Vec::new(),
            next_event_id: 1,
            next_position_id: 1,
            current_time: Timestamp::from_millis(0),
            tx_depth: 0,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn protocol(&self) -> Address {
        self.config.protocol
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis().saturating_add(millis));
    }

    /// Run `f` as one transaction: if it fails, every change it made is rolled back.
    ///
    /// The event log is left out of the snapshot. Inside a transaction events are only
    /// appended, so a rollback truncates back to the length seen on entry.
    pub fn atomically<T, F>(&mut self, f: F) -> Result<T, ProviderError>
    where
        F: FnOnce(&mut Registry) -> Result<T, ProviderError>,
    {
        let events = std::mem::take(&mut self.events);
        let snapshot = self.clone();
        self.events = events;
        let mark = self.events.len();

        self.tx_depth += 1;
        let result = f(self);
        self.tx_depth -= 1;

        match result {
            Ok(value) => {
                if self.tx_depth == 0 {
                    self.trim_events();
                }
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "transaction reverted");
                let mut events = std::mem::take(&mut self.events);
                events.truncate(mark);
                *self = snapshot;
                self.events = events;
                Err(err)
            }
        }
    }

    // Snapshot of a live position. burned positions are gone as far as callers care.
    pub fn get_trade_info(&self, id: PositionId) -> Result<PositionView, ProviderError> {
        match self.positions.get(&id) {
            Some(position) if !position.state.is_terminal() => Ok(position.view()),
            _ => Err(ProviderError::NotFound(id)),
        }
    }

    // audit lookup, includes closed and cancelled records
    pub fn position_record(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn positions_iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn owner_of(&self, id: PositionId) -> Result<Address, ProviderError> {
        Ok(self.token.owner_of(id)?)
    }

    pub fn token(&self) -> &PositionToken {
        &self.token
    }

    pub fn vault_balance(&self, asset: Address) -> Amount {
        self.vault.balance(asset)
    }

    pub fn open_interest(&self, asset: Address) -> Amount {
        self.vault.reserved(asset)
    }

    pub fn free_liquidity(&self, asset: Address) -> Amount {
        self.vault.free(asset)
    }

    pub fn balance_of(&self, asset: Address, account: Address) -> Amount {
        self.ledger.balance_of(asset, account)
    }

    /// Credit an account outside custody. Stands in for minting a mock token.
    pub fn fund_account(&mut self, asset: Address, account: Address, amount: Amount) -> Result<(), ProviderError> {
        self.ledger
            .credit(asset, account, amount)
            .ok_or(ProviderError::ArithmeticOverflow("asset ledger"))?;
        Ok(())
    }

    // plain fungible transfer between two accounts outside custody
    pub fn transfer_asset(
        &mut self,
        caller: Address,
        asset: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), ProviderError> {
        let available = self.ledger.balance_of(asset, caller);
        if amount > available {
            return Err(ProviderError::InsufficientFunds {
                asset,
                account: caller,
                available,
                requested: amount,
            });
        }
        self.ledger
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(ProviderError::ArithmeticOverflow("asset ledger"))?;

        self.ledger.debit(asset, caller, amount);
        self.ledger.credit(asset, to, amount);
        Ok(())
    }

    // transfer into custody without a position. stays unreserved.
    pub fn deposit(&mut self, asset: Address, from: Address, amount: Amount) -> Result<Amount, ProviderError> {
        let available = self.ledger.balance_of(asset, from);
        if amount > available {
            return Err(ProviderError::InsufficientFunds {
                asset,
                account: from,
                available,
                requested: amount,
            });
        }
        self.vault
            .balance(asset)
            .checked_add(amount)
            .ok_or(ProviderError::ArithmeticOverflow("vault deposit"))?;

        self.ledger.debit(asset, from, amount);
        let new_balance = self.vault.credit(asset, amount)?;

        debug!(asset = %asset, from = %from, amount = %amount, "vault deposit");
        self.emit_event(EventPayload::VaultDeposit(VaultDepositEvent {
            asset,
            from,
            amount,
            new_balance,
        }));
        Ok(new_balance)
    }

    // admin only. reserved collateral can never leave this way.
    pub fn withdraw_free(
        &mut self,
        caller: Address,
        asset: Address,
        amount: Amount,
        to: Address,
    ) -> Result<Amount, ProviderError> {
        if caller != self.config.admin {
            warn!(caller = %caller, "unauthorized vault withdrawal");
            return Err(ProviderError::Unauthorized {
                caller,
                action: "withdraw vault liquidity",
            });
        }
        self.ledger
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(ProviderError::ArithmeticOverflow("asset ledger"))?;

        let new_balance = self.vault.debit_free(asset, amount)?;
        self.ledger.credit(asset, to, amount);

        info!(asset = %asset, to = %to, amount = %amount, "vault withdrawal");
        self.emit_event(EventPayload::VaultWithdrawal(VaultWithdrawalEvent {
            asset,
            to,
            amount,
            new_balance,
        }));
        Ok(new_balance)
    }

    /// Check the custody and ownership invariants. Returns the first violation found.
    pub fn verify_invariants(&self) -> Result<(), String> {
        let mut reserved: HashMap<Address, Amount> = HashMap::new();
        for position in self.positions.values() {
            let live = position.state.holds_reservation();
            if live != self.token.exists(position.id) {
                return Err(format!(
                    "position {} is {} but token exists = {}",
                    position.id,
                    position.state,
                    self.token.exists(position.id)
                ));
            }
            if live {
                let entry = reserved.entry(position.collateral_asset).or_insert_with(Amount::zero);
                *entry = entry
                    .checked_add(position.collateral_amount)
                    .ok_or_else(|| "reserved sum overflow".to_string())?;
            }
        }

        for (asset, balance) in self.vault.assets() {
            let expected = reserved.remove(asset).unwrap_or_else(Amount::zero);
            if balance.reserved != expected {
                return Err(format!(
                    "vault reserves {} of {} but live positions hold {}",
                    balance.reserved, asset, expected
                ));
            }
            if balance.reserved > balance.balance {
                return Err(format!(
                    "vault reserved {} exceeds balance {} for {}",
                    balance.reserved, balance.balance, asset
                ));
            }
        }
        if let Some((asset, amount)) = reserved.into_iter().find(|(_, a)| !a.is_zero()) {
            return Err(format!("{} of {} reserved by positions but unknown to the vault", amount, asset));
        }

        if self.token.total_supply() as usize
            != self.positions.values().filter(|p| p.state.holds_reservation()).count()
        {
            return Err("token supply does not match live positions".to_string());
        }
        Ok(())
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        debug!(event_id = event.id.0, payload = ?event.payload, "event");

        self.events.push(event);

        if self.tx_depth == 0 {
            self.trim_events();
        }
    }

    // oldest events go first once retention is exceeded
    fn trim_events(&mut self) {
        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
