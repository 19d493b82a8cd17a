//! Opening, cancelling and handing over positions.

use super::core::Registry;
use super::results::ProviderError;
use crate::events::{EventPayload, PositionCancelledEvent, PositionOpenedEvent, TokenTransferEvent};
use crate::position::{Position, PositionState};
use crate::token::{TokenError, TransferPolicy};
use crate::types::{Address, Amount, PositionId};
use tracing::{info, warn};

impl Registry {
    /// Reserve `amount` of `asset` from free vault liquidity and mint the position
    /// token to `owner`.
    pub fn open_position(
        &mut self,
        asset: Address,
        amount: Amount,
        owner: Address,
    ) -> Result<PositionId, ProviderError> {
        if !self.config.supports(asset) {
            warn!(asset = %asset, "open rejected: unsupported asset");
            return Err(ProviderError::InvalidAsset(asset));
        }
        if amount.is_zero() {
            return Err(ProviderError::InvalidAmount("collateral must be positive"));
        }
        if owner.is_zero() {
            return Err(TokenError::MintToZeroAddress.into());
        }
        if let Err(err) = self.vault.can_reserve(asset, amount) {
            warn!(asset = %asset, amount = %amount, error = %err, "open rejected");
            return Err(err.into());
        }

        let id = PositionId(self.next_position_id);
        let next = self
            .next_position_id
            .checked_add(1)
            .ok_or(ProviderError::ArithmeticOverflow("position id"))?;

        self.vault.reserve(asset, amount)?;
        self.token.mint(owner, id)?;
        self.positions
            .insert(id, Position::new(id, asset, amount, self.current_time));
        self.next_position_id = next;

        info!(position = %id, owner = %owner, asset = %asset, amount = %amount, "position opened");

        self.emit_event(EventPayload::TokenTransfer(TokenTransferEvent {
            position_id: id,
            from: None,
            to: Some(owner),
        }));
        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            position_id: id,
            owner,
            asset,
            amount,
        }));

        Ok(id)
    }

    /// Holder walks away from an unfilled position. The reservation goes back to free
    /// liquidity and the token is burned.
    pub fn cancel_position(&mut self, caller: Address, id: PositionId) -> Result<(), ProviderError> {
        let holder = self.holder_check(caller, id, "cancel position")?;
        let position = self.positions.get(&id).ok_or(ProviderError::NotFound(id))?;
        if position.state != PositionState::Open {
            return Err(ProviderError::InvalidState {
                id,
                state: position.state,
                action: "cancel",
            });
        }
        let asset = position.collateral_asset;
        let released = position.collateral_amount;

        self.vault.release(asset, released)?;
        self.token.burn(id)?;
        if let Some(position) = self.positions.get_mut(&id) {
            position.mark_cancelled(self.current_time);
        }

        info!(position = %id, holder = %holder, released = %released, "position cancelled");

        self.emit_event(EventPayload::TokenTransfer(TokenTransferEvent {
            position_id: id,
            from: Some(holder),
            to: None,
        }));
        self.emit_event(EventPayload::PositionCancelled(PositionCancelledEvent {
            position_id: id,
            holder,
            released,
        }));
        Ok(())
    }

    /// Hand the position token (and with it the right to close) to `to`.
    pub fn transfer_position(
        &mut self,
        caller: Address,
        to: Address,
        id: PositionId,
    ) -> Result<(), ProviderError> {
        let state = self
            .positions
            .get(&id)
            .map(|p| p.state)
            .ok_or(ProviderError::NotFound(id))?;
        let locked = self.config.transfer_policy == TransferPolicy::LockedWhileFilled
            && state == PositionState::Filled;

        let from = self.token.transfer(caller, to, id, locked)?;

        info!(position = %id, from = %from, to = %to, "position token transferred");
        self.emit_event(EventPayload::TokenTransfer(TokenTransferEvent {
            position_id: id,
            from: Some(from),
            to: Some(to),
        }));
        Ok(())
    }

    // current holder, or Unauthorized if that is not `caller`
    pub(super) fn holder_check(
        &self,
        caller: Address,
        id: PositionId,
        action: &'static str,
    ) -> Result<Address, ProviderError> {
        let holder = self.token.owner_of(id)?;
        if holder != caller {
            warn!(position = %id, caller = %caller, action, "caller is not the token holder");
            return Err(ProviderError::Unauthorized { caller, action });
        }
        Ok(holder)
    }
}
