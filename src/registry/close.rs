//! Closing a filled position: settle, pay out, burn.

use super::core::Registry;
use super::results::{CloseResult, ProviderError};
use crate::events::{EventPayload, PositionClosedEvent, SettlementPayoutEvent, TokenTransferEvent};
use crate::settlement::{plan_settlement, AssetLedger};
use crate::types::{Address, PositionId};
use tracing::info;

impl Registry {
    /// Filled -> Closed, at most once per position. Everything is checked before the
    /// first balance moves, so a failed close changes nothing.
    pub fn close_trade(&mut self, caller: Address, id: PositionId) -> Result<CloseResult, ProviderError> {
        // a burned token means the position already settled (or never existed)
        let holder = self.holder_check(caller, id, "close position")?;
        let position = self.positions.get(&id).ok_or(ProviderError::NotFound(id))?;

        let plan = plan_settlement(position, holder, self.config.max_margin())?;

        let reserved = self.vault.reserved(plan.asset);
        let balance = self.vault.balance(plan.asset);
        if plan.collateral > reserved || plan.collateral > balance {
            return Err(ProviderError::InsufficientVaultBalance {
                asset: plan.asset,
                available: reserved.min(balance),
                requested: plan.collateral,
            });
        }
        let flows = AssetLedger::net_flows(&plan.payouts);
        for (recipient, amount) in &flows {
            self.ledger
                .balance_of(plan.asset, *recipient)
                .checked_add(*amount)
                .ok_or(ProviderError::ArithmeticOverflow("settlement payout"))?;
        }

        // the whole reservation leaves custody, split between the recipients
        self.vault.settle_reserved(plan.asset, plan.collateral)?;
        for (recipient, amount) in flows {
            self.ledger.credit(plan.asset, recipient, amount);
        }
        self.token.burn(id)?;
        let now = self.current_time;
        if let Some(position) = self.positions.get_mut(&id) {
            position.mark_closed(now);
        }

        info!(
            position = %id,
            holder = %holder,
            holder_share = %plan.holder_share,
            counterparty_share = %plan.counterparty_share,
            "position closed"
        );

        for payout in &plan.payouts {
            self.emit_event(EventPayload::SettlementPayout(SettlementPayoutEvent {
                position_id: id,
                role: payout.role,
                recipient: payout.recipient,
                asset: payout.asset,
                amount: payout.amount,
            }));
        }
        self.emit_event(EventPayload::TokenTransfer(TokenTransferEvent {
            position_id: id,
            from: Some(holder),
            to: None,
        }));
        self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
            position_id: id,
            holder,
            holder_share: plan.holder_share,
            counterparty_share: plan.counterparty_share,
        }));

        Ok(CloseResult {
            position_id: id,
            holder,
            plan,
        })
    }
}
