// 9.1 settlement.rs: what a close pays out, and the ledger it pays into.
//
// formula: counterparty gets floor(collateral * margin_bps / 10_000), holder gets the
// rest. the two shares always add up to the reserved collateral, so a close debits the
// vault by exactly that position's reservation and never by more.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::position::{Position, PositionState};
use crate::types::{Address, Amount, Bps, PositionId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("position {id} is {state}, only filled positions settle")]
    NotFilled { id: PositionId, state: PositionState },

    #[error("position {0} has no counterparty")]
    MissingCounterparty(PositionId),

    #[error("margin {margin} above maximum {max}")]
    MarginOutOfRange { margin: Bps, max: Bps },

    #[error("settlement arithmetic overflow for position {0}")]
    Overflow(PositionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutRole {
    Holder,
    Counterparty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub role: PayoutRole,
    pub recipient: Address,
    pub asset: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub position_id: PositionId,
    pub asset: Address,
    pub collateral: Amount,
    pub holder_share: Amount,
    pub counterparty_share: Amount,
    // zero shares are left out
    pub payouts: Vec<Payout>,
}

impl SettlementPlan {
    pub fn total_paid(&self) -> Amount {
        self.payouts.iter().map(|p| p.amount).sum()
    }
}

// Pure computation. Nothing moves until the registry applies the plan.
pub fn plan_settlement(
    position: &Position,
    holder: Address,
    max_margin: Bps,
) -> Result<SettlementPlan, SettlementError> {
    if position.state != PositionState::Filled {
        return Err(SettlementError::NotFilled {
            id: position.id,
            state: position.state,
        });
    }
    let counterparty = position
        .counterparty
        .ok_or(SettlementError::MissingCounterparty(position.id))?;
    if position.margin_bps > max_margin {
        return Err(SettlementError::MarginOutOfRange {
            margin: position.margin_bps,
            max: max_margin,
        });
    }

    let collateral = position.collateral_amount;
    let counterparty_share = collateral
        .checked_apply_bps(position.margin_bps)
        .ok_or(SettlementError::Overflow(position.id))?;
    let holder_share = collateral
        .checked_sub(counterparty_share)
        .ok_or(SettlementError::Overflow(position.id))?;

    let asset = position.collateral_asset;
    let payouts = [
        (PayoutRole::Holder, holder, holder_share),
        (PayoutRole::Counterparty, counterparty, counterparty_share),
    ]
    .into_iter()
    .filter(|(_, _, amount)| !amount.is_zero())
    .map(|(role, recipient, amount)| Payout {
        role,
        recipient,
        asset,
        amount,
    })
    .collect();

    Ok(SettlementPlan {
        position_id: position.id,
        asset,
        collateral,
        holder_share,
        counterparty_share,
        payouts,
    })
}

// Balances of assets outside the vault, keyed by (asset, account). Payouts and
// withdrawals land here; deposits into the vault are drawn from here when funded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetLedger {
    balances: HashMap<(Address, Address), Amount>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, asset: Address, account: Address) -> Amount {
        self.balances
            .get(&(asset, account))
            .copied()
            .unwrap_or_else(Amount::zero)
    }

    pub fn credit(&mut self, asset: Address, account: Address, amount: Amount) -> Option<Amount> {
        let updated = self.balance_of(asset, account).checked_add(amount)?;
        self.balances.insert((asset, account), updated);
        Some(updated)
    }

    pub fn debit(&mut self, asset: Address, account: Address, amount: Amount) -> Option<Amount> {
        let updated = self.balance_of(asset, account).checked_sub(amount)?;
        self.balances.insert((asset, account), updated);
        Some(updated)
    }

    // net inflow per account if `payouts` were applied
    pub fn net_flows(payouts: &[Payout]) -> HashMap<Address, Amount> {
        let mut flows: HashMap<Address, Amount> = HashMap::new();
        for payout in payouts {
            let entry = flows.entry(payout.recipient).or_insert_with(Amount::zero);
            *entry = [*entry, payout.amount].iter().sum();
        }
        flows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn asset() -> Address {
        Address::from_low_u64(0xa)
    }

    fn holder() -> Address {
        Address::from_low_u64(0x1)
    }

    fn counterparty() -> Address {
        Address::from_low_u64(0xc)
    }

    fn filled(amount: u64, margin: u32) -> Position {
        let mut pos = Position::new(PositionId(1), asset(), Amount::units(amount), Timestamp::from_millis(0));
        pos.mark_filled(counterparty(), Bps::new(margin), Timestamp::from_millis(1));
        pos
    }

    #[test]
    fn split_by_margin() {
        let plan = plan_settlement(&filled(1000, 1000), holder(), Bps::new(10_000)).unwrap();

        assert_eq!(plan.counterparty_share, Amount::units(100));
        assert_eq!(plan.holder_share, Amount::units(900));
        assert_eq!(plan.total_paid(), Amount::units(1000));
        assert_eq!(plan.payouts.len(), 2);
        assert_eq!(plan.payouts[0].role, PayoutRole::Holder);
        assert_eq!(plan.payouts[1].recipient, counterparty());
    }

    #[test]
    fn zero_margin_pays_holder_only() {
        let plan = plan_settlement(&filled(1000, 0), holder(), Bps::new(10_000)).unwrap();
        assert_eq!(plan.payouts.len(), 1);
        assert_eq!(plan.payouts[0].recipient, holder());
        assert_eq!(plan.payouts[0].amount, Amount::units(1000));
    }

    #[test]
    fn full_margin_pays_counterparty_only() {
        let plan = plan_settlement(&filled(1000, 10_000), holder(), Bps::new(10_000)).unwrap();
        assert_eq!(plan.payouts.len(), 1);
        assert_eq!(plan.payouts[0].role, PayoutRole::Counterparty);
    }

    #[test]
    fn rounding_favours_holder() {
        // 999 * 5% = 49.95 -> counterparty 49, holder 950
        let plan = plan_settlement(&filled(999, 500), holder(), Bps::new(10_000)).unwrap();
        assert_eq!(plan.counterparty_share, Amount::units(49));
        assert_eq!(plan.holder_share, Amount::units(950));
    }

    #[test]
    fn open_position_does_not_settle() {
        let pos = Position::new(PositionId(3), asset(), Amount::units(10), Timestamp::from_millis(0));
        assert!(matches!(
            plan_settlement(&pos, holder(), Bps::new(10_000)),
            Err(SettlementError::NotFilled { .. })
        ));
    }

    #[test]
    fn ledger_credit_debit() {
        let mut ledger = AssetLedger::new();
        ledger.credit(asset(), holder(), Amount::units(50)).unwrap();
        assert_eq!(ledger.balance_of(asset(), holder()), Amount::units(50));
        assert!(ledger.debit(asset(), holder(), Amount::units(51)).is_none());
        assert_eq!(ledger.debit(asset(), holder(), Amount::units(20)), Some(Amount::units(30)));
    }

    #[test]
    fn net_flows_merge_same_recipient() {
        let payouts = vec![
            Payout { role: PayoutRole::Holder, recipient: holder(), asset: asset(), amount: Amount::units(60) },
            Payout { role: PayoutRole::Counterparty, recipient: holder(), asset: asset(), amount: Amount::units(40) },
        ];
        let flows = AssetLedger::net_flows(&payouts);
        assert_eq!(flows.get(&holder()), Some(&Amount::units(100)));
    }
}
