// 4.0: position record and its state machine.
// Open -> Filled -> Closed, or Open -> Cancelled. nothing skips a state and the
// terminal states never move again.

use crate::types::{Address, Amount, Bps, PositionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Open,
    Filled,
    Closed,
    Cancelled,
}

impl PositionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PositionState::Closed | PositionState::Cancelled)
    }

    // collateral stays reserved in the vault while the position is live
    pub fn holds_reservation(&self) -> bool {
        matches!(self, PositionState::Open | PositionState::Filled)
    }

    pub fn can_transition_to(&self, next: PositionState) -> bool {
        matches!(
            (self, next),
            (PositionState::Open, PositionState::Filled)
                | (PositionState::Open, PositionState::Cancelled)
                | (PositionState::Filled, PositionState::Closed)
        )
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PositionState::Open => "open",
            PositionState::Filled => "filled",
            PositionState::Closed => "closed",
            PositionState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub collateral_asset: Address,
    pub collateral_amount: Amount,
    pub counterparty: Option<Address>,
    pub margin_bps: Bps,
    pub state: PositionState,
    pub opened_at: Timestamp,
    pub filled_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
}

impl Position {
    pub fn new(id: PositionId, asset: Address, amount: Amount, timestamp: Timestamp) -> Self {
        Self {
            id,
            collateral_asset: asset,
            collateral_amount: amount,
            counterparty: None,
            margin_bps: Bps::zero(),
            state: PositionState::Open,
            opened_at: timestamp,
            filled_at: None,
            closed_at: None,
        }
    }

    // callers check the transition first. these only apply it.
    pub(crate) fn mark_filled(&mut self, counterparty: Address, margin: Bps, timestamp: Timestamp) {
        debug_assert!(self.state.can_transition_to(PositionState::Filled));
        self.counterparty = Some(counterparty);
        self.margin_bps = margin;
        self.state = PositionState::Filled;
        self.filled_at = Some(timestamp);
    }

    pub(crate) fn mark_closed(&mut self, timestamp: Timestamp) {
        debug_assert!(self.state.can_transition_to(PositionState::Closed));
        self.state = PositionState::Closed;
        self.closed_at = Some(timestamp);
    }

    pub(crate) fn mark_cancelled(&mut self, timestamp: Timestamp) {
        debug_assert!(self.state.can_transition_to(PositionState::Cancelled));
        self.state = PositionState::Cancelled;
        self.closed_at = Some(timestamp);
    }

    pub fn view(&self) -> PositionView {
        PositionView {
            id: self.id,
            asset: self.collateral_asset,
            amount: self.collateral_amount,
            counterparty: self.counterparty,
            margin_bps: self.margin_bps,
            state: self.state,
            opened_at: self.opened_at,
        }
    }
}

/// Read-only snapshot returned by `get_trade_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub id: PositionId,
    pub asset: Address,
    pub amount: Amount,
    pub counterparty: Option<Address>,
    pub margin_bps: Bps,
    pub state: PositionState,
    pub opened_at: Timestamp,
}
