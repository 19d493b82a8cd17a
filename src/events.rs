// 11.0: every state change produces an event. used for audit trails, indexers and tests.
// the EventPayload enum lists all event types.

use crate::settlement::PayoutRole;
use crate::types::{Address, Amount, Bps, PositionId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionFilled(PositionFilledEvent),
    PositionClosed(PositionClosedEvent),
    PositionCancelled(PositionCancelledEvent),

    // Funds leaving custody on close
    SettlementPayout(SettlementPayoutEvent),

    // Token events. from = None on mint, to = None on burn
    TokenTransfer(TokenTransferEvent),

    // Vault events
    VaultDeposit(VaultDepositEvent),
    VaultWithdrawal(VaultWithdrawalEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub position_id: PositionId,
    pub owner: Address,
    pub asset: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionFilledEvent {
    pub position_id: PositionId,
    pub counterparty: Address,
    pub margin_bps: Bps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub position_id: PositionId,
    pub holder: Address,
    pub holder_share: Amount,
    pub counterparty_share: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionCancelledEvent {
    pub position_id: PositionId,
    pub holder: Address,
    pub released: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPayoutEvent {
    pub position_id: PositionId,
    pub role: PayoutRole,
    pub recipient: Address,
    pub asset: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransferEvent {
    pub position_id: PositionId,
    pub from: Option<Address>,
    pub to: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultDepositEvent {
    pub asset: Address,
    pub from: Address,
    pub amount: Amount,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultWithdrawalEvent {
    pub asset: Address,
    pub to: Address,
    pub amount: Amount,
    pub new_balance: Amount,
}
